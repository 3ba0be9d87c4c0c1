//! Shared data model for the arbitrage engine.
//! Mission: one vocabulary for ticks, opportunities, and fills across every module.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The two venues this engine arbitrages between.
///
/// V-Stream is the streaming (WebSocket) venue; V-RPC is the request/response
/// (polled REST) venue. Both publish a YES and a NO instrument per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    VStream,
    VRpc,
}

impl Venue {
    pub fn other(self) -> Venue {
        match self {
            Venue::VStream => Venue::VRpc,
            Venue::VRpc => Venue::VStream,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Venue::VStream => "v_stream",
            Venue::VRpc => "v_rpc",
        }
    }
}

/// One side of a binary event contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The complementary side on the same event.
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }
}

/// Opaque unified symbol shared across venues (see the symbol mapping file).
pub type UnifiedSymbol = String;

/// A normalized top-of-book tick for one symbol on one venue.
///
/// Immutable once constructed; produced by a [`crate::normalize::Normalizer`],
/// consumed by the [`crate::book::CentralOrderBook`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedTick {
    pub venue: Venue,
    pub symbol: UnifiedSymbol,
    pub yes_ask: Decimal,
    pub no_ask: Decimal,
    pub yes_ask_size: u64,
    pub no_ask_size: u64,
    /// Venue-reported timestamp, nanoseconds since epoch.
    pub ts_venue: i64,
    /// Local receipt timestamp, nanoseconds since epoch (for persistence).
    pub ts_local: i64,
}

impl NormalizedTick {
    /// Both asks must lie within the valid 0-1 contract price range.
    pub fn is_valid(&self) -> bool {
        let zero = Decimal::ZERO;
        let one = Decimal::ONE;
        (zero..=one).contains(&self.yes_ask) && (zero..=one).contains(&self.no_ask)
    }
}

/// A sized, fully-priced arbitrage opportunity produced by the Detector and
/// (after gating) handed to the Executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: UnifiedSymbol,
    /// Venue and side bought for leg A, and the price paid.
    pub leg_a_venue: Venue,
    pub leg_a_side: Side,
    pub leg_a_price: Decimal,
    /// Venue and side bought for leg B, and the price paid.
    pub leg_b_venue: Venue,
    pub leg_b_side: Side,
    pub leg_b_price: Decimal,
    pub quantity: u64,
    pub gross_profit: Decimal,
    pub fee_a: Decimal,
    pub fee_b: Decimal,
    pub slippage_buffer: Decimal,
    pub net_profit: Decimal,
    pub ts: DateTime<Utc>,
}

impl Opportunity {
    pub fn parity_cost(&self) -> Decimal {
        self.leg_a_price + self.leg_b_price
    }
}

/// Outcome of a single leg within an execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegResult {
    pub venue: Venue,
    pub side: Side,
    pub order_id: Option<String>,
    pub requested_quantity: u64,
    pub filled_quantity: u64,
    pub fill_price: Option<Decimal>,
    pub filled: bool,
}

impl LegResult {
    pub fn unfilled(venue: Venue, side: Side, requested_quantity: u64) -> Self {
        Self {
            venue,
            side,
            order_id: None,
            requested_quantity,
            filled_quantity: 0,
            fill_price: None,
            filled: false,
        }
    }
}

/// Terminal outcome of an execution attempt. Exactly one of `success`,
/// `rolled_back`, or `failed_no_position` describes it — see
/// [`ExecutionOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub symbol: UnifiedSymbol,
    pub outcome: ExecutionOutcome,
    pub leg_a: LegResult,
    pub leg_b: LegResult,
    pub hedge: Option<LegResult>,
    pub total_cost: Decimal,
    pub actual_fees: Decimal,
    pub net_profit: Decimal,
    pub manual_intervention: bool,
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

/// The three terminal states an `ExecutionResult` can settle into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Success,
    RolledBack,
    FailedNoPosition,
}

/// Staleness-aware cache entry: a value plus the monotonic instant it was
/// received at. Used by the staleness tracker for both complete V-Stream
/// ticks and assembled V-RPC ticks.
#[derive(Debug, Clone)]
pub struct Received<T> {
    pub value: T,
    pub received_at: Instant,
}

impl<T> Received<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            received_at: Instant::now(),
        }
    }

    pub fn age(&self) -> std::time::Duration {
        self.received_at.elapsed()
    }

    pub fn is_stale(&self, max_age: std::time::Duration) -> bool {
        self.age() > max_age
    }
}
