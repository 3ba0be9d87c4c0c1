//! Opportunity gate: staleness filtering and capital-aware sizing.
//! Mission: never hand the executor an opportunity priced against a stale
//! tick, or sized larger than capital actually allows.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::arbitrage::detector::ArbitrageDetector;
use crate::config::ExecutionConfig;
use crate::ledger::CapitalAccount;
use crate::model::{Opportunity, Received, UnifiedSymbol, Venue};

/// Why an opportunity was rejected before reaching the executor. Every
/// variant here is logged at `debug`, not `warn` — rejection is the normal
/// case, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    StaleTick { venue: Venue, age_ms: u128 },
    ZeroQuantity,
    NotProfitableAtSize,
}

/// Tracks the most recent receipt instant per `(venue, symbol)`, independent
/// of the tick's own content — used only to answer "how long ago did we
/// last hear from this venue for this symbol".
#[derive(Default)]
pub struct StalenessTracker {
    last_seen: Mutex<HashMap<(Venue, UnifiedSymbol), Received<()>>>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, venue: Venue, symbol: &str) {
        self.last_seen
            .lock()
            .insert((venue, symbol.to_string()), Received::new(()));
    }

    pub fn is_stale(&self, venue: Venue, symbol: &str, max_age: Duration) -> bool {
        match self.last_seen.lock().get(&(venue, symbol.to_string())) {
            Some(received) => received.is_stale(max_age),
            None => true,
        }
    }

    fn age_ms(&self, venue: Venue, symbol: &str) -> u128 {
        self.last_seen
            .lock()
            .get(&(venue, symbol.to_string()))
            .map(|r| r.age().as_millis())
            .unwrap_or(u128::MAX)
    }
}

/// Staleness check plus capital-aware sizing for detected opportunities.
pub struct OpportunityGate {
    detector: ArbitrageDetector,
    accounts: HashMap<Venue, Arc<CapitalAccount>>,
    config: ExecutionConfig,
    staleness: StalenessTracker,
}

impl OpportunityGate {
    pub fn new(
        detector: ArbitrageDetector,
        accounts: HashMap<Venue, Arc<CapitalAccount>>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            detector,
            accounts,
            config,
            staleness: StalenessTracker::new(),
        }
    }

    pub fn staleness_tracker(&self) -> &StalenessTracker {
        &self.staleness
    }

    /// Gate and size a freshly detected opportunity. `Ok(opportunity)` is
    /// re-priced at the sized quantity, ready for the executor.
    pub fn evaluate(&self, opp: &Opportunity) -> Result<Opportunity, RejectReason> {
        let max_age = Duration::from_secs_f64(self.config.max_stale_seconds);

        if self.staleness.is_stale(opp.leg_a_venue, &opp.symbol, max_age) {
            return Err(RejectReason::StaleTick {
                venue: opp.leg_a_venue,
                age_ms: self.staleness.age_ms(opp.leg_a_venue, &opp.symbol),
            });
        }
        if self.staleness.is_stale(opp.leg_b_venue, &opp.symbol, max_age) {
            return Err(RejectReason::StaleTick {
                venue: opp.leg_b_venue,
                age_ms: self.staleness.age_ms(opp.leg_b_venue, &opp.symbol),
            });
        }

        let quantity = self.max_quantity(opp);
        if quantity == 0 {
            debug!(symbol = %opp.symbol, "sized to zero quantity, rejecting");
            return Err(RejectReason::ZeroQuantity);
        }

        let sized = self.detector.reprice_at_quantity(opp, quantity);
        if sized.net_profit <= Decimal::ZERO {
            return Err(RejectReason::NotProfitableAtSize);
        }

        Ok(sized)
    }

    /// `floor` division across four constraints: capital-per-market,
    /// per-venue position limits, and per-venue available cash.
    fn max_quantity(&self, opp: &Opportunity) -> u64 {
        let cost_per_pair = opp.parity_cost();
        if cost_per_pair <= Decimal::ZERO {
            return 0;
        }

        let max_by_capital = floor_div(self.config.max_capital_per_market, cost_per_pair);

        let account_a = self.accounts.get(&opp.leg_a_venue);
        let account_b = self.accounts.get(&opp.leg_b_venue);

        let (Some(account_a), Some(account_b)) = (account_a, account_b) else {
            return 0;
        };

        let pos_a = account_a.position_qty(&opp.symbol, opp.leg_a_side);
        let pos_b = account_b.position_qty(&opp.symbol, opp.leg_b_side);
        let max_by_position = std::cmp::min(
            self.config.max_contracts_per_event.saturating_sub(pos_a),
            self.config.max_contracts_per_event.saturating_sub(pos_b),
        );

        let max_by_cash_a = floor_div(account_a.cash_available(), opp.leg_a_price);
        let max_by_cash_b = floor_div(account_b.cash_available(), opp.leg_b_price);

        [max_by_capital, max_by_position, max_by_cash_a, max_by_cash_b]
            .into_iter()
            .min()
            .unwrap_or(0)
    }
}

fn floor_div(numerator: Decimal, denominator: Decimal) -> u64 {
    if denominator <= Decimal::ZERO {
        return 0;
    }
    (numerator / denominator)
        .floor()
        .to_string()
        .parse::<i64>()
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}
