//! Fee Model
//! Mission: Accurate profit calculation after all fees
//! Philosophy: A profitable trade on paper must be profitable in reality

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Which side of the trade a fee is being quoted for. V-Stream-class venues
/// (Kalshi) quote a maker and a taker schedule; today both resolve to the
/// same formula, preserved as an explicit parameter rather than collapsed
/// away, since the fee schedule may diverge later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSide {
    Maker,
    Taker,
}

/// V-Stream-class (Kalshi-style) taker fee schedule: a quadratic-in-price
/// fee, highest at the 50-cent mark and zero at the extremes.
#[derive(Debug, Clone)]
pub struct VStreamFeeSchedule {
    rate: Decimal,
}

impl Default for VStreamFeeSchedule {
    fn default() -> Self {
        Self { rate: dec!(0.07) }
    }
}

impl VStreamFeeSchedule {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    /// `fee = round_up_to_cent(rate * quantity * price * (1 - price))`.
    pub fn fee(&self, side: FeeSide, price: Decimal, quantity: u64) -> Decimal {
        match side {
            // Preserved per the fee schedule's Open Question: maker fees
            // currently delegate to the taker formula.
            FeeSide::Maker | FeeSide::Taker => self.taker_fee(price, quantity),
        }
    }

    fn taker_fee(&self, price: Decimal, quantity: u64) -> Decimal {
        let one_minus_p = Decimal::ONE - price;
        let raw_fee = self.rate * Decimal::from(quantity) * price * one_minus_p;
        raw_fee.round_dp_with_strategy(2, RoundingStrategy::AwayFromZero)
    }
}

/// V-RPC-class (IBKR/ForecastEx-style) flat per-contract fee.
#[derive(Debug, Clone)]
pub struct VRpcFeeSchedule {
    per_contract: Decimal,
}

impl Default for VRpcFeeSchedule {
    fn default() -> Self {
        Self {
            per_contract: dec!(0.01),
        }
    }
}

impl VRpcFeeSchedule {
    pub fn new(per_contract: Decimal) -> Self {
        Self { per_contract }
    }

    pub fn fee(&self, quantity: u64) -> Decimal {
        self.per_contract * Decimal::from(quantity)
    }
}
