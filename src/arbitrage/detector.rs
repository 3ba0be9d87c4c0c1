//! Arbitrage Detector
//! Mission: Identify and quantify cross-venue price mismatches
//! Philosophy: Profit is in the spread, execution is in the speed

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::arbitrage::fees::{FeeSide, VRpcFeeSchedule, VStreamFeeSchedule};
use crate::model::{NormalizedTick, Opportunity, Side, Venue};

/// Pure, stateless evaluator of the two YES/NO parity pairings between a
/// V-Stream tick and a V-RPC tick for the same symbol.
#[derive(Debug, Clone)]
pub struct ArbitrageDetector {
    vstream_fees: VStreamFeeSchedule,
    vrpc_fees: VRpcFeeSchedule,
    slippage_buffer: Decimal,
    min_profit: Decimal,
}

impl Default for ArbitrageDetector {
    fn default() -> Self {
        Self {
            vstream_fees: VStreamFeeSchedule::default(),
            vrpc_fees: VRpcFeeSchedule::default(),
            slippage_buffer: dec!(0.01),
            min_profit: Decimal::ZERO,
        }
    }
}

impl ArbitrageDetector {
    pub fn new(
        vstream_fees: VStreamFeeSchedule,
        vrpc_fees: VRpcFeeSchedule,
        slippage_buffer: Decimal,
        min_profit: Decimal,
    ) -> Self {
        Self {
            vstream_fees,
            vrpc_fees,
            slippage_buffer,
            min_profit,
        }
    }

    /// Evaluate both parity pairings for one symbol and return the better
    /// one by net profit, if either clears `min_profit`. Ties are broken in
    /// favor of pairing 1 (buy YES on V-Stream + NO on V-RPC).
    pub fn detect(
        &self,
        vstream_tick: &NormalizedTick,
        vrpc_tick: &NormalizedTick,
    ) -> Option<Opportunity> {
        if vstream_tick.symbol != vrpc_tick.symbol {
            return None;
        }

        let ts = std::cmp::max(vstream_tick.ts_local, vrpc_tick.ts_local);
        let ts = nanos_to_utc(ts);

        let opp1 = self.check_pairing(
            &vstream_tick.symbol,
            Venue::VStream,
            Side::Yes,
            vstream_tick.yes_ask,
            Venue::VRpc,
            Side::No,
            vrpc_tick.no_ask,
            ts,
        );

        let opp2 = self.check_pairing(
            &vstream_tick.symbol,
            Venue::VStream,
            Side::No,
            vstream_tick.no_ask,
            Venue::VRpc,
            Side::Yes,
            vrpc_tick.yes_ask,
            ts,
        );

        match (opp1, opp2) {
            (Some(o1), Some(o2)) => {
                if o2.net_profit > o1.net_profit {
                    Some(o2)
                } else {
                    Some(o1)
                }
            }
            (Some(o1), None) => Some(o1),
            (None, Some(o2)) => Some(o2),
            (None, None) => None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_pairing(
        &self,
        symbol: &str,
        leg_a_venue: Venue,
        leg_a_side: Side,
        leg_a_price: Decimal,
        leg_b_venue: Venue,
        leg_b_side: Side,
        leg_b_price: Decimal,
        ts: DateTime<Utc>,
    ) -> Option<Opportunity> {
        let parity_cost = leg_a_price + leg_b_price;
        if parity_cost >= Decimal::ONE {
            return None;
        }

        let gross_profit = Decimal::ONE - parity_cost;
        let fee_a = self.fee_for(leg_a_venue, leg_a_price, 1);
        let fee_b = self.fee_for(leg_b_venue, leg_b_price, 1);
        let net_profit = gross_profit - fee_a - fee_b - self.slippage_buffer;

        if net_profit < self.min_profit {
            return None;
        }

        Some(Opportunity {
            symbol: symbol.to_string(),
            leg_a_venue,
            leg_a_side,
            leg_a_price,
            leg_b_venue,
            leg_b_side,
            leg_b_price,
            quantity: 1,
            gross_profit,
            fee_a,
            fee_b,
            slippage_buffer: self.slippage_buffer,
            net_profit,
            ts,
        })
    }

    fn fee_for(&self, venue: Venue, price: Decimal, quantity: u64) -> Decimal {
        match venue {
            Venue::VStream => self.vstream_fees.fee(FeeSide::Taker, price, quantity),
            Venue::VRpc => self.vrpc_fees.fee(quantity),
        }
    }

    /// Re-evaluate fees and net profit at a specific quantity, preserving
    /// the venues/sides/prices the detector already chose. Used by the
    /// sizing gate once it has decided how many contracts to buy.
    pub fn reprice_at_quantity(&self, opp: &Opportunity, quantity: u64) -> Opportunity {
        let qty = Decimal::from(quantity);
        let gross_profit = (Decimal::ONE - opp.parity_cost()) * qty;
        let fee_a = self.fee_for(opp.leg_a_venue, opp.leg_a_price, quantity);
        let fee_b = self.fee_for(opp.leg_b_venue, opp.leg_b_price, quantity);
        let slippage_buffer = self.slippage_buffer * qty;
        let net_profit = gross_profit - fee_a - fee_b - slippage_buffer;

        Opportunity {
            quantity,
            gross_profit,
            fee_a,
            fee_b,
            slippage_buffer,
            net_profit,
            ..opp.clone()
        }
    }
}

fn nanos_to_utc(ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ns / 1_000_000_000, (ns % 1_000_000_000) as u32)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(venue: Venue, symbol: &str, yes_ask: Decimal, no_ask: Decimal) -> NormalizedTick {
        NormalizedTick {
            venue,
            symbol: symbol.to_string(),
            yes_ask,
            no_ask,
            yes_ask_size: 100,
            no_ask_size: 100,
            ts_venue: 0,
            ts_local: 0,
        }
    }

    #[test]
    fn rejects_when_symbols_differ() {
        let detector = ArbitrageDetector::default();
        let a = tick(Venue::VStream, "FED-MAR", dec!(0.40), dec!(0.58));
        let b = tick(Venue::VRpc, "FED-JUN", dec!(0.40), dec!(0.58));
        assert!(detector.detect(&a, &b).is_none());
    }

    #[test]
    fn rejects_when_parity_cost_at_or_above_one_dollar() {
        let detector = ArbitrageDetector::default();
        let a = tick(Venue::VStream, "FED-MAR", dec!(0.55), dec!(0.55));
        let b = tick(Venue::VRpc, "FED-MAR", dec!(0.55), dec!(0.55));
        assert!(detector.detect(&a, &b).is_none());
    }

    #[test]
    fn detects_profitable_parity_gap() {
        let detector = ArbitrageDetector::default();
        let a = tick(Venue::VStream, "FED-MAR", dec!(0.40), dec!(0.55));
        let b = tick(Venue::VRpc, "FED-MAR", dec!(0.40), dec!(0.55));
        let opp = detector.detect(&a, &b).expect("should find opportunity");
        assert_eq!(opp.leg_a_venue, Venue::VStream);
        assert!(opp.net_profit > Decimal::ZERO);
    }

    #[test]
    fn ties_favor_pairing_one() {
        // Symmetric prices make both pairings identical in net profit.
        let detector = ArbitrageDetector::default();
        let a = tick(Venue::VStream, "SYM", dec!(0.45), dec!(0.45));
        let b = tick(Venue::VRpc, "SYM", dec!(0.45), dec!(0.45));
        let opp = detector.detect(&a, &b).unwrap();
        assert_eq!(opp.leg_a_side, Side::Yes);
    }

    #[test]
    fn reprice_at_quantity_scales_linearly_in_gross_profit() {
        let detector = ArbitrageDetector::default();
        let a = tick(Venue::VStream, "FED-MAR", dec!(0.30), dec!(0.55));
        let b = tick(Venue::VRpc, "FED-MAR", dec!(0.30), dec!(0.55));
        let opp = detector.detect(&a, &b).unwrap();
        let resized = detector.reprice_at_quantity(&opp, 10);
        assert_eq!(resized.gross_profit, opp.gross_profit * dec!(10));
    }
}
