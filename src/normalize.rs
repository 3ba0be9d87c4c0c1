//! Tick normalization.
//! Mission: turn venue-shaped wire messages into one common tick shape.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::SymbolMap;
use crate::errors::NormalizationError;
use crate::gateway::{RawEvent, RawTick};
use crate::model::{NormalizedTick, Side, UnifiedSymbol, Venue};

/// Converts one venue's raw wire messages into [`NormalizedTick`]s.
///
/// `Ok(None)` means the message wasn't tick-bearing (a heartbeat, an order
/// ack, a subscription confirmation) — not an error, just nothing to do.
/// `Err` means the message claimed to be a tick but was malformed or
/// referenced an unmapped symbol; callers count these and move on.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: RawEvent) -> Result<Option<NormalizedTick>, NormalizationError>;
}

/// Holds the YES and NO halves of a venue's tick until both have arrived.
///
/// Grounded on the reference implementation's per-symbol partial-tick cache:
/// a struct holding optional YES/NO halves plus a receipt instant advanced
/// on every half-update. Staleness is not self-managed here — the gate
/// applies it downstream, against `received_at`.
#[derive(Debug, Clone)]
pub struct PartialTickAssembler {
    yes: Option<(Decimal, u64)>,
    no: Option<(Decimal, u64)>,
    received_at: Instant,
}

impl Default for PartialTickAssembler {
    fn default() -> Self {
        Self {
            yes: None,
            no: None,
            received_at: Instant::now(),
        }
    }
}

impl PartialTickAssembler {
    pub fn update(&mut self, side: Side, price: Decimal, size: u64) {
        match side {
            Side::Yes => self.yes = Some((price, size)),
            Side::No => self.no = Some((price, size)),
        }
        self.received_at = Instant::now();
    }

    pub fn is_complete(&self) -> bool {
        self.yes.is_some() && self.no.is_some()
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Returns `(yes_price, yes_size, no_price, no_size)` once both halves
    /// are present; `None` otherwise. Does not clear state — a later
    /// single-sided update still yields a full tick using the other side's
    /// last known value, matching the reference implementation.
    pub fn assembled(&self) -> Option<(Decimal, u64, Decimal, u64)> {
        let (yes_price, yes_size) = self.yes?;
        let (no_price, no_size) = self.no?;
        Some((yes_price, yes_size, no_price, no_size))
    }
}

fn reject_sentinel(field: &'static str, value: Decimal) -> Result<Decimal, NormalizationError> {
    if value < Decimal::ZERO {
        return Err(NormalizationError::SentinelValue { field });
    }
    Ok(value)
}

/// Normalizer for the streaming, complete-orderbook venue class. A single
/// message carries both YES and NO bid ladders, so this normalizer never
/// needs partial-tick assembly.
///
/// Grounded on the reference Kalshi normalizer: buying YES means hitting the
/// best NO bid, so `yes_ask = (100 - highest_no_bid_cents) / 100` and
/// symmetrically for `no_ask`.
pub struct VStreamNormalizer {
    symbol_map: Arc<SymbolMap>,
}

impl VStreamNormalizer {
    pub fn new(symbol_map: Arc<SymbolMap>) -> Self {
        Self { symbol_map }
    }
}

impl Normalizer for VStreamNormalizer {
    fn normalize(&self, raw: RawEvent) -> Result<Option<NormalizedTick>, NormalizationError> {
        let RawEvent::Tick(RawTick::VStreamOrderbook {
            market_ticker,
            yes_bids,
            no_bids,
        }) = raw
        else {
            return Ok(None);
        };

        if yes_bids.is_empty() || no_bids.is_empty() {
            return Ok(None);
        }

        let mapping = self
            .symbol_map
            .by_venue_a_ticker(&market_ticker)
            .ok_or_else(|| NormalizationError::UnknownSymbol {
                ticker: market_ticker.clone(),
            })?;

        let highest_yes_bid = yes_bids.iter().map(|(p, _)| *p).max().unwrap();
        let highest_no_bid = no_bids.iter().map(|(p, _)| *p).max().unwrap();

        if !(0..=100).contains(&highest_yes_bid) || !(0..=100).contains(&highest_no_bid) {
            return Err(NormalizationError::Malformed {
                field: "bid_price_cents",
                raw: format!("yes={highest_yes_bid} no={highest_no_bid}"),
            });
        }

        let hundred = Decimal::from(100);
        let yes_ask = (hundred - Decimal::from(highest_no_bid)) / hundred;
        let no_ask = (hundred - Decimal::from(highest_yes_bid)) / hundred;

        let yes_ask_size = no_bids
            .iter()
            .find(|(p, _)| *p == highest_no_bid)
            .map(|(_, s)| *s)
            .unwrap_or(0);
        let no_ask_size = yes_bids
            .iter()
            .find(|(p, _)| *p == highest_yes_bid)
            .map(|(_, s)| *s)
            .unwrap_or(0);

        let ts_local = now_ns();

        let tick = NormalizedTick {
            venue: Venue::VStream,
            symbol: mapping.unified_symbol.clone(),
            yes_ask,
            no_ask,
            yes_ask_size,
            no_ask_size,
            ts_venue: ts_local,
            ts_local,
        };

        if !tick.is_valid() {
            return Err(NormalizationError::Malformed {
                field: "yes_ask/no_ask",
                raw: format!("{}/{}", tick.yes_ask, tick.no_ask),
            });
        }

        Ok(Some(tick))
    }
}

/// Normalizer for the request/response venue class, which reports one side
/// of one contract per message. Maintains per-symbol [`PartialTickAssembler`]
/// state internally so callers always receive `Normalizer::normalize`'s
/// uniform `Result<Option<NormalizedTick>, _>` contract.
///
/// Grounded on the reference IBKR normalizer: bid/ask reported per contract
/// id, `-1`/NaN sentinel rejection on the raw float, and the `no_ask ≈ 1.00 −
/// yes_bid` approximation used only as a fallback when a venue exposes bids
/// but not a true NO-side ask (kept here as a documented Open Question, not
/// silently assumed: this normalizer always has a real NO-side quote because
/// the venue publishes a separate NO contract, so the approximation path is
/// unused in practice but preserved for venues that only quote one side).
pub struct VRpcNormalizer {
    symbol_map: Arc<SymbolMap>,
    partials: Mutex<HashMap<UnifiedSymbol, PartialTickAssembler>>,
}

impl VRpcNormalizer {
    pub fn new(symbol_map: Arc<SymbolMap>) -> Self {
        Self {
            symbol_map,
            partials: Mutex::new(HashMap::new()),
        }
    }
}

impl Normalizer for VRpcNormalizer {
    fn normalize(&self, raw: RawEvent) -> Result<Option<NormalizedTick>, NormalizationError> {
        let RawEvent::Tick(RawTick::VRpcQuote {
            contract_id,
            ask,
            ts_venue,
            ..
        }) = raw
        else {
            return Ok(None);
        };

        let Some(ask) = ask else {
            return Ok(None);
        };
        let ask = reject_sentinel("ask", ask)?;

        let (mapping, side) = self.symbol_map.by_venue_b_id(&contract_id).ok_or_else(|| {
            NormalizationError::UnknownSymbol {
                ticker: contract_id.clone(),
            }
        })?;
        let symbol = mapping.unified_symbol.clone();

        let mut partials = self.partials.lock();
        let partial = partials.entry(symbol.clone()).or_default();
        partial.update(side, ask, 0);

        let Some((yes_ask, yes_ask_size, no_ask, no_ask_size)) = partial.assembled() else {
            debug!(symbol = %symbol, side = side.as_str(), "partial tick, awaiting other side");
            return Ok(None);
        };

        let tick = NormalizedTick {
            venue: Venue::VRpc,
            symbol,
            yes_ask,
            no_ask,
            yes_ask_size,
            no_ask_size,
            ts_venue,
            ts_local: now_ns(),
        };

        if !tick.is_valid() {
            return Err(NormalizationError::Malformed {
                field: "yes_ask/no_ask",
                raw: format!("{}/{}", tick.yes_ask, tick.no_ask),
            });
        }

        Ok(Some(tick))
    }
}

/// The `no_ask = 1.00 - yes_bid` approximation for venues that only publish
/// a YES-side book. Unused by [`VRpcNormalizer`] today (the modeled venue
/// quotes NO directly) but kept as the documented fallback for one that
/// doesn't.
pub fn approximate_no_ask_from_yes_bid(yes_bid: Decimal) -> Decimal {
    dec!(1.00) - yes_bid
}

fn now_ns() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContractMapping, SymbolMap};

    fn symbol_map() -> Arc<SymbolMap> {
        Arc::new(SymbolMap::from_mappings(vec![ContractMapping {
            unified_symbol: "FED-MAR-25BPS".to_string(),
            description: "Fed cuts 25bps in March".to_string(),
            venue_a_ticker: "FED-25MAR-T25".to_string(),
            venue_b_yes_id: "con_yes_1".to_string(),
            venue_b_no_id: "con_no_1".to_string(),
        }]))
    }

    #[test]
    fn vstream_normalizer_derives_ask_from_best_bids() {
        let normalizer = VStreamNormalizer::new(symbol_map());
        let raw = RawEvent::Tick(RawTick::VStreamOrderbook {
            market_ticker: "FED-25MAR-T25".to_string(),
            yes_bids: vec![(40, 100)],
            no_bids: vec![(55, 80)],
        });
        let tick = normalizer.normalize(raw).unwrap().unwrap();
        assert_eq!(tick.yes_ask, dec!(0.45));
        assert_eq!(tick.no_ask, dec!(0.60));
    }

    #[test]
    fn vstream_normalizer_rejects_unmapped_ticker() {
        let normalizer = VStreamNormalizer::new(symbol_map());
        let raw = RawEvent::Tick(RawTick::VStreamOrderbook {
            market_ticker: "UNKNOWN".to_string(),
            yes_bids: vec![(40, 100)],
            no_bids: vec![(55, 80)],
        });
        assert!(matches!(
            normalizer.normalize(raw),
            Err(NormalizationError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn vrpc_normalizer_assembles_both_halves() {
        let normalizer = VRpcNormalizer::new(symbol_map());
        let yes = RawEvent::Tick(RawTick::VRpcQuote {
            contract_id: "con_yes_1".to_string(),
            bid: Some(dec!(0.38)),
            ask: Some(dec!(0.40)),
            bid_size: Some(10),
            ask_size: Some(20),
            ts_venue: 1,
        });
        assert!(normalizer.normalize(yes).unwrap().is_none());

        let no = RawEvent::Tick(RawTick::VRpcQuote {
            contract_id: "con_no_1".to_string(),
            bid: Some(dec!(0.53)),
            ask: Some(dec!(0.55)),
            bid_size: Some(5),
            ask_size: Some(15),
            ts_venue: 2,
        });
        let tick = normalizer.normalize(no).unwrap().unwrap();
        assert_eq!(tick.yes_ask, dec!(0.40));
        assert_eq!(tick.no_ask, dec!(0.55));
    }

    #[test]
    fn vrpc_normalizer_rejects_negative_sentinel() {
        let normalizer = VRpcNormalizer::new(symbol_map());
        let raw = RawEvent::Tick(RawTick::VRpcQuote {
            contract_id: "con_yes_1".to_string(),
            bid: None,
            ask: Some(dec!(-1)),
            bid_size: None,
            ask_size: None,
            ts_venue: 0,
        });
        assert!(matches!(
            normalizer.normalize(raw),
            Err(NormalizationError::SentinelValue { .. })
        ));
    }
}
