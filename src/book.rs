//! Central order book.
//! Mission: hold the latest tick per symbol per venue and detect arbitrage
//! the instant both sides are present.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::arbitrage::detector::ArbitrageDetector;
use crate::model::{NormalizedTick, Opportunity, UnifiedSymbol, Venue};

/// Latest tick from each venue for one symbol.
#[derive(Debug, Clone, Default)]
pub struct SymbolBook {
    pub v_stream: Option<NormalizedTick>,
    pub v_rpc: Option<NormalizedTick>,
}

impl SymbolBook {
    fn update(&mut self, tick: NormalizedTick) {
        match tick.venue {
            Venue::VStream => self.v_stream = Some(tick),
            Venue::VRpc => self.v_rpc = Some(tick),
        }
    }

    pub fn has_both(&self) -> bool {
        self.v_stream.is_some() && self.v_rpc.is_some()
    }
}

/// Single-writer, per-symbol latest-tick store. Holds one lock for the
/// entire update-then-detect sequence so detection always runs against a
/// consistent pair of ticks — no other writer can interleave a stale update
/// between the book write and the detector read.
pub struct CentralOrderBook {
    books: Mutex<HashMap<UnifiedSymbol, SymbolBook>>,
    detector: ArbitrageDetector,
}

impl CentralOrderBook {
    pub fn new(detector: ArbitrageDetector) -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
            detector,
        }
    }

    /// Apply a new tick and, if both venues now have data for this symbol,
    /// run detection within the same critical section.
    pub fn update(&self, tick: NormalizedTick) -> Option<Opportunity> {
        let mut books = self.books.lock();
        let book = books.entry(tick.symbol.clone()).or_default();
        book.update(tick);

        if !book.has_both() {
            return None;
        }

        let v_stream = book.v_stream.as_ref().unwrap();
        let v_rpc = book.v_rpc.as_ref().unwrap();
        self.detector.detect(v_stream, v_rpc)
    }

    pub fn get_book(&self, symbol: &str) -> Option<SymbolBook> {
        self.books.lock().get(symbol).cloned()
    }

    pub fn symbols(&self) -> Vec<UnifiedSymbol> {
        self.books.lock().keys().cloned().collect()
    }

    /// Snapshot of every tracked symbol's book, for the periodic spread
    /// logger.
    pub fn snapshot(&self) -> HashMap<UnifiedSymbol, SymbolBook> {
        self.books.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(venue: Venue, symbol: &str, yes_ask: rust_decimal::Decimal, no_ask: rust_decimal::Decimal) -> NormalizedTick {
        NormalizedTick {
            venue,
            symbol: symbol.to_string(),
            yes_ask,
            no_ask,
            yes_ask_size: 10,
            no_ask_size: 10,
            ts_venue: 0,
            ts_local: 0,
        }
    }

    #[test]
    fn detects_only_after_both_sides_present() {
        let book = CentralOrderBook::new(ArbitrageDetector::default());
        let first = book.update(tick(Venue::VStream, "SYM", dec!(0.40), dec!(0.55)));
        assert!(first.is_none());

        let second = book.update(tick(Venue::VRpc, "SYM", dec!(0.40), dec!(0.55)));
        assert!(second.is_some());
    }

    #[test]
    fn tracks_multiple_symbols_independently() {
        let book = CentralOrderBook::new(ArbitrageDetector::default());
        book.update(tick(Venue::VStream, "A", dec!(0.40), dec!(0.55)));
        book.update(tick(Venue::VStream, "B", dec!(0.30), dec!(0.60)));
        let mut symbols = book.symbols();
        symbols.sort();
        assert_eq!(symbols, vec!["A".to_string(), "B".to_string()]);
    }
}
