//! Capital ledger.
//! Mission: one place that knows how much cash and position each venue
//! holds, so the executor never guesses.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::model::Side;

/// A position in a single contract, folded by weighted average cost on
/// every fill: `new_avg = (old_cost + new_cost) / new_qty`.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub avg_cost: Decimal,
}

impl Position {
    pub fn total_cost(&self) -> Decimal {
        self.avg_cost * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Default)]
struct AccountInner {
    cash_available: Decimal,
    cash_reserved: Decimal,
    positions: HashMap<(String, Side), Position>,
}

/// Cash and position tracker for one venue. `available + reserved` only
/// ever changes via [`Self::confirm_spend`] (a transfer within reserved,
/// never a silent top-up) — see the conservation test below.
pub struct CapitalAccount {
    inner: Mutex<AccountInner>,
}

impl CapitalAccount {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            inner: Mutex::new(AccountInner {
                cash_available: initial_cash,
                cash_reserved: Decimal::ZERO,
                positions: HashMap::new(),
            }),
        }
    }

    pub fn cash_available(&self) -> Decimal {
        self.inner.lock().cash_available
    }

    pub fn cash_reserved(&self) -> Decimal {
        self.inner.lock().cash_reserved
    }

    pub fn cash_total(&self) -> Decimal {
        let inner = self.inner.lock();
        inner.cash_available + inner.cash_reserved
    }

    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.inner.lock().cash_available >= amount
    }

    /// Move `amount` from available to reserved. Fails without mutating
    /// state if there isn't enough available cash.
    pub fn reserve(&self, amount: Decimal) -> bool {
        let mut inner = self.inner.lock();
        if inner.cash_available < amount {
            return false;
        }
        inner.cash_available -= amount;
        inner.cash_reserved += amount;
        true
    }

    /// Return reserved cash to available (order cancelled or rejected).
    pub fn release(&self, amount: Decimal) {
        let mut inner = self.inner.lock();
        inner.cash_reserved -= amount;
        inner.cash_available += amount;
    }

    /// Drop reserved cash permanently (order filled; the cash left the
    /// account for real).
    pub fn confirm_spend(&self, amount: Decimal) {
        self.inner.lock().cash_reserved -= amount;
    }

    pub fn add_position(&self, symbol: &str, side: Side, quantity: u64, cost: Decimal) {
        let mut inner = self.inner.lock();
        let key = (symbol.to_string(), side);
        match inner.positions.get_mut(&key) {
            Some(pos) => {
                let total_qty = pos.quantity + quantity;
                let total_cost = pos.total_cost() + cost;
                pos.quantity = total_qty;
                pos.avg_cost = total_cost / Decimal::from(total_qty);
            }
            None => {
                inner.positions.insert(
                    key,
                    Position {
                        symbol: symbol.to_string(),
                        side,
                        quantity,
                        avg_cost: cost / Decimal::from(quantity),
                    },
                );
            }
        }
    }

    pub fn position_qty(&self, symbol: &str, side: Side) -> u64 {
        self.inner
            .lock()
            .positions
            .get(&(symbol.to_string(), side))
            .map(|p| p.quantity)
            .unwrap_or(0)
    }
}
