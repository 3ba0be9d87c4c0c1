//! Two-legged order executor.
//! Mission: either both legs fill, or nothing is left exposed — and if
//! that's not possible, say so loudly rather than guess.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::arbitrage::fees::{FeeSide, VRpcFeeSchedule, VStreamFeeSchedule};
use crate::errors::EngineError;
use crate::gateway::{Gateway, OrderRequest, OrderStatus};
use crate::ledger::CapitalAccount;
use crate::model::{ExecutionOutcome, ExecutionResult, LegResult, Opportunity, Side, UnifiedSymbol, Venue};

const ORDER_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const ROLLBACK_PRICE: Decimal = dec!(0.99);

/// Serializes executor runs per symbol so two opportunities for the same
/// contract never race each other's reserve/fill/rollback sequence.
#[derive(Default)]
pub struct SymbolLocks {
    locks: Mutex<HashMap<UnifiedSymbol, Arc<Mutex<()>>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Reserve-both, leg-A, leg-B, commit-or-rollback executor. Rollback is
/// always a hedge on leg-A's venue: opposite side, same filled quantity, at
/// the rollback price, marked as requiring manual intervention and never
/// retried silently.
pub struct Executor {
    gateways: HashMap<Venue, Arc<dyn Gateway>>,
    accounts: HashMap<Venue, Arc<CapitalAccount>>,
    symbol_locks: SymbolLocks,
    v_stream_fees: VStreamFeeSchedule,
    v_rpc_fees: VRpcFeeSchedule,
}

impl Executor {
    pub fn new(
        gateways: HashMap<Venue, Arc<dyn Gateway>>,
        accounts: HashMap<Venue, Arc<CapitalAccount>>,
    ) -> Self {
        Self {
            gateways,
            accounts,
            symbol_locks: SymbolLocks::new(),
            v_stream_fees: VStreamFeeSchedule::default(),
            v_rpc_fees: VRpcFeeSchedule::default(),
        }
    }

    pub async fn execute(&self, opp: Opportunity) -> Result<ExecutionResult, EngineError> {
        let lock = self.symbol_locks.lock_for(&opp.symbol).await;
        let _guard = lock.lock().await;
        self.execute_locked(opp).await
    }

    async fn execute_locked(&self, opp: Opportunity) -> Result<ExecutionResult, EngineError> {
        let quantity = opp.quantity;
        let cost_a = opp.leg_a_price * Decimal::from(quantity);
        let cost_b = opp.leg_b_price * Decimal::from(quantity);

        let account_a = self.account_for(opp.leg_a_venue)?;
        let account_b = self.account_for(opp.leg_b_venue)?;

        if !account_a.reserve(cost_a) {
            return Err(EngineError::InsufficientCapital {
                venue: opp.leg_a_venue,
                needed: cost_a,
                available: account_a.cash_available(),
            });
        }
        if !account_b.reserve(cost_b) {
            account_a.release(cost_a);
            return Err(EngineError::InsufficientCapital {
                venue: opp.leg_b_venue,
                needed: cost_b,
                available: account_b.cash_available(),
            });
        }

        let leg_a_result = self
            .execute_leg(opp.leg_a_venue, &opp.symbol, opp.leg_a_side, opp.leg_a_price, quantity)
            .await;

        let leg_a = match leg_a_result {
            Ok(leg) if leg.filled => leg,
            Ok(leg) => {
                account_a.release(cost_a);
                account_b.release(cost_b);
                return Ok(ExecutionResult {
                    symbol: opp.symbol.clone(),
                    outcome: ExecutionOutcome::FailedNoPosition,
                    leg_a: leg,
                    leg_b: LegResult::unfilled(opp.leg_b_venue, opp.leg_b_side, quantity),
                    hedge: None,
                    total_cost: Decimal::ZERO,
                    actual_fees: Decimal::ZERO,
                    net_profit: Decimal::ZERO,
                    manual_intervention: false,
                    error: Some("leg A did not fill".to_string()),
                    ts: chrono::Utc::now(),
                });
            }
            Err(e) => {
                account_a.release(cost_a);
                account_b.release(cost_b);
                return Err(e);
            }
        };

        let leg_b_result = self
            .execute_leg(opp.leg_b_venue, &opp.symbol, opp.leg_b_side, opp.leg_b_price, quantity)
            .await;

        let leg_b = match leg_b_result {
            Ok(leg) if leg.filled => leg,
            Ok(leg) => {
                account_b.release(cost_b);
                return self
                    .rollback_and_report(opp, leg_a, leg, "leg B did not fill".to_string())
                    .await;
            }
            Err(e) => {
                account_b.release(cost_b);
                warn!(symbol = %opp.symbol, error = %e, "leg B errored, rolling back leg A");
                return self
                    .rollback_and_report(
                        opp,
                        leg_a,
                        LegResult::unfilled(opp.leg_b_venue, opp.leg_b_side, quantity),
                        e.to_string(),
                    )
                    .await;
            }
        };

        account_a.confirm_spend(cost_a);
        account_b.confirm_spend(cost_b);

        let fill_a_price = leg_a.fill_price.unwrap_or(opp.leg_a_price);
        let fill_b_price = leg_b.fill_price.unwrap_or(opp.leg_b_price);
        account_a.add_position(
            &opp.symbol,
            opp.leg_a_side,
            leg_a.filled_quantity,
            fill_a_price * Decimal::from(leg_a.filled_quantity),
        );
        account_b.add_position(
            &opp.symbol,
            opp.leg_b_side,
            leg_b.filled_quantity,
            fill_b_price * Decimal::from(leg_b.filled_quantity),
        );

        let fee_a = self.fee_for(opp.leg_a_venue, fill_a_price, leg_a.filled_quantity);
        let fee_b = self.fee_for(opp.leg_b_venue, fill_b_price, leg_b.filled_quantity);
        let actual_fees = fee_a + fee_b;
        let total_cost =
            fill_a_price * Decimal::from(leg_a.filled_quantity) + fill_b_price * Decimal::from(leg_b.filled_quantity);
        let expected_payout = Decimal::from(quantity);
        let net_profit = expected_payout - total_cost - actual_fees;

        info!(symbol = %opp.symbol, %net_profit, "execution committed");

        Ok(ExecutionResult {
            symbol: opp.symbol.clone(),
            outcome: ExecutionOutcome::Success,
            leg_a,
            leg_b,
            hedge: None,
            total_cost,
            actual_fees,
            net_profit,
            manual_intervention: false,
            error: None,
            ts: chrono::Utc::now(),
        })
    }

    async fn execute_leg(
        &self,
        venue: Venue,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: u64,
    ) -> Result<LegResult, EngineError> {
        let gateway = self.gateway_for(venue)?;
        let ack = gateway
            .place_order(OrderRequest {
                symbol: symbol.to_string(),
                side,
                price,
                quantity,
            })
            .await
            .map_err(|e| EngineError::OrderSubmit {
                venue,
                reason: e.to_string(),
            })?;

        let order_id = ack.order_id.clone();
        let deadline = tokio::time::Instant::now() + ORDER_TIMEOUT;
        let mut last_ack = ack;

        loop {
            match last_ack.status {
                OrderStatus::Filled => {
                    return Ok(LegResult {
                        venue,
                        side,
                        order_id: Some(order_id),
                        requested_quantity: quantity,
                        filled_quantity: last_ack.filled_quantity,
                        fill_price: last_ack.fill_price,
                        filled: true,
                    });
                }
                OrderStatus::Cancelled | OrderStatus::Rejected => {
                    return Ok(LegResult {
                        venue,
                        side,
                        order_id: Some(order_id),
                        requested_quantity: quantity,
                        filled_quantity: last_ack.filled_quantity,
                        fill_price: last_ack.fill_price,
                        filled: false,
                    });
                }
                OrderStatus::Open | OrderStatus::PartiallyFilled => {}
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = gateway.cancel_order(&order_id).await;
                return Ok(LegResult {
                    venue,
                    side,
                    order_id: Some(order_id),
                    requested_quantity: quantity,
                    filled_quantity: last_ack.filled_quantity,
                    fill_price: last_ack.fill_price,
                    filled: false,
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
            last_ack = gateway
                .get_order(&order_id)
                .await
                .map_err(|e| EngineError::OrderSubmit {
                    venue,
                    reason: e.to_string(),
                })?;
        }
    }

    /// Hedge on leg-A's venue, opposite side, same filled quantity, at the
    /// rollback price. Never retried silently; surfaced with a
    /// "MANUAL INTERVENTION REQUIRED" marker if the hedge itself fails.
    async fn rollback_and_report(
        &self,
        opp: Opportunity,
        leg_a: LegResult,
        leg_b: LegResult,
        reason: String,
    ) -> Result<ExecutionResult, EngineError> {
        let account_a = self.account_for(opp.leg_a_venue)?;
        let hedge_quantity = leg_a.filled_quantity;

        // Leg A really filled before leg B failed: confirm its reservation
        // against the real fill and record the position actually held,
        // independent of whether the hedge below succeeds.
        let cost_a = opp.leg_a_price * Decimal::from(leg_a.filled_quantity);
        account_a.confirm_spend(cost_a);
        let fill_a_price = leg_a.fill_price.unwrap_or(opp.leg_a_price);
        account_a.add_position(
            &opp.symbol,
            opp.leg_a_side,
            leg_a.filled_quantity,
            fill_a_price * Decimal::from(leg_a.filled_quantity),
        );
        let fee_a = self.fee_for(opp.leg_a_venue, fill_a_price, leg_a.filled_quantity);

        let hedge_result = self
            .execute_leg(
                opp.leg_a_venue,
                &opp.symbol,
                opp.leg_a_side.opposite(),
                ROLLBACK_PRICE,
                hedge_quantity,
            )
            .await;

        let mut hedge_cost = Decimal::ZERO;
        let mut hedge_fee = Decimal::ZERO;

        let (hedge, manual_intervention, error) = match hedge_result {
            Ok(hedge) if hedge.filled => {
                let fill_price = hedge.fill_price.unwrap_or(ROLLBACK_PRICE);
                hedge_cost = fill_price * Decimal::from(hedge.filled_quantity);
                if account_a.reserve(hedge_cost) {
                    account_a.confirm_spend(hedge_cost);
                } else {
                    error!(
                        symbol = %opp.symbol,
                        %hedge_cost,
                        "insufficient recorded capital for hedge spend; ledger may now understate exposure"
                    );
                }
                account_a.add_position(
                    &opp.symbol,
                    opp.leg_a_side.opposite(),
                    hedge.filled_quantity,
                    hedge_cost,
                );
                hedge_fee = self.fee_for(opp.leg_a_venue, fill_price, hedge.filled_quantity);
                (
                    Some(hedge),
                    false,
                    format!("{reason}; hedged {hedge_quantity} on {:?}", opp.leg_a_venue),
                )
            }
            Ok(hedge) => {
                error!(
                    symbol = %opp.symbol,
                    manual_intervention = true,
                    "hedge order did not fill - MANUAL INTERVENTION REQUIRED"
                );
                (
                    Some(hedge),
                    true,
                    format!("{reason}; hedge failed - MANUAL INTERVENTION REQUIRED"),
                )
            }
            Err(e) => {
                error!(
                    symbol = %opp.symbol,
                    manual_intervention = true,
                    error = %e,
                    "hedge order errored - MANUAL INTERVENTION REQUIRED"
                );
                (
                    None,
                    true,
                    format!("{reason}; hedge errored: {e} - MANUAL INTERVENTION REQUIRED"),
                )
            }
        };

        let total_cost = cost_a + hedge_cost;
        let actual_fees = fee_a + hedge_fee;

        Ok(ExecutionResult {
            symbol: opp.symbol.clone(),
            outcome: ExecutionOutcome::RolledBack,
            leg_a,
            leg_b,
            hedge,
            total_cost,
            actual_fees,
            net_profit: -(total_cost + actual_fees),
            manual_intervention,
            error: Some(error),
            ts: chrono::Utc::now(),
        })
    }

    fn fee_for(&self, venue: Venue, price: Decimal, quantity: u64) -> Decimal {
        match venue {
            Venue::VStream => self.v_stream_fees.fee(FeeSide::Taker, price, quantity),
            Venue::VRpc => self.v_rpc_fees.fee(quantity),
        }
    }

    fn gateway_for(&self, venue: Venue) -> Result<Arc<dyn Gateway>, EngineError> {
        self.gateways
            .get(&venue)
            .cloned()
            .ok_or_else(|| EngineError::InvariantViolation(format!("no gateway registered for {venue:?}")))
    }

    fn account_for(&self, venue: Venue) -> Result<Arc<CapitalAccount>, EngineError> {
        self.accounts
            .get(&venue)
            .cloned()
            .ok_or_else(|| EngineError::InvariantViolation(format!("no capital account registered for {venue:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::gateway::{Balance, OrderAck, OrderRequest as GwOrderRequest, PositionSnapshot, RawEvent};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct MockGateway {
        venue: Venue,
        fill_immediately: bool,
        orders: std::sync::Mutex<HashMap<String, OrderAck>>,
        next_id: AtomicU64,
    }

    impl MockGateway {
        fn new(venue: Venue, fill_immediately: bool) -> Self {
            Self {
                venue,
                fill_immediately,
                orders: std::sync::Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }
        }
    }

    #[async_trait]
    impl Gateway for MockGateway {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn subscribe(&self, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
        async fn unsubscribe(&self, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
        async fn receive(&self) -> Result<RawEvent, TransportError> {
            Err(TransportError::ReceiveTimeout { venue: self.venue })
        }
        async fn place_order(&self, order: GwOrderRequest) -> Result<OrderAck, TransportError> {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
            let status = if self.fill_immediately {
                OrderStatus::Filled
            } else {
                OrderStatus::Rejected
            };
            let ack = OrderAck {
                order_id: id.clone(),
                filled_quantity: if self.fill_immediately { order.quantity } else { 0 },
                fill_price: if self.fill_immediately { Some(order.price) } else { None },
                status,
            };
            self.orders.lock().unwrap().insert(id, ack.clone());
            Ok(ack)
        }
        async fn cancel_order(&self, _order_id: &str) -> Result<(), TransportError> {
            Ok(())
        }
        async fn get_order(&self, order_id: &str) -> Result<OrderAck, TransportError> {
            Ok(self.orders.lock().unwrap().get(order_id).unwrap().clone())
        }
        async fn get_balance(&self) -> Result<Balance, TransportError> {
            Ok(Balance {
                cash_available: Decimal::ZERO,
            })
        }
        async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, TransportError> {
            Ok(vec![])
        }
    }

    fn opp() -> Opportunity {
        Opportunity {
            symbol: "SYM".to_string(),
            leg_a_venue: Venue::VStream,
            leg_a_side: Side::Yes,
            leg_a_price: dec!(0.40),
            leg_b_venue: Venue::VRpc,
            leg_b_side: Side::No,
            leg_b_price: dec!(0.55),
            quantity: 5,
            gross_profit: dec!(0.05),
            fee_a: dec!(0.01),
            fee_b: dec!(0.01),
            slippage_buffer: dec!(0.01),
            net_profit: dec!(0.02),
            ts: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn both_legs_fill_commits_successfully() {
        let mut gateways: HashMap<Venue, Arc<dyn Gateway>> = HashMap::new();
        gateways.insert(Venue::VStream, Arc::new(MockGateway::new(Venue::VStream, true)));
        gateways.insert(Venue::VRpc, Arc::new(MockGateway::new(Venue::VRpc, true)));

        let mut accounts = HashMap::new();
        accounts.insert(Venue::VStream, Arc::new(CapitalAccount::new(dec!(1000))));
        accounts.insert(Venue::VRpc, Arc::new(CapitalAccount::new(dec!(1000))));

        let executor = Executor::new(gateways, accounts);
        let result = executor.execute(opp()).await.unwrap();
        assert_eq!(result.outcome, ExecutionOutcome::Success);
        assert!(!result.manual_intervention);
    }

    #[tokio::test]
    async fn leg_a_no_fill_releases_capital_without_rollback() {
        let mut gateways: HashMap<Venue, Arc<dyn Gateway>> = HashMap::new();
        gateways.insert(Venue::VStream, Arc::new(MockGateway::new(Venue::VStream, false)));
        gateways.insert(Venue::VRpc, Arc::new(MockGateway::new(Venue::VRpc, true)));

        let mut accounts = HashMap::new();
        accounts.insert(Venue::VStream, Arc::new(CapitalAccount::new(dec!(1000))));
        accounts.insert(Venue::VRpc, Arc::new(CapitalAccount::new(dec!(1000))));

        let executor = Executor::new(gateways, accounts);
        let result = executor.execute(opp()).await.unwrap();
        assert_eq!(result.outcome, ExecutionOutcome::FailedNoPosition);
    }

    #[tokio::test]
    async fn leg_b_no_fill_triggers_rollback_hedge() {
        let mut gateways: HashMap<Venue, Arc<dyn Gateway>> = HashMap::new();
        gateways.insert(Venue::VStream, Arc::new(MockGateway::new(Venue::VStream, true)));
        gateways.insert(Venue::VRpc, Arc::new(MockGateway::new(Venue::VRpc, false)));

        let account_a = Arc::new(CapitalAccount::new(dec!(1000)));
        let mut accounts = HashMap::new();
        accounts.insert(Venue::VStream, account_a.clone());
        accounts.insert(Venue::VRpc, Arc::new(CapitalAccount::new(dec!(1000))));

        let executor = Executor::new(gateways, accounts);
        let result = executor.execute(opp()).await.unwrap();
        assert_eq!(result.outcome, ExecutionOutcome::RolledBack);
        assert!(!result.manual_intervention);
        assert!(result.hedge.is_some());

        // Leg A's reservation must be confirmed against its real fill, and
        // the hedge booked against its own spend, not leg A's — never a
        // negative reserved balance.
        assert!(account_a.cash_reserved() >= Decimal::ZERO);
        assert_eq!(account_a.position_qty("SYM", Side::Yes), 5);
        assert_eq!(account_a.position_qty("SYM", Side::No), 5);
    }
}
