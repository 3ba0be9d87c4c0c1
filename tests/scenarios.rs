//! End-to-end scenario tests (literal inputs -> expected outputs).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use parity_arb::arbitrage::detector::ArbitrageDetector;
use parity_arb::config::{ExecutionConfig, RunMode};
use parity_arb::errors::TransportError;
use parity_arb::executor::Executor;
use parity_arb::gate::{OpportunityGate, RejectReason};
use parity_arb::gateway::{Balance, Gateway, OrderAck, OrderRequest, OrderStatus, PositionSnapshot, RawEvent};
use parity_arb::ledger::CapitalAccount;
use parity_arb::model::{ExecutionOutcome, NormalizedTick, Side, Venue};
use parity_arb::queue::{BoundedEventQueue, OverflowPolicy};

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

/// S1: clear arb between 0.40/0.60 (V-Stream) and 0.55/0.43 (V-RPC).
#[test]
fn s1_clear_arb() {
    let detector = ArbitrageDetector::default();
    let v_stream = tick(Venue::VStream, "SYM", dec!(0.40), dec!(0.60));
    let v_rpc = tick(Venue::VRpc, "SYM", dec!(0.55), dec!(0.43));

    let opp = detector.detect(&v_stream, &v_rpc).expect("expected an opportunity");

    assert_eq!(opp.leg_a_venue, Venue::VStream);
    assert_eq!(opp.leg_a_side, Side::Yes);
    assert_eq!(opp.leg_a_price, dec!(0.40));
    assert_eq!(opp.leg_b_venue, Venue::VRpc);
    assert_eq!(opp.leg_b_side, Side::No);
    assert_eq!(opp.leg_b_price, dec!(0.43));
    assert_eq!(opp.gross_profit, dec!(0.17));
    assert_eq!(opp.fee_a, dec!(0.02));
    assert_eq!(opp.fee_b, dec!(0.01));
    assert_eq!(opp.net_profit, dec!(0.13));
}

/// S2: both venues quote 0.52/0.49 — parity sums to 1.01, no arb on either pairing.
#[test]
fn s2_no_arb() {
    let detector = ArbitrageDetector::default();
    let v_stream = tick(Venue::VStream, "SYM", dec!(0.52), dec!(0.49));
    let v_rpc = tick(Venue::VRpc, "SYM", dec!(0.52), dec!(0.49));

    assert!(detector.detect(&v_stream, &v_rpc).is_none());
}

fn execution_config(max_capital: Decimal, max_stale_seconds: f64) -> ExecutionConfig {
    ExecutionConfig {
        mode: RunMode::Dry,
        max_capital_per_market: max_capital,
        max_contracts_per_event: 100,
        min_net_profit: Decimal::ZERO,
        max_stale_seconds,
    }
}

fn gate_with_balances(
    config: ExecutionConfig,
    v_stream_cash: Decimal,
    v_rpc_cash: Decimal,
) -> OpportunityGate {
    let mut accounts = HashMap::new();
    accounts.insert(Venue::VStream, Arc::new(CapitalAccount::new(v_stream_cash)));
    accounts.insert(Venue::VRpc, Arc::new(CapitalAccount::new(v_rpc_cash)));
    OpportunityGate::new(ArbitrageDetector::default(), accounts, config)
}

/// S3: S1's ticks, but the gate has never observed a fresh V-Stream tick
/// within `max_stale_seconds` — rejected as stale.
#[tokio::test]
async fn s3_stale_kills_arb() {
    let detector = ArbitrageDetector::default();
    let v_stream = tick(Venue::VStream, "SYM", dec!(0.40), dec!(0.60));
    let v_rpc = tick(Venue::VRpc, "SYM", dec!(0.55), dec!(0.43));
    let opp = detector.detect(&v_stream, &v_rpc).unwrap();

    let gate = gate_with_balances(execution_config(dec!(1000), 0.05), dec!(1000), dec!(1000));
    // V-Stream's tick ages past the 50ms staleness bound before V-RPC's
    // fresh tick arrives, mirroring S3's "10s old against a 5s bound".
    gate.staleness_tracker().record(Venue::VStream, &opp.symbol);
    tokio::time::sleep(Duration::from_millis(60)).await;
    gate.staleness_tracker().record(Venue::VRpc, &opp.symbol);

    let result = gate.evaluate(&opp);
    assert!(matches!(
        result,
        Err(RejectReason::StaleTick { venue: Venue::VStream, .. })
    ));
}

/// S4: S1's opportunity with `max_capital_per_market = $2.00` caps quantity
/// at `floor(2.00 / (0.40 + 0.43)) = 2`.
#[test]
fn s4_capital_caps_size() {
    let detector = ArbitrageDetector::default();
    let v_stream = tick(Venue::VStream, "SYM", dec!(0.40), dec!(0.60));
    let v_rpc = tick(Venue::VRpc, "SYM", dec!(0.55), dec!(0.43));
    let opp = detector.detect(&v_stream, &v_rpc).unwrap();

    let gate = gate_with_balances(execution_config(dec!(2.00), 5.0), dec!(1000), dec!(1000));
    gate.staleness_tracker().record(Venue::VStream, &opp.symbol);
    gate.staleness_tracker().record(Venue::VRpc, &opp.symbol);

    let sized = gate.evaluate(&opp).expect("should size and accept");
    assert_eq!(sized.quantity, 2);
}

/// S5: leg A fills (5 YES @ 0.40 on V-Stream), leg B is rejected on V-RPC.
/// Expect the leg-B reservation released, a 5-contract NO hedge at 0.99 on
/// V-Stream, and a rolled-back, non-fatal result.
struct ScriptedGateway {
    venue: Venue,
    fills: bool,
    orders: std::sync::Mutex<HashMap<String, OrderAck>>,
    next_id: AtomicU64,
    placed: std::sync::Mutex<Vec<OrderRequest>>,
}

impl ScriptedGateway {
    fn new(venue: Venue, fills: bool) -> Self {
        Self {
            venue,
            fills,
            orders: std::sync::Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            placed: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }
    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
    async fn subscribe(&self, _ticker_or_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
    async fn unsubscribe(&self, _ticker_or_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
    async fn receive(&self) -> Result<RawEvent, TransportError> {
        Err(TransportError::ReceiveTimeout { venue: self.venue })
    }
    async fn place_order(&self, order: OrderRequest) -> Result<OrderAck, TransportError> {
        self.placed.lock().unwrap().push(order.clone());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let ack = OrderAck {
            order_id: id.clone(),
            filled_quantity: if self.fills { order.quantity } else { 0 },
            fill_price: if self.fills { Some(order.price) } else { None },
            status: if self.fills { OrderStatus::Filled } else { OrderStatus::Rejected },
        };
        self.orders.lock().unwrap().insert(id, ack.clone());
        Ok(ack)
    }
    async fn cancel_order(&self, _order_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
    async fn get_order(&self, order_id: &str) -> Result<OrderAck, TransportError> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned().unwrap())
    }
    async fn get_balance(&self) -> Result<Balance, TransportError> {
        Ok(Balance { cash_available: Decimal::ZERO })
    }
    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, TransportError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn s5_leg_b_fails_triggers_rollback_hedge() {
    let v_stream_gateway = Arc::new(ScriptedGateway::new(Venue::VStream, true));
    let v_rpc_gateway = Arc::new(ScriptedGateway::new(Venue::VRpc, false));

    let mut gateways: HashMap<Venue, Arc<dyn Gateway>> = HashMap::new();
    gateways.insert(Venue::VStream, v_stream_gateway.clone());
    gateways.insert(Venue::VRpc, v_rpc_gateway.clone());

    let mut accounts = HashMap::new();
    accounts.insert(Venue::VStream, Arc::new(CapitalAccount::new(dec!(1000))));
    accounts.insert(Venue::VRpc, Arc::new(CapitalAccount::new(dec!(1000))));

    let executor = Executor::new(gateways, accounts);

    let opp = parity_arb::model::Opportunity {
        symbol: "SYM".to_string(),
        leg_a_venue: Venue::VStream,
        leg_a_side: Side::Yes,
        leg_a_price: dec!(0.40),
        leg_b_venue: Venue::VRpc,
        leg_b_side: Side::No,
        leg_b_price: dec!(0.43),
        quantity: 5,
        gross_profit: dec!(0.85),
        fee_a: dec!(0.05),
        fee_b: dec!(0.05),
        slippage_buffer: dec!(0.05),
        net_profit: dec!(0.70),
        ts: chrono::Utc::now(),
    };

    let result = executor.execute(opp).await.unwrap();

    assert_eq!(result.outcome, ExecutionOutcome::RolledBack);
    assert!(!result.manual_intervention);

    let hedge = result.hedge.expect("expected a hedge order result");
    assert_eq!(hedge.side, Side::No);
    assert_eq!(hedge.venue, Venue::VStream);
    assert_eq!(hedge.filled_quantity, 5);

    let placed = v_stream_gateway.placed.lock().unwrap();
    let hedge_order = placed.last().expect("expected leg A plus hedge orders placed");
    assert_eq!(hedge_order.side, Side::No);
    assert_eq!(hedge_order.price, dec!(0.99));
    assert_eq!(hedge_order.quantity, 5);
}

/// S6: capacity-3 DROP_OLDEST queue, producer puts 1..=5 with no consumer
/// draining in between. Expect [3, 4, 5] left and `dropped == 2`.
#[tokio::test]
async fn s6_queue_drop_oldest_under_burst() {
    let queue: BoundedEventQueue<i32> = BoundedEventQueue::new(3, OverflowPolicy::DropOldest);
    for i in 1..=5 {
        queue.put(i, None).await.unwrap();
    }

    let mut remaining = Vec::new();
    while let Some(v) = queue.try_get() {
        remaining.push(v);
    }

    assert_eq!(remaining, vec![3, 4, 5]);
    assert_eq!(queue.stats().dropped, 2);
}
