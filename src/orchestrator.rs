//! Monitoring orchestrator.
//! Mission: wire gateways through normalization into the book, gate and
//! execute what clears, and keep a running count of what happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::arbitrage::detector::ArbitrageDetector;
use crate::book::CentralOrderBook;
use crate::config::ExecutionConfig;
use crate::executor::Executor;
use crate::gate::{OpportunityGate, RejectReason};
use crate::gateway::{Gateway, RawEvent};
use crate::ledger::CapitalAccount;
use crate::model::Venue;
use crate::normalize::Normalizer;
use crate::persistence::{PersistenceSink, SpreadSnapshot};
use crate::queue::{BoundedEventQueue, OverflowPolicy};

/// Per-venue capacity for the producer/consumer queue sitting between a
/// gateway's `receive` loop and normalization. Market data is
/// time-decaying, so a slow consumer should see fresher events, not a
/// growing backlog of stale ones.
const FEED_QUEUE_CAPACITY: usize = 4096;

/// Running counters mirroring the reference monitor's
/// `opportunities_detected` / `_valid` / `_stale` tallies.
#[derive(Default)]
pub struct MonitorStats {
    pub detected: AtomicU64,
    pub valid: AtomicU64,
    pub stale: AtomicU64,
    pub executed: AtomicU64,
    pub rolled_back: AtomicU64,
}

impl MonitorStats {
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.detected.load(Ordering::Relaxed),
            self.valid.load(Ordering::Relaxed),
            self.stale.load(Ordering::Relaxed),
            self.executed.load(Ordering::Relaxed),
            self.rolled_back.load(Ordering::Relaxed),
        )
    }
}

/// Connects both venues, subscribes to every mapped contract, and runs the
/// detect → gate → execute → persist pipeline until told to stop.
pub struct ArbitrageMonitor {
    gateways: Vec<(Venue, Arc<dyn Gateway>)>,
    normalizers: Vec<(Venue, Arc<dyn Normalizer>)>,
    book: Arc<CentralOrderBook>,
    gate: Arc<OpportunityGate>,
    executor: Arc<Executor>,
    persistence: PersistenceSink,
    config: ExecutionConfig,
    stats: Arc<MonitorStats>,
    spread_log_interval: Duration,
}

impl ArbitrageMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateways: Vec<(Venue, Arc<dyn Gateway>)>,
        normalizers: Vec<(Venue, Arc<dyn Normalizer>)>,
        accounts: std::collections::HashMap<Venue, Arc<CapitalAccount>>,
        config: ExecutionConfig,
        persistence: PersistenceSink,
        spread_log_interval: Duration,
    ) -> Self {
        let detector = ArbitrageDetector::new(
            Default::default(),
            Default::default(),
            rust_decimal_macros::dec!(0.01),
            config.min_net_profit,
        );
        let book = Arc::new(CentralOrderBook::new(detector.clone()));
        let gate = Arc::new(OpportunityGate::new(detector, accounts.clone(), config.clone()));
        let gateway_map: std::collections::HashMap<Venue, Arc<dyn Gateway>> =
            gateways.iter().cloned().collect();
        let executor = Arc::new(Executor::new(gateway_map, accounts));

        Self {
            gateways,
            normalizers,
            book,
            gate,
            executor,
            persistence,
            config,
            stats: Arc::new(MonitorStats::default()),
            spread_log_interval,
        }
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.stats.clone()
    }

    /// Connect every gateway, subscribe to every contract it reports, and
    /// run the feed-processing and periodic-logging tasks for
    /// `duration`, or forever if `None`.
    pub async fn run(&self, symbol_map: &crate::config::SymbolMap, duration: Option<Duration>) -> anyhow::Result<()> {
        info!(mode = ?self.config.mode, "arbitrage monitor starting");

        for (venue, gateway) in &self.gateways {
            gateway.connect().await?;
            for mapping in symbol_map.mappings() {
                let ticker = match venue {
                    Venue::VStream => mapping.venue_a_ticker.clone(),
                    Venue::VRpc => mapping.venue_b_yes_id.clone(),
                };
                gateway.subscribe(&ticker).await?;
                if *venue == Venue::VRpc {
                    gateway.subscribe(&mapping.venue_b_no_id).await?;
                }
            }
        }

        let mut handles = Vec::new();
        for (venue, gateway) in self.gateways.clone() {
            let normalizer = self
                .normalizers
                .iter()
                .find(|(v, _)| *v == venue)
                .map(|(_, n)| n.clone())
                .expect("every gateway has a matching normalizer");
            let monitor = self.clone_handles();
            handles.push(tokio::spawn(async move {
                monitor.process_feed(venue, gateway, normalizer).await;
            }));
        }

        let logger = self.clone_handles();
        let log_interval = self.spread_log_interval;
        handles.push(tokio::spawn(async move {
            logger.log_spreads_periodic(log_interval).await;
        }));

        match duration {
            Some(d) => {
                tokio::time::sleep(d).await;
                info!("run duration elapsed, stopping");
            }
            None => {
                futures_util::future::pending::<()>().await;
            }
        }

        for handle in handles {
            handle.abort();
        }

        Ok(())
    }

    /// Cheap clone of the handles a background task needs, without requiring
    /// the whole monitor (and its non-`Clone` gateway trait objects list) to
    /// implement `Clone`.
    fn clone_handles(&self) -> MonitorHandles {
        MonitorHandles {
            book: self.book.clone(),
            gate: self.gate.clone(),
            executor: self.executor.clone(),
            persistence: self.persistence.clone(),
            stats: self.stats.clone(),
            mode: self.config.mode,
        }
    }

    /// A producer task drains the gateway's `receive()` stream into a
    /// bounded queue; a separate consumer task normalizes and processes
    /// from that queue. This decouples the feed's arrival rate from
    /// however long detection/gating/execution takes to run, per event.
    async fn process_feed(&self, venue: Venue, gateway: Arc<dyn Gateway>, normalizer: Arc<dyn Normalizer>) {
        let queue = Arc::new(BoundedEventQueue::<RawEvent>::new(
            FEED_QUEUE_CAPACITY,
            OverflowPolicy::DropOldest,
        ));

        let producer_queue = queue.clone();
        let producer = tokio::spawn(async move {
            loop {
                match gateway.receive().await {
                    Ok(event) => {
                        let _ = producer_queue.put(event, None).await;
                    }
                    Err(e) => {
                        warn!(venue = venue.as_str(), error = %e, "gateway receive failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let handles = self.clone_handles();
        loop {
            let event = queue.get().await;
            handles.handle_event(venue, &normalizer, event).await;
            if producer.is_finished() {
                break;
            }
        }
    }
}

/// Everything a spawned task needs, decoupled from the `ArbitrageMonitor`
/// struct itself so the gateway/normalizer `Vec`s don't need `Clone`.
#[derive(Clone)]
struct MonitorHandles {
    book: Arc<CentralOrderBook>,
    gate: Arc<OpportunityGate>,
    executor: Arc<Executor>,
    persistence: PersistenceSink,
    stats: Arc<MonitorStats>,
    mode: crate::config::RunMode,
}

impl MonitorHandles {
    async fn handle_event(&self, venue: Venue, normalizer: &Arc<dyn Normalizer>, event: RawEvent) {
        let tick = match normalizer.normalize(event) {
            Ok(Some(tick)) => tick,
            Ok(None) => return,
            Err(e) => {
                warn!(venue = venue.as_str(), error = %e, "normalization rejected message");
                return;
            }
        };

        self.gate.staleness_tracker().record(tick.venue, &tick.symbol);

        if let Some(opp) = self.book.update(tick) {
            self.handle_opportunity(opp).await;
        }
    }

    async fn handle_opportunity(&self, opp: crate::model::Opportunity) {
        self.stats.detected.fetch_add(1, Ordering::Relaxed);

        let sized = match self.gate.evaluate(&opp) {
            Ok(sized) => sized,
            Err(RejectReason::StaleTick { venue, age_ms }) => {
                self.stats.stale.fetch_add(1, Ordering::Relaxed);
                warn!(symbol = %opp.symbol, venue = venue.as_str(), age_ms, "opportunity stale, dropping");
                return;
            }
            Err(_) => return,
        };

        self.stats.valid.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.persistence.record_opportunity(&sized).await {
            warn!(error = %e, "failed to persist opportunity");
        }

        if self.mode == crate::config::RunMode::Dry {
            info!(
                symbol = %sized.symbol,
                quantity = sized.quantity,
                net_profit = %sized.net_profit,
                "[DRY] would execute"
            );
            return;
        }

        match self.executor.execute(sized).await {
            Ok(result) => {
                match result.outcome {
                    crate::model::ExecutionOutcome::Success => {
                        self.stats.executed.fetch_add(1, Ordering::Relaxed);
                        info!(symbol = %result.symbol, net_profit = %result.net_profit, "executed");
                    }
                    crate::model::ExecutionOutcome::RolledBack => {
                        self.stats.rolled_back.fetch_add(1, Ordering::Relaxed);
                        if result.manual_intervention {
                            warn!(symbol = %result.symbol, "MANUAL INTERVENTION REQUIRED after rollback");
                        }
                    }
                    crate::model::ExecutionOutcome::FailedNoPosition => {
                        info!(symbol = %result.symbol, "no position taken, leg A never filled");
                    }
                }
                if let Err(e) = self.persistence.record_execution(&result).await {
                    warn!(error = %e, "failed to persist execution result");
                }
            }
            Err(e) => {
                warn!(error = %e, "execution attempt errored before completion");
            }
        }
    }

    async fn log_spreads_periodic(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for (symbol, book) in self.book.snapshot() {
                let snap = SpreadSnapshot {
                    symbol: symbol.clone(),
                    v_stream_yes_ask: book.v_stream.as_ref().map(|t| t.yes_ask),
                    v_stream_no_ask: book.v_stream.as_ref().map(|t| t.no_ask),
                    v_rpc_yes_ask: book.v_rpc.as_ref().map(|t| t.yes_ask),
                    v_rpc_no_ask: book.v_rpc.as_ref().map(|t| t.no_ask),
                };
                if let Err(e) = self.persistence.record_spread_snapshot(chrono::Utc::now(), &snap).await {
                    warn!(error = %e, "failed to persist spread snapshot");
                }
            }

            let (detected, valid, stale, executed, rolled_back) = self.stats.snapshot();
            info!(detected, valid, stale, executed, rolled_back, "spread logger tick");
        }
    }
}
