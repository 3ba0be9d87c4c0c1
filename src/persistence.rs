//! Persistence sink.
//! Mission: every detected opportunity, execution attempt, and periodic
//! spread snapshot survives the process, queryable after the fact.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{ExecutionOutcome, ExecutionResult, Opportunity, Side, Venue};

fn dec_to_sql(d: Decimal) -> String {
    d.to_string()
}

fn sql_to_dec(s: String) -> Decimal {
    Decimal::from_str(&s).unwrap_or(Decimal::ZERO)
}

fn venue_to_sql(v: Venue) -> &'static str {
    v.as_str()
}

fn side_to_sql(s: Side) -> &'static str {
    s.as_str()
}

fn outcome_to_sql(o: ExecutionOutcome) -> &'static str {
    match o {
        ExecutionOutcome::Success => "success",
        ExecutionOutcome::RolledBack => "rolled_back",
        ExecutionOutcome::FailedNoPosition => "failed_no_position",
    }
}

/// One row of the periodic spread logger (every tracked symbol, on a fixed
/// interval, regardless of whether an opportunity exists).
#[derive(Debug, Clone)]
pub struct SpreadSnapshot {
    pub symbol: String,
    pub v_stream_yes_ask: Option<Decimal>,
    pub v_stream_no_ask: Option<Decimal>,
    pub v_rpc_yes_ask: Option<Decimal>,
    pub v_rpc_no_ask: Option<Decimal>,
}

/// SQLite sink for opportunities, execution attempts, and spread snapshots.
/// One connection behind a `tokio::sync::Mutex`, WAL mode, a fresh session
/// id stamped on every row so runs never collide in a shared file.
#[derive(Clone)]
pub struct PersistenceSink {
    conn: Arc<Mutex<Connection>>,
    session_id: Uuid,
}

impl PersistenceSink {
    pub fn open(db_path: &str, session_id: Uuid) -> Result<Self> {
        let conn = Connection::open(db_path).context("open persistence db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS opportunities (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                symbol TEXT NOT NULL,
                leg_a_venue TEXT NOT NULL,
                leg_a_side TEXT NOT NULL,
                leg_a_price TEXT NOT NULL,
                leg_b_venue TEXT NOT NULL,
                leg_b_side TEXT NOT NULL,
                leg_b_price TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                gross_profit TEXT NOT NULL,
                net_profit TEXT NOT NULL
            )",
            [],
        )
        .context("create opportunities table")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_opportunities_session_ts ON opportunities(session_id, ts DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                symbol TEXT NOT NULL,
                outcome TEXT NOT NULL,
                total_cost TEXT NOT NULL,
                actual_fees TEXT NOT NULL,
                net_profit TEXT NOT NULL,
                manual_intervention INTEGER NOT NULL,
                error TEXT
            )",
            [],
        )
        .context("create executions table")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_executions_session_ts ON executions(session_id, ts DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_executions_manual_intervention ON executions(manual_intervention)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS spread_snapshots (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                symbol TEXT NOT NULL,
                v_stream_yes_ask TEXT,
                v_stream_no_ask TEXT,
                v_rpc_yes_ask TEXT,
                v_rpc_no_ask TEXT
            )",
            [],
        )
        .context("create spread_snapshots table")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_spread_snapshots_session_ts ON spread_snapshots(session_id, ts DESC)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            session_id,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn record_opportunity(&self, opp: &Opportunity) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO opportunities
             (id, session_id, ts, symbol, leg_a_venue, leg_a_side, leg_a_price,
              leg_b_venue, leg_b_side, leg_b_price, quantity, gross_profit, net_profit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                Uuid::new_v4().to_string(),
                self.session_id.to_string(),
                opp.ts.to_rfc3339(),
                opp.symbol,
                venue_to_sql(opp.leg_a_venue),
                side_to_sql(opp.leg_a_side),
                dec_to_sql(opp.leg_a_price),
                venue_to_sql(opp.leg_b_venue),
                side_to_sql(opp.leg_b_side),
                dec_to_sql(opp.leg_b_price),
                opp.quantity as i64,
                dec_to_sql(opp.gross_profit),
                dec_to_sql(opp.net_profit),
            ],
        )
        .context("insert opportunity")?;
        Ok(())
    }

    pub async fn record_execution(&self, result: &ExecutionResult) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO executions
             (id, session_id, ts, symbol, outcome, total_cost, actual_fees, net_profit, manual_intervention, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                Uuid::new_v4().to_string(),
                self.session_id.to_string(),
                result.ts.to_rfc3339(),
                result.symbol,
                outcome_to_sql(result.outcome),
                dec_to_sql(result.total_cost),
                dec_to_sql(result.actual_fees),
                dec_to_sql(result.net_profit),
                result.manual_intervention as i64,
                result.error,
            ],
        )
        .context("insert execution")?;
        Ok(())
    }

    pub async fn record_spread_snapshot(&self, ts: DateTime<Utc>, snap: &SpreadSnapshot) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO spread_snapshots
             (id, session_id, ts, symbol, v_stream_yes_ask, v_stream_no_ask, v_rpc_yes_ask, v_rpc_no_ask)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Uuid::new_v4().to_string(),
                self.session_id.to_string(),
                ts.to_rfc3339(),
                snap.symbol,
                snap.v_stream_yes_ask.map(dec_to_sql),
                snap.v_stream_no_ask.map(dec_to_sql),
                snap.v_rpc_yes_ask.map(dec_to_sql),
                snap.v_rpc_no_ask.map(dec_to_sql),
            ],
        )
        .context("insert spread snapshot")?;
        Ok(())
    }

    /// Count of `executions` rows flagged `manual_intervention` for this
    /// session, surfaced by the orchestrator's periodic summary log.
    pub async fn manual_intervention_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM executions WHERE session_id = ?1 AND manual_intervention = 1",
            params![self.session_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub async fn total_net_profit(&self) -> Result<Decimal> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT net_profit FROM executions WHERE session_id = ?1 AND outcome = 'success'",
        )?;
        let rows = stmt.query_map(params![self.session_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut total = Decimal::ZERO;
        for row in rows {
            total += sql_to_dec(row?);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionOutcome, LegResult};
    use rust_decimal_macros::dec;

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
            gross_profit: dec!(0.25),
            fee_a: dec!(0.01),
            fee_b: dec!(0.01),
            slippage_buffer: dec!(0.01),
            net_profit: dec!(0.22),
            ts: chrono::Utc::now(),
        }
    }

    fn execution(outcome: ExecutionOutcome, manual: bool) -> ExecutionResult {
        ExecutionResult {
            symbol: "SYM".to_string(),
            outcome,
            leg_a: LegResult::unfilled(Venue::VStream, Side::Yes, 5),
            leg_b: LegResult::unfilled(Venue::VRpc, Side::No, 5),
            hedge: None,
            total_cost: dec!(2.50),
            actual_fees: dec!(0.05),
            net_profit: dec!(0.45),
            manual_intervention: manual,
            error: None,
            ts: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_and_counts_opportunities() {
        let sink = PersistenceSink::open(":memory:", Uuid::new_v4()).unwrap();
        sink.record_opportunity(&opp()).await.unwrap();
        sink.record_opportunity(&opp()).await.unwrap();

        let conn = sink.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM opportunities", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn tracks_manual_intervention_count() {
        let sink = PersistenceSink::open(":memory:", Uuid::new_v4()).unwrap();
        sink.record_execution(&execution(ExecutionOutcome::Success, false))
            .await
            .unwrap();
        sink.record_execution(&execution(ExecutionOutcome::RolledBack, true))
            .await
            .unwrap();

        assert_eq!(sink.manual_intervention_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_spread_snapshot() {
        let sink = PersistenceSink::open(":memory:", Uuid::new_v4()).unwrap();
        let snap = SpreadSnapshot {
            symbol: "SYM".to_string(),
            v_stream_yes_ask: Some(dec!(0.40)),
            v_stream_no_ask: Some(dec!(0.55)),
            v_rpc_yes_ask: None,
            v_rpc_no_ask: None,
        };
        sink.record_spread_snapshot(chrono::Utc::now(), &snap)
            .await
            .unwrap();

        let conn = sink.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM spread_snapshots", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
