//! Cross-venue binary-event-contract arbitrage engine.
//! Connects V-Stream and V-RPC, monitors mapped contracts, and either logs
//! (`--mode dry`) or trades (`--mode live`) the parity gaps it finds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use parity_arb::config::{ExecutionConfig, RunMode, SymbolMap};
use parity_arb::errors::ConfigError;
use parity_arb::gateway::{Gateway, VRpcGateway, VStreamGateway};
use parity_arb::ledger::CapitalAccount;
use parity_arb::model::Venue;
use parity_arb::normalize::{Normalizer, VRpcNormalizer, VStreamNormalizer};
use parity_arb::orchestrator::ArbitrageMonitor;
use parity_arb::persistence::PersistenceSink;

/// Cross-venue binary-event-contract arbitrage engine.
#[derive(Parser, Debug)]
#[command(name = "parity-arb", version, about)]
struct Cli {
    /// How long to run before exiting, in seconds. Runs forever if omitted.
    #[arg(long)]
    duration: Option<u64>,

    /// Seconds between periodic spread-snapshot log entries.
    #[arg(long, default_value_t = 30.0)]
    log_interval: f64,

    /// Overrides the symbol-mapped execution config's run mode.
    #[arg(long, value_enum)]
    mode: Option<CliRunMode>,

    /// Path to the execution config JSON file.
    #[arg(long, env = "PARITY_ARB_EXECUTION_CONFIG", default_value = "config/execution.json")]
    execution_config: String,

    /// Path to the symbol map JSON file.
    #[arg(long, env = "PARITY_ARB_SYMBOL_MAP", default_value = "config/symbols.json")]
    symbol_map: String,

    /// Path to the SQLite persistence database.
    #[arg(long, env = "PARITY_ARB_DB_PATH", default_value = "parity_arb.db")]
    db_path: String,

    /// V-Stream WebSocket URL (market data).
    #[arg(long, env = "V_STREAM_WS_URL", default_value = "wss://v-stream.example.com/ws")]
    v_stream_url: String,

    /// V-Stream REST base URL (order management).
    #[arg(long, env = "V_STREAM_REST_URL", default_value = "https://v-stream.example.com/v1")]
    v_stream_rest_url: String,

    #[arg(long, env = "V_STREAM_TOKEN")]
    v_stream_token: Option<String>,

    /// V-RPC REST base URL.
    #[arg(long, env = "V_RPC_BASE_URL", default_value = "https://v-rpc.example.com/v1")]
    v_rpc_url: String,

    #[arg(long, env = "V_RPC_TOKEN")]
    v_rpc_token: Option<String>,

    /// Starting cash available on the V-Stream venue account.
    #[arg(long, default_value = "0")]
    v_stream_balance: Decimal,

    /// Starting cash available on the V-RPC venue account.
    #[arg(long, default_value = "0")]
    v_rpc_balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliRunMode {
    Dry,
    Live,
}

impl From<CliRunMode> for RunMode {
    fn from(value: CliRunMode) -> Self {
        match value {
            CliRunMode::Dry => RunMode::Dry,
            CliRunMode::Live => RunMode::Live,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => std::process::ExitCode::from(0),
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            // `.context(...)` wraps the original error, so the `ConfigError`
            // (if any) sits further down the cause chain, not at the top.
            match e.chain().find_map(|cause| cause.downcast_ref::<ConfigError>()) {
                Some(_) => std::process::ExitCode::from(1),
                None => std::process::ExitCode::from(2),
            }
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut execution_config = ExecutionConfig::load(&cli.execution_config)
        .context("loading execution config")?;
    if let Some(mode) = cli.mode {
        execution_config.mode = mode.into();
    }

    let symbol_map = Arc::new(
        SymbolMap::load(&cli.symbol_map).context("loading symbol map")?,
    );

    let session_id = Uuid::new_v4();
    let persistence = PersistenceSink::open(&cli.db_path, session_id).context("opening persistence db")?;

    info!(
        mode = ?execution_config.mode,
        mappings = symbol_map.mappings().len(),
        session_id = %session_id,
        "starting arbitrage engine"
    );

    let v_stream_gateway: Arc<dyn Gateway> = Arc::new(VStreamGateway::new(
        cli.v_stream_url,
        cli.v_stream_rest_url,
        cli.v_stream_token,
    ));
    let v_rpc_gateway: Arc<dyn Gateway> = Arc::new(VRpcGateway::new(cli.v_rpc_url, cli.v_rpc_token));

    let gateways: Vec<(Venue, Arc<dyn Gateway>)> = vec![
        (Venue::VStream, v_stream_gateway),
        (Venue::VRpc, v_rpc_gateway),
    ];

    let normalizers: Vec<(Venue, Arc<dyn Normalizer>)> = vec![
        (Venue::VStream, Arc::new(VStreamNormalizer::new(symbol_map.clone()))),
        (Venue::VRpc, Arc::new(VRpcNormalizer::new(symbol_map.clone()))),
    ];

    let mut accounts: HashMap<Venue, Arc<CapitalAccount>> = HashMap::new();
    accounts.insert(Venue::VStream, Arc::new(CapitalAccount::new(cli.v_stream_balance)));
    accounts.insert(Venue::VRpc, Arc::new(CapitalAccount::new(cli.v_rpc_balance)));

    let monitor = ArbitrageMonitor::new(
        gateways,
        normalizers,
        accounts,
        execution_config,
        persistence,
        Duration::from_secs_f64(cli.log_interval),
    );

    let duration = cli.duration.map(Duration::from_secs);
    monitor.run(&symbol_map, duration).await?;

    let (detected, valid, stale, executed, rolled_back) = monitor.stats().snapshot();
    info!(detected, valid, stale, executed, rolled_back, "arbitrage engine stopped");

    Ok(())
}
