//! # mx-runner
//!
//! Connects to the selected exchanges, logs every tick for the configured
//! symbols and reports connection status until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! mx-runner config.json --log-level info
//! mx-runner config.json --exchanges binance,okx --symbols BTCUSDT,ETHUSDT
//! mx-runner --list-exchanges
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use mx_core::types::NormalizedTick;
use mx_feed::{ConnectionManager, ExchangeRegistry, TickCallback};

/// Multi-exchange live ticker runner.
#[derive(Parser)]
#[command(name = "mx-runner", about = "Multi-exchange live ticker runner")]
struct Cli {
    /// Configuration file path (JSON).
    #[arg(required_unless_present = "list_exchanges")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Override the configured exchanges (comma separated).
    #[arg(long, value_delimiter = ',')]
    exchanges: Option<Vec<String>>,

    /// Override the configured symbols (comma separated).
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    /// Print the supported exchanges and exit.
    #[arg(long)]
    list_exchanges: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_exchanges {
        for ex in ExchangeRegistry::new().list() {
            println!("{:<8} {}", ex.id, ex.name);
        }
        return Ok(());
    }
    let Some(config_path) = cli.config else {
        anyhow::bail!("a config file is required");
    };

    // 1. Load configuration, then apply CLI overrides
    let mut config = mx_core::config::load_config(&config_path)?;
    if let Some(exchanges) = cli.exchanges {
        config.exchanges = exchanges;
    }
    if let Some(symbols) = cli.symbols {
        config.symbols = symbols;
    }
    config.validate()?;

    // 2. Initialize logging
    let log_level = cli
        .log_level
        .or_else(|| config.logging.as_ref().and_then(|l| l.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let log_dir = cli.log_dir.or_else(|| config.log_path());
    mx_core::logging::init_logging(&log_level, log_dir.as_deref(), &config.module_name());

    let exchanges = config.normalized_exchanges();
    let symbols = config.normalized_symbols();
    info!(
        "mx-runner starting — config={}, exchanges={exchanges:?}, symbols={symbols:?}",
        config_path.display()
    );

    // 3. Build the manager and subscribe a logger for every symbol
    let manager = ConnectionManager::from_config(&config)?;
    let log_tick: TickCallback = Arc::new(|tick: &NormalizedTick| debug!("{tick}"));
    for symbol in &symbols {
        manager.subscribe(symbol, log_tick.clone());
    }

    manager.connect_to_selected(&exchanges, &symbols)?;
    info!("connecting to {} exchange(s) — press Ctrl+C to stop", exchanges.len());

    // 4. Poll status until shutdown
    let stale_after = config.stale_after_sec.map(Duration::from_secs);
    let mut status_timer = tokio::time::interval(Duration::from_secs(config.status_interval_sec));
    status_timer.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = status_timer.tick() => {
                report_status(&manager);
                if let Some(max_idle) = stale_after {
                    let recycled = manager.reconnect_stale(max_idle);
                    if !recycled.is_empty() {
                        warn!("no data for {}s on {recycled:?}; forced reconnect", max_idle.as_secs());
                    }
                }
                let repaired = manager.repair_closed();
                if !repaired.is_empty() {
                    warn!("reopening closed links {repaired:?}");
                }
            }
        }
    }

    // 5. Tear everything down
    manager.disconnect_all();
    info!("all connections closed — goodbye");
    Ok(())
}

fn report_status(manager: &ConnectionManager) {
    let stats = manager.connection_stats();
    let summary: Vec<String> = stats
        .iter()
        .map(|s| {
            let retry = s.next_retry_delay_ms.map(|ms| format!(" retry in {}s", ms / 1_000)).unwrap_or_default();
            format!("{}={} ticks={}{retry}", s.exchange_id, s.state, s.ticks)
        })
        .collect();
    info!("health {}% | {}", manager.health_score(), summary.join(" | "));
}
