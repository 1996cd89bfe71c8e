//! Rovnic retraining daemon
//!
//! `rovnicd run` sweeps every configured sport on a fixed interval: record
//! predictions, measure rolling accuracy, and retrain domains that fell
//! below the threshold. The remaining commands are the operator surface.
//!
//! ## Commands
//!
//! - `run`: start the scheduler (or a single cycle with `--once`)
//! - `summary`: rolling accuracy per domain
//! - `retrain`: force a retraining attempt for one domain
//! - `audit`: retraining audit entries, newest first
//! - `rollback`: re-activate a domain's previous model

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rovnic_core::{
    GameContextSource, ModelPredictionStep, OddsApiClient, OddsFeatureExtractor, PredictionStep,
    RetrainConfig, RetrainService, ServiceBuilder, ServiceStats, Stores,
};
use rovnic_state::SurrealStore;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "rovnicd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Accuracy-driven model retraining for Rovnic sports domains", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Retrain when rolling accuracy falls below this value
    #[arg(long, env = "ACCURACY_THRESHOLD", global = true)]
    accuracy_threshold: Option<f64>,

    /// Rolling accuracy window in days
    #[arg(long, env = "ROLLING_WINDOW_DAYS", global = true)]
    rolling_window_days: Option<u32>,

    /// Resolved outcomes required before a retrain is attempted
    #[arg(long, env = "RETRAINING_MIN_PREDICTIONS", global = true)]
    min_predictions: Option<usize>,

    /// Hours between scheduler cycles
    #[arg(long, env = "REFRESH_INTERVAL_HOURS", global = true)]
    interval_hours: Option<u64>,

    /// Comma-separated domains, in processing order
    #[arg(long, env = "ROVNIC_DOMAINS", value_delimiter = ',', global = true)]
    domains: Option<Vec<String>>,

    /// Upper bound on every store and provider call, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", global = true)]
    request_timeout_secs: Option<u64>,

    /// The Odds API key; without it the prediction step is disabled
    #[arg(long, env = "ODDS_API_KEY", hide_env_values = true, global = true)]
    odds_api_key: Option<String>,

    /// Override the odds provider base URL
    #[arg(long, env = "ODDS_API_BASE_URL", global = true)]
    odds_api_base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the retraining scheduler until SIGINT/SIGTERM
    Run {
        /// Run a single cycle, print its report and exit
        #[arg(long)]
        once: bool,
    },

    /// Show rolling accuracy and the retraining verdict per domain
    Summary,

    /// Force a retraining attempt for one domain
    Retrain {
        /// Domain to retrain (e.g. nba)
        domain: String,
    },

    /// Show retraining audit entries, newest first
    Audit {
        /// Only entries for this domain
        #[arg(short, long)]
        domain: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Re-activate the previous model for a domain
    Rollback {
        /// Domain to roll back
        domain: String,
    },
}

impl Cli {
    /// Defaults overlaid with whatever was given on the command line or in
    /// the environment.
    fn retrain_config(&self) -> RetrainConfig {
        let mut config = RetrainConfig::default();
        if let Some(threshold) = self.accuracy_threshold {
            config.accuracy_threshold = threshold;
        }
        if let Some(days) = self.rolling_window_days {
            config.rolling_window_days = days;
        }
        if let Some(min) = self.min_predictions {
            config.min_predictions_for_retrain = min;
        }
        if let Some(hours) = self.interval_hours {
            config.cycle_interval_hours = hours;
        }
        if let Some(domains) = &self.domains {
            config = config.with_domains(
                domains
                    .iter()
                    .map(|d| d.trim().to_lowercase())
                    .filter(|d| !d.is_empty()),
            );
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rovnic_core::init_tracing(cli.json_logs, level);

    let config = cli.retrain_config();
    config.validate().context("Invalid retraining configuration")?;

    let store = SurrealStore::setup_from_env()
        .await
        .context("Failed to connect to Rovnic database")?;
    let stores = Stores::from_backend(store);
    let stats = Arc::new(ServiceStats::new());

    let mut builder = ServiceBuilder::new(config.clone(), stores.clone()).stats(stats.clone());
    match prediction_step(&cli, &config, &stores, &stats)? {
        Some(step) => builder = builder.prediction_step(step),
        None => warn!("ODDS_API_KEY not set, prediction step disabled"),
    }
    let service = builder
        .build()
        .context("Failed to assemble retraining service")?;

    match cli.command {
        Commands::Run { once: true } => cmd_run_once(&service).await,
        Commands::Run { once: false } => cmd_run(service).await,
        Commands::Summary => cmd_summary(&service).await,
        Commands::Retrain { domain } => cmd_retrain(&service, &domain).await,
        Commands::Audit { domain, limit } => cmd_audit(&service, domain.as_deref(), limit).await,
        Commands::Rollback { domain } => cmd_rollback(&service, &domain).await,
    }
}

/// The odds-backed prediction step, when an API key is configured.
fn prediction_step(
    cli: &Cli,
    config: &RetrainConfig,
    stores: &Stores,
    stats: &Arc<ServiceStats>,
) -> Result<Option<Arc<dyn PredictionStep>>> {
    let Some(api_key) = cli.odds_api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        return Ok(None);
    };
    let mut client = OddsApiClient::new(api_key, config.request_timeout())
        .context("Failed to build odds API client")?;
    if let Some(url) = &cli.odds_api_base_url {
        client = client.with_base_url(url.as_str());
    }
    let games: Arc<dyn GameContextSource> = Arc::new(client);

    Ok(Some(Arc::new(ModelPredictionStep::new(
        games,
        Arc::new(OddsFeatureExtractor),
        stores.registry.clone(),
        stores.outcomes.clone(),
        stats.clone(),
        config.request_timeout(),
    ))))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ========== Scheduler ==========

async fn cmd_run_once(service: &RetrainService) -> Result<()> {
    let (tx, rx) = watch::channel(false);
    spawn_signal_listener(tx)?;

    let report = service.scheduler.run_cycle_until(&rx).await;
    print_json(&report)
}

async fn cmd_run(service: RetrainService) -> Result<()> {
    let (tx, rx) = watch::channel(false);
    spawn_signal_listener(tx)?;

    let cycles = service.scheduler.run_until(rx).await;
    let stats = service.stats.snapshot();
    info!(
        cycles,
        retrains_completed = stats.retrains_completed,
        retrains_failed = stats.retrains_failed,
        "Shutdown complete"
    );
    Ok(())
}

/// Flip `shutdown` on SIGINT (and SIGTERM on unix).
fn spawn_signal_listener(shutdown: watch::Sender<bool>) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received (SIGINT/Ctrl+C)");
                }
                _ = sigterm.recv() => {
                    info!("Shutdown signal received (SIGTERM)");
                }
            }
            let _ = shutdown.send(true);
        });
    }
    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received (SIGINT/Ctrl+C)");
            let _ = shutdown.send(true);
        });
    }
    Ok(())
}

// ========== Operations ==========

async fn cmd_summary(service: &RetrainService) -> Result<()> {
    let summary = service.ops.accuracy_summary().await;
    print_json(&summary)
}

async fn cmd_retrain(service: &RetrainService, domain: &str) -> Result<()> {
    let outcome = service.ops.trigger_retrain(domain).await;
    print_json(&outcome)?;
    if outcome.is_failed() {
        bail!(
            "retraining {} failed: {}",
            domain,
            outcome.reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

async fn cmd_audit(service: &RetrainService, domain: Option<&str>, limit: usize) -> Result<()> {
    let entries = service
        .ops
        .audit_history(domain, limit)
        .await
        .context("Failed to read audit history")?;
    if entries.is_empty() {
        println!("No retraining attempts recorded");
        return Ok(());
    }
    print_json(&entries)
}

async fn cmd_rollback(service: &RetrainService, domain: &str) -> Result<()> {
    let restored = service
        .ops
        .rollback(domain)
        .await
        .with_context(|| format!("rollback failed for {domain}"))?;
    println!(
        "Rolled back {} -> {} (revision {})",
        restored.domain, restored.version, restored.revision
    );
    Ok(())
}
