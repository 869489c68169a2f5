use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtd_reconciler::config::{Config, ConfigError};
use rtd_reconciler::domain::HourBucket;
use rtd_reconciler::feed::{FeedError, FileFeed};
use rtd_reconciler::network::{
    DistanceCache, NetworkHandle, NetworkSnapshot, StationError, StationNetwork, StationTable,
};
use rtd_reconciler::reconcile::{ReconciliationService, ServiceError};
use rtd_reconciler::store::{SqliteDeliveryLog, SqliteRecordStore, StoreError, open_database};

/// Reconcile realtime railway stops into canonical records
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, default_value = "rtd-reconciler.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile a closed range of hours for every configured station
    Backfill {
        /// First hour (YYYY-MM-DDTHH:MM); resumes from the stored data if omitted
        #[arg(long, value_parser = HourBucket::parse)]
        start: Option<HourBucket>,

        /// Hour after the last one reconciled; the current hour if omitted
        #[arg(long, value_parser = HourBucket::parse)]
        end: Option<HourBucket>,
    },
    /// Reconcile stops announced on the delivery log until interrupted
    Follow,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("network snapshot: {0}")]
    Network(#[from] StationError),
    #[error("database: {0}")]
    Store(#[from] StoreError),
    #[error("feed: {0}")]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let config = Config::load(&cli.config)?;

    let snapshot = NetworkSnapshot::load(&config.network_snapshot)?;
    let stations = if config.stations.is_empty() {
        StationTable::new(snapshot.stations.iter().cloned()).names()
    } else {
        config.stations.clone()
    };
    let network = StationNetwork::from_snapshot(&snapshot)?;
    info!(
        nodes = network.graph().node_count(),
        stations = stations.len(),
        "Loaded network"
    );
    let network = NetworkHandle::new(DistanceCache::new(network, &config.distance_cache));

    // Fail fast if storage or feed are unreachable
    let pool = open_database(&config.database_url).await?;
    let feed = FileFeed::new(&config.feed_dir)?;
    let service = ReconciliationService::new(
        feed,
        SqliteRecordStore::new(pool.clone()),
        network.clone(),
        config.service_settings(),
    );

    match cli.command {
        Command::Backfill { start, end } => {
            let start = match start {
                Some(start) => start,
                None => service.resume_start().await?,
            };
            let end =
                end.unwrap_or_else(|| HourBucket::containing(chrono::Local::now().naive_local()));
            let summary = service.backfill(&stations, start, end).await;
            Ok(if summary.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Follow => {
            if let Some(every) = config.follow.network_refresh() {
                // Periodically pick up a new network snapshot
                let snapshot = config.network_snapshot.clone();
                let cache_config = config.distance_cache.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(every);
                    interval.tick().await; // First tick is immediate, skip it
                    loop {
                        interval.tick().await;
                        match network.reload(&snapshot, &cache_config).await {
                            Ok(nodes) => info!(nodes, "Reloaded network"),
                            Err(e) => error!(error = %e, "Failed to reload network"),
                        }
                    }
                });
            }

            let log = SqliteDeliveryLog::new(pool);
            service.follow(&log, shutdown_signal()).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
