//! playtrail-tracker - Main entry point
//!
//! `run` (the default) polls Spotify until interrupted. `stats` and `recent`
//! read the stored history and need no credentials.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use playtrail_common::config::{default_config_path, TomlConfig};
use playtrail_common::db::{self, history};
use playtrail_common::human_time::format_listening_time;
use playtrail_common::stats::{self, Metric, StatsRequest};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playtrail_tracker::config::{BaseConfig, ConfigOverrides, TrackerConfig};
use playtrail_tracker::provider::SpotifyClient;
use playtrail_tracker::queue_advisor::{QueueAdvisor, QueueRules};
use playtrail_tracker::reporter::ErrorLog;
use playtrail_tracker::store::SqliteHistoryStore;
use playtrail_tracker::{PollIntervals, Poller};

/// Command-line arguments for playtrail-tracker
#[derive(Parser, Debug)]
#[command(name = "playtrail-tracker")]
#[command(about = "Listening history tracker for Spotify")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "PLAYTRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(short, long, env = "PLAYTRAIL_DATABASE")]
    database: Option<PathBuf>,

    /// Path to the queue rules JSON file
    #[arg(long, env = "PLAYTRAIL_QUEUE_RULES")]
    queue_rules: Option<PathBuf>,

    /// Spotify application client id
    #[arg(long, env = "PLAYTRAIL_SPOTIFY_CLIENT_ID")]
    client_id: Option<String>,

    /// Spotify application client secret
    #[arg(long, env = "PLAYTRAIL_SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Spotify refresh token
    #[arg(long, env = "PLAYTRAIL_SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PLAYTRAIL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print stats and recent plays as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll playback and record history (default)
    Run,

    /// Listening statistics from the stored history
    Stats {
        #[arg(value_enum)]
        metric: StatsMetric,

        /// Artist name; repeat for up to three
        #[arg(short, long = "artist")]
        artists: Vec<String>,

        /// Track name prefix (requires an artist)
        #[arg(short, long)]
        track: Option<String>,

        /// Start date (YYYY-MM-DD, optionally with HH:MM[:SS])
        #[arg(long)]
        start: Option<String>,

        /// End date, inclusive of the whole day when no time is given
        #[arg(long)]
        end: Option<String>,

        #[arg(short, long)]
        limit: Option<i64>,

        /// Top-list breakdown when no artist is given: artists or tracks
        #[arg(long = "type")]
        breakdown: Option<String>,
    },

    /// Most recent plays
    Recent {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatsMetric {
    Streams,
    Duration,
    Total,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_path: self.database.clone(),
            queue_rules_path: self.queue_rules.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("playtrail_tracker={0},playtrail_common={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let file_config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load config file {}", config_path.display()))?;
    let overrides = args.overrides();
    let base = BaseConfig::resolve(&overrides, &file_config);

    init_tracing(&base.log_level);
    info!("Config file: {}", config_path.display());
    info!("Database: {}", base.database_path.display());

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config = TrackerConfig::resolve(&overrides, &file_config)?;
            run(config).await
        }
        Command::Stats {
            metric,
            artists,
            track,
            start,
            end,
            limit,
            breakdown,
        } => {
            let request = StatsRequest {
                artists,
                track,
                start,
                end,
                limit,
                breakdown,
            };
            print_stats(&base, metric, &request, args.json).await
        }
        Command::Recent { limit } => print_recent(&base, limit, args.json).await,
    }
}

async fn run(config: TrackerConfig) -> Result<()> {
    info!("Starting playtrail tracker");

    let pool = db::init_database(&config.base.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let rules = QueueRules::load(&config.base.queue_rules_path)?;
    let provider =
        SpotifyClient::new(config.credentials.clone()).context("Failed to create Spotify client")?;

    let poller = Poller::new(
        Arc::new(provider),
        Arc::new(SqliteHistoryStore::new(pool.clone())),
        Arc::new(ErrorLog::new(pool.clone())),
        QueueAdvisor::new(rules),
        PollIntervals::from(&config.base.poll),
    );

    let cancel = CancellationToken::new();
    let poll_task = tokio::spawn(poller.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();
    poll_task.await.context("Poll task panicked")?;

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn print_stats(
    base: &BaseConfig,
    metric: StatsMetric,
    request: &StatsRequest,
    json: bool,
) -> Result<()> {
    let pool = db::init_database(&base.database_path)
        .await
        .context("Failed to open database")?;

    match metric {
        StatsMetric::Total => {
            let query = stats::compile_total(request.start.as_deref(), request.end.as_deref())?;
            let total = stats::run_total(&pool, &query).await?;
            if json {
                println!("{}", serde_json::json!({ "total_ms": total }));
            } else {
                println!("{}", format_listening_time(total));
            }
        }
        StatsMetric::Streams | StatsMetric::Duration => {
            let metric = match metric {
                StatsMetric::Streams => Metric::Streams,
                _ => Metric::Duration,
            };
            let query = request.compile(metric)?;
            let rows = stats::run_stats(&pool, &query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                pool.close().await;
                return Ok(());
            }
            if rows.is_empty() {
                println!("No matching plays.");
            }
            for row in rows {
                let label = match (&row.artists, &row.track_name) {
                    (Some(artists), Some(track)) => format!("{} - {}", artists, track),
                    (Some(artists), None) => artists.clone(),
                    (None, Some(track)) => track.clone(),
                    (None, None) => String::new(),
                };
                println!("{}\t{}", row.display_value(metric), label);
            }
        }
    }

    pool.close().await;
    Ok(())
}

async fn print_recent(base: &BaseConfig, limit: i64, json: bool) -> Result<()> {
    let pool = db::init_database(&base.database_path)
        .await
        .context("Failed to open database")?;

    let records = history::recent_records(&pool, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            let artists: Vec<&str> = std::iter::once(record.artist1.as_str())
                .chain(record.artist2.as_deref())
                .chain(record.artist3.as_deref())
                .collect();
            println!(
                "{}\t{} - {}\t{} / {}",
                record.played_at.format("%Y-%m-%d %H:%M:%S"),
                artists.join(", "),
                record.track_name,
                format_listening_time(Some(record.progress_ms)),
                format_listening_time(Some(record.duration_ms)),
            );
        }
    }

    pool.close().await;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
