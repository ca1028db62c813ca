use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use partyfinder::alerts::{AlertId, AlertStore, ChangeDetector};
use partyfinder::app::ports::{Clock, KeyValueStore, NotificationDispatcher, UpstreamSource};
use partyfinder::app::SystemClock;
use partyfinder::config::{Config, DEFAULT_CONFIG_PATH};
use partyfinder::feed::FeedCache;
use partyfinder::infra::{
    ExpoPushDispatcher, FileJsonSource, HttpJsonSource, KvTokenRegistry, LogDispatcher,
    SqliteKvStore, UpcomingFilter,
};
use partyfinder::logging::init_logging;
use partyfinder::metrics::init_metrics;
use partyfinder::pipeline::processing::{RecordTransformer, VenueNormalizer};
use partyfinder::server::{start_server, AppState};
use partyfinder::tasks::{spawn_sweep, Sweeper};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "partyfinder")]
#[command(about = "Nightlife event feed with new-event alerts")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and run the periodic alert sweep
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch and transform the upstream feed once and print it as JSON
    Fetch,
    /// Manage alerts
    Alerts {
        #[command(subcommand)]
        command: AlertCommands,
    },
    /// Run one change-detection sweep over all enabled alerts
    Check,
}

#[derive(Subcommand)]
enum AlertCommands {
    /// Create an alert for a date, optionally restricted to one venue
    Add {
        /// Event date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        venue: Option<String>,
    },
    /// List alerts
    List,
    /// Delete an alert with its snapshot and token registrations
    Remove {
        #[arg(value_parser = parse_alert_id)]
        id: String,
    },
    /// Enable or disable an alert
    Toggle {
        #[arg(value_parser = parse_alert_id)]
        id: String,
    },
}

fn parse_alert_id(raw: &str) -> Result<String, String> {
    AlertId::parse(raw)
        .map(|_| raw.to_string())
        .ok_or_else(|| format!("not an alert id (expected DATE_VENUE_MILLIS): {}", raw))
}

struct Services {
    config: Config,
    clock: Arc<dyn Clock>,
    feed: Arc<FeedCache>,
    alerts: Arc<AlertStore>,
    detector: ChangeDetector,
}

impl Services {
    async fn build(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let zone = config.refresh.zone()?;
        let schedule = config.refresh.schedule()?;

        let kv: Arc<dyn KeyValueStore> = Arc::new(
            SqliteKvStore::open(&config.storage.path)
                .with_context(|| format!("opening {}", config.storage.path.display()))?,
        );

        let upcoming = config.upstream.upcoming_only.then(|| UpcomingFilter {
            clock: clock.clone(),
            zone,
        });
        let source: Arc<dyn UpstreamSource> = match (&config.upstream.url, &config.upstream.file) {
            (Some(url), _) => Arc::new(HttpJsonSource::new(
                url.clone(),
                config.upstream.timeout(),
                upcoming,
            )?),
            (None, Some(file)) => Arc::new(FileJsonSource::new(file.clone(), upcoming)),
            (None, None) => {
                return Err(anyhow!(
                    "no upstream configured: set [upstream] url or file, or PARTYFINDER_UPSTREAM_URL"
                ))
            }
        };

        let transformer =
            RecordTransformer::new(VenueNormalizer::with_default_aliases(&config.venue_aliases));
        let feed = Arc::new(
            FeedCache::new(source, transformer, schedule, clock.clone()).with_store(kv.clone()),
        );

        let tokens = Arc::new(KvTokenRegistry::new(kv.clone()));
        let alerts = Arc::new(AlertStore::new(kv.clone(), tokens, clock.clone(), zone));
        if let Some(token) = &config.notifications.device_token {
            alerts.set_device_token(token).await?;
        }
        alerts.load().await;

        let dispatcher: Arc<dyn NotificationDispatcher> = match &config.notifications.device_token {
            Some(token) => Arc::new(ExpoPushDispatcher::new(
                config
                    .notifications
                    .expo_push_url
                    .clone()
                    .unwrap_or_else(|| ExpoPushDispatcher::DEFAULT_ENDPOINT.to_string()),
                token.clone(),
            )?),
            None => Arc::new(LogDispatcher),
        };
        let detector = ChangeDetector::new(alerts.snapshots().clone(), dispatcher);

        Ok(Self {
            config,
            clock,
            feed,
            alerts,
            detector,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let _log_guard = init_logging(&config.logging.dir);

    let services = Services::build(config).await?;

    match cli.command {
        Commands::Serve { port } => serve(services, port).await?,
        Commands::Fetch => {
            let data = services.feed.get_data(true).await;
            println!("{}", serde_json::to_string_pretty(data.as_ref())?);
        }
        Commands::Alerts { command } => alerts(services, command).await?,
        Commands::Check => {
            let sweeper = Sweeper::new(services.feed, services.alerts, services.detector);
            if let Some(report) = sweeper.run_once().await {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(())
}

async fn serve(services: Services, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(metrics_port) = services.config.metrics.port {
        init_metrics(metrics_port);
    }
    let port = port.unwrap_or(services.config.server.port);
    let sweep_interval = services.config.refresh.sweep_interval();

    let state = AppState {
        feed: services.feed.clone(),
        clock: services.clock.clone(),
    };
    let sweeper = Arc::new(Sweeper::new(services.feed, services.alerts, services.detector));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = spawn_sweep(sweeper, sweep_interval, shutdown_rx);

    let result = tokio::select! {
        served = start_server(state, port) => served,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep.await {
        warn!("Sweep task ended abnormally: {}", e);
    }
    result
}

async fn alerts(services: Services, command: AlertCommands) -> anyhow::Result<()> {
    let store = services.alerts;
    match command {
        AlertCommands::Add { date, venue } => {
            let data = services.feed.get_data(false).await;
            let alert = store.create(date, venue.as_deref(), &data.parties).await;
            println!("Created alert {}", alert.id);
        }
        AlertCommands::List => {
            let alerts = store.list().await;
            if alerts.is_empty() {
                println!("No alerts");
            }
            for alert in alerts {
                let known = match store.snapshots().load(&alert.id).await {
                    Ok(Some(events)) => events.len().to_string(),
                    Ok(None) => "-".to_string(),
                    Err(e) => {
                        warn!("Failed to read snapshot for {}: {}", alert.id, e);
                        "?".to_string()
                    }
                };
                println!(
                    "{}  {}  {:<20}  {:<8}  {} known events",
                    alert.id,
                    alert.date,
                    alert.venue_name.as_deref().unwrap_or("(any venue)"),
                    if alert.enabled { "enabled" } else { "disabled" },
                    known
                );
            }
        }
        AlertCommands::Remove { id } => {
            if !store.remove(&id).await {
                return Err(anyhow!("no alert with id {}", id));
            }
            println!("Removed alert {}", id);
        }
        AlertCommands::Toggle { id } => match store.toggle(&id).await {
            Some(alert) => println!(
                "Alert {} is now {}",
                alert.id,
                if alert.enabled { "enabled" } else { "disabled" }
            ),
            None => return Err(anyhow!("no alert with id {}", id)),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_commands_reject_malformed_ids() {
        assert!(Cli::try_parse_from(["partyfinder", "alerts", "remove", "oops"]).is_err());
        assert!(Cli::try_parse_from(["partyfinder", "alerts", "toggle", "2025-10-31_all_"]).is_err());
        assert!(Cli::try_parse_from(["partyfinder", "alerts", "toggle", "2025-10-31_all_17"]).is_ok());
    }
}
