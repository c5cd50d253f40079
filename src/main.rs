use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sitewatch::alerting::AlertSink;
use sitewatch::browser::CheckExecutor;
use sitewatch::browser::chrome::ChromeEngine;
use sitewatch::config::Config;
use sitewatch::db;
use sitewatch::notifications::{NotificationSender, WebhookSender};
use sitewatch::orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "sitewatch", about = "Browser-driven URL health monitor")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "sitewatch.toml")]
    config: PathBuf,

    /// Run one batch over all enabled targets and exit.
    #[arg(long)]
    once: bool,
}

fn init_logging() {
    // File: JSON, daily rotation. Stdout: human-readable.
    let file_appender = rolling::daily("logs", "sitewatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "could not load configuration");
            return Err(e.into());
        }
    };

    info!(config = %cli.config.display(), "starting sitewatch");

    let conn = db::connect(&config.database_url).await?;
    db::ensure_schema(&conn).await?;

    let engine = Arc::new(ChromeEngine::launch().await?);
    let executor = CheckExecutor::new(
        engine,
        Duration::from_secs(config.check.timeout_seconds),
        config.check.screenshot_dir.clone(),
    );

    let senders: Vec<Arc<dyn NotificationSender>> = config
        .webhooks
        .iter()
        .cloned()
        .map(|webhook| Arc::new(WebhookSender::new(webhook)) as Arc<dyn NotificationSender>)
        .collect();
    if !senders.is_empty() {
        info!(channels = senders.len(), "webhook alerting enabled");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        conn,
        executor,
        AlertSink::default(),
        senders,
    ));

    if cli.once {
        let report = orchestrator.check_all().await?;
        info!(
            targets = report.reports.len(),
            down = report.down_count(),
            "one-shot batch finished"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = match &config.schedule.hours {
        Some(hours) => tokio::spawn(Orchestrator::run_at_hours(
            orchestrator.clone(),
            hours.clone(),
            config.timezone()?,
            shutdown_rx,
        )),
        None => tokio::spawn(Orchestrator::run_interval(
            orchestrator.clone(),
            Duration::from_secs(config.schedule.interval_seconds),
            shutdown_rx,
        )),
    };

    // Log alert transitions independently of the notification channels.
    let mut alerts = orchestrator.alerts().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = alerts.recv().await {
            info!("{}", event.summary());
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;

    Ok(())
}
