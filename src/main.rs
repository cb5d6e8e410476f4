//! Depart CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use depart::{
    Config, Coordinates, DepartureEngine, FileEventSource, HttpDirectionsProvider, LogNotifier,
    TokioScheduler,
};

/// Depart: departure alarm scheduling engine
#[derive(Parser, Debug)]
#[command(name = "depart")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine loop, scanning every configured interval
    Run {
        /// TOML file of upcoming events (re-read each scan)
        #[arg(short, long)]
        events: PathBuf,
        /// Current longitude
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        /// Current latitude
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
    },
    /// Run a single reconciliation pass and wait for its triggers
    Scan {
        /// TOML file of upcoming events
        #[arg(short, long)]
        events: PathBuf,
        /// Current longitude
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        /// Current latitude
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
    },
    /// Validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    match args.command {
        Command::CheckConfig => {
            config.validate()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Scan {
            events,
            longitude,
            latitude,
        } => {
            let (engine, mut fired) = build_engine(config, events)?;
            engine.start();
            let summary = engine.scan(Coordinates::new(longitude, latitude)).await?;
            info!(
                "Pass done: {} scheduled, {} no-route, {} skipped, {} failed",
                summary.scheduled, summary.no_route, summary.skipped, summary.failed
            );

            // Stay up until every armed trigger has fired.
            let mut outstanding = summary.scheduled + summary.no_route;
            while outstanding > 0 {
                match fired.recv().await {
                    Some(trigger) => {
                        engine.handle_fired(trigger.payload).await;
                        outstanding -= 1;
                    }
                    None => break,
                }
            }
            engine.stop();
            Ok(())
        }
        Command::Run {
            events,
            longitude,
            latitude,
        } => {
            let interval = std::time::Duration::from_secs(
                config.engine.scan_interval_minutes * 60,
            );
            let (engine, mut fired) = build_engine(config, events)?;
            let engine = Arc::new(engine);
            engine.start();

            let position = Coordinates::new(longitude, latitude);
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.scan(position).await {
                            warn!("Scan failed: {}", e);
                        }
                    }
                    Some(trigger) = fired.recv() => {
                        engine.handle_fired(trigger.payload).await;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        engine.stop();
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn build_engine(
    config: Config,
    events: PathBuf,
) -> anyhow::Result<(
    DepartureEngine,
    tokio::sync::mpsc::UnboundedReceiver<depart::FiredTrigger>,
)> {
    config.validate()?;
    let provider = Arc::new(HttpDirectionsProvider::new(config.provider.clone()));
    let source = Arc::new(FileEventSource::new(events));
    let (scheduler, fired) = TokioScheduler::new();
    let notifier = Arc::new(LogNotifier::new(config.engine.forewarning_minutes));
    let engine = DepartureEngine::new(
        config,
        provider,
        source,
        Arc::new(scheduler),
        notifier,
    )?;
    Ok((engine, fired))
}
