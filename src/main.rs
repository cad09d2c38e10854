mod batch;
mod canvas;
mod config;
mod filter;
mod ledger;
mod mailer;
mod selection;
mod tracker;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use canvas::{CanvasClient, FileSource};
use config::Config;
use mailer::{Mailer, Notifier};
use tracker::Tracker;

#[derive(Parser)]
#[command(
    name = "canvas-watch",
    version,
    about = "Watches Canvas courses for new files and emails them"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check monitored courses for new files and email them (the default)
    Run,
    /// Interactively select which courses to monitor
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Setup => setup(&config).await,
    }
}

async fn run(config: &Config) -> Result<()> {
    let source = CanvasClient::new(config)?;
    let notifier = Mailer::new(config)?;

    let selected = selection::load(&config.courses_config_path());
    match &selected {
        Some(ids) => tracing::info!("Monitoring {} configured courses", ids.len()),
        None => tracing::info!(
            "No {} found - monitoring all courses (run `canvas-watch setup` to configure)",
            config::COURSES_CONFIG_NAME
        ),
    }

    let tracker = Tracker::new(config, &source, &notifier);
    let report = tracker.run(selected.as_deref()).await;

    if !report.errors.is_empty() {
        let summary = report.errors.join("\n\n");
        tracing::warn!("Errors occurred during execution:\n{summary}");
        if let Err(e) = notifier.send_error_report(&summary).await {
            tracing::error!("Failed to send error report email: {e:#}");
        }
    }

    if report.critical {
        anyhow::bail!("run finished with critical errors");
    }
    Ok(())
}

async fn setup(config: &Config) -> Result<()> {
    let source = CanvasClient::new(config)?;
    let courses = source
        .active_courses()
        .await
        .context("Cannot reach Canvas API")?;
    if courses.is_empty() {
        anyhow::bail!("No active courses found on Canvas");
    }
    selection::run_setup(&courses, &config.courses_config_path())
}
