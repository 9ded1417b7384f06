//! CLI entry point for steproast.
//!
//! This binary provides the `steproast` command: a one-shot step check, a
//! cron-driven daemon, and a helper that prints today's day window.

mod config;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use steproast_adapters::DayWindow;
use steproast_intent::{CronScheduler, run_scheduled};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// steproast: roasts you when your step count is too low.
#[derive(Parser)]
#[command(
    name = "steproast",
    version,
    about = "Daily step check that roasts you when you barely moved",
    long_about = "Reads today's step count from Google Fit and, when it is below the \
                  threshold, publishes a roast generated on AWS Bedrock to an SNS topic."
)]
struct Cli {
    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one step check and print the invocation response.
    Check {
        /// Event payload passed to the check, as JSON.
        #[arg(long, value_name = "JSON")]
        event: Option<String>,

        /// Roast when the step count is below this value.
        #[arg(long)]
        threshold: Option<u64>,
    },

    /// Run step checks on a cron schedule until interrupted.
    Watch {
        /// Cron expression (5, 6 or 7 fields), evaluated in UTC.
        #[arg(long, default_value = "0 20 * * *")]
        cron: String,

        /// Roast when the step count is below this value.
        #[arg(long)]
        threshold: Option<u64>,
    },

    /// Print today's day window.
    Window,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    load_env_file(cli.env_file.as_deref())?;
    init_tracing("info", cli.log_json);

    match cli.command {
        Commands::Check { event, threshold } => cmd_check(event.as_deref(), threshold).await,
        Commands::Watch { cron, threshold } => cmd_watch(&cron, threshold).await,
        Commands::Window => cmd_window(),
    }
}

fn load_env_file(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        // A missing ./.env is fine; a malformed one is not.
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to load .env"),
        },
    }
    Ok(())
}

fn load_config(threshold: Option<u64>) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(threshold) = threshold {
        config.step_threshold = threshold;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand: check
// ---------------------------------------------------------------------------

async fn cmd_check(event: Option<&str>, threshold: Option<u64>) -> Result<ExitCode> {
    let event: Value = match event {
        Some(raw) => serde_json::from_str(raw).context("--event is not valid JSON")?,
        None => json!({}),
    };

    let config = load_config(threshold)?;
    let check = wiring::build_step_check(&config)?;

    let response = check.run(event).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ---------------------------------------------------------------------------
// Subcommand: watch
// ---------------------------------------------------------------------------

async fn cmd_watch(cron: &str, threshold: Option<u64>) -> Result<ExitCode> {
    let config = load_config(threshold)?;
    let check = wiring::build_step_check(&config)?;

    let mut scheduler = CronScheduler::new();
    let first = scheduler
        .add_job("daily-step-check", cron)
        .await
        .context("invalid --cron")?;
    info!(cron = %cron, next_run = %first, "watching");

    let (tx, rx) = mpsc::unbounded_channel();
    scheduler.start(tx)?;

    tokio::select! {
        runs = run_scheduled(&check, rx) => {
            warn!(runs, "scheduler channel closed unexpectedly");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("interrupt received, shutting down");
        }
    }

    scheduler.stop().await;
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Subcommand: window
// ---------------------------------------------------------------------------

fn cmd_window() -> Result<ExitCode> {
    let window = DayWindow::today();
    let local = |millis: i64| {
        Local
            .timestamp_millis_opt(millis)
            .single()
            .map(|t| t.to_rfc3339())
    };

    let out = json!({
        "start": local(window.start_millis),
        "end": local(window.end_millis),
        "startTimeMillis": window.start_millis,
        "endTimeMillis": window.end_millis,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.compact().init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_with_event() {
        let cli = Cli::try_parse_from([
            "steproast",
            "--log-json",
            "check",
            "--event",
            r#"{"source":"manual"}"#,
            "--threshold",
            "250",
        ])
        .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Commands::Check { event, threshold } => {
                assert_eq!(event.as_deref(), Some(r#"{"source":"manual"}"#));
                assert_eq!(threshold, Some(250));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn watch_has_default_cron() {
        let cli = Cli::try_parse_from(["steproast", "watch"]).unwrap();
        match cli.command {
            Commands::Watch { cron, threshold } => {
                assert_eq!(cron, "0 20 * * *");
                assert!(threshold.is_none());
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn env_file_is_global() {
        let cli = Cli::try_parse_from(["steproast", "window", "--env-file", "prod.env"]).unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("prod.env")));
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_env_file(Some(&dir.path().join("absent.env"))).unwrap_err();
        assert!(err.to_string().contains("absent.env"));
    }
}
