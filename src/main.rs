use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::io;
use std::path::{Path, PathBuf};

use glucors::diagnose::{print_failure, run_and_report};
use glucors::error::ErrorSeverity;
use glucors::logging::init_logging;
use glucors::pipeline::ConsoleSink;
use glucors::{
    run_daily_report, AppConfig, ConnectionConfig, EvaluationWindow, GlucoRsError, LogConfig, LogFormat,
    NightscoutClient, TelegramNotifier,
};

/// glucors - Daily CGM report from Nightscout to Telegram
///
/// Fetches the previous day's glucose readings and treatments, computes
/// glycemic-control metrics and posts a summary with recommendations.
#[derive(Parser)]
#[command(name = "glucors")]
#[command(version)]
#[command(about = "Daily glucose report from Nightscout to Telegram", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one day of readings and send the report
    Report {
        /// Local day to evaluate (YYYY-MM-DD), defaults to yesterday
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Print the report to stdout instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check connectivity to Nightscout and Telegram
    Diagnose {
        /// Also print the diagnostic report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::default()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_env_file();
    init_logging(&log_config)?;

    match cli.command {
        Commands::Report { date, dry_run } => report(cli.config.as_deref(), date, dry_run),
        Commands::Diagnose { json } => std::process::exit(diagnose(cli.config.as_deref(), json)),
    }
}

fn log_failure(err: &GlucoRsError) {
    match err.severity() {
        ErrorSeverity::Warning => tracing::warn!(error = %err, "{}", err.user_message()),
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            tracing::error!(error = %err, "{}", err.user_message())
        }
    }
}

fn report(config_path: Option<&Path>, date: Option<NaiveDate>, dry_run: bool) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    let window = match date {
        Some(date) => EvaluationWindow::for_date(date, config.timezone)?,
        None => EvaluationWindow::previous_day(Utc::now().with_timezone(&config.timezone))?,
    };

    let source = NightscoutClient::from_config(&config.connections);
    let outcome = if dry_run {
        run_daily_report(&source, &ConsoleSink::new(io::stdout()), &window)
    } else {
        run_daily_report(&source, &TelegramNotifier::from_config(&config.connections), &window)
    };

    let daily = outcome
        .inspect_err(log_failure)
        .with_context(|| format!("Daily report for {} failed", window.report_date()))?;

    if !dry_run {
        eprintln!(
            "{}",
            format!("✓ Report for {} sent", daily.date.format("%d.%m.%Y")).green()
        );
    }

    Ok(())
}

fn diagnose(config_path: Option<&Path>, json: bool) -> i32 {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    // Only the connection settings; the report timezone plays no part here
    let config = match ConnectionConfig::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            if json {
                print_failure(&mut stderr, &err);
            } else {
                print_failure(&mut stdout, &err);
            }
            return 1;
        }
    };

    let probe = NightscoutClient::from_config(&config);
    let sink = TelegramNotifier::from_config(&config);
    run_and_report(&probe, &sink, json, &mut stdout, &mut stderr).exit_code()
}
