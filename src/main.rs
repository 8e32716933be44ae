//! Selector healer command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use healer_core_types::HealStatus;
use result_ledger::ResultLedger;
use selector_healer_cli::config::HealerConfig;
use selector_healer_cli::github::{GithubClient, GithubConfig};
use selector_healer_cli::report::{write_reports, HealingReport, Recommendation};
use selector_healer_cli::scan::{run_scan, DEFAULT_COMMAND};

#[derive(Parser)]
#[command(
    name = "selector-healer",
    version,
    about = "AI-assisted self-healing for browser automation selectors"
)]
struct Cli {
    /// Optional YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a test command with healing active, then generate reports.
    Scan {
        /// Test command to wrap; defaults to `npx playwright test`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Render reports from the current ledger without running tests.
    Report,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match HealerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Scan { command } => scan(&config, command).await,
        Command::Report => report(&config, Vec::new()).await.map(|_| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            error!(%err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn scan(config: &HealerConfig, command: Vec<String>) -> Result<i32> {
    let command = if command.is_empty() {
        DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect()
    } else {
        command
    };

    let outcome = run_scan(&command, &config.project_path).await?;
    report(config, outcome.parsed).await?;
    Ok(outcome.exit_code)
}

async fn report(config: &HealerConfig, parsed: Vec<Recommendation>) -> Result<()> {
    let ledger = ResultLedger::new(&config.project_path);
    let entries = ledger.consume().await?;
    info!(entries = entries.len(), "ledger consumed");

    let report = HealingReport::build(&entries, parsed);
    let (json_path, md_path) = write_reports(&config.project_path, &report).await?;

    println!("\nReports generated:");
    println!("- {}", json_path.display());
    println!("- {}", md_path.display());
    if report.stats.healed > 0 {
        println!(
            "\nSuccessfully healed {} selector(s) during the run.",
            report.stats.healed
        );
    }

    if config.create_pr {
        open_pull_requests(&entries).await;
    }
    Ok(())
}

/// Best-effort PR creation for healed selectors with a known source file.
async fn open_pull_requests(entries: &[healer_core_types::LedgerEntry]) {
    let Some(github_config) = GithubConfig::from_env() else {
        warn!("create_pr is enabled but GITHUB_TOKEN/GITHUB_REPOSITORY are not set");
        return;
    };
    let client = match GithubClient::new(github_config) {
        Ok(client) => client,
        Err(err) => {
            warn!(%err, "failed to build GitHub client");
            return;
        }
    };

    for entry in entries {
        if entry.status != HealStatus::Healed || entry.file == "auto-detected" {
            continue;
        }
        let Some(new_selector) = entry.new_selector.as_deref() else {
            continue;
        };
        match client
            .create_healing_pr(&entry.original_selector, new_selector, &entry.file)
            .await
        {
            Ok(url) => info!(%url, selector = %entry.original_selector, "opened healing PR"),
            Err(err) => {
                warn!(%err, selector = %entry.original_selector, "failed to open healing PR")
            }
        }
    }
}
