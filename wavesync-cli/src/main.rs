use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use wavesync_core::core_sim::{ReplayReport, Scenario, ScenarioRunner};
use wavesync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use wavesync_core::metrics::init_metrics;
use wavesync_core::Config;

#[derive(Parser, Debug)]
#[command(name = "wavesync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file (TOML); WAVESYNC_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay scenario files against a channel and print what the receiver saw
    Replay {
        /// Scenario files (.toml or .json)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the full reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Check {
        path: PathBuf,
    },
    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn replay_file(config: &Config, path: &Path) -> Result<ReplayReport> {
    let scenario = Scenario::from_file(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let report = ScenarioRunner::replay(&config.channel, &scenario)
        .with_context(|| format!("replaying scenario {}", path.display()))?;
    Ok(report)
}

fn summarize(report: &ReplayReport) -> String {
    let mut lines = vec![format!("scenario {}", report.name)];
    for outcome in &report.steps {
        let events: Vec<&str> = outcome.events.iter().map(|e| e.kind()).collect();
        let mut line = format!(
            "  [{}] {:<12} -> {}",
            outcome.index,
            outcome.step.kind(),
            events.join(", ")
        );
        if let Some(error) = &outcome.error {
            line.push_str(&format!(" !! {}", error.message));
        }
        lines.push(line);
    }
    match report.expectation_met {
        Some(true) => lines.push("  expectation: met".to_string()),
        Some(false) => lines.push("  expectation: NOT met".to_string()),
        None => {}
    }
    lines.join("\n")
}

/// Replay every file; returns whether all stated expectations held
fn run_replay(config: &Config, files: &[PathBuf], json: bool) -> Result<bool> {
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        reports.push(replay_file(config, path)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", summarize(report));
        }
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.expectation_met == Some(false))
        .map(|r| r.name.as_str())
        .collect();
    for name in &failed {
        warn!(scenario = %name, "Scenario did not produce the expected events");
    }
    Ok(failed.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Parse log level
    let log_level = LogLevel::from_str(&args.log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        LogLevel::Info
    });

    // Initialize logging
    let log_config = LogConfig::new(log_level).json_format(args.json_logs);
    init_logging_with_config(log_config)?;
    init_metrics();

    info!("wavesync CLI started");

    match args.command {
        Command::Replay { files, json } => {
            let config = load_config(args.config.as_deref())?;
            if !run_replay(&config, &files, json)? {
                std::process::exit(1);
            }
        }
        Command::Check { path } => {
            load_config(Some(path.as_path()))?;
            println!("{}: ok", path.display());
        }
        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            info!(path = %path.display(), "Wrote default configuration");
        }
    }

    Ok(())
}
