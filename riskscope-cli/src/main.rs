//! riskscope CLI
//!
//! Score evidence against a rule set from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use riskscope_core::{RuleRegistry, RulesConfig, Signal};
use riskscope_detectors::{EmailMessage, FaceObservation};
use riskscope_runtime::{ActionType, ScoringService, VerdictRecord};

#[derive(Parser)]
#[command(name = "riskscope")]
#[command(author, version, about = "riskscope: signal risk scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,

    /// Rule set file (TOML); the built-in rules are used when omitted
    #[arg(long, env = "RISKSCOPE_RULES", global = true)]
    rules: Option<PathBuf>,

    /// Subject the verdict is recorded against
    #[arg(long, default_value = "cli", global = true)]
    subject: String,

    /// Actor named in the activity log
    #[arg(long, env = "USER", default_value = "operator", global = true)]
    actor: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List the loaded rules
    Rules {
        /// Only show enabled rules
        #[arg(long)]
        enabled: bool,
    },

    /// Score a JSON array of signals
    Score {
        /// Path to the signals file
        #[arg(short, long)]
        signals: PathBuf,
    },

    /// Analyze an email (JSON with subject, sender, content) for phishing
    Email {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check a flat JSON transaction payload for fraud
    Fraud {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Score face-detector output (JSON with faces and mean_brightness)
    Face {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = match &cli.rules {
        Some(path) => RulesConfig::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => RulesConfig::embedded_default().context("Built-in rule set is invalid")?,
    };
    let registry = Arc::new(RuleRegistry::from_config(config).context("Invalid rule set")?);
    info!("Loaded {} rules", registry.len());

    let service = ScoringService::with_defaults(registry);
    let (subject, actor) = (cli.subject.as_str(), cli.actor.as_str());

    match cli.command {
        Commands::Rules { enabled } => {
            let rules = if enabled {
                service.registry().enabled_rules()
            } else {
                service.registry().list_rules()
            };
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Commands::Score { signals } => {
            let signals: Vec<Signal> = read_json(&signals)?;
            let record = service.assess(subject, actor, ActionType::Custom, &signals)?;
            print_record(&record)?;
        }
        Commands::Email { file } => {
            let email: EmailMessage = read_json(&file)?;
            let record = service.analyze_email(subject, actor, &email)?;
            print_record(&record)?;
        }
        Commands::Fraud { file } => {
            let data: Value = read_json(&file)?;
            let record = service.check_fraud(subject, actor, &data)?;
            print_record(&record)?;
        }
        Commands::Face { file } => {
            let observation: FaceObservation = read_json(&file)?;
            let record = service.analyze_face(subject, actor, &observation)?;
            print_record(&record)?;
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_record(record: &VerdictRecord) -> Result<()> {
    info!("{}", record.verdict.summary());
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}
