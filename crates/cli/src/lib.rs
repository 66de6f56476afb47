pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use contractflow_core::config::{AppConfig, LoadOptions};

use commands::simulate::SimulateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "contractflow",
    about = "Contractflow approval CLI",
    long_about = "Inspect configuration, derive approval flows, and simulate contract approvals.",
    after_help = "Examples:\n  contractflow derive --value 60000000 --priority medium\n  contractflow simulate --value 250000000 --priority urgent --reject-at 3 --reason \"Thiếu phụ lục\"\n  contractflow doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a contractflow.toml file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, the approval rule table, and repository round trips")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Derive the approval steps for a contract value and priority")]
    Derive {
        #[arg(long, help = "Contract value, e.g. 60000000")]
        value: String,
        #[arg(long, default_value = "medium", help = "low|medium|high|urgent")]
        priority: String,
    },
    #[command(about = "Create, submit and resolve a contract against the demo directory")]
    Simulate {
        #[arg(long)]
        value: String,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long, help = "Reject this step number instead of approving it")]
        reject_at: Option<u32>,
        #[arg(long, help = "Rejection reason used with --reject-at")]
        reason: Option<String>,
        #[arg(long, help = "Allow steps to be resolved out of order")]
        permissive: bool,
        #[arg(long, help = "Resolve steps from last to first")]
        reverse: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Doctor { .. } => "doctor",
            Self::Derive { .. } => "derive",
            Self::Simulate { .. } => "simulate",
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };
    if let Ok(config) = AppConfig::load(options.clone()) {
        logging::init(&config.logging);
    }

    tracing::debug!(event_name = "cli.command.start", command = cli.command.name(), "running command");

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Derive { value, priority } => commands::derive::run(&value, &priority),
        Command::Simulate { value, priority, reject_at, reason, permissive, reverse } => {
            commands::simulate::run(
                &options,
                SimulateArgs { value, priority, reject_at, reason, permissive, reverse },
            )
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
