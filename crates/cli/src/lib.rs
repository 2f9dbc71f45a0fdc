pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use parley_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Parley intent resolution CLI",
    long_about = "Inspect configuration and registered intents, resolve single utterances, and chat with the bookstore agent.",
    after_help = "Examples:\n  parley intents --json\n  parley resolve \"status of order 12345\"\n  parley chat --user alice"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a parley.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "List registered actions, their intents and field schemas")]
    Intents {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve one utterance and print the bound action and reply as JSON")]
    Resolve {
        utterance: String,
        #[arg(long, help = "Use a recorded LUIS response file instead of querying the oracle")]
        luis_response: Option<PathBuf>,
    },
    #[command(about = "Start an interactive conversation on stdin")]
    Chat {
        #[arg(long, help = "User id attached to every turn")]
        user: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Intents { json } => commands::intents::run(json),
        Command::Resolve { utterance, luis_response } => {
            commands::resolve::run(options, &utterance, luis_response.as_deref())
        }
        Command::Chat { user } => commands::chat::run(options, user),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
