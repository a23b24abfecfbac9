pub mod bootstrap;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use switchboard_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "switchboard",
    about = "Switchboard multi-agent chat",
    long_about = "Chat with a router agent that hands each question to a stock analyst, the HR \
                  knowledge base, a risk profile lookup or a general assistant.",
    after_help = "Examples:\n  switchboard\n  switchboard chat --show-memory\n  \
                  switchboard doctor --json\n  switchboard memory --actor user_123"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a switchboard.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start the interactive chat loop (default)")]
    Chat {
        #[arg(long, help = "Print the stored memory snapshot before the first prompt")]
        show_memory: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Check config, LLM key, memory backend and tool readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show recent turns and extracted memories for an actor")]
    Memory {
        #[arg(long, help = "Actor id (defaults to memory.actor_id)")]
        actor: Option<String>,
        #[arg(long, help = "Session id (defaults to memory.session_id)")]
        session: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command.unwrap_or(Command::Chat { show_memory: false }) {
        Command::Chat { show_memory } => commands::chat::run(options, show_memory),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Memory { actor, session } => commands::memory::run(options, actor, session),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
