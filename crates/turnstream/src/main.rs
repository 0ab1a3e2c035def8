use clap::Parser;
use eyre::Result;

use turnstream::cli::{Cli, Commands, ConfigCommands};
use turnstream::commands::{
    Command,
    ask::AskCommand,
    chat::ChatCommand,
    config::{ConfigAction, ConfigCommand},
    replay::ReplayCommand,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    // Load .env before parsing so clap sees TURNSTREAM_* from it
    turnstream::cli::config::load_env()?;

    let cli = Cli::parse();

    // Initialize tracing (level configured via RUST_LOG env var)
    turnstream::utils::tracing::init_tracing()?;

    let config = turnstream::cli::config::resolve_client_config(
        cli.config.as_deref(),
        cli.endpoint.as_deref(),
    )?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let command = ChatCommand { config };
            command.execute().await
        }
        Commands::Ask { prompt, json } => {
            let command = AskCommand {
                config,
                prompt,
                json,
            };
            command.execute().await
        }
        Commands::Replay {
            file,
            json,
            delay_ms,
            prompt,
        } => {
            let command = ReplayCommand {
                file,
                json,
                delay_ms,
                prompt,
            };
            command.execute().await
        }
        Commands::Config { action } => {
            let action = match action {
                ConfigCommands::Show => ConfigAction::Show,
                ConfigCommands::Path => ConfigAction::Path,
                ConfigCommands::Init { force } => ConfigAction::Init { force },
            };
            let command = ConfigCommand {
                action,
                path: cli.config,
                resolved: config,
            };
            command.execute().await
        }
    }
}
