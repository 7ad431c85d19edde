mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Claim {
            ids,
            hint,
            probe,
            export,
            json,
        }) => commands::claim::execute(&ids, hint, probe, export.as_deref(), json),
        Some(Commands::Run {
            ids,
            hint,
            probe,
            export,
            command,
        }) => commands::run::execute(&ids, hint, probe, export.as_deref(), &command),
        Some(Commands::Check { port, address }) => commands::check::execute(port, address),
        Some(Commands::Init { force }) => commands::init::execute(force),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "portblock", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // Show help when no command is provided
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
