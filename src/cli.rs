use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portblock")]
#[command(about = "Reserve collision-free TCP port blocks", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log allocator activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Claim a port block and print the resolved reservations
    Claim {
        /// Reservations: NAME for a dynamic port, NAME:OFFSET to pin one
        #[arg(required = true)]
        ids: Vec<String>,

        /// Base port hint (overrides configuration)
        #[arg(long)]
        hint: Option<u16>,

        /// Veto blocks containing ports other processes already use
        #[arg(long)]
        probe: bool,

        /// Write the resolved claim to this file as JSON
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Claim a block and run a command with PORT_* variables set
    Run {
        /// Reservations: NAME for a dynamic port, NAME:OFFSET to pin one
        #[arg(required = true)]
        ids: Vec<String>,

        /// Base port hint (overrides configuration)
        #[arg(long)]
        hint: Option<u16>,

        /// Veto blocks containing ports other processes already use
        #[arg(long)]
        probe: bool,

        /// Write the resolved claim to this file as JSON
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Command to run while the block is held
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Check whether a single port is free
    Check {
        /// Port to probe
        port: u16,

        /// Address to probe instead of the configured one
        #[arg(long)]
        address: Option<IpAddr>,
    },

    /// Initialize portblock configuration for this project
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
