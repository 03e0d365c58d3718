// Companion command-line client for the world server.

mod client;
mod ec;

pub use client::Client;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "atlas", version, about = "entity/components client")]
pub struct Cli {
    /// Server base URL
    #[arg(
        long,
        global = true,
        env = "ATLAS_SERVER",
        default_value = "http://localhost:5991"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// list all entities
    #[command(alias = "list")]
    Ls(ec::LsArgs),

    /// get an entity by ID and print as JSON
    Get {
        /// entity id
        id: String,
    },

    /// push one or more entities from a JSON or YAML file or stdin
    ///
    /// Use '-' to read from stdin. The format is auto-detected. YAML input
    /// may contain multiple entities separated by '---'.
    #[command(alias = "apply")]
    Put {
        /// file path or '-' for stdin
        file: String,
    },

    /// edit an entity in your default editor
    Edit {
        /// entity id
        id: String,
    },

    /// remove an entity by setting its lifetime.until to now
    #[command(alias = "remove", alias = "delete")]
    Rm {
        /// entity id
        id: String,
    },

    /// remove all entities by listing and deleting them
    Clear,

    /// subscribe to all change events and print them as JSON lines
    #[command(alias = "d")]
    Debug,

    /// stream the currently observed regions as JSON lines
    #[command(alias = "o")]
    Observe,
}

/// CLI entry point; the binary maps an `Err` to a non-zero exit code.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.server);

    match cli.command {
        Command::Ls(args) => ec::run_ls(&client, args).await,
        Command::Get { id } => ec::run_get(&client, &id).await,
        Command::Put { file } => ec::run_put(&client, &file).await,
        Command::Edit { id } => ec::run_edit(&client, &id).await,
        Command::Rm { id } => ec::run_rm(&client, &id).await,
        Command::Clear => ec::run_clear(&client).await,
        Command::Debug => ec::run_debug(&client).await,
        Command::Observe => ec::run_observe(&client).await,
    }
}
