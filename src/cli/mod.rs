//! CLI module for the content collection store.
//!
//! Subcommands:
//! - `init`: Ensure uniqueness constraints for every collection kind
//! - `check`: Verify the graph store is reachable
//! - `count`, `read`, `write`, `delete`: Collection operations for one kind

mod collection;
mod init;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;

use crate::config::Config;
use crate::context::Context;
use crate::graph::backends::neo4j::Neo4jClient;

pub use collection::WriteArgs;

/// Content collection read/write store for Neo4j
#[derive(Parser)]
#[command(name = "content-collection-rw")]
#[command(about = "Reads and writes ordered content collections in Neo4j")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra config file, applied over every other layer
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Transaction id attached to every log line of the call
    #[arg(long, global = true)]
    pub trace_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ensure uniqueness constraints for every collection kind
    Init,

    /// Verify the graph store is reachable for every collection kind
    Check,

    /// Count collections of a kind
    Count {
        /// Collection kind, e.g. content-collection/story-package
        #[arg(long)]
        kind: String,
    },

    /// Print a collection as JSON
    Read {
        #[arg(long)]
        kind: String,
        uuid: String,
    },

    /// Replace a collection from a JSON payload
    Write(WriteArgs),

    /// Delete a collection
    Delete {
        #[arg(long)]
        kind: String,
        uuid: String,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Init => self.run_init().await,
            Command::Check => self.run_check().await,
            Command::Count { ref kind } => self.run_count(kind).await,
            Command::Read { ref kind, ref uuid } => self.run_read(kind, uuid).await,
            Command::Write(ref args) => self.run_write(args).await,
            Command::Delete { ref kind, ref uuid } => self.run_delete(kind, uuid).await,
        }
    }

    /// Loads configuration and connects to Neo4j.
    async fn context(&self) -> Result<Context<Neo4jClient>> {
        let config = Config::load(self.config.as_deref())?;
        tracing::info!(
            app = %config.app.name,
            kinds = config.effective_collections().len(),
            "Loaded configuration"
        );

        tracing::info!("Connecting to Neo4j at {}", config.neo4j.uri);
        let client = Neo4jClient::connect(&config.neo4j)
            .await
            .wrap_err_with(|| format!("Failed to connect to {}", config.neo4j.uri))?;

        Ok(Context::new(client, config)?)
    }

    /// The caller's trace id, or a fresh one.
    fn trace_id(&self) -> String {
        self.trace_id
            .clone()
            .unwrap_or_else(|| format!("tid_{}", ulid::Ulid::new().to_string().to_lowercase()))
    }
}
