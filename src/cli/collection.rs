//! Collection command handlers.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use super::App;

/// Arguments of the write command.
#[derive(Args)]
pub struct WriteArgs {
    #[arg(long)]
    pub kind: String,

    /// JSON payload file; `-` or absent reads stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl App {
    pub async fn run_count(&self, kind: &str) -> Result<()> {
        let context = self.context().await?;
        let count = context.service(kind)?.count().await?;
        println!("{}", count);
        Ok(())
    }

    pub async fn run_read(&self, kind: &str, uuid: &str) -> Result<()> {
        let context = self.context().await?;
        let trace_id = self.trace_id();

        match context.service(kind)?.read(uuid, &trace_id).await? {
            Some(collection) => println!("{}", serde_json::to_string_pretty(&collection)?),
            None => return Err(eyre!("Collection {} not found", uuid)),
        }
        Ok(())
    }

    pub async fn run_write(&self, args: &WriteArgs) -> Result<()> {
        let context = self.context().await?;
        let service = context.service(&args.kind)?;
        let trace_id = self.trace_id();

        let (collection, uuid) = match args.file.as_deref() {
            Some(path) if path.as_os_str() != "-" => {
                let file = File::open(path)
                    .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
                service.decode_json(BufReader::new(file))?
            }
            _ => service.decode_json(io::stdin().lock())?,
        };

        service.write(&collection, &trace_id).await?;
        println!("Wrote {} ({} items)", uuid, collection.items.len());
        Ok(())
    }

    pub async fn run_delete(&self, kind: &str, uuid: &str) -> Result<()> {
        let context = self.context().await?;
        let trace_id = self.trace_id();

        if context.service(kind)?.delete(uuid, &trace_id).await? {
            println!("Deleted {}", uuid);
        } else {
            println!("Removed collection data from {}; node kept", uuid);
        }
        Ok(())
    }
}
