//! Init and check command handlers.

use color_eyre::eyre::eyre;
use color_eyre::Result;

use super::App;

impl App {
    /// Run the init command to ensure constraints for every kind.
    pub async fn run_init(&self) -> Result<()> {
        let context = self.context().await?;

        tracing::info!("Ensuring constraints...");
        let reports = context
            .initialise_all()
            .await
            .map_err(|e| eyre!("Schema initialisation failed: {}", e))?;

        for (kind, report) in reports {
            if report.is_noop() {
                tracing::info!("{}: all {} constraints already present", kind, report.existing.len());
            } else {
                let created: Vec<String> = report.created.iter().map(|c| c.to_string()).collect();
                tracing::info!("{}: created {}", kind, created.join(", "));
            }
        }

        Ok(())
    }

    /// Run the check command against every kind.
    pub async fn run_check(&self) -> Result<()> {
        let context = self.context().await?;
        let system_code = context.config.app.system_code.clone();

        let failures = context.check_all().await;
        if failures.is_empty() {
            println!("OK");
            return Ok(());
        }

        for failure in &failures {
            eprintln!(
                "{} [{}] cannot reach Neo4j ({}): {}",
                failure.kind,
                system_code,
                failure.error.code(),
                failure.error
            );
        }
        Err(eyre!("{} of {} kinds failed the check", failures.len(), context.kinds().count()))
    }
}
