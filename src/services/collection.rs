//! Collection service: the operations exposed for one collection kind.
//!
//! Validates input before any transaction is opened and runs every call in a
//! span carrying the kind, the collection UUID and the caller's trace id.

use std::io::Read;

use tracing::instrument;

use crate::error::AppError;
use crate::graph::{GraphClient, SchemaExecutor};
use crate::models::{CollectionKind, ContentCollection};
use crate::repositories::{CollectionRepository, ConstraintReport, SchemaRepository};

/// Service for one collection kind.
#[derive(Clone)]
pub struct CollectionService<C> {
    repository: CollectionRepository<C>,
}

impl<C> CollectionService<C>
where
    C: GraphClient + SchemaExecutor + Clone,
{
    pub fn new(client: C, kind: CollectionKind) -> Self {
        Self {
            repository: CollectionRepository::new(client, kind),
        }
    }

    pub fn kind(&self) -> &CollectionKind {
        self.repository.kind()
    }

    /// Ensures `uuid` uniqueness constraints on every label of the kind.
    #[instrument(skip(self), fields(kind = %self.kind().name()))]
    pub async fn initialise(&self) -> Result<ConstraintReport, AppError> {
        let schema = SchemaRepository::new(self.repository.client().clone());
        let report = schema.ensure_constraints(&self.kind().constraints()).await?;

        tracing::info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Constraints ensured"
        );
        Ok(report)
    }

    /// Verifies the graph store is reachable.
    #[instrument(skip(self), fields(kind = %self.kind().name()))]
    pub async fn check(&self) -> Result<(), AppError> {
        self.repository.client().verify_connectivity().await
    }

    /// Reads a collection. `Ok(None)` means no collection of this kind has the UUID.
    #[instrument(skip(self), fields(kind = %self.kind().name()))]
    pub async fn read(
        &self,
        uuid: &str,
        trace_id: &str,
    ) -> Result<Option<ContentCollection>, AppError> {
        let found = self.repository.read(uuid).await?;
        tracing::debug!(found = found.is_some(), "Read collection");
        Ok(found)
    }

    /// Replaces the stored collection with `collection`.
    #[instrument(
        skip(self, collection),
        fields(kind = %self.kind().name(), uuid = %collection.uuid, items = collection.items.len())
    )]
    pub async fn write(&self, collection: &ContentCollection, trace_id: &str) -> Result<(), AppError> {
        collection.validate()?;

        if let Err(e) = self.repository.write(collection).await {
            tracing::error!(error = %e, code = e.code(), "Write failed");
            return Err(e);
        }
        tracing::info!("Collection written");
        Ok(())
    }

    /// Deletes a collection. Returns whether its node was removed from the graph.
    #[instrument(skip(self), fields(kind = %self.kind().name()))]
    pub async fn delete(&self, uuid: &str, trace_id: &str) -> Result<bool, AppError> {
        if uuid.trim().is_empty() {
            return Err(AppError::Validation("collection uuid must not be empty".into()));
        }

        match self.repository.delete(uuid).await {
            Ok(deleted) => {
                tracing::info!(deleted, "Collection deleted");
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(error = %e, code = e.code(), "Delete failed");
                Err(e)
            }
        }
    }

    /// Counts collections of this kind.
    #[instrument(skip(self), fields(kind = %self.kind().name()))]
    pub async fn count(&self) -> Result<u64, AppError> {
        self.repository.count().await
    }

    /// Decodes an inbound JSON payload into a collection and its UUID.
    pub fn decode_json<R: Read>(&self, reader: R) -> Result<(ContentCollection, String), AppError> {
        ContentCollection::decode(reader)
    }
}
