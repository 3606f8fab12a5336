//! Schema repository: uniqueness constraints the collection kinds rely on.

use std::collections::BTreeSet;

use crate::error::AppError;
use crate::graph::{SchemaExecutor, UniqueConstraint};

/// Outcome of [`SchemaRepository::ensure_constraints`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintReport {
    /// Constraints created by this run.
    pub created: Vec<UniqueConstraint>,
    /// Constraints that were already in place.
    pub existing: Vec<UniqueConstraint>,
}

impl ConstraintReport {
    /// Whether the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
    }
}

/// Repository for constraint introspection and creation.
#[derive(Clone)]
pub struct SchemaRepository<C> {
    client: C,
}

impl<C: SchemaExecutor> SchemaRepository<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Makes sure every requested constraint exists.
    ///
    /// Existing constraints are listed first and skipped. A creation that
    /// races with another initializer and finds the constraint already
    /// present counts as existing.
    pub async fn ensure_constraints(
        &self,
        wanted: &[UniqueConstraint],
    ) -> Result<ConstraintReport, AppError> {
        let present: BTreeSet<UniqueConstraint> =
            self.client.unique_constraints().await?.into_iter().collect();

        let mut report = ConstraintReport::default();
        let mut seen = BTreeSet::new();

        for constraint in wanted {
            if !seen.insert(constraint.clone()) {
                continue;
            }
            if present.contains(constraint) {
                tracing::debug!(%constraint, "Constraint already present");
                report.existing.push(constraint.clone());
                continue;
            }

            match self.client.create_unique_constraint(constraint).await {
                Ok(()) => {
                    tracing::info!(%constraint, "Created uniqueness constraint");
                    report.created.push(constraint.clone());
                }
                Err(AppError::ConstraintExists { .. }) => {
                    tracing::debug!(%constraint, "Constraint created concurrently");
                    report.existing.push(constraint.clone());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
