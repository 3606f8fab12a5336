//! Application context: one shared graph client and a service per collection kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::graph::{GraphClient, SchemaExecutor};
use crate::models::CollectionKind;
use crate::repositories::ConstraintReport;
use crate::services::CollectionService;

/// Failure of one kind during [`Context::check_all`].
#[derive(Debug)]
pub struct KindFailure {
    pub kind: String,
    pub error: AppError,
}

/// Root application context.
///
/// Every service shares the same client, so kinds share one connection pool.
#[derive(Clone)]
pub struct Context<C> {
    pub client: C,
    pub config: Arc<Config>,
    services: BTreeMap<String, CollectionService<C>>,
}

impl<C> Context<C>
where
    C: GraphClient + SchemaExecutor + Clone,
{
    /// Builds a service for every configured kind.
    ///
    /// Fails if a kind has an invalid label or relation, or if two kinds share a name.
    pub fn new(client: C, config: Config) -> Result<Self, AppError> {
        let mut services = BTreeMap::new();
        for kind_config in config.effective_collections() {
            let kind = CollectionKind::from_config(&kind_config)?;
            let name = kind.name().to_string();
            if services
                .insert(name.clone(), CollectionService::new(client.clone(), kind))
                .is_some()
            {
                return Err(AppError::Validation(format!(
                    "collection kind {} configured twice",
                    name
                )));
            }
        }

        Ok(Self {
            client,
            config: Arc::new(config),
            services,
        })
    }

    /// Looks up the service for a kind by name.
    pub fn service(&self, kind: &str) -> Result<&CollectionService<C>, AppError> {
        self.services
            .get(kind)
            .ok_or_else(|| AppError::UnknownKind(kind.to_string()))
    }

    /// Names of the served kinds.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Runs the schema initializer for every kind, stopping at the first failure.
    pub async fn initialise_all(&self) -> Result<Vec<(String, ConstraintReport)>, AppError> {
        let mut reports = Vec::with_capacity(self.services.len());
        for (name, service) in &self.services {
            reports.push((name.clone(), service.initialise().await?));
        }
        Ok(reports)
    }

    /// Checks connectivity for every kind and collects the failures.
    pub async fn check_all(&self) -> Vec<KindFailure> {
        let mut failures = Vec::new();
        for (name, service) in &self.services {
            if let Err(error) = service.check().await {
                failures.push(KindFailure {
                    kind: name.clone(),
                    error,
                });
            }
        }
        failures
    }
}
