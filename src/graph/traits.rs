//! Core traits for graph store abstraction.
//!
//! This module defines the trait hierarchy that backends must implement:
//!
//! - [`CypherExecutor`] - Required for all graph backends
//! - [`SchemaExecutor`] - Optional, for backends that manage constraints
//! - [`Transaction`] - Transaction lifecycle management
//! - [`GraphClient`] - Connection management and transaction creation

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::row::QueryResult;
use crate::graph::statement::{Identifier, Statement};

/// Executes statements against a graph store.
///
/// This is the core trait that all graph backends must implement.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a statement and returns its rows and mutation counters.
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, AppError>;
}

/// Transaction lifecycle management.
///
/// Kept separate from the executor so transactions and auto-commit
/// clients share the same execution interface.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commits the transaction, making all changes permanent.
    ///
    /// Consumes the transaction - it cannot be used after commit.
    async fn commit(self) -> Result<(), AppError>;

    /// Rolls back the transaction, discarding all changes.
    ///
    /// Consumes the transaction - it cannot be used after rollback.
    async fn rollback(self) -> Result<(), AppError>;
}

/// Declared intent of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// A graph store client that can begin transactions.
///
/// Implementations typically wrap a connection pool.
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// The transaction type returned by this client.
    type Tx<'a>: Transaction + CypherExecutor
    where
        Self: 'a;

    /// Begins a new transaction with the given intent.
    ///
    /// The returned transaction must be either committed or rolled back.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let txn = client.begin(AccessMode::Write).await?;
    /// txn.execute(&statement).await?;
    /// txn.commit().await?;
    /// ```
    async fn begin(&self, mode: AccessMode) -> Result<Self::Tx<'_>, AppError>;

    /// Checks that the store is reachable and answering.
    async fn verify_connectivity(&self) -> Result<(), AppError>;
}

/// A uniqueness constraint on one label/property pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueConstraint {
    pub label: Identifier,
    pub property: Identifier,
}

impl std::fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}({})", self.label, self.property)
    }
}

/// Constraint introspection and creation.
///
/// Backends without a uniqueness-constraint primitive return
/// [`AppError::SchemaUnsupported`] so callers can degrade.
#[async_trait]
pub trait SchemaExecutor: Send + Sync {
    /// Lists the single-property uniqueness constraints on nodes.
    async fn unique_constraints(&self) -> Result<Vec<UniqueConstraint>, AppError>;

    /// Creates a uniqueness constraint.
    ///
    /// Returns [`AppError::ConstraintExists`] if an equivalent constraint
    /// is already in place.
    async fn create_unique_constraint(&self, constraint: &UniqueConstraint)
        -> Result<(), AppError>;
}
