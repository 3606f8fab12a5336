//! Graph abstraction layer for backend-agnostic store access.
//!
//! # Architecture
//!
//! - [`CypherExecutor`] - Execute statements (required for all graph backends)
//! - [`SchemaExecutor`] - Constraint introspection and creation
//! - [`Transaction`] - Transaction lifecycle (commit/rollback)
//! - [`GraphClient`] - Connection management and transaction creation
//!
//! Statements are never written as free-form strings by callers. They are
//! built from an [`Op`] whose labels and relationship types have been
//! validated as [`Identifier`]s.
//!
//! # Usage
//!
//! ```ignore
//! use content_collection::graph::{AccessMode, GraphClient, Op, Statement, Transaction};
//!
//! let txn = client.begin(AccessMode::Read).await?;
//! let result = txn.execute(&Statement::from(Op::Ping)).await?;
//! txn.commit().await?;
//! ```

mod row;
mod statement;
mod traits;

pub mod backends;

pub use row::{
    Counters, Params, QueryResult, Row, NODES_DELETED_COLUMN, RELATIONSHIPS_DELETED_COLUMN,
};
pub use statement::{
    columns, Identifier, Labels, NodeMatch, Op, Statement, ORDER_PROPERTY, THING_LABEL,
    UUID_PROPERTY,
};
pub use traits::{
    AccessMode, CypherExecutor, GraphClient, SchemaExecutor, Transaction, UniqueConstraint,
};
