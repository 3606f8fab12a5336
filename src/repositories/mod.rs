//! Data access layer for graph operations.
//!
//! Repositories turn collection operations into transactions of
//! [`Statement`](crate::graph::Statement)s over any [`GraphClient`](crate::graph::GraphClient).

mod collection;
mod schema;

pub use collection::CollectionRepository;
pub use schema::{ConstraintReport, SchemaRepository};
