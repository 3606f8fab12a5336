//! Backend implementations for graph stores.
//!
//! Each backend implements the core traits from [`crate::graph`]:
//!
//! - [`CypherExecutor`](crate::graph::CypherExecutor) - Required
//! - [`Transaction`](crate::graph::Transaction) - Required
//! - [`GraphClient`](crate::graph::GraphClient) - Required
//! - [`SchemaExecutor`](crate::graph::SchemaExecutor) - Required by the schema initializer
//!
//! # Available Backends
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | Neo4j (Bolt, via neo4rs) | [`neo4j`] | Production |
//! | In-memory property graph | [`memory`] | Tests and local runs |

pub mod memory;
pub mod neo4j;
