//! Content collection store
//!
//! Persists ordered content collections as nodes and ordered edges in a
//! property graph, with replace-all writes and deletes that never remove
//! nodes other subsystems still reference.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod models;
pub mod repositories;
pub mod services;
