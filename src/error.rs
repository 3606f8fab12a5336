//! Application error types with stable error codes.

use std::fmt;

use thiserror::Error;

/// Step of a write or delete transaction, used to name the failing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Opening the transaction.
    Begin,
    /// Removing the outgoing membership edges.
    RelationshipCleanup,
    /// Removing the outgoing extra-relation edges.
    ExtraRelationshipCleanup,
    /// Upserting the collection node and overwriting its properties.
    NodeMerge,
    /// Creating the membership edge for the item at this 1-based position.
    ItemEdge(usize),
    /// Removing the kind labels from the node.
    LabelRemoval,
    /// Conditionally deleting the detached node.
    NodeDeletion,
    /// Committing the transaction.
    Commit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Begin => f.write_str("transaction begin"),
            Phase::RelationshipCleanup => f.write_str("relationship cleanup"),
            Phase::ExtraRelationshipCleanup => f.write_str("extra relationship cleanup"),
            Phase::NodeMerge => f.write_str("node property merge"),
            Phase::ItemEdge(position) => write!(f, "item edge creation (position {})", position),
            Phase::LabelRemoval => f.write_str("label removal"),
            Phase::NodeDeletion => f.write_str("node deletion"),
            Phase::Commit => f.write_str("transaction commit"),
        }
    }
}

/// Coarse classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, rejected before any mutation.
    Validation,
    /// A step of a transaction failed and everything was rolled back.
    Transaction,
    /// The graph store could not be reached or returned a driver error.
    Infrastructure,
    /// The graph store lacks a schema primitive the caller asked for.
    SchemaUnsupported,
    /// Misconfiguration of the process.
    Configuration,
}

/// Application-level errors for content collection storage.
#[derive(Error, Debug)]
pub enum AppError {
    // Neo4j errors
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Query error: {message}")]
    Query { message: String, query: String },

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    // Transaction errors
    #[error("{phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<AppError>,
    },

    // Schema errors
    #[error("Schema operation not supported by the graph store: {0}")]
    SchemaUnsupported(String),

    #[error("Constraint already exists on :{label}({property})")]
    ConstraintExists { label: String, property: String },

    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid identifier {0:?}: expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier(String),

    #[error("Failed to decode collection: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unknown collection kind: {0}")]
    UnknownKind(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps the error with the transaction phase it happened in.
    pub fn during(self, phase: Phase) -> Self {
        AppError::Phase {
            phase,
            source: Box::new(self),
        }
    }

    /// The failed phase, if this error came out of a transaction step.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            AppError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Classifies the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Validation(_)
            | AppError::InvalidIdentifier(_)
            | AppError::Decode(_)
            | AppError::UnknownKind(_) => ErrorCategory::Validation,
            AppError::Phase { .. } => ErrorCategory::Transaction,
            AppError::SchemaUnsupported(_) => ErrorCategory::SchemaUnsupported,
            AppError::Config(_) => ErrorCategory::Configuration,
            AppError::Neo4j(_)
            | AppError::Query { .. }
            | AppError::Unavailable(_)
            | AppError::ConstraintExists { .. }
            | AppError::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Neo4j(_) => "NEO4J_ERROR",
            AppError::Query { .. } => "QUERY_ERROR",
            AppError::Unavailable(_) => "STORE_UNAVAILABLE",
            AppError::Phase { .. } => "TRANSACTION_FAILED",
            AppError::SchemaUnsupported(_) => "SCHEMA_UNSUPPORTED",
            AppError::ConstraintExists { .. } => "CONSTRAINT_EXISTS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::Decode(_) => "DECODE_ERROR",
            AppError::UnknownKind(_) => "UNKNOWN_KIND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
