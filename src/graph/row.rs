//! Row and result types for statement execution.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Parameters for Cypher statements.
///
/// A map of parameter names to JSON values bound to `$name` placeholders.
pub type Params = HashMap<String, JsonValue>;

/// A single row from a statement result.
///
/// Contains column values as JSON, with typed extraction via [`Row::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    data: HashMap<String, JsonValue>,
}

impl Row {
    /// Adds a column, returning the row. Used by backends assembling rows.
    pub fn with(mut self, column: &str, value: JsonValue) -> Self {
        self.data.insert(column.to_string(), value);
        self
    }

    /// Gets a value from the row by column name, deserializing to the requested type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not found or if deserialization fails.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        self.data
            .get(key)
            .ok_or_else(|| AppError::Internal(format!("column not found: {}", key)))
            .and_then(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    AppError::Internal(format!("failed to deserialize '{}': {}", key, e))
                })
            })
    }

    /// Gets a value from the row, returning `None` if the key doesn't exist or is null.
    ///
    /// Still returns an error if the key exists but deserialization fails.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.data.get(key) {
            Some(v) if v.is_null() => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e))),
            None => Ok(None),
        }
    }
}

/// Mutation counters of a single statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub nodes_deleted: u64,
    pub relationships_deleted: u64,
}

/// Column through which a statement reports its deleted node count.
pub const NODES_DELETED_COLUMN: &str = "nodesDeleted";

/// Column through which a statement reports its deleted relationship count.
pub const RELATIONSHIPS_DELETED_COLUMN: &str = "relationshipsDeleted";

impl Counters {
    /// Reads the deletion counters a statement reported in its result rows.
    ///
    /// Mutating statements end in `RETURN count(..) AS nodesDeleted` (or
    /// `relationshipsDeleted`), so the count comes from the same statement
    /// that performed the mutation.
    pub fn from_rows(rows: &[Row]) -> Result<Self, AppError> {
        let mut counters = Counters::default();
        for row in rows {
            if let Some(n) = row.get_opt::<u64>(NODES_DELETED_COLUMN)? {
                counters.nodes_deleted += n;
            }
            if let Some(n) = row.get_opt::<u64>(RELATIONSHIPS_DELETED_COLUMN)? {
                counters.relationships_deleted += n;
            }
        }
        Ok(counters)
    }
}

/// Rows and mutation counters produced by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub counters: Counters,
}

impl QueryResult {
    /// Returns the first row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}
