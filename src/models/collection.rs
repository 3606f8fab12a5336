//! Content collection payload model.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Property holding the publishing transaction reference.
pub const PUBLISH_REFERENCE: &str = "publishReference";

/// Property holding the last modification timestamp.
pub const LAST_MODIFIED: &str = "lastModified";

/// An ordered grouping of content references.
///
/// `publishReference` and `lastModified` are opaque strings, stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCollection {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default)]
    pub publish_reference: String,
    #[serde(default)]
    pub last_modified: String,
    /// Accepted on input, never persisted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publication: Vec<String>,
}

/// A reference to a shared `Thing` node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub uuid: String,
}

impl Item {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

impl ContentCollection {
    /// Creates a collection with the given items and empty attributes.
    pub fn new<I, S>(uuid: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuid: uuid.into(),
            items: items.into_iter().map(|u| Item::new(u)).collect(),
            ..Default::default()
        }
    }

    /// Decodes a JSON payload and validates it.
    ///
    /// Returns the collection together with its UUID.
    pub fn decode<R: Read>(reader: R) -> Result<(Self, String), AppError> {
        let collection: ContentCollection = serde_json::from_reader(reader)?;
        collection.validate()?;
        let uuid = collection.uuid.clone();
        Ok((collection, uuid))
    }

    /// Rejects collections that would break the graph shape.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.uuid.trim().is_empty() {
            return Err(AppError::Validation("collection uuid must not be empty".into()));
        }
        if let Some(position) = self.items.iter().position(|i| i.uuid.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "item at position {} has an empty uuid",
                position + 1
            )));
        }
        Ok(())
    }

    /// Scalar properties written onto the collection node.
    pub fn node_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (PUBLISH_REFERENCE.to_string(), self.publish_reference.clone()),
            (LAST_MODIFIED.to_string(), self.last_modified.clone()),
        ])
    }
}
