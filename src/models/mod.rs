//! Domain models for content collections.

mod collection;
mod kind;

pub use collection::{ContentCollection, Item, LAST_MODIFIED, PUBLISH_REFERENCE};
pub use kind::{CollectionKind, BASE_LABEL};
