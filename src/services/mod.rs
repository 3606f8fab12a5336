//! Business logic services.
//!
//! Services validate input and wrap repository calls in tracing spans.

mod collection;

pub use collection::CollectionService;
