//! Error types for inventory operations
//!
//! Only expected-failure conditions are represented here. Structural bugs
//! in tree assembly (double initialization, use before initialization)
//! abort with a panic instead, and the query walk's stop signal is
//! `core::ops::ControlFlow`, not an error.

use thiserror::Error;

/// Inventory operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// A query matched no nodes and `first()` was requested
    #[error("query matched no nodes")]
    EmptyQueryResult,

    /// The query predicate itself is malformed
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// No archetype is registered under the given key
    #[error("unknown archetype: {0}")]
    UnknownArchetype(String),

    /// A positional operation addressed a slot outside the tree
    #[error("slot index {index} out of bounds (capacity {capacity})")]
    SlotOutOfBounds { index: usize, capacity: usize },
}
