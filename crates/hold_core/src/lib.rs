//! # hold_core - Hold Core Primitives
//!
//! Zero-dependency identifier primitives shared by every Hold crate.
//! Slots, inventory nodes and viewers are identified by generational
//! [`Id`]s; archetypes and recipes are keyed by [`NamedId`]s with
//! precomputed hashes.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

pub mod id;

pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::id::{Id, IdGenerator, NamedId};
}
