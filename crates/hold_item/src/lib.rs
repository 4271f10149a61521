//! # hold_item - Item Stacks and Filters
//!
//! Data layer for the Hold inventory engine:
//!
//! - Item stacks (kind identity + quantity + instance data)
//! - Typed property values shared with archetype property maps
//! - Slot filters deciding which stacks a slot accepts
//!
//! # Example
//!
//! ```
//! use hold_item::{ItemStack, SlotFilter};
//!
//! let arrows = ItemStack::new("arrow", 32);
//! let filter = SlotFilter::KindOneOf(vec!["arrow".into()]);
//! assert!(filter.accepts(&arrows));
//! ```

pub mod filter;
pub mod property;
pub mod stack;

pub mod prelude {
    pub use crate::filter::SlotFilter;
    pub use crate::property::PropertyValue;
    pub use crate::stack::ItemStack;
}

pub use prelude::*;
