//! # hold_inventory - Hierarchical Container Inventories
//!
//! This crate provides the transactional inventory tree for Hold:
//!
//! - Slots as atomic leaves with filters and change listeners
//! - Composite nodes (rows, columns, grids, arbitrary children) whose
//!   aggregate operations fold their children in insertion order
//! - Transaction logs with preview/accept semantics and partial apply
//! - Queries building non-owning views over matching nodes
//! - Carrier references binding trees to their owning entity or fixture
//! - Archetype blueprints and the startup-time archetype registry
//! - The viewer/container boundary with silent-change bookkeeping
//!
//! # Example
//!
//! ```
//! use hold_inventory::prelude::*;
//! use hold_item::ItemStack;
//!
//! let backpack = Inventory::grid(3, 3);
//! let leftover = backpack.offer(ItemStack::new("arrow", 100)).remainder;
//! assert!(leftover.is_none());
//! assert_eq!(backpack.count_kind("arrow"), 100);
//!
//! let out = backpack.poll(30);
//! assert_eq!(out.polled.unwrap().quantity, 30);
//! ```

pub mod archetype;
pub mod carrier;
pub mod error;
pub mod node;
pub mod query;
pub mod recipe;
pub mod slot;
pub mod transaction;
pub mod viewer;

pub mod prelude {
    pub use crate::archetype::{
        ArchetypeKind, ArchetypeRegistry, FromProperty, InventoryArchetype, PropertyKey,
    };
    pub use crate::carrier::{Carrier, CarrierKind, CarrierRef};
    pub use crate::error::InventoryError;
    pub use crate::node::{GridLayout, Inventory, InventoryNode, Shape};
    pub use crate::query::{Query, QueryResult};
    pub use crate::recipe::{CraftingGrid, RecipeRef, RecipeSource, WorldId};
    pub use crate::slot::{Slot, SlotDelta, SlotId, SlotRef};
    pub use crate::transaction::{
        AcceptOutcome, OfferResult, PollResult, SlotTransaction, TransactionResult,
        TransactionStatus,
    };
    pub use crate::viewer::{
        ClientSlotHandle, ContainerHandle, ContainerProvider, SlotChange, SlotChangeKey,
        ViewerHook, ViewerId, WatchToken,
    };
}

pub use prelude::*;
