//! Crafting boundary
//!
//! Recipe matching is an external service: the core only hands a grid to
//! a [`RecipeSource`] and receives an opaque match back. The crafting
//! wrapper keeps a result-preview slot updated through the silent change
//! path, so clients see the preview refresh without a stack mutation
//! notification.

use crate::node::{Inventory, InventoryNode};
use crate::slot::{Slot, SlotRef};
use crate::viewer::SlotChangeKey;
use hold_core::NamedId;
use hold_item::ItemStack;
use std::sync::Arc;

/// Opaque world context token passed through to recipe lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(pub u64);

/// An opaque matched recipe
#[derive(Debug, Clone)]
pub struct RecipeRef {
    /// Registry key of the recipe
    pub key: NamedId,
    /// The stack the recipe produces
    pub result: ItemStack,
}

/// External recipe lookup service
pub trait RecipeSource: Send + Sync {
    /// Find a recipe matching the current grid contents, if any
    fn find_matching_recipe(&self, grid: &Inventory, world: WorldId) -> Option<RecipeRef>;
}

/// A crafting grid plus its result-preview slot
pub struct CraftingGrid {
    root: Arc<Inventory>,
    grid: Arc<Inventory>,
    result: SlotRef,
}

impl CraftingGrid {
    /// Build a `rows` x `cols` crafting grid with a preview slot
    pub fn new(rows: usize, cols: usize) -> Self {
        let grid = Inventory::grid(rows, cols);
        let result = Slot::new_ref();
        let root = Inventory::composite(vec![
            InventoryNode::Inventory(grid.clone()),
            InventoryNode::Slot(result.clone()),
        ]);
        Self { root, grid, result }
    }

    /// The composite over grid and preview slot
    pub fn root(&self) -> &Arc<Inventory> {
        &self.root
    }

    /// The ingredient grid
    pub fn grid(&self) -> &Arc<Inventory> {
        &self.grid
    }

    /// The result-preview slot
    pub fn result_slot(&self) -> &SlotRef {
        &self.result
    }

    /// Re-match the grid against the recipe source and update the preview
    ///
    /// The preview slot changes silently: internal bookkeeping updates
    /// and viewers receive a silent change, not a stack notification.
    pub fn refresh(&self, source: &dyn RecipeSource, world: WorldId) -> Option<RecipeRef> {
        let recipe = source.find_matching_recipe(&self.grid, world);
        let preview = recipe.as_ref().map(|r| r.result.clone());
        self.result.replace_silent(preview);
        self.root
            .queue_silent_slot_change(SlotChangeKey::Slot(self.result.id()));
        recipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Matches three of a kind anywhere in the grid
    struct ThreeOfAKind;

    impl RecipeSource for ThreeOfAKind {
        fn find_matching_recipe(&self, grid: &Inventory, _world: WorldId) -> Option<RecipeRef> {
            let kinds: Vec<String> = grid
                .slots()
                .iter()
                .filter_map(|slot| slot.with_raw(|raw| raw.map(|s| s.kind.clone())))
                .collect();
            let first = kinds.first()?;
            (kinds.len() == 3 && kinds.iter().all(|k| k == first)).then(|| RecipeRef {
                key: NamedId::new("hold:compress"),
                result: ItemStack::new(format!("{first}_block"), 1),
            })
        }
    }

    #[test]
    fn test_refresh_updates_preview() {
        let crafting = CraftingGrid::new(3, 3);
        for index in 0..3 {
            crafting
                .grid()
                .set(index, Some(ItemStack::new("iron", 1)))
                .unwrap();
        }

        let recipe = crafting.refresh(&ThreeOfAKind, WorldId(1));
        assert_eq!(recipe.unwrap().key, NamedId::new("hold:compress"));
        assert_eq!(crafting.result_slot().stack().unwrap().kind, "iron_block");
    }

    #[test]
    fn test_refresh_clears_preview_when_no_match() {
        let crafting = CraftingGrid::new(3, 3);
        crafting
            .grid()
            .set(0, Some(ItemStack::new("iron", 1)))
            .unwrap();

        assert!(crafting.refresh(&ThreeOfAKind, WorldId(1)).is_none());
        assert!(crafting.result_slot().is_empty());
    }
}
