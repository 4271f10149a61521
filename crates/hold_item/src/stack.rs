//! Item stacks

use crate::property::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stack of items: kind identity, quantity and instance data
///
/// A zero-quantity stack is the distinguished "no item" state; the slot
/// layer normalizes it to `None` rather than storing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item kind identity
    pub kind: String,
    /// Quantity
    pub quantity: u32,
    /// Instance-specific properties (durability, charges, etc.)
    pub data: HashMap<String, PropertyValue>,
}

impl ItemStack {
    /// Create a new item stack
    pub fn new(kind: impl Into<String>, quantity: u32) -> Self {
        Self {
            kind: kind.into(),
            quantity: quantity.max(1),
            data: HashMap::new(),
        }
    }

    /// Create a single item
    pub fn single(kind: impl Into<String>) -> Self {
        Self::new(kind, 1)
    }

    /// Set instance data
    pub fn with_data(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Get an instance data value
    pub fn data_value(&self, key: &str) -> Option<&PropertyValue> {
        self.data.get(key)
    }

    /// Check if this stack is empty
    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Grow this stack up to `cap` (returns overflow if any)
    pub fn grow(&mut self, amount: u32, cap: u32) -> u32 {
        let space = cap.saturating_sub(self.quantity);
        let to_add = amount.min(space);
        self.quantity += to_add;
        amount - to_add
    }

    /// Shrink this stack (returns amount actually removed)
    pub fn shrink(&mut self, amount: u32) -> u32 {
        let to_remove = amount.min(self.quantity);
        self.quantity -= to_remove;
        to_remove
    }

    /// Split this stack, leaving the rest behind
    pub fn split(&mut self, amount: u32) -> Option<ItemStack> {
        if amount > 0 && amount < self.quantity {
            self.quantity -= amount;
            Some(ItemStack {
                kind: self.kind.clone(),
                quantity: amount,
                data: self.data.clone(),
            })
        } else {
            None
        }
    }

    /// Check if stacks can be merged (same kind and equal instance data)
    pub fn can_merge(&self, other: &ItemStack) -> bool {
        self.kind == other.kind && self.data == other.data
    }

    /// Merge another stack into this one, up to `cap`
    ///
    /// The other stack keeps whatever did not fit.
    pub fn merge(&mut self, other: &mut ItemStack, cap: u32) -> bool {
        if !self.can_merge(other) {
            return false;
        }
        let overflow = self.grow(other.quantity, cap);
        other.quantity = overflow;
        true
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self::single("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_shrink() {
        let mut stack = ItemStack::new("gold_coin", 50);

        let overflow = stack.grow(60, 99);
        assert_eq!(stack.quantity, 99);
        assert_eq!(overflow, 11);

        let removed = stack.shrink(20);
        assert_eq!(removed, 20);
        assert_eq!(stack.quantity, 79);
    }

    #[test]
    fn test_shrink_to_empty() {
        let mut stack = ItemStack::new("arrow", 5);
        assert_eq!(stack.shrink(10), 5);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_split() {
        let mut stack = ItemStack::new("arrow", 50);

        let split = stack.split(20);
        assert_eq!(stack.quantity, 30);
        assert_eq!(split.unwrap().quantity, 20);

        // Splitting the whole stack or nothing is refused
        assert!(stack.split(0).is_none());
        assert!(stack.split(30).is_none());
    }

    #[test]
    fn test_merge() {
        let mut a = ItemStack::new("gold", 30);
        let mut b = ItemStack::new("gold", 40);

        assert!(a.merge(&mut b, 50));
        assert_eq!(a.quantity, 50);
        assert_eq!(b.quantity, 20);
    }

    #[test]
    fn test_merge_respects_instance_data() {
        let mut plain = ItemStack::new("sword", 1);
        let mut enchanted =
            ItemStack::new("sword", 1).with_data("charges", PropertyValue::Int(3));

        assert!(!plain.can_merge(&enchanted));
        assert!(!plain.merge(&mut enchanted, 64));
    }

    #[test]
    fn test_serde_round_trip() {
        let stack = ItemStack::new("potion", 3).with_data("charges", PropertyValue::Int(2));
        let json = serde_json::to_string(&stack).unwrap();
        let back: ItemStack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stack);
    }
}
