//! Slot filters

use crate::stack::ItemStack;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding which stacks a slot accepts
#[derive(Clone)]
pub enum SlotFilter {
    /// Accept only the listed kinds
    KindOneOf(Vec<String>),
    /// Accept everything except the listed kinds
    KindNoneOf(Vec<String>),
    /// Arbitrary predicate
    Custom(Arc<dyn Fn(&ItemStack) -> bool + Send + Sync>),
}

impl SlotFilter {
    /// Create a custom filter from a closure
    pub fn custom(f: impl Fn(&ItemStack) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Check whether a stack passes this filter
    pub fn accepts(&self, stack: &ItemStack) -> bool {
        match self {
            Self::KindOneOf(kinds) => kinds.iter().any(|k| *k == stack.kind),
            Self::KindNoneOf(kinds) => !kinds.iter().any(|k| *k == stack.kind),
            Self::Custom(f) => f(stack),
        }
    }
}

impl fmt::Debug for SlotFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindOneOf(kinds) => f.debug_tuple("KindOneOf").field(kinds).finish(),
            Self::KindNoneOf(kinds) => f.debug_tuple("KindNoneOf").field(kinds).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_filters() {
        let arrows_only = SlotFilter::KindOneOf(vec!["arrow".into()]);
        assert!(arrows_only.accepts(&ItemStack::single("arrow")));
        assert!(!arrows_only.accepts(&ItemStack::single("sword")));

        let no_quest = SlotFilter::KindNoneOf(vec!["quest_scroll".into()]);
        assert!(no_quest.accepts(&ItemStack::single("sword")));
        assert!(!no_quest.accepts(&ItemStack::single("quest_scroll")));
    }

    #[test]
    fn test_custom_filter() {
        let small_only = SlotFilter::custom(|stack| stack.quantity <= 4);
        assert!(small_only.accepts(&ItemStack::new("gem", 4)));
        assert!(!small_only.accepts(&ItemStack::new("gem", 5)));
    }
}
