//! Query engine
//!
//! Queries walk the tree depth-first in child order and collect matching
//! nodes into a `Shape::Query` view: a non-owning projection over the
//! same underlying slots. Mutating through a query result mutates the
//! original tree. Traversal short-circuits through the standard
//! `ControlFlow` signal rather than a sentinel error.

use crate::error::InventoryError;
use crate::node::{Inventory, InventoryNode, Shape};
use hold_item::PropertyValue;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Predicate over inventory nodes
#[derive(Clone)]
pub enum Query {
    /// Slots holding a stack of the given kind
    KindIs(String),
    /// Slots holding any stack
    HasItem,
    /// Slots holding nothing
    EmptySlots,
    /// Composite nodes of the given shape
    Shape(Shape),
    /// Composite nodes carrying the given property value
    Property {
        /// Property key
        key: String,
        /// Expected value
        value: PropertyValue,
    },
    /// Arbitrary predicate
    Custom(Arc<dyn Fn(&InventoryNode) -> bool + Send + Sync>),
}

impl Query {
    /// Create a custom query from a closure
    pub fn custom(f: impl Fn(&InventoryNode) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Reject malformed predicates before walking the tree
    pub fn validate(&self) -> Result<(), InventoryError> {
        match self {
            Self::KindIs(kind) if kind.is_empty() => Err(InventoryError::MalformedQuery(
                "empty item kind".into(),
            )),
            Self::Property { key, .. } if key.is_empty() => Err(InventoryError::MalformedQuery(
                "empty property key".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether this predicate holds for the given node
    pub fn matches(&self, node: &InventoryNode) -> bool {
        match self {
            Self::KindIs(kind) => node
                .as_slot()
                .map_or(false, |slot| {
                    slot.with_raw(|raw| raw.map_or(false, |s| s.kind == *kind))
                }),
            Self::HasItem => node.as_slot().map_or(false, |slot| !slot.is_empty()),
            Self::EmptySlots => node.as_slot().map_or(false, |slot| slot.is_empty()),
            Self::Shape(shape) => node
                .as_inventory()
                .map_or(false, |inv| inv.shape() == *shape),
            Self::Property { key, value } => node
                .as_inventory()
                .map_or(false, |inv| inv.property(key).as_ref() == Some(value)),
            Self::Custom(f) => f(node),
        }
    }

    /// Slots matching the given kind
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::KindIs(kind.into())
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindIs(kind) => f.debug_tuple("KindIs").field(kind).finish(),
            Self::HasItem => f.write_str("HasItem"),
            Self::EmptySlots => f.write_str("EmptySlots"),
            Self::Shape(shape) => f.debug_tuple("Shape").field(shape).finish(),
            Self::Property { key, value } => f
                .debug_struct("Property")
                .field("key", key)
                .field("value", value)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The matched nodes of one query, exposed as a non-owning view
pub struct QueryResult {
    view: Arc<Inventory>,
}

impl QueryResult {
    /// The view inventory over the matched nodes
    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.view
    }

    /// Number of matched nodes
    pub fn len(&self) -> usize {
        self.view.children().len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.view.children().is_empty()
    }

    /// The first matched node in traversal order
    ///
    /// An empty result is [`InventoryError::EmptyQueryResult`], distinct
    /// from the malformed-predicate error `query` itself reports.
    pub fn first(&self) -> Result<InventoryNode, InventoryError> {
        self.view
            .children()
            .first()
            .cloned()
            .ok_or(InventoryError::EmptyQueryResult)
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("matches", &self.len())
            .finish()
    }
}

impl Inventory {
    /// Collect all nodes matching the predicate into a view
    ///
    /// A matching composite is taken whole and its subtree is not
    /// re-entered, so no slot appears twice in one view.
    pub fn query(&self, query: &Query) -> Result<QueryResult, InventoryError> {
        query.validate()?;
        let mut matches = Vec::new();
        let _ = self.collect_matches(query, &mut |node| {
            matches.push(node);
            ControlFlow::Continue(())
        });
        log::trace!("query {:?} matched {} nodes", query, matches.len());
        let view = Inventory::new(Shape::Query);
        view.init_with_children(matches);
        Ok(QueryResult { view })
    }

    /// The first node matching the predicate, stopping the walk early
    pub fn find_first(&self, query: &Query) -> Result<InventoryNode, InventoryError> {
        query.validate()?;
        let mut found = None;
        let _ = self.collect_matches(query, &mut |node| {
            found = Some(node);
            ControlFlow::Break(())
        });
        found.ok_or(InventoryError::EmptyQueryResult)
    }

    fn collect_matches(
        &self,
        query: &Query,
        add: &mut dyn FnMut(InventoryNode) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for child in self.children() {
            if query.matches(child) {
                add(child.clone())?;
            } else if let InventoryNode::Inventory(inv) = child {
                inv.collect_matches(query, add)?;
            }
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{Slot, SlotRef};
    use hold_item::ItemStack;

    fn filled_slot(kind: &str, quantity: u32) -> SlotRef {
        let slot = Slot::new_ref();
        slot.set(Some(ItemStack::new(kind, quantity)));
        slot
    }

    fn sample_tree() -> Arc<Inventory> {
        let hotbar = Inventory::new(Shape::Row);
        hotbar.init_with_slots(
            vec![
                filled_slot("sword", 1),
                filled_slot("coal", 10),
                Slot::new_ref(),
            ],
            (1, 3),
        );
        let storage = Inventory::grid(2, 2);
        storage.slot(0).unwrap().set(Some(ItemStack::new("coal", 5)));
        Inventory::composite(vec![
            InventoryNode::Inventory(hotbar),
            InventoryNode::Inventory(storage),
        ])
    }

    #[test]
    fn test_kind_query_matches_slots_in_order() {
        let root = sample_tree();
        let result = root.query(&Query::kind("coal")).unwrap();
        assert_eq!(result.len(), 2);

        // View is a projection over the same slots
        let view = result.inventory();
        assert_eq!(view.count_kind("coal"), 15);
        view.poll(20);
        assert_eq!(root.count_kind("coal"), 0);
    }

    #[test]
    fn test_empty_slots_query() {
        let root = sample_tree();
        let result = root.query(&Query::EmptySlots).unwrap();
        // One empty hotbar slot plus three empty storage slots
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_shape_query_takes_composite_whole() {
        let root = sample_tree();
        let result = root
            .query(&Query::Shape(Shape::Grid { rows: 2, cols: 2 }))
            .unwrap();
        assert_eq!(result.len(), 1);
        let node = result.first().unwrap();
        assert_eq!(node.as_inventory().unwrap().capacity(), 4);
    }

    #[test]
    fn test_property_query() {
        let root = sample_tree();
        root.children()[0]
            .as_inventory()
            .unwrap()
            .set_property("title", PropertyValue::from("hotbar"));

        let result = root
            .query(&Query::Property {
                key: "title".into(),
                value: PropertyValue::from("hotbar"),
            })
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_first_on_empty_result() {
        let root = sample_tree();
        let result = root.query(&Query::kind("dragon_egg")).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.first().unwrap_err(), InventoryError::EmptyQueryResult);
    }

    #[test]
    fn test_malformed_query_is_distinct_error() {
        let root = sample_tree();
        let err = root.query(&Query::KindIs(String::new())).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedQuery(_)));
        assert_ne!(err, InventoryError::EmptyQueryResult);
    }

    #[test]
    fn test_find_first_stops_early() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let root = sample_tree();
        let evaluated = Arc::new(AtomicUsize::new(0));

        let counter = evaluated.clone();
        let query = Query::custom(move |node| {
            counter.fetch_add(1, Ordering::SeqCst);
            node.as_slot().is_some()
        });

        let node = root.find_first(&query).unwrap();
        assert!(node.as_slot().is_some());
        // The walk evaluated the hotbar composite and its first slot,
        // then stopped without visiting the rest of the tree.
        assert_eq!(evaluated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_query_idempotence() {
        let root = sample_tree();
        let query = Query::kind("coal");
        let a = root.query(&query).unwrap();
        let b = root.query(&query).unwrap();

        let ids_a: Vec<_> = a.inventory().slots().iter().map(|s| s.id()).collect();
        let ids_b: Vec<_> = b.inventory().slots().iter().map(|s| s.id()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
