//! Inventory archetypes
//!
//! An archetype is an immutable blueprint for instantiating inventory
//! trees: a keyed node kind, ordered child blueprints and a named
//! property map. Archetypes are registered once at startup into an
//! [`ArchetypeRegistry`] that is passed by reference wherever trees are
//! built; nothing is looked up through ambient globals.

use crate::error::InventoryError;
use crate::node::{Inventory, InventoryNode, Shape};
use crate::slot::{Slot, DEFAULT_MAX_STACK_SIZE};
use hold_core::NamedId;
use hold_item::PropertyValue;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Blueprint node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchetypeKind {
    /// A single slot leaf
    Slot,
    /// 1 x N positional composite
    Row,
    /// N x 1 positional composite
    Column,
    /// rows x cols positional composite
    Grid,
    /// Arbitrary ordered children
    Composite,
}

/// Typed lookup key into an archetype property map
pub struct PropertyKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromProperty> PropertyKey<T> {
    /// Create a typed key for the given property name
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The underlying string key
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up and convert the property on an archetype
    pub fn get(&self, archetype: &InventoryArchetype) -> Option<T> {
        archetype.property(self.name).and_then(T::from_property)
    }
}

/// Conversion from a stored property value
pub trait FromProperty: Sized {
    /// Convert, yielding `None` on a type mismatch
    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromProperty for i64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_int()
    }
}

impl FromProperty for f64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_float()
    }
}

impl FromProperty for bool {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromProperty for String {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

/// Well-known archetype property keys
pub mod keys {
    use super::PropertyKey;

    /// Grid row count
    pub const ROWS: PropertyKey<i64> = PropertyKey::new("rows");
    /// Grid column count
    pub const COLS: PropertyKey<i64> = PropertyKey::new("cols");
    /// Slot count for childless rows and columns
    pub const CAPACITY: PropertyKey<i64> = PropertyKey::new("capacity");
    /// Maximum stack size applied to generated slots
    pub const MAX_STACK_SIZE: PropertyKey<i64> = PropertyKey::new("max_stack_size");
    /// Display title
    pub const TITLE: PropertyKey<String> = PropertyKey::new("title");
}

/// Immutable blueprint for instantiating an inventory tree
#[derive(Debug)]
pub struct InventoryArchetype {
    key: NamedId,
    kind: ArchetypeKind,
    children: Vec<Arc<InventoryArchetype>>,
    properties: HashMap<String, PropertyValue>,
}

impl InventoryArchetype {
    /// Start building an archetype
    pub fn builder(key: impl Into<NamedId>, kind: ArchetypeKind) -> ArchetypeBuilder {
        ArchetypeBuilder {
            key: key.into(),
            kind,
            children: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// The registry key
    pub fn key(&self) -> &NamedId {
        &self.key
    }

    /// The blueprint node kind
    pub fn kind(&self) -> ArchetypeKind {
        self.kind
    }

    /// Child blueprints, in instantiation order
    pub fn children(&self) -> &[Arc<InventoryArchetype>] {
        &self.children
    }

    /// Look up a property by string key
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Enumerate the property keys
    pub fn property_keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// Builder for [`InventoryArchetype`]
pub struct ArchetypeBuilder {
    key: NamedId,
    kind: ArchetypeKind,
    children: Vec<Arc<InventoryArchetype>>,
    properties: HashMap<String, PropertyValue>,
}

impl ArchetypeBuilder {
    /// Append a child blueprint
    pub fn with_child(mut self, child: Arc<InventoryArchetype>) -> Self {
        self.children.push(child);
        self
    }

    /// Set a named property
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the slot count for a childless row or column
    pub fn with_slots(self, count: i64) -> Self {
        self.with_property(keys::CAPACITY.name(), count)
    }

    /// Finish the blueprint
    ///
    /// Panics on structurally incomplete blueprints (a grid without
    /// dimensions, a childless row without a capacity): these are
    /// registration-time programming errors.
    pub fn build(self) -> Arc<InventoryArchetype> {
        let archetype = InventoryArchetype {
            key: self.key,
            kind: self.kind,
            children: self.children,
            properties: self.properties,
        };
        match archetype.kind {
            ArchetypeKind::Grid => {
                if keys::ROWS.get(&archetype).is_none() || keys::COLS.get(&archetype).is_none() {
                    panic!("archetype {}: grid requires rows and cols", archetype.key);
                }
            }
            ArchetypeKind::Row | ArchetypeKind::Column => {
                if archetype.children.is_empty() && keys::CAPACITY.get(&archetype).is_none() {
                    panic!(
                        "archetype {}: childless {:?} requires a capacity",
                        archetype.key, archetype.kind
                    );
                }
            }
            ArchetypeKind::Slot | ArchetypeKind::Composite => {}
        }
        Arc::new(archetype)
    }
}

/// Immutable lookup table of registered archetypes
///
/// Built once at startup and passed by reference to whatever constructs
/// inventory trees.
pub struct ArchetypeRegistry {
    by_key: HashMap<NamedId, Arc<InventoryArchetype>>,
}

impl ArchetypeRegistry {
    /// Start building an empty registry
    pub fn builder() -> ArchetypeRegistryBuilder {
        ArchetypeRegistryBuilder {
            by_key: HashMap::new(),
        }
    }

    /// Start building a registry seeded with the standard archetypes
    pub fn with_defaults() -> ArchetypeRegistryBuilder {
        Self::builder()
            .register(InventoryArchetype::builder("hold:slot", ArchetypeKind::Slot).build())
            .register(
                InventoryArchetype::builder("hold:row", ArchetypeKind::Row)
                    .with_slots(9)
                    .build(),
            )
            .register(
                InventoryArchetype::builder("hold:column", ArchetypeKind::Column)
                    .with_slots(9)
                    .build(),
            )
            .register(
                InventoryArchetype::builder("hold:grid", ArchetypeKind::Grid)
                    .with_property(keys::ROWS.name(), 3i64)
                    .with_property(keys::COLS.name(), 3i64)
                    .build(),
            )
            .register(
                InventoryArchetype::builder("hold:composite", ArchetypeKind::Composite).build(),
            )
    }

    /// Look up an archetype by key
    pub fn get(&self, key: &str) -> Option<&Arc<InventoryArchetype>> {
        self.by_key.get(&NamedId::new(key))
    }

    /// Enumerate the registered keys
    pub fn keys(&self) -> impl Iterator<Item = &NamedId> {
        self.by_key.keys()
    }

    /// Number of registered archetypes
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Instantiate a concrete tree from a registered blueprint
    pub fn instantiate(&self, key: &str) -> Result<InventoryNode, InventoryError> {
        let archetype = self
            .get(key)
            .ok_or_else(|| InventoryError::UnknownArchetype(key.into()))?;
        Ok(Self::build_node(archetype))
    }

    fn build_node(archetype: &InventoryArchetype) -> InventoryNode {
        let max_stack = keys::MAX_STACK_SIZE
            .get(archetype)
            .map_or(DEFAULT_MAX_STACK_SIZE, |v| v as u32);
        let fresh = |count: usize| {
            (0..count)
                .map(|_| Slot::new().with_max_stack_size(max_stack).into_ref())
                .collect::<Vec<_>>()
        };

        match archetype.kind {
            ArchetypeKind::Slot => {
                InventoryNode::Slot(Slot::new().with_max_stack_size(max_stack).into_ref())
            }
            ArchetypeKind::Row => {
                let inv = Inventory::new(Shape::Row);
                if archetype.children.is_empty() {
                    let count = keys::CAPACITY.get(archetype).unwrap_or(0) as usize;
                    inv.init_with_slots(fresh(count), (1, count));
                } else {
                    inv.init_with_children(Self::build_children(archetype));
                }
                Self::finish_node(inv, archetype)
            }
            ArchetypeKind::Column => {
                let inv = Inventory::new(Shape::Column);
                if archetype.children.is_empty() {
                    let count = keys::CAPACITY.get(archetype).unwrap_or(0) as usize;
                    inv.init_with_slots(fresh(count), (count, 1));
                } else {
                    inv.init_with_children(Self::build_children(archetype));
                }
                Self::finish_node(inv, archetype)
            }
            ArchetypeKind::Grid => {
                let rows = keys::ROWS.get(archetype).unwrap_or(0) as usize;
                let cols = keys::COLS.get(archetype).unwrap_or(0) as usize;
                let inv = Inventory::new(Shape::Grid { rows, cols });
                if archetype.children.is_empty() {
                    inv.init_with_slots(fresh(rows * cols), (rows, cols));
                } else {
                    inv.init_with_children(Self::build_children(archetype));
                }
                Self::finish_node(inv, archetype)
            }
            ArchetypeKind::Composite => {
                let inv = Inventory::new(Shape::Composite);
                inv.init_with_children(Self::build_children(archetype));
                Self::finish_node(inv, archetype)
            }
        }
    }

    fn build_children(archetype: &InventoryArchetype) -> Vec<InventoryNode> {
        archetype.children.iter().map(|c| Self::build_node(c)).collect()
    }

    fn finish_node(inv: Arc<Inventory>, archetype: &InventoryArchetype) -> InventoryNode {
        for (key, value) in &archetype.properties {
            inv.set_property(key.clone(), value.clone());
        }
        InventoryNode::Inventory(inv)
    }
}

/// Builder for [`ArchetypeRegistry`]
pub struct ArchetypeRegistryBuilder {
    by_key: HashMap<NamedId, Arc<InventoryArchetype>>,
}

impl ArchetypeRegistryBuilder {
    /// Register an archetype, replacing any previous entry under its key
    pub fn register(mut self, archetype: Arc<InventoryArchetype>) -> Self {
        log::debug!("registered archetype {}", archetype.key());
        self.by_key.insert(archetype.key().clone(), archetype);
        self
    }

    /// Freeze the registry
    pub fn build(self) -> ArchetypeRegistry {
        ArchetypeRegistry {
            by_key: self.by_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hold_item::ItemStack;

    #[test]
    fn test_typed_property_lookup() {
        let archetype = InventoryArchetype::builder("test:chest", ArchetypeKind::Grid)
            .with_property(keys::ROWS.name(), 3i64)
            .with_property(keys::COLS.name(), 9i64)
            .with_property(keys::TITLE.name(), "Chest")
            .build();

        assert_eq!(keys::ROWS.get(&archetype), Some(3));
        assert_eq!(keys::COLS.get(&archetype), Some(9));
        assert_eq!(keys::TITLE.get(&archetype), Some("Chest".to_owned()));
        assert_eq!(keys::CAPACITY.get(&archetype), None);
        assert_eq!(archetype.property_keys().count(), 3);
        // String-key lookup sees the same map
        assert_eq!(archetype.property("rows"), Some(&PropertyValue::Int(3)));
    }

    #[test]
    #[should_panic(expected = "requires rows and cols")]
    fn test_grid_without_dimensions_panics() {
        InventoryArchetype::builder("test:bad", ArchetypeKind::Grid).build();
    }

    #[test]
    fn test_unknown_archetype() {
        let registry = ArchetypeRegistry::builder().build();
        let err = registry.instantiate("missing:thing").unwrap_err();
        assert_eq!(err, InventoryError::UnknownArchetype("missing:thing".into()));
    }

    #[test]
    fn test_instantiate_default_grid() {
        let registry = ArchetypeRegistry::with_defaults().build();
        let node = registry.instantiate("hold:grid").unwrap();
        let inv = node.as_inventory().unwrap();

        assert_eq!(inv.capacity(), 9);
        assert!(inv.slot_at(2, 2).is_some());
        assert_eq!(inv.property("rows"), Some(PropertyValue::Int(3)));
    }

    #[test]
    fn test_instantiate_composed_tree() {
        let hotbar = InventoryArchetype::builder("test:hotbar", ArchetypeKind::Row)
            .with_slots(9)
            .build();
        let storage = InventoryArchetype::builder("test:storage", ArchetypeKind::Grid)
            .with_property(keys::ROWS.name(), 3i64)
            .with_property(keys::COLS.name(), 9i64)
            .build();
        let player = InventoryArchetype::builder("test:player", ArchetypeKind::Composite)
            .with_child(hotbar)
            .with_child(storage)
            .build();
        let registry = ArchetypeRegistry::builder().register(player).build();

        let node = registry.instantiate("test:player").unwrap();
        let inv = node.as_inventory().unwrap();
        assert_eq!(inv.capacity(), 36);
        assert_eq!(inv.children().len(), 2);
    }

    #[test]
    fn test_max_stack_size_applies_to_generated_slots() {
        let pouch = InventoryArchetype::builder("test:pouch", ArchetypeKind::Row)
            .with_slots(2)
            .with_property(keys::MAX_STACK_SIZE.name(), 4i64)
            .build();
        let registry = ArchetypeRegistry::builder().register(pouch).build();

        let node = registry.instantiate("test:pouch").unwrap();
        let inv = node.as_inventory().unwrap();
        let out = inv.offer(ItemStack::new("gold", 10));
        assert_eq!(out.remainder.unwrap().quantity, 2);
        assert_eq!(inv.count_kind("gold"), 8);
    }

    #[test]
    fn test_archetypes_instantiate_fresh_trees() {
        let registry = ArchetypeRegistry::with_defaults().build();
        let a = registry.instantiate("hold:row").unwrap();
        let b = registry.instantiate("hold:row").unwrap();

        let a = a.as_inventory().unwrap();
        let b = b.as_inventory().unwrap();
        a.offer(ItemStack::new("coal", 1));
        assert_eq!(b.count_kind("coal"), 0);
    }
}
