//! Composite inventory nodes
//!
//! An inventory is a tree: slots at the leaves, composite nodes above
//! them. Child insertion order is semantically meaningful: it is the
//! traversal order of every aggregate operation, so it decides which
//! slots fill and drain first. Every aggregate operation folds its
//! children in that order, which keeps `op(tree)` equal to folding the
//! children's own `op` results.

use crate::carrier::{Carrier, CarrierRef};
use crate::error::InventoryError;
use crate::slot::{Slot, SlotRef};
use crate::transaction::{OfferResult, PollResult, TransactionResult};
use crate::viewer::ViewerTable;
use hold_core::{Id, IdGenerator};
use hold_item::{ItemStack, PropertyValue};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};

static NODE_IDS: IdGenerator = IdGenerator::new();

/// The handful of composite shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Arbitrary ordered children
    Composite,
    /// 1 x N positional layout
    Row,
    /// N x 1 positional layout
    Column,
    /// rows x cols positional layout
    Grid { rows: usize, cols: usize },
    /// Non-owning projection built by a query
    Query,
}

/// A child of a composite node: a slot leaf or a nested inventory
#[derive(Clone)]
pub enum InventoryNode {
    /// Leaf slot
    Slot(SlotRef),
    /// Nested composite
    Inventory(Arc<Inventory>),
}

impl InventoryNode {
    /// Borrow as a slot, if this node is a leaf
    pub fn as_slot(&self) -> Option<&SlotRef> {
        match self {
            Self::Slot(slot) => Some(slot),
            Self::Inventory(_) => None,
        }
    }

    /// Borrow as an inventory, if this node is a composite
    pub fn as_inventory(&self) -> Option<&Arc<Inventory>> {
        match self {
            Self::Slot(_) => None,
            Self::Inventory(inv) => Some(inv),
        }
    }
}

impl std::fmt::Debug for InventoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slot(slot) => write!(f, "Slot({})", slot.id()),
            Self::Inventory(inv) => write!(f, "Inventory({})", inv.id()),
        }
    }
}

/// Cached 2D coordinate layout for positional composites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

struct Structure {
    children: Vec<InventoryNode>,
    slots: OnceLock<Vec<SlotRef>>,
    layout: OnceLock<Option<GridLayout>>,
    explicit_dims: Option<(usize, usize)>,
}

/// A composite inventory tree node
///
/// Built in two phases: `new(shape)` followed by exactly one
/// `init_with_children` or `init_with_slots` call. Double initialization
/// and use before initialization are structural bugs in tree assembly
/// and abort with a panic.
pub struct Inventory {
    id: Id,
    shape: Shape,
    structure: OnceLock<Structure>,
    properties: RwLock<HashMap<String, PropertyValue>>,
    carrier: RwLock<CarrierRef>,
    pub(crate) viewers: ViewerTable,
}

impl Inventory {
    /// Create an uninitialized inventory of the given shape
    pub fn new(shape: Shape) -> Arc<Inventory> {
        Arc::new(Inventory {
            id: NODE_IDS.next(),
            shape,
            structure: OnceLock::new(),
            properties: RwLock::new(HashMap::new()),
            carrier: RwLock::new(CarrierRef::new()),
            viewers: ViewerTable::new(),
        })
    }

    /// Compose from sub-nodes; descendant slots are flattened lazily
    pub fn init_with_children(&self, children: Vec<InventoryNode>) {
        let structure = Structure {
            children,
            slots: OnceLock::new(),
            layout: OnceLock::new(),
            explicit_dims: None,
        };
        if self.structure.set(structure).is_err() {
            panic!("inventory {} initialized twice", self.id);
        }
    }

    /// Compose directly from a flat slot list with `(rows, cols)` geometry
    pub fn init_with_slots(&self, slots: Vec<SlotRef>, dims: (usize, usize)) {
        let (rows, cols) = dims;
        if rows * cols != slots.len() {
            panic!(
                "inventory {}: dimensions {}x{} do not match {} slots",
                self.id,
                rows,
                cols,
                slots.len()
            );
        }
        if let Shape::Grid {
            rows: shape_rows,
            cols: shape_cols,
        } = self.shape
        {
            if (shape_rows, shape_cols) != dims {
                panic!(
                    "inventory {}: grid shape {}x{} initialized with {}x{} slots",
                    self.id, shape_rows, shape_cols, rows, cols
                );
            }
        }
        let structure = Structure {
            children: slots.into_iter().map(InventoryNode::Slot).collect(),
            slots: OnceLock::new(),
            layout: OnceLock::new(),
            explicit_dims: Some(dims),
        };
        if self.structure.set(structure).is_err() {
            panic!("inventory {} initialized twice", self.id);
        }
    }

    /// Build a composite from existing nodes
    pub fn composite(children: Vec<InventoryNode>) -> Arc<Inventory> {
        let inv = Self::new(Shape::Composite);
        inv.init_with_children(children);
        inv
    }

    /// Build a 1 x `len` row of fresh slots
    pub fn row(len: usize) -> Arc<Inventory> {
        let inv = Self::new(Shape::Row);
        inv.init_with_slots(Self::fresh_slots(len), (1, len));
        inv
    }

    /// Build a `len` x 1 column of fresh slots
    pub fn column(len: usize) -> Arc<Inventory> {
        let inv = Self::new(Shape::Column);
        inv.init_with_slots(Self::fresh_slots(len), (len, 1));
        inv
    }

    /// Build a `rows` x `cols` grid of fresh slots
    pub fn grid(rows: usize, cols: usize) -> Arc<Inventory> {
        let inv = Self::new(Shape::Grid { rows, cols });
        inv.init_with_slots(Self::fresh_slots(rows * cols), (rows, cols));
        inv
    }

    /// Build a grid over existing slots with the given geometry
    pub fn grid_with_slots(slots: Vec<SlotRef>, dims: (usize, usize)) -> Arc<Inventory> {
        let inv = Self::new(Shape::Grid {
            rows: dims.0,
            cols: dims.1,
        });
        inv.init_with_slots(slots, dims);
        inv
    }

    fn fresh_slots(count: usize) -> Vec<SlotRef> {
        (0..count).map(|_| Slot::new_ref()).collect()
    }

    fn structure(&self) -> &Structure {
        self.structure
            .get()
            .unwrap_or_else(|| panic!("inventory {} used before initialization", self.id))
    }

    /// This node's identity
    pub fn id(&self) -> Id {
        self.id
    }

    /// This node's shape
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The child nodes, in traversal order
    pub fn children(&self) -> &[InventoryNode] {
        &self.structure().children
    }

    /// Every descendant slot, flattened in depth-first child order
    ///
    /// Computed once and cached; each slot appears exactly once.
    pub fn slots(&self) -> &[SlotRef] {
        self.structure().slots.get_or_init(|| {
            let mut out = Vec::new();
            Self::flatten_into(&self.structure().children, &mut out);
            out
        })
    }

    fn flatten_into(children: &[InventoryNode], out: &mut Vec<SlotRef>) {
        for child in children {
            match child {
                InventoryNode::Slot(slot) => out.push(slot.clone()),
                InventoryNode::Inventory(inv) => out.extend(inv.slots().iter().cloned()),
            }
        }
    }

    /// The 2D layout of this node, if it is positional
    pub fn layout(&self) -> Option<GridLayout> {
        *self.structure().layout.get_or_init(|| {
            let count = self.slots().len();
            if let Some((rows, cols)) = self.structure().explicit_dims {
                return Some(GridLayout { rows, cols });
            }
            match self.shape {
                Shape::Row => Some(GridLayout {
                    rows: 1,
                    cols: count,
                }),
                Shape::Column => Some(GridLayout {
                    rows: count,
                    cols: 1,
                }),
                Shape::Grid { rows, cols } => {
                    if rows * cols != count {
                        panic!(
                            "inventory {}: grid {}x{} does not match {} slots",
                            self.id, rows, cols, count
                        );
                    }
                    Some(GridLayout { rows, cols })
                }
                Shape::Composite | Shape::Query => None,
            }
        })
    }

    /// The slot at column `x`, row `y` of a positional composite
    pub fn slot_at(&self, x: usize, y: usize) -> Option<SlotRef> {
        let layout = self.layout()?;
        if x >= layout.cols || y >= layout.rows {
            return None;
        }
        self.slots().get(y * layout.cols + x).cloned()
    }

    /// The slot at the given flattened index
    pub fn slot(&self, index: usize) -> Option<SlotRef> {
        self.slots().get(index).cloned()
    }

    /// Total number of slots in the tree
    pub fn capacity(&self) -> usize {
        self.slots().len()
    }

    /// Number of occupied slots
    pub fn used_slots(&self) -> usize {
        self.slots().iter().filter(|s| !s.is_empty()).count()
    }

    /// Number of empty slots
    pub fn free_slots(&self) -> usize {
        self.capacity() - self.used_slots()
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        self.used_slots() == 0
    }

    /// Whether no slot is empty
    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    /// Whether any slot holds the given kind
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.slots()
            .iter()
            .any(|slot| slot.with_raw(|raw| raw.map_or(false, |s| s.kind == kind)))
    }

    /// Total quantity of the given kind across all slots
    pub fn count_kind(&self, kind: &str) -> u32 {
        self.slots()
            .iter()
            .map(|slot| slot.with_raw(|raw| raw.filter(|s| s.kind == kind).map_or(0, |s| s.quantity)))
            .sum()
    }

    /// Return up to `limit` units without mutating
    ///
    /// The first non-empty slot in traversal order fixes the kind; later
    /// slots of the same kind contribute until the limit is reached.
    pub fn peek(&self, limit: u32) -> Option<ItemStack> {
        if limit == 0 {
            return None;
        }
        let mut out: Option<ItemStack> = None;
        for slot in self.slots() {
            let gathered = out.as_ref().map_or(0, |s| s.quantity);
            let remaining = limit - gathered;
            if remaining == 0 {
                break;
            }
            match &mut out {
                None => {
                    if let Some(peeked) = slot.peek(remaining) {
                        out = Some(peeked);
                    }
                }
                Some(acc) => {
                    slot.with_raw(|raw| {
                        if let Some(stored) = raw {
                            if acc.can_merge(stored) {
                                acc.quantity += stored.quantity.min(remaining);
                            }
                        }
                    });
                }
            }
        }
        out
    }

    /// Propose removing up to `limit` units (see [`Inventory::peek`])
    pub fn propose_poll(&self, limit: u32) -> PollResult {
        if limit == 0 {
            return PollResult::absent();
        }
        let mut polled: Option<ItemStack> = None;
        let mut parts = Vec::new();
        for slot in self.slots() {
            let gathered = polled.as_ref().map_or(0, |s| s.quantity);
            let remaining = limit - gathered;
            if remaining == 0 {
                break;
            }
            match &mut polled {
                None => {
                    let part = slot.propose_poll(remaining);
                    if let Some(stack) = part.polled {
                        polled = Some(stack);
                        parts.push(part.result);
                    }
                }
                Some(acc) => {
                    let matches = slot
                        .with_raw(|raw| raw.map_or(false, |stored| acc.can_merge(stored)));
                    if matches {
                        let part = slot.propose_poll(remaining);
                        if let Some(stack) = part.polled {
                            acc.quantity += stack.quantity;
                            parts.push(part.result);
                        }
                    }
                }
            }
        }
        match polled {
            None => PollResult::absent(),
            Some(stack) => PollResult {
                polled: Some(stack),
                result: TransactionResult::join(parts),
            },
        }
    }

    /// Remove up to `limit` units, committing immediately
    pub fn poll(&self, limit: u32) -> PollResult {
        let out = self.propose_poll(limit);
        out.result.accept();
        out
    }

    /// Propose inserting as much of `stack` as the tree accepts
    ///
    /// Single pass in traversal order: each slot merges or fills as it is
    /// encountered, and the remainder moves on to the next slot.
    pub fn propose_offer(&self, stack: ItemStack) -> OfferResult {
        if stack.is_empty() {
            return OfferResult {
                remainder: None,
                result: TransactionResult::empty_success(),
            };
        }
        let mut remainder = Some(stack);
        let mut accepted = Vec::new();
        for slot in self.slots() {
            let Some(current) = remainder.take() else {
                break;
            };
            let part = slot.propose_offer(current);
            if part.result.has_transactions() {
                accepted.push(part.result);
            }
            remainder = part.remainder;
        }
        if accepted.is_empty() {
            OfferResult {
                remainder,
                result: TransactionResult::empty_failure(),
            }
        } else {
            OfferResult {
                remainder,
                result: TransactionResult::join(accepted),
            }
        }
    }

    /// Insert as much of `stack` as possible, committing immediately
    pub fn offer(&self, stack: ItemStack) -> OfferResult {
        let out = self.propose_offer(stack);
        out.result.accept();
        out
    }

    /// Replace the contents of the slot at `index` wholesale
    pub fn set(
        &self,
        index: usize,
        stack: Option<ItemStack>,
    ) -> Result<Arc<TransactionResult>, InventoryError> {
        let slot = self.slot(index).ok_or(InventoryError::SlotOutOfBounds {
            index,
            capacity: self.capacity(),
        })?;
        Ok(slot.set(stack))
    }

    /// Depth-first pre-order walk over all nodes
    ///
    /// The visitor's `ControlFlow::Break` stops traversal immediately,
    /// without visiting further siblings.
    pub fn walk(
        &self,
        visit: &mut dyn FnMut(&InventoryNode) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for child in self.children() {
            visit(child)?;
            if let InventoryNode::Inventory(inv) = child {
                inv.walk(visit)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Look up a named property on this node
    pub fn property(&self, key: &str) -> Option<PropertyValue> {
        self.properties.read().get(key).cloned()
    }

    /// Set a named property on this node
    pub fn set_property(&self, key: impl Into<String>, value: PropertyValue) {
        self.properties.write().insert(key.into(), value);
    }

    /// Bind this inventory to its owning carrier
    ///
    /// Transient entities are held weakly, fixtures strongly; re-binding
    /// replaces the previous owner.
    pub fn set_carrier(&self, carrier: Arc<dyn Carrier>) {
        self.carrier.write().set(carrier);
    }

    /// Unbind the carrier
    pub fn clear_carrier(&self) {
        self.carrier.write().clear();
    }

    /// The owning carrier, if bound and still alive
    pub fn carrier(&self) -> Option<Arc<dyn Carrier>> {
        self.carrier.read().get()
    }

    /// Downcast the owning carrier to a capability type
    pub fn carrier_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.carrier.read().as_capability::<T>()
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("Inventory");
        dbg.field("id", &self.id).field("shape", &self.shape);
        match self.structure.get() {
            Some(structure) => dbg.field("children", &structure.children.len()),
            None => dbg.field("children", &"uninitialized"),
        };
        dbg.finish()
    }
}
