//! Slots: the atomic leaves of an inventory tree
//!
//! A slot holds at most one item stack. Trees and non-owning views share
//! slots through [`SlotRef`], so all mutation goes through a per-slot
//! `RwLock`. Callers still serialize mutating operations per tree (one
//! server turn at a time); the lock only guarantees observers a
//! consistent per-slot snapshot.

use crate::transaction::{OfferResult, PollResult, SlotTransaction, TransactionResult};
use hold_core::{Id, IdGenerator};
use hold_item::{ItemStack, SlotFilter};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a slot, stable for the slot's lifetime
pub type SlotId = Id;

/// Default maximum stack size for freshly built slots
pub const DEFAULT_MAX_STACK_SIZE: u32 = 64;

static SLOT_IDS: IdGenerator = IdGenerator::new();

/// Shared handle to a slot
pub type SlotRef = Arc<Slot>;

/// Change notification payload fired after a slot mutation commits
#[derive(Debug, Clone)]
pub struct SlotDelta {
    /// The mutated slot
    pub slot: SlotId,
    /// Contents before the mutation
    pub original: Option<ItemStack>,
    /// Contents after the mutation
    pub current: Option<ItemStack>,
}

/// Listener callback invoked after a slot mutation commits
pub type SlotListener = Arc<dyn Fn(&SlotDelta) + Send + Sync>;

/// Removable listener registration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct SlotState {
    stack: Option<ItemStack>,
    max_stack_size: u32,
    filter: Option<SlotFilter>,
}

/// A leaf inventory node holding at most one item stack
pub struct Slot {
    id: SlotId,
    state: RwLock<SlotState>,
    listeners: RwLock<Vec<(ListenerId, SlotListener)>>,
    next_listener: AtomicU64,
}

impl Slot {
    /// Create an empty slot with the default maximum stack size
    pub fn new() -> Self {
        Self {
            id: SLOT_IDS.next(),
            state: RwLock::new(SlotState {
                stack: None,
                max_stack_size: DEFAULT_MAX_STACK_SIZE,
                filter: None,
            }),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Set the maximum stack size
    pub fn with_max_stack_size(self, max: u32) -> Self {
        self.state.write().max_stack_size = max.max(1);
        self
    }

    /// Set the item filter
    pub fn with_filter(self, filter: SlotFilter) -> Self {
        self.state.write().filter = Some(filter);
        self
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> SlotRef {
        Arc::new(self)
    }

    /// Create a shared empty slot
    pub fn new_ref() -> SlotRef {
        Self::new().into_ref()
    }

    /// This slot's identity
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Maximum stack size this slot allows
    pub fn max_stack_size(&self) -> u32 {
        self.state.read().max_stack_size
    }

    /// Whether the slot currently holds no stack
    pub fn is_empty(&self) -> bool {
        self.state.read().stack.is_none()
    }

    /// Quantity currently stored (0 when empty)
    pub fn quantity(&self) -> u32 {
        self.state.read().stack.as_ref().map_or(0, |s| s.quantity)
    }

    /// Safe accessor: clone of the stored stack for external callers
    pub fn stack(&self) -> Option<ItemStack> {
        self.state.read().stack.clone()
    }

    /// Raw accessor: borrow the stored stack without copying
    ///
    /// Internal fast path; the borrow never escapes the closure.
    pub fn with_raw<R>(&self, f: impl FnOnce(Option<&ItemStack>) -> R) -> R {
        f(self.state.read().stack.as_ref())
    }

    /// Whether this slot's filter accepts the given stack
    pub fn accepts(&self, stack: &ItemStack) -> bool {
        self.state
            .read()
            .filter
            .as_ref()
            .map_or(true, |f| f.accepts(stack))
    }

    /// Return up to `limit` units of the occupying stack without mutating
    ///
    /// A zero limit or an empty slot yields absent.
    pub fn peek(&self, limit: u32) -> Option<ItemStack> {
        if limit == 0 {
            return None;
        }
        let state = self.state.read();
        let stack = state.stack.as_ref()?;
        let mut out = stack.clone();
        out.quantity = stack.quantity.min(limit);
        Some(out)
    }

    /// Propose removing up to `limit` units
    ///
    /// Returns what would be removed plus the unapplied change log; an
    /// empty slot or a zero limit yields the cached no-change success.
    pub fn propose_poll(self: &Arc<Self>, limit: u32) -> PollResult {
        if limit == 0 {
            return PollResult::absent();
        }
        let state = self.state.read();
        let Some(stack) = state.stack.as_ref() else {
            return PollResult::absent();
        };
        let taken = stack.quantity.min(limit);
        let mut polled = stack.clone();
        polled.quantity = taken;
        let replacement = if taken == stack.quantity {
            None
        } else {
            let mut rest = stack.clone();
            rest.quantity -= taken;
            Some(rest)
        };
        let record = SlotTransaction::new(self.clone(), state.stack.clone(), replacement);
        PollResult {
            polled: Some(polled),
            result: TransactionResult::success(vec![Arc::new(record)]),
        }
    }

    /// Remove up to `limit` units, committing immediately
    pub fn poll(self: &Arc<Self>, limit: u32) -> PollResult {
        let out = self.propose_poll(limit);
        out.result.accept();
        out
    }

    /// Propose replacing the slot contents wholesale
    ///
    /// Rejected by the filter, or oversized for this slot, yields the
    /// cached failure with zero records and no change.
    pub fn propose_set(self: &Arc<Self>, stack: Option<ItemStack>) -> Arc<TransactionResult> {
        let state = self.state.read();
        if let Some(candidate) = &stack {
            if candidate.quantity > state.max_stack_size {
                return TransactionResult::empty_failure();
            }
            if let Some(filter) = &state.filter {
                if !filter.accepts(candidate) {
                    return TransactionResult::empty_failure();
                }
            }
        }
        let normalized = stack.filter(|s| !s.is_empty());
        if state.stack == normalized {
            return TransactionResult::empty_success();
        }
        let record = SlotTransaction::new(self.clone(), state.stack.clone(), normalized);
        TransactionResult::success(vec![Arc::new(record)])
    }

    /// Replace the slot contents wholesale, committing immediately
    pub fn set(self: &Arc<Self>, stack: Option<ItemStack>) -> Arc<TransactionResult> {
        let result = self.propose_set(stack);
        result.accept();
        result
    }

    /// Propose merging as much of `stack` as capacity and filter allow
    pub fn propose_offer(self: &Arc<Self>, stack: ItemStack) -> OfferResult {
        if stack.is_empty() {
            return OfferResult {
                remainder: None,
                result: TransactionResult::empty_success(),
            };
        }
        let state = self.state.read();
        if let Some(filter) = &state.filter {
            if !filter.accepts(&stack) {
                return OfferResult {
                    remainder: Some(stack),
                    result: TransactionResult::empty_failure(),
                };
            }
        }
        let cap = state.max_stack_size;
        match &state.stack {
            None => {
                let take = stack.quantity.min(cap);
                let mut placed = stack.clone();
                placed.quantity = take;
                let remainder = if take == stack.quantity {
                    None
                } else {
                    let mut rest = stack;
                    rest.quantity -= take;
                    Some(rest)
                };
                let record = SlotTransaction::new(self.clone(), None, Some(placed));
                OfferResult {
                    remainder,
                    result: TransactionResult::success(vec![Arc::new(record)]),
                }
            }
            Some(existing) => {
                if !existing.can_merge(&stack) || existing.quantity >= cap {
                    return OfferResult {
                        remainder: Some(stack),
                        result: TransactionResult::empty_failure(),
                    };
                }
                let space = cap - existing.quantity;
                let moved = stack.quantity.min(space);
                let mut merged = existing.clone();
                merged.quantity += moved;
                let remainder = if moved == stack.quantity {
                    None
                } else {
                    let mut rest = stack;
                    rest.quantity -= moved;
                    Some(rest)
                };
                let record = SlotTransaction::new(
                    self.clone(),
                    state.stack.clone(),
                    Some(merged),
                );
                OfferResult {
                    remainder,
                    result: TransactionResult::success(vec![Arc::new(record)]),
                }
            }
        }
    }

    /// Merge as much of `stack` as possible, committing immediately
    pub fn offer(self: &Arc<Self>, stack: ItemStack) -> OfferResult {
        let out = self.propose_offer(stack);
        out.result.accept();
        out
    }

    /// Replace contents without firing change listeners
    ///
    /// Internal bookkeeping path used for silent updates (e.g. crafting
    /// result previews). The capacity invariant still holds: oversized
    /// stacks are clamped to the slot maximum.
    pub fn replace_silent(&self, stack: Option<ItemStack>) -> Option<ItemStack> {
        let mut state = self.state.write();
        let cap = state.max_stack_size;
        let normalized = stack
            .filter(|s| !s.is_empty())
            .map(|mut s| {
                s.quantity = s.quantity.min(cap);
                s
            });
        std::mem::replace(&mut state.stack, normalized)
    }

    /// Register a change listener
    pub fn add_listener(&self, listener: SlotListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a previously registered listener
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().retain(|(lid, _)| *lid != id);
    }

    /// Compare-and-apply a recorded change
    ///
    /// Returns false without mutating if the slot no longer holds the
    /// expected original contents. Listeners fire after the lock drops.
    pub(crate) fn apply(
        &self,
        expected: Option<&ItemStack>,
        replacement: Option<&ItemStack>,
    ) -> bool {
        let mut state = self.state.write();
        if state.stack.as_ref() != expected {
            return false;
        }
        let original = std::mem::replace(
            &mut state.stack,
            replacement.cloned().filter(|s| !s.is_empty()),
        );
        let current = state.stack.clone();
        drop(state);
        self.notify(&SlotDelta {
            slot: self.id,
            original,
            current,
        });
        true
    }

    fn notify(&self, delta: &SlotDelta) {
        let listeners: Vec<SlotListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(delta);
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("stack", &state.stack)
            .field("max_stack_size", &state.max_stack_size)
            .finish()
    }
}
