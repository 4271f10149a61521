//! Viewer and container boundary
//!
//! The core does not know how slot changes reach clients; it only
//! guarantees that every registered [`ViewerHook`] hears about each
//! delivered logical change exactly once, in the order the changes
//! occurred. Changes queued for the same slot within one turn coalesce
//! last-write-wins: the final queued change (silent or not) is the one
//! delivered, at the position of its last occurrence.

use crate::node::Inventory;
use crate::slot::{ListenerId, SlotId, SlotRef};
use crossbeam_channel::{Receiver, Sender};
use hold_item::ItemStack;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a watching client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewerId(pub u64);

/// Client-side handle for a slot, assigned by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientSlotHandle(pub u64);

/// Opaque handle to a client-facing container representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub u64);

/// Removable viewer registration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchToken(u64);

/// One delivered slot change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotChange {
    /// Identity of the changed slot
    #[serde(with = "id_bits")]
    pub slot: SlotId,
    /// Flattened index of the slot in the observed tree
    pub index: usize,
    /// Client-side handle, if one was bound for the receiving viewer
    pub client_handle: Option<ClientSlotHandle>,
    /// Contents before the change
    pub original: Option<ItemStack>,
    /// Contents after the change
    pub current: Option<ItemStack>,
    /// Whether client-visible notification is suppressed
    pub silent: bool,
}

/// Key addressing a slot in the change-queuing interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChangeKey {
    /// By slot identity
    Slot(SlotId),
    /// By flattened index
    Index(usize),
    /// By client-side handle
    Handle(ClientSlotHandle),
}

/// External collaborator receiving slot-change deliveries
pub trait ViewerHook: Send + Sync {
    /// A watcher began observing the subtree
    fn attached(&self, _token: WatchToken) {}

    /// A watcher stopped observing the subtree
    fn detached(&self, _token: WatchToken) {}

    /// A client-visible slot change was delivered
    fn queue_slot_change(&self, change: &SlotChange);

    /// A bookkeeping-only slot change was delivered
    fn queue_silent_slot_change(&self, change: &SlotChange);
}

/// Construction hook for inventories that supply their own presentation
pub trait ContainerProvider: Send + Sync {
    /// Create the client-facing container for a viewer
    fn create_container(&self, viewer: ViewerId) -> ContainerHandle;
}

struct ViewerEntry {
    token: WatchToken,
    hook: Arc<dyn ViewerHook>,
    bindings: HashMap<SlotId, ClientSlotHandle>,
}

/// Per-tree viewer bookkeeping: registered hooks plus the change queue
pub(crate) struct ViewerTable {
    tx: Sender<SlotChange>,
    rx: Receiver<SlotChange>,
    entries: RwLock<Vec<ViewerEntry>>,
    tree_listeners: Mutex<Vec<(SlotRef, ListenerId)>>,
    provider: RwLock<Option<Arc<dyn ContainerProvider>>>,
    next_token: AtomicU64,
}

impl ViewerTable {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            entries: RwLock::new(Vec::new()),
            tree_listeners: Mutex::new(Vec::new()),
            provider: RwLock::new(None),
            next_token: AtomicU64::new(1),
        }
    }
}

impl Inventory {
    /// Register a viewer hook on this tree
    ///
    /// The first registration installs change listeners on every slot of
    /// the tree; the returned token removes the registration again.
    pub fn add_viewer(&self, hook: Arc<dyn ViewerHook>) -> WatchToken {
        let token = WatchToken(self.viewers.next_token.fetch_add(1, Ordering::Relaxed));
        {
            let mut listeners = self.viewers.tree_listeners.lock();
            if listeners.is_empty() {
                for (index, slot) in self.slots().iter().enumerate() {
                    let tx = self.viewers.tx.clone();
                    let listener_id = slot.add_listener(Arc::new(move |delta| {
                        let _ = tx.send(SlotChange {
                            slot: delta.slot,
                            index,
                            client_handle: None,
                            original: delta.original.clone(),
                            current: delta.current.clone(),
                            silent: false,
                        });
                    }));
                    listeners.push((slot.clone(), listener_id));
                }
            }
        }
        self.viewers.entries.write().push(ViewerEntry {
            token,
            hook: hook.clone(),
            bindings: HashMap::new(),
        });
        hook.attached(token);
        token
    }

    /// Unregister a viewer hook
    ///
    /// The last removal also removes the tree's slot listeners.
    pub fn remove_viewer(&self, token: WatchToken) {
        let entry = {
            let mut entries = self.viewers.entries.write();
            let Some(pos) = entries.iter().position(|e| e.token == token) else {
                return;
            };
            let entry = entries.remove(pos);
            if entries.is_empty() {
                let mut listeners = self.viewers.tree_listeners.lock();
                for (slot, listener_id) in listeners.drain(..) {
                    slot.remove_listener(listener_id);
                }
            }
            entry
        };
        entry.hook.detached(token);
    }

    /// Bind a client-side slot handle for one viewer registration
    pub fn bind_client_slot(&self, token: WatchToken, slot: SlotId, handle: ClientSlotHandle) {
        let mut entries = self.viewers.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.token == token) {
            entry.bindings.insert(slot, handle);
        }
    }

    /// Queue a client-visible refresh of a slot
    pub fn queue_slot_change(&self, key: SlotChangeKey) {
        self.queue_change(key, false);
    }

    /// Queue a bookkeeping-only refresh of a slot
    pub fn queue_silent_slot_change(&self, key: SlotChangeKey) {
        self.queue_change(key, true);
    }

    fn queue_change(&self, key: SlotChangeKey, silent: bool) {
        if self.viewers.entries.read().is_empty() {
            return;
        }
        let Some((index, slot)) = self.resolve_change_key(&key) else {
            log::debug!("ignoring change for unresolvable slot key {:?}", key);
            return;
        };
        let current = slot.stack();
        let _ = self.viewers.tx.send(SlotChange {
            slot: slot.id(),
            index,
            client_handle: None,
            original: current.clone(),
            current,
            silent,
        });
    }

    fn resolve_change_key(&self, key: &SlotChangeKey) -> Option<(usize, SlotRef)> {
        let slot_id = match key {
            SlotChangeKey::Index(index) => {
                return self.slot(*index).map(|slot| (*index, slot));
            }
            SlotChangeKey::Slot(id) => *id,
            SlotChangeKey::Handle(handle) => {
                let entries = self.viewers.entries.read();
                entries.iter().find_map(|entry| {
                    entry
                        .bindings
                        .iter()
                        .find_map(|(slot, bound)| (bound == handle).then_some(*slot))
                })?
            }
        };
        let index = self.slots().iter().position(|s| s.id() == slot_id)?;
        Some((index, self.slots()[index].clone()))
    }

    /// Deliver queued changes to every registered viewer hook
    ///
    /// Changes are coalesced last-write-wins per slot, then delivered in
    /// the order of their last occurrence. Returns the number of logical
    /// changes delivered.
    pub fn flush_changes(&self) -> usize {
        let mut drained = Vec::new();
        while let Ok(change) = self.viewers.rx.try_recv() {
            drained.push(change);
        }
        if drained.is_empty() {
            return 0;
        }
        let mut last_per_slot: HashMap<u64, usize> = HashMap::new();
        for (position, change) in drained.iter().enumerate() {
            last_per_slot.insert(change.slot.to_bits(), position);
        }
        let entries = self.viewers.entries.read();
        let mut delivered = 0;
        for (position, change) in drained.iter().enumerate() {
            if last_per_slot[&change.slot.to_bits()] != position {
                continue;
            }
            for entry in entries.iter() {
                let mut delivery = change.clone();
                delivery.client_handle = entry.bindings.get(&change.slot).copied();
                if delivery.silent {
                    entry.hook.queue_silent_slot_change(&delivery);
                } else {
                    entry.hook.queue_slot_change(&delivery);
                }
            }
            delivered += 1;
        }
        log::trace!(
            "flushed {} slot changes ({} coalesced away)",
            delivered,
            drained.len() - delivered
        );
        delivered
    }

    /// Install the container construction hook for this inventory
    pub fn set_container_provider(&self, provider: Arc<dyn ContainerProvider>) {
        *self.viewers.provider.write() = Some(provider);
    }

    /// Create the client-facing container for a viewer, if this inventory
    /// supplies its own presentation
    pub fn create_container(&self, viewer: ViewerId) -> Option<ContainerHandle> {
        let provider = self.viewers.provider.read().clone();
        provider.map(|p| p.create_container(viewer))
    }
}

mod id_bits {
    use hold_core::Id;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(id: &Id, serializer: S) -> Result<S::Ok, S::Error> {
        id.to_bits().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Id, D::Error> {
        Ok(Id::from_bits(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::InventoryNode;
    use crate::slot::Slot;

    #[derive(Default)]
    struct RecordingHook {
        changes: Mutex<Vec<SlotChange>>,
        attached: AtomicU64,
        detached: AtomicU64,
    }

    impl ViewerHook for RecordingHook {
        fn attached(&self, _token: WatchToken) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }
        fn detached(&self, _token: WatchToken) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
        fn queue_slot_change(&self, change: &SlotChange) {
            self.changes.lock().push(change.clone());
        }
        fn queue_silent_slot_change(&self, change: &SlotChange) {
            self.changes.lock().push(change.clone());
        }
    }

    #[test]
    fn test_change_delivery_in_order() {
        let root = Inventory::row(3);
        let hook = Arc::new(RecordingHook::default());
        root.add_viewer(hook.clone());

        root.offer(ItemStack::new("coal", 2));
        root.set(2, Some(ItemStack::new("iron", 1))).unwrap();

        let delivered = root.flush_changes();
        assert_eq!(delivered, 2);
        let changes = hook.changes.lock();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].index, 0);
        assert_eq!(changes[0].current.as_ref().unwrap().kind, "coal");
        assert_eq!(changes[1].index, 2);
        assert_eq!(hook.attached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_last_write_wins_per_slot() {
        let root = Inventory::row(2);
        let hook = Arc::new(RecordingHook::default());
        root.add_viewer(hook.clone());

        root.set(0, Some(ItemStack::new("coal", 1))).unwrap();
        root.set(0, Some(ItemStack::new("coal", 5))).unwrap();
        root.set(0, Some(ItemStack::new("iron", 2))).unwrap();

        let delivered = root.flush_changes();
        assert_eq!(delivered, 1);
        let changes = hook.changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].current.as_ref().unwrap().kind, "iron");
    }

    #[test]
    fn test_silent_queue_carries_flag() {
        let root = Inventory::row(1);
        let hook = Arc::new(RecordingHook::default());
        root.add_viewer(hook.clone());

        root.queue_silent_slot_change(SlotChangeKey::Index(0));
        root.flush_changes();

        let changes = hook.changes.lock();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].silent);
    }

    #[test]
    fn test_remove_viewer_stops_delivery() {
        let root = Inventory::row(1);
        let hook = Arc::new(RecordingHook::default());
        let token = root.add_viewer(hook.clone());
        root.remove_viewer(token);

        root.set(0, Some(ItemStack::new("coal", 1))).unwrap();
        root.flush_changes();

        assert!(hook.changes.lock().is_empty());
        assert_eq!(hook.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_client_handle_binding() {
        let root = Inventory::row(2);
        let hook = Arc::new(RecordingHook::default());
        let token = root.add_viewer(hook.clone());
        let slot_id = root.slot(1).unwrap().id();
        root.bind_client_slot(token, slot_id, ClientSlotHandle(77));

        root.queue_slot_change(SlotChangeKey::Handle(ClientSlotHandle(77)));
        root.flush_changes();

        let changes = hook.changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].slot, slot_id);
        assert_eq!(changes[0].client_handle, Some(ClientSlotHandle(77)));
    }

    #[test]
    fn test_container_provider_hook() {
        struct Provider;
        impl ContainerProvider for Provider {
            fn create_container(&self, viewer: ViewerId) -> ContainerHandle {
                ContainerHandle(viewer.0 + 100)
            }
        }

        let root = Inventory::row(1);
        assert!(root.create_container(ViewerId(1)).is_none());

        root.set_container_provider(Arc::new(Provider));
        assert_eq!(
            root.create_container(ViewerId(1)),
            Some(ContainerHandle(101))
        );
    }

    #[test]
    fn test_view_shares_underlying_slots() {
        // A second inventory over the same slots observes mutations made
        // through the first.
        let slot = Slot::new_ref();
        let owner = Inventory::composite(vec![InventoryNode::Slot(slot.clone())]);
        let view = Inventory::composite(vec![InventoryNode::Slot(slot)]);

        let hook = Arc::new(RecordingHook::default());
        view.add_viewer(hook.clone());

        owner.set(0, Some(ItemStack::new("gem", 1))).unwrap();
        assert_eq!(view.flush_changes(), 1);
        assert_eq!(hook.changes.lock().len(), 1);
    }
}
