//! Carrier references: back-references from an inventory to its owner
//!
//! An inventory tree is owned by at most one external object (a world
//! entity, a placed fixture). Transient entities are held weakly so a
//! despawned owner never leaks through its inventory; persistent fixtures
//! are held strongly. Owner absence is data, not an error: callers check.

use hold_core::Id;
use std::any::Any;
use std::sync::{Arc, Weak};

/// How an owner participates in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierKind {
    /// Transient world entity; held weakly
    Entity,
    /// Persistent fixture; held strongly
    Fixture,
}

/// An external object that owns an inventory tree
pub trait Carrier: Send + Sync + 'static {
    /// Stable identity of the owner
    fn carrier_id(&self) -> Id;

    /// Whether the owner is a transient entity or a persistent fixture
    fn kind(&self) -> CarrierKind;

    /// Borrow as `Any` for capability checks
    fn as_any(&self) -> &dyn Any;

    /// Convert to `Arc<dyn Any>` for capability downcasts
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

enum Holding {
    Unset,
    Weak(Weak<dyn Carrier>),
    Strong(Arc<dyn Carrier>),
}

/// Owning-vs-nonowning reference to an inventory's carrier
///
/// `get()` on a weakly held owner may report absent even after a
/// successful `set()` if the owner has since been dropped; every caller
/// must tolerate that.
pub struct CarrierRef {
    accepts: Option<CarrierKind>,
    holding: Holding,
}

impl CarrierRef {
    /// An unset reference accepting any carrier kind
    pub fn new() -> Self {
        Self {
            accepts: None,
            holding: Holding::Unset,
        }
    }

    /// An unset reference accepting only the given carrier kind
    ///
    /// Setting a non-conforming carrier clears the reference instead of
    /// raising an error.
    pub fn accepting(kind: CarrierKind) -> Self {
        Self {
            accepts: Some(kind),
            holding: Holding::Unset,
        }
    }

    /// Store the owner, weakly or strongly depending on its kind
    pub fn set(&mut self, carrier: Arc<dyn Carrier>) {
        if let Some(accepted) = self.accepts {
            if carrier.kind() != accepted {
                self.holding = Holding::Unset;
                return;
            }
        }
        self.holding = match carrier.kind() {
            CarrierKind::Entity => Holding::Weak(Arc::downgrade(&carrier)),
            CarrierKind::Fixture => Holding::Strong(carrier),
        };
    }

    /// Clear the reference to absent
    pub fn clear(&mut self) {
        self.holding = Holding::Unset;
    }

    /// The owner, if set and still alive
    pub fn get(&self) -> Option<Arc<dyn Carrier>> {
        match &self.holding {
            Holding::Unset => None,
            Holding::Weak(weak) => weak.upgrade(),
            Holding::Strong(strong) => Some(strong.clone()),
        }
    }

    /// Downcast the owner to a requested capability type
    pub fn as_capability<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let carrier = self.get()?;
        carrier.as_any_arc().downcast::<T>().ok()
    }
}

impl Default for CarrierRef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CarrierRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.holding {
            Holding::Unset => "unset",
            Holding::Weak(weak) => {
                if weak.strong_count() > 0 {
                    "weak"
                } else {
                    "weak (expired)"
                }
            }
            Holding::Strong(_) => "strong",
        };
        f.debug_struct("CarrierRef")
            .field("accepts", &self.accepts)
            .field("holding", &state)
            .finish()
    }
}
