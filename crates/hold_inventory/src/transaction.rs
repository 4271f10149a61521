//! Slot transactions and transaction results
//!
//! Every mutating inventory operation runs in two steps: PROPOSE computes
//! the per-slot before/after records without touching any slot, ACCEPT
//! re-validates each record against the live slot and applies the ones
//! that still hold. Partial application is normal operation: a record
//! invalidated by an out-of-band mutation is skipped while the rest apply.

use crate::slot::SlotRef;
use hold_item::ItemStack;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Overall status of a transaction result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// The operation was honored (possibly with zero changes)
    Success,
    /// The operation could not be honored at all
    Failure,
}

/// Before/after snapshot of one slot's content for one operation
///
/// The original snapshot is immutable once recorded; the validity flag is
/// the only mutable part and only ever goes from valid to invalid.
pub struct SlotTransaction {
    slot: SlotRef,
    original: Option<ItemStack>,
    replacement: Option<ItemStack>,
    valid: AtomicBool,
}

impl SlotTransaction {
    /// Record a proposed change to a slot
    pub fn new(slot: SlotRef, original: Option<ItemStack>, replacement: Option<ItemStack>) -> Self {
        Self {
            slot,
            original,
            replacement,
            valid: AtomicBool::new(true),
        }
    }

    /// The slot this record targets
    pub fn slot(&self) -> &SlotRef {
        &self.slot
    }

    /// Snapshot of the slot contents when the change was proposed
    pub fn original(&self) -> Option<&ItemStack> {
        self.original.as_ref()
    }

    /// Proposed final contents
    pub fn replacement(&self) -> Option<&ItemStack> {
        self.replacement.as_ref()
    }

    /// Whether this record is still considered applicable
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Mark this record as stale
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Compare the original snapshot against the slot's live contents
    pub fn is_currently_valid(&self) -> bool {
        self.slot
            .with_raw(|current| current == self.original.as_ref())
    }
}

impl std::fmt::Debug for SlotTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTransaction")
            .field("slot", &self.slot.id())
            .field("original", &self.original)
            .field("replacement", &self.replacement)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Counts reported by [`TransactionResult::accept`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptOutcome {
    /// Records applied to their slots
    pub applied: usize,
    /// Records skipped because their slot changed out-of-band
    pub skipped: usize,
}

/// Immutable log of per-slot changes for one operation
pub struct TransactionResult {
    status: TransactionStatus,
    transactions: Vec<Arc<SlotTransaction>>,
}

static EMPTY_SUCCESS: OnceLock<Arc<TransactionResult>> = OnceLock::new();
static EMPTY_FAILURE: OnceLock<Arc<TransactionResult>> = OnceLock::new();

impl TransactionResult {
    /// The cached "nothing changed, operation honored" result
    pub fn empty_success() -> Arc<TransactionResult> {
        EMPTY_SUCCESS
            .get_or_init(|| {
                Arc::new(TransactionResult {
                    status: TransactionStatus::Success,
                    transactions: Vec::new(),
                })
            })
            .clone()
    }

    /// The cached "operation could not be honored" result
    pub fn empty_failure() -> Arc<TransactionResult> {
        EMPTY_FAILURE
            .get_or_init(|| {
                Arc::new(TransactionResult {
                    status: TransactionStatus::Failure,
                    transactions: Vec::new(),
                })
            })
            .clone()
    }

    /// A successful result carrying the given records
    pub fn success(transactions: Vec<Arc<SlotTransaction>>) -> Arc<TransactionResult> {
        if transactions.is_empty() {
            return Self::empty_success();
        }
        Arc::new(TransactionResult {
            status: TransactionStatus::Success,
            transactions,
        })
    }

    /// A failed result carrying the given records
    pub fn failure(transactions: Vec<Arc<SlotTransaction>>) -> Arc<TransactionResult> {
        if transactions.is_empty() {
            return Self::empty_failure();
        }
        Arc::new(TransactionResult {
            status: TransactionStatus::Failure,
            transactions,
        })
    }

    /// Concatenate results in order
    ///
    /// Status folds to `Failure` if any input failed.
    pub fn join<I>(results: I) -> Arc<TransactionResult>
    where
        I: IntoIterator<Item = Arc<TransactionResult>>,
    {
        let mut status = TransactionStatus::Success;
        let mut transactions = Vec::new();
        for result in results {
            if result.status == TransactionStatus::Failure {
                status = TransactionStatus::Failure;
            }
            transactions.extend(result.transactions.iter().cloned());
        }
        match status {
            TransactionStatus::Success => Self::success(transactions),
            TransactionStatus::Failure => Self::failure(transactions),
        }
    }

    /// Overall status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether the operation was honored
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }

    /// The per-slot records, in the order the changes occurred
    pub fn transactions(&self) -> &[Arc<SlotTransaction>] {
        &self.transactions
    }

    /// Whether any slot change was recorded
    ///
    /// Lets callers short-circuit cheaply on the no-change results.
    pub fn has_transactions(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// Apply every still-valid record to its slot
    ///
    /// Each record is re-validated against the slot's current contents; a
    /// record invalidated by an out-of-band mutation is skipped while the
    /// rest apply. Never panics, never rolls back.
    pub fn accept(&self) -> AcceptOutcome {
        let mut outcome = AcceptOutcome::default();
        for tx in &self.transactions {
            if !tx.is_valid() {
                outcome.skipped += 1;
                continue;
            }
            if tx
                .slot()
                .apply(tx.original(), tx.replacement())
            {
                outcome.applied += 1;
            } else {
                tx.invalidate();
                outcome.skipped += 1;
                log::debug!("skipped stale transaction for slot {}", tx.slot().id());
            }
        }
        outcome
    }
}

impl std::fmt::Debug for TransactionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionResult")
            .field("status", &self.status)
            .field("transactions", &self.transactions.len())
            .finish()
    }
}

/// Outcome of a poll operation
#[derive(Debug)]
pub struct PollResult {
    /// What was (or would be) removed
    pub polled: Option<ItemStack>,
    /// The per-slot change log
    pub result: Arc<TransactionResult>,
}

impl PollResult {
    /// The "nothing to poll" outcome
    pub fn absent() -> Self {
        Self {
            polled: None,
            result: TransactionResult::empty_success(),
        }
    }
}

/// Outcome of an offer operation
#[derive(Debug)]
pub struct OfferResult {
    /// What could not be inserted
    pub remainder: Option<ItemStack>,
    /// The per-slot change log
    pub result: Arc<TransactionResult>,
}
