//! Shared memory accounting
//!
//! A [`MemTracker`] accumulates signed byte deltas from any number of stores.
//! Trackers form a tree: every delta applied to a child is also applied to
//! each ancestor, so a per-operator tracker can roll up into a per-query and
//! then a global budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{trace, warn};

use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct MemTracker {
    label: String,
    /// Budget in bytes, `None` for unbounded
    limit: Option<i64>,
    consumed: AtomicI64,
    peak: AtomicI64,
    parent: Option<Arc<MemTracker>>,
}

impl MemTracker {
    /// Create an unbounded root tracker
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Self::build(label.into(), None, None)
    }

    /// Create a root tracker that rejects consumption above `limit` bytes
    pub fn with_limit(label: impl Into<String>, limit: i64) -> Arc<Self> {
        Self::build(label.into(), Some(limit), None)
    }

    /// Create a tracker that rolls its deltas up into `self`
    pub fn child(self: &Arc<Self>, label: impl Into<String>, limit: Option<i64>) -> Arc<Self> {
        Self::build(label.into(), limit, Some(Arc::clone(self)))
    }

    fn build(label: String, limit: Option<i64>, parent: Option<Arc<MemTracker>>) -> Arc<Self> {
        Arc::new(Self {
            label,
            limit,
            consumed: AtomicI64::new(0),
            peak: AtomicI64::new(0),
            parent,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn bytes_consumed(&self) -> i64 {
        self.consumed.load(Ordering::Acquire)
    }

    /// Highest value `bytes_consumed` has reached
    pub fn peak(&self) -> i64 {
        self.peak.load(Ordering::Acquire)
    }

    /// Apply a delta without checking any limit.
    ///
    /// Used for memory that is already allocated and cannot be refused.
    pub fn consume(&self, bytes: i64) {
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            let now = t.consumed.fetch_add(bytes, Ordering::AcqRel) + bytes;
            t.peak.fetch_max(now, Ordering::AcqRel);
            tracker = t.parent.as_deref();
        }
        trace!(label = %self.label, bytes, "memory consumed");
    }

    /// Return bytes to this tracker and its ancestors
    pub fn release(&self, bytes: i64) {
        self.consume(-bytes);
    }

    /// Apply a delta, failing if any tracker on the path to the root would
    /// exceed its limit.
    ///
    /// On failure no tracker is left changed. Negative deltas always succeed.
    pub fn try_consume(&self, bytes: i64) -> Result<()> {
        if bytes <= 0 {
            self.consume(bytes);
            return Ok(());
        }
        let now = self.charge_local(bytes)?;
        if let Some(parent) = &self.parent {
            if let Err(e) = parent.try_consume(bytes) {
                self.consumed.fetch_sub(bytes, Ordering::AcqRel);
                return Err(e);
            }
        }
        // Only a committed charge counts towards the peak.
        self.peak.fetch_max(now, Ordering::AcqRel);
        trace!(label = %self.label, bytes, "memory consumed");
        Ok(())
    }

    /// Add `bytes` to this tracker alone if its limit allows, returning the
    /// new total
    fn charge_local(&self, bytes: i64) -> Result<i64> {
        let mut current = self.consumed.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(bytes);
            if let Some(limit) = self.limit.filter(|&limit| next > limit) {
                warn!(
                    label = %self.label,
                    requested = bytes,
                    consumed = current,
                    limit,
                    "memory limit exceeded"
                );
                return Err(StoreError::MemoryLimitExceeded {
                    label: self.label.clone(),
                    requested: bytes,
                    consumed: current,
                    limit,
                });
            }
            match self.consumed.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }
}
