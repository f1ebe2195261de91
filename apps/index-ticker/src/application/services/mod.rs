//! Application Services
//!
//! - `SnapshotSync`: applies feed records to the entity store and keeps
//!   merge counters for the status endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::application::ports::RecordSink;
use crate::domain::snapshot::PartialRecord;
use crate::domain::store::{EntityStore, UpdateOutcome};
use crate::infrastructure::metrics;

/// Merge counters by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records that created a new entity.
    pub created: u64,
    /// Records that changed an existing entity.
    pub updated: u64,
    /// Records that matched the stored values.
    pub unchanged: u64,
}

impl SyncStats {
    /// Total records applied.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.created + self.updated + self.unchanged
    }
}

/// Record sink that merges feed records into a shared store.
#[derive(Debug)]
pub struct SnapshotSync {
    store: Arc<EntityStore>,
    created: AtomicU64,
    updated: AtomicU64,
    unchanged: AtomicU64,
}

impl SnapshotSync {
    /// Create a sync service for `store`.
    #[must_use]
    pub const fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
        }
    }

    /// The store this service writes to.
    #[must_use]
    pub fn store(&self) -> Arc<EntityStore> {
        Arc::clone(&self.store)
    }

    /// Apply one record and return the merge outcome.
    pub fn apply(&self, record: PartialRecord) -> UpdateOutcome {
        let symbol = record.symbol.clone();
        let fields = record.field_count();
        let outcome = self.store.update(record);

        let counter = match outcome {
            UpdateOutcome::Created => &self.created,
            UpdateOutcome::Updated => &self.updated,
            UpdateOutcome::Unchanged => &self.unchanged,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        metrics::record_merge(outcome);
        if outcome == UpdateOutcome::Created {
            let complete = self
                .store
                .get(&symbol)
                .is_some_and(|snapshot| snapshot.is_complete());
            tracing::info!(symbol = %symbol, fields, complete, "Tracking new instrument");
            #[allow(clippy::cast_precision_loss)]
            metrics::set_tracked_entities(self.store.len() as f64);
        } else {
            tracing::trace!(
                symbol = %symbol,
                fields,
                outcome = outcome.as_str(),
                "Record merged"
            );
        }

        outcome
    }

    /// Current merge counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
        }
    }
}

impl RecordSink for SnapshotSync {
    fn on_record(&self, record: PartialRecord) {
        self.apply(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_counts_outcomes() {
        let sync = SnapshotSync::new(Arc::new(EntityStore::seeded()));

        sync.on_record(PartialRecord::new("NIFTY50").with_last_price(22_050.5));
        sync.on_record(PartialRecord::new("NIFTY50").with_last_price(22_050.5));
        sync.on_record(PartialRecord::new("MIDCAP").with_last_price(10_500.0));

        assert_eq!(
            sync.stats(),
            SyncStats {
                created: 1,
                updated: 1,
                unchanged: 1,
            }
        );
        assert_eq!(sync.stats().total(), 3);
    }

    #[test]
    fn apply_writes_through_to_shared_store() {
        let store = Arc::new(EntityStore::seeded());
        let sync = SnapshotSync::new(Arc::clone(&store));

        assert_eq!(
            sync.apply(PartialRecord::new("SENSEX").with_volume(1)),
            UpdateOutcome::Updated
        );
        assert_eq!(store.get("SENSEX").unwrap().volume, Some(1));
        assert!(Arc::ptr_eq(&sync.store(), &store));
    }
}
