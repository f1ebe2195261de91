//! Entity Store
//!
//! Holds the latest snapshot per instrument symbol and merges partial
//! records into it.
//!
//! # Merge Semantics
//!
//! - Unknown symbol: a new snapshot is created from the record as-is.
//!   Fields the record lacks stay absent.
//! - Known symbol: fields present in the record overwrite the stored
//!   values, absent fields are retained (shallow merge).
//!
//! Updates take the write lock, so concurrent producers are serialized.
//! Reads hand out owned copies and never expose the map itself.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::snapshot::{EntitySnapshot, PartialRecord, Symbol, seed_snapshots};

// =============================================================================
// Update Outcome
// =============================================================================

/// Result of merging one record into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOutcome {
    /// The symbol was not tracked and a new snapshot was created.
    Created,
    /// At least one field of an existing snapshot changed.
    Updated,
    /// The record matched the stored values; nothing changed.
    Unchanged,
}

impl UpdateOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

// =============================================================================
// Entity Store
// =============================================================================

/// Thread-safe map from symbol to latest snapshot.
///
/// # Example
///
/// ```rust
/// use index_ticker::domain::snapshot::PartialRecord;
/// use index_ticker::domain::store::{EntityStore, UpdateOutcome};
///
/// let store = EntityStore::seeded();
///
/// let outcome = store.update(PartialRecord::new("NIFTY50").with_last_price(22_050.5));
/// assert_eq!(outcome, UpdateOutcome::Updated);
///
/// let nifty = store.get("NIFTY50").unwrap();
/// assert_eq!(nifty.last_price, Some(22_050.5));
/// assert_eq!(nifty.day_high, Some(22_100.0));
/// ```
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: RwLock<HashMap<Symbol, EntitySnapshot>>,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with the seed index snapshots.
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_snapshots(seed_snapshots())
    }

    /// Create a store from an initial set of snapshots.
    ///
    /// Later snapshots replace earlier ones with the same symbol.
    #[must_use]
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        let entities = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.symbol.clone(), snapshot))
            .collect();

        Self {
            entities: RwLock::new(entities),
        }
    }

    /// Merge a partial record into the snapshot for its symbol.
    pub fn update(&self, record: PartialRecord) -> UpdateOutcome {
        let symbol = record.symbol.clone();
        let mut entities = self.entities.write();

        let outcome = if let Some(existing) = entities.get_mut(&symbol) {
            if existing.merge(record) {
                UpdateOutcome::Updated
            } else {
                UpdateOutcome::Unchanged
            }
        } else {
            entities.insert(symbol.clone(), EntitySnapshot::from(record));
            UpdateOutcome::Created
        };

        if outcome == UpdateOutcome::Unchanged {
            return outcome;
        }

        if let Some(snapshot) = entities.get(&symbol)
            && !snapshot.day_range_consistent()
        {
            tracing::warn!(
                symbol = %snapshot.symbol,
                last_price = ?snapshot.last_price,
                day_low = ?snapshot.day_low,
                day_high = ?snapshot.day_high,
                "Last price outside day range"
            );
        }

        outcome
    }

    /// Get every snapshot, sorted by symbol.
    #[must_use]
    pub fn get_all(&self) -> Vec<EntitySnapshot> {
        let mut snapshots: Vec<_> = self.entities.read().values().cloned().collect();
        snapshots.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        snapshots
    }

    /// Get the snapshot for one symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<EntitySnapshot> {
        self.entities.read().get(symbol).cloned()
    }

    /// Tracked symbols, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.entities.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Whether no instrument is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn seeded_store_has_three_indices() {
        let store = EntityStore::seeded();
        assert_eq!(store.len(), 3);
        assert_eq!(store.symbols(), vec!["BANKNIFTY", "NIFTY50", "SENSEX"]);
    }

    #[test]
    fn update_known_symbol_changes_only_present_fields() {
        let store = EntityStore::seeded();
        let before = store.get("NIFTY50").unwrap();

        let outcome = store.update(PartialRecord::new("NIFTY50").with_last_price(22_050.5));

        assert_eq!(outcome, UpdateOutcome::Updated);
        let after = store.get("NIFTY50").unwrap();
        assert_eq!(after.last_price, Some(22_050.5));
        assert_eq!(after.name, before.name);
        assert_eq!(after.change, before.change);
        assert_eq!(after.change_percent, before.change_percent);
        assert_eq!(after.volume, before.volume);
        assert_eq!(after.day_high, before.day_high);
        assert_eq!(after.day_low, before.day_low);
    }

    #[test]
    fn update_unknown_symbol_creates_partial_entity() {
        let store = EntityStore::seeded();

        let outcome = store.update(PartialRecord::new("MIDCAP").with_last_price(10_500.0));

        assert_eq!(outcome, UpdateOutcome::Created);
        assert_eq!(store.len(), 4);
        let midcap = store.get("MIDCAP").unwrap();
        assert_eq!(midcap, EntitySnapshot::from(PartialRecord::new("MIDCAP").with_last_price(10_500.0)));
        assert!(midcap.name.is_none());
        assert!(midcap.volume.is_none());
    }

    #[test]
    fn update_same_record_twice_is_unchanged() {
        let store = EntityStore::seeded();
        let record = PartialRecord::new("SENSEX").with_last_price(72_100.0).with_volume(1);

        assert_eq!(store.update(record.clone()), UpdateOutcome::Updated);
        let once = store.get("SENSEX").unwrap();
        assert_eq!(store.update(record), UpdateOutcome::Unchanged);
        assert_eq!(store.get("SENSEX").unwrap(), once);
    }

    #[test]
    fn update_out_of_range_price_is_still_applied() {
        let store = EntityStore::seeded();
        store.update(PartialRecord::new("BANKNIFTY").with_last_price(50_000.0));

        let bank = store.get("BANKNIFTY").unwrap();
        assert_eq!(bank.last_price, Some(50_000.0));
        assert!(!bank.day_range_consistent());
    }

    #[test]
    fn get_all_returns_sorted_copies() {
        let store = EntityStore::seeded();
        let mut all = store.get_all();
        let symbols: Vec<_> = all.iter().map(|s| s.symbol.clone()).collect();
        assert_eq!(symbols, vec!["BANKNIFTY", "NIFTY50", "SENSEX"]);

        // Mutating the copy never reaches the store
        all[0].last_price = Some(0.0);
        assert_eq!(store.get("BANKNIFTY").unwrap().last_price, Some(46_500.0));
    }

    #[test]
    fn get_unknown_symbol_is_none() {
        let store = EntityStore::new();
        assert!(store.is_empty());
        assert!(store.get("NIFTY50").is_none());
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = std::sync::Arc::new(EntityStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for v in 0..100_u64 {
                        store.update(PartialRecord::new(format!("SYM{i}")).with_volume(v));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        assert!(store.get_all().iter().all(|s| s.volume == Some(99)));
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    fn opt_price() -> impl Strategy<Value = Option<f64>> {
        proptest::option::of(-1.0e6..1.0e6_f64)
    }

    prop_compose! {
        fn partial_record(symbol: &'static str)(
            name in proptest::option::of("[A-Za-z ]{1,16}"),
            last_price in opt_price(),
            change in opt_price(),
            change_percent in opt_price(),
            volume in proptest::option::of(any::<u64>()),
            day_high in opt_price(),
            day_low in opt_price(),
        ) -> PartialRecord {
            PartialRecord {
                symbol: symbol.to_string(),
                name,
                last_price,
                change,
                change_percent,
                volume,
                day_high,
                day_low,
            }
        }
    }

    fn expect_field<T: Clone + PartialEq + std::fmt::Debug>(
        before: Option<&T>,
        update: Option<&T>,
        after: Option<&T>,
    ) {
        match update {
            Some(value) => assert_eq!(after, Some(value)),
            None => assert_eq!(after, before),
        }
    }

    proptest! {
        #[test]
        fn new_symbol_snapshot_equals_record(record in partial_record("NEWSYM")) {
            let store = EntityStore::seeded();
            prop_assert_eq!(store.update(record.clone()), UpdateOutcome::Created);
            prop_assert_eq!(store.get("NEWSYM").unwrap(), EntitySnapshot::from(record));
        }

        #[test]
        fn merge_changes_exactly_present_keys(record in partial_record("NIFTY50")) {
            let store = EntityStore::seeded();
            let before = store.get("NIFTY50").unwrap();
            store.update(record.clone());
            let after = store.get("NIFTY50").unwrap();

            prop_assert_eq!(&after.symbol, &before.symbol);
            expect_field(before.name.as_ref(), record.name.as_ref(), after.name.as_ref());
            expect_field(before.last_price.as_ref(), record.last_price.as_ref(), after.last_price.as_ref());
            expect_field(before.change.as_ref(), record.change.as_ref(), after.change.as_ref());
            expect_field(before.change_percent.as_ref(), record.change_percent.as_ref(), after.change_percent.as_ref());
            expect_field(before.volume.as_ref(), record.volume.as_ref(), after.volume.as_ref());
            expect_field(before.day_high.as_ref(), record.day_high.as_ref(), after.day_high.as_ref());
            expect_field(before.day_low.as_ref(), record.day_low.as_ref(), after.day_low.as_ref());
        }

        #[test]
        fn merge_is_idempotent(record in partial_record("SENSEX")) {
            let store = EntityStore::seeded();
            store.update(record.clone());
            let once = store.get("SENSEX").unwrap();
            prop_assert_eq!(store.update(record), UpdateOutcome::Unchanged);
            prop_assert_eq!(store.get("SENSEX").unwrap(), once);
        }

        #[test]
        fn unrelated_symbols_untouched(record in partial_record("NIFTY50")) {
            let store = EntityStore::seeded();
            let sensex = store.get("SENSEX").unwrap();
            let bank = store.get("BANKNIFTY").unwrap();
            store.update(record);
            prop_assert_eq!(store.get("SENSEX").unwrap(), sensex);
            prop_assert_eq!(store.get("BANKNIFTY").unwrap(), bank);
        }
    }
}
