//! Index Snapshot Types
//!
//! Domain types for tracked market index instruments:
//!
//! - `EntitySnapshot`: last known state of one instrument
//! - `PartialRecord`: a subset of snapshot fields carried by one feed update
//!
//! Every field except `symbol` is optional. A snapshot first seen through a
//! partial record only carries the fields that record had.
//!
//! Field names serialize in camelCase to match the feed wire format.

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// An instrument symbol (e.g. `NIFTY50`).
pub type Symbol = String;

/// Partial update for one instrument.
///
/// Fields set to `None` are absent from the update and leave the stored
/// value untouched when merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRecord {
    /// Instrument symbol (merge key).
    pub symbol: Symbol,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Last traded price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    /// Absolute change since previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    /// Percentage change since previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    /// Traded volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Session high.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,
    /// Session low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,
}

impl PartialRecord {
    /// Create a record carrying only a symbol.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            last_price: None,
            change: None,
            change_percent: None,
            volume: None,
            day_high: None,
            day_low: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the last price.
    #[must_use]
    pub const fn with_last_price(mut self, price: f64) -> Self {
        self.last_price = Some(price);
        self
    }

    /// Set the absolute and percentage change.
    #[must_use]
    pub const fn with_change(mut self, change: f64, change_percent: f64) -> Self {
        self.change = Some(change);
        self.change_percent = Some(change_percent);
        self
    }

    /// Set the traded volume.
    #[must_use]
    pub const fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Set the session range.
    #[must_use]
    pub const fn with_day_range(mut self, low: f64, high: f64) -> Self {
        self.day_low = Some(low);
        self.day_high = Some(high);
        self
    }

    /// Number of fields present besides the symbol.
    #[must_use]
    pub fn field_count(&self) -> usize {
        [
            self.name.is_some(),
            self.last_price.is_some(),
            self.change.is_some(),
            self.change_percent.is_some(),
            self.volume.is_some(),
            self.day_high.is_some(),
            self.day_low.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count()
    }
}

/// Last known state of one tracked instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    /// Instrument symbol (unique key).
    pub symbol: Symbol,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Last traded price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    /// Absolute change since previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    /// Percentage change since previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    /// Traded volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Session high.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,
    /// Session low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,
}

impl From<PartialRecord> for EntitySnapshot {
    fn from(record: PartialRecord) -> Self {
        Self {
            symbol: record.symbol,
            name: record.name,
            last_price: record.last_price,
            change: record.change,
            change_percent: record.change_percent,
            volume: record.volume,
            day_high: record.day_high,
            day_low: record.day_low,
        }
    }
}

impl EntitySnapshot {
    /// Merge a partial record into this snapshot.
    ///
    /// Every field present in `record` overwrites the stored value; absent
    /// fields are kept. The symbol is never rewritten.
    ///
    /// Returns `true` if any stored value changed.
    pub fn merge(&mut self, record: PartialRecord) -> bool {
        let mut changed = false;
        changed |= assign(&mut self.name, record.name);
        changed |= assign_price(&mut self.last_price, record.last_price);
        changed |= assign_price(&mut self.change, record.change);
        changed |= assign_price(&mut self.change_percent, record.change_percent);
        changed |= assign(&mut self.volume, record.volume);
        changed |= assign_price(&mut self.day_high, record.day_high);
        changed |= assign_price(&mut self.day_low, record.day_low);
        changed
    }

    /// Whether `day_low <= last_price <= day_high` holds.
    ///
    /// Snapshots missing any of the three fields are considered consistent.
    #[must_use]
    pub fn day_range_consistent(&self) -> bool {
        match (self.day_low, self.last_price, self.day_high) {
            (Some(low), Some(price), Some(high)) => low <= price && price <= high,
            _ => true,
        }
    }

    /// Whether every optional field is populated.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.last_price.is_some()
            && self.change.is_some()
            && self.change_percent.is_some()
            && self.volume.is_some()
            && self.day_high.is_some()
            && self.day_low.is_some()
    }
}

fn assign<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) if slot.as_ref() != Some(&v) => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

// Bitwise comparison so NaN re-applied over NaN counts as unchanged.
fn assign_price(slot: &mut Option<f64>, value: Option<f64>) -> bool {
    match value {
        Some(v) if slot.map(f64::to_bits) != Some(v.to_bits()) => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

// =============================================================================
// Seed Data
// =============================================================================

/// Initial index snapshots shown until the first matching feed update.
#[must_use]
pub fn seed_snapshots() -> Vec<EntitySnapshot> {
    vec![
        PartialRecord::new("NIFTY50")
            .with_name("Nifty 50 Index")
            .with_last_price(22_000.0)
            .with_change(150.0, 0.68)
            .with_volume(250_000_000)
            .with_day_range(21_900.0, 22_100.0)
            .into(),
        PartialRecord::new("SENSEX")
            .with_name("BSE SENSEX")
            .with_last_price(72_000.0)
            .with_change(-200.0, -0.28)
            .with_volume(180_000_000)
            .with_day_range(71_800.0, 72_200.0)
            .into(),
        PartialRecord::new("BANKNIFTY")
            .with_name("Nifty Bank Index")
            .with_last_price(46_500.0)
            .with_change(300.0, 0.65)
            .with_volume(120_000_000)
            .with_day_range(46_300.0, 46_700.0)
            .into(),
    ]
}

// =============================================================================
// Tests
// =============================================================================
