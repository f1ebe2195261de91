//! Port Interfaces
//!
//! Contracts between infrastructure adapters and the domain.
//!
//! ## Driven Ports (Outbound)
//!
//! - `RecordSink`: receiver of decoded feed records. The feed subscription
//!   invokes it once per successfully decoded record, from a single task.

use crate::domain::snapshot::PartialRecord;
use crate::domain::store::EntityStore;

/// Receiver of decoded partial records.
pub trait RecordSink: Send + Sync {
    /// Handle one decoded record.
    fn on_record(&self, record: PartialRecord);
}

impl<F> RecordSink for F
where
    F: Fn(PartialRecord) + Send + Sync,
{
    fn on_record(&self, record: PartialRecord) {
        self(record);
    }
}

impl RecordSink for EntityStore {
    fn on_record(&self, record: PartialRecord) {
        self.update(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn closure_sink_receives_records() {
        let received = Mutex::new(Vec::new());
        let sink = |record: PartialRecord| received.lock().push(record.symbol);

        sink.on_record(PartialRecord::new("NIFTY50"));
        sink.on_record(PartialRecord::new("SENSEX"));

        assert_eq!(*received.lock(), vec!["NIFTY50", "SENSEX"]);
    }

    #[test]
    fn store_sink_merges_records() {
        let store = EntityStore::seeded();
        store.on_record(PartialRecord::new("NIFTY50").with_last_price(22_050.5));
        assert_eq!(store.get("NIFTY50").unwrap().last_price, Some(22_050.5));
    }
}
