use crate::layout::StoreLayout;
use crate::types::{ShipmentId, TransferId};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;

/// The two identifier sequences: the next value each will hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_shipment_id: ShipmentId,
    pub next_transfer_id: TransferId,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            next_shipment_id: ShipmentId::FIRST,
            next_transfer_id: TransferId::FIRST,
        }
    }
}

impl Counters {
    /// Return the current shipment id and advance the sequence.
    pub fn allocate_shipment_id(&mut self) -> ShipmentId {
        let id = self.next_shipment_id;
        self.next_shipment_id = id.successor();
        id
    }

    /// Return the current transfer id and advance the sequence.
    pub fn allocate_transfer_id(&mut self) -> TransferId {
        let id = self.next_transfer_id;
        self.next_transfer_id = id.successor();
        id
    }
}

/// Persists [`Counters`] to `ledger/counters.json`.
pub struct CounterStore {
    layout: StoreLayout,
}

impl CounterStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Load the counters, or the fresh-ledger defaults if none were written yet.
    pub fn load(&self) -> Result<Counters, StoreError> {
        let path = self.layout.counters_file();
        if !path.exists() {
            return Ok(Counters::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, counters: &Counters) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(counters)?;
        crate::write_atomic(
            &self.layout.ledger_dir(),
            &self.layout.counters_file(),
            content.as_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, CounterStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, CounterStore::new(layout))
    }

    #[test]
    fn fresh_store_starts_at_one() {
        let (_dir, store) = setup();
        let c = store.load().unwrap();
        assert_eq!(c.next_shipment_id, 1u64);
        assert_eq!(c.next_transfer_id, 1u64);
    }

    #[test]
    fn sequences_are_independent() {
        let mut c = Counters::default();
        assert_eq!(c.allocate_shipment_id(), ShipmentId::new(1));
        assert_eq!(c.allocate_shipment_id(), ShipmentId::new(2));
        assert_eq!(c.allocate_transfer_id(), TransferId::new(1));
        assert_eq!(c.next_shipment_id, 3u64);
        assert_eq!(c.next_transfer_id, 2u64);
    }

    #[test]
    fn save_and_reload() {
        let (_dir, store) = setup();
        let mut c = Counters::default();
        c.allocate_shipment_id();
        c.allocate_transfer_id();
        c.allocate_transfer_id();
        store.save(&c).unwrap();
        assert_eq!(store.load().unwrap(), c);
    }
}
