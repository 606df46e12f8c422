use crate::layout::StoreLayout;
use crate::shipment::Shipment;
use crate::types::ShipmentId;
use crate::StoreError;
use std::fs;

/// One checksummed JSON file per shipment, holding its transfer history.
pub struct ShipmentStore {
    layout: StoreLayout,
}

impl ShipmentStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Write the record with an embedded checksum. Returns the checksum.
    pub fn put(&self, shipment: &Shipment) -> Result<String, StoreError> {
        let dest = self.layout.shipment_path(shipment.id.get());

        let checksum = shipment.compute_checksum()?;
        let mut with_checksum = shipment.clone();
        with_checksum.checksum = Some(checksum.clone());
        let content = serde_json::to_string_pretty(&with_checksum)?;

        crate::write_atomic(&self.layout.shipments_dir(), &dest, content.as_bytes())?;
        Ok(checksum)
    }

    pub fn get(&self, id: ShipmentId) -> Result<Shipment, StoreError> {
        let path = self.layout.shipment_path(id.get());
        if !path.exists() {
            return Err(StoreError::ShipmentNotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        let shipment: Shipment = serde_json::from_str(&content)?;

        if let Some(ref expected) = shipment.checksum {
            let actual = shipment.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    record: format!("shipment {id}"),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(shipment)
    }

    /// All records ordered by numeric id, each either loaded and verified or
    /// paired with its file name and the error that stopped it loading.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(
        &self,
    ) -> Result<Vec<Result<Shipment, (String, StoreError)>>, StoreError> {
        let dir = self.layout.shipments_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name_str = name.to_str().unwrap_or("").to_owned();
            let Some(stem) = name_str.strip_suffix(".json") else {
                continue;
            };
            match stem.parse::<ShipmentId>() {
                Ok(id) => ids.push((id, name_str)),
                Err(_) => tracing::debug!("ignoring non-record file '{name_str}'"),
            }
        }
        ids.sort_by_key(|(id, _)| *id);

        Ok(ids
            .into_iter()
            .map(|(id, name)| self.get(id).map_err(|e| (name, e)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipment::{ShipmentState, Transfer};
    use crate::types::{Identity, TransferId};

    fn test_store() -> (tempfile::TempDir, StoreLayout, ShipmentStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        let store = ShipmentStore::new(layout.clone());
        (dir, layout, store)
    }

    fn sample(id: u64) -> Shipment {
        Shipment {
            id: ShipmentId::new(id),
            name: "Product B".to_owned(),
            description: "Desc B".to_owned(),
            origin: "NY".to_owned(),
            destination: "LA".to_owned(),
            delivery_date: "2025-11-11".to_owned(),
            units: 5,
            weight: 50.0,
            state: ShipmentState::Created,
            current_owner: Identity::from("owner"),
            creator: Identity::from("owner"),
            created_at: 100,
            transfers: Vec::new(),
            checksum: None,
        }
    }

    #[test]
    fn shipment_roundtrip() {
        let (_dir, _layout, store) = test_store();
        let mut s = sample(1);
        s.transfers.push(Transfer {
            id: TransferId::new(1),
            shipment_id: s.id,
            timestamp: 200,
            new_state: ShipmentState::InTransit,
            location: "Checkpoint 1".to_owned(),
            transfer_notes: "Left origin".to_owned(),
            new_owner: Identity::from("user1"),
        });
        store.put(&s).unwrap();
        let back = store.get(s.id).unwrap();
        assert!(back.checksum.is_some(), "put() must embed a checksum");
        assert_eq!(back.transfers, s.transfers);
        assert_eq!(back.name, s.name);
    }

    #[test]
    fn missing_shipment_is_not_found() {
        let (_dir, _layout, store) = test_store();
        assert!(matches!(
            store.get(ShipmentId::new(999)),
            Err(StoreError::ShipmentNotFound(_))
        ));
    }

    #[test]
    fn fractional_weight_checksum_is_stable() {
        let (_dir, _layout, store) = test_store();
        let mut s = sample(1);
        s.weight = 1.910_192_833_548_181_5;
        store.put(&s).unwrap();
        assert_eq!(store.get(s.id).unwrap().weight, s.weight);
    }

    #[test]
    fn tampered_record_fails_checksum() {
        let (_dir, layout, store) = test_store();
        store.put(&sample(1)).unwrap();
        let path = layout.shipment_path(1);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("\"units\": 5", "\"units\": 500")).unwrap();
        assert!(matches!(
            store.get(ShipmentId::new(1)),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn listing_orders_numerically_and_reports_corrupt() {
        let (_dir, layout, store) = test_store();
        for id in [10, 2, 1] {
            store.put(&sample(id)).unwrap();
        }
        fs::write(layout.shipment_path(5), "not json").unwrap();
        fs::write(layout.shipments_dir().join("notes.txt"), "x").unwrap();

        let entries = store.list_with_errors().unwrap();
        assert_eq!(entries.len(), 4);
        let ids: Vec<u64> = entries
            .iter()
            .filter_map(|e| e.as_ref().ok())
            .map(|s| s.id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 10]);
        let errors: Vec<&str> = entries
            .iter()
            .filter_map(|e| e.as_ref().err())
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(errors, vec!["5.json"]);
    }
}
