use crate::counters::CounterStore;
use crate::layout::StoreLayout;
use crate::records::ShipmentStore;
use crate::shipment::{Shipment, ShipmentState};
use crate::types::TransferId;
use crate::StoreError;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub shipments_checked: usize,
    pub shipments_passed: usize,
    pub transfers_checked: usize,
    pub failed: Vec<IntegrityFailure>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct IntegrityFailure {
    pub record: String,
    pub reason: String,
}

/// Walk every shipment record and the counters, checking the ledger invariants.
pub fn verify_store_integrity(layout: &StoreLayout) -> Result<IntegrityReport, StoreError> {
    let shipment_store = ShipmentStore::new(layout.clone());
    let counters = CounterStore::new(layout.clone()).load()?;

    let mut report = IntegrityReport::default();
    let mut seen_shipments = BTreeSet::new();
    let mut seen_transfers: BTreeSet<TransferId> = BTreeSet::new();

    for entry in shipment_store.list_with_errors()? {
        report.shipments_checked += 1;
        let shipment = match entry {
            Ok(s) => s,
            Err((name, StoreError::IntegrityFailure { actual, .. })) => {
                report.failed.push(IntegrityFailure {
                    record: name,
                    reason: format!("shipment checksum mismatch: got {actual}"),
                });
                continue;
            }
            Err((name, e)) => {
                report.failed.push(IntegrityFailure {
                    record: name,
                    reason: format!("shipment read error: {e}"),
                });
                continue;
            }
        };

        report.transfers_checked += shipment.transfers.len();
        let before = report.failed.len();
        check_shipment(&shipment, &mut seen_transfers, &mut report.failed);
        if shipment.id >= counters.next_shipment_id {
            report.failed.push(IntegrityFailure {
                record: format!("shipment {}", shipment.id),
                reason: format!(
                    "id is not below the shipment counter ({})",
                    counters.next_shipment_id
                ),
            });
        }
        seen_shipments.insert(shipment.id.get());
        if report.failed.len() == before {
            report.shipments_passed += 1;
        }
    }

    for id in 1..counters.next_shipment_id.get() {
        if !seen_shipments.contains(&id) && !layout.shipment_path(id).exists() {
            report.failed.push(IntegrityFailure {
                record: format!("shipment {id}"),
                reason: "allocated id has no stored record".to_owned(),
            });
        }
    }

    if let Some(max) = seen_transfers.last() {
        if *max >= counters.next_transfer_id {
            report.failed.push(IntegrityFailure {
                record: format!("transfer {max}"),
                reason: format!(
                    "id is not below the transfer counter ({})",
                    counters.next_transfer_id
                ),
            });
        }
    }

    Ok(report)
}

fn check_shipment(
    shipment: &Shipment,
    seen_transfers: &mut BTreeSet<TransferId>,
    failed: &mut Vec<IntegrityFailure>,
) {
    let record = format!("shipment {}", shipment.id);
    let mut fail = |reason: String| {
        failed.push(IntegrityFailure {
            record: record.clone(),
            reason,
        });
    };

    let mut prev: Option<(TransferId, u64)> = None;
    for t in &shipment.transfers {
        if t.shipment_id != shipment.id {
            fail(format!(
                "transfer {} points at shipment {}",
                t.id, t.shipment_id
            ));
        }
        if !seen_transfers.insert(t.id) {
            fail(format!("transfer id {} is used more than once", t.id));
        }
        if let Some((prev_id, prev_ts)) = prev {
            if t.id <= prev_id {
                fail(format!("transfer {} is out of order after {prev_id}", t.id));
            }
            if t.timestamp < prev_ts {
                fail(format!(
                    "transfer {} timestamp {} precedes {prev_ts}",
                    t.id, t.timestamp
                ));
            }
        }
        prev = Some((t.id, t.timestamp));
    }

    let (expected_state, expected_owner) = match shipment.transfers.last() {
        Some(last) => (last.new_state, &last.new_owner),
        None => (ShipmentState::Created, &shipment.creator),
    };
    if shipment.state != expected_state {
        fail(format!(
            "state {} does not match transfer history ({expected_state})",
            shipment.state
        ));
    }
    if shipment.current_owner != *expected_owner {
        fail(format!(
            "current owner {} does not match transfer history ({expected_owner})",
            shipment.current_owner
        ));
    }
}
