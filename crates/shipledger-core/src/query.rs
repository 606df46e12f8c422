//! Read-only access to committed ledger state.
//!
//! Queries never allocate ids or touch the store; they see exactly what the
//! last successful mutation left in memory.

use crate::ledger::Ledger;
use crate::CoreError;
use shipledger_store::{
    verify_store_integrity, Identity, IntegrityReport, Shipment, ShipmentId, Transfer,
    TransferId,
};
use std::iter::FusedIterator;
use std::slice;

/// Which shipments a listing returns. Both criteria must hold when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentFilter {
    /// Current owner.
    pub owner: Option<Identity>,
    /// Creator or any past new owner.
    pub participant: Option<Identity>,
}

/// A shipment's transfers in commit order.
#[derive(Debug, Clone)]
pub struct TransferHistory<'a> {
    inner: slice::Iter<'a, Transfer>,
}

impl<'a> TransferHistory<'a> {
    fn new(transfers: &'a [Transfer]) -> Self {
        Self {
            inner: transfers.iter(),
        }
    }

    /// The transfers not yet yielded.
    pub fn as_slice(&self) -> &'a [Transfer] {
        self.inner.as_slice()
    }
}

impl<'a> Iterator for TransferHistory<'a> {
    type Item = &'a Transfer;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for TransferHistory<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for TransferHistory<'_> {}
impl FusedIterator for TransferHistory<'_> {}

impl Ledger {
    pub fn shipment(&self, id: ShipmentId) -> Result<&Shipment, CoreError> {
        self.shipments
            .get(&id)
            .ok_or_else(CoreError::shipment_not_found)
    }

    /// Transfer history of shipment `id`, oldest first.
    pub fn transfers(&self, id: ShipmentId) -> Result<TransferHistory<'_>, CoreError> {
        self.shipment(id).map(|s| TransferHistory::new(&s.transfers))
    }

    /// The id the next successful `create` will receive.
    pub fn next_shipment_id(&self) -> ShipmentId {
        self.counters.next_shipment_id
    }

    /// The id the next successful `transfer` will receive.
    pub fn next_transfer_id(&self) -> TransferId {
        self.counters.next_transfer_id
    }

    /// All shipments ordered by id.
    pub fn shipments(&self) -> impl Iterator<Item = &Shipment> + '_ {
        self.shipments.values()
    }

    pub fn shipments_owned_by<'a>(
        &'a self,
        owner: &'a Identity,
    ) -> impl Iterator<Item = &'a Shipment> + 'a {
        self.shipments
            .values()
            .filter(move |s| s.current_owner == *owner)
    }

    /// Shipments `identity` has created, owned, or received at some point.
    pub fn shipments_involving<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> impl Iterator<Item = &'a Shipment> + 'a {
        self.shipments.values().filter(move |s| s.involves(identity))
    }

    /// Shipments matching `filter`, ordered by id.
    pub fn list_shipments<'a>(&'a self, filter: &'a ShipmentFilter) -> Vec<&'a Shipment> {
        match (&filter.owner, &filter.participant) {
            (Some(owner), participant) => self
                .shipments_owned_by(owner)
                .filter(|s| participant.as_ref().map_or(true, |p| s.involves(p)))
                .collect(),
            (None, Some(participant)) => self.shipments_involving(participant).collect(),
            (None, None) => self.shipments().collect(),
        }
    }

    pub fn shipment_count(&self) -> usize {
        self.shipments.len()
    }

    /// Re-read every record from disk and cross-check it against the
    /// counters. The in-memory state is not consulted.
    pub fn verify_store(&self) -> Result<IntegrityReport, CoreError> {
        Ok(verify_store_integrity(self.layout())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ledger::{NewShipment, TransferRequest};
    use crate::ErrorKind;
    use shipledger_store::ShipmentState;

    fn new_shipment(name: &str) -> NewShipment {
        NewShipment {
            name: name.to_owned(),
            description: "Desc".to_owned(),
            origin: "NY".to_owned(),
            destination: "LA".to_owned(),
            delivery_date: "2025-11-11".to_owned(),
            units: 5,
            weight: 50.0,
        }
    }

    fn hand_over(ledger: &mut Ledger, id: ShipmentId, from: &str, to: &str, state: ShipmentState) {
        ledger
            .transfer(
                TransferRequest {
                    shipment_id: id,
                    new_owner: Identity::from(to),
                    new_state: state,
                    location: "Depot".to_owned(),
                    notes: String::new(),
                },
                &Identity::from(from),
            )
            .unwrap();
    }

    #[test]
    fn empty_ledger_queries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open_with_clock(dir.path(), ManualClock::new(0)).unwrap();

        assert_eq!(ledger.next_shipment_id(), ShipmentId::new(1));
        assert_eq!(ledger.next_transfer_id(), TransferId::new(1));
        assert_eq!(ledger.shipments().count(), 0);
        assert_eq!(ledger.shipment_count(), 0);

        let err = ledger.shipment(ShipmentId::new(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            ledger.transfers(ShipmentId::new(0)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn history_is_exact_size_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open_with_clock(dir.path(), ManualClock::new(10)).unwrap();
        let id = ledger
            .create(new_shipment("A"), &Identity::from("U0"))
            .unwrap();
        hand_over(&mut ledger, id, "U0", "U1", ShipmentState::InTransit);
        hand_over(&mut ledger, id, "U1", "U2", ShipmentState::Stored);

        let mut history = ledger.transfers(id).unwrap();
        assert_eq!(history.len(), 2);
        let first = history.next().unwrap();
        assert_eq!(first.new_owner, "U1");
        assert_eq!(history.len(), 1);
        assert_eq!(history.as_slice()[0].new_owner, "U2");

        let owners: Vec<&str> = ledger
            .transfers(id)
            .unwrap()
            .rev()
            .map(|t| t.new_owner.as_str())
            .collect();
        assert_eq!(owners, ["U2", "U1"]);
    }

    #[test]
    fn owner_and_participant_filters() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open_with_clock(dir.path(), ManualClock::new(0)).unwrap();
        let u0 = Identity::from("U0");
        let u1 = Identity::from("U1");
        let a = ledger.create(new_shipment("A"), &u0).unwrap();
        let b = ledger.create(new_shipment("B"), &u0).unwrap();
        hand_over(&mut ledger, a, "U0", "U1", ShipmentState::InTransit);

        let owned: Vec<ShipmentId> = ledger.shipments_owned_by(&u0).map(|s| s.id).collect();
        assert_eq!(owned, [b]);
        let owned: Vec<ShipmentId> = ledger.shipments_owned_by(&u1).map(|s| s.id).collect();
        assert_eq!(owned, [a]);

        let involved: Vec<ShipmentId> = ledger.shipments_involving(&u0).map(|s| s.id).collect();
        assert_eq!(involved, [a, b]);
        let involved: Vec<ShipmentId> = ledger.shipments_involving(&u1).map(|s| s.id).collect();
        assert_eq!(involved, [a]);
    }

    #[test]
    fn list_shipments_combines_filters() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open_with_clock(dir.path(), ManualClock::new(0)).unwrap();
        let u0 = Identity::from("U0");
        let a = ledger.create(new_shipment("A"), &u0).unwrap();
        let b = ledger.create(new_shipment("B"), &u0).unwrap();
        let c = ledger.create(new_shipment("C"), &Identity::from("U2")).unwrap();
        hand_over(&mut ledger, a, "U0", "U1", ShipmentState::InTransit);
        hand_over(&mut ledger, c, "U2", "U1", ShipmentState::InTransit);

        let ids = |filter: ShipmentFilter| -> Vec<ShipmentId> {
            ledger.list_shipments(&filter).iter().map(|s| s.id).collect()
        };
        assert_eq!(ids(ShipmentFilter::default()), [a, b, c]);
        assert_eq!(
            ids(ShipmentFilter {
                owner: Some(Identity::from("U1")),
                participant: None,
            }),
            [a, c]
        );
        assert_eq!(
            ids(ShipmentFilter {
                owner: None,
                participant: Some(u0.clone()),
            }),
            [a, b]
        );
        assert_eq!(
            ids(ShipmentFilter {
                owner: Some(Identity::from("U1")),
                participant: Some(u0),
            }),
            [a]
        );
    }

    #[test]
    fn verify_store_on_healthy_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open_with_clock(dir.path(), ManualClock::new(0)).unwrap();
        let id = ledger.create(new_shipment("A"), &Identity::from("U0")).unwrap();
        hand_over(&mut ledger, id, "U0", "U1", ShipmentState::Delivered);

        let report = ledger.verify_store().unwrap();
        assert!(report.is_clean(), "{:?}", report.failed);
        assert_eq!(report.shipments_checked, 1);
        assert_eq!(report.transfers_checked, 1);
    }
}
