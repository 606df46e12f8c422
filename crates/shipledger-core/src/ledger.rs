use crate::clock::{Clock, SystemClock};
use crate::concurrency::StoreLock;
use crate::lifecycle::{authorize, is_backward_move, validate_new_shipment};
use crate::CoreError;
use serde::Serialize;
use shipledger_store::{
    CounterStore, Counters, Identity, Shipment, ShipmentId, ShipmentState, ShipmentStore,
    StoreError, StoreLayout, Transfer, TransferId, WalOpKind, WriteAheadLog,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Inputs to [`Ledger::create`].
///
/// `units` and `weight` are signed so that non-positive values reach
/// validation instead of being unrepresentable.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub name: String,
    pub description: String,
    pub origin: String,
    pub destination: String,
    pub delivery_date: String,
    pub units: i64,
    pub weight: f64,
}

/// Inputs to [`Ledger::transfer`].
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub shipment_id: ShipmentId,
    pub new_owner: Identity,
    pub new_state: ShipmentState,
    pub location: String,
    pub notes: String,
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    pub shipment_id: ShipmentId,
    pub new_owner: Identity,
    pub new_state: ShipmentState,
    pub timestamp: u64,
}

/// The authoritative shipment ledger.
///
/// Owns the shipment store and both identifier sequences. Mutations take
/// `&mut self` and are all-or-nothing: validation runs before anything is
/// allocated, and durable writes go through the write-ahead log so a failed
/// operation leaves neither records nor consumed ids behind. The store lock is
/// held for the ledger's lifetime.
pub struct Ledger {
    layout: StoreLayout,
    shipment_store: ShipmentStore,
    counter_store: CounterStore,
    wal: WriteAheadLog,
    pub(crate) shipments: BTreeMap<ShipmentId, Shipment>,
    pub(crate) counters: Counters,
    clock: Box<dyn Clock>,
    _lock: StoreLock,
}

impl Ledger {
    /// Open (or create) the ledger rooted at `store_root` using the system clock.
    pub fn open(store_root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        Self::open_with_clock(store_root, SystemClock)
    }

    /// Open the ledger with an injected clock.
    ///
    /// Incomplete operations left by a previous crash are rolled back before
    /// any record is loaded.
    pub fn open_with_clock(
        store_root: impl Into<PathBuf>,
        clock: impl Clock + 'static,
    ) -> Result<Self, CoreError> {
        let layout = StoreLayout::new(store_root);
        // Nothing under the root is touched before the lock is ours.
        let lock = StoreLock::try_acquire(&layout)?;
        layout.initialize()?;

        let wal = WriteAheadLog::new(&layout);
        wal.initialize()?;
        let recovered = wal.recover()?;
        if recovered > 0 {
            warn!("rolled back {recovered} incomplete operation(s) from a previous run");
        }

        let shipment_store = ShipmentStore::new(layout.clone());
        let counter_store = CounterStore::new(layout.clone());

        let mut shipments = BTreeMap::new();
        for entry in shipment_store.list_with_errors()? {
            let shipment = entry.map_err(|(_, e)| e)?;
            shipments.insert(shipment.id, shipment);
        }
        let counters = counter_store.load()?;

        info!(
            "opened ledger at {} ({} shipments, next shipment id {}, next transfer id {})",
            layout.root().display(),
            shipments.len(),
            counters.next_shipment_id,
            counters.next_transfer_id
        );

        Ok(Self {
            layout,
            shipment_store,
            counter_store,
            wal,
            shipments,
            counters,
            clock: Box::new(clock),
            _lock: lock,
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Record a new shipment owned by `caller` and return its id.
    pub fn create(
        &mut self,
        input: NewShipment,
        caller: &Identity,
    ) -> Result<ShipmentId, CoreError> {
        let (units, weight) = validate_new_shipment(&input)?;

        let mut counters = self.counters;
        let id = counters.allocate_shipment_id();

        let mut shipment = Shipment {
            id,
            name: input.name,
            description: input.description,
            origin: input.origin,
            destination: input.destination,
            delivery_date: input.delivery_date,
            units,
            weight,
            state: ShipmentState::Created,
            current_owner: caller.clone(),
            creator: caller.clone(),
            created_at: self.clock.now(),
            transfers: Vec::new(),
            checksum: None,
        };

        self.commit(WalOpKind::Create, &mut shipment, &counters)?;
        self.counters = counters;
        info!("created shipment {id} owned by {caller}");
        self.shipments.insert(id, shipment);
        Ok(id)
    }

    /// Hand a shipment to `request.new_owner` in `request.new_state`.
    ///
    /// Only the current owner may transfer. The new state is not checked
    /// against the current one.
    pub fn transfer(
        &mut self,
        request: TransferRequest,
        caller: &Identity,
    ) -> Result<TransferReceipt, CoreError> {
        let current = self
            .shipments
            .get(&request.shipment_id)
            .ok_or_else(CoreError::shipment_not_found)?;
        authorize(current, caller)?;

        if is_backward_move(current.state, request.new_state) {
            warn!(
                "shipment {} moved backward: {} -> {}",
                current.id, current.state, request.new_state
            );
        }

        let mut counters = self.counters;
        let transfer_id = counters.allocate_transfer_id();

        // History stays non-decreasing even if the wall clock steps back.
        let now = self.clock.now();
        let timestamp = current
            .last_transfer()
            .map_or(now, |last| now.max(last.timestamp));

        let mut updated = current.clone();
        updated.transfers.push(Transfer {
            id: transfer_id,
            shipment_id: request.shipment_id,
            timestamp,
            new_state: request.new_state,
            location: request.location,
            transfer_notes: request.notes,
            new_owner: request.new_owner.clone(),
        });
        updated.current_owner = request.new_owner.clone();
        updated.state = request.new_state;

        self.commit(WalOpKind::Transfer, &mut updated, &counters)?;
        self.counters = counters;
        info!(
            "transfer {transfer_id}: shipment {} -> {} ({})",
            request.shipment_id, request.new_owner, request.new_state
        );
        self.shipments.insert(request.shipment_id, updated);

        Ok(TransferReceipt {
            transfer_id,
            shipment_id: request.shipment_id,
            new_owner: request.new_owner,
            new_state: request.new_state,
            timestamp,
        })
    }

    /// Durably write `shipment` and `counters` as one operation.
    ///
    /// On failure every write made so far is undone before returning, and
    /// the in-memory state is left untouched by the caller.
    fn commit(
        &self,
        kind: WalOpKind,
        shipment: &mut Shipment,
        counters: &Counters,
    ) -> Result<(), CoreError> {
        let op_id = self.wal.begin(kind, shipment.id)?;

        let outcome = self
            .write_guarded(&op_id, shipment, counters)
            .and_then(|()| self.wal.commit(&op_id));

        match outcome {
            Ok(()) => {
                debug!("{kind} on shipment {} committed (op_id={op_id})", shipment.id);
                Ok(())
            }
            Err(e) => {
                warn!("{kind} on shipment {} failed, rolling back: {e}", shipment.id);
                if let Err(rb) = self.wal.rollback(&op_id) {
                    warn!("rollback of {op_id} incomplete, will retry on next open: {rb}");
                }
                Err(e.into())
            }
        }
    }

    fn write_guarded(
        &self,
        op_id: &str,
        shipment: &mut Shipment,
        counters: &Counters,
    ) -> Result<(), StoreError> {
        let record_path = self.layout.shipment_path(shipment.id.get());
        self.wal.guard_file(op_id, &record_path)?;
        self.wal.guard_file(op_id, &self.layout.counters_file())?;

        shipment.checksum = Some(self.shipment_store.put(shipment)?);
        self.counter_store.save(counters)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn new_shipment(units: i64, weight: f64) -> NewShipment {
        NewShipment {
            name: "Product A".to_owned(),
            description: "Description A".to_owned(),
            origin: "Origin A".to_owned(),
            destination: "Destination A".to_owned(),
            delivery_date: "2025-12-01".to_owned(),
            units,
            weight,
        }
    }

    fn request(id: u64, owner: &str, state: ShipmentState) -> TransferRequest {
        TransferRequest {
            shipment_id: ShipmentId::new(id),
            new_owner: Identity::from(owner),
            new_state: state,
            location: "Checkpoint 1".to_owned(),
            notes: "Left origin".to_owned(),
        }
    }

    fn open(clock: &ManualClock) -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open_with_clock(dir.path(), clock.clone()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let clock = ManualClock::new(1_000);
        let (_dir, mut ledger) = open(&clock);
        let u0 = Identity::from("U0");

        let a = ledger.create(new_shipment(10, 100.0), &u0).unwrap();
        let b = ledger.create(new_shipment(1, 1.0), &u0).unwrap();
        assert_eq!(a, ShipmentId::new(1));
        assert_eq!(b, ShipmentId::new(2));
        assert_eq!(ledger.counters.next_shipment_id, 3u64);
    }

    #[test]
    fn create_stamps_creation_time_and_owner() {
        let clock = ManualClock::new(1_234);
        let (_dir, mut ledger) = open(&clock);
        let id = ledger
            .create(new_shipment(10, 100.0), &Identity::from("U0"))
            .unwrap();
        let s = &ledger.shipments[&id];
        assert_eq!(s.created_at, 1_234);
        assert_eq!(s.creator, "U0");
        assert_eq!(s.current_owner, "U0");
        assert!(s.checksum.is_some());
    }

    #[test]
    fn rejected_create_consumes_no_id() {
        let clock = ManualClock::new(0);
        let (dir, mut ledger) = open(&clock);
        let u0 = Identity::from("U0");

        assert!(ledger.create(new_shipment(0, 100.0), &u0).is_err());
        assert!(ledger.create(new_shipment(10, 0.0), &u0).is_err());
        assert_eq!(ledger.counters.next_shipment_id, 1u64);
        assert!(!StoreLayout::new(dir.path()).shipment_path(1).exists());

        let id = ledger.create(new_shipment(10, 100.0), &u0).unwrap();
        assert_eq!(id, ShipmentId::new(1));
    }

    #[test]
    fn transfer_timestamps_never_go_backward() {
        let clock = ManualClock::new(500);
        let (_dir, mut ledger) = open(&clock);
        let u0 = Identity::from("U0");
        let id = ledger.create(new_shipment(1, 1.0), &u0).unwrap();

        let first = ledger
            .transfer(request(id.get(), "U0", ShipmentState::InTransit), &u0)
            .unwrap();
        clock.set(100);
        let second = ledger
            .transfer(request(id.get(), "U0", ShipmentState::Stored), &u0)
            .unwrap();
        assert_eq!(first.timestamp, 500);
        assert_eq!(second.timestamp, 500);
    }

    #[test]
    fn transfer_ids_are_shared_across_shipments() {
        let clock = ManualClock::new(0);
        let (_dir, mut ledger) = open(&clock);
        let u0 = Identity::from("U0");
        let a = ledger.create(new_shipment(1, 1.0), &u0).unwrap();
        let b = ledger.create(new_shipment(1, 1.0), &u0).unwrap();

        let t1 = ledger
            .transfer(request(a.get(), "U0", ShipmentState::InTransit), &u0)
            .unwrap();
        let t2 = ledger
            .transfer(request(b.get(), "U1", ShipmentState::InTransit), &u0)
            .unwrap();
        let t3 = ledger
            .transfer(request(a.get(), "U2", ShipmentState::Stored), &u0)
            .unwrap();
        assert_eq!(
            [t1.transfer_id, t2.transfer_id, t3.transfer_id],
            [TransferId::new(1), TransferId::new(2), TransferId::new(3)]
        );
    }

    #[test]
    fn failed_write_rolls_back_and_keeps_memory_state() {
        let clock = ManualClock::new(0);
        let (dir, mut ledger) = open(&clock);
        let u0 = Identity::from("U0");
        let id = ledger.create(new_shipment(1, 1.0), &u0).unwrap();

        // A directory where the counters file should be fails the operation midway.
        let layout = StoreLayout::new(dir.path());
        std::fs::remove_file(layout.counters_file()).unwrap();
        std::fs::create_dir(layout.counters_file()).unwrap();

        let before = std::fs::read_to_string(layout.shipment_path(1)).unwrap();
        let err = ledger
            .transfer(request(id.get(), "U1", ShipmentState::InTransit), &u0)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Store);

        assert_eq!(std::fs::read_to_string(layout.shipment_path(1)).unwrap(), before);
        assert_eq!(ledger.counters.next_transfer_id, 1u64);
        assert!(ledger.shipments[&id].transfers.is_empty());
        assert_eq!(ledger.shipments[&id].current_owner, "U0");
        assert!(std::fs::read_dir(layout.wal_dir()).unwrap().next().is_none());
    }

    #[test]
    fn second_open_on_same_store_is_refused() {
        let clock = ManualClock::new(0);
        let (dir, _ledger) = open(&clock);
        let err = Ledger::open(dir.path()).err().unwrap();
        assert!(matches!(err, CoreError::Store(StoreError::LockFailed(_))));
    }

    #[test]
    fn refused_open_leaves_the_store_untouched() {
        let clock = ManualClock::new(0);
        let (dir, ledger) = open(&clock);
        let version = ledger.layout().ledger_dir().join("version");
        std::fs::remove_file(&version).unwrap();

        assert!(Ledger::open(dir.path()).is_err());
        assert!(!version.exists());
    }
}
