use criterion::{criterion_group, criterion_main, Criterion};
use shipledger_core::{Identity, Ledger, NewShipment, ShipmentState, TransferRequest};

fn product() -> NewShipment {
    NewShipment {
        name: "Pallet".to_owned(),
        description: "Mixed goods".to_owned(),
        origin: "Rotterdam".to_owned(),
        destination: "Basel".to_owned(),
        delivery_date: "2025-12-01".to_owned(),
        units: 40,
        weight: 812.5,
    }
}

fn bench_create(c: &mut Criterion) {
    c.bench_function("ledger_create", |b| {
        b.iter_with_setup(
            || {
                let dir = tempfile::tempdir().unwrap();
                let ledger = Ledger::open(dir.path()).unwrap();
                (dir, ledger)
            },
            |(_dir, mut ledger)| {
                ledger.create(product(), &Identity::from("U0")).unwrap();
            },
        );
    });
}

fn bench_transfer_long_history(c: &mut Criterion) {
    c.bench_function("ledger_transfer_after_100", |b| {
        b.iter_with_setup(
            || {
                let dir = tempfile::tempdir().unwrap();
                let mut ledger = Ledger::open(dir.path()).unwrap();
                let u0 = Identity::from("U0");
                let id = ledger.create(product(), &u0).unwrap();
                for _ in 0..100 {
                    ledger
                        .transfer(
                            TransferRequest {
                                shipment_id: id,
                                new_owner: u0.clone(),
                                new_state: ShipmentState::InTransit,
                                location: "Hub".to_owned(),
                                notes: String::new(),
                            },
                            &u0,
                        )
                        .unwrap();
                }
                (dir, ledger, id)
            },
            |(_dir, mut ledger, id)| {
                let u0 = Identity::from("U0");
                ledger
                    .transfer(
                        TransferRequest {
                            shipment_id: id,
                            new_owner: Identity::from("U1"),
                            new_state: ShipmentState::Delivered,
                            location: "Basel".to_owned(),
                            notes: String::new(),
                        },
                        &u0,
                    )
                    .unwrap();
            },
        );
    });
}

fn bench_verify(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = Ledger::open(dir.path()).unwrap();
    let u0 = Identity::from("U0");
    for _ in 0..50 {
        ledger.create(product(), &u0).unwrap();
    }
    c.bench_function("ledger_verify_50", |b| {
        b.iter(|| {
            ledger.verify_store().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_create,
    bench_transfer_long_history,
    bench_verify
);
criterion_main!(benches);
