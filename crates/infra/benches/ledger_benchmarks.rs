use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;
use std::time::Duration;

use medstock_infra::{BranchRegistry, InMemoryLedger, LedgerService};
use medstock_inventory::MovementType;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn ledger() -> Arc<LedgerService<InMemoryLedger>> {
    Arc::new(LedgerService::new(
        InMemoryLedger::new(),
        BranchRegistry::all(),
        Duration::from_secs(5),
    ))
}

fn bench_apply_movement_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("apply_movement_latency");

    group.bench_function("in_single_item", |b| {
        let ledger = ledger();
        let item = rt
            .block_on(ledger.add_initial_stock("erode", "Paracetamol", 0, None))
            .unwrap();
        b.iter(|| {
            rt.block_on(ledger.apply_movement("erode", item.id, MovementType::In, black_box(1)))
                .unwrap()
        });
    });

    group.bench_function("rejected_out", |b| {
        let ledger = ledger();
        let item = rt
            .block_on(ledger.add_initial_stock("erode", "Paracetamol", 0, None))
            .unwrap();
        b.iter(|| {
            let _ = rt.block_on(ledger.apply_movement("erode", item.id, MovementType::Out, black_box(1)));
        });
    });

    group.finish();
}

/// Contended (one item) vs independent (one item per writer) concurrent movements.
fn bench_concurrent_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("concurrent_movements");

    for writers in [1usize, 8, 32].iter() {
        group.throughput(Throughput::Elements(*writers as u64));

        group.bench_with_input(BenchmarkId::new("same_item", writers), writers, |b, &writers| {
            let ledger = ledger();
            let drug_id = rt
                .block_on(ledger.add_initial_stock("kovai", "Insulin", 0, None))
                .unwrap()
                .id;
            b.iter(|| {
                rt.block_on(async {
                    let tasks: Vec<_> = (0..writers)
                        .map(|_| {
                            let ledger = ledger.clone();
                            tokio::spawn(async move {
                                ledger.apply_movement("kovai", drug_id, MovementType::In, 1).await
                            })
                        })
                        .collect();
                    for task in tasks {
                        task.await.unwrap().unwrap();
                    }
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("distinct_items", writers), writers, |b, &writers| {
            let ledger = ledger();
            let ids: Vec<_> = (0..writers)
                .map(|i| {
                    rt.block_on(ledger.add_initial_stock("salem", &format!("Drug {i}"), 0, None))
                        .unwrap()
                        .id
                })
                .collect();
            b.iter(|| {
                rt.block_on(async {
                    let tasks: Vec<_> = ids
                        .iter()
                        .map(|&id| {
                            let ledger = ledger.clone();
                            tokio::spawn(async move { ledger.apply_movement("salem", id, MovementType::In, 1).await })
                        })
                        .collect();
                    for task in tasks {
                        task.await.unwrap().unwrap();
                    }
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply_movement_latency, bench_concurrent_throughput);
criterion_main!(benches);
