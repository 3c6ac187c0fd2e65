use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use stockledger_core::{Aggregate, AggregateId, EmployeeId, ExpectedVersion};
use stockledger_infra::ledger_store::{InMemoryLedgerStore, LedgerStore};
use stockledger_inventory::{
    AssignStock, AssignmentCommand, AssignmentId, ProductId, Quantity, ReceiveAssignment,
    SourceRef, StockAssignment, StockBreakdown, StockEvent, StockEventKind, plan_fifo, stock_level,
};

fn ledger_events(product_id: ProductId, count: usize) -> Vec<StockEvent> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let kind = if i % 3 == 0 {
                StockEventKind::PurchaseReceipt
            } else {
                StockEventKind::Sale
            };
            StockEvent::new(
                product_id,
                kind,
                Quantity::new(1 + (i as u64 % 5)).unwrap(),
                SourceRef::new(kind.as_str(), None),
                now,
            )
            .unwrap()
        })
        .collect()
}

fn open_assignments(count: usize) -> Vec<StockAssignment> {
    let employee = EmployeeId::new();
    let product = ProductId::new(AggregateId::new());
    let t0 = Utc::now();
    (0..count)
        .map(|i| {
            let at = t0 + Duration::seconds(i as i64);
            let id = AssignmentId::new(AggregateId::new());
            let mut a = StockAssignment::empty(id, employee, product);
            a.execute(&AssignmentCommand::Assign(AssignStock {
                quantity: Quantity::new(10).unwrap(),
                occurred_at: at,
            }))
            .unwrap();
            a.execute(&AssignmentCommand::Receive(ReceiveAssignment { occurred_at: at }))
                .unwrap();
            a.set_issue_sequence(i as u64 + 1);
            a
        })
        .collect()
}

fn bench_ledger_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_replay");

    for history in [100usize, 1_000, 10_000].iter() {
        let product_id = ProductId::new(AggregateId::new());
        let events = ledger_events(product_id, *history);
        group.throughput(Throughput::Elements(*history as u64));

        group.bench_with_input(BenchmarkId::new("stock_level", history), history, |b, _| {
            b.iter(|| black_box(stock_level(events.iter())))
        });
        group.bench_with_input(BenchmarkId::new("breakdown", history), history, |b, _| {
            b.iter(|| black_box(StockBreakdown::from_events(product_id, events.iter())))
        });
    }

    group.finish();
}

fn bench_ledger_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for batch_size in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                b.to_async(&runtime).iter(|| async move {
                    let store = InMemoryLedgerStore::new();
                    let product_id = ProductId::new(AggregateId::new());
                    let events = ledger_events(product_id, batch_size);
                    black_box(
                        store
                            .append(product_id, events, ExpectedVersion::Exact(0))
                            .await
                            .unwrap(),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_fifo_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_planning");

    for open in [5usize, 50, 500].iter() {
        let assignments = open_assignments(*open);
        // Enough to drain about half the queue.
        let requested = Quantity::new(*open as u64 * 5).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(open), open, |b, _| {
            b.iter(|| black_box(plan_fifo(assignments.iter(), requested)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ledger_replay,
    bench_ledger_append,
    bench_fifo_planning
);
criterion_main!(benches);
