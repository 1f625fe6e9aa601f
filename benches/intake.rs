//! Intake benchmark: the non-blocking `add` called on the request path.

use appsec_agent::events::{EventManager, EventRecord, RequestParts, RequestRecord};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn make_record(i: usize) -> EventRecord {
    RequestRecord::new(RequestParts {
        method: "GET".to_string(),
        path: format!("/items/{}", i),
        query: Some("page=2".to_string()),
        host: Some("bench.local".to_string()),
        remote_addr: Some("127.0.0.1".parse().unwrap()),
        headers: vec![
            ("User-Agent".to_string(), "criterion".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ],
    })
    .into()
}

fn bench_add_accepted(c: &mut Criterion) {
    c.bench_function("intake_add_accepted_1000", |b| {
        b.iter_batched(
            || {
                let (manager, intake) = EventManager::new("bench-pack", 1000, Duration::from_secs(20));
                let records: Vec<EventRecord> = (0..1000).map(make_record).collect();
                (manager, intake, records)
            },
            |(manager, intake, records)| {
                for record in records {
                    black_box(intake.add(record));
                }
                manager
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_add_dropped(c: &mut Criterion) {
    let (_manager, intake) = EventManager::new("bench-pack", 16, Duration::from_secs(20));
    for i in 0..16 {
        intake.add(make_record(i));
    }
    let record = make_record(0);

    c.bench_function("intake_add_full_queue", |b| {
        b.iter(|| black_box(intake.add(black_box(record.clone()))))
    });
}

fn bench_request_record(c: &mut Criterion) {
    c.bench_function("request_record_to_event", |b| b.iter(|| black_box(make_record(black_box(7)))));
}

criterion_group!(benches, bench_add_accepted, bench_add_dropped, bench_request_record);
criterion_main!(benches);
