//! # LabShareDAO Mirror Benchmarks
//!
//! | Stage | Operation |
//! |-------|-----------|
//! | ls-02 Transaction Builder | intent → unsigned bytes |
//! | ls-04 Event Normalizer | raw envelope → typed event |
//! | ls-06 Mirror Applier | apply a batch of records to a fresh mirror |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use ls_02_tx_builder::{AddMemberIntent, TxBuilder, TxBuilderConfig, VoteIntent};
use ls_03_mirror_store::InMemoryMirrorStore;
use ls_04_event_normalizer::normalize;
use ls_06_mirror_applier::testing::{addr, ChainFixture};
use ls_06_mirror_applier::{ApplierConfig, EventApplier, MirrorApplier};
use shared_types::{ChainAddress, ManualClock, ProposalType};

// ============================================================================
// LS-02: Transaction Builder
// ============================================================================

fn bench_tx_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("ls-02-tx-builder");
    let builder = TxBuilder::new(TxBuilderConfig::new(addr(0xaa), addr(0xda)));

    let add = AddMemberIntent {
        sender: addr(0xad).to_string(),
        member: addr(1).to_string(),
        name: "Alice".to_string(),
        voting_power: 10,
    };
    group.bench_function("add_member", |b| {
        b.iter(|| black_box(builder.add_member(&add).is_ok()))
    });

    let vote = VoteIntent {
        sender: addr(1).to_string(),
        proposal_id: addr(0x51).to_string(),
        vote: true,
    };
    group.bench_function("vote", |b| b.iter(|| black_box(builder.vote(&vote).is_ok())));

    group.finish();
}

// ============================================================================
// LS-04: Event Normalizer
// ============================================================================

fn bench_normalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ls-04-event-normalizer");
    let fx = ChainFixture::new();
    let p = addr(0x51);
    let events = [
        ("member_added", fx.member_added("t1", &addr(1), "Alice", 10, 1_000)),
        ("proposal_created", fx.proposal_created("t2", &p, 1, ProposalType::General, "T", 2_000)),
        ("vote_cast", fx.vote_cast("t3", &p, &addr(1), true, 10, 2_100)),
        ("alert_triggered", fx.alert_triggered("t4", &addr(0x71), &addr(0x72), 31, 4_100)),
    ];

    for (name, raw) in &events {
        group.bench_with_input(BenchmarkId::new("normalize", name), raw, |b, raw| {
            b.iter(|| black_box(normalize(raw).is_ok()))
        });
    }

    group.finish();
}

// ============================================================================
// LS-06: Mirror Applier
// ============================================================================

fn record_id(n: u32) -> ChainAddress {
    let mut bytes = [0x0c; 32];
    bytes[28..].copy_from_slice(&n.to_be_bytes());
    ChainAddress::from_bytes(bytes)
}

fn bench_applier(c: &mut Criterion) {
    let mut group = c.benchmark_group("ls-06-mirror-applier");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for size in [100u32, 1_000] {
        let fx = ChainFixture::new();
        let stream: Vec<_> = (1..=size)
            .map(|n| {
                fx.put_record(&record_id(n), 22);
                fx.data_record_created(&format!("r{n}"), &record_id(n), u64::from(n), 22, false, u64::from(n))
            })
            .collect();

        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::new("apply_records", size), &stream, |b, stream| {
            b.iter_batched(
                || {
                    let store: Arc<InMemoryMirrorStore> = runtime.block_on(fx.seeded_store()).unwrap();
                    MirrorApplier::new(
                        fx.chain.clone(),
                        store,
                        Arc::new(ManualClock::new(10_000)),
                        ApplierConfig::default(),
                    )
                },
                |applier| {
                    runtime.block_on(async {
                        for raw in stream {
                            black_box(applier.apply(raw).await);
                        }
                    })
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tx_builder, bench_normalizer, bench_applier);
criterion_main!(benches);
