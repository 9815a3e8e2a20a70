//! Applier behaviour against the mock chain and the in-memory mirror.

use ls_03_mirror_store::{
    InMemoryKVStore, InMemoryMirrorStore, KvMirrorStore, MemberLink, MirrorBatch, MirrorStore,
    MirrorWrite, ThresholdConfig,
};
use ls_06_mirror_applier::testing::{addr, ChainFixture};
use ls_06_mirror_applier::{ApplierConfig, ApplyOutcome, EventApplier, MirrorApplier};
use shared_types::{ErrorKind, ManualClock, ProposalType};
use std::sync::Arc;

// =============================================================================
// TEST HELPERS
// =============================================================================

async fn setup() -> (ChainFixture, Arc<InMemoryMirrorStore>, MirrorApplier) {
    let fx = ChainFixture::new();
    let store = fx.seeded_store().await.unwrap();
    let applier = MirrorApplier::new(
        fx.chain.clone(),
        store.clone(),
        Arc::new(ManualClock::new(10_000)),
        ApplierConfig::for_testing(),
    );
    (fx, store, applier)
}

async fn link(store: &InMemoryMirrorStore, user: &str, n: u8) {
    store
        .commit(MirrorBatch::new().with(MirrorWrite::Member(MemberLink::new(user, addr(n), 0))))
        .await
        .unwrap();
}

fn applied(outcome: &ApplyOutcome) -> bool {
    matches!(outcome, ApplyOutcome::Applied { .. })
}

// =============================================================================
// MEMBERS
// =============================================================================

#[tokio::test]
async fn test_member_added_marks_linked_member_once() {
    let (fx, store, applier) = setup().await;
    link(&store, "U1", 1).await;

    let event = fx.member_added("txM", &addr(1), "Alice", 10, 1000);
    assert!(applied(&applier.apply(&event).await));
    assert_eq!(applier.apply(&event).await, ApplyOutcome::Duplicate);

    // Same fact under another event id changes nothing.
    let echo = fx.member_added("txM2", &addr(1), "Alice", 10, 1001);
    assert_eq!(
        applier.apply(&echo).await,
        ApplyOutcome::Applied {
            kind: "member_added",
            changed: false
        }
    );

    let member = store.get_member(&addr(1)).await.unwrap().unwrap();
    assert!(member.is_member);
    let details = member.member_details.unwrap();
    assert_eq!(details.name, "Alice");
    assert_eq!(details.joined_at, 1000);
    assert_eq!(details.voting_power, 10);
    assert_eq!(store.get_dao().await.unwrap().unwrap().member_count, 1);
}

#[tokio::test]
async fn test_member_added_before_link_is_staged() {
    let (fx, store, applier) = setup().await;

    applier
        .apply(&fx.member_added("txM", &addr(2), "Bob", 3, 1000))
        .await;

    let pending = store.get_pending_member(&addr(2)).await.unwrap().unwrap();
    assert_eq!(pending.details.voting_power, 3);
    assert_eq!(store.get_dao().await.unwrap().unwrap().member_count, 0);
}

// =============================================================================
// PROPOSALS
// =============================================================================

#[tokio::test]
async fn test_proposal_vote_and_execute() {
    let (fx, store, applier) = setup().await;
    let p1 = addr(0x51);
    fx.put_proposal(&p1, 1, ProposalType::General, "T", 9_000);

    for event in [
        fx.proposal_created("tx1", &p1, 1, ProposalType::General, "T", 2000),
        fx.vote_cast("tx2", &p1, &addr(1), true, 10, 2100),
        fx.vote_cast("tx3", &p1, &addr(1), false, 10, 2150),
        fx.proposal_executed("tx4", &p1, true, 10, 0, 3000),
    ] {
        assert!(applied(&applier.apply(&event).await));
    }

    let p = store.get_proposal(&p1).await.unwrap().unwrap();
    assert_eq!(p.voters.len(), 1);
    assert_eq!(p.voters[0].voted_at, 2100);
    assert!(p.voters[0].vote);
    assert_eq!((p.yes_votes, p.no_votes), (10, 0));
    assert!(p.executed);
    assert_eq!(p.approved, Some(true));
    assert_eq!(p.executed_at, Some(3000));
    assert_eq!(p.description, "T description");

    let dao = store.get_dao().await.unwrap().unwrap();
    assert_eq!(dao.treasury_balance, 5_000_000_000);
    assert_eq!(dao.treasury_refreshed_at, Some(3000));
    assert_eq!(dao.next_proposal_id, 2);
    assert_eq!(dao.last_cursor.unwrap().timestamp_ms, 3000);
}

#[tokio::test]
async fn test_vote_before_creation_materializes_proposal() {
    let (fx, store, applier) = setup().await;
    let p = addr(0x52);
    fx.put_proposal(&p, 2, ProposalType::General, "Late", 9_000);

    applier
        .apply(&fx.vote_cast("tx2", &p, &addr(3), false, 4, 2100))
        .await;
    let created = applier
        .apply(&fx.proposal_created("tx1", &p, 2, ProposalType::General, "Late", 2000))
        .await;
    assert_eq!(
        created,
        ApplyOutcome::Applied {
            kind: "proposal_created",
            changed: false
        }
    );

    let proposal = store.get_proposal(&p).await.unwrap().unwrap();
    assert_eq!(proposal.no_votes, 4);
    assert_eq!(proposal.voters.len(), 1);
}

#[tokio::test]
async fn test_approved_configuration_proposal_updates_threshold() {
    let (fx, store, applier) = setup().await;
    store
        .commit(MirrorBatch::new().with(MirrorWrite::Threshold(ThresholdConfig {
            sensor_type_id: 2,
            min_value: 400,
            max_value: 1000,
            description: "CO2 ppm".into(),
            active: true,
            updated_at: 0,
            version: 0,
        })))
        .await
        .unwrap();

    let good = addr(0x61);
    let inverted = addr(0x62);
    fx.put_config_proposal(&good, 1, 2, 400, 1200, 9_000);
    fx.put_config_proposal(&inverted, 2, 2, 900, 100, 9_000);

    for event in [
        fx.proposal_created("tx1", &good, 1, ProposalType::Configuration, "Threshold change", 1000),
        fx.proposal_executed("tx2", &good, true, 5, 0, 2000),
        fx.proposal_created("tx3", &inverted, 2, ProposalType::Configuration, "Threshold change", 3000),
        fx.proposal_executed("tx4", &inverted, true, 5, 0, 4000),
    ] {
        assert!(applied(&applier.apply(&event).await));
    }

    let threshold = store.get_threshold(2).await.unwrap().unwrap();
    assert_eq!((threshold.min_value, threshold.max_value), (400, 1200));
    assert_eq!(threshold.description, "CO2 ppm");
    assert_eq!(threshold.updated_at, 2000);
    assert!(store.get_proposal(&inverted).await.unwrap().unwrap().executed);
}

// =============================================================================
// DATA RECORDS AND ALERTS
// =============================================================================

#[tokio::test]
async fn test_alert_before_record_is_linked_on_arrival() {
    let (fx, store, applier) = setup().await;
    let r1 = addr(0x71);
    let p2 = addr(0x72);
    fx.put_record(&r1, 31);

    applier.apply(&fx.alert_triggered("txA", &r1, &p2, 31, 4100)).await;
    assert!(store.get_pending_alert(&r1).await.unwrap().is_some());

    applier
        .apply(&fx.data_record_created("txD", &r1, 1, 31, false, 4000))
        .await;

    let record = store.get_data_record(&r1).await.unwrap().unwrap();
    assert!(record.triggered_alert);
    assert_eq!(record.alert_proposal, Some(p2.clone()));
    assert_eq!(record.data_hash, "deadbeef");
    assert!(store.get_pending_alert(&r1).await.unwrap().is_none());
    assert_eq!(
        store.get_record_by_alert(&p2).await.unwrap().unwrap().object_id,
        r1
    );
}

// =============================================================================
// DEFERRAL AND DEAD LETTERS
// =============================================================================

#[tokio::test]
async fn test_missing_object_parks_event_until_next_one() {
    let (fx, store, applier) = setup().await;
    let p = addr(0x53);
    let entity = format!("proposal:{p}");

    let created = fx.proposal_created("tx1", &p, 3, ProposalType::General, "Slow", 1000);
    assert_eq!(
        applier.apply(&created).await,
        ApplyOutcome::Deferred {
            entity: entity.clone()
        }
    );
    assert_eq!(store.deferred_for(&entity).await.unwrap().len(), 1);
    assert!(!applier.is_processed("tx1#0").await.unwrap());

    fx.put_proposal(&p, 3, ProposalType::General, "Slow", 9_000);
    assert!(applied(
        &applier
            .apply(&fx.vote_cast("tx2", &p, &addr(4), true, 2, 1100))
            .await
    ));

    assert!(store.deferred_for(&entity).await.unwrap().is_empty());
    assert!(applier.is_processed("tx1#0").await.unwrap());
    let proposal = store.get_proposal(&p).await.unwrap().unwrap();
    assert_eq!(proposal.title, "Slow");
    assert_eq!(proposal.yes_votes, 2);
}

#[tokio::test]
async fn test_malformed_event_is_dead_lettered_at_once() {
    let (fx, store, applier) = setup().await;
    let broken = fx.event("MemberAdded", "txBad", 1000, serde_json::json!({ "name": "NoAddr" }));

    let outcome = applier.apply(&broken).await;
    assert!(matches!(outcome, ApplyOutcome::DeadLettered { .. }));

    let letter = store.get_dead_letter("txBad#0").await.unwrap().unwrap();
    assert_eq!(letter.error_kind, ErrorKind::Validation);
    assert_eq!(letter.attempts, 1);
    assert!(applier.is_processed("txBad#0").await.unwrap());
}

#[tokio::test]
async fn test_network_failures_dead_letter_after_retry_budget() {
    let (fx, store, applier) = setup().await;
    let p = addr(0x54);
    fx.chain.set_fail_objects(true);
    let event = fx.proposal_created("tx1", &p, 1, ProposalType::General, "X", 1000);

    let first = applier.apply(&event).await;
    assert!(matches!(first, ApplyOutcome::Failed { attempts: 1, .. }));
    assert!(!applier.is_processed("tx1#0").await.unwrap());

    let second = applier.apply(&event).await;
    assert!(matches!(second, ApplyOutcome::DeadLettered { .. }));
    let letter = store.get_dead_letter("tx1#0").await.unwrap().unwrap();
    assert_eq!(letter.error_kind, ErrorKind::Network);
    assert_eq!(letter.attempts, 2);
}

#[tokio::test]
async fn test_vote_tally_overflow_is_dead_lettered() {
    let (fx, store, applier) = setup().await;
    let p = addr(0x56);
    fx.put_proposal(&p, 1, ProposalType::General, "Whale", 9_000);

    applier
        .apply(&fx.proposal_created("tx1", &p, 1, ProposalType::General, "Whale", 1000))
        .await;
    assert!(applied(
        &applier
            .apply(&fx.vote_cast("tx2", &p, &addr(1), true, u64::MAX, 1100))
            .await
    ));

    let outcome = applier
        .apply(&fx.vote_cast("tx3", &p, &addr(2), true, u64::MAX, 1200))
        .await;
    assert!(matches!(outcome, ApplyOutcome::DeadLettered { .. }));

    let letter = store.get_dead_letter("tx3#0").await.unwrap().unwrap();
    assert_eq!(letter.error_kind, ErrorKind::Validation);
    assert_eq!(letter.attempts, 1);

    let proposal = store.get_proposal(&p).await.unwrap().unwrap();
    assert_eq!(proposal.yes_votes, u64::MAX);
    assert_eq!(proposal.voters.len(), 1);
}

#[tokio::test]
async fn test_record_sequence_overflow_is_dead_lettered() {
    let (fx, store, applier) = setup().await;
    let r = addr(0x74);
    fx.put_record(&r, 20);

    let outcome = applier
        .apply(&fx.data_record_created("txD", &r, u64::MAX, 20, false, 4000))
        .await;
    assert!(matches!(outcome, ApplyOutcome::DeadLettered { .. }));

    let letter = store.get_dead_letter("txD#0").await.unwrap().unwrap();
    assert_eq!(letter.error_kind, ErrorKind::Validation);
    assert!(store.get_data_record(&r).await.unwrap().is_none());
}

// =============================================================================
// ORDERING AND IDEMPOTENCE
// =============================================================================

#[tokio::test]
async fn test_cursor_never_moves_backwards() {
    let (fx, store, applier) = setup().await;
    link(&store, "U1", 1).await;
    link(&store, "U2", 2).await;

    applier.apply(&fx.member_added("txLate", &addr(1), "A", 1, 5000)).await;
    applier.apply(&fx.member_added("txEarly", &addr(2), "B", 1, 3000)).await;

    let cursor = store.get_dao().await.unwrap().unwrap().last_cursor.unwrap();
    assert_eq!(cursor.timestamp_ms, 5000);
    assert_eq!(cursor.id.tx_digest, "txLate");
}

#[tokio::test]
async fn test_replaying_stream_without_dedupe_yields_same_state() {
    let fx = ChainFixture::new();
    let p = addr(0x55);
    let r = addr(0x73);
    fx.put_proposal(&p, 1, ProposalType::General, "T", 9_000);
    fx.put_record(&r, 40);
    let stream = vec![
        fx.member_added("t1", &addr(1), "Alice", 10, 1000),
        fx.proposal_created("t2", &p, 1, ProposalType::General, "T", 2000),
        fx.vote_cast("t3", &p, &addr(1), true, 10, 2100),
        fx.alert_triggered("t4", &r, &addr(0x74), 40, 2200),
        fx.data_record_created("t5", &r, 1, 40, true, 2150),
        fx.proposal_executed("t6", &p, true, 10, 0, 3000),
    ];

    let run = |passes: usize| {
        let fx = &fx;
        let stream = &stream;
        async move {
            // A one-slot processed log forces every replay through the handlers.
            let store = Arc::new(KvMirrorStore::with_processed_capacity(InMemoryKVStore::new(), 1));
            fx.seed_dao(store.as_ref()).await.unwrap();
            link(store.as_ref(), "U1", 1).await;
            let applier = MirrorApplier::new(
                fx.chain.clone(),
                store.clone(),
                Arc::new(ManualClock::new(10_000)),
                ApplierConfig {
                    event_cache_size: 1,
                    ..ApplierConfig::default()
                },
            );
            for _ in 0..passes {
                for event in stream {
                    applier.apply(event).await;
                }
            }
            store.snapshot().await.unwrap()
        }
    };

    let once = run(1).await;
    let twice = run(2).await;
    assert_eq!(once, twice);

    let dao = once.dao.unwrap();
    assert_eq!(dao.member_count, 1);
    let proposal = &once.proposals[0];
    assert_eq!(proposal.voters.len(), 1);
    assert_eq!(proposal.yes_votes, 10);
}
