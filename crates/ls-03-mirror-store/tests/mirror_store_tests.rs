//! Public-API tests for the mirror store.

use ls_03_mirror_store::{
    Dao, DeadLetter, InMemoryMirrorStore, KvMirrorStore, InMemoryKVStore, MemberDetails,
    MemberFilter, MemberLink, MirrorBatch, MirrorStore, MirrorWrite, PageRequest, PendingMember,
    SensorType, ThresholdConfig,
};
use shared_types::{ChainAddress, ErrorKind};

fn addr(n: u8) -> ChainAddress {
    ChainAddress::from_bytes([n; 32])
}

#[tokio::test]
async fn test_pending_member_is_absorbed_by_link() {
    let store = InMemoryMirrorStore::in_memory();
    let details = MemberDetails {
        name: "Bob".into(),
        joined_at: 10,
        voting_power: 5,
    };
    store
        .commit(MirrorBatch::new().with(MirrorWrite::PendingMember(PendingMember {
            addr: addr(2),
            details: details.clone(),
        })))
        .await
        .unwrap();
    assert!(store.get_pending_member(&addr(2)).await.unwrap().is_some());

    let mut link = MemberLink::new("U2", addr(2), 20);
    link.is_member = true;
    link.member_details = Some(details);
    store
        .commit(
            MirrorBatch::new()
                .with(MirrorWrite::Member(link))
                .with(MirrorWrite::ClearPendingMember(addr(2))),
        )
        .await
        .unwrap();

    assert!(store.get_pending_member(&addr(2)).await.unwrap().is_none());
    let linked = store.get_member(&addr(2)).await.unwrap().unwrap();
    assert!(linked.is_member);
    assert_eq!(linked.version, 1);
}

#[tokio::test]
async fn test_member_listing_paginates_and_filters() {
    let store = InMemoryMirrorStore::in_memory();
    let mut batch = MirrorBatch::new();
    for n in 1..=5u8 {
        let mut link = MemberLink::new(format!("U{n}"), addr(n), u64::from(n));
        link.is_member = n % 2 == 1;
        batch.push(MirrorWrite::Member(link));
    }
    store.commit(batch).await.unwrap();

    let page = store
        .list_members(&MemberFilter::default(), PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items[0].user_id, "U3");

    let members = store
        .list_members(
            &MemberFilter {
                is_member: Some(true),
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(members.total, 3);
}

#[tokio::test]
async fn test_dao_cursor_round_trips_with_version() {
    let store = KvMirrorStore::new(InMemoryKVStore::new());
    store
        .commit(MirrorBatch::new().with(MirrorWrite::Dao(Dao::new(addr(9), "LabShare", addr(1)))))
        .await
        .unwrap();

    let stale = store.get_dao().await.unwrap().unwrap();
    let mut fresh = stale.clone();
    fresh.member_count = 1;
    store.commit(MirrorBatch::new().with(MirrorWrite::Dao(fresh))).await.unwrap();

    let err = store
        .commit(MirrorBatch::new().with(MirrorWrite::Dao(stale)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.get_dao().await.unwrap().unwrap().version, 2);
}

#[tokio::test]
async fn test_sensors_thresholds_and_initialized_flag() {
    let store = InMemoryMirrorStore::in_memory();
    assert!(!store.is_initialized().await.unwrap());

    store
        .commit(
            MirrorBatch::new()
                .with(MirrorWrite::SensorType(SensorType {
                    sensor_type_id: 1,
                    name: "Humidity".into(),
                    active: true,
                }))
                .with(MirrorWrite::Threshold(ThresholdConfig {
                    sensor_type_id: 1,
                    min_value: 30,
                    max_value: 70,
                    description: "Relative humidity".into(),
                    active: true,
                    updated_at: 0,
                    version: 0,
                }))
                .with(MirrorWrite::SetInitialized),
        )
        .await
        .unwrap();

    assert!(store.is_initialized().await.unwrap());
    assert_eq!(store.sensor_types().await.unwrap().len(), 1);
    let threshold = store.get_threshold(1).await.unwrap().unwrap();
    assert!(threshold.contains(50));
    assert!(!threshold.contains(71));
}

#[tokio::test]
async fn test_dead_letters_list_most_recent_first() {
    let store = InMemoryMirrorStore::in_memory();
    for (key, at) in [("a#0", 5u64), ("b#0", 9u64)] {
        store
            .commit(MirrorBatch::new().with(MirrorWrite::DeadLetter(DeadLetter {
                event_key: key.into(),
                event_type: "VoteCast".into(),
                raw_envelope: serde_json::json!({ "key": key }),
                error: "proposal not found".into(),
                error_kind: ErrorKind::NotFound,
                attempts: 3,
                first_failed_at: at,
                last_failed_at: at,
            })))
            .await
            .unwrap();
    }

    let page = store.list_dead_letters(PageRequest::default()).await.unwrap();
    assert_eq!(page.items[0].event_key, "b#0");
    assert!(store.get_dead_letter("a#0").await.unwrap().is_some());
}
