//! # End-to-End Scenarios
//!
//! Literal event streams driven through a wired node, checked against the
//! mirror state they must produce.
//!
//! ```text
//! MockChainClient ──live──→ Ingestor(5) ──→ Applier(6) ──→ Mirror(3)
//!        │                                     ▲
//!        └──────────query──────→ Resync(7) ────┘
//! ```
//!
//! 1. **Member lifecycle**: link, then `MemberAdded`, then replay
//! 2. **Proposal, vote, execute**: duplicate voter is ignored
//! 3. **Out-of-order alert**: `AlertTriggered` before its record
//! 4. **Reconnect idempotence**: transport killed, then a recent resync
//! 5. **Backpressure**: buffer overflow, reconnect, catch-up
//! 6. **Status derivation**: active, expired and executed proposals

#[cfg(test)]
mod tests {
    use crate::harness::{object, settled, wait_until, Harness, START_MS};

    use ls_03_mirror_store::{MirrorStore, ProposalStatus, Voter};
    use ls_05_event_ingestor::{EventIngestorApi, IngestorState};
    use ls_06_mirror_applier::testing::addr;
    use ls_06_mirror_applier::ApplyOutcome;
    use shared_types::ProposalType;
    use std::time::Duration;

    // =========================================================================
    // S1: MEMBER LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_member_lifecycle() {
        let h = Harness::new().await;
        h.link(1).await;
        let added = h.fx.member_added("txS1", &addr(1), "Alice", 10, 1_000);
        h.fx.chain.record(added.clone());

        assert!(matches!(h.apply(&added).await, ApplyOutcome::Applied { .. }));

        let link = h.container.queries().get_member_by_user("U1").await.unwrap();
        assert_eq!(link.addr, addr(1));
        assert!(link.is_member);
        let details = link.member_details.unwrap();
        assert_eq!(details.name, "Alice");
        assert_eq!(details.joined_at, 1_000);
        assert_eq!(details.voting_power, 10);
        assert_eq!(h.store.get_dao().await.unwrap().unwrap().member_count, 1);

        // Replay, live and through a full resync: nothing moves.
        let before = h.snapshot().await;
        assert_eq!(h.apply(&added).await, ApplyOutcome::Duplicate);
        let report = h.container.control().sync_from_cursor(None).await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.applied, 0);

        let after = h.snapshot().await;
        assert_eq!(after.members, before.members);
        assert_eq!(after.dao.unwrap().member_count, 1);
    }

    // =========================================================================
    // S2: PROPOSAL, VOTE, EXECUTE
    // =========================================================================

    #[tokio::test]
    async fn test_proposal_vote_execute() {
        let h = Harness::new().await;
        let p1 = addr(0x51);
        h.fx.put_proposal(&p1, 1, ProposalType::General, "T", 9_000);

        h.apply_all(&[
            h.fx.proposal_created("txC", &p1, 1, ProposalType::General, "T", 2_000),
            h.fx.vote_cast("txV1", &p1, &addr(1), true, 10, 2_100),
            h.fx.vote_cast("txV2", &p1, &addr(1), false, 10, 2_150),
            h.fx.proposal_executed("txE", &p1, true, 10, 0, 3_000),
        ])
        .await;

        let p = h.store.get_proposal(&p1).await.unwrap().unwrap();
        assert_eq!(
            p.voters,
            vec![Voter {
                addr: addr(1),
                vote: true,
                power: 10,
                voted_at: 2_100,
            }]
        );
        assert_eq!((p.yes_votes, p.no_votes), (10, 0));
        assert!(p.executed);
        assert_eq!(p.approved, Some(true));
        assert_eq!(p.proposer, addr(1));
        assert_eq!(p.created_at, 2_000);
    }

    // =========================================================================
    // S3: OUT-OF-ORDER ALERT
    // =========================================================================

    #[tokio::test]
    async fn test_alert_before_its_record() {
        let h = Harness::new().await;
        let (r1, p2) = (addr(0x71), addr(0x72));
        h.fx.put_record(&r1, 31);

        h.apply(&h.fx.alert_triggered("txA", &r1, &p2, 31, 4_100)).await;
        assert!(h.store.get_data_record(&r1).await.unwrap().is_none());

        h.apply(&h.fx.data_record_created("txD", &r1, 1, 31, true, 4_000))
            .await;

        let record = h.container.queries().get_data_record(&r1.to_string()).await.unwrap();
        assert!(record.triggered_alert);
        assert_eq!(record.alert_proposal, Some(p2));
        assert!(h.snapshot().await.pending_alerts.is_empty());
    }

    // =========================================================================
    // S4: RECONNECT IDEMPOTENCE
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_then_recent_resync() {
        let h = Harness::new().await;
        let p1 = addr(0x51);
        h.link(1).await;
        h.fx.put_proposal(&p1, 1, ProposalType::General, "T", START_MS + 9_000);
        h.go_live().await;

        for event in [
            h.fx.member_added("txS1", &addr(1), "Alice", 10, 1_000),
            h.fx.proposal_created("txC", &p1, 1, ProposalType::General, "T", 2_000),
            h.fx.vote_cast("txV1", &p1, &addr(1), true, 10, 2_100),
            h.fx.vote_cast("txV2", &p1, &addr(1), false, 10, 2_150),
            h.fx.proposal_executed("txE", &p1, true, 10, 0, 3_000),
        ] {
            h.fx.chain.emit(event);
        }
        wait_until(|| h.processed("txE")).await;

        h.fx.chain.kill_subscriptions();
        wait_until(|| async { h.fx.chain.subscribe_calls() >= 2 }).await;
        h.wait_for_state(IngestorState::Live).await;

        let report = h.container.control().sync_recent(24).await.unwrap();
        assert_eq!(report.scanned, 5);
        assert_eq!(report.applied, 0);

        let p = h.store.get_proposal(&p1).await.unwrap().unwrap();
        assert_eq!(p.voters.len(), 1);
        assert_eq!((p.yes_votes, p.no_votes), (10, 0));
        let dao = h.store.get_dao().await.unwrap().unwrap();
        assert_eq!(dao.member_count, 1);
        assert_eq!(dao.next_proposal_id, 2);

        h.container.control().stop().await;
    }

    // =========================================================================
    // S5: BACKPRESSURE
    // =========================================================================

    const FLOOD: u32 = 15_000;

    #[tokio::test(start_paused = true)]
    async fn test_overflow_reconnects_and_converges() {
        let tune = |config: &mut node_runtime::NodeConfig| {
            config.ingestor.buffer_capacity = 10_000;
            config.ingestor.resync_page_limit = 500;
            config.ingestor.event_cache_size = 20_000;
            config.ingestor.processed_log_capacity = 20_000;
        };
        let live = Harness::with_config(tune).await;
        let reference = Harness::with_config(tune).await;

        let mut stream = Vec::new();
        for n in 1..=FLOOD {
            let id = object(n);
            live.fx.put_record(&id, 22);
            reference.fx.put_record(&id, 22);
            stream.push(live.fx.data_record_created(
                &format!("rec{n}"),
                &id,
                u64::from(n),
                22,
                false,
                1_000 + u64::from(n),
            ));
        }
        reference.apply_all(&stream).await;

        // Slow the consumer so the flood outruns it.
        live.fx.chain.set_object_latency(Some(Duration::from_millis(1)));
        live.go_live().await;
        let mut states = live.container.ingestor.watch_state();
        let reconnected = tokio::spawn(async move {
            states
                .wait_for(|s| *s == IngestorState::Reconnecting)
                .await
                .is_ok()
        });

        for raw in &stream {
            live.fx.chain.emit(raw.clone());
        }

        assert!(reconnected.await.unwrap());
        let last = format!("rec{FLOOD}");
        wait_until(|| live.processed(&last)).await;
        live.wait_for_state(IngestorState::Live).await;
        assert!(live.fx.chain.subscribe_calls() >= 2);

        let dao = live.store.get_dao().await.unwrap().unwrap();
        assert_eq!(dao.next_data_id, u64::from(FLOOD) + 1);
        assert_eq!(dao.last_cursor.as_ref().unwrap().id.tx_digest, last);
        assert_eq!(settled(live.snapshot().await), settled(reference.snapshot().await));

        live.container.control().stop().await;
    }

    // =========================================================================
    // S6: STATUS DERIVATION
    // =========================================================================

    #[tokio::test]
    async fn test_status_derivation() {
        let h = Harness::new().await;
        let (open, closed, rejected) = (addr(0x61), addr(0x62), addr(0x63));
        h.fx.put_proposal(&open, 1, ProposalType::General, "Open", 6_000);
        h.fx.put_proposal(&closed, 2, ProposalType::General, "Closed", 4_000);
        h.fx.put_proposal(&rejected, 3, ProposalType::General, "Rejected", 4_000);
        h.apply_all(&[
            h.fx.proposal_created("tx1", &open, 1, ProposalType::General, "Open", 1_000),
            h.fx.proposal_created("tx2", &closed, 2, ProposalType::General, "Closed", 1_100),
            h.fx.proposal_created("tx3", &rejected, 3, ProposalType::General, "Rejected", 1_200),
            h.fx.proposal_executed("tx4", &rejected, false, 0, 0, 3_900),
        ])
        .await;
        h.clock.set(5_000);

        let queries = h.container.queries();
        let status = |id: &shared_types::ObjectId| {
            let queries = &queries;
            let id = id.to_string();
            async move { queries.get_proposal(&id).await.unwrap().status }
        };
        assert_eq!(status(&open).await, ProposalStatus::Active);
        assert_eq!(status(&closed).await, ProposalStatus::Expired);
        assert_eq!(status(&rejected).await, ProposalStatus::ExecutedRejected);

        let stats = queries.get_dashboard_stats().await.unwrap();
        assert_eq!(stats.total_proposals, 3);
        assert_eq!(stats.active_proposals, 1);
        assert_eq!(stats.executed_proposals, 1);
    }
}
