//! # Mirror Invariants
//!
//! Property checks over generated event streams. Every stream links some
//! members, opens a proposal, casts votes (repeat voters included), maybe
//! executes it, and delivers a data record with its alert in either order.
//!
//! Checked after every applied event:
//!
//! - tallies equal the summed power of recorded voters
//! - a voter appears at most once per proposal
//! - an executed proposal has an outcome and an execution time
//! - `memberCount` equals the number of member links
//! - a pending alert waits for a record that does not exist yet
//! - the cursor never moves backwards
//!
//! At the end of the stream every alerting record is linked, and applying
//! the stream a second time through the handlers changes nothing.

#[cfg(test)]
mod tests {
    use crate::harness::{settled, Harness};

    use ls_01_chain_client::RawEvent;
    use ls_03_mirror_store::MirrorSnapshot;
    use ls_06_mirror_applier::testing::{addr, ChainFixture};
    use proptest::prelude::*;
    use shared_types::{EventCursor, ProposalType};
    use std::collections::HashSet;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    const VOTERS: u8 = 6;

    #[derive(Debug, Clone)]
    struct Script {
        linked: Vec<bool>,
        votes: Vec<(u8, bool, u64)>,
        executes: bool,
        alert_first: bool,
    }

    fn script() -> impl Strategy<Value = Script> {
        (
            prop::collection::vec(any::<bool>(), VOTERS as usize),
            prop::collection::vec((1..=VOTERS, any::<bool>(), 1u64..=20), 0..12),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(linked, votes, executes, alert_first)| Script {
                linked,
                votes,
                executes,
                alert_first,
            })
    }

    /// Put the objects the stream needs on chain and build its events.
    fn stream(fx: &ChainFixture, script: &Script) -> Vec<RawEvent> {
        let (proposal, record, alert) = (addr(0x51), addr(0x71), addr(0x72));
        fx.put_proposal(&proposal, 1, ProposalType::General, "Budget", 9_000);
        fx.put_record(&record, 31);

        let mut events: Vec<RawEvent> = (1..=VOTERS)
            .map(|n| fx.member_added(&format!("m{n}"), &addr(n), "Member", 5, 1_000 + u64::from(n)))
            .collect();
        events.push(fx.proposal_created("p", &proposal, 1, ProposalType::General, "Budget", 2_000));

        let mut counted = HashSet::new();
        let (mut yes, mut no) = (0, 0);
        for (i, &(voter, vote, power)) in script.votes.iter().enumerate() {
            if counted.insert(voter) {
                if vote {
                    yes += power;
                } else {
                    no += power;
                }
            }
            events.push(fx.vote_cast(&format!("v{i}"), &proposal, &addr(voter), vote, power, 2_100 + i as u64));
        }
        if script.executes {
            events.push(fx.proposal_executed("x", &proposal, yes > no, yes, no, 3_000));
        }

        let created = fx.data_record_created("d", &record, 1, 31, true, 4_000);
        let alerted = fx.alert_triggered("a", &record, &alert, 31, 4_100);
        if script.alert_first {
            events.extend([alerted, created]);
        } else {
            events.extend([created, alerted]);
        }
        events
    }

    async fn linked_node(script: &Script, tune: impl FnOnce(&mut node_runtime::NodeConfig)) -> Harness {
        let h = Harness::with_config(tune).await;
        for (i, linked) in script.linked.iter().enumerate() {
            if *linked {
                h.link(i as u8 + 1).await;
            }
        }
        h
    }

    fn check_step(s: &MirrorSnapshot, previous: &mut Option<EventCursor>) {
        for p in &s.proposals {
            let sum = |side: bool| {
                p.voters
                    .iter()
                    .filter(|v| v.vote == side)
                    .map(|v| v.power)
                    .sum::<u64>()
            };
            assert_eq!(p.yes_votes, sum(true), "yes tally of {}", p.object_id);
            assert_eq!(p.no_votes, sum(false), "no tally of {}", p.object_id);

            let distinct: HashSet<_> = p.voters.iter().map(|v| &v.addr).collect();
            assert_eq!(distinct.len(), p.voters.len(), "repeat voter on {}", p.object_id);

            if p.executed {
                assert!(p.approved.is_some());
                assert!(p.executed_at.is_some());
            }
        }

        let dao = s.dao.as_ref().unwrap();
        let members = s.members.iter().filter(|m| m.is_member).count() as u64;
        assert_eq!(dao.member_count, members);

        for pending in &s.pending_alerts {
            assert!(s.records.iter().all(|r| r.object_id != pending.record_id));
        }

        if let Some(before) = previous.as_ref() {
            let now = dao.last_cursor.as_ref().unwrap();
            assert!(now >= before, "cursor moved back from {before:?} to {now:?}");
        }
        *previous = dao.last_cursor.clone();
    }

    fn check_end(s: &MirrorSnapshot) {
        for record in s.records.iter().filter(|r| r.triggered_alert) {
            assert!(record.alert_proposal.is_some(), "unlinked alert on {}", record.object_id);
        }
        assert!(s.pending_alerts.is_empty());
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_prop_invariants_hold_after_every_event(script in script()) {
            block_on(async {
                let h = linked_node(&script, |_| {}).await;
                let events = stream(&h.fx, &script);

                let mut cursor = None;
                for raw in &events {
                    h.apply(raw).await;
                    check_step(&h.snapshot().await, &mut cursor);
                }
                check_end(&h.snapshot().await);
            });
        }

        #[test]
        fn test_prop_second_pass_through_handlers_changes_nothing(script in script()) {
            block_on(async {
                let once = linked_node(&script, |_| {}).await;
                let events = stream(&once.fx, &script);
                once.apply_all(&events).await;

                // One-slot dedupe forces the second pass through every handler.
                let twice = linked_node(&script, |config| {
                    config.ingestor.event_cache_size = 1;
                    config.ingestor.processed_log_capacity = 1;
                })
                .await;
                let replay = stream(&twice.fx, &script);
                twice.apply_all(&replay).await;
                twice.apply_all(&replay).await;

                assert_eq!(settled(once.snapshot().await), settled(twice.snapshot().await));
            });
        }
    }

    #[tokio::test]
    async fn test_late_event_does_not_rewind_cursor() {
        let h = Harness::new().await;
        h.link(1).await;
        h.link(2).await;

        h.apply(&h.fx.member_added("late", &addr(1), "A", 1, 5_000)).await;
        h.apply(&h.fx.member_added("early", &addr(2), "B", 1, 3_000)).await;

        let cursor = h.snapshot().await.dao.unwrap().last_cursor.unwrap();
        assert_eq!(cursor.timestamp_ms, 5_000);
        assert_eq!(cursor.id.tx_digest, "late");
        assert_eq!(h.snapshot().await.dao.unwrap().member_count, 2);
    }
}
