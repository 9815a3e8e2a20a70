//! # Resync Service
//!
//! Pages through `queryEvents` and feeds every envelope to the same
//! applier the live stream uses, so a resync converges on the state a
//! continuous subscription would have produced.

use async_trait::async_trait;
use labshare_telemetry::{log_event, RESYNC_EVENTS};
use ls_01_chain_client::{ChainClient, EventFilter, EventQuery, RawEvent, SortOrder};
use ls_03_mirror_store::MirrorStore;
use ls_04_event_normalizer::parse_timestamp;
use ls_06_mirror_applier::EventApplier;
use shared_types::{Clock, EventId, TimestampMs};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ResyncConfig, MAX_WINDOW_HOURS, MIN_WINDOW_HOURS};
use crate::domain::{ResyncError, ResyncMode, ResyncReport};
use crate::ports::ResyncApi;

const MS_PER_HOUR: u64 = 3_600_000;

/// Resync controller.
pub struct ResyncController {
    chain: Arc<dyn ChainClient>,
    applier: Arc<dyn EventApplier>,
    store: Arc<dyn MirrorStore>,
    clock: Arc<dyn Clock>,
    filter: EventFilter,
    config: ResyncConfig,
}

impl ResyncController {
    /// Create a controller over the event stream selected by `filter`.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        applier: Arc<dyn EventApplier>,
        store: Arc<dyn MirrorStore>,
        clock: Arc<dyn Clock>,
        filter: EventFilter,
        config: ResyncConfig,
    ) -> Self {
        Self {
            chain,
            applier,
            store,
            clock,
            filter,
            config,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ResyncConfig {
        &self.config
    }

    async fn replay(&self, report: &mut ResyncReport, raw: &RawEvent) {
        let outcome = self.applier.apply(raw).await;
        report.record(&outcome);
        report.last_event = Some(raw.id.clone());
        RESYNC_EVENTS.with_label_values(&[report.mode.as_str()]).inc();
        debug!(event_id = %raw.id, ?outcome, "[ls-07] replayed event");
    }

    /// Collect events stamped at or after `cutoff`, newest first.
    async fn scan_back_to(&self, cutoff: TimestampMs) -> Result<(Vec<RawEvent>, u64), ResyncError> {
        let mut collected = Vec::new();
        let mut scanned = 0u64;
        let mut cursor = None;

        loop {
            let page = self
                .chain
                .query_events(EventQuery {
                    filter: self.filter.clone(),
                    cursor,
                    limit: self.config.page_limit,
                    order: SortOrder::Descending,
                })
                .await?;

            let mut reached_cutoff = false;
            for raw in page.data {
                scanned += 1;
                match raw.timestamp_ms.as_deref().map(parse_timestamp) {
                    Some(Ok(ts)) if ts < cutoff => {
                        reached_cutoff = true;
                        break;
                    }
                    Some(Ok(_)) => collected.push(raw),
                    // The applier dead-letters unreadable timestamps.
                    _ => collected.push(raw),
                }
            }

            if reached_cutoff || !page.has_next_page || page.next_cursor.is_none() {
                return Ok((collected, scanned));
            }
            cursor = page.next_cursor;
        }
    }
}

#[async_trait]
impl ResyncApi for ResyncController {
    async fn sync_from_cursor(&self, cursor: Option<EventId>) -> Result<ResyncReport, ResyncError> {
        let mut report = ResyncReport::new(ResyncMode::Cursor);
        let start = cursor.clone();
        let mut cursor = cursor;

        log_event!(info, "ls-07", "[ls-07] cursor resync started",
            cursor = %start.as_ref().map_or_else(|| "start".to_string(), |c| c.key()));

        loop {
            let page = self
                .chain
                .query_events(EventQuery {
                    filter: self.filter.clone(),
                    cursor: cursor.clone(),
                    limit: self.config.page_limit,
                    order: SortOrder::Ascending,
                })
                .await
                .inspect_err(|e| {
                    warn!(error = %e, error_kind = %e.kind(), "[ls-07] event query failed")
                })?;

            for raw in &page.data {
                report.scanned += 1;
                self.replay(&mut report, raw).await;
            }

            if !page.has_next_page {
                break;
            }
            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        log_event!(info, "ls-07", "[ls-07] cursor resync finished", report = %report);
        Ok(report)
    }

    async fn sync_from_last_cursor(&self) -> Result<ResyncReport, ResyncError> {
        let cursor = self
            .store
            .get_dao()
            .await?
            .and_then(|dao| dao.last_cursor)
            .map(|c| c.id);
        self.sync_from_cursor(cursor).await
    }

    async fn sync_recent(&self, hours: u32) -> Result<ResyncReport, ResyncError> {
        if !(MIN_WINDOW_HOURS..=MAX_WINDOW_HOURS).contains(&hours) {
            return Err(ResyncError::InvalidWindow {
                hours,
                min: MIN_WINDOW_HOURS,
                max: MAX_WINDOW_HOURS,
            });
        }

        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(u64::from(hours) * MS_PER_HOUR);
        log_event!(info, "ls-07", "[ls-07] recent resync started", hours, cutoff);

        let (mut window, scanned) = self.scan_back_to(cutoff).await?;
        window.reverse();

        let mut report = ResyncReport::new(ResyncMode::Recent);
        report.scanned = scanned;
        for raw in &window {
            if matches!(self.applier.is_processed(&raw.id.key()).await, Ok(true)) {
                report.duplicates += 1;
                continue;
            }
            self.replay(&mut report, raw).await;
        }

        log_event!(info, "ls-07", "[ls-07] recent resync finished", report = %report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ls_06_mirror_applier::testing::{addr, ChainFixture};
    use ls_06_mirror_applier::{ApplierConfig, MirrorApplier};
    use shared_types::ManualClock;

    // ===== TEST HELPERS =====

    const HOUR: u64 = MS_PER_HOUR;

    async fn controller(fx: &ChainFixture, now: TimestampMs) -> (ResyncController, Arc<ls_03_mirror_store::InMemoryMirrorStore>) {
        let store = fx.seeded_store().await.unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let applier = Arc::new(MirrorApplier::new(
            fx.chain.clone(),
            store.clone(),
            clock.clone(),
            ApplierConfig::for_testing(),
        ));
        let controller = ResyncController::new(
            fx.chain.clone(),
            applier,
            store.clone(),
            clock,
            fx.filter(),
            ResyncConfig::for_testing(),
        );
        (controller, store)
    }

    fn record_members(fx: &ChainFixture, count: u8, start_ts: TimestampMs, step: u64) {
        for i in 0..count {
            fx.chain.record(fx.member_added(
                &format!("tx{i}"),
                &addr(i + 1),
                "m",
                1,
                start_ts + u64::from(i) * step,
            ));
        }
    }

    // ===== WINDOW VALIDATION =====

    #[tokio::test]
    async fn test_window_bounds() {
        let fx = ChainFixture::new();
        let (controller, _) = controller(&fx, 10 * HOUR).await;
        for hours in [0, 169] {
            let err = controller.sync_recent(hours).await.unwrap_err();
            assert!(matches!(err, ResyncError::InvalidWindow { .. }));
            assert_eq!(err.kind(), shared_types::ErrorKind::Validation);
        }
        assert!(controller.sync_recent(1).await.is_ok());
        assert!(controller.sync_recent(168).await.is_ok());
    }

    // ===== CURSOR MODE =====

    #[tokio::test]
    async fn test_cursor_resync_crosses_pages() {
        let fx = ChainFixture::new();
        record_members(&fx, 7, 1_000, 10);
        let (controller, _) = controller(&fx, 2_000).await;

        let report = controller.sync_from_cursor(None).await.unwrap();
        assert_eq!(report.scanned, 7);
        assert_eq!(report.applied, 7);
        assert_eq!(report.last_event, Some(EventId::new("tx6", 0)));
    }

    #[tokio::test]
    async fn test_last_cursor_resumes_after_applied() {
        let fx = ChainFixture::new();
        record_members(&fx, 4, 1_000, 10);
        let (controller, store) = controller(&fx, 2_000).await;
        controller.sync_from_cursor(None).await.unwrap();

        for i in 0..2u8 {
            fx.chain.record(fx.member_added(&format!("late{i}"), &addr(50 + i), "m", 1, 1_100 + u64::from(i)));
        }
        let report = controller.sync_from_last_cursor().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.applied, 2);

        let dao = store.get_dao().await.unwrap().unwrap();
        assert_eq!(dao.last_cursor.unwrap().id, EventId::new("late1", 0));
    }

    #[tokio::test]
    async fn test_query_failure_aborts() {
        let fx = ChainFixture::new();
        fx.chain.set_fail_query(true);
        let (controller, _) = controller(&fx, 2_000).await;
        let err = controller.sync_from_cursor(None).await.unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_unknown_cursor_is_fatal() {
        let fx = ChainFixture::new();
        record_members(&fx, 2, 1_000, 10);
        let (controller, _) = controller(&fx, 2_000).await;
        let err = controller
            .sync_from_cursor(Some(EventId::new("nope", 0)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::Fatal);
    }

    // ===== RECENT MODE =====

    #[tokio::test]
    async fn test_recent_applies_only_window_in_chain_order() {
        let fx = ChainFixture::new();
        // One event per hour, ending at hour 9.
        record_members(&fx, 10, 0, HOUR);
        let (controller, store) = controller(&fx, 10 * HOUR).await;

        let report = controller.sync_recent(3).await.unwrap();
        // Hours 7, 8 and 9 fall in the window.
        assert_eq!(report.applied, 3);
        assert_eq!(store.get_pending_member(&addr(8)).await.unwrap().map(|p| p.details.name), Some("m".into()));
        assert!(store.get_pending_member(&addr(7)).await.unwrap().is_none());

        let dao = store.get_dao().await.unwrap().unwrap();
        assert_eq!(dao.last_cursor.unwrap().id, EventId::new("tx9", 0));
    }

    #[tokio::test]
    async fn test_recent_skips_processed() {
        let fx = ChainFixture::new();
        record_members(&fx, 5, 0, HOUR);
        let (controller, _) = controller(&fx, 5 * HOUR).await;

        let first = controller.sync_recent(24).await.unwrap();
        assert_eq!(first.applied, 5);
        let second = controller.sync_recent(24).await.unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.duplicates, 5);
    }
}
