//! # Event Ingestor Service
//!
//! One supervisor task owns the state machine and the subscription; one
//! consumer task drains the live buffer into the applier, so live events
//! are applied in arrival order.
//!
//! ```text
//! subscription ──► dedupe (LRU) ──► buffer (bounded) ──► consumer ──► applier
//!       ▲                                  │ full
//!       └── Reconnecting ◄── drop ◄────────┘
//! ```
//!
//! Every successful subscribe is followed by a catch-up: the buffer is
//! drained, then events after the mirror's last cursor are replayed. Live
//! events arriving meanwhile wait on the subscription and are deduplicated
//! by the applier.

use async_trait::async_trait;
use labshare_telemetry::{
    log_event, BACKPRESSURE_TRIPS, BUFFER_DEPTH, DUPLICATES_DROPPED, EVENTS_RECEIVED,
    INGESTOR_STATE, RECONNECTS,
};
use ls_01_chain_client::{ChainClient, ChainClientError, EventFilter, EventSubscription, RawEvent};
use ls_06_mirror_applier::{ApplyOutcome, EventApplier, ProcessedEventSet};
use ls_07_resync::ResyncApi;
use parking_lot::Mutex;
use shared_types::{Clock, TimestampMs};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::IngestorConfig;
use crate::domain::{IngestorError, IngestorState, IngestorStatus};
use crate::ports::EventIngestorApi;

/// Item on the live buffer.
enum Buffered {
    Event(RawEvent),
    /// Acknowledged once everything queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Why the live loop returned.
enum LiveEnd {
    Shutdown,
    Lost(IngestorError),
}

/// State shared by the handle, the supervisor and the consumer.
struct Shared {
    chain: Arc<dyn ChainClient>,
    applier: Arc<dyn EventApplier>,
    resync: Arc<dyn ResyncApi>,
    clock: Arc<dyn Clock>,
    filter: EventFilter,
    config: IngestorConfig,
    state: watch::Sender<IngestorState>,
    attempts: AtomicU32,
    last_event_at: Mutex<Option<TimestampMs>>,
    processed: AtomicU64,
    buffered: AtomicUsize,
    seen: ProcessedEventSet,
    last_error: Mutex<Option<IngestorError>>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Event ingestor.
pub struct EventIngestor {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl EventIngestor {
    /// Create a stopped ingestor for the events selected by `filter`.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        applier: Arc<dyn EventApplier>,
        resync: Arc<dyn ResyncApi>,
        clock: Arc<dyn Clock>,
        filter: EventFilter,
        config: IngestorConfig,
    ) -> Self {
        let (state, _) = watch::channel(IngestorState::Stopped);
        Self {
            shared: Arc::new(Shared {
                seen: ProcessedEventSet::new(config.event_cache_size),
                chain,
                applier,
                resync,
                clock,
                filter,
                config,
                state,
                attempts: AtomicU32::new(0),
                last_event_at: Mutex::new(None),
                processed: AtomicU64::new(0),
                buffered: AtomicUsize::new(0),
                last_error: Mutex::new(None),
            }),
            running: Mutex::new(None),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &IngestorConfig {
        &self.shared.config
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<IngestorState> {
        self.shared.state.subscribe()
    }
}

impl Shared {
    fn set_state(&self, next: IngestorState) {
        let previous = self.state.send_replace(next);
        INGESTOR_STATE.set(next.gauge_value());
        if previous != next {
            info!(from = %previous, to = %next, "[ls-05] state change");
        }
    }

    async fn supervise(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(self.config.buffer_capacity.max(1));
        let consumer = tokio::spawn(Arc::clone(&self).consume(rx));

        let terminal = self.connect_loop(&tx, &mut shutdown).await;

        // Closing the buffer lets the consumer finish what is queued.
        drop(tx);
        if let Err(e) = consumer.await {
            error!(error = %e, "[ls-05] consumer task failed");
        }
        self.buffered.store(0, Ordering::Relaxed);
        BUFFER_DEPTH.set(0.0);

        if let Some(err) = terminal {
            log_event!(error, "ls-05", "[ls-05] event listener stopped on error",
                error_kind = %err.kind(), error = %err);
            *self.last_error.lock() = Some(err);
        }
        self.set_state(IngestorState::Stopped);
    }

    /// Subscribe, run live, reconnect. Returns the terminal error, or
    /// `None` on an explicit stop.
    async fn connect_loop(
        &self,
        tx: &mpsc::Sender<Buffered>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<IngestorError> {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            self.set_state(IngestorState::Subscribing);
            let opened = tokio::select! {
                result = self.open_and_catch_up(tx) => result,
                _ = shutdown.changed() => return None,
            };

            let cause = match opened {
                Ok(subscription) => {
                    self.attempts.store(0, Ordering::Relaxed);
                    self.set_state(IngestorState::Live);
                    match self.live(subscription, tx, shutdown).await {
                        LiveEnd::Shutdown => return None,
                        LiveEnd::Lost(cause) => cause,
                    }
                }
                Err(cause) if cause.is_terminal() => return Some(cause),
                Err(cause) => cause,
            };

            self.set_state(IngestorState::Reconnecting);
            let attempt = self.attempts.load(Ordering::Relaxed) + 1;
            if attempt > self.config.max_reconnect_attempts {
                return Some(IngestorError::ReconnectBudgetExhausted {
                    attempts: self.config.max_reconnect_attempts,
                    last_error: cause.to_string(),
                });
            }
            self.attempts.store(attempt, Ordering::Relaxed);
            RECONNECTS.inc();

            let delay = self.config.backoff(attempt);
            log_event!(warn, "ls-05", "[ls-05] connection lost, reconnecting",
                attempt, delay_ms = delay.as_millis() as u64, error_kind = %cause.kind(), error = %cause);

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.changed() => return None,
            }
        }
    }

    /// Open the subscription, then drain the buffer and replay the gap
    /// since the last applied cursor.
    async fn open_and_catch_up(
        &self,
        tx: &mpsc::Sender<Buffered>,
    ) -> Result<EventSubscription, IngestorError> {
        let subscription = self.chain.subscribe_events(self.filter.clone()).await?;

        self.flush(tx).await;
        let report = self.resync.sync_from_last_cursor().await?;
        self.processed
            .fetch_add(report.applied + report.ignored, Ordering::Relaxed);
        if report.scanned > 0 {
            log_event!(info, "ls-05", "[ls-05] caught up after subscribe", report = %report);
        }
        Ok(subscription)
    }

    /// Wait until every event queued so far has been applied.
    async fn flush(&self, tx: &mpsc::Sender<Buffered>) {
        let (ack, done) = oneshot::channel();
        if tx.send(Buffered::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Receive live events until the connection is lost or a stop arrives.
    /// The subscription and the health timer are dropped on every return.
    async fn live(
        &self,
        mut subscription: EventSubscription,
        tx: &mpsc::Sender<Buffered>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LiveEnd {
        let period = self.config.health_check_interval();
        let mut health = time::interval_at(Instant::now() + period, period);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                _ = shutdown.changed() => return LiveEnd::Shutdown,
                item = subscription.next() => match item {
                    Some(Ok(raw)) => {
                        last_activity = Instant::now();
                        if let Err(cause) = self.accept(raw, tx) {
                            return LiveEnd::Lost(cause);
                        }
                    }
                    Some(Err(e)) => return LiveEnd::Lost(e.into()),
                    None => return LiveEnd::Lost(ChainClientError::SubscriptionClosed.into()),
                },
                _ = health.tick() => {
                    let idle = last_activity.elapsed();
                    if idle > self.config.idle_window() {
                        let idle_ms = idle.as_millis() as u64;
                        match self.chain.latest_checkpoint().await {
                            Ok(checkpoint) => {
                                debug!(checkpoint, idle_ms, "[ls-05] quiet stream, chain reachable");
                            }
                            Err(e) => {
                                return LiveEnd::Lost(IngestorError::Unhealthy {
                                    idle_ms,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    /// Dedupe one live event and queue it for the consumer.
    fn accept(&self, raw: RawEvent, tx: &mpsc::Sender<Buffered>) -> Result<(), IngestorError> {
        EVENTS_RECEIVED.inc();
        *self.last_event_at.lock() = Some(self.clock.now_ms());

        let key = raw.id.key();
        if self.seen.contains(&key) {
            DUPLICATES_DROPPED.inc();
            debug!(event_id = %key, "[ls-05] duplicate event dropped");
            return Ok(());
        }

        match tx.try_send(Buffered::Event(raw)) {
            Ok(()) => {
                self.seen.insert(key);
                let depth = self.buffered.fetch_add(1, Ordering::Relaxed) + 1;
                BUFFER_DEPTH.set(depth as f64);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                BACKPRESSURE_TRIPS.inc();
                log_event!(warn, "ls-05", "[ls-05] live buffer full, dropping subscription",
                    event_id = %key, capacity = self.config.buffer_capacity);
                Err(IngestorError::BufferOverflow {
                    capacity: self.config.buffer_capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(IngestorError::Subscription(ChainClientError::SubscriptionClosed))
            }
        }
    }

    /// Apply buffered events in order until the buffer closes.
    async fn consume(self: Arc<Self>, mut rx: mpsc::Receiver<Buffered>) {
        while let Some(item) = rx.recv().await {
            let raw = match item {
                Buffered::Event(raw) => raw,
                Buffered::Flush(ack) => {
                    let _ = ack.send(());
                    continue;
                }
            };
            let depth = self.buffered.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
            BUFFER_DEPTH.set(depth as f64);

            // A failed event blocks the stream until it applies or the
            // applier dead-letters it.
            loop {
                match self.applier.apply(&raw).await {
                    ApplyOutcome::Failed { attempts, .. } => {
                        time::sleep(self.config.backoff(attempts)).await;
                    }
                    ApplyOutcome::Applied { .. } | ApplyOutcome::Ignored { .. } => {
                        self.processed.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    _ => break,
                }
            }
        }
    }
}

#[async_trait]
impl EventIngestorApi for EventIngestor {
    async fn start_listening(&self) -> Result<(), IngestorError> {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(IngestorError::AlreadyRunning);
        }

        *self.shared.last_error.lock() = None;
        self.shared.attempts.store(0, Ordering::Relaxed);
        self.shared.set_state(IngestorState::Subscribing);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&self.shared).supervise(shutdown_rx));
        *running = Some(Running { shutdown, handle });

        log_event!(info, "ls-05", "[ls-05] event listener started",
            buffer_capacity = self.shared.config.buffer_capacity,
            idle_window_ms = self.shared.config.idle_window_ms);
        Ok(())
    }

    async fn stop_listening(&self) {
        let running = self.running.lock().take();
        let Some(Running { shutdown, handle }) = running else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            error!(error = %e, "[ls-05] supervisor task failed");
        }
        self.shared.set_state(IngestorState::Stopped);
        log_event!(info, "ls-05", "[ls-05] event listener stopped",
            processed = self.shared.processed.load(Ordering::Relaxed));
    }

    fn status(&self) -> IngestorStatus {
        IngestorStatus {
            state: *self.shared.state.borrow(),
            attempt_count: self.shared.attempts.load(Ordering::Relaxed),
            last_event_timestamp: *self.shared.last_event_at.lock(),
            processed_count: self.shared.processed.load(Ordering::Relaxed),
        }
    }

    fn last_error(&self) -> Option<IngestorError> {
        self.shared.last_error.lock().clone()
    }
}
