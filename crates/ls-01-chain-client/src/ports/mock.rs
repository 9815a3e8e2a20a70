//! # Mock Chain Client
//!
//! In-memory chain for tests: an object table, an append-only event log in
//! chain order, live subscribers, and switches for injecting failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{ChainAddress, ObjectId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use super::outbound::{ChainClient, EventSubscription};
use crate::domain::{
    ChainClientError, DevInspectResults, DryRunEffects, EventFilter, EventPage, EventQuery,
    GasCostSummary, ObjectFields, RawEvent, SortOrder,
};

/// Default channel depth for mock subscriptions.
pub const MOCK_SUBSCRIPTION_CAPACITY: usize = 65_536;

struct Subscriber {
    filter: EventFilter,
    sender: mpsc::Sender<Result<RawEvent, ChainClientError>>,
}

#[derive(Default)]
struct MockState {
    objects: HashMap<ObjectId, ObjectFields>,
    events: Vec<RawEvent>,
    subscribers: Vec<Subscriber>,
    checkpoint: u64,
    fail_subscribe: bool,
    fail_probe: bool,
    fail_query: bool,
    fail_objects: bool,
    fail_dry_run: bool,
    object_latency: Option<Duration>,
    gas: GasCostSummary,
    subscribe_calls: usize,
    object_reads: usize,
}

/// Mock chain for testing.
pub struct MockChainClient {
    state: Mutex<MockState>,
    subscription_capacity: usize,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    /// Empty chain.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                gas: GasCostSummary {
                    computation_cost: 1_000_000,
                    storage_cost: 2_000_000,
                    storage_rebate: 500_000,
                },
                ..MockState::default()
            }),
            subscription_capacity: MOCK_SUBSCRIPTION_CAPACITY,
        }
    }

    /// Insert or replace an object.
    pub fn put_object(&self, fields: ObjectFields) {
        self.state.lock().objects.insert(fields.object_id.clone(), fields);
    }

    /// Remove an object.
    pub fn remove_object(&self, id: &ObjectId) {
        self.state.lock().objects.remove(id);
    }

    /// Append an event to the log and deliver it to live subscribers.
    pub fn emit(&self, event: RawEvent) {
        let mut state = self.state.lock();
        state.subscribers.retain(|s| !s.sender.is_closed());
        for sub in &state.subscribers {
            if sub.filter.matches(&event) {
                // A full channel drops the event, like a lossy transport.
                let _ = sub.sender.try_send(Ok(event.clone()));
            }
        }
        state.events.push(event);
    }

    /// Append an event to the log without delivering it live, as if it
    /// happened while the transport was down.
    pub fn record(&self, event: RawEvent) {
        self.state.lock().events.push(event);
    }

    /// Fail every live subscription with a transport error and close it.
    pub fn kill_subscriptions(&self) {
        let subscribers = std::mem::take(&mut self.state.lock().subscribers);
        for sub in subscribers {
            let _ = sub
                .sender
                .try_send(Err(ChainClientError::Network("connection reset".into())));
        }
    }

    /// Make `subscribe_events` fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state.lock().fail_subscribe = fail;
    }

    /// Make `latest_checkpoint` fail.
    pub fn set_fail_probe(&self, fail: bool) {
        self.state.lock().fail_probe = fail;
    }

    /// Make `query_events` fail.
    pub fn set_fail_query(&self, fail: bool) {
        self.state.lock().fail_query = fail;
    }

    /// Make `get_object` fail with a network error.
    pub fn set_fail_objects(&self, fail: bool) {
        self.state.lock().fail_objects = fail;
    }

    /// Make `dry_run` fail with a network error.
    pub fn set_fail_dry_run(&self, fail: bool) {
        self.state.lock().fail_dry_run = fail;
    }

    /// Delay every object read.
    pub fn set_object_latency(&self, latency: Option<Duration>) {
        self.state.lock().object_latency = latency;
    }

    /// Set the reported checkpoint.
    pub fn set_checkpoint(&self, checkpoint: u64) {
        self.state.lock().checkpoint = checkpoint;
    }

    /// Number of `subscribe_events` calls, successful or not.
    pub fn subscribe_calls(&self) -> usize {
        self.state.lock().subscribe_calls
    }

    /// Number of subscriptions whose handle is still held.
    pub fn active_subscriptions(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| !s.sender.is_closed())
            .count()
    }

    /// Number of `get_object` calls.
    pub fn object_reads(&self) -> usize {
        self.state.lock().object_reads
    }

    /// Events in chain order.
    pub fn events(&self) -> Vec<RawEvent> {
        self.state.lock().events.clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_object(&self, id: &ObjectId) -> Result<Option<ObjectFields>, ChainClientError> {
        let latency = {
            let mut state = self.state.lock();
            state.object_reads += 1;
            state.object_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let state = self.state.lock();
        if state.fail_objects {
            return Err(ChainClientError::Network("mock object read failure".into()));
        }
        Ok(state.objects.get(id).cloned())
    }

    async fn dev_inspect(
        &self,
        _sender: &ChainAddress,
        _tx_bytes: &str,
    ) -> Result<DevInspectResults, ChainClientError> {
        Ok(DevInspectResults::default())
    }

    async fn query_events(&self, query: EventQuery) -> Result<EventPage, ChainClientError> {
        let state = self.state.lock();
        if state.fail_query {
            return Err(ChainClientError::Network("mock query failure".into()));
        }

        let matching: Vec<&RawEvent> = state
            .events
            .iter()
            .filter(|e| query.filter.matches(e))
            .collect();

        let position = match &query.cursor {
            Some(cursor) => Some(
                matching
                    .iter()
                    .position(|e| &e.id == cursor)
                    .ok_or_else(|| ChainClientError::InvalidCursor(cursor.to_string()))?,
            ),
            None => None,
        };

        let ordered: Vec<&RawEvent> = match query.order {
            SortOrder::Ascending => {
                let start = position.map_or(0, |p| p + 1);
                matching[start..].to_vec()
            }
            SortOrder::Descending => {
                let end = position.unwrap_or(matching.len());
                matching[..end].iter().rev().copied().collect()
            }
        };

        let limit = query.limit.max(1);
        let data: Vec<RawEvent> = ordered.iter().take(limit).map(|e| (*e).clone()).collect();
        let has_next_page = ordered.len() > data.len();
        let next_cursor = data.last().map(|e| e.id.clone());

        Ok(EventPage {
            data,
            has_next_page,
            next_cursor,
        })
    }

    async fn subscribe_events(
        &self,
        filter: EventFilter,
    ) -> Result<EventSubscription, ChainClientError> {
        let mut state = self.state.lock();
        state.subscribe_calls += 1;
        if state.fail_subscribe {
            return Err(ChainClientError::Network("mock subscribe failure".into()));
        }
        let (sender, receiver) = mpsc::channel(self.subscription_capacity);
        state.subscribers.push(Subscriber { filter, sender });
        Ok(EventSubscription::new(receiver, None))
    }

    async fn dry_run(&self, _tx_bytes: &str) -> Result<DryRunEffects, ChainClientError> {
        let state = self.state.lock();
        if state.fail_dry_run {
            return Err(ChainClientError::Network("mock dry run failure".into()));
        }
        Ok(DryRunEffects {
            success: true,
            error: None,
            gas_used: state.gas,
        })
    }

    async fn latest_checkpoint(&self) -> Result<u64, ChainClientError> {
        let state = self.state.lock();
        if state.fail_probe {
            return Err(ChainClientError::Network("mock probe failure".into()));
        }
        Ok(state.checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::EventId;

    fn package() -> ObjectId {
        ObjectId::parse("0xaa").unwrap()
    }

    fn filter() -> EventFilter {
        EventFilter::MoveModule {
            package: package(),
            module: "dao".into(),
        }
    }

    fn event(seq: u64) -> RawEvent {
        RawEvent::new(
            format!("{}::dao::MemberAdded", package()),
            EventId::new(format!("tx{seq}"), 0),
            1000 + seq,
            json!({}),
        )
    }

    #[tokio::test]
    async fn test_query_pages_ascending() {
        let chain = MockChainClient::new();
        for seq in 0..5 {
            chain.record(event(seq));
        }
        let page = chain
            .query_events(EventQuery {
                filter: filter(),
                cursor: None,
                limit: 2,
                order: SortOrder::Ascending,
            })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.has_next_page);

        let rest = chain
            .query_events(EventQuery {
                filter: filter(),
                cursor: page.next_cursor,
                limit: 10,
                order: SortOrder::Ascending,
            })
            .await
            .unwrap();
        assert_eq!(rest.data.len(), 3);
        assert!(!rest.has_next_page);
        assert_eq!(rest.data[0].id.tx_digest, "tx2");
    }

    #[tokio::test]
    async fn test_query_descending_and_bad_cursor() {
        let chain = MockChainClient::new();
        for seq in 0..3 {
            chain.record(event(seq));
        }
        let page = chain
            .query_events(EventQuery {
                filter: filter(),
                cursor: None,
                limit: 10,
                order: SortOrder::Descending,
            })
            .await
            .unwrap();
        assert_eq!(page.data[0].id.tx_digest, "tx2");

        let err = chain
            .query_events(EventQuery {
                filter: filter(),
                cursor: Some(EventId::new("missing", 0)),
                limit: 10,
                order: SortOrder::Ascending,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChainClientError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn test_subscription_delivery_and_kill() {
        let chain = MockChainClient::new();
        let mut sub = chain.subscribe_events(filter()).await.unwrap();
        chain.emit(event(1));
        assert_eq!(sub.next().await.unwrap().unwrap().id.tx_digest, "tx1");

        chain.kill_subscriptions();
        assert!(sub.next().await.unwrap().is_err());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_handle_is_not_active() {
        let chain = MockChainClient::new();
        let sub = chain.subscribe_events(filter()).await.unwrap();
        assert_eq!(chain.active_subscriptions(), 1);
        drop(sub);
        assert_eq!(chain.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_none() {
        let chain = MockChainClient::new();
        assert!(chain
            .get_object(&ObjectId::parse("0x1").unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
