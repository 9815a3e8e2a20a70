//! # Outbound Ports
//!
//! What the mirror consumes from the chain.

use async_trait::async_trait;
use shared_types::{ChainAddress, ObjectId};
use tokio::sync::{mpsc, oneshot};

use crate::domain::{
    ChainClientError, DevInspectResults, DryRunEffects, EventFilter, EventPage, EventQuery,
    ObjectFields, RawEvent,
};

/// Chain RPC - outbound port.
///
/// Implementations bound every call by a timeout and report transport
/// failures as `ChainClientError` values of kind `Network`.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read an object. A missing object is `Ok(None)`, not an error.
    async fn get_object(&self, id: &ObjectId) -> Result<Option<ObjectFields>, ChainClientError>;

    /// Run a view call without committing.
    async fn dev_inspect(
        &self,
        sender: &ChainAddress,
        tx_bytes: &str,
    ) -> Result<DevInspectResults, ChainClientError>;

    /// Fetch one page of events.
    async fn query_events(&self, query: EventQuery) -> Result<EventPage, ChainClientError>;

    /// Open a live subscription. Dropping the handle unsubscribes.
    async fn subscribe_events(
        &self,
        filter: EventFilter,
    ) -> Result<EventSubscription, ChainClientError>;

    /// Simulate a transaction for its gas cost.
    async fn dry_run(&self, tx_bytes: &str) -> Result<DryRunEffects, ChainClientError>;

    /// Latest checkpoint sequence number. Used as a liveness probe.
    async fn latest_checkpoint(&self) -> Result<u64, ChainClientError>;
}

/// Handle to a live event subscription.
///
/// Events arrive in delivery order. An `Err` item reports a transport
/// problem; `None` means the stream ended. Dropping the handle (or calling
/// [`unsubscribe`](Self::unsubscribe)) releases the server-side
/// subscription.
pub struct EventSubscription {
    receiver: mpsc::Receiver<Result<RawEvent, ChainClientError>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl EventSubscription {
    /// Wrap a receiver. `cancel` is signalled when the handle is released.
    pub fn new(
        receiver: mpsc::Receiver<Result<RawEvent, ChainClientError>>,
        cancel: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self { receiver, cancel }
    }

    /// Next item from the stream.
    pub async fn next(&mut self) -> Option<Result<RawEvent, ChainClientError>> {
        self.receiver.recv().await
    }

    /// Release the subscription now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("cancelled", &self.cancel.is_none())
            .finish()
    }
}
