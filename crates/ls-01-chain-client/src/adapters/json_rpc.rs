//! # JSON-RPC Adapter
//!
//! [`ChainClient`] over the node's JSON-RPC API: HTTP for request/response
//! calls and a WebSocket connection per live subscription.

use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, SubscriptionClientT};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::WsClientBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared_types::serde_helpers::u64_string;
use shared_types::{ChainAddress, ObjectId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::ChainClientConfig;
use crate::domain::{
    ChainClientError, DevInspectResults, DryRunEffects, EventFilter, EventPage, EventQuery,
    GasCostSummary, ObjectFields, RawEvent, SortOrder,
};
use crate::ports::{ChainClient, EventSubscription};

/// JSON-RPC chain client.
pub struct JsonRpcChainClient {
    http: HttpClient,
    ws_url: String,
    timeout: Duration,
    subscription_buffer: usize,
}

#[derive(Deserialize)]
struct GetObjectResponse {
    data: Option<ObjectData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectData {
    object_id: ObjectId,
    #[serde(with = "u64_string")]
    version: u64,
    #[serde(rename = "type")]
    type_: Option<String>,
    content: Option<ObjectContent>,
}

#[derive(Deserialize)]
struct ObjectContent {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DryRunResponse {
    effects: EffectsView,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EffectsView {
    status: ExecutionStatus,
    gas_used: GasCostSummary,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevInspectResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Option<Vec<ExecutionResult>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionResult {
    #[serde(default)]
    return_values: Vec<(Vec<u8>, String)>,
}

impl JsonRpcChainClient {
    /// Build a client. No connection is made until the first call.
    pub fn new(config: &ChainClientConfig) -> Result<Self, ChainClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let http = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(&config.rpc_url)
            .map_err(|e| ChainClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            ws_url: config.effective_ws_url(),
            timeout,
            subscription_buffer: config.subscription_buffer.max(1),
        })
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: ArrayParams,
    ) -> Result<R, ChainClientError> {
        debug!("[ls-01] rpc {}", method);
        match tokio::time::timeout(self.timeout, self.http.request::<R, _>(method, params)).await {
            Ok(result) => result.map_err(|e| map_client_error(method, e, self.timeout)),
            Err(_) => Err(ChainClientError::Timeout {
                method: method.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

fn map_client_error(method: &str, error: ClientError, timeout: Duration) -> ChainClientError {
    match error {
        ClientError::Call(obj) => {
            let message = obj.message().to_string();
            if method == "suix_queryEvents" && message.to_ascii_lowercase().contains("cursor") {
                ChainClientError::InvalidCursor(message)
            } else {
                ChainClientError::Rpc {
                    code: obj.code(),
                    message,
                }
            }
        }
        ClientError::ParseError(e) => ChainClientError::Decode(e.to_string()),
        ClientError::RequestTimeout => ChainClientError::Timeout {
            method: method.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        other => ChainClientError::Network(other.to_string()),
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn get_object(&self, id: &ObjectId) -> Result<Option<ObjectFields>, ChainClientError> {
        let response: GetObjectResponse = self
            .call(
                "sui_getObject",
                rpc_params![id.as_str(), json!({"showContent": true, "showType": true})],
            )
            .await?;

        Ok(response.data.map(|data| {
            let fields = data.content.map(|c| c.fields).unwrap_or_default();
            let view = ObjectFields::new(data.object_id, data.version, fields);
            match data.type_ {
                Some(t) => view.with_type(t),
                None => view,
            }
        }))
    }

    async fn dev_inspect(
        &self,
        sender: &ChainAddress,
        tx_bytes: &str,
    ) -> Result<DevInspectResults, ChainClientError> {
        let response: DevInspectResponse = self
            .call(
                "sui_devInspectTransactionBlock",
                rpc_params![sender.as_str(), tx_bytes],
            )
            .await?;

        Ok(DevInspectResults {
            error: response.error,
            return_values: response
                .results
                .unwrap_or_default()
                .into_iter()
                .flat_map(|r| r.return_values)
                .collect(),
        })
    }

    async fn query_events(&self, query: EventQuery) -> Result<EventPage, ChainClientError> {
        let descending = query.order == SortOrder::Descending;
        self.call(
            "suix_queryEvents",
            rpc_params![query.filter, query.cursor, query.limit, descending],
        )
        .await
    }

    async fn subscribe_events(
        &self,
        filter: EventFilter,
    ) -> Result<EventSubscription, ChainClientError> {
        let client = WsClientBuilder::default()
            .request_timeout(self.timeout)
            .connection_timeout(self.timeout)
            .build(&self.ws_url)
            .await
            .map_err(|e| ChainClientError::Network(e.to_string()))?;

        let mut stream = client
            .subscribe::<RawEvent, _>(
                "suix_subscribeEvent",
                rpc_params![filter],
                "suix_unsubscribeEvent",
            )
            .await
            .map_err(|e| map_client_error("suix_subscribeEvent", e, self.timeout))?;

        let (tx, rx) = mpsc::channel(self.subscription_buffer);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let cancelled = loop {
                tokio::select! {
                    _ = &mut cancel_rx => break true,
                    item = stream.next() => match item {
                        Some(Ok(event)) => {
                            if tx.send(Ok(event)).await.is_err() {
                                break true;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("[ls-01] undecodable event notification: {}", e);
                            if tx.send(Err(ChainClientError::Decode(e.to_string()))).await.is_err() {
                                break true;
                            }
                        }
                        None => {
                            let _ = tx.send(Err(ChainClientError::SubscriptionClosed)).await;
                            break false;
                        }
                    }
                }
            };
            if cancelled {
                if let Err(e) = stream.unsubscribe().await {
                    debug!("[ls-01] unsubscribe failed: {}", e);
                }
            }
            drop(client);
        });

        Ok(EventSubscription::new(rx, Some(cancel_tx)))
    }

    async fn dry_run(&self, tx_bytes: &str) -> Result<DryRunEffects, ChainClientError> {
        let response: DryRunResponse = self
            .call("sui_dryRunTransactionBlock", rpc_params![tx_bytes])
            .await?;

        let success = response.effects.status.status == "success";
        Ok(DryRunEffects {
            success,
            error: response.effects.status.error,
            gas_used: response.effects.gas_used,
        })
    }

    async fn latest_checkpoint(&self) -> Result<u64, ChainClientError> {
        let value: Value = self
            .call("sui_getLatestCheckpointSequenceNumber", rpc_params![])
            .await?;
        shared_types::serde_helpers::json_u64(&value)
            .map_err(|e| ChainClientError::Decode(e.to_string()))
    }
}
