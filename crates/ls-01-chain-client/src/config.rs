//! # Chain Client Configuration

use serde::{Deserialize, Serialize};

/// Default RPC timeout.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 30_000;

/// JSON-RPC endpoint configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainClientConfig {
    /// HTTP(S) endpoint for request/response calls.
    pub rpc_url: String,

    /// WebSocket endpoint for subscriptions. Derived from `rpc_url` when
    /// unset.
    pub ws_url: Option<String>,

    /// Upper bound on every RPC call.
    pub request_timeout_ms: u64,

    /// Events buffered between the socket and the subscriber.
    pub subscription_buffer: usize,
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://fullnode.testnet.sui.io:443".to_string(),
            ws_url: None,
            request_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            subscription_buffer: 1024,
        }
    }
}

impl ChainClientConfig {
    /// Configuration for a given endpoint with default limits.
    pub fn for_url(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Self::default()
        }
    }

    /// The subscription endpoint: `ws_url`, or `rpc_url` with its scheme
    /// swapped (`https` → `wss`, `http` → `ws`).
    pub fn effective_ws_url(&self) -> String {
        if let Some(ws) = &self.ws_url {
            return ws.clone();
        }
        if let Some(rest) = self.rpc_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.rpc_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.rpc_url.clone()
        }
    }
}
