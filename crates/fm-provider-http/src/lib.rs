use async_trait::async_trait;
use fm_api_types::WalletAddress;
use fm_provider::{AccountsListeners, AccountsSubscription, ProviderError, WalletProvider, authorized_accounts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use fm_provider::DEFAULT_RPC_URL;

/// JSON-RPC 2.0 provider over HTTP.
///
/// Reads `FUNDME_RPC_URL` from environment at construction time
/// (default: `http://127.0.0.1:8545`). Against a node with unlocked accounts
/// (anvil, hardhat) it doubles as a wallet; otherwise it is the read-only
/// fallback.
pub struct HttpRpcProvider {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    listeners: AccountsListeners,
}

impl Default for HttpRpcProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpRpcProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("FUNDME_RPC_URL").ok())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
            listeners: AccountsListeners::default(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Nodes have no push channel for account changes, so poll `eth_accounts`
    /// and emit `accountsChanged` whenever the set differs from the last poll.
    pub fn watch_accounts(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let provider = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut last: Option<Vec<WalletAddress>> = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(provider) = provider.upgrade() else {
                    return;
                };
                match authorized_accounts(provider.as_ref()).await {
                    Ok(accounts) => {
                        if last.as_ref().is_some_and(|previous| *previous != accounts) {
                            debug!("accounts changed on {}: {} account(s)", provider.endpoint, accounts.len());
                            provider.listeners.emit(&accounts);
                        }
                        last = Some(accounts);
                    }
                    Err(err) => warn!("account poll against {} failed: {err}", provider.endpoint),
                }
            }
        })
    }
}

// ── JSON-RPC envelope ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

fn into_result(response: RpcResponse) -> Result<Value, ProviderError> {
    if let Some(err) = response.error {
        return Err(ProviderError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

#[async_trait]
impl WalletProvider for HttpRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("rpc -> {} {}", self.endpoint, method);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(format!("{method}: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ProviderError::Transport(format!("{method}: {err}")))?;

        // Some nodes answer JSON-RPC errors with a non-2xx status, so try the
        // envelope before looking at the status code.
        match serde_json::from_str::<RpcResponse>(&text) {
            Ok(envelope) => into_result(envelope),
            Err(_) if !status.is_success() => Err(ProviderError::Transport(format!("{method} HTTP {status}: {text}"))),
            Err(err) => Err(ProviderError::Decode(format!("{method}: {err}"))),
        }
    }

    fn subscribe_accounts(&self) -> AccountsSubscription {
        self.listeners.subscribe()
    }
}
