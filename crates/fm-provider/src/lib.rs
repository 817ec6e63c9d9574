//! The wallet provider boundary.
//!
//! A [`WalletProvider`] is whatever the host injects: a browser wallet bridge,
//! a JSON-RPC node, or an in-memory double. The session layer only ever sees
//! this trait and the narrow [`Signer`] handle built on top of it.

mod listeners;
mod signer;
mod transaction;

pub use listeners::{AccountsListeners, AccountsSubscription};
pub use signer::{ProviderSigner, Signer, TransactionRequest, TxHash};
pub use transaction::{PendingTransaction, Receipt, fetch_receipt};

use async_trait::async_trait;
use fm_abi::{U256, from_hex_data, parse_quantity};
use fm_api_types::WalletAddress;
use serde_json::{Value, json};
use thiserror::Error;

/// Local development node (anvil, hardhat).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// EIP-1193: the user rejected the request.
pub const USER_REJECTED: i64 = 4001;
/// EIP-1193: the requested account or method is not authorized.
pub const UNAUTHORIZED: i64 = 4100;
/// Geth-style code for `execution reverted` with revert data attached.
pub const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    fn message_contains(&self, needle: &str) -> bool {
        match self {
            Self::Rpc { message, .. } => message.to_ascii_lowercase().contains(needle),
            _ => false,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED)
            || self.message_contains("user rejected")
            || self.message_contains("user denied")
    }

    pub fn is_insufficient_funds(&self) -> bool {
        self.message_contains("insufficient funds")
    }

    pub fn is_revert(&self) -> bool {
        self.code() == Some(EXECUTION_REVERTED) || self.message_contains("revert")
    }

    /// Raw revert payload, wherever the node nested it inside `data`.
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        match self {
            Self::Rpc { data: Some(data), .. } => find_hex_payload(data).and_then(|hex| from_hex_data(&hex).ok()),
            _ => None,
        }
    }
}

fn find_hex_payload(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if text.starts_with("0x") => Some(text.clone()),
        Value::Object(map) => map
            .get("data")
            .and_then(find_hex_payload)
            .or_else(|| map.get("originalError").and_then(find_hex_payload)),
        _ => None,
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Registers an `accountsChanged` listener. Dropping the subscription
    /// unregisters it.
    fn subscribe_accounts(&self) -> AccountsSubscription;
}

/// `eth_accounts`: already-authorized accounts, never prompts.
pub async fn authorized_accounts(provider: &dyn WalletProvider) -> Result<Vec<WalletAddress>, ProviderError> {
    let value = provider.request("eth_accounts", json!([])).await?;
    parse_accounts(value)
}

/// `eth_requestAccounts`: may prompt the user.
pub async fn request_accounts(provider: &dyn WalletProvider) -> Result<Vec<WalletAddress>, ProviderError> {
    let value = provider.request("eth_requestAccounts", json!([])).await?;
    parse_accounts(value)
}

pub async fn get_balance(provider: &dyn WalletProvider, address: &WalletAddress) -> Result<U256, ProviderError> {
    let value = provider
        .request("eth_getBalance", json!([address.as_str(), "latest"]))
        .await?;
    parse_quantity_value(&value)
}

pub fn parse_accounts(value: Value) -> Result<Vec<WalletAddress>, ProviderError> {
    let Value::Array(items) = value else {
        return Err(ProviderError::Decode(format!("expected account array, got {value}")));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(address) => Ok(WalletAddress(address)),
            other => Err(ProviderError::Decode(format!("account entry is not a string: {other}"))),
        })
        .collect()
}

pub fn parse_quantity_value(value: &Value) -> Result<U256, ProviderError> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::Decode(format!("expected hex quantity, got {value}")))?;
    parse_quantity(text).map_err(|err| ProviderError::Decode(err.to_string()))
}

/// Decodes a `0x`-prefixed data string such as an `eth_call` result.
pub fn from_hex_value(value: &Value) -> Result<Vec<u8>, ProviderError> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::Decode(format!("expected hex data, got {value}")))?;
    from_hex_data(text).map_err(|err| ProviderError::Decode(err.to_string()))
}
