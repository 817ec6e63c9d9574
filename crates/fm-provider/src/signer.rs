use async_trait::async_trait;
use fm_abi::{U256, to_hex_data, to_quantity};
use fm_api_types::WalletAddress;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

use crate::{ProviderError, WalletProvider, get_balance};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: WalletAddress,
    pub value: U256,
    pub data: Vec<u8>,
}

impl TransactionRequest {
    /// JSON-RPC transaction object as `eth_sendTransaction` and
    /// `eth_estimateGas` expect it.
    pub fn to_json(&self, from: &WalletAddress) -> Value {
        json!({
            "from": from.as_str(),
            "to": self.to.as_str(),
            "value": to_quantity(self.value),
            "data": to_hex_data(&self.data),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signing capability for one account. Deliberately narrow: callers never
/// see the provider behind it.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> &WalletAddress;
    async fn get_balance(&self) -> Result<U256, ProviderError>;
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, ProviderError>;
}

pub struct ProviderSigner {
    provider: Arc<dyn WalletProvider>,
    address: WalletAddress,
}

impl ProviderSigner {
    pub fn new(provider: Arc<dyn WalletProvider>, address: WalletAddress) -> Self {
        Self { provider, address }
    }
}

#[async_trait]
impl Signer for ProviderSigner {
    fn address(&self) -> &WalletAddress {
        &self.address
    }

    async fn get_balance(&self) -> Result<U256, ProviderError> {
        get_balance(self.provider.as_ref(), &self.address).await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, ProviderError> {
        let value = self
            .provider
            .request("eth_sendTransaction", json!([tx.to_json(&self.address)]))
            .await?;
        match value {
            Value::String(hash) => Ok(TxHash(hash)),
            other => Err(ProviderError::Decode(format!("expected transaction hash, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountsListeners, AccountsSubscription};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, Value)>>,
        listeners: AccountsListeners,
    }

    #[async_trait]
    impl WalletProvider for RecordingProvider {
        async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            self.calls.lock().unwrap().push((method.to_owned(), params));
            match method {
                "eth_getBalance" => Ok(json!("0xde0b6b3a7640000")),
                "eth_sendTransaction" => Ok(json!("0x1234")),
                _ => Err(ProviderError::rpc(-32601, "method not found")),
            }
        }

        fn subscribe_accounts(&self) -> AccountsSubscription {
            self.listeners.subscribe()
        }
    }

    #[tokio::test]
    async fn reads_own_balance() {
        let provider = Arc::new(RecordingProvider::default());
        let signer = ProviderSigner::new(provider.clone(), WalletAddress::from("0xabc"));

        assert_eq!(signer.get_balance().await.unwrap(), fm_abi::ether(1));
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].1, json!(["0xabc", "latest"]));
    }

    #[tokio::test]
    async fn sends_from_own_address() {
        let provider = Arc::new(RecordingProvider::default());
        let signer = ProviderSigner::new(provider.clone(), WalletAddress::from("0xabc"));
        let tx = TransactionRequest {
            to: WalletAddress::from("0xdef"),
            value: U256::from(16u64),
            data: vec![0xb6, 0x0d, 0x42, 0x88],
        };

        let hash = signer.send_transaction(&tx).await.unwrap();
        assert_eq!(hash, TxHash("0x1234".to_owned()));

        let calls = provider.calls.lock().unwrap();
        let (method, params) = &calls[0];
        assert_eq!(method, "eth_sendTransaction");
        assert_eq!(params[0]["from"], "0xabc");
        assert_eq!(params[0]["value"], "0x10");
        assert_eq!(params[0]["data"], "0xb60d4288");
    }
}
