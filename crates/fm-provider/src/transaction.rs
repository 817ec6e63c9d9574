use fm_abi::U256;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{ProviderError, TxHash, WalletProvider, parse_quantity_value};

/// Consecutive failed receipt polls tolerated before giving up.
const MAX_POLL_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// `eth_getTransactionReceipt`; `None` while the transaction is unmined.
pub async fn fetch_receipt(provider: &dyn WalletProvider, hash: &TxHash) -> Result<Option<Receipt>, ProviderError> {
    let value = provider
        .request("eth_getTransactionReceipt", json!([hash.0]))
        .await?;
    if value.is_null() {
        return Ok(None);
    }

    let success = match value.get("status") {
        Some(status) => parse_quantity_value(status)? == U256::from(1u64),
        // pre-Byzantium receipts carry no status
        None => true,
    };
    let block_number = match value.get("blockNumber") {
        Some(Value::Null) | None => None,
        Some(number) => u64::try_from(parse_quantity_value(number)?).ok(),
    };

    Ok(Some(Receipt {
        tx_hash: hash.clone(),
        success,
        block_number,
    }))
}

/// A submitted transaction whose confirmation is awaited separately.
#[derive(Clone)]
pub struct PendingTransaction {
    hash: TxHash,
    provider: Arc<dyn WalletProvider>,
}

impl PendingTransaction {
    pub fn new(hash: TxHash, provider: Arc<dyn WalletProvider>) -> Self {
        Self { hash, provider }
    }

    /// Polls until mined. There is no deadline here; callers wrap this in a
    /// timeout if they want one.
    pub async fn wait(&self, poll_interval: Duration) -> Result<Receipt, ProviderError> {
        let mut failures = 0;
        loop {
            match fetch_receipt(self.provider.as_ref(), &self.hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => failures = 0,
                Err(err) => {
                    failures += 1;
                    if failures >= MAX_POLL_FAILURES {
                        return Err(err);
                    }
                    debug!("receipt poll for {} failed ({failures}): {err}", self.hash);
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountsListeners, AccountsSubscription};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::collections::VecDeque;

    struct ScriptedReceipts {
        responses: Mutex<VecDeque<Result<Value, ProviderError>>>,
        listeners: AccountsListeners,
    }

    impl ScriptedReceipts {
        fn new(responses: Vec<Result<Value, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                listeners: AccountsListeners::default(),
            })
        }
    }

    #[async_trait]
    impl WalletProvider for ScriptedReceipts {
        async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }

        fn subscribe_accounts(&self) -> AccountsSubscription {
            self.listeners.subscribe()
        }
    }

    #[tokio::test]
    async fn waits_until_receipt_appears() {
        let provider = ScriptedReceipts::new(vec![
            Ok(Value::Null),
            Ok(Value::Null),
            Ok(json!({ "status": "0x1", "blockNumber": "0x2a" })),
        ]);
        let pending = PendingTransaction::new(TxHash("0xfeed".to_owned()), provider);

        let receipt = pending.wait(Duration::from_millis(1)).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.block_number, Some(42));
    }

    #[tokio::test]
    async fn reports_reverted_receipt() {
        let provider = ScriptedReceipts::new(vec![Ok(json!({ "status": "0x0", "blockNumber": "0x1" }))]);
        let pending = PendingTransaction::new(TxHash("0xfeed".to_owned()), provider);

        let receipt = pending.wait(Duration::from_millis(1)).await.unwrap();
        assert!(!receipt.success);
    }

    #[tokio::test]
    async fn tolerates_a_transient_poll_failure() {
        let provider = ScriptedReceipts::new(vec![
            Err(ProviderError::Transport("reset".to_owned())),
            Ok(json!({ "status": "0x1" })),
        ]);
        let pending = PendingTransaction::new(TxHash("0xfeed".to_owned()), provider);
        assert!(pending.wait(Duration::from_millis(1)).await.unwrap().success);
    }

    #[tokio::test]
    async fn gives_up_after_repeated_failures() {
        let provider = ScriptedReceipts::new(vec![
            Err(ProviderError::Transport("down".to_owned())),
            Err(ProviderError::Transport("down".to_owned())),
            Err(ProviderError::Transport("down".to_owned())),
        ]);
        let pending = PendingTransaction::new(TxHash("0xfeed".to_owned()), provider);
        assert!(matches!(
            pending.wait(Duration::from_millis(1)).await,
            Err(ProviderError::Transport(_))
        ));
    }
}
