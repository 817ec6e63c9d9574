//! Typed access to the deployed FundMe contract.
//!
//! [`ContractGateway`] is the seam the session controller talks through;
//! [`FundMeGateway`] implements it over any [`WalletProvider`].

mod config;

pub use config::{ConfigError, ContractConfig, DEFAULT_CONTRACT_ADDRESS, DEFAULT_RPC_URL};

use async_trait::async_trait;
use fm_abi::{IFundMe, RevertReason, SolCall, U256, decode_revert, parse_address, to_checksum_address, to_hex_data};
use fm_api_types::WalletAddress;
use fm_provider::{
    PendingTransaction, ProviderError, Receipt, Signer, TransactionRequest, TxHash, WalletProvider, from_hex_value,
    get_balance,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("contract read failed: {0}")]
    Read(String),

    #[error("request rejected in wallet: {0}")]
    Rejected(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("execution reverted: {0}")]
    Reverted(RevertReason),

    #[error(transparent)]
    Provider(ProviderError),
}

impl GatewayError {
    /// Classifies a failed estimate or send.
    pub fn from_write(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            return Self::Rejected(err.to_string());
        }
        if err.is_insufficient_funds() {
            return Self::InsufficientFunds(err.to_string());
        }
        if let Some(data) = err.revert_data() {
            return Self::Reverted(decode_revert(&data));
        }
        if err.is_revert() {
            return Self::Reverted(reason_from_message(&err));
        }
        Self::Provider(err)
    }
}

/// Nodes that drop revert data still tend to append the reason to the
/// message: `execution reverted: You need to spend more ETH!`.
fn reason_from_message(err: &ProviderError) -> RevertReason {
    let ProviderError::Rpc { message, .. } = err else {
        return RevertReason::Unknown(String::new());
    };
    match message.split_once("reverted: ") {
        Some((_, reason)) if !reason.trim().is_empty() => RevertReason::Message(reason.trim().to_owned()),
        _ => RevertReason::Unknown(String::new()),
    }
}

#[async_trait]
pub trait ContractGateway: Send + Sync {
    fn contract_address(&self) -> &WalletAddress;

    /// `MINIMUM_USD()`, 18-decimal USD.
    async fn read_minimum_contribution(&self) -> Result<U256, GatewayError>;
    /// Owner address in EIP-55 form.
    async fn read_owner(&self) -> Result<WalletAddress, GatewayError>;
    /// Native balance of any account, the contract included.
    async fn read_balance(&self, address: &WalletAddress) -> Result<U256, GatewayError>;
    async fn read_version(&self) -> Result<U256, GatewayError>;
    async fn read_amount_funded(&self, funder: &WalletAddress) -> Result<U256, GatewayError>;
    /// `getFunders(index)`; `None` once the index runs past the array.
    async fn read_funder(&self, index: u64) -> Result<Option<WalletAddress>, GatewayError>;

    async fn submit_fund(&self, signer: &dyn Signer, amount: U256) -> Result<TxHash, GatewayError>;
    async fn submit_withdraw(&self, signer: &dyn Signer) -> Result<TxHash, GatewayError>;

    /// Blocks until the transaction is mined. A mined-but-reverted receipt is
    /// an error.
    async fn wait_for_confirmation(&self, tx: &TxHash, poll_interval: Duration) -> Result<Receipt, GatewayError>;
}

pub struct FundMeGateway {
    address: WalletAddress,
    provider: Arc<dyn WalletProvider>,
}

impl FundMeGateway {
    pub fn new(address: WalletAddress, provider: Arc<dyn WalletProvider>) -> Self {
        Self { address, provider }
    }

    pub fn from_config(config: &ContractConfig, provider: Arc<dyn WalletProvider>) -> Self {
        Self::new(config.address.clone(), provider)
    }

    async fn call<C: SolCall>(&self, call: &C) -> Result<Vec<u8>, ProviderError> {
        let params = json!([{ "to": self.address.as_str(), "data": to_hex_data(&call.abi_encode()) }, "latest"]);
        debug!("eth_call {} on {}", C::SIGNATURE, self.address);
        let value = self.provider.request("eth_call", params).await?;
        from_hex_value(&value)
    }

    async fn read<C: SolCall>(&self, call: C) -> Result<C::Return, GatewayError> {
        let data = self.call(&call).await.map_err(read_error::<C>)?;
        C::abi_decode_returns(&data).map_err(read_error::<C>)
    }

    async fn submit(&self, signer: &dyn Signer, request: TransactionRequest) -> Result<TxHash, GatewayError> {
        self.provider
            .request("eth_estimateGas", json!([request.to_json(signer.address())]))
            .await
            .map_err(GatewayError::from_write)?;
        let hash = signer
            .send_transaction(&request)
            .await
            .map_err(GatewayError::from_write)?;
        debug!("submitted {hash} from {}", signer.address());
        Ok(hash)
    }
}

fn read_error<C: SolCall>(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Read(format!("{}: {err}", C::SIGNATURE))
}

#[async_trait]
impl ContractGateway for FundMeGateway {
    fn contract_address(&self) -> &WalletAddress {
        &self.address
    }

    async fn read_minimum_contribution(&self) -> Result<U256, GatewayError> {
        self.read(IFundMe::MINIMUM_USDCall {}).await
    }

    async fn read_owner(&self) -> Result<WalletAddress, GatewayError> {
        let owner = self.read(IFundMe::getOwnerCall {}).await?;
        Ok(to_checksum_address(&owner))
    }

    async fn read_balance(&self, address: &WalletAddress) -> Result<U256, GatewayError> {
        get_balance(self.provider.as_ref(), address)
            .await
            .map_err(|err| GatewayError::Read(format!("eth_getBalance {address}: {err}")))
    }

    async fn read_version(&self) -> Result<U256, GatewayError> {
        self.read(IFundMe::getVersionCall {}).await
    }

    async fn read_amount_funded(&self, funder: &WalletAddress) -> Result<U256, GatewayError> {
        let funding_address = parse_address(funder).map_err(read_error::<IFundMe::getAddressToAmountFundedCall>)?;
        self.read(IFundMe::getAddressToAmountFundedCall {
            fundingAddress: funding_address,
        })
        .await
    }

    async fn read_funder(&self, index: u64) -> Result<Option<WalletAddress>, GatewayError> {
        let call = IFundMe::getFundersCall { index: U256::from(index) };
        match self.call(&call).await {
            Ok(data) => IFundMe::getFundersCall::abi_decode_returns(&data)
                .map(|funder| Some(to_checksum_address(&funder)))
                .map_err(read_error::<IFundMe::getFundersCall>),
            Err(err) if err.is_revert() => Ok(None),
            Err(err) => Err(read_error::<IFundMe::getFundersCall>(err)),
        }
    }

    async fn submit_fund(&self, signer: &dyn Signer, amount: U256) -> Result<TxHash, GatewayError> {
        let request = TransactionRequest {
            to: self.address.clone(),
            value: amount,
            data: IFundMe::fundCall {}.abi_encode(),
        };
        self.submit(signer, request).await
    }

    async fn submit_withdraw(&self, signer: &dyn Signer) -> Result<TxHash, GatewayError> {
        let request = TransactionRequest {
            to: self.address.clone(),
            value: U256::ZERO,
            data: IFundMe::withdrawCall {}.abi_encode(),
        };
        self.submit(signer, request).await
    }

    async fn wait_for_confirmation(&self, tx: &TxHash, poll_interval: Duration) -> Result<Receipt, GatewayError> {
        let pending = PendingTransaction::new(tx.clone(), Arc::clone(&self.provider));
        let receipt = pending.wait(poll_interval).await.map_err(GatewayError::Provider)?;
        if !receipt.success {
            return Err(GatewayError::Reverted(RevertReason::Unknown(String::new())));
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fm_abi::ether;
    use fm_devchain::{DevChain, DevChainConfig};
    use fm_provider::{EXECUTION_REVERTED, ProviderSigner, USER_REJECTED};

    const POLL: Duration = Duration::from_millis(5);

    fn setup() -> (Arc<DevChain>, FundMeGateway) {
        let chain = Arc::new(DevChain::default());
        chain.authorize(chain.wallet_accounts());
        let gateway = FundMeGateway::new(chain.contract_address(), chain.clone());
        (chain, gateway)
    }

    fn signer_for(chain: &Arc<DevChain>, address: WalletAddress) -> ProviderSigner {
        ProviderSigner::new(chain.clone(), address)
    }

    #[tokio::test]
    async fn reads_contract_views() {
        let (chain, gateway) = setup();
        assert_eq!(gateway.read_minimum_contribution().await.unwrap(), ether(5));
        assert_eq!(gateway.read_owner().await.unwrap(), chain.owner());
        assert_eq!(gateway.read_version().await.unwrap(), U256::from(4u64));
        assert_eq!(gateway.read_balance(&chain.contract_address()).await.unwrap(), U256::ZERO);
        assert_eq!(gateway.read_funder(0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reads_uint256_values_beyond_128_bits() {
        let huge = U256::from(u128::MAX) * U256::from(7u64);
        let chain = Arc::new(DevChain::new(DevChainConfig {
            minimum_usd: huge,
            version: U256::MAX,
            ..DevChainConfig::default()
        }));
        chain.set_balance(&chain.contract_address(), huge);
        let gateway = FundMeGateway::new(chain.contract_address(), chain.clone());

        assert_eq!(gateway.read_minimum_contribution().await.unwrap(), huge);
        assert_eq!(gateway.read_version().await.unwrap(), U256::MAX);
        assert_eq!(gateway.read_balance(&chain.contract_address()).await.unwrap(), huge);
    }

    #[tokio::test]
    async fn malformed_funder_address_is_a_read_error() {
        let (_chain, gateway) = setup();
        let err = gateway.read_amount_funded(&WalletAddress::from("0x1234")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Read(ref m) if m.starts_with("getAddressToAmountFunded(address)")));
    }

    #[tokio::test]
    async fn fund_confirms_and_updates_views() {
        let (chain, gateway) = setup();
        let funder = chain.wallet_accounts()[1].clone();
        let signer = signer_for(&chain, funder.clone());
        let amount = ether(1);

        let hash = gateway.submit_fund(&signer, amount).await.unwrap();
        let receipt = gateway.wait_for_confirmation(&hash, POLL).await.unwrap();
        assert!(receipt.success);

        assert_eq!(gateway.read_balance(&chain.contract_address()).await.unwrap(), amount);
        assert_eq!(gateway.read_amount_funded(&funder).await.unwrap(), amount);
        assert!(gateway.read_funder(0).await.unwrap().unwrap().matches(&funder));
        assert_eq!(gateway.read_funder(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fund_below_minimum_is_a_classified_revert() {
        let (chain, gateway) = setup();
        let signer = signer_for(&chain, chain.wallet_accounts()[1].clone());

        let err = gateway.submit_fund(&signer, U256::from(1_000u64)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Reverted(RevertReason::Message(ref m)) if m == "You need to spend more ETH!"));
        assert_eq!(chain.request_count("eth_sendTransaction"), 0);
    }

    #[tokio::test]
    async fn non_owner_withdraw_reverts_with_not_owner() {
        let (chain, gateway) = setup();
        let signer = signer_for(&chain, chain.wallet_accounts()[1].clone());

        let err = gateway.submit_withdraw(&signer).await.unwrap_err();
        assert!(matches!(err, GatewayError::Reverted(RevertReason::NotOwner)));
    }

    #[tokio::test]
    async fn declined_signature_is_rejected() {
        let (chain, gateway) = setup();
        chain.set_reject_signing(true);
        let signer = signer_for(&chain, chain.owner());

        let err = gateway.submit_withdraw(&signer).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
    }

    #[tokio::test]
    async fn failing_node_is_a_read_error() {
        let (chain, gateway) = setup();
        chain.set_fail_reads(true);
        assert!(matches!(gateway.read_owner().await, Err(GatewayError::Read(_))));
        assert!(matches!(gateway.read_funder(0).await, Err(GatewayError::Read(_))));
    }

    #[test]
    fn classifies_write_failures() {
        assert!(matches!(
            GatewayError::from_write(ProviderError::rpc(USER_REJECTED, "denied")),
            GatewayError::Rejected(_)
        ));
        assert!(matches!(
            GatewayError::from_write(ProviderError::rpc(-32000, "insufficient funds for gas * price + value")),
            GatewayError::InsufficientFunds(_)
        ));
        assert!(matches!(
            GatewayError::from_write(ProviderError::rpc(EXECUTION_REVERTED, "execution reverted: below minimum")),
            GatewayError::Reverted(RevertReason::Message(ref m)) if m == "below minimum"
        ));
        assert!(matches!(
            GatewayError::from_write(ProviderError::Transport("refused".to_owned())),
            GatewayError::Provider(_)
        ));
    }
}
