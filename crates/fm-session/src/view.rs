use fm_abi::{U256, format_ether};
use fm_api_types::{
    ConnectionState, ContractViewResponse, FunderEntry, PendingOperation, SessionStateResponse, WalletAddress,
};

/// Last successfully read contract state. Replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractView {
    pub contract_address: WalletAddress,
    /// 18-decimal USD threshold enforced by the contract.
    pub minimum_contribution: U256,
    pub contract_balance: U256,
    pub owner_address: WalletAddress,
}

impl ContractView {
    pub fn to_response(&self) -> ContractViewResponse {
        ContractViewResponse {
            contract_address: self.contract_address.to_string(),
            minimum_contribution: format_ether(self.minimum_contribution),
            contract_balance: format_ether(self.contract_balance),
            owner_address: self.owner_address.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub connection_state: ConnectionState,
    /// Set exactly when `connection_state` is `Connected`.
    pub account_address: Option<WalletAddress>,
    pub wallet_unavailable: bool,
    pub contract_view: Option<ContractView>,
    pub is_owner: bool,
    pub pending_operation: Option<PendingOperation>,
    pub fund_input: String,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn is_busy(&self) -> bool {
        self.pending_operation
            .as_ref()
            .is_some_and(PendingOperation::is_in_flight)
    }

    pub(crate) fn derive_owner_flag(&mut self) {
        self.is_owner = match (&self.account_address, &self.contract_view) {
            (Some(account), Some(view)) => account.matches(&view.owner_address),
            _ => false,
        };
    }

    pub fn to_response(&self) -> SessionStateResponse {
        SessionStateResponse {
            connection_state: self.connection_state,
            account_address: self.account_address.as_ref().map(ToString::to_string),
            wallet_unavailable: self.wallet_unavailable,
            is_owner: self.is_owner,
            contract: self.contract_view.as_ref().map(ContractView::to_response),
            pending_operation: self.pending_operation.clone(),
            fund_input: self.fund_input.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunderRecord {
    pub address: WalletAddress,
    pub amount_funded: U256,
}

impl FunderRecord {
    pub fn to_entry(&self) -> FunderEntry {
        FunderEntry {
            address: self.address.to_string(),
            amount_funded: format_ether(self.amount_funded),
        }
    }
}
