use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Account identity ignores hex casing: a checksummed and a lowercase
    /// rendering of the same address are the same account.
    pub fn matches(&self, other: &WalletAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Fund,
    Withdraw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OperationStatus {
    InFlight,
    Succeeded,
    Failed { kind: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingOperation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub amount: Option<String>,
    pub status: OperationStatus,
    pub tx_hash: Option<String>,
}

impl PendingOperation {
    pub fn in_flight(kind: OperationKind, amount: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            status: OperationStatus::InFlight,
            tx_hash: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == OperationStatus::InFlight
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractViewResponse {
    pub contract_address: String,
    pub minimum_contribution: String,
    pub contract_balance: String,
    pub owner_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStateResponse {
    pub connection_state: ConnectionState,
    pub account_address: Option<String>,
    pub wallet_unavailable: bool,
    pub is_owner: bool,
    pub contract: Option<ContractViewResponse>,
    pub pending_operation: Option<PendingOperation>,
    pub fund_input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub operation: PendingOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub refreshed: bool,
    pub contract: Option<ContractViewResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunderEntry {
    pub address: String,
    pub amount_funded: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundersResponse {
    pub funders: Vec<FunderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractVersionResponse {
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_match_ignores_case() {
        let checksummed = WalletAddress::from("0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9");
        let lower = WalletAddress::from("0xdc64a140aa3e981100a9beca4e685f962f0cf6c9");
        assert!(checksummed.matches(&lower));
        assert_ne!(checksummed, lower);
        assert!(!checksummed.matches(&WalletAddress::from("0xdc64")));
    }

    #[test]
    fn failed_status_serializes_with_tag() {
        let status = OperationStatus::Failed {
            kind: "transaction_rejected".to_owned(),
            reason: "user denied".to_owned(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["kind"], "transaction_rejected");
    }

    #[test]
    fn new_operation_starts_in_flight() {
        let op = PendingOperation::in_flight(OperationKind::Fund, Some("0.5".to_owned()));
        assert!(op.is_in_flight());
        assert_eq!(op.tx_hash, None);
    }
}
