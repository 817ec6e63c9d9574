use fm_abi::RevertReason;
use fm_contract::GatewayError;
use fm_provider::ProviderError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("no wallet provider is available")]
    WalletUnavailable,

    #[error("wallet authorization rejected: {0}")]
    AuthorizationRejected(String),

    #[error("no wallet account is connected")]
    NotConnected,

    #[error("connected account is not the contract owner")]
    NotOwner,

    #[error("another operation is already in progress")]
    Busy,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient wallet balance: {0}")]
    InsufficientWalletBalance(String),

    #[error("transaction rejected in wallet: {0}")]
    TransactionRejected(String),

    #[error("execution reverted: {0}")]
    ExecutionReverted(RevertReason),

    #[error("read failed: {0}")]
    ReadFailure(String),

    #[error("transaction {tx_hash} not confirmed within {after:?}")]
    ConfirmationTimeout { tx_hash: String, after: Duration },

    #[error(transparent)]
    Provider(ProviderError),
}

impl SessionError {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WalletUnavailable => "wallet_unavailable",
            Self::AuthorizationRejected(_) => "authorization_rejected",
            Self::NotConnected => "not_connected",
            Self::NotOwner => "not_owner",
            Self::Busy => "busy",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientWalletBalance(_) => "insufficient_wallet_balance",
            Self::TransactionRejected(_) => "transaction_rejected",
            Self::ExecutionReverted(_) => "execution_reverted",
            Self::ReadFailure(_) => "read_failure",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::Provider(_) => "provider",
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Read(message) => Self::ReadFailure(message),
            GatewayError::Rejected(message) => Self::TransactionRejected(message),
            GatewayError::InsufficientFunds(message) => Self::InsufficientWalletBalance(message),
            GatewayError::Reverted(reason) => Self::ExecutionReverted(reason),
            GatewayError::Provider(err) => Self::Provider(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_failures_map_onto_session_taxonomy() {
        let err = SessionError::from(GatewayError::Reverted(RevertReason::NotOwner));
        assert_eq!(err.kind(), "execution_reverted");
        assert_eq!(err.to_string(), "execution reverted: caller is not the contract owner");

        let err = SessionError::from(GatewayError::Rejected("user denied".to_owned()));
        assert_eq!(err.kind(), "transaction_rejected");
    }
}
