use fm_abi::parse_address;
use fm_api_types::WalletAddress;
use thiserror::Error;

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9";
pub use fm_provider::DEFAULT_RPC_URL;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Where the FundMe contract lives and which node serves reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    pub address: WalletAddress,
    pub rpc_url: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: WalletAddress::from(DEFAULT_CONTRACT_ADDRESS),
            rpc_url: DEFAULT_RPC_URL.to_owned(),
        }
    }
}

impl ContractConfig {
    /// Reads `FUNDME_CONTRACT_ADDRESS` and `FUNDME_RPC_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("FUNDME_CONTRACT_ADDRESS") {
            let address = WalletAddress(raw.trim().to_owned());
            parse_address(&address)
                .map_err(|err| ConfigError::invalid("FUNDME_CONTRACT_ADDRESS", &raw, err.to_string()))?;
            config.address = address;
        }

        if let Some(raw) = lookup("FUNDME_RPC_URL") {
            let url = raw.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid("FUNDME_RPC_URL", &raw, "expected an http(s) URL"));
            }
            config.rpc_url = url.to_owned();
        }

        Ok(config)
    }
}
