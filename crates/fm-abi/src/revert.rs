use std::fmt;

use alloy_primitives::hex;
use alloy_sol_types::{Panic as PanicError, Revert, SolError};

use crate::fundme::IFundMe;

/// Why a contract call reverted, as far as the revert payload tells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// `FundMe__NotOwner()`: a non-owner called `withdraw`.
    NotOwner,
    /// `Error(string)` from a failed `require`.
    Message(String),
    /// `Panic(uint256)`, e.g. 0x32 for an out-of-bounds array read.
    Panic(u64),
    /// Anything else; holds the raw payload as hex (possibly empty).
    Unknown(String),
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner => f.write_str("caller is not the contract owner"),
            Self::Message(message) => f.write_str(message),
            Self::Panic(code) => write!(f, "contract panicked with code {code:#x}"),
            Self::Unknown(data) if data.is_empty() => f.write_str("execution reverted without a reason"),
            Self::Unknown(data) => write!(f, "execution reverted with data 0x{data}"),
        }
    }
}

/// Panic codes outside `u64` are kept as raw data.
pub fn decode_revert(data: &[u8]) -> RevertReason {
    if IFundMe::FundMe__NotOwner::abi_decode(data).is_ok() {
        return RevertReason::NotOwner;
    }
    if let Ok(revert) = Revert::abi_decode(data) {
        return RevertReason::Message(revert.reason);
    }
    if let Ok(panic) = PanicError::abi_decode(data) {
        if let Ok(code) = u64::try_from(panic.code) {
            return RevertReason::Panic(code);
        }
    }
    RevertReason::Unknown(hex::encode(data))
}
