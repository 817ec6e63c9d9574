//! The FundMe contract ABI and the encoding helpers around it.
//!
//! The contract surface is declared once with `sol!` in [`IFundMe`]. Amounts
//! are `U256` and addresses cross the ABI boundary as `Address`. The rest is
//! ether unit conversion, hex quantities and revert payload decoding.

mod codec;
mod fundme;
mod revert;
mod units;

pub use alloy_primitives::{Address, B256, U256, keccak256};
pub use alloy_sol_types::{Panic, Revert, SolCall, SolError, SolInterface, SolValue};
pub use codec::{from_hex_data, parse_address, to_checksum_address, to_hex_data};
pub use fundme::IFundMe;
pub use revert::{RevertReason, decode_revert};
pub use units::{ETHER_DECIMALS, ether, format_ether, parse_ether, parse_quantity, to_quantity};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hex data: {0}")]
    InvalidHex(String),

    #[error("abi decode failed: {0}")]
    Decode(String),
}

impl From<alloy_sol_types::Error> for AbiError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
