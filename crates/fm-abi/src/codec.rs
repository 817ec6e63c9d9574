use alloy_primitives::{Address, hex};
use fm_api_types::WalletAddress;

use crate::AbiError;

/// Requires a `0x` prefix; letter case is not checked against EIP-55.
pub fn parse_address(address: &WalletAddress) -> Result<Address, AbiError> {
    let digits = address
        .as_str()
        .strip_prefix("0x")
        .or_else(|| address.as_str().strip_prefix("0X"))
        .ok_or_else(|| AbiError::InvalidAddress(format!("'{address}' lacks 0x prefix")))?;
    digits
        .parse::<Address>()
        .map_err(|err| AbiError::InvalidAddress(format!("'{address}': {err}")))
}

/// EIP-55 mixed-case rendering.
pub fn to_checksum_address(address: &Address) -> WalletAddress {
    WalletAddress(address.to_checksum(None))
}

pub fn to_hex_data(bytes: &[u8]) -> String {
    hex::encode_prefixed(bytes)
}

pub fn from_hex_data(input: &str) -> Result<Vec<u8>, AbiError> {
    hex::decode(input).map_err(|err| AbiError::InvalidHex(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksums_known_addresses() {
        let contract = WalletAddress::from("0xdc64a140aa3e981100a9beca4e685f962f0cf6c9");
        assert_eq!(
            to_checksum_address(&parse_address(&contract).unwrap()).0,
            "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9"
        );

        let shouting = WalletAddress::from("0XF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266");
        assert_eq!(
            to_checksum_address(&parse_address(&shouting).unwrap()).0,
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(parse_address(&WalletAddress::from("0xABC")).is_err());
        assert!(parse_address(&WalletAddress::from("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")).is_err());
        assert!(parse_address(&WalletAddress::from("0xzz9fd6e51aad88f6f4ce6ab8827279cfffb92266")).is_err());
    }

    #[test]
    fn hex_data_round_trips_with_prefix() {
        assert_eq!(to_hex_data(&[0xb6, 0x0d, 0x42, 0x88]), "0xb60d4288");
        assert_eq!(from_hex_data("0xb60d4288").unwrap(), vec![0xb6, 0x0d, 0x42, 0x88]);
        assert_eq!(from_hex_data("0x").unwrap(), Vec::<u8>::new());
        assert!(from_hex_data("0xabc").is_err());
    }
}
