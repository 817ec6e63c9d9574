use alloy_primitives::{U256, utils};

use crate::AbiError;

pub const ETHER_DECIMALS: usize = 18;

/// Whole ether in wei.
pub fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(ETHER_DECIMALS))
}

/// Parses a human decimal ether amount ("1.5", "0.01", "2") into wei.
///
/// Signs, exponents and more than 18 fractional digits are rejected.
pub fn parse_ether(input: &str) -> Result<U256, AbiError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AbiError::InvalidAmount("amount is empty".to_owned()));
    }

    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(AbiError::InvalidAmount(format!("'{trimmed}' has no digits")));
    }

    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(AbiError::InvalidAmount(format!(
            "'{trimmed}' is not a non-negative decimal number"
        )));
    }

    if fraction.len() > ETHER_DECIMALS {
        return Err(AbiError::InvalidAmount(format!(
            "'{trimmed}' has more than {ETHER_DECIMALS} decimal places"
        )));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let fraction = if fraction.is_empty() { "0" } else { fraction };
    utils::parse_ether(&format!("{whole}.{fraction}"))
        .map_err(|err| AbiError::InvalidAmount(format!("'{trimmed}': {err}")))
}

/// Formats wei as a decimal ether string, always keeping one fractional digit
/// ("0.0", "1.5", "5.0").
pub fn format_ether(amount: U256) -> String {
    let full = utils::format_ether(amount);
    let Some((whole, fraction)) = full.split_once('.') else {
        return format!("{full}.0");
    };
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Parses a JSON-RPC hex quantity ("0x1bc16d674ec80000").
pub fn parse_quantity(input: &str) -> Result<U256, AbiError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| AbiError::InvalidHex(format!("quantity '{input}' lacks 0x prefix")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AbiError::InvalidHex(format!("quantity '{input}' is not hex")));
    }
    U256::from_str_radix(digits, 16).map_err(|err| AbiError::InvalidHex(format!("quantity '{input}': {err}")))
}

pub fn to_quantity(value: U256) -> String {
    if value.is_zero() {
        "0x0".to_owned()
    } else {
        format!("0x{value:x}")
    }
}
