//! Hex helpers for attestation request fields

use sha3::{Digest, Keccak256};

use crate::error::{AttestationError, Result};

/// Width of a 32-byte word in hex digits
const WORD_HEX_LEN: usize = 64;

pub fn pad_0x(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{value}")
    }
}

pub fn unpad_0x(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

/// UTF-8 bytes of `name`, hex encoded and right-padded to a 32-byte word.
///
/// Used for `sourceId` and `attestationType`.
pub fn to_utf8_hex_string(name: &str) -> String {
    let mut encoded = hex::encode(name.as_bytes());
    while encoded.len() < WORD_HEX_LEN {
        encoded.push('0');
    }
    format!("0x{encoded}")
}

/// Keccak-256 of the UTF-8 bytes of `text`, 0x-prefixed
pub fn keccak256_text(text: &str) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(text.as_bytes())))
}

/// Left-pad a hex value to a 32-byte word.
pub fn pad_to_64_hex(value: &str) -> Result<String> {
    let digits = unpad_0x(value);
    if digits.len() > WORD_HEX_LEN || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AttestationError::InvalidHex(value.to_string()));
    }
    Ok(format!("0x{digits:0>64}"))
}

/// 32 zero bytes, used as an empty source-address root
pub fn zero_bytes32() -> String {
    format!("0x{}", "00".repeat(32))
}
