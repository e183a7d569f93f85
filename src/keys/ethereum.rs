//! Ethereum account derived from the wallet mnemonic.

use secp256k1::{PublicKey, SecretKey, SECP256K1};
use sha3::{Digest, Keccak256};

/// Account path for the Ethereum key
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// keccak256(uncompressed_pubkey[1..])[12..], EIP-55 checksummed
pub fn eth_address(private_key: &SecretKey) -> String {
    let point = PublicKey::from_secret_key(SECP256K1, private_key).serialize_uncompressed();
    let hash = Keccak256::digest(&point[1..]);

    to_checksum_address(&hex::encode(&hash[12..]))
}

/// 0x-prefixed hex private key
pub fn eth_private_key_hex(private_key: &SecretKey) -> String {
    format!("0x{}", hex::encode(private_key.secret_bytes()))
}

/// Apply EIP-55 mixed-case checksum to a 40-char hex address
pub fn to_checksum_address(address: &str) -> String {
    let lower = strip_hex_prefix(address).to_lowercase();
    let hash = hex::encode(Keccak256::digest(lower.as_bytes()));

    let checksummed: String = lower
        .chars()
        .zip(hash.chars())
        .map(|(c, h)| {
            if c.is_ascii_alphabetic() && h.to_digit(16).unwrap_or(0) >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();

    format!("0x{}", checksummed)
}

pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_vectors() {
        assert_eq!(
            to_checksum_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(
            to_checksum_address("fb6916095ca1df60bb79ce92ce3ea74c37c5d359"),
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
        );
    }

    #[test]
    fn test_address_from_known_key() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let key = SecretKey::from_slice(&bytes).unwrap();

        assert_eq!(
            eth_address(&key),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
        assert_eq!(
            eth_private_key_hex(&key),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_hex_prefix("0xabc"), "abc");
        assert_eq!(strip_hex_prefix("abc"), "abc");
    }
}
