//! Wallet Identity
//!
//! The wallet id is a short textual handle for the bridge payload. It is
//! built from the key at [`WALLET_ID_PATH`]:
//!
//! ```text
//! pubkey ──HASH160──► 20 bytes ──bech32("bc")──► bc1…  ──base62──► B…
//! ```
//!
//! Both forms decode back to the same 20-byte payload.

use bech32::{Bech32, Hrp};
use bitcoin::hashes::{hash160, Hash};
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};

use super::derivation::{derive_private_key, parse_path, MasterKeyPair};
use super::ethereum::{eth_address, eth_private_key_hex, ETH_DERIVATION_PATH};
use super::{base62, KeyError};

/// Path of the key whose hash becomes the wallet id
pub const WALLET_ID_PATH: &str = "m/84'/0'/0'/0/0";

/// Prefix marking the base62 form
pub const WALLET_ID_MARKER: char = 'B';

/// Human-readable part of the bech32 form
pub const WALLET_ID_HRP: &str = "bc";

const PAYLOAD_LEN: usize = 20;

/// Public identity derived from a wallet mnemonic
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletIdentity {
    pub wallet_id: String,
    pub eth_address: String,
    #[serde(skip)]
    pub eth_private_key: String,
}

impl WalletIdentity {
    pub fn derive(master: &MasterKeyPair) -> Result<Self, KeyError> {
        let eth_path = parse_path(ETH_DERIVATION_PATH)?;
        let eth_key = derive_private_key(master.private_key(), &eth_path)?;

        let id_path = parse_path(WALLET_ID_PATH)?;
        let id_key = derive_private_key(master.private_key(), &id_path)?;

        let address = wallet_id_address(&id_key)?;

        Ok(Self {
            wallet_id: bech32_to_base62(&address)?,
            eth_address: eth_address(&eth_key),
            eth_private_key: eth_private_key_hex(&eth_key),
        })
    }
}

impl std::fmt::Debug for WalletIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletIdentity")
            .field("wallet_id", &self.wallet_id)
            .field("eth_address", &self.eth_address)
            .finish_non_exhaustive()
    }
}

/// bech32("bc", HASH160(compressed pubkey))
pub fn wallet_id_address(key: &SecretKey) -> Result<String, KeyError> {
    let public_key = PublicKey::from_secret_key(SECP256K1, key);
    let hash = hash160::Hash::hash(&public_key.serialize());
    encode_payload(hash.as_byte_array())
}

/// `bc1…` to `B…`
pub fn bech32_to_base62(address: &str) -> Result<String, KeyError> {
    let (_, payload) = bech32::decode(address)
        .map_err(|e| KeyError::Encoding(format!("invalid bech32 '{}': {}", address, e)))?;

    Ok(format!("{}{}", WALLET_ID_MARKER, base62::encode(&payload)))
}

/// `B…` to `bc1…`
pub fn base62_to_bech32(wallet_id: &str) -> Result<String, KeyError> {
    let digits = wallet_id.strip_prefix(WALLET_ID_MARKER).ok_or_else(|| {
        KeyError::Encoding(format!(
            "wallet id must start with '{}': {}",
            WALLET_ID_MARKER, wallet_id
        ))
    })?;

    let payload = base62::decode(digits, PAYLOAD_LEN)?;
    encode_payload(&payload)
}

fn encode_payload(payload: &[u8]) -> Result<String, KeyError> {
    let hrp = Hrp::parse(WALLET_ID_HRP)
        .map_err(|e| KeyError::Encoding(format!("invalid hrp: {}", e)))?;

    bech32::encode::<Bech32>(hrp, payload)
        .map_err(|e| KeyError::Encoding(format!("bech32 encode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SecretKey {
        SecretKey::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_wallet_id_round_trip() {
        for byte in [1u8, 2, 0x33, 0x7f] {
            let address = wallet_id_address(&key(byte)).unwrap();
            assert!(address.starts_with("bc1"));

            let wallet_id = bech32_to_base62(&address).unwrap();
            assert!(wallet_id.starts_with('B'));
            assert_eq!(base62_to_bech32(&wallet_id).unwrap(), address);
        }
    }

    #[test]
    fn test_payload_with_leading_zeros() {
        let mut payload = [0u8; 20];
        payload[19] = 9;
        let address = encode_payload(&payload).unwrap();

        let wallet_id = bech32_to_base62(&address).unwrap();
        assert_eq!(wallet_id, "B9");
        assert_eq!(base62_to_bech32(&wallet_id).unwrap(), address);
    }

    #[test]
    fn test_rejects_bad_ids() {
        assert!(base62_to_bech32("X123").is_err());
        assert!(base62_to_bech32("B!!").is_err());
        assert!(bech32_to_base62("not-bech32").is_err());
    }

    #[test]
    fn test_identity_is_deterministic() {
        let master = MasterKeyPair::from_entropy(&[3u8; 16]).unwrap();
        let a = WalletIdentity::derive(&master).unwrap();
        let b = WalletIdentity::derive(&master).unwrap();

        assert_eq!(a, b);
        assert!(a.eth_address.starts_with("0x"));
        assert_eq!(a.eth_address.len(), 42);
        assert_eq!(a.eth_private_key.len(), 66);
    }

    #[test]
    fn test_identity_serializes_without_private_key() {
        let master = MasterKeyPair::from_entropy(&[3u8; 16]).unwrap();
        let identity = WalletIdentity::derive(&master).unwrap();

        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("walletId").is_some());
        assert!(json.get("ethAddress").is_some());
        assert!(json.get("ethPrivateKey").is_none());
    }
}
