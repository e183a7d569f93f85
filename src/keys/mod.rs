//! Key Derivation Engine
//!
//! Turns a mnemonic into everything the wallet needs:
//!
//! ```text
//! mnemonic ──► entropy ──PBKDF2──► seed ──HMAC-SHA512──► master key
//!                                                          │
//!                 ┌────────────────────────────────────────┼──────────────┐
//!                 ▼                                        ▼              ▼
//!        m/84'/0'/0'/0/0 (single-pass)          m/44'/60'/0'/0/0   account xprvs
//!        wallet id (bech32 / base62)            Ethereum address   (descriptors)
//! ```
//!
//! All derivation here is pure: same mnemonic in, same keys out.

pub mod base62;
pub mod derivation;
pub mod ethereum;
pub mod extended;
pub mod identity;
pub mod mnemonic;

pub use bitcoin::bip32::DerivationPath;
pub use derivation::{derive_private_key, format_path, parse_path, MasterKeyPair};
pub use extended::ExtendedPrivateKey;
pub use identity::{base62_to_bech32, bech32_to_base62, WalletIdentity};
pub use mnemonic::{
    entropy_to_mnemonic, generate_mnemonic, mnemonic_to_entropy, normalize_mnemonic,
    validate_mnemonic, DEFAULT_WORD_COUNT,
};

use thiserror::Error;

/// Key derivation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("derivation error: {0}")]
    Derivation(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Everything derived from one mnemonic
#[derive(Clone)]
pub struct WalletKeys {
    pub mnemonic: String,
    pub master: MasterKeyPair,
    pub identity: WalletIdentity,
}

impl std::fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys")
            .field("master", &self.master)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Derive the master key pair and wallet identity from a mnemonic
pub fn derive_wallet_keys(mnemonic: &str) -> Result<WalletKeys, KeyError> {
    let entropy = mnemonic_to_entropy(mnemonic)?;
    let master = MasterKeyPair::from_entropy(&entropy)?;
    let identity = WalletIdentity::derive(&master)?;

    Ok(WalletKeys {
        mnemonic: normalize_mnemonic(mnemonic),
        master,
        identity,
    })
}

/// Generate a fresh mnemonic and derive its keys
pub fn generate_wallet(word_count: usize) -> Result<WalletKeys, KeyError> {
    let mnemonic = generate_mnemonic(word_count)?;
    derive_wallet_keys(&mnemonic)
}
