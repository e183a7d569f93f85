//! Hierarchical Key Derivation
//!
//! Master key generation from mnemonic entropy and two derivation flavours:
//!
//! - single-pass: every level is keyed with the *root* private key and only
//!   the first 32 bytes of each digest are kept (wallet identity, Ethereum key)
//! - chained: the chain code is threaded from level to level (see
//!   [`super::extended`]), which is what descriptor xprvs use

use std::fmt;

use bitcoin::bip32::{self, ChildNumber, DerivationPath};
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use sha2::{Digest, Sha256, Sha512};

use super::KeyError;

/// HMAC key for master key generation
pub const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

const SEED_SALT: &[u8] = b"mnemonic";
const SEED_ITERATIONS: u32 = 2048;
const SEED_LEN: usize = 64;

type HmacSha512 = Hmac<Sha512>;

// =============================================================================
// Paths
// =============================================================================

impl From<bip32::Error> for KeyError {
    fn from(e: bip32::Error) -> Self {
        KeyError::Derivation(format!("invalid derivation path: {}", e))
    }
}

/// Parse `m/84'/0'/0'/0/0` (`'` or `h` for hardened levels)
pub fn parse_path(s: &str) -> Result<DerivationPath, KeyError> {
    Ok(s.trim().parse::<DerivationPath>()?)
}

/// Path with its leading `m`, e.g. `m/84'/0'/0'`
pub fn format_path(path: &DerivationPath) -> String {
    if path.is_master() {
        "m".to_string()
    } else {
        format!("m/{}", path)
    }
}

// =============================================================================
// Master key
// =============================================================================

/// Root secp256k1 key pair plus the chain code from the master digest
#[derive(Clone)]
pub struct MasterKeyPair {
    private_key: SecretKey,
    public_key: PublicKey,
    chain_code: [u8; 32],
}

impl MasterKeyPair {
    /// Build the master key from raw mnemonic entropy
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, KeyError> {
        let seed = entropy_to_seed(entropy);
        Self::from_seed(&seed)
    }

    /// Build the master key from a 64-byte seed
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let digest = hmac_sha512(MASTER_HMAC_KEY, seed)?;

        let private_key = SecretKey::from_slice(&digest[..32])
            .map_err(|e| KeyError::InvalidKey(format!("master key out of range: {}", e)))?;
        let public_key = PublicKey::from_secret_key(SECP256K1, &private_key);

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);

        Ok(Self {
            private_key,
            public_key,
            chain_code,
        })
    }

    pub fn private_key(&self) -> &SecretKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key.secret_bytes())
    }

    /// Compressed SEC1 public key
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    /// First 4 bytes of SHA-256(compressed public key), hex encoded
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.public_key.serialize());
        hex::encode(&hash[..4])
    }
}

impl fmt::Debug for MasterKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyPair")
            .field("public_key", &self.public_key.to_string())
            .finish_non_exhaustive()
    }
}

/// PBKDF2-HMAC-SHA256 over the raw entropy, salt "mnemonic", 2048 rounds
pub fn entropy_to_seed(entropy: &[u8]) -> [u8; SEED_LEN] {
    let mut seed = [0u8; SEED_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(entropy, SEED_SALT, SEED_ITERATIONS, &mut seed);
    seed
}

// =============================================================================
// Derivation
// =============================================================================

/// Single-pass derivation keyed by the root private key at every level
pub fn derive_private_key(root: &SecretKey, path: &DerivationPath) -> Result<SecretKey, KeyError> {
    let root_bytes = root.secret_bytes();
    let mut key = *root;

    for child in path {
        let data = child_message(&key, *child);
        let digest = hmac_sha512(&root_bytes, &data)?;
        key = SecretKey::from_slice(&digest[..32]).map_err(|_| {
            KeyError::Derivation(format!(
                "invalid child key at {} of {}",
                child,
                format_path(path)
            ))
        })?;
    }

    Ok(key)
}

/// 37-byte HMAC message for one level
///
/// Hardened: `0x00 || key || index`. Normal: `compressed_pubkey || index`.
/// The index is big-endian, hardened indices include the 2^31 offset.
pub(crate) fn child_message(key: &SecretKey, child: ChildNumber) -> [u8; 37] {
    let mut data = [0u8; 37];

    if child.is_hardened() {
        data[1..33].copy_from_slice(&key.secret_bytes());
    } else {
        let public_key = PublicKey::from_secret_key(SECP256K1, key);
        data[..33].copy_from_slice(&public_key.serialize());
    }
    data[33..].copy_from_slice(&u32::from(child).to_be_bytes());

    data
}

pub(crate) fn hmac_sha512(key: &[u8], message: &[u8]) -> Result<[u8; 64], KeyError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| KeyError::Derivation(format!("hmac init failed: {}", e)))?;
    mac.update(message);

    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
