//! Extended private keys (xprv) for descriptor export.

use std::fmt;

use bitcoin::bip32::DerivationPath;
use secp256k1::SecretKey;

use super::derivation::{child_message, format_path, hmac_sha512, MasterKeyPair};
use super::KeyError;

/// Mainnet private extended key version bytes
pub const XPRV_VERSION: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];

const SERIALIZED_LEN: usize = 78;

/// Private key and chain code at some depth below the master
#[derive(Clone)]
pub struct ExtendedPrivateKey {
    key: SecretKey,
    chain_code: [u8; 32],
    depth: u8,
}

impl ExtendedPrivateKey {
    /// Derive along `path`, threading the chain code level by level
    pub fn derive(master: &MasterKeyPair, path: &DerivationPath) -> Result<Self, KeyError> {
        let depth = u8::try_from(path.len())
            .map_err(|_| KeyError::Derivation(format!("path too deep: {}", format_path(path))))?;

        let mut key = *master.private_key();
        let mut chain_code = *master.chain_code();

        for child in path {
            let data = child_message(&key, *child);
            let digest = hmac_sha512(&chain_code, &data)?;

            key = SecretKey::from_slice(&digest[..32]).map_err(|_| {
                KeyError::Derivation(format!(
                    "invalid child key at {} of {}",
                    child,
                    format_path(path)
                ))
            })?;
            chain_code.copy_from_slice(&digest[32..]);
        }

        Ok(Self {
            key,
            chain_code,
            depth,
        })
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn private_key(&self) -> &SecretKey {
        &self.key
    }

    /// version(4) || depth(1) || parent fingerprint(4) || child number(4)
    /// || chain code(32) || 0x00 || key(32)
    ///
    /// Parent fingerprint and child number are left zeroed.
    pub fn serialize(&self) -> [u8; SERIALIZED_LEN] {
        let mut out = [0u8; SERIALIZED_LEN];
        out[..4].copy_from_slice(&XPRV_VERSION);
        out[4] = self.depth;
        out[13..45].copy_from_slice(&self.chain_code);
        out[46..].copy_from_slice(&self.key.secret_bytes());
        out
    }

    /// Base58Check encoding
    pub fn to_base58(&self) -> String {
        bitcoin::base58::encode_check(&self.serialize())
    }
}

impl fmt::Display for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
