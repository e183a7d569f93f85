//! Mnemonic Codec
//!
//! Converts between raw entropy and word sequences over the 2048-word English
//! list, with the standard `entropy_bits / 32` SHA-256 checksum.

use bip39::{Language, Mnemonic};
use rand::RngCore;

use super::KeyError;

/// Accepted mnemonic lengths
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Word count used when generating a fresh wallet
pub const DEFAULT_WORD_COUNT: usize = 24;

/// Encode entropy (16, 20, 24, 28 or 32 bytes) as a mnemonic phrase
pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<String, KeyError> {
    if !matches!(entropy.len(), 16 | 20 | 24 | 28 | 32) {
        return Err(KeyError::Validation(format!(
            "unsupported entropy length: {} bytes",
            entropy.len()
        )));
    }

    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| KeyError::Validation(e.to_string()))?;

    Ok(mnemonic.to_string())
}

/// Decode a mnemonic back to its entropy, verifying the checksum
pub fn mnemonic_to_entropy(mnemonic: &str) -> Result<Vec<u8>, KeyError> {
    let normalized = normalize_mnemonic(mnemonic);
    let word_count = normalized.split(' ').filter(|w| !w.is_empty()).count();

    if !VALID_WORD_COUNTS.contains(&word_count) {
        return Err(KeyError::Validation(format!(
            "invalid word count: {} (expected 12, 15, 18, 21 or 24)",
            word_count
        )));
    }

    let parsed = Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| KeyError::Validation(e.to_string()))?;

    Ok(parsed.to_entropy())
}

/// Check a mnemonic for length, vocabulary and checksum
pub fn validate_mnemonic(mnemonic: &str) -> bool {
    mnemonic_to_entropy(mnemonic).is_ok()
}

/// Generate a new random mnemonic with the given word count
pub fn generate_mnemonic(word_count: usize) -> Result<String, KeyError> {
    if !VALID_WORD_COUNTS.contains(&word_count) {
        return Err(KeyError::Validation(format!(
            "invalid word count: {}",
            word_count
        )));
    }

    let mut entropy = vec![0u8; word_count * 4 / 3];
    rand::thread_rng().fill_bytes(&mut entropy);

    entropy_to_mnemonic(&entropy)
}

/// Lowercase and collapse whitespace
pub fn normalize_mnemonic(mnemonic: &str) -> String {
    mnemonic
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
