//! Bridge payload carried in the data output.
//!
//! Format: `wrp:<walletId>-<returnAddress without 0x>`, hex encoded.

use crate::keys::ethereum::strip_hex_prefix;

pub const PAYLOAD_PREFIX: &str = "wrp:";

/// Plain-text payload
pub fn redemption_payload(wallet_id: &str, return_address: &str) -> String {
    format!(
        "{}{}-{}",
        PAYLOAD_PREFIX,
        wallet_id,
        strip_hex_prefix(return_address)
    )
}

/// Hex form for the `data` output
pub fn encode_payload(wallet_id: &str, return_address: &str) -> String {
    hex::encode(redemption_payload(wallet_id, return_address))
}

/// Parse a data output back into `(wallet_id, return_address)`
///
/// The returned address is 0x-prefixed.
pub fn decode_payload(data_hex: &str) -> Option<(String, String)> {
    let bytes = hex::decode(data_hex).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let body = text.strip_prefix(PAYLOAD_PREFIX)?;

    // Wallet ids are base62, so the first '-' ends them
    let (wallet_id, address) = body.split_once('-')?;
    if wallet_id.is_empty() || address.is_empty() {
        return None;
    }

    Some((wallet_id.to_string(), format!("0x{}", address)))
}
