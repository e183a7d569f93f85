//! Base62 codec (`0-9A-Za-z`) over big-endian byte strings.

use super::KeyError;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode bytes as a big-endian base62 number. Leading zero bytes vanish.
pub fn encode(bytes: &[u8]) -> String {
    // little-endian base62 digits
    let mut digits: Vec<u8> = Vec::new();

    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 62) as u8;
            carry /= 62;
        }
        while carry > 0 {
            digits.push((carry % 62) as u8);
            carry /= 62;
        }
    }

    if digits.is_empty() {
        return "0".to_string();
    }

    digits
        .iter()
        .rev()
        .map(|&d| ALPHABET[d as usize] as char)
        .collect()
}

/// Decode into exactly `width` big-endian bytes, left-padding with zeros
pub fn decode(encoded: &str, width: usize) -> Result<Vec<u8>, KeyError> {
    if encoded.is_empty() {
        return Err(KeyError::Encoding("empty base62 string".to_string()));
    }

    // little-endian base256 bytes
    let mut bytes: Vec<u8> = Vec::new();

    for c in encoded.chars() {
        let value = digit_value(c)
            .ok_or_else(|| KeyError::Encoding(format!("invalid base62 character: {:?}", c)))?;

        let mut carry = value;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 62;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    if bytes.len() > width {
        return Err(KeyError::Encoding(format!(
            "base62 value does not fit in {} bytes",
            width
        )));
    }

    bytes.resize(width, 0);
    bytes.reverse();
    Ok(bytes)
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        'a'..='z' => Some(c as u32 - 'a' as u32 + 36),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values() {
        assert_eq!(encode(&[0]), "0");
        assert_eq!(encode(&[61]), "z");
        assert_eq!(encode(&[62]), "10");
        assert_eq!(encode(&[1, 0]), "48");
        assert_eq!(decode("48", 2).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_leading_zero_bytes_restored_by_width() {
        let payload = [0u8, 0, 0, 5, 200];
        let encoded = encode(&payload);
        assert_eq!(decode(&encoded, 5).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_full_width_payload() {
        let payload = [0xffu8; 20];
        let encoded = encode(&payload);
        assert_eq!(decode(&encoded, 20).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode("", 20), Err(KeyError::Encoding(_))));
        assert!(matches!(decode("abc-", 20), Err(KeyError::Encoding(_))));
        assert!(matches!(decode("zzzz", 1), Err(KeyError::Encoding(_))));
    }
}
