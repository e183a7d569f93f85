//! Amount parsing and formatting for operator input and output.

use bitcoin::{Amount, Denomination};

/// e.g. 1000000 -> "1,000,000 sats (0.01000000 BTC)"
pub fn amount_to_display(amount: Amount) -> String {
    format!(
        "{} sats ({:.8} BTC)",
        format_with_commas(amount.to_sat()),
        amount.to_btc()
    )
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}

/// Parse an amount given in BTC, e.g. "0.5"
pub fn parse_btc_amount(s: &str) -> Option<Amount> {
    Amount::from_str_in(s.trim(), Denomination::Bitcoin).ok()
}

/// Parse an amount given in satoshis, allowing `,` and `_` separators
pub fn parse_sats(s: &str) -> Option<Amount> {
    s.trim()
        .replace([',', '_'], "")
        .parse()
        .ok()
        .map(Amount::from_sat)
}

/// Accept either "<n>sat" or a plain BTC figure
pub fn parse_amount(s: &str) -> Option<Amount> {
    let trimmed = s.trim();
    match trimmed.strip_suffix("sat") {
        Some(sats) => parse_sats(sats),
        None => parse_btc_amount(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let display = amount_to_display(Amount::from_sat(1_000_000));
        assert!(display.contains("1,000,000"));
        assert!(display.contains("0.01000000 BTC"));
        assert_eq!(format_with_commas(100), "100");
    }

    #[test]
    fn test_parse_amounts() {
        assert_eq!(parse_btc_amount("0.5"), Some(Amount::from_sat(50_000_000)));
        assert_eq!(parse_btc_amount("0.000000001"), None);
        assert_eq!(parse_sats("1,000,000"), Some(Amount::from_sat(1_000_000)));
        assert_eq!(parse_sats("1_000"), Some(Amount::from_sat(1_000)));
        assert_eq!(parse_sats("invalid"), None);

        assert_eq!(parse_amount("2500sat"), Some(Amount::from_sat(2_500)));
        assert_eq!(parse_amount("1"), Some(Amount::ONE_BTC));
    }
}
