//! Key normalization for consistent matching across stores and sinks.
//!
//! Prevents duplicate rows caused by case differences (0xABC vs 0xabc),
//! spreadsheet quote prefixes ('0x123), and symbol case variation. Also
//! formats prices in fixed notation so sinks never see scientific notation.

/// Normalize a token address: strip whitespace and a leading quote, lowercase.
pub fn normalize_address(address: &str) -> String {
    let addr = address.trim();
    let addr = addr.strip_prefix('\'').unwrap_or(addr);
    addr.to_lowercase()
}

/// Normalize a symbol: strip whitespace and a leading quote, uppercase.
pub fn normalize_symbol(symbol: &str) -> String {
    let sym = symbol.trim();
    let sym = sym.strip_prefix('\'').unwrap_or(sym);
    sym.to_uppercase()
}

/// Normalize a message id for composite-key matching.
pub fn normalize_message_id(message_id: &str) -> String {
    let id = message_id.trim();
    id.strip_prefix('\'').unwrap_or(id).to_string()
}

/// Format a price in fixed notation: 12 decimals below 1e-6, 8 below 0.01,
/// 6 otherwise. Zero and non-finite values format as empty.
pub fn format_price(price: f64) -> String {
    if price == 0.0 || !price.is_finite() {
        return String::new();
    }
    if price < 0.000001 {
        format!("{:.12}", price)
    } else if price < 0.01 {
        format!("{:.8}", price)
    } else {
        format!("{:.6}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_lowercase_and_strip_quote() {
        assert_eq!(
            normalize_address("'0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
        assert_eq!(normalize_address("  0xABC  "), "0xabc");
    }

    #[test]
    fn symbols_uppercase() {
        assert_eq!(normalize_symbol("'pepe"), "PEPE");
        assert_eq!(normalize_symbol(" eth "), "ETH");
    }

    #[test]
    fn message_ids_strip_quote_prefix() {
        assert_eq!(normalize_message_id("'12345"), "12345");
        assert_eq!(normalize_message_id(" 12345 "), "12345");
    }

    #[test]
    fn prices_never_use_scientific_notation() {
        assert_eq!(format_price(0.00000000123), "0.000000001230");
        assert_eq!(format_price(0.00123), "0.00123000");
        assert_eq!(format_price(1.23), "1.230000");
        assert_eq!(format_price(0.0), "");
        assert!(!format_price(1.5e-9).contains('e'));
    }
}
