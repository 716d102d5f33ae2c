// 🔢 Numeric Normalizer - Brazilian-locale cells → f64
//
// Convention: "." is the thousands separator, "," the decimal separator.
// "1.234,56" → 1234.56, "12,5%" → 12.5. Anything unparseable becomes None.

/// Parse a raw cell into a float
///
/// Steps, in order: missing/empty → None, trim, strip trailing `%`, drop every
/// `.`, turn `,` into `.`, parse. A failed parse is None, never an error.
pub fn parse_cell(cell: Option<&str>) -> Option<f64> {
    let raw = cell?.trim();
    if raw.is_empty() {
        return None;
    }

    let raw = raw.strip_suffix('%').unwrap_or(raw).trim_end();
    let normalized: String = raw
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convenience for non-optional cells
pub fn parse(cell: &str) -> Option<f64> {
    parse_cell(Some(cell))
}

/// Render a float the way the normalizer reads it back
///
/// Spreadsheet readers hand numeric cells over as floats; writing them with a
/// decimal comma and no grouping keeps `parse` from reading "12.5" as 125.
pub fn format_decimal_comma(value: f64) -> String {
    value.to_string().replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands_and_decimal() {
        assert_eq!(parse("1.234,56"), Some(1234.56));
        assert_eq!(parse("1.000.000"), Some(1_000_000.0));
        assert_eq!(parse("0,5"), Some(0.5));
    }

    #[test]
    fn test_percent_and_whitespace() {
        assert_eq!(parse("  8,9% "), Some(8.9));
        assert_eq!(parse("12%"), Some(12.0));
    }

    #[test]
    fn test_malformed_is_none() {
        assert_eq!(parse("N/A"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("-"), None);
        assert_eq!(parse("x"), None);
        assert_eq!(parse_cell(None), None);
    }

    #[test]
    fn test_dot_is_never_decimal() {
        // "12.5" in this convention is twelve-thousand-five-ish, not 12.5
        assert_eq!(parse("12.5"), Some(125.0));
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(parse("-3,25"), Some(-3.25));
    }

    #[test]
    fn test_format_decimal_comma_round_trips() {
        assert_eq!(format_decimal_comma(12.5), "12,5");
        assert_eq!(parse(&format_decimal_comma(12.5)), Some(12.5));
        assert_eq!(parse(&format_decimal_comma(1500.0)), Some(1500.0));
    }
}
