//! Column key and cell value parsing.
//!
//! Source tables name metric columns by concatenating the category and
//! the year (`"NATURAL2006"`, `"HEROIN2018"`). These helpers turn such
//! keys into typed `(Category, year)` pairs once, at load time, so the
//! engine never looks anything up by string.

use std::str::FromStr as _;

use opioid_map_metric_models::Category;

/// Parses a `"<CATEGORY><YEAR>"` column key.
///
/// The category prefix is matched case-insensitively and must be followed
/// by nothing but ASCII digits. Returns `None` for keys that are not
/// metric columns (e.g. `"STATE"`, `"LAT"`).
#[must_use]
pub fn parse_column_key(key: &str) -> Option<(Category, i32)> {
    let key = key.trim();
    let split = key.find(|c: char| c.is_ascii_digit())?;
    let (prefix, digits) = key.split_at(split);

    if prefix.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let category = Category::from_str(prefix.trim_end_matches(['_', ' '])).ok()?;
    let year = digits.parse::<i32>().ok()?;

    Some((category, year))
}

/// Reads a numeric cell value.
///
/// Numbers are taken as-is; strings are trimmed, stripped of thousands
/// separators, and parsed. Everything else (null, booleans, empty
/// strings, unparseable text) is `None`.
#[must_use]
pub fn parse_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_metric_keys() {
        assert_eq!(
            parse_column_key("NATURAL2010"),
            Some((Category::Natural, 2010))
        );
        assert_eq!(
            parse_column_key("heroin2006"),
            Some((Category::Heroin, 2006))
        );
        assert_eq!(
            parse_column_key("METHADONE_2018"),
            Some((Category::Methadone, 2018))
        );
    }

    #[test]
    fn ignores_non_metric_keys() {
        assert_eq!(parse_column_key("STATE"), None);
        assert_eq!(parse_column_key("NATURAL"), None);
        assert_eq!(parse_column_key("2010"), None);
        assert_eq!(parse_column_key("NATURAL20X0"), None);
        assert_eq!(parse_column_key("COCAINE2010"), None);
    }

    #[test]
    fn formatted_category_year_keys_parse_back() {
        for &category in Category::all() {
            let key = format!("{category}2014");
            assert_eq!(parse_column_key(&key), Some((category, 2014)));
        }
    }

    #[test]
    fn parses_numeric_and_string_values() {
        assert_eq!(parse_value(&json!(42)), Some(42.0));
        assert_eq!(parse_value(&json!(1.5)), Some(1.5));
        assert_eq!(parse_value(&json!(" 311 ")), Some(311.0));
        assert_eq!(parse_value(&json!("1,234")), Some(1234.0));
    }

    #[test]
    fn non_numeric_values_are_none() {
        assert_eq!(parse_value(&json!("")), None);
        assert_eq!(parse_value(&json!("n/a")), None);
        assert_eq!(parse_value(&json!(null)), None);
        assert_eq!(parse_value(&json!(true)), None);
        assert_eq!(parse_value(&json!("NaN")), None);
    }
}
