//! Lenient readers for upstream JSON
//!
//! The upstream APIs return numbers as strings or numbers depending on the
//! endpoint, and omit fields freely. Missing or unparsable numbers read as 0.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read a number that may be encoded as a string
pub(crate) fn number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

pub(crate) fn number_field(value: &Value, key: &str) -> f64 {
    value.get(key).map(number).unwrap_or(0.0)
}

/// Non-empty string field, with numbers rendered as text
pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `response.data[0]`, the envelope every portfolio endpoint uses
pub(crate) fn first_entry(response: &Value) -> Option<&Value> {
    response.get("data")?.get(0)
}

/// Array field of `data[0]`, or an empty slice
pub(crate) fn entry_array<'a>(response: &'a Value, key: &str) -> &'a [Value] {
    first_entry(response)
        .and_then(|entry| entry.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Deserialize an unsigned integer given as a number or a string
pub(crate) fn u32_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Deserialize a string that may be given as a number
pub(crate) fn string_lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected string, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_reads_strings_and_numbers() {
        assert_eq!(number(&json!("12.5")), 12.5);
        assert_eq!(number(&json!(3)), 3.0);
        assert_eq!(number(&json!("abc")), 0.0);
        assert_eq!(number(&json!(null)), 0.0);
        assert_eq!(number(&json!("NaN")), 0.0);
    }

    #[test]
    fn test_entry_array() {
        let response = json!({"data": [{"tokenAssets": [{"symbol": "SOL"}]}]});
        assert_eq!(entry_array(&response, "tokenAssets").len(), 1);
        assert!(entry_array(&response, "missing").is_empty());
        assert!(entry_array(&json!({"data": []}), "tokenAssets").is_empty());
        assert!(entry_array(&json!("oops"), "tokenAssets").is_empty());
    }

    #[test]
    fn test_string_field() {
        let value = json!({"txTime": 1700000000, "symbol": "", "hash": "abc"});
        assert_eq!(string_field(&value, "txTime").as_deref(), Some("1700000000"));
        assert_eq!(string_field(&value, "symbol"), None);
        assert_eq!(string_field(&value, "hash").as_deref(), Some("abc"));
    }
}
