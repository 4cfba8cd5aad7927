//! Display helpers for amounts, prices and timestamps

use chrono::{DateTime, Utc};

/// `$1.23M`, `$4.56K`, `$7.89`. Zero and non-finite values render as `$0.00`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "$0.00".to_string();
    }
    if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.2}K", value / 1_000.0)
    } else {
        format!("${value:.2}")
    }
}

/// Six decimals, or `0.00` for zero
pub fn format_price(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0.00".to_string();
    }
    format!("{value:.6}")
}

/// Render a unix timestamp given in milliseconds
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Recent".to_string())
}

/// Interpret an epoch timestamp given in seconds (up to ten digits) or
/// milliseconds. Zero and negative values mean "unknown".
pub fn epoch_to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    if timestamp <= 0 {
        None
    } else if timestamp < 10_000_000_000 {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
    } else {
        DateTime::<Utc>::from_timestamp_millis(timestamp)
    }
}

/// First 8 and last 6 characters of a transaction hash
pub fn short_hash(hash: &str) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() <= 14 {
        return hash.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}...{tail}")
}

/// Convert a human amount into integer base units, rounding down
pub fn to_base_units(amount: f64, decimals: u32) -> u128 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    let scaled = amount * 10f64.powi(decimals as i32);
    // float-to-int `as` saturates
    scaled.floor() as u128
}

/// Convert an integer base-unit string back to a six-decimal display amount
pub fn from_base_units(amount: &str, decimals: u32) -> String {
    let raw = amount.trim().parse::<f64>().unwrap_or(0.0);
    format!("{:.6}", raw / 10f64.powi(decimals as i32))
}
