//! Cache Key Generation
//!
//! Pure functions mapping domain identifiers to deterministic cache keys.
//! Equivalent inputs (case, surrounding whitespace) map to the same key.

use sha2::{Digest, Sha256};

/// Latest price for a trading symbol, e.g. `price:BTCUSDT`.
pub fn price(symbol: &str) -> String {
    format!("price:{}", normalize_symbol(symbol))
}

/// Candle series for a symbol and interval, e.g. `candles:BTCUSDT:1h`.
pub fn candles(symbol: &str, interval: &str) -> String {
    format!(
        "candles:{}:{}",
        normalize_symbol(symbol),
        interval.trim().to_ascii_lowercase()
    )
}

pub fn market_overview() -> String {
    "market:overview".to_string()
}

pub fn user_profile(user_id: &str) -> String {
    user_key(user_id, "profile")
}

pub fn user_portfolio(user_id: &str) -> String {
    user_key(user_id, "portfolio")
}

pub fn user_settings(user_id: &str) -> String {
    user_key(user_id, "settings")
}

// == Search ==
/// Key for a free-text query.
///
/// The query is trimmed, lower-cased and whitespace-collapsed, then hashed
/// so arbitrary input always yields a short key.
pub fn search(query: &str) -> String {
    let normalized = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("search:{:x}", hasher.finalize())
}

fn user_key(user_id: &str, section: &str) -> String {
    format!("user:{}:{}", user_id.trim(), section)
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
