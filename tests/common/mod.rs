//! Shared test utilities and constants.
#![allow(dead_code)]

use std::path::PathBuf;

/// Symbol used across the feed tests.
pub const SYMBOL: &str = "USDCHF_otc";

/// Helper to get the path to test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Builds a `candle-generated` text frame for `symbol`.
pub fn candle_frame(symbol: &str, time: i64, open: f64, close: f64) -> String {
    let high = open.max(close) + 0.0005;
    let low = open.min(close) - 0.0005;
    format!(
        r#"42["candle-generated",{{"symbol":"{symbol}","msg":{{"candle":{{"time":{time},"open":{open},"max":{high},"min":{low},"close":{close},"volume":10}}}}}}]"#
    )
}

/// Prefixes a JSON payload with the binary frame tag.
pub fn binary_frame(json: &str) -> Vec<u8> {
    let mut bytes = vec![candlewick::websocket::frame::BINARY_TAG];
    bytes.extend_from_slice(json.as_bytes());
    bytes
}
