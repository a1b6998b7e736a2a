//! Crate-level error types.
//!
//! [`CandlewickError`] unifies every error source (configuration, WebSocket,
//! JSON, frame decoding, bar validation) behind a single enum so callers can
//! match on the variant they care about while still using the `?` operator.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CandlewickError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum CandlewickError {
    /// A configuration value or tuning file was invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The session bootstrap tuple is incomplete (e.g. no endpoint).
    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// A bootstrap header could not be encoded into the upgrade request.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] tungstenite::http::header::InvalidHeaderValue),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a file from disk failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound frame did not have the expected shape.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A bar failed OHLC consistency checks.
    #[error("invalid bar: {0}")]
    InvalidBar(String),

    /// A bar did not advance the window's open time.
    #[error("out-of-order bar: open_time {open_time} is not after {latest}")]
    OutOfOrderBar { open_time: i64, latest: i64 },
}
