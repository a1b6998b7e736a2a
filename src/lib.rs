//! Streaming candle indicators and directional signals over a socket.io
//! market feed.
//!
//! The pipeline decodes feed frames into typed events, keeps a bounded
//! window of closed bars per session, recomputes RSI, MACD and Bollinger
//! bands after each bar, and emits call/put signals to a typed sink. A
//! connection supervisor owns the socket: probe, heartbeat, subscriptions
//! and reconnect with backoff.

pub mod config;
pub mod error;
pub mod indicators;
pub mod models;
pub mod session;
pub mod signal;
pub mod sink;
pub mod websocket;
pub mod window;

pub use error::{CandlewickError, Result};
