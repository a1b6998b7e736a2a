//! Shared models for the streaming feed.
//!
//! Contains the typed events extracted from inbound frames, the direction
//! label shared by signals and option quotes, and the parameter payloads
//! of outbound subscription messages.

pub mod candle;
pub mod instrument;
pub mod quote;

use serde::Serialize;

pub use candle::Bar;
pub use instrument::{InstrumentSnapshot, OptionQuote};
pub use quote::Quote;

/// A typed event extracted from a data frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A `candle-generated` event for the subscribed symbol.
    BarClosed(Bar),
    /// A single price tick.
    Quote(Quote),
    /// An instrument state row for the subscribed symbol.
    Instrument(InstrumentSnapshot),
}

/// Directional bet label: price will rise (`Call`) or fall (`Put`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// Returns the wire label used by the feed (`"call"` / `"put"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Call => "call",
            Direction::Put => "put",
        }
    }
}

/// A named subscription payload: `{"name": ..., "params": {...}}`.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest<P> {
    pub name: &'static str,
    pub params: P,
}

/// Parameters of the `candles` subscription.
#[derive(Debug, Serialize)]
pub struct CandlesParams {
    pub symbol: String,
    /// Candle duration in seconds.
    pub timeframe: u64,
    #[serde(rename = "type")]
    pub tpe: String,
}

/// Parameters of the routing-filter `cmd` subscription.
#[derive(Debug, Serialize)]
pub struct RoutingParams {
    #[serde(rename = "routingFilters")]
    pub routing_filters: RoutingFilters,
}

/// Filters narrowing the server-side routing to one instrument.
#[derive(Debug, Serialize)]
pub struct RoutingFilters {
    pub symbol: String,
    pub instrument_type: String,
}

/// Parameters of the `quotes/stream` subscription.
#[derive(Debug, Serialize)]
pub struct QuoteStreamParams {
    pub symbol: String,
}
