//! Directional signal generation.
//!
//! [`evaluate`] maps the two most recent bars and the current indicator
//! snapshot to a [`Signal`] using an ordered rule table; the first matching
//! rule wins. A bar is bullish only when it closes strictly above its open,
//! so a bar with `close == open` counts as bearish.

use serde::Serialize;

use crate::indicators::{CompleteIndicators, IndicatorSnapshot};
use crate::models::Bar;
pub use crate::models::Direction;

/// RSI level above which a bullish run is considered overbought.
pub const OVERBOUGHT: f64 = 70.0;

/// RSI level below which a bearish run is considered oversold.
pub const OVERSOLD: f64 = 30.0;

/// RSI midpoint separating high from medium confidence.
pub const RSI_MIDPOINT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reason {
    TrendContinuation,
    OverboughtReversal,
    OversoldReversal,
    BullishReversal,
    #[serde(rename = "MACDCrossover")]
    MacdCrossover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A directional signal derived from one bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub direction: Direction,
    pub reason: Reason,
    pub confidence: Confidence,
    /// Open time of the bar that produced the signal.
    pub timestamp: i64,
    pub price: f64,
    pub indicators: IndicatorSnapshot,
}

/// Evaluates the rule table.
///
/// `last_price` is the most recent tick price; when absent the current
/// bar's close is used. Returns `None` unless every indicator is present.
pub fn evaluate(
    current: &Bar,
    previous: &Bar,
    snapshot: &IndicatorSnapshot,
    last_price: Option<f64>,
) -> Option<Signal> {
    let values = snapshot.complete()?;
    let price = last_price.unwrap_or(current.close);
    let (direction, reason, confidence) = decide(current, previous, &values, price);

    Some(Signal {
        direction,
        reason,
        confidence,
        timestamp: current.open_time,
        price,
        indicators: *snapshot,
    })
}

fn decide(
    current: &Bar,
    previous: &Bar,
    values: &CompleteIndicators,
    price: f64,
) -> (Direction, Reason, Confidence) {
    let rsi = values.rsi;
    let bands = values.bollinger;

    match (current.is_bullish(), previous.is_bullish()) {
        (true, true) if rsi < OVERBOUGHT && price < bands.upper => {
            let confidence = if rsi > RSI_MIDPOINT {
                Confidence::High
            } else {
                Confidence::Medium
            };
            (Direction::Call, Reason::TrendContinuation, confidence)
        }
        (true, true) if rsi > OVERBOUGHT => {
            (Direction::Put, Reason::OverboughtReversal, Confidence::High)
        }
        (true, false) if values.macd > values.macd_signal => {
            (Direction::Call, Reason::BullishReversal, Confidence::Medium)
        }
        (false, false) if rsi > OVERSOLD && price > bands.lower => {
            let confidence = if rsi < RSI_MIDPOINT {
                Confidence::High
            } else {
                Confidence::Medium
            };
            (Direction::Put, Reason::TrendContinuation, confidence)
        }
        (false, false) if rsi < OVERSOLD => {
            (Direction::Call, Reason::OversoldReversal, Confidence::High)
        }
        _ => {
            let direction = if values.macd > values.macd_signal {
                Direction::Call
            } else {
                Direction::Put
            };
            (direction, Reason::MacdCrossover, Confidence::Medium)
        }
    }
}
