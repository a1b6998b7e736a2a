//! Quote tick model.

use serde::Serialize;

/// A single price tick for one symbol.
///
/// Ticks arrive either as `[symbol, price]` or as
/// `[symbol, timestamp, price, volume?]`; the optional fields are only
/// populated by the second shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    /// Tick time in (fractional) seconds.
    pub timestamp: Option<f64>,
    pub volume: Option<f64>,
}

impl Quote {
    /// Percent change from `previous` to this tick's price, or `None` when
    /// `previous` is zero.
    pub fn change_pct(&self, previous: f64) -> Option<f64> {
        if previous == 0.0 {
            return None;
        }
        Some((self.price - previous) / previous * 100.0)
    }
}
