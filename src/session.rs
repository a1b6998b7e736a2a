//! Trading state for one symbol.
//!
//! [`TradingSession`] owns the bar window, the latest indicator snapshot,
//! the last tick price and the retained signal history. It is the single
//! writer of that state and survives reconnects; the connection supervisor
//! feeds it decoded events and forwards what it returns to the sink.

use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::indicators::{IndicatorParams, IndicatorSnapshot};
use crate::models::{Bar, FeedEvent, InstrumentSnapshot, Quote};
use crate::signal::{self, Signal};
use crate::sink::SinkEvent;
use crate::window::RollingWindow;

#[derive(Debug, Clone)]
pub struct TradingSession {
    symbol: String,
    params: IndicatorParams,
    bars: RollingWindow<Bar>,
    indicators: IndicatorSnapshot,
    signals: RollingWindow<Signal>,
    last_price: Option<f64>,
}

impl TradingSession {
    #[must_use]
    pub fn new(symbol: impl Into<String>, config: &StreamConfig) -> Self {
        Self {
            symbol: symbol.into(),
            params: config.indicators,
            bars: RollingWindow::new(config.window_capacity),
            indicators: IndicatorSnapshot::default(),
            signals: RollingWindow::new(config.signal_history_capacity),
            last_price: None,
        }
    }

    /// Applies one decoded event and returns the records to emit.
    pub fn apply(&mut self, event: FeedEvent) -> Vec<SinkEvent> {
        match event {
            FeedEvent::BarClosed(bar) => self.on_bar(bar),
            FeedEvent::Quote(quote) => self.on_quote(quote),
            FeedEvent::Instrument(snapshot) => self.on_instrument(snapshot),
        }
    }

    /// Inserts a bar, recomputes indicators and evaluates a signal.
    ///
    /// Out-of-order bars are logged and dropped.
    pub fn on_bar(&mut self, bar: Bar) -> Vec<SinkEvent> {
        let previous_close = self.bars.latest().map(|b| b.close);
        if let Err(e) = self.bars.push_bar(bar) {
            warn!(symbol = %self.symbol, "Dropping bar: {e}");
            return Vec::new();
        }

        let change_pct = previous_close
            .filter(|close| *close != 0.0)
            .map(|close| (bar.close - close) / close * 100.0);

        let mut events = vec![SinkEvent::Bar {
            bar,
            window_len: self.bars.len(),
            change_pct,
        }];

        if self.bars.len() < self.params.min_bars {
            debug!(
                symbol = %self.symbol,
                bars = self.bars.len(),
                min_bars = self.params.min_bars,
                "Waiting for enough bars"
            );
            return events;
        }

        let closes = self.bars.closes(self.params.effective_lookback());
        self.indicators = IndicatorSnapshot::compute(&closes, &self.params);
        events.push(SinkEvent::Indicators(self.indicators));

        if let Some(signal) = self.evaluate() {
            info!(
                symbol = %self.symbol,
                direction = ?signal.direction,
                reason = ?signal.reason,
                confidence = ?signal.confidence,
                "Signal generated"
            );
            self.signals.append(signal.clone());
            events.push(SinkEvent::Signal(signal));
        }

        events
    }

    /// Records the latest tick price.
    pub fn on_quote(&mut self, quote: Quote) -> Vec<SinkEvent> {
        let change_pct = self.last_price.and_then(|prev| quote.change_pct(prev));
        self.last_price = Some(quote.price);
        vec![SinkEvent::Quote { quote, change_pct }]
    }

    pub fn on_instrument(&mut self, snapshot: InstrumentSnapshot) -> Vec<SinkEvent> {
        vec![SinkEvent::Instrument(snapshot)]
    }

    fn evaluate(&self) -> Option<Signal> {
        let current = self.bars.latest()?;
        let previous = self.bars.previous()?;
        signal::evaluate(current, previous, &self.indicators, self.last_price)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &RollingWindow<Bar> {
        &self.bars
    }

    pub fn indicators(&self) -> &IndicatorSnapshot {
        &self.indicators
    }

    /// Retained signals, oldest first.
    pub fn signals(&self) -> &RollingWindow<Signal> {
        &self.signals
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }
}
