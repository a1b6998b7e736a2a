//! Typed output stream of the pipeline.
//!
//! Everything the core produces is delivered as a [`SinkEvent`] over an
//! unbounded `tokio` channel. [`log_events`] is the default consumer used
//! by the binary.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::indicators::IndicatorSnapshot;
use crate::models::{Bar, InstrumentSnapshot, Quote};
use crate::signal::Signal;
use crate::websocket::ConnectionState;

/// Sending half handed to the supervisor.
pub type SinkSender = mpsc::UnboundedSender<SinkEvent>;

/// Receiving half consumed by display or storage.
pub type SinkReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// A record emitted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// The connection supervisor changed state.
    Connection(ConnectionState),
    /// A bar was accepted into the window.
    Bar {
        bar: Bar,
        window_len: usize,
        /// Percent change of the close versus the previous bar's close.
        change_pct: Option<f64>,
    },
    /// A price tick for the subscribed symbol.
    Quote {
        quote: Quote,
        /// Percent change versus the previous tick.
        change_pct: Option<f64>,
    },
    Instrument(InstrumentSnapshot),
    /// Indicators recomputed after a bar.
    Indicators(IndicatorSnapshot),
    Signal(Signal),
}

/// Creates a new sink channel.
pub fn channel() -> (SinkSender, SinkReceiver) {
    mpsc::unbounded_channel()
}

/// Logs every event until the sending side is dropped.
pub async fn log_events(mut rx: SinkReceiver) {
    while let Some(event) = rx.recv().await {
        log_event(&event);
    }
}

/// Waits for a spawned consumer to finish.
///
/// A panic or cancellation is logged rather than propagated. Returns
/// `true` if the consumer ran to completion.
pub async fn join_consumer(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!("Sink consumer failed: {e}");
            false
        }
    }
}

fn log_event(event: &SinkEvent) {
    match event {
        SinkEvent::Connection(state) => info!(state = ?state, "Connection state"),
        SinkEvent::Bar {
            bar,
            window_len,
            change_pct,
        } => info!(
            open_time = bar.open_time,
            open = bar.open,
            high = bar.high,
            low = bar.low,
            close = bar.close,
            volume = bar.volume,
            window_len,
            change_pct = ?change_pct,
            "Bar closed"
        ),
        SinkEvent::Quote { quote, change_pct } => debug!(
            symbol = %quote.symbol,
            price = quote.price,
            change_pct = ?change_pct,
            "Quote"
        ),
        SinkEvent::Instrument(snapshot) => info!(
            symbol = %snapshot.symbol,
            kind = %snapshot.kind,
            active = snapshot.active,
            options = snapshot.options.len(),
            trend = ?snapshot.trend,
            volatility = ?snapshot.volatility,
            "Instrument update"
        ),
        SinkEvent::Indicators(snapshot) => info!(
            rsi = ?snapshot.rsi,
            macd = ?snapshot.macd.value,
            macd_signal = ?snapshot.macd.signal,
            upper = ?snapshot.bollinger.map(|b| b.upper),
            middle = ?snapshot.bollinger.map(|b| b.middle),
            lower = ?snapshot.bollinger.map(|b| b.lower),
            "Indicators"
        ),
        SinkEvent::Signal(signal) => info!(
            direction = ?signal.direction,
            reason = ?signal.reason,
            confidence = ?signal.confidence,
            price = signal.price,
            timestamp = signal.timestamp,
            "Signal"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_events_drains_until_sender_dropped() {
        let (tx, rx) = channel();
        let consumer = tokio::spawn(log_events(rx));

        tx.send(SinkEvent::Connection(ConnectionState::Connecting))
            .unwrap();
        tx.send(SinkEvent::Indicators(IndicatorSnapshot::default()))
            .unwrap();
        drop(tx);

        assert!(join_consumer(consumer).await);
    }

    #[tokio::test]
    async fn panicking_consumer_is_reported_not_propagated() {
        let (tx, mut rx) = channel();
        let consumer = tokio::spawn(async move {
            if rx.recv().await.is_some() {
                panic!("consumer blew up");
            }
        });

        tx.send(SinkEvent::Connection(ConnectionState::Connecting))
            .unwrap();

        assert!(!join_consumer(consumer).await);
    }

    #[test]
    fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(tx.is_closed());
        assert!(
            tx.send(SinkEvent::Connection(ConnectionState::Closing))
                .is_err()
        );
    }
}
