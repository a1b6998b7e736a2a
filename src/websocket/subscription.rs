//! Subscription messages and the ordered send sequence.

use std::time::Duration;

use tracing::{debug, info};

use super::frame::encode_event;
use super::{SharedWriter, send_text};
use crate::Result;
use crate::config::SessionBootstrap;
use crate::models::{
    CandlesParams, QuoteStreamParams, RoutingFilters, RoutingParams, SubscribeRequest,
};

/// One outbound subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Completed candles for a symbol at a timeframe.
    Candles {
        symbol: String,
        timeframe_secs: u64,
        instrument_type: String,
    },
    /// Server-side routing filter for the symbol.
    RoutingFilter {
        symbol: String,
        instrument_type: String,
    },
    /// Live quote ticks.
    QuoteStream { symbol: String },
}

impl Subscription {
    /// The subscriptions sent on every (re)connect, in send order.
    pub fn sequence(bootstrap: &SessionBootstrap, timeframe_secs: u64) -> Vec<Self> {
        vec![
            Subscription::Candles {
                symbol: bootstrap.symbol.clone(),
                timeframe_secs,
                instrument_type: bootstrap.instrument_type.clone(),
            },
            Subscription::RoutingFilter {
                symbol: bootstrap.symbol.clone(),
                instrument_type: bootstrap.instrument_type.clone(),
            },
            Subscription::QuoteStream {
                symbol: bootstrap.symbol.clone(),
            },
        ]
    }

    /// Socket.io event name the request is sent under.
    pub fn event_name(&self) -> &'static str {
        match self {
            Subscription::Candles { .. } | Subscription::QuoteStream { .. } => "subscribe",
            Subscription::RoutingFilter { .. } => "cmd",
        }
    }

    /// Name of the subscribed stream or command.
    pub fn name(&self) -> &'static str {
        match self {
            Subscription::Candles { .. } => "candles",
            Subscription::RoutingFilter { .. } => "subscribe",
            Subscription::QuoteStream { .. } => "quotes/stream",
        }
    }

    /// Encodes the `42[...]` text frame for this subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`CandlewickError`](crate::CandlewickError) if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        let name = self.name();
        match self {
            Subscription::Candles {
                symbol,
                timeframe_secs,
                instrument_type,
            } => encode_event(
                self.event_name(),
                &SubscribeRequest {
                    name,
                    params: CandlesParams {
                        symbol: symbol.clone(),
                        timeframe: *timeframe_secs,
                        tpe: instrument_type.clone(),
                    },
                },
            ),
            Subscription::RoutingFilter {
                symbol,
                instrument_type,
            } => encode_event(
                self.event_name(),
                &SubscribeRequest {
                    name,
                    params: RoutingParams {
                        routing_filters: RoutingFilters {
                            symbol: symbol.clone(),
                            instrument_type: instrument_type.clone(),
                        },
                    },
                },
            ),
            Subscription::QuoteStream { symbol } => encode_event(
                self.event_name(),
                &SubscribeRequest {
                    name,
                    params: QuoteStreamParams {
                        symbol: symbol.clone(),
                    },
                },
            ),
        }
    }
}

/// Sends `subscriptions` in order, pausing `gap` between messages.
///
/// The feed drops subscriptions that arrive back to back, so the gap is
/// required.
///
/// # Errors
///
/// Returns a [`CandlewickError`](crate::CandlewickError) if encoding or
/// sending any message fails; later messages are not sent.
pub async fn send_subscriptions(
    writer: &SharedWriter,
    subscriptions: &[Subscription],
    gap: Duration,
) -> Result<()> {
    for (i, subscription) in subscriptions.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(gap).await;
        }
        let frame = subscription.to_frame()?;
        debug!("Sending subscription: {frame}");
        send_text(writer, &frame).await?;
        info!(
            event = subscription.event_name(),
            name = subscription.name(),
            "Subscribed"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap() -> SessionBootstrap {
        SessionBootstrap::new("wss://ws.example.com/socket.io/", "USDCHF_otc")
    }

    #[test]
    fn sequence_order() {
        let names: Vec<&str> = Subscription::sequence(&bootstrap(), 60)
            .iter()
            .map(Subscription::name)
            .collect();
        assert_eq!(names, vec!["candles", "subscribe", "quotes/stream"]);
    }

    #[test]
    fn candles_frame() {
        let sequence = Subscription::sequence(&bootstrap(), 60);
        let frame = sequence[0].to_frame().unwrap();
        assert!(frame.starts_with("42"));

        let value: serde_json::Value = serde_json::from_str(&frame[2..]).unwrap();
        assert_eq!(value[0], "subscribe");
        assert_eq!(value[1]["name"], "candles");
        assert_eq!(value[1]["params"]["symbol"], "USDCHF_otc");
        assert_eq!(value[1]["params"]["timeframe"], 60);
        assert_eq!(value[1]["params"]["type"], "OTC");
    }

    #[test]
    fn routing_filter_frame() {
        let sequence = Subscription::sequence(&bootstrap(), 60);
        let value: serde_json::Value =
            serde_json::from_str(&sequence[1].to_frame().unwrap()[2..]).unwrap();
        assert_eq!(value[0], "cmd");
        assert_eq!(value[1]["name"], "subscribe");
        assert_eq!(
            value[1]["params"]["routingFilters"]["symbol"],
            "USDCHF_otc"
        );
        assert_eq!(
            value[1]["params"]["routingFilters"]["instrument_type"],
            "OTC"
        );
    }

    #[test]
    fn quote_stream_frame() {
        let sequence = Subscription::sequence(&bootstrap(), 60);
        assert_eq!(
            sequence[2].to_frame().unwrap(),
            r#"42["subscribe",{"name":"quotes/stream","params":{"symbol":"USDCHF_otc"}}]"#
        );
    }
}
