//! Async WebSocket client for the socket.io market feed.
//!
//! This module is organized by concern:
//! - [`frame`] - Inbound frame classification and event encoding
//! - [`subscription`] - Subscription messages and their send sequence
//! - [`connection`] - Connection lifecycle, heartbeat and reconnection

pub mod connection;
pub mod frame;
pub mod subscription;

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use tungstenite::Message;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::http::header::{COOKIE, HeaderValue, ORIGIN, USER_AGENT};

use crate::Result;
use crate::config::SessionBootstrap;

pub use connection::{ConnectionState, ConnectionSupervisor};
pub use frame::{Frame, decode};
pub use subscription::{Subscription, send_subscriptions};

/// Write half of a feed WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a feed WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Write half shared between the receive path and the heartbeat task.
pub type SharedWriter = Arc<Mutex<WsWriter>>;

/// Builds the upgrade request carrying the bootstrap headers.
///
/// # Errors
///
/// Returns a [`CandlewickError`](crate::CandlewickError) if the endpoint is
/// not a valid WebSocket URL or a header value contains invalid bytes.
pub fn build_request(bootstrap: &SessionBootstrap) -> Result<Request> {
    let mut request = bootstrap.endpoint.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&bootstrap.headers.user_agent)?,
    );
    headers.insert(ORIGIN, HeaderValue::from_str(&bootstrap.headers.origin)?);
    if let Some(cookie) = &bootstrap.headers.cookie {
        headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
    }

    Ok(request)
}

/// Establishes a WebSocket connection using the bootstrap tuple.
///
/// # Errors
///
/// Returns a [`CandlewickError`](crate::CandlewickError) if the request
/// cannot be built or the connection or TLS handshake fails.
pub async fn connect(bootstrap: &SessionBootstrap) -> Result<(WsWriter, WsReader)> {
    let request = build_request(bootstrap)?;
    let (ws_stream, _) = connect_async(request).await?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Sends a text frame over the shared writer.
///
/// # Errors
///
/// Returns a [`CandlewickError`](crate::CandlewickError) if sending the message fails.
pub async fn send_text(writer: &SharedWriter, text: &str) -> Result<()> {
    writer
        .lock()
        .await
        .send(Message::Text(text.to_owned().into()))
        .await?;
    debug!(frame = text, "Sent frame");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_bootstrap_headers() {
        let mut bootstrap = SessionBootstrap::new("wss://ws.example.com/socket.io/?EIO=3", "X");
        bootstrap.headers.cookie = Some("session=abc; lang=en".to_string());
        bootstrap.headers.user_agent = "agent/1.0".to_string();

        let request = build_request(&bootstrap).unwrap();
        assert_eq!(request.uri().host(), Some("ws.example.com"));
        assert_eq!(request.headers()[USER_AGENT], "agent/1.0");
        assert_eq!(request.headers()[COOKIE], "session=abc; lang=en");
        assert_eq!(request.headers()[ORIGIN], bootstrap.headers.origin.as_str());
    }

    #[test]
    fn request_without_cookie_omits_header() {
        let bootstrap = SessionBootstrap::new("ws://127.0.0.1:9/", "X");
        let request = build_request(&bootstrap).unwrap();
        assert!(request.headers().get(COOKIE).is_none());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let bootstrap = SessionBootstrap::new("not a url", "X");
        assert!(build_request(&bootstrap).is_err());
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut bootstrap = SessionBootstrap::new("wss://ws.example.com/", "X");
        bootstrap.headers.cookie = Some("bad\nvalue".to_string());
        assert!(matches!(
            build_request(&bootstrap),
            Err(crate::CandlewickError::InvalidHeader(_))
        ));
    }
}
