//! WebSocket connector over `tokio-tungstenite`.
//!
//! Each connection gets a write pump (outbound channel → socket) and a read
//! pump (socket → inbound channel). When the outbound sender is dropped the
//! write pump sends a close frame; the read pump reports closure once the
//! socket ends.

use async_trait::async_trait;
use classlink_core::TransportError;
use classlink_core::errors::redact_token;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::link::{Connector, Link, LinkEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector.
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                url: redact_token(url),
                reason: e.to_string(),
            })?;
        debug!(url = %redact_token(url), "websocket established");

        let (ws_tx, ws_rx) = ws.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = tokio::spawn(write_pump(ws_tx, out_rx));
        let _ = tokio::spawn(read_pump(ws_rx, in_tx));

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

async fn write_pump(
    mut ws_tx: SplitSink<WsStream, Message>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = out_rx.recv().await {
        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
            debug!(error = %e, "websocket write failed");
            return;
        }
    }
    trace!("outbound dropped, closing websocket");
    let _ = ws_tx.close().await;
}

async fn read_pump(mut ws_rx: SplitStream<WsStream>, in_tx: mpsc::UnboundedSender<LinkEvent>) {
    let reason = loop {
        let event = match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => LinkEvent::Frame(text.as_bytes().to_vec()),
            Some(Ok(Message::Binary(bytes))) => LinkEvent::Frame(bytes.to_vec()),
            Some(Ok(Message::Close(frame))) => {
                break frame.map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()));
            }
            // ping/pong are answered by tungstenite itself
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        };
        if in_tx.send(event).is_err() {
            return;
        }
    };
    let _ = in_tx.send(LinkEvent::Closed { reason });
}
