//! The socket seam between a session and its transport.
//!
//! A [`Link`] is one established connection, reduced to two channels:
//! text frames out, [`LinkEvent`]s in. Dropping the outbound sender closes
//! the connection. [`Connector`] produces links; tests and embedders can
//! implement it over anything, and [`Link::pair`] gives an in-memory link
//! with a [`LinkPeer`] playing the server.

use async_trait::async_trait;
use classlink_core::TransportError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Something that happened on an established link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete inbound frame.
    Frame(Vec<u8>),
    /// The link is gone.
    Closed {
        /// Close reason or error text, if any.
        reason: Option<String>,
    },
}

/// One established connection.
#[derive(Debug)]
pub struct Link {
    /// Encoded frames to write, in order.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames and closure notifications read from the peer.
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// An in-memory link and the peer end that drives it.
    pub fn pair() -> (Self, LinkPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            LinkPeer {
                sent: out_rx,
                events: in_tx,
            },
        )
    }
}

/// Server side of an in-memory [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkPeer {
    /// Deliver a text frame to the client. Returns `false` if the client
    /// stopped listening.
    pub fn deliver(&self, text: &str) -> bool {
        self.deliver_bytes(text.as_bytes().to_vec())
    }

    /// Deliver raw bytes to the client.
    pub fn deliver_bytes(&self, bytes: Vec<u8>) -> bool {
        self.events.send(LinkEvent::Frame(bytes)).is_ok()
    }

    /// Report closure to the client.
    pub fn close(&self, reason: Option<&str>) {
        let _ = self.events.send(LinkEvent::Closed {
            reason: reason.map(str::to_owned),
        });
    }

    /// Every frame the client has written so far.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Wait for the next frame the client writes.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Whether the client dropped its outbound side. Call after draining.
    pub fn client_closed(&mut self) -> bool {
        matches!(self.sent.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Opens links to an endpoint URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Link, TransportError>;
}
