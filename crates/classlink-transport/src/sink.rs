//! Event sink: where decoded inbound events are delivered.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::codec::{PONG_TYPE, RawFrame};

/// One decoded inbound frame, handed to the sink and then discarded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InboundEvent {
    /// Event type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event body; `null` when absent.
    pub payload: Value,
    /// Server status or error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Server message text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Cumulative acknowledgement carried by the frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_seq: Option<u64>,
}

impl InboundEvent {
    /// Whether this is the server's heartbeat reply.
    pub fn is_pong(&self) -> bool {
        self.kind == PONG_TYPE
    }
}

impl From<RawFrame> for InboundEvent {
    fn from(frame: RawFrame) -> Self {
        Self {
            kind: frame.kind,
            payload: frame.payload,
            code: frame.code,
            message: frame.message,
            ack_seq: frame.ack_seq,
        }
    }
}

/// Receives every successfully decoded inbound event.
///
/// Called on the session's driver task, one event at a time. Long blocking
/// work here stalls processing of later frames.
pub trait EventSink: Send + 'static {
    /// Handle one event.
    fn on_event(&mut self, event: InboundEvent);
}

impl<F> EventSink for F
where
    F: FnMut(InboundEvent) + Send + 'static,
{
    fn on_event(&mut self, event: InboundEvent) {
        self(event);
    }
}

/// Sink that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl ChannelSink {
    /// Create the sink and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&mut self, event: InboundEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}
