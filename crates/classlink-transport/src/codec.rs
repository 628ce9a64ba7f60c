//! Frame codec: one self-contained JSON object per WebSocket frame.
//!
//! Outbound: `{"type", "seq", "payload", "ts"}`; heartbeat `{"type": "ping", "ts"}`.
//! Inbound: `{"type", "payload"?, "ack_seq"?, "code"?, "message"?}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::ledger::OutboundMessage;

/// Type tag of the heartbeat frame.
pub const PING_TYPE: &str = "ping";
/// Type tag the server uses to answer a ping.
pub const PONG_TYPE: &str = "pong";
/// Type assigned to inbound frames that only carry `ack_seq`.
pub const ACK_TYPE: &str = "ack";

/// Why an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not JSON, not an object, or a field of the wrong type.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// No `type` tag and nothing else actionable.
    #[error("frame has no type")]
    MissingType,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame {
    /// Event type tag.
    pub kind: String,
    /// Event body; `null` when absent.
    pub payload: Value,
    /// Cumulative acknowledgement carried by the frame.
    pub ack_seq: Option<u64>,
    /// Server status or error code.
    pub code: Option<i64>,
    /// Server message text.
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
    ack_seq: Option<u64>,
    code: Option<i64>,
    message: Option<String>,
}

/// Encode a data frame for `message`.
pub fn encode(message: &OutboundMessage) -> String {
    json!({
        "type": message.kind,
        "seq": message.sequence,
        "payload": message.payload,
        "ts": timestamp(message.enqueued_at),
    })
    .to_string()
}

/// Encode a heartbeat frame stamped with `at`.
pub fn encode_ping(at: DateTime<Utc>) -> String {
    json!({ "type": PING_TYPE, "ts": timestamp(at) }).to_string()
}

/// Decode one inbound frame.
///
/// A frame without `type` is accepted only when it carries `ack_seq`; it is
/// then tagged [`ACK_TYPE`].
pub fn decode(bytes: &[u8]) -> Result<RawFrame, FrameError> {
    let wire: WireFrame = serde_json::from_slice(bytes)?;
    let kind = match (wire.kind, wire.ack_seq) {
        (Some(kind), _) => kind,
        (None, Some(_)) => ACK_TYPE.to_string(),
        (None, None) => return Err(FrameError::MissingType),
    };
    Ok(RawFrame {
        kind,
        payload: wire.payload,
        ack_seq: wire.ack_seq,
        code: wire.code,
        message: wire.message,
    })
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
