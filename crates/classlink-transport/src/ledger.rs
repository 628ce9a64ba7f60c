//! Pending-send ledger: outbound messages awaiting acknowledgement.
//!
//! Keyed by sequence number, so iteration order is ascending sequence order,
//! which is also insertion order because sequences are assigned
//! monotonically by the session.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A logical send recorded for delivery and possible replay.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundMessage {
    /// Session-assigned sequence number.
    pub sequence: u64,
    /// Event type tag.
    pub kind: String,
    /// Opaque event body.
    pub payload: Value,
    /// When the caller requested the send.
    pub enqueued_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Create a message stamped with the current time.
    pub fn new(sequence: u64, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            sequence,
            kind: kind.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Outbound messages not yet cumulatively acknowledged.
#[derive(Debug, Default)]
pub struct PendingLedger {
    entries: BTreeMap<u64, OutboundMessage>,
    highest_acked: Option<u64>,
}

impl PendingLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` under its sequence number.
    ///
    /// Returns `false` and leaves the existing entry in place if the sequence
    /// is already recorded.
    pub fn record(&mut self, message: OutboundMessage) -> bool {
        match self.entries.entry(message.sequence) {
            Entry::Occupied(_) => {
                tracing::warn!(seq = message.sequence, "sequence already pending, keeping original");
                false
            }
            Entry::Vacant(slot) => {
                let _ = slot.insert(message);
                true
            }
        }
    }

    /// Remove every entry with `sequence <= ack_sequence`.
    ///
    /// Returns how many entries were removed. Acking an already-cleared
    /// range is a no-op.
    pub fn acknowledge_through(&mut self, ack_sequence: u64) -> usize {
        let before = self.entries.len();
        self.entries = match ack_sequence.checked_add(1) {
            Some(first_kept) => self.entries.split_off(&first_kept),
            None => BTreeMap::new(),
        };
        self.highest_acked = Some(self.highest_acked.map_or(ack_sequence, |h| h.max(ack_sequence)));
        before - self.entries.len()
    }

    /// All pending messages in ascending sequence order, without removing them.
    pub fn drain_in_order(&self) -> Vec<OutboundMessage> {
        self.entries.values().cloned().collect()
    }

    /// Number of unacknowledged messages.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest sequence number ever acknowledged.
    pub fn highest_acked(&self) -> Option<u64> {
        self.highest_acked
    }

    /// Drop every pending message (explicit teardown).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
