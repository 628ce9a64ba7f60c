//! # classlink-transport
//!
//! Client-side transport for a live-classroom session server: one persistent
//! WebSocket, a join handshake, heartbeat pings, backoff reconnection, and
//! at-least-once delivery through sequence numbers and cumulative acks.
//!
//! - [`codec`]: one JSON object per frame
//! - [`ledger`]: outbound messages awaiting acknowledgement
//! - [`heartbeat`]: periodic liveness pings while open
//! - [`backoff`]: reconnect delay table and attempt ceiling
//! - [`session`]: the lifecycle state machine callers interact with
//! - [`sink`]: the callback through which inbound events are delivered
//!
//! Socket I/O sits behind the [`Connector`] trait; [`TungsteniteConnector`]
//! is the production implementation.

#![deny(unsafe_code)]

pub mod backoff;
pub mod codec;
pub mod config;
pub mod connector;
pub mod heartbeat;
pub mod ledger;
pub mod link;
pub mod session;
pub mod sink;
pub mod target;
pub mod timer;

pub use backoff::{ReconnectDecision, ReconnectPolicy, ReconnectScheduler};
pub use classlink_core::TransportError;
pub use config::TransportConfig;
pub use connector::TungsteniteConnector;
pub use ledger::{OutboundMessage, PendingLedger};
pub use link::{Connector, Link, LinkEvent, LinkPeer};
pub use session::{LiveSession, SessionHandle, SessionState};
pub use sink::{ChannelSink, EventSink, InboundEvent};
pub use target::{ConnectionTarget, Role};
