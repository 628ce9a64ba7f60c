//! Transport error types.
//!
//! These errors never reach callers of the session API. They are produced by
//! connectors and consumed by the reconnection path, which logs them and
//! decides whether to retry.

use thiserror::Error;

/// Errors raised while establishing a connection to the live-session endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint address could not be built from the target.
    #[error("invalid endpoint address '{address}': {reason}")]
    InvalidAddress {
        /// The address (or base) that was rejected.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The socket could not be opened.
    #[error("connect to {url} failed: {reason}")]
    ConnectFailed {
        /// Endpoint URL with the credential redacted.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The socket did not open within the per-attempt bound.
    #[error("connect to {url} timed out after {timeout_ms}ms")]
    ConnectTimeout {
        /// Endpoint URL with the credential redacted.
        url: String,
        /// How long we waited.
        timeout_ms: u64,
    },
}

impl TransportError {
    /// Whether this error came from the per-attempt connect bound.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. })
    }
}

/// Strip the `token` query parameter from an endpoint URL for logging.
pub fn redact_token(url: &str) -> String {
    match url.split_once("token=") {
        Some((head, tail)) => {
            let rest = tail.find('&').map_or("", |i| &tail[i..]);
            format!("{head}token=***{rest}")
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn connect_failed_display() {
        let err = TransportError::ConnectFailed {
            url: "ws://h/live/s/ws".into(),
            reason: "refused".into(),
        };
        assert_eq!(err.to_string(), "connect to ws://h/live/s/ws failed: refused");
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeout_display() {
        let err = TransportError::ConnectTimeout {
            url: "wss://h/live/s/ws".into(),
            timeout_ms: 10_000,
        };
        assert!(err.to_string().contains("10000ms"));
        assert!(err.is_timeout());
        assert_matches!(err, TransportError::ConnectTimeout { timeout_ms: 10_000, .. });
    }

    #[test]
    fn invalid_address_display() {
        let err = TransportError::InvalidAddress {
            address: "ftp://x".into(),
            reason: "unsupported scheme".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid endpoint address 'ftp://x': unsupported scheme"
        );
    }

    #[test]
    fn redact_token_hides_credential() {
        assert_eq!(
            redact_token("ws://h/live/s/ws?token=abc%20def"),
            "ws://h/live/s/ws?token=***"
        );
    }

    #[test]
    fn redact_token_keeps_trailing_params() {
        assert_eq!(
            redact_token("ws://h/ws?token=abc&v=2"),
            "ws://h/ws?token=***&v=2"
        );
    }

    #[test]
    fn redact_token_without_token_is_identity() {
        assert_eq!(redact_token("ws://h/ws"), "ws://h/ws");
    }
}
