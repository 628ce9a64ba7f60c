//! Connection target: which live session to join, as whom, and where.

use std::fmt;
use std::str::FromStr;

use classlink_core::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Participant role in a live session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs the session.
    Teacher,
    /// Attends the session.
    #[default]
    Student,
    /// Watches without participating.
    Observer,
}

impl Role {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            "observer" => Ok(Self::Observer),
            other => Err(format!("unknown role '{other}' (expected teacher, student, or observer)")),
        }
    }
}

/// Immutable description of the session to join.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Live session identifier.
    pub session_id: String,
    /// Participant identity.
    pub participant_id: String,
    /// Participant role.
    pub role: Role,
    /// Name shown to other participants.
    pub display_name: Option<String>,
    /// Opaque bearer token.
    pub credential: String,
    /// Endpoint base (`host[:port][/prefix]`, optionally with a scheme).
    /// When absent the endpoint derives from the configured origin.
    pub endpoint_base: Option<String>,
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("session_id", &self.session_id)
            .field("participant_id", &self.participant_id)
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .field("credential", &"***")
            .field("endpoint_base", &self.endpoint_base)
            .finish()
    }
}

impl ConnectionTarget {
    /// Target a session with a credential; everything else defaulted.
    pub fn new(session_id: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            participant_id: String::new(),
            role: Role::default(),
            display_name: None,
            credential: credential.into(),
            endpoint_base: None,
        }
    }

    /// Set participant identity and role.
    #[must_use]
    pub fn with_participant(mut self, participant_id: impl Into<String>, role: Role) -> Self {
        self.participant_id = participant_id.into();
        self.role = role;
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set an explicit endpoint base.
    #[must_use]
    pub fn with_endpoint_base(mut self, base: impl Into<String>) -> Self {
        self.endpoint_base = Some(base.into());
        self
    }

    /// Whether session id and credential are both present.
    pub fn is_complete(&self) -> bool {
        !self.session_id.trim().is_empty() && !self.credential.is_empty()
    }

    /// `<ws-scheme>://<base>/live/<session_id>/ws?token=<credential>`.
    ///
    /// Without an explicit base, host and security come from `origin`.
    /// A bare base inherits the origin's security.
    pub fn endpoint_url(&self, origin: &str) -> Result<String, TransportError> {
        let (origin_scheme, origin_rest) = split_scheme(origin.trim());
        let origin_secure = match origin_scheme {
            Some(scheme) => is_secure(scheme).ok_or_else(|| unsupported(origin, scheme))?,
            None => false,
        };

        let (secure, host) = match self.endpoint_base.as_deref().map(str::trim) {
            Some(base) => match split_scheme(base) {
                (Some(scheme), rest) => (
                    is_secure(scheme).ok_or_else(|| unsupported(base, scheme))?,
                    rest.trim_end_matches('/'),
                ),
                (None, rest) => (origin_secure, rest.trim_end_matches('/')),
            },
            None => (
                origin_secure,
                origin_rest.split('/').next().unwrap_or_default(),
            ),
        };

        if host.is_empty() {
            return Err(TransportError::InvalidAddress {
                address: self.endpoint_base.clone().unwrap_or_else(|| origin.to_string()),
                reason: "no host".into(),
            });
        }

        let scheme = if secure { "wss" } else { "ws" };
        Ok(format!(
            "{scheme}://{host}/live/{}/ws?token={}",
            urlencoding::encode(&self.session_id),
            urlencoding::encode(&self.credential),
        ))
    }

    /// Body of the join handshake.
    pub fn join_payload(&self) -> Value {
        json!({
            "session_id": self.session_id,
            "participant_id": self.participant_id,
            "role": self.role,
            "display_name": self.display_name,
        })
    }
}

fn split_scheme(address: &str) -> (Option<&str>, &str) {
    match address.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, address),
    }
}

fn is_secure(scheme: &str) -> Option<bool> {
    match scheme.to_ascii_lowercase().as_str() {
        "https" | "wss" => Some(true),
        "http" | "ws" => Some(false),
        _ => None,
    }
}

fn unsupported(address: &str, scheme: &str) -> TransportError {
    TransportError::InvalidAddress {
        address: address.to_string(),
        reason: format!("unsupported scheme '{scheme}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn target() -> ConnectionTarget {
        ConnectionTarget::new("live-42", "tok/en+=")
            .with_participant("u-7", Role::Teacher)
            .with_display_name("Ada")
    }

    #[test]
    fn derives_from_insecure_origin() {
        let url = target().endpoint_url("http://127.0.0.1:8000").unwrap();
        assert_eq!(url, "ws://127.0.0.1:8000/live/live-42/ws?token=tok%2Fen%2B%3D");
    }

    #[test]
    fn derives_from_secure_origin_and_drops_path() {
        let url = target().endpoint_url("https://school.example/app/").unwrap();
        assert_eq!(url, "wss://school.example/live/live-42/ws?token=tok%2Fen%2B%3D");
    }

    #[test]
    fn bare_base_inherits_origin_security() {
        let t = target().with_endpoint_base("rt.school.example/edge/");
        let url = t.endpoint_url("https://school.example").unwrap();
        assert!(url.starts_with("wss://rt.school.example/edge/live/live-42/ws?token="));
    }

    #[test]
    fn explicit_base_scheme_wins() {
        let t = target().with_endpoint_base("ws://10.0.0.5:9000");
        let url = t.endpoint_url("https://school.example").unwrap();
        assert!(url.starts_with("ws://10.0.0.5:9000/live/"));

        let t = target().with_endpoint_base("https://rt.example");
        let url = t.endpoint_url("http://localhost").unwrap();
        assert!(url.starts_with("wss://rt.example/live/"));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let t = target().with_endpoint_base("ftp://files.example");
        assert_matches!(
            t.endpoint_url("http://localhost"),
            Err(TransportError::InvalidAddress { .. })
        );
    }

    #[test]
    fn empty_host_is_rejected() {
        assert_matches!(
            target().endpoint_url("https://"),
            Err(TransportError::InvalidAddress { .. })
        );
    }

    #[test]
    fn completeness() {
        assert!(target().is_complete());
        assert!(!ConnectionTarget::new("", "tok").is_complete());
        assert!(!ConnectionTarget::new("  ", "tok").is_complete());
        assert!(!ConnectionTarget::new("live-1", "").is_complete());
    }

    #[test]
    fn join_payload_fields() {
        let payload = target().join_payload();
        assert_eq!(payload["session_id"], "live-42");
        assert_eq!(payload["participant_id"], "u-7");
        assert_eq!(payload["role"], "teacher");
        assert_eq!(payload["display_name"], "Ada");

        let anonymous = ConnectionTarget::new("s", "t").join_payload();
        assert_eq!(anonymous["role"], "student");
        assert!(anonymous["display_name"].is_null());
    }

    #[test]
    fn debug_redacts_credential() {
        let rendered = format!("{:?}", target());
        assert!(!rendered.contains("tok/en"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn role_parsing() {
        assert_eq!("Observer".parse::<Role>(), Ok(Role::Observer));
        assert!("principal".parse::<Role>().is_err());
        assert_eq!(Role::Teacher.to_string(), "teacher");
    }
}
