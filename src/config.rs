//! Configuration for a coordinating client.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{party::PartyRecord, session::SessionId};

const DEFAULT_CONSUME_WAIT_MS: u64 = 1_000;
pub(crate) const DEFAULT_CONSUME_GRACE_MS: u64 = 500;

/// Parameters shared by every party in a coordination round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// The path prefix of the proxy API, e.g. `/api/v1`.
    pub api_root: String,
    /// A session id chosen by the caller, rather than by the proxies.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Public key material forwarded to every proxy on connection.
    #[serde(default)]
    pub public_key: Option<Vec<u8>>,
}

impl ProtocolParameters {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            session_id: None,
            public_key: None,
        }
    }
}

/// Everything needed to set up an [Aggregator](crate::Aggregator) and the parties it talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub parameters: ProtocolParameters,
    #[serde(default)]
    pub parties: Vec<PartyRecord>,
    /// How long a proxy may hold a consume request open.
    #[serde(default = "default_consume_wait_ms")]
    pub consume_wait_ms: u64,
    /// Extra time we give a proxy on top of the wait, before treating it as not ready.
    #[serde(default = "default_consume_grace_ms")]
    pub consume_grace_ms: u64,
}

fn default_consume_wait_ms() -> u64 {
    DEFAULT_CONSUME_WAIT_MS
}

fn default_consume_grace_ms() -> u64 {
    DEFAULT_CONSUME_GRACE_MS
}

impl ClientConfig {
    pub fn new(parameters: ProtocolParameters, parties: Vec<PartyRecord>) -> Self {
        Self {
            parameters,
            parties,
            consume_wait_ms: DEFAULT_CONSUME_WAIT_MS,
            consume_grace_ms: DEFAULT_CONSUME_GRACE_MS,
        }
    }

    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn consume_wait(&self) -> Duration {
        Duration::from_millis(self.consume_wait_ms)
    }

    pub fn consume_grace(&self) -> Duration {
        Duration::from_millis(self.consume_grace_ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::party::PartyEndpoint;

    #[test]
    fn test_from_json_with_defaults() {
        let config = ClientConfig::from_json(
            r#"{
                "parameters": { "api_root": "/api" },
                "parties": [
                    { "endpoint": "http://p0:8080" },
                    { "endpoint": "http://p1:8080", "encrypted": true, "key": [1, 2, 3] },
                    { "encrypted": false }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.parameters.api_root, "/api");
        assert_eq!(config.parameters.session_id, None);
        assert_eq!(config.parties.len(), 3);
        assert_eq!(
            config.parties[0].endpoint,
            Some(PartyEndpoint::from("http://p0:8080"))
        );
        assert!(config.parties[1].decryption_key().is_some());
        assert!(config.parties[2].endpoint.is_none());
        assert_eq!(config.consume_wait(), Duration::from_millis(1_000));
        assert_eq!(config.consume_grace(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_json_with_session_and_key() {
        let config = ClientConfig::from_json(
            r#"{
                "parameters": {
                    "api_root": "/api",
                    "session_id": "shared-session",
                    "public_key": [9, 9]
                },
                "consume_wait_ms": 250
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.parameters.session_id,
            Some(SessionId::new("shared-session"))
        );
        assert_eq!(config.parameters.public_key, Some(vec![9, 9]));
        assert!(config.parties.is_empty());
        assert_eq!(config.consume_wait(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_parameters_is_an_error() {
        assert!(ClientConfig::from_json(r#"{ "parties": [] }"#).is_err());
    }
}
