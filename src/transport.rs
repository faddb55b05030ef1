//! The network side of talking to a party's proxy.
//!
//! This crate doesn't implement any networking itself. Instead, the caller
//! provides an implementation of [ProxyTransport], which knows how to reach
//! a single proxy and perform one operation against it. The
//! [Aggregator](crate::Aggregator) then takes care of running that operation
//! against every party at once.
use core::fmt;
use std::{error, io, time::Duration};

use crate::{config::ProtocolParameters, party::PartyEndpoint, session::SessionId};

/// Represents an error which can happen when talking to a single proxy.
#[derive(Debug)]
pub enum TransportError {
    /// The proxy answered, but with an error status.
    Status { code: u16, message: String },
    /// We couldn't reach the proxy.
    Io(io::Error),
    /// Some generic error happened.
    Other(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Status { code, message } => {
                write!(f, "proxy returned status {}: {}", code, message)
            }
            TransportError::Io(e) => write!(f, "io error: {}", e),
            TransportError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for TransportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            TransportError::Status { .. } => None,
            TransportError::Io(e) => Some(e),
            TransportError::Other(e) => Some(e.as_ref()),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Box<dyn error::Error + Send + Sync>> for TransportError {
    fn from(e: Box<dyn error::Error + Send + Sync>) -> Self {
        Self::Other(e)
    }
}

/// What a proxy hands back when asked for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The raw bytes of this party's share of the output.
    Payload(Vec<u8>),
    /// Nothing has been produced yet, ask again later.
    NoContent,
}

/// A trait for reaching a single party's proxy.
///
/// Each method performs exactly one request against one proxy. Implementations
/// don't need to worry about sessions or other parties: the aggregator decides
/// which calls to make, and with which session.
#[allow(async_fn_in_trait)]
pub trait ProxyTransport {
    /// Open a session with a proxy, returning its identifier.
    async fn connect(
        &self,
        endpoint: &PartyEndpoint,
        params: &ProtocolParameters,
    ) -> Result<SessionId, TransportError>;

    /// Check that a session is still alive.
    async fn check(
        &self,
        endpoint: &PartyEndpoint,
        api_root: &str,
        session: &SessionId,
    ) -> Result<(), TransportError>;

    /// Tear down a session.
    async fn disconnect(
        &self,
        endpoint: &PartyEndpoint,
        api_root: &str,
        session: &SessionId,
    ) -> Result<(), TransportError>;

    /// Fetch the output waiting for us, if any.
    ///
    /// The proxy may hold the request open for up to `wait` before answering
    /// with [Delivery::NoContent].
    async fn consume(
        &self,
        endpoint: &PartyEndpoint,
        api_root: &str,
        session: &SessionId,
        wait: Duration,
    ) -> Result<Delivery, TransportError>;

    /// Submit an encoded payload.
    async fn send(
        &self,
        endpoint: &PartyEndpoint,
        api_root: &str,
        session: &SessionId,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}
