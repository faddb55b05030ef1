//! This module provides the coordination of operations across all parties.
//!
//! A client of an MPC computation never talks to a single party: every value
//! it submits has to reach every proxy, and every output it reads is split
//! into one share per proxy. The [Aggregator] runs each operation against all
//! of the parties at once, keeps track of the session it holds with each of
//! them, and folds the individual results back into a single answer, in the
//! order the parties were given.
//!
//! Operations come in two flavors:
//! - [Aggregator::connect_all], [Aggregator::check_all] and [Aggregator::disconnect_all]
//!   always report back on every party, with an [OperationOutcome] each.
//! - [Aggregator::consume_all] and [Aggregator::send_all] are all-or-nothing,
//!   since a partial set of shares is useless. These fail on the first party that fails.
use core::fmt;
use std::{
    error,
    time::{Duration, Instant},
};

use serde::{de::DeserializeOwned, Serialize};
use smol::{future, Timer};
use tracing::{debug, warn};

use crate::{
    config::{ClientConfig, ProtocolParameters, DEFAULT_CONSUME_GRACE_MS},
    crypto::{CryptoError, CryptoProvider},
    party::{self, PartyEndpoint, PartyRecord},
    serde::{decode, encode},
    session::{SessionId, SessionStore},
    status::{OperationOutcome, StatusCode},
    transport::{Delivery, ProxyTransport, TransportError},
};

mod fanout;

use fanout::FanOut;

/// Represents an error in the party list an operation was given.
///
/// These are always detected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingEndpoint {
        position: usize,
    },
    DuplicateEndpoint {
        position: usize,
        endpoint: PartyEndpoint,
    },
    /// The party is flagged as encrypted, but has no key to decrypt with.
    MissingKey {
        position: usize,
        endpoint: PartyEndpoint,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingEndpoint { position } => {
                write!(f, "party {} has no endpoint", position)
            }
            ValidationError::DuplicateEndpoint { position, endpoint } => {
                write!(f, "party {} repeats endpoint {}", position, endpoint)
            }
            ValidationError::MissingKey { position, endpoint } => write!(
                f,
                "party {} ({}) is encrypted but has no key",
                position, endpoint
            ),
        }
    }
}

impl error::Error for ValidationError {}

/// Represents an error which rejects an all-or-nothing operation.
#[derive(Debug)]
pub enum AggregateError {
    Validation(ValidationError),
    /// A party we need has no session, so nothing was attempted.
    NoSession {
        position: usize,
        endpoint: PartyEndpoint,
    },
    Transport {
        position: usize,
        endpoint: PartyEndpoint,
        source: TransportError,
    },
    Crypto {
        position: usize,
        endpoint: PartyEndpoint,
        source: CryptoError,
    },
    /// Some parties have nothing for us yet.
    ///
    /// This is the only retryable error: asking again later may succeed.
    NotReady { positions: Vec<usize> },
    Encoding(rmp_serde::encode::Error),
    Decoding {
        position: usize,
        source: rmp_serde::decode::Error,
    },
}

impl AggregateError {
    /// Whether the same operation might succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AggregateError::NotReady { .. })
    }

    /// The position of the party responsible for this error, if there's a single one.
    pub fn position(&self) -> Option<usize> {
        match self {
            AggregateError::Validation(
                ValidationError::MissingEndpoint { position }
                | ValidationError::DuplicateEndpoint { position, .. }
                | ValidationError::MissingKey { position, .. },
            ) => Some(*position),
            AggregateError::NoSession { position, .. }
            | AggregateError::Transport { position, .. }
            | AggregateError::Crypto { position, .. }
            | AggregateError::Decoding { position, .. } => Some(*position),
            AggregateError::NotReady { .. } | AggregateError::Encoding(_) => None,
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::Validation(e) => write!(f, "invalid party list: {}", e),
            AggregateError::NoSession { position, endpoint } => {
                write!(f, "party {} ({}) has no active session", position, endpoint)
            }
            AggregateError::Transport {
                position,
                endpoint,
                source,
            } => write!(f, "party {} ({}) failed: {}", position, endpoint, source),
            AggregateError::Crypto {
                position,
                endpoint,
                source,
            } => write!(
                f,
                "failed to decrypt output of party {} ({}): {}",
                position, endpoint, source
            ),
            AggregateError::NotReady { positions } => {
                write!(f, "no output yet from parties {:?}", positions)
            }
            AggregateError::Encoding(e) => write!(f, "failed to encode payload: {}", e),
            AggregateError::Decoding { position, source } => {
                write!(f, "failed to decode output of party {}: {}", position, source)
            }
        }
    }
}

impl error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            AggregateError::Validation(e) => Some(e),
            AggregateError::Transport { source, .. } => Some(source),
            AggregateError::Crypto { source, .. } => Some(source),
            AggregateError::Encoding(e) => Some(e),
            AggregateError::Decoding { source, .. } => Some(source),
            AggregateError::NoSession { .. } | AggregateError::NotReady { .. } => None,
        }
    }
}

impl From<ValidationError> for AggregateError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Coordinates a single logical client across every party's proxy.
///
/// One aggregator should be created per logical client. It owns the sessions
/// held with each proxy, so operations which change them take `&mut self`,
/// which also guarantees that two connection rounds never overlap.
pub struct Aggregator<T, C> {
    transport: T,
    crypto: C,
    params: ProtocolParameters,
    sessions: SessionStore,
    consume_grace: Duration,
}

impl<T: ProxyTransport, C: CryptoProvider> Aggregator<T, C> {
    pub fn new(transport: T, crypto: C, params: ProtocolParameters) -> Self {
        Self {
            transport,
            crypto,
            params,
            sessions: SessionStore::new(),
            consume_grace: Duration::from_millis(DEFAULT_CONSUME_GRACE_MS),
        }
    }

    pub fn from_config(transport: T, crypto: C, config: &ClientConfig) -> Self {
        let mut out = Self::new(transport, crypto, config.parameters.clone());
        out.consume_grace = config.consume_grace();
        out
    }

    /// Set how long past its wait budget a consume request may run before the party counts as not ready.
    pub fn with_consume_grace(mut self, grace: Duration) -> Self {
        self.consume_grace = grace;
        self
    }

    pub fn parameters(&self) -> &ProtocolParameters {
        &self.params
    }

    /// Change the parameters used from the next operation on.
    pub fn parameters_mut(&mut self) -> &mut ProtocolParameters {
        &mut self.params
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn session_id(&self, endpoint: &PartyEndpoint) -> Option<&SessionId> {
        self.sessions.try_get(endpoint)
    }

    /// Open a session with every party, starting a new round.
    ///
    /// All previous sessions are forgotten first. A party we fail to connect to
    /// is reported as [StatusCode::Failure], the others as [StatusCode::Connected].
    ///
    /// Each endpoint keys one session, so a list naming the same endpoint twice
    /// is rejected with [ValidationError::DuplicateEndpoint] before any request is made.
    pub async fn connect_all(
        &mut self,
        parties: &[PartyRecord],
    ) -> Result<Vec<OperationOutcome>, ValidationError> {
        let endpoints = party::endpoints(parties)?;
        self.sessions.reset();

        let transport = &self.transport;
        let params = &self.params;
        let sessions = &mut self.sessions;

        let fanout = FanOut::new(endpoints.len());
        for (position, &endpoint) in endpoints.iter().enumerate() {
            fanout.spawn(position, transport.connect(endpoint, params));
        }

        let outcomes = fanout
            .join_all(|position, res| {
                let endpoint = endpoints[position];
                match res {
                    Ok(session) => {
                        debug!(position, %endpoint, "connected to party");
                        sessions.store(endpoint.clone(), session);
                        OperationOutcome::new(position, StatusCode::Connected)
                    }
                    Err(error) => {
                        warn!(position, %endpoint, %error, "failed to connect to party");
                        sessions.remove(endpoint);
                        OperationOutcome::failed(position, StatusCode::Failure, error)
                    }
                }
            })
            .await;
        Ok(outcomes)
    }

    /// Check that the session with every party is still alive.
    ///
    /// A party without a session is reported as [StatusCode::Failure], without
    /// contacting it. A party whose check fails is reported as [StatusCode::Disconnected].
    pub async fn check_all(
        &self,
        parties: &[PartyRecord],
    ) -> Result<Vec<OperationOutcome>, ValidationError> {
        let endpoints = party::endpoints(parties)?;
        let api_root = self.params.api_root.as_str();

        let fanout = FanOut::new(endpoints.len());
        for (position, &endpoint) in endpoints.iter().enumerate() {
            let transport = &self.transport;
            let session = self.sessions.try_get(endpoint);
            fanout.spawn(position, async move {
                match session {
                    Some(session) => Some(transport.check(endpoint, api_root, session).await),
                    None => None,
                }
            });
        }

        let outcomes = fanout
            .join_all(|position, res| {
                let endpoint = endpoints[position];
                match res {
                    None => OperationOutcome::failed(
                        position,
                        StatusCode::Failure,
                        "no active session",
                    ),
                    Some(Ok(())) => OperationOutcome::new(position, StatusCode::Connected),
                    Some(Err(error)) => {
                        warn!(position, %endpoint, %error, "party failed its session check");
                        OperationOutcome::failed(position, StatusCode::Disconnected, error)
                    }
                }
            })
            .await;
        Ok(outcomes)
    }

    /// Tear down the session with every party.
    ///
    /// The local session is always dropped, even if the proxy couldn't be told
    /// about it. Every party ends up [StatusCode::Disconnected], so this can be
    /// called repeatedly.
    pub async fn disconnect_all(
        &mut self,
        parties: &[PartyRecord],
    ) -> Result<Vec<OperationOutcome>, ValidationError> {
        let endpoints = party::endpoints(parties)?;

        let transport = &self.transport;
        let api_root = self.params.api_root.as_str();
        let sessions = &mut self.sessions;

        let fanout = FanOut::new(endpoints.len());
        for (position, &endpoint) in endpoints.iter().enumerate() {
            let session = sessions.try_get(endpoint).cloned();
            fanout.spawn(position, async move {
                match session {
                    Some(session) => Some(transport.disconnect(endpoint, api_root, &session).await),
                    None => None,
                }
            });
        }

        let outcomes = fanout
            .join_all(|position, res| {
                let endpoint = endpoints[position];
                sessions.remove(endpoint);
                match res {
                    Some(Err(error)) => {
                        warn!(position, %endpoint, %error, "failed to close session with party");
                        OperationOutcome::failed(position, StatusCode::Disconnected, error)
                    }
                    Some(Ok(())) => {
                        debug!(position, %endpoint, "disconnected from party");
                        OperationOutcome::new(position, StatusCode::Disconnected)
                    }
                    None => OperationOutcome::new(position, StatusCode::Disconnected),
                }
            })
            .await;
        Ok(outcomes)
    }

    /// Find the session for every endpoint, failing if any is missing.
    fn active_sessions(
        &self,
        endpoints: &[&PartyEndpoint],
    ) -> Result<Vec<&SessionId>, AggregateError> {
        endpoints
            .iter()
            .enumerate()
            .map(|(position, &endpoint)| {
                self.sessions
                    .try_get(endpoint)
                    .ok_or_else(|| AggregateError::NoSession {
                        position,
                        endpoint: endpoint.clone(),
                    })
            })
            .collect()
    }

    /// Fetch each party's share of the output, in party order.
    ///
    /// Each proxy may hold the request for up to `wait`. If some of them have
    /// nothing yet, this returns [AggregateError::NotReady], and the caller
    /// should try again later. Payloads from encrypted parties are decrypted
    /// with that party's key.
    pub async fn consume_all(
        &self,
        parties: &[PartyRecord],
        wait: Duration,
    ) -> Result<Vec<Vec<u8>>, AggregateError> {
        let endpoints = party::endpoints_with_keys(parties)?;
        let sessions = self.active_sessions(&endpoints)?;

        let transport = &self.transport;
        let crypto = &self.crypto;
        let api_root = self.params.api_root.as_str();
        let budget = wait.saturating_add(self.consume_grace);

        let fanout = FanOut::new(endpoints.len());
        for (position, (record, &endpoint)) in parties.iter().zip(&endpoints).enumerate() {
            let session = sessions[position];
            let key = record.decryption_key();
            fanout.spawn(position, async move {
                let fetch = transport.consume(endpoint, api_root, session, wait);
                let deadline = async {
                    // A budget too large to represent never expires.
                    match Instant::now().checked_add(budget) {
                        Some(at) => {
                            Timer::at(at).await;
                        }
                        None => future::pending::<()>().await,
                    }
                    Ok::<_, TransportError>(Delivery::NoContent)
                };
                let data = match future::or(fetch, deadline).await {
                    Ok(Delivery::Payload(data)) => data,
                    Ok(Delivery::NoContent) => return Ok(None),
                    Err(source) => {
                        return Err(AggregateError::Transport {
                            position,
                            endpoint: endpoint.clone(),
                            source,
                        })
                    }
                };
                match key {
                    None => Ok(Some(data)),
                    Some(key) => crypto.decrypt(key, &data).map(Some).map_err(|source| {
                        AggregateError::Crypto {
                            position,
                            endpoint: endpoint.clone(),
                            source,
                        }
                    }),
                }
            });
        }

        let delivered = fanout
            .try_join_all(|position, res| {
                if let Err(error) = &res {
                    let endpoint = endpoints[position];
                    warn!(position, %endpoint, %error, "consume failed");
                }
                res
            })
            .await?;

        let positions: Vec<usize> = delivered
            .iter()
            .enumerate()
            .filter(|(_, data)| data.is_none())
            .map(|(i, _)| i)
            .collect();
        if !positions.is_empty() {
            debug!(?positions, "parties have no output yet");
            return Err(AggregateError::NotReady { positions });
        }

        Ok(delivered.into_iter().flatten().collect())
    }

    /// Like [Aggregator::consume_all], but also decode each party's share.
    pub async fn consume_decoded<D: DeserializeOwned>(
        &self,
        parties: &[PartyRecord],
        wait: Duration,
    ) -> Result<Vec<D>, AggregateError> {
        self.consume_all(parties, wait)
            .await?
            .iter()
            .enumerate()
            .map(|(position, data)| {
                decode(data).map_err(|source| AggregateError::Decoding { position, source })
            })
            .collect()
    }

    /// Submit the same payload to every party.
    ///
    /// Each proxy splits the payload into its own share, so every one of them
    /// receives identical bytes. This fails as soon as any party rejects it.
    pub async fn send_all<P: Serialize + ?Sized>(
        &self,
        parties: &[PartyRecord],
        payload: &P,
    ) -> Result<(), AggregateError> {
        let endpoints = party::endpoints(parties)?;
        let sessions = self.active_sessions(&endpoints)?;
        let encoded = encode(payload).map_err(AggregateError::Encoding)?;

        let transport = &self.transport;
        let api_root = self.params.api_root.as_str();
        let data = encoded.as_slice();

        let fanout = FanOut::new(endpoints.len());
        for (position, &endpoint) in endpoints.iter().enumerate() {
            fanout.spawn(
                position,
                transport.send(endpoint, api_root, sessions[position], data),
            );
        }

        fanout
            .try_join_all(|position, res| {
                res.map_err(|source| {
                    let endpoint = endpoints[position];
                    warn!(position, %endpoint, error = %source, "send failed");
                    AggregateError::Transport {
                        position,
                        endpoint: endpoint.clone(),
                        source,
                    }
                })
            })
            .await?;
        debug!(parties = endpoints.len(), bytes = data.len(), "payload sent");
        Ok(())
    }
}
