//! A client-side coordination layer for multi-party computation proxies.
//!
//! In the setting this crate targets, a computation is carried out by several
//! mutually distrusting parties, each holding one secret share of every value.
//! A client never talks to the engines doing the computation directly. Instead,
//! each party exposes a *proxy*, and the client has to talk to every proxy
//! at once:
//!
//! - it opens a session with each proxy,
//! - it submits its inputs to all of them,
//! - it collects one share of the output from each of them.
//!
//! This crate handles the coordination part of that job, i.e. keeping track
//! of a session per party, running each operation against every party concurrently,
//! and turning the individual results into a single answer.
//!
//! # Design
//!
//! The networking and the cryptography are left to the caller, through two traits:
//!
//! - [ProxyTransport] performs a single request against a single proxy.
//! - [CryptoProvider] decrypts the output of parties which encrypt it.
//!   [MeowCipher] is provided as a ready-made implementation.
//!
//! The [Aggregator] is the main entry point. Given an ordered list of [PartyRecord]s,
//! it runs an operation on every party, and answers in the same order, so the position
//! of a party in the list is how you find its result.
//!
//! ```ignore
//! let mut aggregator = Aggregator::from_config(transport, MeowCipher, &config);
//! let outcomes = aggregator.connect_all(&config.parties).await?;
//! if all_connected(&outcomes) {
//!     aggregator.send_all(&config.parties, &inputs).await?;
//!     loop {
//!         match aggregator.consume_all(&config.parties, config.consume_wait()).await {
//!             Ok(shares) => break shares,
//!             Err(e) if e.is_retryable() => continue,
//!             Err(e) => return Err(e.into()),
//!         }
//!     }
//! }
//! ```
//!
//! There are two kinds of operations:
//!
//! - Connecting, checking, and disconnecting report on each party individually.
//!   A party failing doesn't fail the operation, it just shows up in that party's [OperationOutcome].
//! - Consuming output and sending input are all or nothing.
//!   Having only some of the shares of a value is useless, so any party failing fails the whole operation.
//!
//! Output being produced asynchronously, consuming it may find that some parties
//! have nothing yet. This is reported as a distinct, retryable, error, and it's up
//! to the caller to decide when to ask again.
//!
//! # Concurrency
//!
//! Every operation runs one task per party, on a small executor scoped to that operation.
//! The sessions are only touched as those tasks complete, one at a time, so no locking is needed.
//! Operations which modify sessions take `&mut self`, so a new round can't start while another
//! is still going on.
mod aggregator;
mod config;
mod crypto;
mod party;
mod serde;
mod session;
mod status;
mod transport;

pub use aggregator::{AggregateError, Aggregator, ValidationError};
pub use config::{ClientConfig, ProtocolParameters};
pub use crypto::{CryptoError, CryptoProvider, MeowCipher};
pub use party::{PartyEndpoint, PartyKey, PartyRecord};
pub use session::{SessionId, SessionStore};
pub use status::{all_connected, OperationOutcome, StatusCode};
pub use transport::{Delivery, ProxyTransport, TransportError};
