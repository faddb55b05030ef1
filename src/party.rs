//! This module holds some utilities for working with parties.
//!
//! Every aggregated operation takes an ordered list of party records, and
//! answers with one result per record, in the same order.
//! This module provides the record types, their validation, and a container
//! for collecting one item per position.
use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::aggregator::ValidationError;

/// The address of one party's proxy.
///
/// This is opaque to the coordination layer, and only interpreted by the transport.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyEndpoint(String);

impl PartyEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyEndpoint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PartyEndpoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Key material used to decrypt what a party hands back to us.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyKey(Vec<u8>);

impl PartyKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

impl AsRef<[u8]> for PartyKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Keys never end up in logs.
impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey(<{} bytes>)", self.0.len())
    }
}

/// The description of a single party, as supplied by the caller.
///
/// The endpoint is optional here because records usually come from configuration.
/// Every operation rejects a list containing a record without one, before
/// touching the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    #[serde(default)]
    pub endpoint: Option<PartyEndpoint>,
    /// Whether the payloads this party produces are encrypted under `key`.
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub key: Option<PartyKey>,
}

impl PartyRecord {
    /// A plaintext party at a given endpoint.
    pub fn new(endpoint: impl Into<PartyEndpoint>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            encrypted: false,
            key: None,
        }
    }

    /// A party whose output is encrypted under the given key.
    pub fn encrypted(endpoint: impl Into<PartyEndpoint>, key: PartyKey) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            encrypted: true,
            key: Some(key),
        }
    }

    /// The key to decrypt this party's output with, if it is flagged as encrypted.
    pub fn decryption_key(&self) -> Option<&PartyKey> {
        if self.encrypted {
            self.key.as_ref()
        } else {
            None
        }
    }
}

/// Check that every record names an endpoint, and that no endpoint appears twice.
///
/// On success, this returns the endpoints in input order.
pub(crate) fn endpoints(records: &[PartyRecord]) -> Result<Vec<&PartyEndpoint>, ValidationError> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut out = Vec::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        let endpoint = record
            .endpoint
            .as_ref()
            .ok_or(ValidationError::MissingEndpoint { position })?;
        if !seen.insert(endpoint) {
            return Err(ValidationError::DuplicateEndpoint {
                position,
                endpoint: endpoint.clone(),
            });
        }
        out.push(endpoint);
    }
    Ok(out)
}

/// Like [endpoints], but also require that encrypted parties carry a key.
pub(crate) fn endpoints_with_keys(
    records: &[PartyRecord],
) -> Result<Vec<&PartyEndpoint>, ValidationError> {
    let out = endpoints(records)?;
    for (position, record) in records.iter().enumerate() {
        if record.encrypted && record.key.is_none() {
            return Err(ValidationError::MissingKey {
                position,
                endpoint: out[position].clone(),
            });
        }
    }
    Ok(out)
}

/// A map from positions in a party list to elements.
///
/// The idea is that you have one element for each party, filled in whatever
/// order the results happen to arrive.
#[derive(Debug, Clone)]
pub(crate) struct PartyMap<T> {
    data: Vec<Option<T>>,
    count: usize,
}

impl<T> PartyMap<T> {
    /// Create a new, empty, map for a given number of parties.
    pub fn new(size: usize) -> Self {
        // We could also require a T: Clone bound instead of doing this initialization manually.
        let mut data = Vec::with_capacity(size);
        for _ in 0..size {
            data.push(None);
        }

        Self { data, count: 0 }
    }

    /// Check if this map is full, i.e. if every party has put something in.
    pub fn full(&self) -> bool {
        self.count == self.data.len()
    }

    /// Place the data for a position in this map.
    ///
    /// This will assert that no data for that position already exists.
    pub fn put(&mut self, position: usize, data: T) {
        assert!(self.data[position].is_none());

        self.data[position] = Some(data);
        self.count += 1;
    }

    /// Consume the map, returning the elements in position order.
    pub fn into_vec(self) -> Vec<T> {
        debug_assert!(self.full());
        self.data.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_endpoints_keep_input_order() {
        let records = vec![
            PartyRecord::new("c"),
            PartyRecord::new("a"),
            PartyRecord::new("b"),
        ];
        let out: Vec<_> = endpoints(&records)
            .unwrap()
            .into_iter()
            .map(|e| e.as_str())
            .collect();
        assert_eq!(out, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_missing_endpoint_is_reported_with_position() {
        let mut records = vec![PartyRecord::new("a"), PartyRecord::new("b")];
        records[1].endpoint = None;
        assert_eq!(
            endpoints(&records).unwrap_err(),
            ValidationError::MissingEndpoint { position: 1 }
        );
    }

    #[test]
    fn test_duplicate_endpoint_is_rejected() {
        let records = vec![PartyRecord::new("a"), PartyRecord::new("a")];
        assert!(matches!(
            endpoints(&records),
            Err(ValidationError::DuplicateEndpoint { position: 1, .. })
        ));
    }

    #[test]
    fn test_encrypted_party_needs_a_key() {
        let mut record = PartyRecord::encrypted("a", PartyKey::new(vec![1u8; 32]));
        record.key = None;
        let records = vec![PartyRecord::new("b"), record];
        assert!(endpoints(&records).is_ok());
        assert!(matches!(
            endpoints_with_keys(&records),
            Err(ValidationError::MissingKey { position: 1, .. })
        ));
    }

    #[test]
    fn test_decryption_key_only_when_flagged() {
        let mut record = PartyRecord::encrypted("a", PartyKey::new(vec![7u8; 4]));
        assert!(record.decryption_key().is_some());
        record.encrypted = false;
        assert!(record.decryption_key().is_none());
    }

    #[test]
    fn test_party_map_orders_by_position() {
        let mut map = PartyMap::new(3);
        map.put(2, "c");
        map.put(0, "a");
        assert!(!map.full());
        map.put(1, "b");
        assert!(map.full());
        assert_eq!(map.into_vec(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_key_debug_hides_bytes() {
        let key = PartyKey::new(vec![0xAB; 3]);
        assert_eq!(format!("{:?}", key), "PartyKey(<3 bytes>)");
    }
}
