//! Classification of what happened to each party during an operation.
use serde::{Deserialize, Serialize};

/// The state a party ended up in after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Connected,
    Disconnected,
    Failure,
}

/// The result of an operation for a single party.
///
/// `position` is the index of the party in the list the operation was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub position: usize,
    pub status: StatusCode,
    pub payload: Option<Vec<u8>>,
    /// Why the operation failed for this party, if it did.
    pub failure: Option<String>,
}

impl OperationOutcome {
    pub fn new(position: usize, status: StatusCode) -> Self {
        Self {
            position,
            status,
            payload: None,
            failure: None,
        }
    }

    pub fn failed(position: usize, status: StatusCode, failure: impl ToString) -> Self {
        Self {
            position,
            status,
            payload: None,
            failure: Some(failure.to_string()),
        }
    }
}

/// Check whether every party in an outcome list is connected.
///
/// An empty list is never considered connected.
pub fn all_connected(outcomes: &[OperationOutcome]) -> bool {
    !outcomes.is_empty()
        && outcomes
            .iter()
            .all(|outcome| outcome.status == StatusCode::Connected)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_all_connected() {
        assert!(!all_connected(&[]));

        let connected = vec![
            OperationOutcome::new(0, StatusCode::Connected),
            OperationOutcome::new(1, StatusCode::Connected),
        ];
        assert!(all_connected(&connected));

        for status in [StatusCode::Disconnected, StatusCode::Failure] {
            let mut outcomes = connected.clone();
            outcomes.push(OperationOutcome::new(2, status));
            assert!(!all_connected(&outcomes));
        }
    }
}
