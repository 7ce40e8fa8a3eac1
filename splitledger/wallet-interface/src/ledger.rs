//! Public ledger query contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenient result alias used across ledger query helpers.
pub type LedgerQueryResult<T> = Result<T, LedgerQueryError>;

/// Errors surfaced by the public ledger query service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerQueryError {
    /// The endpoint could not be reached.
    #[error("ledger endpoint unreachable: {0}")]
    Network(String),
    /// The endpoint answered with an unexpected HTTP status.
    #[error("ledger endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The response body could not be decoded.
    #[error("ledger response could not be decoded: {0}")]
    Decode(String),
}

impl LedgerQueryError {
    /// User-facing message for the error.
    pub fn user_message(&self) -> String {
        match self {
            LedgerQueryError::Network(_) => "the ledger explorer is unreachable".to_string(),
            LedgerQueryError::Status { status } => {
                format!("the ledger explorer answered with HTTP {status}")
            }
            LedgerQueryError::Decode(_) => {
                "the ledger explorer returned an unexpected response".to_string()
            }
        }
    }
}

/// Transaction as reported by the public ledger.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerTransaction {
    /// Canonical transaction id.
    pub id: String,
    /// Finalization status (`accepted`, `rejected`, ...).
    #[serde(default)]
    pub status: String,
    /// Plaintext outputs of the execution's transitions, in order.
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Read-only access to the public ledger.
///
/// A missing mapping entry or unknown transaction is `Ok(None)`, not an
/// error: the ledger may simply not have caught up yet.
#[async_trait]
pub trait LedgerQueryService: Send + Sync {
    /// Read a public mapping value by key.
    async fn read_mapping(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> LedgerQueryResult<Option<String>>;

    /// Read a transaction by id.
    async fn read_transaction(&self, id: &str) -> LedgerQueryResult<Option<LedgerTransaction>>;
}
