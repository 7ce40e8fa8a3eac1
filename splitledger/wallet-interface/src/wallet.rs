//! Wallet service contract.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{ExecutionRequest, ExecutionResponse, StatusReport, WalletRecord, WalletTransaction};

/// Convenient result alias used across wallet service helpers.
pub type WalletServiceResult<T> = Result<T, WalletServiceError>;

/// Unified error surfaced when communicating with the wallet service.
#[derive(Debug, Error, Clone)]
pub enum WalletServiceError {
    /// Transport-level failures such as a disconnected wallet or RPC timeout.
    #[error("wallet unavailable: {message}")]
    Network {
        /// User-facing message explaining the failure.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
    /// The caller does not own the record, or the ciphertext is malformed.
    #[error("record decryption failed: {reason}")]
    Decrypt {
        /// Reason supplied by the wallet.
        reason: String,
    },
    /// The executor refused the inputs for the requested function.
    #[error("wallet rejected the program inputs: {reason}")]
    RejectedInput {
        /// Reason supplied by the wallet.
        reason: String,
    },
    /// The wallet does not implement the requested capability.
    #[error("wallet does not support {capability}")]
    Unsupported {
        /// Name of the missing capability.
        capability: &'static str,
    },
    /// Any other wallet-side failure.
    #[error("wallet error: {0}")]
    Other(String),
}

impl WalletServiceError {
    /// Construct a network error with the default message.
    pub fn network(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Network {
            message: "wallet service unreachable".to_string(),
            source: Some(Arc::new(error)),
        }
    }

    /// Construct a network error with a custom message and no source.
    pub fn network_with_message(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Construct a decryption error.
    pub fn decrypt(reason: impl Into<String>) -> Self {
        Self::Decrypt {
            reason: reason.into(),
        }
    }

    /// Construct an input rejection.
    pub fn rejected_input(reason: impl Into<String>) -> Self {
        Self::RejectedInput {
            reason: reason.into(),
        }
    }

    /// Stable code describing the error category.
    pub fn code(&self) -> &'static str {
        match self {
            WalletServiceError::Network { .. } => "WALLET_UNAVAILABLE",
            WalletServiceError::Decrypt { .. } => "DECRYPT_ERROR",
            WalletServiceError::RejectedInput { .. } => "REJECTED_INPUT",
            WalletServiceError::Unsupported { .. } => "UNSUPPORTED",
            WalletServiceError::Other(_) => "WALLET_ERROR",
        }
    }

    /// User-facing message for the error.
    pub fn user_message(&self) -> String {
        match self {
            WalletServiceError::Network { message, .. } => message.clone(),
            WalletServiceError::Decrypt { .. } => {
                "the wallet could not decrypt a record it does not own".to_string()
            }
            WalletServiceError::RejectedInput { .. } => {
                "the wallet rejected the selected record for this action".to_string()
            }
            WalletServiceError::Unsupported { capability } => {
                format!("the connected wallet does not support {capability}")
            }
            WalletServiceError::Other(reason) => reason.clone(),
        }
    }
}

/// Abstraction over the wallet surface consumed by the engine.
///
/// Enumeration may lag behind the chain and return fewer records than
/// exist; callers tolerate partial results. The two optional capabilities
/// default to `Ok(None)`, which callers treat as "ask someone else".
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Enumerate the records the wallet holds for a program.
    async fn records(&self, program_id: &str) -> WalletServiceResult<Vec<WalletRecord>>;

    /// Decrypt a record ciphertext into its plaintext form.
    async fn decrypt(&self, ciphertext: &str) -> WalletServiceResult<String>;

    /// Execute a program function and return the submission id.
    async fn execute(&self, request: &ExecutionRequest) -> WalletServiceResult<ExecutionResponse>;

    /// Report the status of a submitted transaction, if supported.
    async fn transaction_status(
        &self,
        _transaction_id: &str,
    ) -> WalletServiceResult<Option<StatusReport>> {
        Ok(None)
    }

    /// Return the wallet's submission history for a program, if supported.
    async fn transaction_history(
        &self,
        _program_id: &str,
    ) -> WalletServiceResult<Option<Vec<WalletTransaction>>> {
        Ok(None)
    }
}
