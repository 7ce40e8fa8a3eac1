use splitledger_wallet_interface::{LedgerQueryError, WalletServiceError};
use thiserror::Error;

use crate::classify::RecordVariant;
use crate::repository::RepositoryError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failures that end a flow.
///
/// Parsing and classification never fail; everything here originates at a
/// call into the wallet or ledger, or at request validation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no {variant} record found in {programs:?}")]
    NoCandidates {
        variant: RecordVariant,
        programs: Vec<String>,
    },
    #[error("wallet rejected all {attempts} candidate record(s): {reason}")]
    RejectedInput { attempts: usize, reason: String },
    #[error("transaction {transaction_id} was rejected with status `{status}`")]
    TransactionRejected {
        transaction_id: String,
        status: String,
    },
    #[error(transparent)]
    Wallet(#[from] WalletServiceError),
    #[error(transparent)]
    Ledger(#[from] LedgerQueryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    pub fn no_candidates(variant: RecordVariant, programs: &[String]) -> Self {
        Self::NoCandidates {
            variant,
            programs: programs.to_vec(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoCandidates { .. } => "NO_CANDIDATES",
            EngineError::RejectedInput { .. } => "REJECTED_INPUT",
            EngineError::TransactionRejected { .. } => "TRANSACTION_REJECTED",
            EngineError::Wallet(error) => error.code(),
            EngineError::Ledger(_) => "LEDGER_UNAVAILABLE",
            EngineError::Repository(_) => "REPOSITORY_ERROR",
            EngineError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Short message safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::NoCandidates { variant, .. } => format!(
                "The {variant} record you need does not exist yet; try again after the issuing action confirms."
            ),
            EngineError::RejectedInput { .. } => {
                "The wallet rejected every matching record for this action.".to_string()
            }
            EngineError::TransactionRejected { .. } => {
                "The network rejected the transaction.".to_string()
            }
            EngineError::Wallet(error) => error.user_message(),
            EngineError::Ledger(error) => error.user_message(),
            EngineError::Repository(_) => "The local agreement list could not be updated.".to_string(),
            EngineError::InvalidRequest(reason) => reason.clone(),
        }
    }
}
