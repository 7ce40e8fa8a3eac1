use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::{IdentifierSource, ResolvedIdentifier};
use crate::poller::ConfirmationState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("agreement with salt {0} is already stored")]
    Duplicate(String),
    #[error("no agreement stored for salt {0}")]
    NotFound(String),
}

/// What the engine remembers about an agreement it created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementSummary {
    pub salt: String,
    pub agreement_id: String,
    pub identifier_source: IdentifierSource,
    pub participant_count: u8,
    pub total_amount: u64,
    pub transaction_id: String,
    pub program_id: String,
    pub confirmation: ConfirmationState,
}

impl AgreementSummary {
    pub fn has_placeholder_identifier(&self) -> bool {
        self.identifier_source == IdentifierSource::Placeholder
    }
}

/// Persistent list of agreements, keyed by salt.
pub trait AgreementRepository: Send + Sync {
    fn save(&self, summary: AgreementSummary) -> Result<(), RepositoryError>;

    fn get(&self, salt: &str) -> Option<AgreementSummary>;

    /// All agreements ordered by salt.
    fn list(&self) -> Vec<AgreementSummary>;

    /// Replace the identifier of a stored agreement, returning the updated
    /// entry.
    fn update_identifier(
        &self,
        salt: &str,
        identifier: &ResolvedIdentifier,
    ) -> Result<AgreementSummary, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAgreementRepository {
    agreements: RwLock<BTreeMap<String, AgreementSummary>>,
}

impl InMemoryAgreementRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgreementRepository for InMemoryAgreementRepository {
    fn save(&self, summary: AgreementSummary) -> Result<(), RepositoryError> {
        let mut agreements = self.agreements.write();
        if agreements.contains_key(&summary.salt) {
            return Err(RepositoryError::Duplicate(summary.salt));
        }
        agreements.insert(summary.salt.clone(), summary);
        Ok(())
    }

    fn get(&self, salt: &str) -> Option<AgreementSummary> {
        self.agreements.read().get(salt).cloned()
    }

    fn list(&self) -> Vec<AgreementSummary> {
        self.agreements.read().values().cloned().collect()
    }

    fn update_identifier(
        &self,
        salt: &str,
        identifier: &ResolvedIdentifier,
    ) -> Result<AgreementSummary, RepositoryError> {
        let mut agreements = self.agreements.write();
        let summary = agreements
            .get_mut(salt)
            .ok_or_else(|| RepositoryError::NotFound(salt.to_string()))?;
        summary.agreement_id = identifier.value.clone();
        summary.identifier_source = identifier.source;
        Ok(summary.clone())
    }
}
