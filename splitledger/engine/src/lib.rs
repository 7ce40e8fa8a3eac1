//! Record resolution and transaction confirmation for shared-expense
//! agreements.
//!
//! The engine decides which private wallet record to spend for an action,
//! retries the action across candidates until the wallet accepts one, and
//! follows the submission until the ledger confirms it.

pub mod activity;
pub mod classify;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod flows;
pub mod identifier;
pub mod input;
pub mod matcher;
pub mod poller;
pub mod repository;
pub mod resolver;
pub mod retry;
pub mod rpc;
mod telemetry;

#[cfg(test)]
mod tests_prop;

pub use activity::{ActivityEntry, ActivityLog, LogLevel};
pub use classify::{classify, RecordVariant};
pub use codec::{decode, extract_field, DecodedFields, Literal};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use flows::{generate_salt, Action, ActionOutcome, AgreementCreated, AgreementFlows};
pub use identifier::{placeholder_identifier, IdentifierSource, ResolvedIdentifier};
pub use input::{build_input, BuiltInput, InputSource};
pub use matcher::{matches, MatchContext};
pub use poller::{ConfirmationPoller, ConfirmationState, PollOutcome, PollSettings, StatusSource};
pub use repository::{AgreementRepository, AgreementSummary, InMemoryAgreementRepository};
pub use resolver::{Candidate, CandidateResolver, CandidateTier};
pub use retry::{execute_with_retry, Accepted};
