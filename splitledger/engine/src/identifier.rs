//! Learning the ledger-assigned identifier of a freshly created agreement.
//!
//! Strategies run in order and the first usable answer wins. When none of
//! them can answer, a placeholder derived from the salt stands in so the
//! agreement stays addressable until the ledger catches up.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use splitledger_wallet_interface::{LedgerQueryService, WalletService};
use tokio::time::sleep;
use tracing::debug;

use crate::activity::ActivityLog;
use crate::codec::{extract_field, strip_unit, strip_visibility, Literal, LiteralKind};
use crate::matcher::is_placeholder;
use crate::telemetry;

pub const SYNTHETIC_ID_PREFIX: &str = "pending_";

const AGREEMENT_ID_FIELD: &str = "agreement_id";
const FIELD_UNIT: &str = "field";

/// Placeholder identifier for an agreement whose real id is unknown.
///
/// Always `pending_<salt digits>`, so the same salt yields the same value.
pub fn placeholder_identifier(salt: &str) -> String {
    format!(
        "{SYNTHETIC_ID_PREFIX}{}",
        strip_unit(strip_visibility(salt.trim()))
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    ExecutionOutput,
    LedgerMapping,
    WalletHistory,
    TransactionLookup,
    Placeholder,
}

impl IdentifierSource {
    pub fn label(&self) -> &'static str {
        match self {
            IdentifierSource::ExecutionOutput => "execution_output",
            IdentifierSource::LedgerMapping => "ledger_mapping",
            IdentifierSource::WalletHistory => "wallet_history",
            IdentifierSource::TransactionLookup => "transaction_lookup",
            IdentifierSource::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for IdentifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentifier {
    pub value: String,
    pub source: IdentifierSource,
}

impl ResolvedIdentifier {
    pub fn is_placeholder(&self) -> bool {
        self.source == IdentifierSource::Placeholder
    }
}

/// One best-effort way of discovering the identifier.
///
/// Strategies swallow their own failures; `None` means "try the next one".
#[async_trait]
pub trait IdentifierStrategy: Send + Sync {
    fn source(&self) -> IdentifierSource;

    async fn attempt(&self) -> Option<String>;
}

/// Run `strategies` in order and return the first non-placeholder answer,
/// or the salt-derived placeholder when every strategy comes back empty.
pub async fn resolve_identifier(
    strategies: &[&dyn IdentifierStrategy],
    salt: &str,
    log: &ActivityLog,
) -> ResolvedIdentifier {
    for strategy in strategies {
        let source = strategy.source();
        debug!(source = source.label(), "trying identifier strategy");
        match strategy.attempt().await {
            Some(value) if !is_placeholder(&value) => {
                telemetry::record_identifier(source.label());
                log.success(format!("Agreement identifier {value} found via {source}"));
                return ResolvedIdentifier { value, source };
            }
            Some(value) => debug!(source = source.label(), %value, "ignoring placeholder identifier"),
            None => debug!(source = source.label(), "identifier strategy had no answer"),
        }
    }

    let value = placeholder_identifier(salt);
    telemetry::record_identifier(IdentifierSource::Placeholder.label());
    log.warning(format!(
        "Agreement identifier not visible yet; using {value} until the ledger catches up"
    ));
    ResolvedIdentifier {
        value,
        source: IdentifierSource::Placeholder,
    }
}

/// Pull an agreement id out of execution outputs.
///
/// Accepts either a plaintext block carrying an `agreement_id` entry or a
/// bare `<digits>field` literal.
pub fn identifier_from_outputs(outputs: &[String]) -> Option<String> {
    let from_block = outputs
        .iter()
        .find_map(|output| extract_field(output, AGREEMENT_ID_FIELD));
    if from_block.is_some() {
        return from_block;
    }
    outputs.iter().find_map(|output| {
        let literal = Literal::parse(strip_visibility(output.trim().trim_matches('"')));
        match literal.kind() {
            LiteralKind::Numeric { .. } if literal.unit() == Some(FIELD_UNIT) => {
                Some(literal.as_str().to_string())
            }
            _ => None,
        }
    })
}

/// Reads the id straight out of the submission response.
pub struct ExecutionOutputStrategy {
    outputs: Vec<String>,
}

impl ExecutionOutputStrategy {
    pub fn new(outputs: Vec<String>) -> Self {
        Self { outputs }
    }
}

#[async_trait]
impl IdentifierStrategy for ExecutionOutputStrategy {
    fn source(&self) -> IdentifierSource {
        IdentifierSource::ExecutionOutput
    }

    async fn attempt(&self) -> Option<String> {
        identifier_from_outputs(&self.outputs)
    }
}

/// Polls the public salt-to-id mapping a bounded number of times.
pub struct MappingPollStrategy<'a> {
    ledger: &'a dyn LedgerQueryService,
    program_id: String,
    mapping: String,
    salt: String,
    attempts: u32,
    delay: Duration,
}

impl<'a> MappingPollStrategy<'a> {
    pub fn new(
        ledger: &'a dyn LedgerQueryService,
        program_id: impl Into<String>,
        mapping: impl Into<String>,
        salt: impl Into<String>,
        attempts: u32,
        delay: Duration,
    ) -> Self {
        Self {
            ledger,
            program_id: program_id.into(),
            mapping: mapping.into(),
            salt: salt.into(),
            attempts,
            delay,
        }
    }
}

#[async_trait]
impl IdentifierStrategy for MappingPollStrategy<'_> {
    fn source(&self) -> IdentifierSource {
        IdentifierSource::LedgerMapping
    }

    async fn attempt(&self) -> Option<String> {
        for attempt in 0..self.attempts.max(1) {
            if attempt > 0 {
                sleep(self.delay).await;
            }
            match self
                .ledger
                .read_mapping(&self.program_id, &self.mapping, &self.salt)
                .await
            {
                Ok(Some(value)) => {
                    let value = value.trim().trim_matches('"').to_string();
                    if !is_placeholder(&value) {
                        return Some(value);
                    }
                }
                Ok(None) => {}
                Err(error) => debug!(attempt, %error, "mapping lookup failed"),
            }
        }
        None
    }
}

/// Scans the wallet's own history for the submission.
pub struct WalletHistoryStrategy<'a> {
    wallet: &'a dyn WalletService,
    program_id: String,
    submission_id: String,
}

impl<'a> WalletHistoryStrategy<'a> {
    pub fn new(
        wallet: &'a dyn WalletService,
        program_id: impl Into<String>,
        submission_id: impl Into<String>,
    ) -> Self {
        Self {
            wallet,
            program_id: program_id.into(),
            submission_id: submission_id.into(),
        }
    }
}

#[async_trait]
impl IdentifierStrategy for WalletHistoryStrategy<'_> {
    fn source(&self) -> IdentifierSource {
        IdentifierSource::WalletHistory
    }

    async fn attempt(&self) -> Option<String> {
        let history = match self.wallet.transaction_history(&self.program_id).await {
            Ok(history) => history?,
            Err(error) => {
                debug!(code = error.code(), %error, "wallet history unavailable");
                return None;
            }
        };
        history
            .iter()
            .filter(|entry| entry.refers_to(&self.submission_id))
            .find_map(|entry| identifier_from_outputs(&entry.outputs))
    }
}

/// Looks the submission up on the public ledger.
pub struct TransactionLookupStrategy<'a> {
    ledger: &'a dyn LedgerQueryService,
    transaction_id: String,
}

impl<'a> TransactionLookupStrategy<'a> {
    pub fn new(ledger: &'a dyn LedgerQueryService, transaction_id: impl Into<String>) -> Self {
        Self {
            ledger,
            transaction_id: transaction_id.into(),
        }
    }
}

#[async_trait]
impl IdentifierStrategy for TransactionLookupStrategy<'_> {
    fn source(&self) -> IdentifierSource {
        IdentifierSource::TransactionLookup
    }

    async fn attempt(&self) -> Option<String> {
        match self.ledger.read_transaction(&self.transaction_id).await {
            Ok(transaction) => identifier_from_outputs(&transaction?.outputs),
            Err(error) => {
                debug!(%error, "transaction lookup failed");
                None
            }
        }
    }
}
