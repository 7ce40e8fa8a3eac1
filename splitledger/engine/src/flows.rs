//! One async entry point per user action.
//!
//! Spending actions resolve candidate records, try them against the wallet
//! executor in order, and wait for confirmation. Creating an agreement
//! additionally learns the ledger-assigned identifier and stores a summary.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use splitledger_wallet_interface::{
    ExecutableInput, ExecutionRequest, ExecutionResponse, LedgerQueryService, WalletService,
};
use tracing::{debug, info, warn};

use crate::activity::ActivityLog;
use crate::classify::{classify, RecordVariant};
use crate::codec::{Literal, LiteralKind};
use crate::config::{EngineConfig, FeeConfig};
use crate::error::{EngineError, EngineResult};
use crate::identifier::{
    resolve_identifier, ExecutionOutputStrategy, IdentifierStrategy, MappingPollStrategy,
    ResolvedIdentifier, TransactionLookupStrategy, WalletHistoryStrategy,
};
use crate::input::build_input;
use crate::matcher::{matches, MatchContext};
use crate::poller::{ChainedStatusSource, ConfirmationPoller, ConfirmationState, PollSettings};
use crate::repository::{AgreementRepository, AgreementSummary, RepositoryError};
use crate::resolver::{Candidate, CandidateResolver, CandidateTier};
use crate::retry::execute_with_retry;
use crate::telemetry;

const ADDRESS_PREFIX: &str = "aleo1";
const FIELD_UNIT: &str = "field";
const MICROCREDITS_FIELD: &str = "microcredits";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateAgreement,
    IssueObligation,
    SettleObligation,
    PayObligation,
    DiscloseToAuditor,
}

impl Action {
    /// Program function the action executes.
    pub fn label(&self) -> &'static str {
        match self {
            Action::CreateAgreement => "create_agreement",
            Action::IssueObligation => "issue_obligation",
            Action::SettleObligation => "settle_obligation",
            Action::PayObligation => "pay_obligation",
            Action::DiscloseToAuditor => "disclose_to_auditor",
        }
    }

    pub fn fee(&self, fees: &FeeConfig) -> u64 {
        match self {
            Action::CreateAgreement => fees.create_agreement,
            Action::IssueObligation => fees.issue_obligation,
            Action::SettleObligation => fees.settle_obligation,
            Action::PayObligation => fees.pay_obligation,
            Action::DiscloseToAuditor => fees.disclose_to_auditor,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: Action,
    pub program_id: String,
    pub function: String,
    pub transaction_id: String,
    pub confirmation: ConfirmationState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementCreated {
    pub salt: String,
    pub identifier: ResolvedIdentifier,
    pub outcome: ActionOutcome,
}

/// A wallet record as the engine sees it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordView {
    pub variant: RecordVariant,
    pub spent: bool,
    pub matches_context: bool,
    pub source: &'static str,
    pub plaintext: String,
}

/// Random 128-bit salt as a `field` literal.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{FIELD_UNIT}", u128::from_le_bytes(bytes))
}

pub struct AgreementFlows {
    wallet: Arc<dyn WalletService>,
    ledger: Arc<dyn LedgerQueryService>,
    log: Arc<ActivityLog>,
    repository: Arc<dyn AgreementRepository>,
    config: EngineConfig,
}

impl AgreementFlows {
    pub fn new(
        wallet: Arc<dyn WalletService>,
        ledger: Arc<dyn LedgerQueryService>,
        log: Arc<ActivityLog>,
        repository: Arc<dyn AgreementRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            wallet,
            ledger,
            log,
            repository,
            config,
        }
    }

    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn repository(&self) -> &Arc<dyn AgreementRepository> {
        &self.repository
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Match context for a stored agreement; falls back to the bare salt.
    pub fn context_for(&self, salt: &str) -> MatchContext {
        let key = normalize_salt(salt).unwrap_or_else(|_| salt.trim().to_string());
        match self.repository.get(&key) {
            Some(summary) if !summary.has_placeholder_identifier() => {
                MatchContext::from_salt(summary.salt).with_agreement_id(summary.agreement_id)
            }
            _ => MatchContext::from_salt(salt),
        }
    }

    /// Fill in the agreement id from the local list when the caller only
    /// knows the salt.
    fn with_stored_identifier(&self, context: &MatchContext) -> MatchContext {
        if context.usable_agreement_id().is_some() || context.salt.trim().is_empty() {
            return context.clone();
        }
        match self.context_for(&context.salt).agreement_id {
            Some(agreement_id) => {
                debug!(salt = %context.salt, %agreement_id, "using stored agreement id");
                context.clone().with_agreement_id(agreement_id)
            }
            None => context.clone(),
        }
    }

    pub async fn create_agreement(
        &self,
        participant_count: u8,
        total_amount: u64,
        salt: Option<String>,
    ) -> EngineResult<AgreementCreated> {
        self.instrumented(Action::CreateAgreement, async move {
            if participant_count < 2 {
                return Err(EngineError::invalid(
                    "An agreement needs at least two participants.",
                ));
            }
            require_amount(total_amount)?;
            let salt = match salt {
                Some(salt) => normalize_salt(&salt)?,
                None => generate_salt(),
            };

            let program_id = self.config.programs.latest().to_string();
            let inputs = vec![
                ExecutableInput::Literal(format!("{participant_count}u8")),
                ExecutableInput::Literal(format!("{total_amount}u64")),
                ExecutableInput::Literal(salt.clone()),
            ];
            let request = self.request(Action::CreateAgreement, &program_id, inputs);
            let response = self.wallet.execute(&request).await?;
            self.log.info(format!(
                "Submitted create_agreement as {}",
                response.transaction_id
            ));
            let outcome = self
                .confirm(Action::CreateAgreement, program_id.clone(), &response)
                .await?;

            let identifier = self
                .resolve_created_identifier(&program_id, &salt, &response, &outcome.transaction_id)
                .await;
            self.store(AgreementSummary {
                salt: salt.clone(),
                agreement_id: identifier.value.clone(),
                identifier_source: identifier.source,
                participant_count,
                total_amount,
                transaction_id: outcome.transaction_id.clone(),
                program_id,
                confirmation: outcome.confirmation,
            });

            Ok(AgreementCreated {
                salt,
                identifier,
                outcome,
            })
        })
        .await
    }

    pub async fn issue_obligation(
        &self,
        context: &MatchContext,
        debtor: &str,
        amount: u64,
    ) -> EngineResult<ActionOutcome> {
        self.instrumented(Action::IssueObligation, async move {
            require_address(debtor)?;
            require_amount(amount)?;
            let extra = vec![
                ExecutableInput::Literal(debtor.to_string()),
                ExecutableInput::Literal(format!("{amount}u64")),
            ];
            self.spend(Action::IssueObligation, context, RecordVariant::Agreement, extra)
                .await
        })
        .await
    }

    pub async fn settle_obligation(&self, context: &MatchContext) -> EngineResult<ActionOutcome> {
        self.instrumented(Action::SettleObligation, async move {
            self.spend(
                Action::SettleObligation,
                context,
                RecordVariant::Obligation,
                Vec::new(),
            )
            .await
        })
        .await
    }

    pub async fn pay_obligation(
        &self,
        context: &MatchContext,
        amount: u64,
    ) -> EngineResult<ActionOutcome> {
        self.instrumented(Action::PayObligation, async move {
            require_amount(amount)?;
            let context = self.with_stored_identifier(context);
            let obligations = self
                .resolver()
                .resolve(&self.config.programs.versions, &context, RecordVariant::Obligation)
                .await?;
            let credits_program = [self.config.programs.credits_program.clone()];
            let currency = self
                .resolver()
                .resolve(&credits_program, &MatchContext::default(), RecordVariant::Currency)
                .await?;
            let payment = select_payment(currency, amount).ok_or_else(|| {
                EngineError::invalid(format!(
                    "No credits record holds at least {amount} microcredits."
                ))
            })?;
            self.log.info(format!(
                "Paying from a {} credits record",
                payment.tier.label()
            ));

            let amount_input = ExecutableInput::Literal(format!("{amount}u64"));
            let accepted = execute_with_retry(obligations, &self.log, |candidate| {
                let inputs = vec![
                    candidate.input,
                    payment.input.clone(),
                    amount_input.clone(),
                ];
                let request =
                    self.request(Action::PayObligation, &candidate.program_version, inputs);
                async move { self.wallet.execute(&request).await }
            })
            .await?;
            self.confirm(
                Action::PayObligation,
                accepted.candidate.program_version,
                &accepted.value,
            )
            .await
        })
        .await
    }

    pub async fn disclose_to_auditor(
        &self,
        context: &MatchContext,
        auditor: &str,
    ) -> EngineResult<ActionOutcome> {
        self.instrumented(Action::DiscloseToAuditor, async move {
            require_address(auditor)?;
            let extra = vec![ExecutableInput::Literal(auditor.to_string())];
            self.spend(
                Action::DiscloseToAuditor,
                context,
                RecordVariant::Agreement,
                extra,
            )
            .await
        })
        .await
    }

    /// Try to replace a stored placeholder identifier with the real one.
    pub async fn refresh_identifier(&self, salt: &str) -> EngineResult<AgreementSummary> {
        let summary = self
            .repository
            .get(salt)
            .ok_or_else(|| RepositoryError::NotFound(salt.to_string()))?;
        if !summary.has_placeholder_identifier() {
            return Ok(summary);
        }

        let mapping = MappingPollStrategy::new(
            self.ledger.as_ref(),
            summary.program_id.clone(),
            self.config.programs.agreement_mapping.clone(),
            summary.salt.clone(),
            1,
            self.config.identifier.mapping_delay(),
        );
        let lookup = TransactionLookupStrategy::new(self.ledger.as_ref(), summary.transaction_id.clone());
        let strategies: [&dyn IdentifierStrategy; 2] = [&mapping, &lookup];
        let resolved = resolve_identifier(&strategies, &summary.salt, &self.log).await;
        if resolved.is_placeholder() {
            return Ok(summary);
        }
        Ok(self.repository.update_identifier(salt, &resolved)?)
    }

    /// Classify every record the wallet holds for `program_id`.
    pub async fn list_records(
        &self,
        program_id: &str,
        context: &MatchContext,
    ) -> EngineResult<Vec<RecordView>> {
        let records = self.wallet.records(program_id).await?;
        let mut views = Vec::with_capacity(records.len());
        for record in &records {
            let built = build_input(record, Some(self.wallet.as_ref())).await;
            views.push(RecordView {
                variant: classify(&built.fields, record.data()),
                spent: record.is_spent(),
                matches_context: matches(&built.fields, record.data(), context),
                source: built.source.label(),
                plaintext: built.plaintext,
            });
        }
        Ok(views)
    }

    async fn spend(
        &self,
        action: Action,
        context: &MatchContext,
        wanted: RecordVariant,
        extra: Vec<ExecutableInput>,
    ) -> EngineResult<ActionOutcome> {
        let context = self.with_stored_identifier(context);
        let candidates = self
            .resolver()
            .resolve(&self.config.programs.versions, &context, wanted)
            .await?;
        let accepted = execute_with_retry(candidates, &self.log, |candidate| {
            let mut inputs = Vec::with_capacity(extra.len() + 1);
            inputs.push(candidate.input);
            inputs.extend(extra.iter().cloned());
            let request = self.request(action, &candidate.program_version, inputs);
            async move { self.wallet.execute(&request).await }
        })
        .await?;
        self.confirm(action, accepted.candidate.program_version, &accepted.value)
            .await
    }

    async fn confirm(
        &self,
        action: Action,
        program_id: String,
        response: &ExecutionResponse,
    ) -> EngineResult<ActionOutcome> {
        let source = ChainedStatusSource::new(self.wallet.as_ref(), Some(self.ledger.as_ref()));
        let poll = ConfirmationPoller::new(
            &source,
            &self.log,
            PollSettings::from(&self.config.confirmation),
        )
        .poll(&response.transaction_id)
        .await?;
        Ok(ActionOutcome {
            action,
            program_id,
            function: action.label().to_string(),
            transaction_id: poll.transaction_id,
            confirmation: poll.state,
        })
    }

    async fn resolve_created_identifier(
        &self,
        program_id: &str,
        salt: &str,
        response: &ExecutionResponse,
        transaction_id: &str,
    ) -> ResolvedIdentifier {
        let outputs = ExecutionOutputStrategy::new(response.outputs.clone());
        let mapping = MappingPollStrategy::new(
            self.ledger.as_ref(),
            program_id,
            self.config.programs.agreement_mapping.clone(),
            salt,
            self.config.identifier.mapping_attempts,
            self.config.identifier.mapping_delay(),
        );
        let history =
            WalletHistoryStrategy::new(self.wallet.as_ref(), program_id, response.transaction_id.clone());
        let lookup = TransactionLookupStrategy::new(self.ledger.as_ref(), transaction_id);
        let strategies: [&dyn IdentifierStrategy; 4] = [&outputs, &mapping, &history, &lookup];
        resolve_identifier(&strategies, salt, &self.log).await
    }

    fn store(&self, summary: AgreementSummary) {
        let salt = summary.salt.clone();
        match self.repository.save(summary) {
            Ok(()) => {}
            Err(error) => {
                warn!(%salt, %error, "agreement summary not stored");
                self.log
                    .warning(format!("Agreement {salt} could not be added to the local list"));
            }
        }
    }

    fn resolver(&self) -> CandidateResolver<'_> {
        CandidateResolver::new(self.wallet.as_ref(), &self.log)
    }

    fn request(
        &self,
        action: Action,
        program_id: &str,
        inputs: Vec<ExecutableInput>,
    ) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(
            program_id,
            action.label(),
            inputs,
            action.fee(&self.config.fees),
        );
        request.private_fee = self.config.fees.private_fee;
        request
    }

    async fn instrumented<T, F>(&self, action: Action, work: F) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        self.log.system(format!("Starting {action}"));
        let result = work.await;
        telemetry::record_action(action, result.is_ok());
        match &result {
            Ok(_) => {
                info!(%action, "action finished");
                self.log.success(format!("{action} finished"));
            }
            Err(error) => {
                warn!(%action, code = error.code(), %error, "action failed");
                self.log.error(error.user_message());
            }
        }
        result
    }
}

/// Pick the credits record to pay with.
///
/// Prefers the first record known to hold enough microcredits; when none is
/// known to, an unclassified record is tried blind.
fn select_payment(currency: Vec<Candidate>, amount: u64) -> Option<Candidate> {
    let covers = |candidate: &Candidate| {
        candidate
            .fields
            .get(MICROCREDITS_FIELD)
            .and_then(Literal::as_u64)
            .is_some_and(|balance| balance >= amount)
    };
    if let Some(index) = currency.iter().position(covers) {
        return currency.into_iter().nth(index);
    }
    currency
        .into_iter()
        .find(|candidate| candidate.tier == CandidateTier::Fallback)
}

fn require_amount(amount: u64) -> EngineResult<()> {
    if amount == 0 {
        return Err(EngineError::invalid("Amounts must be greater than zero."));
    }
    Ok(())
}

fn require_address(address: &str) -> EngineResult<()> {
    let address = address.trim();
    if address.len() <= ADDRESS_PREFIX.len() || !address.starts_with(ADDRESS_PREFIX) {
        return Err(EngineError::invalid(format!(
            "`{address}` is not an {ADDRESS_PREFIX}... address."
        )));
    }
    Ok(())
}

/// Accept `123` or `123field` and return `123field`.
fn normalize_salt(salt: &str) -> EngineResult<String> {
    let literal = Literal::parse(salt);
    match (literal.kind(), literal.unit()) {
        (LiteralKind::Numeric { .. }, None | Some(FIELD_UNIT)) if !literal.value().starts_with('-') => {
            Ok(format!("{}{FIELD_UNIT}", literal.value()))
        }
        _ => Err(EngineError::invalid(format!(
            "`{salt}` is not a valid salt; expected digits with an optional `field` suffix."
        ))),
    }
}
