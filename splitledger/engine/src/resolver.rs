//! Candidate record discovery across deployed program versions.

use splitledger_wallet_interface::{ExecutableInput, WalletService, WalletServiceError};
use tracing::{debug, warn};

use crate::activity::ActivityLog;
use crate::classify::{classify, RecordVariant};
use crate::codec::DecodedFields;
use crate::error::{EngineError, EngineResult};
use crate::input::{build_input, InputSource};
use crate::matcher::{matches, MatchContext};
use crate::telemetry;

/// Rank of a candidate; lower tiers are tried first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CandidateTier {
    /// Wanted variant and belongs to the requested agreement.
    Exact,
    /// Wanted variant, other or unknown agreement.
    Typed,
    /// Could not be classified; only offered when its version holds nothing typed.
    Fallback,
}

impl CandidateTier {
    pub fn label(&self) -> &'static str {
        match self {
            CandidateTier::Exact => "exact",
            CandidateTier::Typed => "typed",
            CandidateTier::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub input: ExecutableInput,
    pub program_version: String,
    pub variant: RecordVariant,
    pub is_exact_match: bool,
    pub tier: CandidateTier,
    pub fields: DecodedFields,
    pub source: InputSource,
    version_rank: usize,
}

impl Candidate {
    pub fn new(
        input: ExecutableInput,
        program_version: impl Into<String>,
        variant: RecordVariant,
        is_exact_match: bool,
    ) -> Self {
        let tier = match (variant, is_exact_match) {
            (RecordVariant::Unknown, _) => CandidateTier::Fallback,
            (_, true) => CandidateTier::Exact,
            (_, false) => CandidateTier::Typed,
        };
        Self {
            input,
            program_version: program_version.into(),
            variant,
            is_exact_match,
            tier,
            fields: DecodedFields::new(),
            source: InputSource::Plaintext,
            version_rank: 0,
        }
    }

    fn sort_key(&self) -> (CandidateTier, bool, usize) {
        (self.tier, !self.is_exact_match, self.version_rank)
    }
}

/// Finds and ranks the records an action could spend.
pub struct CandidateResolver<'a> {
    wallet: &'a dyn WalletService,
    log: &'a ActivityLog,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(wallet: &'a dyn WalletService, log: &'a ActivityLog) -> Self {
        Self { wallet, log }
    }

    /// Return candidates for `wanted`, best first.
    ///
    /// `program_versions` is ordered newest first. Enumeration stops at the
    /// first version that yields any candidate; older versions are never
    /// queried after that. Within that version, unclassifiable records are
    /// returned only when it produced no typed candidate.
    pub async fn resolve(
        &self,
        program_versions: &[String],
        context: &MatchContext,
        wanted: RecordVariant,
    ) -> EngineResult<Vec<Candidate>> {
        let mut typed = Vec::new();
        let mut fallbacks = Vec::new();
        let mut failures = 0usize;
        let mut last_failure: Option<WalletServiceError> = None;

        for (rank, version) in program_versions.iter().enumerate() {
            let records = match self.wallet.records(version).await {
                Ok(records) => records,
                Err(error) => {
                    warn!(program = %version, code = error.code(), %error, "record enumeration failed");
                    self.log.warning(format!(
                        "Could not read records for {version}: {}",
                        error.user_message()
                    ));
                    failures += 1;
                    last_failure = Some(error);
                    continue;
                }
            };
            self.log
                .info(format!("Queried {version}: {} record(s)", records.len()));

            for record in &records {
                if record.is_spent() {
                    debug!(program = %version, "skipping spent record");
                    continue;
                }
                let built = build_input(record, Some(self.wallet)).await;
                let variant = classify(&built.fields, record.data());
                let exact = matches(&built.fields, record.data(), context);
                let mut candidate = Candidate::new(built.input, version.clone(), variant, exact);
                candidate.fields = built.fields;
                candidate.source = built.source;
                candidate.version_rank = rank;

                if variant == wanted {
                    let suffix = if exact { " matching this agreement" } else { "" };
                    self.log
                        .success(format!("Found {variant} record in {version}{suffix}"));
                    typed.push(candidate);
                } else if variant == RecordVariant::Unknown {
                    self.log.warning(format!(
                        "Unclassified record in {version} kept as a last resort ({})",
                        built.source.label()
                    ));
                    fallbacks.push(candidate);
                } else {
                    debug!(program = %version, %variant, %wanted, "skipping record of another variant");
                }
            }

            if !typed.is_empty() || !fallbacks.is_empty() {
                break;
            }
        }

        let mut candidates = if typed.is_empty() { fallbacks } else { typed };
        candidates.sort_by_key(Candidate::sort_key);

        if candidates.is_empty() {
            if failures == program_versions.len() {
                if let Some(error) = last_failure {
                    return Err(error.into());
                }
            }
            self.log
                .error(format!("No unspent {wanted} record is available yet"));
            return Err(EngineError::no_candidates(wanted, program_versions));
        }

        for tier in [CandidateTier::Exact, CandidateTier::Typed, CandidateTier::Fallback] {
            let count = candidates.iter().filter(|c| c.tier == tier).count();
            if count > 0 {
                telemetry::record_candidates(wanted, tier, count);
            }
        }
        Ok(candidates)
    }
}
