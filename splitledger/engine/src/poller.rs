//! Confirmation polling for submitted transactions.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use splitledger_wallet_interface::{LedgerQueryService, StatusReport, WalletService};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::activity::ActivityLog;
use crate::config::ConfirmationConfig;
use crate::error::{EngineError, EngineResult};
use crate::telemetry;

const CONFIRMED_STATUSES: [&str; 3] = ["completed", "finalized", "accepted"];
const REJECTED_STATUSES: [&str; 2] = ["failed", "rejected"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    Pending,
    Confirmed,
    Rejected,
    TimedOut,
}

impl ConfirmationState {
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationState::Pending => "pending",
            ConfirmationState::Confirmed => "confirmed",
            ConfirmationState::Rejected => "rejected",
            ConfirmationState::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationState::Pending)
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a reported status string onto a confirmation state.
///
/// Unrecognised statuses are `Pending`.
pub fn classify_status(status: &str) -> ConfirmationState {
    let status = status.trim();
    if CONFIRMED_STATUSES
        .iter()
        .any(|known| status.eq_ignore_ascii_case(known))
    {
        ConfirmationState::Confirmed
    } else if REJECTED_STATUSES
        .iter()
        .any(|known| status.eq_ignore_ascii_case(known))
    {
        ConfirmationState::Rejected
    } else {
        ConfirmationState::Pending
    }
}

/// Anything that can report the status of a transaction.
///
/// `Ok(None)` means the source has nothing to say yet.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, transaction_id: &str) -> EngineResult<Option<StatusReport>>;
}

/// Asks the wallet first and falls back to the public ledger when the wallet
/// cannot answer.
pub struct ChainedStatusSource<'a> {
    wallet: &'a dyn WalletService,
    ledger: Option<&'a dyn LedgerQueryService>,
}

impl<'a> ChainedStatusSource<'a> {
    pub fn new(wallet: &'a dyn WalletService, ledger: Option<&'a dyn LedgerQueryService>) -> Self {
        Self { wallet, ledger }
    }
}

#[async_trait]
impl StatusSource for ChainedStatusSource<'_> {
    async fn status(&self, transaction_id: &str) -> EngineResult<Option<StatusReport>> {
        match self.wallet.transaction_status(transaction_id).await {
            Ok(Some(report)) => return Ok(Some(report)),
            Ok(None) => debug!(transaction_id, "wallet has no status, asking the ledger"),
            Err(error) => {
                debug!(transaction_id, code = error.code(), %error, "wallet status failed, asking the ledger")
            }
        }

        let Some(ledger) = self.ledger else {
            return Ok(None);
        };
        let report = ledger
            .read_transaction(transaction_id)
            .await?
            .map(|transaction| {
                if transaction.id.is_empty() {
                    StatusReport::new(transaction.status)
                } else {
                    StatusReport::with_transaction_id(transaction.status, transaction.id)
                }
            });
        Ok(report)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub progress_every: u32,
}

impl From<&ConfirmationConfig> for PollSettings {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_attempts,
            progress_every: config.progress_every,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub state: ConfirmationState,
    /// Id the poller ended up querying; the canonical one when reported.
    pub transaction_id: String,
    pub attempts: u32,
}

pub struct ConfirmationPoller<'a> {
    source: &'a dyn StatusSource,
    log: &'a ActivityLog,
    settings: PollSettings,
}

impl<'a> ConfirmationPoller<'a> {
    pub fn new(source: &'a dyn StatusSource, log: &'a ActivityLog, settings: PollSettings) -> Self {
        Self {
            source,
            log,
            settings,
        }
    }

    /// Poll until the transaction is confirmed, rejected, or the attempt
    /// budget runs out.
    ///
    /// Every attempt sleeps for the interval before querying. A rejected
    /// status ends polling with [`EngineError::TransactionRejected`]; running
    /// out of attempts yields `Ok` with [`ConfirmationState::TimedOut`].
    pub async fn poll(&self, transaction_id: &str) -> EngineResult<PollOutcome> {
        let max_attempts = self.settings.max_attempts.max(1);
        let progress_every = self.settings.progress_every.max(1);
        let mut current_id = transaction_id.to_string();

        for attempt in 1..=max_attempts {
            sleep(self.settings.interval).await;

            let state = match self.source.status(&current_id).await {
                Ok(Some(report)) => {
                    if let Some(canonical) = report.transaction_id.as_deref() {
                        if canonical != current_id {
                            self.log.info(format!(
                                "Tracking canonical transaction id {canonical} for {current_id}"
                            ));
                            current_id = canonical.to_string();
                        }
                    }
                    let state = classify_status(&report.status);
                    if state == ConfirmationState::Rejected {
                        telemetry::record_confirmation(state, attempt);
                        self.log.error(format!(
                            "Transaction {current_id} was rejected ({})",
                            report.status
                        ));
                        return Err(EngineError::TransactionRejected {
                            transaction_id: current_id,
                            status: report.status,
                        });
                    }
                    state
                }
                Ok(None) => ConfirmationState::Pending,
                Err(error) => {
                    warn!(transaction_id = %current_id, attempt, %error, "status lookup failed");
                    ConfirmationState::Pending
                }
            };

            if state == ConfirmationState::Confirmed {
                telemetry::record_confirmation(state, attempt);
                self.log
                    .success(format!("Transaction {current_id} confirmed"));
                return Ok(PollOutcome {
                    state,
                    transaction_id: current_id,
                    attempts: attempt,
                });
            }

            if attempt % progress_every == 0 {
                self.log.info(format!(
                    "Waiting for {current_id} to confirm ({attempt}/{max_attempts})"
                ));
            }
        }

        let state = ConfirmationState::TimedOut;
        telemetry::record_confirmation(state, max_attempts);
        self.log.warning(format!(
            "Transaction {current_id} not confirmed after {max_attempts} checks; it may still confirm later"
        ));
        Ok(PollOutcome {
            state,
            transaction_id: current_id,
            attempts: max_attempts,
        })
    }
}
