use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use crate::activity::ActivityLog;
use crate::error::{EngineError, EngineResult};
use crate::resolver::Candidate;
use crate::telemetry;

/// Result of the first candidate the executor accepted.
#[derive(Debug)]
pub struct Accepted<T> {
    pub value: T,
    pub candidate: Candidate,
    /// One-based position of the accepted candidate.
    pub attempts: usize,
}

/// Run `action` against each candidate in order until one is accepted.
///
/// Every failure is treated as a rejection of that particular record and
/// advances to the next candidate with a warning. Only when the list is
/// exhausted is the last failure returned, as [`EngineError::RejectedInput`].
pub async fn execute_with_retry<T, E, F, Fut>(
    candidates: Vec<Candidate>,
    log: &ActivityLog,
    mut action: F,
) -> EngineResult<Accepted<T>>
where
    E: fmt::Display,
    F: FnMut(Candidate) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = candidates.len();
    let mut last_reason = None;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let attempt = index + 1;
        debug!(
            attempt,
            total,
            program = %candidate.program_version,
            tier = candidate.tier.label(),
            "trying candidate"
        );
        match action(candidate.clone()).await {
            Ok(value) => {
                telemetry::record_executor_attempt(true);
                if attempt > 1 {
                    log.info(format!("Candidate {attempt} of {total} was accepted"));
                }
                return Ok(Accepted {
                    value,
                    candidate,
                    attempts: attempt,
                });
            }
            Err(error) => {
                telemetry::record_executor_attempt(false);
                warn!(attempt, total, program = %candidate.program_version, %error, "candidate rejected");
                log.warning(format!(
                    "Candidate {attempt} of {total} from {} rejected: {error}",
                    candidate.program_version
                ));
                last_reason = Some(error.to_string());
            }
        }
    }

    match last_reason {
        Some(reason) => {
            log.error(format!("All {total} candidate record(s) were rejected"));
            Err(EngineError::RejectedInput {
                attempts: total,
                reason,
            })
        }
        None => Err(EngineError::invalid("no candidate records to try")),
    }
}
