use metrics::{counter, histogram};

use crate::classify::RecordVariant;
use crate::flows::Action;
use crate::poller::ConfirmationState;
use crate::resolver::CandidateTier;

pub fn record_candidates(variant: RecordVariant, tier: CandidateTier, count: usize) {
    counter!(
        "splitledger.resolver.candidates",
        "variant" => variant.label(),
        "tier" => tier.label()
    )
    .increment(count as u64);
}

pub fn record_executor_attempt(accepted: bool) {
    counter!(
        "splitledger.executor.attempts",
        "outcome" => if accepted { "accepted" } else { "rejected" }
    )
    .increment(1);
}

pub fn record_confirmation(state: ConfirmationState, polls: u32) {
    counter!("splitledger.confirmation.polls", "state" => state.label()).increment(u64::from(polls));
    histogram!("splitledger.confirmation.attempts", "state" => state.label()).record(f64::from(polls));
}

pub fn record_identifier(source: &'static str) {
    counter!("splitledger.identifier.resolved", "source" => source).increment(1);
}

pub fn record_action(action: Action, ok: bool) {
    counter!(
        "splitledger.flow.actions",
        "action" => action.label(),
        "outcome" => if ok { "ok" } else { "err" }
    )
    .increment(1);
}
