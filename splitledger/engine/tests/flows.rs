mod common;

use anyhow::Result;
use splitledger_engine::{
    ConfirmationState, EngineError, IdentifierSource, LogLevel, MatchContext,
};
use splitledger_wallet_interface::{ExecutableInput, StatusReport, WalletTransaction};

use common::{
    agreement_plaintext, credits_plaintext, fast_config, obligation_plaintext, plaintext_record,
    Harness, CREDITS, V3,
};

const MAPPING: &str = "agreement_by_salt";

fn literal(text: &str) -> ExecutableInput {
    ExecutableInput::Literal(text.to_string())
}

#[tokio::test(start_paused = true)]
async fn create_agreement_learns_the_identifier_from_the_mapping() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("completed")]);
    harness.ledger.set_mapping(V3, MAPPING, "42field", "812field", 1);

    let created = harness
        .flows
        .create_agreement(3, 900, Some("42".to_string()))
        .await?;

    assert_eq!(created.salt, "42field");
    assert_eq!(created.identifier.value, "812field");
    assert_eq!(created.identifier.source, IdentifierSource::LedgerMapping);
    assert_eq!(created.outcome.confirmation, ConfirmationState::Confirmed);
    assert_eq!(*harness.ledger.mapping_reads.lock(), 2);

    let executed = harness.wallet.executed.lock();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].program_id, V3);
    assert_eq!(executed[0].function, "create_agreement");
    assert_eq!(
        executed[0].inputs,
        vec![literal("3u8"), literal("900u64"), literal("42field")]
    );
    assert_eq!(executed[0].fee, fast_config().fees.create_agreement);

    let stored = harness
        .flows
        .repository()
        .get("42field")
        .expect("agreement stored");
    assert_eq!(stored.agreement_id, "812field");
    assert_eq!(stored.transaction_id, "at1tx1");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn execution_outputs_short_circuit_the_identifier_chain() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("finalized")]);
    harness
        .wallet
        .with_outputs(vec!["{ agreement_id: 640field.private, salt: 1field.private }".into()]);

    let created = harness.flows.create_agreement(2, 10, None).await?;

    assert_eq!(created.identifier.value, "640field");
    assert_eq!(created.identifier.source, IdentifierSource::ExecutionOutput);
    assert!(created.salt.ends_with("field"));
    assert_eq!(*harness.ledger.mapping_reads.lock(), 0);
    assert!(harness.ledger.transaction_reads.lock().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wallet_history_is_consulted_after_the_mapping() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("accepted")]);
    harness.wallet.with_history(vec![WalletTransaction {
        id: "at1tx1".into(),
        transaction_id: None,
        status: Some("accepted".into()),
        outputs: vec!["99field".into()],
    }]);

    let created = harness
        .flows
        .create_agreement(4, 400, Some("5field".into()))
        .await?;

    assert_eq!(created.identifier.value, "99field");
    assert_eq!(created.identifier.source, IdentifierSource::WalletHistory);
    assert_eq!(
        *harness.ledger.mapping_reads.lock(),
        fast_config().identifier.mapping_attempts as usize
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn placeholder_identifier_is_replaced_once_the_ledger_catches_up() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("completed")]);

    let created = harness
        .flows
        .create_agreement(3, 900, Some("42field".into()))
        .await?;
    assert_eq!(created.identifier.value, "pending_42");
    assert_eq!(created.identifier.source, IdentifierSource::Placeholder);
    assert_eq!(*harness.ledger.transaction_reads.lock(), vec!["at1tx1".to_string()]);
    assert_eq!(harness.flows.context_for("42field").agreement_id, None);

    harness.ledger.set_mapping(V3, MAPPING, "42field", "812field", 0);
    let refreshed = harness.flows.refresh_identifier("42field").await?;
    assert_eq!(refreshed.agreement_id, "812field");
    assert_eq!(refreshed.identifier_source, IdentifierSource::LedgerMapping);
    assert_eq!(
        harness.flows.context_for("42field").agreement_id.as_deref(),
        Some("812field")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_never_reach_the_wallet() -> Result<()> {
    let harness = Harness::new();

    let error = harness
        .flows
        .create_agreement(1, 900, None)
        .await
        .expect_err("one participant");
    assert!(matches!(error, EngineError::InvalidRequest(_)));

    let context = MatchContext::from_salt("42field");
    let error = harness
        .flows
        .issue_obligation(&context, "not-an-address", 5)
        .await
        .expect_err("bad debtor");
    assert_eq!(error.code(), "INVALID_REQUEST");

    let error = harness
        .flows
        .pay_obligation(&context, 0)
        .await
        .expect_err("zero amount");
    assert_eq!(error.code(), "INVALID_REQUEST");

    assert!(harness.wallet.executed.lock().is_empty());
    assert!(harness.wallet.record_calls.lock().is_empty());
    assert_eq!(harness.log.count(LogLevel::Error), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn issue_obligation_spends_the_matching_agreement() -> Result<()> {
    let mut config = fast_config();
    config.fees.private_fee = true;
    let harness = Harness::with_config(config);
    harness
        .wallet
        .add_record(V3, plaintext_record(agreement_plaintext("7field", "70field")));
    harness
        .wallet
        .add_record(V3, plaintext_record(agreement_plaintext("42field", "420field")));
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("completed")]);

    let outcome = harness
        .flows
        .issue_obligation(&MatchContext::from_salt("42field"), "aleo1debtor", 300)
        .await?;

    assert_eq!(outcome.function, "issue_obligation");
    assert_eq!(outcome.confirmation, ConfirmationState::Confirmed);
    let executed = harness.wallet.executed.lock();
    let request = &executed[0];
    assert!(request.private_fee);
    assert_eq!(
        request.inputs[0],
        ExecutableInput::Plaintext(agreement_plaintext("42field", "420field"))
    );
    assert_eq!(request.inputs[1..], [literal("aleo1debtor"), literal("300u64")]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pay_obligation_pairs_the_obligation_with_a_covering_credits_record() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .add_record(V3, plaintext_record(obligation_plaintext("420field", "aleo1creditor")));
    harness
        .wallet
        .add_record(CREDITS, plaintext_record(credits_plaintext(50)));
    harness
        .wallet
        .add_record(CREDITS, plaintext_record(credits_plaintext(5_000)));
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("completed")]);

    let context = MatchContext::from_salt("42field").with_agreement_id("420field");
    let outcome = harness.flows.pay_obligation(&context, 100).await?;

    assert_eq!(outcome.program_id, V3);
    let executed = harness.wallet.executed.lock();
    assert_eq!(executed[0].function, "pay_obligation");
    assert_eq!(
        executed[0].inputs,
        vec![
            ExecutableInput::Plaintext(obligation_plaintext("420field", "aleo1creditor")),
            ExecutableInput::Plaintext(credits_plaintext(5_000)),
            literal("100u64"),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn settle_without_obligations_reports_no_candidates() -> Result<()> {
    let harness = Harness::new();

    let error = harness
        .flows
        .settle_obligation(&MatchContext::from_salt("42field"))
        .await
        .expect_err("nothing to settle");

    assert_eq!(error.code(), "NO_CANDIDATES");
    assert!(error.user_message().contains("does not exist yet"));
    assert_eq!(harness.wallet.record_calls.lock().len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_settlement_still_reports_success() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .add_record(V3, plaintext_record(obligation_plaintext("420field", "aleo1creditor")));

    let outcome = harness
        .flows
        .settle_obligation(&MatchContext::from_salt("42field"))
        .await?;

    assert_eq!(outcome.confirmation, ConfirmationState::TimedOut);
    assert!(harness
        .log
        .entries()
        .iter()
        .any(|entry| entry.level == LogLevel::Warning && entry.message.contains("may still confirm")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_disclosure_is_surfaced() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .add_record(V3, plaintext_record(agreement_plaintext("42field", "420field")));
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("rejected")]);

    let error = harness
        .flows
        .disclose_to_auditor(&MatchContext::from_salt("42field"), "aleo1auditor")
        .await
        .expect_err("rejected");

    assert_eq!(error.code(), "TRANSACTION_REJECTED");
    assert_eq!(error.user_message(), "The network rejected the transaction.");
    let entries = harness.log.entries();
    let last = entries.last().expect("entries");
    assert_eq!(last.level, LogLevel::Error);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn spends_with_a_bare_salt_use_the_stored_agreement_id() -> Result<()> {
    let harness = Harness::new();
    harness
        .wallet
        .script_status("at1tx1", &[StatusReport::new("completed")]);
    harness
        .wallet
        .script_status("at1tx2", &[StatusReport::new("completed")]);
    harness.ledger.set_mapping(V3, MAPPING, "42field", "812field", 0);
    harness
        .flows
        .create_agreement(3, 900, Some("42field".into()))
        .await?;

    harness
        .wallet
        .add_record(V3, plaintext_record(obligation_plaintext("700field", "aleo1c0")));
    harness
        .wallet
        .add_record(V3, plaintext_record(obligation_plaintext("812field", "aleo1c1")));

    harness
        .flows
        .settle_obligation(&MatchContext::from_salt("42"))
        .await?;

    let executed = harness.wallet.executed.lock();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[1].inputs,
        vec![ExecutableInput::Plaintext(obligation_plaintext(
            "812field", "aleo1c1"
        ))]
    );
    Ok(())
}
