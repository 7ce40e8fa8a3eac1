#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use splitledger_engine::{
    ActivityLog, AgreementFlows, EngineConfig, InMemoryAgreementRepository,
};
use splitledger_wallet_interface::{
    ExecutionRequest, ExecutionResponse, LedgerQueryError, LedgerQueryResult, LedgerQueryService,
    LedgerTransaction, Record, StatusReport, WalletRecord, WalletService, WalletServiceError,
    WalletServiceResult, WalletTransaction,
};

pub const V3: &str = "splitledger_v3.aleo";
pub const V2: &str = "splitledger_v2.aleo";
pub const V1: &str = "splitledger_v1.aleo";
pub const CREDITS: &str = "credits.aleo";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

pub fn agreement_plaintext(salt: &str, agreement_id: &str) -> String {
    format!(
        "{{\n  owner: aleo1owner.private,\n  agreement_id: {agreement_id}.private,\n  participant_count: 3u8.private,\n  total_amount: 900u64.private,\n  salt: {salt}.private,\n  _nonce: 11group.public\n}}"
    )
}

pub fn obligation_plaintext(agreement_id: &str, creditor: &str) -> String {
    format!(
        "{{\n  owner: aleo1owner.private,\n  agreement_id: {agreement_id}.private,\n  creditor: {creditor}.private,\n  debtor: aleo1debtor.private,\n  amount: 300u64.private,\n  _nonce: 12group.public\n}}"
    )
}

pub fn credits_plaintext(microcredits: u64) -> String {
    format!("{{\n  owner: aleo1owner.private,\n  microcredits: {microcredits}u64.private,\n  _nonce: 13group.public\n}}")
}

pub fn plaintext_record(text: impl Into<String>) -> WalletRecord {
    Record::from_plaintext(text).into()
}

type Acceptor = Box<dyn Fn(&ExecutionRequest) -> bool + Send + Sync>;

/// Scriptable in-memory wallet that counts every call.
pub struct MockWallet {
    records: Mutex<HashMap<String, Vec<WalletRecord>>>,
    plaintexts: Mutex<HashMap<String, String>>,
    acceptor: Mutex<Acceptor>,
    outputs: Mutex<Vec<String>>,
    statuses: Mutex<Option<HashMap<String, VecDeque<StatusReport>>>>,
    history: Mutex<Option<Vec<WalletTransaction>>>,
    pub record_calls: Mutex<Vec<String>>,
    pub decrypt_calls: Mutex<usize>,
    pub executed: Mutex<Vec<ExecutionRequest>>,
    pub status_calls: Mutex<Vec<String>>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            plaintexts: Mutex::new(HashMap::new()),
            acceptor: Mutex::new(Box::new(|_| true)),
            outputs: Mutex::new(Vec::new()),
            statuses: Mutex::new(None),
            history: Mutex::new(None),
            record_calls: Mutex::new(Vec::new()),
            decrypt_calls: Mutex::new(0),
            executed: Mutex::new(Vec::new()),
            status_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_record(&self, program: &str, record: WalletRecord) {
        self.records
            .lock()
            .entry(program.to_string())
            .or_default()
            .push(record);
    }

    pub fn decrypts(&self, ciphertext: &str, plaintext: &str) {
        self.plaintexts
            .lock()
            .insert(ciphertext.to_string(), plaintext.to_string());
    }

    pub fn accept_when(&self, acceptor: impl Fn(&ExecutionRequest) -> bool + Send + Sync + 'static) {
        *self.acceptor.lock() = Box::new(acceptor);
    }

    pub fn with_outputs(&self, outputs: Vec<String>) {
        *self.outputs.lock() = outputs;
    }

    /// Enable status reporting; each query pops the next scripted status and
    /// the last one repeats.
    pub fn script_status(&self, transaction_id: &str, statuses: &[StatusReport]) {
        self.statuses
            .lock()
            .get_or_insert_with(HashMap::new)
            .insert(transaction_id.to_string(), statuses.iter().cloned().collect());
    }

    pub fn with_history(&self, history: Vec<WalletTransaction>) {
        *self.history.lock() = Some(history);
    }

    pub fn next_transaction_id(&self) -> String {
        format!("at1tx{}", self.executed.lock().len() + 1)
    }
}

#[async_trait]
impl WalletService for MockWallet {
    async fn records(&self, program_id: &str) -> WalletServiceResult<Vec<WalletRecord>> {
        self.record_calls.lock().push(program_id.to_string());
        Ok(self
            .records
            .lock()
            .get(program_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn decrypt(&self, ciphertext: &str) -> WalletServiceResult<String> {
        *self.decrypt_calls.lock() += 1;
        self.plaintexts
            .lock()
            .get(ciphertext)
            .cloned()
            .ok_or_else(|| WalletServiceError::decrypt("record is not owned by this account"))
    }

    async fn execute(&self, request: &ExecutionRequest) -> WalletServiceResult<ExecutionResponse> {
        let accepted = (*self.acceptor.lock())(request);
        if !accepted {
            return Err(WalletServiceError::rejected_input(format!(
                "{} does not accept these inputs",
                request.function
            )));
        }
        let mut executed = self.executed.lock();
        executed.push(request.clone());
        Ok(ExecutionResponse {
            transaction_id: format!("at1tx{}", executed.len()),
            outputs: self.outputs.lock().clone(),
        })
    }

    async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> WalletServiceResult<Option<StatusReport>> {
        self.status_calls.lock().push(transaction_id.to_string());
        let mut statuses = self.statuses.lock();
        let Some(statuses) = statuses.as_mut() else {
            return Ok(None);
        };
        let Some(queue) = statuses.get_mut(transaction_id) else {
            return Ok(Some(StatusReport::new("pending")));
        };
        let report = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(report)
    }

    async fn transaction_history(
        &self,
        _program_id: &str,
    ) -> WalletServiceResult<Option<Vec<WalletTransaction>>> {
        Ok(self.history.lock().clone())
    }
}

/// Scriptable public ledger.
#[derive(Default)]
pub struct MockLedger {
    /// Mapping values keyed by `program/mapping/key`, with the number of
    /// reads that must happen before the value becomes visible.
    mappings: Mutex<HashMap<String, (usize, String)>>,
    transactions: Mutex<HashMap<String, LedgerTransaction>>,
    offline: Mutex<bool>,
    pub mapping_reads: Mutex<usize>,
    pub transaction_reads: Mutex<Vec<String>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_mapping(&self, program: &str, mapping: &str, key: &str, value: &str, visible_after: usize) {
        self.mappings.lock().insert(
            format!("{program}/{mapping}/{key}"),
            (visible_after, value.to_string()),
        );
    }

    pub fn add_transaction(&self, transaction: LedgerTransaction) {
        self.transactions
            .lock()
            .insert(transaction.id.clone(), transaction);
    }

    pub fn go_offline(&self) {
        *self.offline.lock() = true;
    }
}

#[async_trait]
impl LedgerQueryService for MockLedger {
    async fn read_mapping(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> LedgerQueryResult<Option<String>> {
        let reads = {
            let mut reads = self.mapping_reads.lock();
            *reads += 1;
            *reads
        };
        if *self.offline.lock() {
            return Err(LedgerQueryError::Network("connection refused".into()));
        }
        let mappings = self.mappings.lock();
        Ok(mappings
            .get(&format!("{program_id}/{mapping}/{key}"))
            .filter(|(visible_after, _)| reads > *visible_after)
            .map(|(_, value)| value.clone()))
    }

    async fn read_transaction(&self, id: &str) -> LedgerQueryResult<Option<LedgerTransaction>> {
        self.transaction_reads.lock().push(id.to_string());
        if *self.offline.lock() {
            return Err(LedgerQueryError::Network("connection refused".into()));
        }
        Ok(self.transactions.lock().get(id).cloned())
    }
}

/// Config with short timings for paused-clock tests.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.confirmation.poll_interval_ms = 100;
    config.confirmation.max_attempts = 5;
    config.identifier.mapping_attempts = 3;
    config.identifier.mapping_delay_ms = 100;
    config.activity.mirror_to_tracing = false;
    config
}

pub struct Harness {
    pub wallet: Arc<MockWallet>,
    pub ledger: Arc<MockLedger>,
    pub log: Arc<ActivityLog>,
    pub flows: AgreementFlows,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let wallet = MockWallet::new();
        let ledger = MockLedger::new();
        let log = Arc::new(ActivityLog::from_config(&config.activity));
        let flows = AgreementFlows::new(
            wallet.clone(),
            ledger.clone(),
            log.clone(),
            Arc::new(InMemoryAgreementRepository::new()),
            config,
        );
        Self {
            wallet,
            ledger,
            log,
            flows,
        }
    }
}
