use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::activity::ActivityLog;
use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::flows::{ActionOutcome, AgreementFlows};
use crate::matcher::MatchContext;
use crate::repository::InMemoryAgreementRepository;
use crate::rpc::{LedgerClientError, LedgerRestClient, WalletRpcClient, WalletRpcClientError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    WalletClient(#[from] WalletRpcClientError),
    #[error(transparent)]
    LedgerClient(#[from] LedgerClientError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CliError {
    /// One line suitable for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            CliError::Engine(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Create and settle private shared-expense agreements", long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(long, value_name = "PATH", env = "SPLITLEDGER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Override the wallet JSON-RPC endpoint.
    #[arg(long, value_name = "URL")]
    pub wallet_rpc: Option<String>,
    /// Bearer token for the wallet JSON-RPC endpoint.
    #[arg(long, value_name = "TOKEN", env = "SPLITLEDGER_WALLET_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new agreement on the newest program version.
    Create(CreateCommand),
    /// Issue an obligation against an agreement.
    Issue(IssueCommand),
    /// Settle an outstanding obligation.
    Settle(SettleCommand),
    /// Pay an obligation from a credits record.
    Pay(PayCommand),
    /// Disclose an agreement to an auditor.
    Disclose(DiscloseCommand),
    /// List the wallet's records for a program and how they classify.
    Records(RecordsCommand),
}

#[derive(Debug, Clone, Args)]
pub struct ContextArgs {
    /// Salt the agreement was created with.
    #[arg(long, value_name = "SALT")]
    pub salt: String,
    /// Ledger-assigned agreement id, when known.
    #[arg(long, value_name = "ID")]
    pub agreement_id: Option<String>,
}

impl ContextArgs {
    pub fn to_context(&self) -> MatchContext {
        let context = MatchContext::from_salt(self.salt.clone());
        match &self.agreement_id {
            Some(id) => context.with_agreement_id(id.clone()),
            None => context,
        }
    }
}

#[derive(Debug, Args)]
pub struct CreateCommand {
    #[arg(long, value_name = "COUNT")]
    pub participants: u8,
    /// Total amount in microcredits.
    #[arg(long, value_name = "MICROCREDITS")]
    pub total: u64,
    /// Reuse a salt instead of generating one.
    #[arg(long, value_name = "SALT")]
    pub salt: Option<String>,
}

impl CreateCommand {
    pub async fn execute(&self, flows: &AgreementFlows) -> Result<(), CliError> {
        let created = flows
            .create_agreement(self.participants, self.total, self.salt.clone())
            .await?;
        println!("Agreement created\n");
        println!("  Salt       : {}", created.salt);
        println!(
            "  Identifier : {} ({})",
            created.identifier.value, created.identifier.source
        );
        print_outcome(&created.outcome);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct IssueCommand {
    #[command(flatten)]
    pub context: ContextArgs,
    #[arg(long, value_name = "ADDRESS")]
    pub debtor: String,
    #[arg(long, value_name = "MICROCREDITS")]
    pub amount: u64,
}

impl IssueCommand {
    pub async fn execute(&self, flows: &AgreementFlows) -> Result<(), CliError> {
        let outcome = flows
            .issue_obligation(&self.context.to_context(), &self.debtor, self.amount)
            .await?;
        print_outcome(&outcome);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct SettleCommand {
    #[command(flatten)]
    pub context: ContextArgs,
}

impl SettleCommand {
    pub async fn execute(&self, flows: &AgreementFlows) -> Result<(), CliError> {
        let outcome = flows.settle_obligation(&self.context.to_context()).await?;
        print_outcome(&outcome);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct PayCommand {
    #[command(flatten)]
    pub context: ContextArgs,
    #[arg(long, value_name = "MICROCREDITS")]
    pub amount: u64,
}

impl PayCommand {
    pub async fn execute(&self, flows: &AgreementFlows) -> Result<(), CliError> {
        let outcome = flows
            .pay_obligation(&self.context.to_context(), self.amount)
            .await?;
        print_outcome(&outcome);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DiscloseCommand {
    #[command(flatten)]
    pub context: ContextArgs,
    #[arg(long, value_name = "ADDRESS")]
    pub auditor: String,
}

impl DiscloseCommand {
    pub async fn execute(&self, flows: &AgreementFlows) -> Result<(), CliError> {
        let outcome = flows
            .disclose_to_auditor(&self.context.to_context(), &self.auditor)
            .await?;
        print_outcome(&outcome);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// Program to list; defaults to the newest configured version.
    #[arg(long, value_name = "PROGRAM")]
    pub program: Option<String>,
    /// Flag records belonging to the agreement with this salt.
    #[arg(long, value_name = "SALT")]
    pub salt: Option<String>,
}

impl RecordsCommand {
    pub async fn execute(&self, flows: &AgreementFlows) -> Result<(), CliError> {
        let program = self
            .program
            .clone()
            .unwrap_or_else(|| flows.config().programs.latest().to_string());
        let context = self
            .salt
            .clone()
            .map(MatchContext::from_salt)
            .unwrap_or_default();
        let records = flows.list_records(&program, &context).await?;
        println!("Records for {program}\n");
        if records.is_empty() {
            println!("  (none)");
        }
        for (index, record) in records.iter().enumerate() {
            let mut flags = Vec::new();
            if record.spent {
                flags.push("spent");
            }
            if record.matches_context {
                flags.push("match");
            }
            println!(
                "  #{index:<3} {:<11} {:<11} {}",
                record.variant.label(),
                record.source,
                flags.join(",")
            );
        }
        Ok(())
    }
}

fn print_outcome(outcome: &ActionOutcome) {
    println!("  Program     : {}", outcome.program_id);
    println!("  Function    : {}", outcome.function);
    println!("  Transaction : {}", outcome.transaction_id);
    println!("  Status      : {}", outcome.confirmation);
}

impl Cli {
    pub fn load_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(url) = &self.wallet_rpc {
            config.endpoints.wallet_rpc = url.clone();
        }
        if let Some(token) = self.auth_token.as_ref().filter(|token| !token.is_empty()) {
            config.endpoints.auth_token = Some(token.clone());
        }
        Ok(config)
    }

    /// Build the engine against the configured endpoints and run the command,
    /// printing activity lines as they arrive.
    pub async fn run(self) -> Result<(), CliError> {
        let config = self.load_config()?;
        let wallet = Arc::new(WalletRpcClient::from_config(&config.endpoints)?);
        let ledger = Arc::new(LedgerRestClient::from_config(&config.endpoints)?);
        let log = Arc::new(ActivityLog::from_config(&config.activity));
        let printer = spawn_printer(&log);
        let flows = AgreementFlows::new(
            wallet,
            ledger,
            log,
            Arc::new(InMemoryAgreementRepository::new()),
            config,
        );

        let result = match &self.command {
            Command::Create(command) => command.execute(&flows).await,
            Command::Issue(command) => command.execute(&flows).await,
            Command::Settle(command) => command.execute(&flows).await,
            Command::Pay(command) => command.execute(&flows).await,
            Command::Disclose(command) => command.execute(&flows).await,
            Command::Records(command) => command.execute(&flows).await,
        };

        // Dropping the last log handle closes the stream and lets the printer drain.
        drop(flows);
        let _ = printer.await;
        result
    }
}

fn spawn_printer(log: &ActivityLog) -> JoinHandle<()> {
    let mut receiver = log.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(entry) => eprintln!("{entry}"),
                Err(RecvError::Lagged(skipped)) => eprintln!("[warning] {skipped} activity line(s) dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
