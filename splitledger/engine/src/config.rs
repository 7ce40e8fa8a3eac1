use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_PROGRAM_VERSIONS: [&str; 3] = [
    "splitledger_v3.aleo",
    "splitledger_v2.aleo",
    "splitledger_v1.aleo",
];
const DEFAULT_CREDITS_PROGRAM: &str = "credits.aleo";
const DEFAULT_AGREEMENT_MAPPING: &str = "agreement_by_salt";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_PROGRESS_EVERY: u32 = 5;
const DEFAULT_MAPPING_ATTEMPTS: u32 = 5;
const DEFAULT_MAPPING_DELAY_MS: u64 = 3_000;
const DEFAULT_CREATE_FEE: u64 = 1_500_000;
const DEFAULT_ISSUE_FEE: u64 = 1_000_000;
const DEFAULT_SETTLE_FEE: u64 = 800_000;
const DEFAULT_PAY_FEE: u64 = 1_200_000;
const DEFAULT_DISCLOSE_FEE: u64 = 600_000;
const DEFAULT_WALLET_RPC: &str = "http://127.0.0.1:3030/rpc";
const DEFAULT_LEDGER_API: &str = "https://api.explorer.provable.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_ACTIVITY_CAPACITY: usize = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("engine config must list at least one program version")]
    NoProgramVersions,
}

/// Engine configuration, loadable from TOML.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub programs: ProgramConfig,
    pub confirmation: ConfirmationConfig,
    pub identifier: IdentifierConfig,
    pub fees: FeeConfig,
    pub endpoints: EndpointConfig,
    pub activity: ActivityConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config.sanitized())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .programs
            .versions
            .iter()
            .all(|version| version.trim().is_empty())
        {
            return Err(ConfigError::NoProgramVersions);
        }
        Ok(())
    }

    pub fn sanitized(mut self) -> Self {
        self.programs.versions.retain(|version| !version.trim().is_empty());
        self.confirmation = self.confirmation.sanitized();
        self.identifier = self.identifier.sanitized();
        self
    }
}

/// Program identifiers the engine talks to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProgramConfig {
    /// Deployed program versions, newest first.
    pub versions: Vec<String>,
    /// Program issuing the spendable currency records.
    pub credits_program: String,
    /// Public mapping from agreement salt to ledger-assigned id.
    pub agreement_mapping: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            versions: DEFAULT_PROGRAM_VERSIONS
                .iter()
                .map(|version| version.to_string())
                .collect(),
            credits_program: DEFAULT_CREDITS_PROGRAM.to_string(),
            agreement_mapping: DEFAULT_AGREEMENT_MAPPING.to_string(),
        }
    }
}

impl ProgramConfig {
    /// Newest deployed version; new agreements are always created here.
    pub fn latest(&self) -> &str {
        self.versions
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_PROGRAM_VERSIONS[0])
    }
}

/// Transaction confirmation polling.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    /// Emit a progress line every N attempts.
    pub progress_every: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sanitized(mut self) -> Self {
        self.poll_interval_ms = self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        self.max_attempts = self.max_attempts.max(1);
        if self.progress_every == 0 {
            self.progress_every = DEFAULT_PROGRESS_EVERY;
        }
        self
    }
}

/// Ledger-assigned identifier lookup after agreement creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdentifierConfig {
    pub mapping_attempts: u32,
    pub mapping_delay_ms: u64,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            mapping_attempts: DEFAULT_MAPPING_ATTEMPTS,
            mapping_delay_ms: DEFAULT_MAPPING_DELAY_MS,
        }
    }
}

impl IdentifierConfig {
    pub fn mapping_delay(&self) -> Duration {
        Duration::from_millis(self.mapping_delay_ms)
    }

    pub fn sanitized(mut self) -> Self {
        self.mapping_attempts = self.mapping_attempts.max(1);
        self
    }
}

/// Per-action fees in microcredits.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeeConfig {
    pub create_agreement: u64,
    pub issue_obligation: u64,
    pub settle_obligation: u64,
    pub pay_obligation: u64,
    pub disclose_to_auditor: u64,
    pub private_fee: bool,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            create_agreement: DEFAULT_CREATE_FEE,
            issue_obligation: DEFAULT_ISSUE_FEE,
            settle_obligation: DEFAULT_SETTLE_FEE,
            pay_obligation: DEFAULT_PAY_FEE,
            disclose_to_auditor: DEFAULT_DISCLOSE_FEE,
            private_fee: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
    Canary,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Canary => "canary",
        }
    }
}

/// Where the HTTP-backed services live.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    pub wallet_rpc: String,
    pub ledger_api: String,
    pub network: Network,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            wallet_rpc: DEFAULT_WALLET_RPC.to_string(),
            ledger_api: DEFAULT_LEDGER_API.to_string(),
            network: Network::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auth_token: None,
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActivityConfig {
    pub capacity: usize,
    pub mirror_to_tracing: bool,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ACTIVITY_CAPACITY,
            mirror_to_tracing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = EngineConfig::default();
        assert_eq!(config.programs.latest(), "splitledger_v3.aleo");
        assert_eq!(config.programs.versions.len(), 3);
        assert_eq!(config.programs.credits_program, DEFAULT_CREDITS_PROGRAM);
        assert_eq!(config.confirmation.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.confirmation.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.identifier.mapping_attempts, DEFAULT_MAPPING_ATTEMPTS);
        assert_eq!(config.fees.create_agreement, DEFAULT_CREATE_FEE);
        assert_eq!(config.endpoints.network, Network::Testnet);
        assert!(config.activity.mirror_to_tracing);
    }

    #[test]
    fn partial_toml_keeps_defaults_and_clamps_values() {
        let contents = r#"
            [programs]
            versions = ["splitledger_v4.aleo", "", "splitledger_v3.aleo"]

            [confirmation]
            poll_interval_ms = 5
            max_attempts = 0

            [endpoints]
            network = "mainnet"
        "#;
        let config = EngineConfig::from_toml(contents).expect("config");
        assert_eq!(
            config.programs.versions,
            vec!["splitledger_v4.aleo".to_string(), "splitledger_v3.aleo".to_string()]
        );
        assert_eq!(config.confirmation.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert_eq!(config.confirmation.max_attempts, 1);
        assert_eq!(config.confirmation.progress_every, DEFAULT_PROGRESS_EVERY);
        assert_eq!(config.endpoints.network, Network::Mainnet);
        assert_eq!(config.fees, FeeConfig::default());
    }

    #[test]
    fn empty_program_list_is_rejected() {
        let result = EngineConfig::from_toml("[programs]\nversions = []\n");
        assert!(matches!(result, Err(ConfigError::NoProgramVersions)));
    }

    #[test]
    fn load_reads_from_disk_and_roundtrips() {
        let mut config = EngineConfig::default();
        config.fees.private_fee = true;
        config.identifier.mapping_delay_ms = 250;
        let serialized = toml::to_string(&config).expect("serialize");

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(serialized.as_bytes()).expect("write");
        let restored = EngineConfig::load(file.path()).expect("load");
        assert_eq!(restored, config);
    }
}
