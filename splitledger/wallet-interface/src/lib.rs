//! Wallet/ledger interface contracts.
//!
//! This crate contains the serialization friendly payloads and service traits
//! exchanged between the splitledger engine and its two external
//! collaborators: the wallet service (record enumeration, decryption and
//! program execution) and the public ledger query service (mapping and
//! transaction lookups). Keeping them in a stand-alone crate lets mock and
//! HTTP-backed implementations compile without the engine itself.

#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub mod ledger;
pub mod wallet;

pub use ledger::{LedgerQueryError, LedgerQueryResult, LedgerQueryService, LedgerTransaction};
pub use wallet::{WalletService, WalletServiceError, WalletServiceResult};

/// Address newtype used by the interface.
pub type Address = String;

/// Private record as surfaced by a wallet enumeration.
///
/// Which representations are present depends entirely on the wallet: a
/// record may arrive decrypted (`plaintext`), partially structured (`data`
/// plus `owner`/`nonce`) or fully opaque (`ciphertext`). Unknown keys are
/// retained in `extra` so the raw object can be handed back unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Whether the record has already been consumed.
    #[serde(default)]
    pub spent: bool,
    /// Decrypted key/value text form of the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    /// Encrypted record payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    /// Alternate ciphertext key used by some wallet adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_ciphertext: Option<String>,
    /// Owner address of the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    /// Record nonce (group element literal).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Structured record entries keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    /// Program that issued the record, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    /// Remaining keys of the original wallet object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Construct a record holding only decrypted plaintext.
    pub fn from_plaintext(plaintext: impl Into<String>) -> Self {
        Self {
            plaintext: Some(plaintext.into()),
            ..Self::default()
        }
    }

    /// Construct a record holding only ciphertext.
    pub fn from_ciphertext(ciphertext: impl Into<String>) -> Self {
        Self {
            ciphertext: Some(ciphertext.into()),
            ..Self::default()
        }
    }

    /// Ciphertext under either of the keys wallets use for it.
    pub fn any_ciphertext(&self) -> Option<&str> {
        self.ciphertext
            .as_deref()
            .or(self.record_ciphertext.as_deref())
            .filter(|value| !value.trim().is_empty())
    }

    /// Non-empty plaintext, if any.
    pub fn non_empty_plaintext(&self) -> Option<&str> {
        self.plaintext
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    /// The record rendered back into the JSON object the wallet produced.
    pub fn to_raw(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A record entry as returned by enumeration.
///
/// Some wallets hand back records already serialized into their plaintext
/// form; others return structured objects.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WalletRecord {
    /// Pre-serialized record text.
    Serialized(String),
    /// Structured record object.
    Structured(Record),
}

impl WalletRecord {
    /// Whether the wallet reported the record as spent.
    pub fn is_spent(&self) -> bool {
        match self {
            WalletRecord::Serialized(_) => false,
            WalletRecord::Structured(record) => record.spent,
        }
    }

    /// Structured data entries used for classification fallbacks.
    pub fn data(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            WalletRecord::Serialized(_) => None,
            WalletRecord::Structured(record) => record.data.as_ref(),
        }
    }
}

impl From<Record> for WalletRecord {
    fn from(record: Record) -> Self {
        WalletRecord::Structured(record)
    }
}

/// Value handed to the wallet executor for a record argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutableInput {
    /// Record plaintext (verbatim, decrypted or synthesized).
    Plaintext(String),
    /// Opaque record ciphertext.
    Ciphertext(String),
    /// The raw record object, passed through untouched.
    Raw(Value),
    /// A plain literal argument such as `42u64` or an address.
    Literal(String),
}

impl ExecutableInput {
    /// JSON form used on the wire.
    pub fn to_value(&self) -> Value {
        match self {
            ExecutableInput::Plaintext(text)
            | ExecutableInput::Ciphertext(text)
            | ExecutableInput::Literal(text) => Value::String(text.clone()),
            ExecutableInput::Raw(value) => value.clone(),
        }
    }
}

impl Serialize for ExecutableInput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Program call submitted to the wallet executor.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Program to execute, e.g. `splitledger_v3.aleo`.
    pub program_id: String,
    /// Function (transition) name.
    pub function: String,
    /// Ordered function inputs.
    pub inputs: Vec<ExecutableInput>,
    /// Fee in microcredits.
    pub fee: u64,
    /// Whether the fee is paid from a private record.
    pub private_fee: bool,
}

impl ExecutionRequest {
    /// Construct a request with a public fee.
    pub fn new(
        program_id: impl Into<String>,
        function: impl Into<String>,
        inputs: Vec<ExecutableInput>,
        fee: u64,
    ) -> Self {
        Self {
            program_id: program_id.into(),
            function: function.into(),
            inputs,
            fee,
            private_fee: false,
        }
    }
}

/// Response returned by the executor after a successful submission.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    /// Identifier of the submitted transaction (possibly wallet-local).
    #[serde(alias = "id")]
    pub transaction_id: String,
    /// Execution outputs, when the wallet exposes them.
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Transaction status reported by a wallet or status endpoint.
///
/// Deserializes from either a bare status string or an object carrying the
/// status and, optionally, the canonical transaction identifier.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Raw status string (matching is case-insensitive).
    pub status: String,
    /// Canonical on-chain transaction id, when it differs from the submitted one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl StatusReport {
    /// Status without a canonical id.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            transaction_id: None,
        }
    }

    /// Status carrying a canonical transaction id.
    pub fn with_transaction_id(status: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            transaction_id: Some(transaction_id.into()),
        }
    }
}

impl<'de> Deserialize<'de> for StatusReport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct StatusObject {
            status: String,
            #[serde(default, alias = "txId", alias = "transaction_id")]
            transaction_id: Option<String>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bare(String),
            Object(StatusObject),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bare(status) => StatusReport::new(status),
            Repr::Object(object) => StatusReport {
                status: object.status,
                transaction_id: object.transaction_id.filter(|id| !id.is_empty()),
            },
        })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.transaction_id {
            Some(id) => write!(f, "{} ({id})", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Entry of the wallet's own transaction history.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    /// Wallet-local submission id.
    #[serde(default)]
    pub id: String,
    /// Canonical on-chain transaction id, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Last status the wallet observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Execution outputs recorded by the wallet.
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl WalletTransaction {
    /// Whether the entry refers to the given submission or transaction id.
    pub fn refers_to(&self, id: &str) -> bool {
        self.id == id || self.transaction_id.as_deref() == Some(id)
    }
}
