//! Turns whatever representation a wallet handed back into an executor input.

use std::collections::BTreeMap;

use splitledger_wallet_interface::{ExecutableInput, Record, WalletRecord, WalletService};
use tracing::{debug, warn};

use crate::codec::{decode, strip_visibility, DecodedFields};

const NONCE_FIELD: &str = "_nonce";

/// Which step of the priority chain produced the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    /// The record was already a serialized string.
    Serialized,
    Plaintext,
    Decrypted,
    Synthesized,
    Ciphertext,
    Raw,
}

impl InputSource {
    pub fn label(&self) -> &'static str {
        match self {
            InputSource::Serialized => "serialized",
            InputSource::Plaintext => "plaintext",
            InputSource::Decrypted => "decrypted",
            InputSource::Synthesized => "synthesized",
            InputSource::Ciphertext => "ciphertext",
            InputSource::Raw => "raw",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuiltInput {
    pub input: ExecutableInput,
    /// Plaintext backing the input; empty for opaque inputs.
    pub plaintext: String,
    pub fields: DecodedFields,
    pub source: InputSource,
}

impl BuiltInput {
    fn from_plaintext(plaintext: String, source: InputSource) -> Self {
        let fields = decode(&plaintext);
        Self {
            input: ExecutableInput::Plaintext(plaintext.clone()),
            plaintext,
            fields,
            source,
        }
    }

    fn opaque(input: ExecutableInput, source: InputSource) -> Self {
        Self {
            input,
            plaintext: String::new(),
            fields: DecodedFields::new(),
            source,
        }
    }
}

/// Build the executor input for a record.
///
/// Tries, in order: the record's own plaintext, decrypting its ciphertext
/// (when a decryptor is supplied), synthesizing plaintext from its structured
/// data, the bare ciphertext, and finally the raw record object. Each step
/// that fails falls through to the next one.
pub async fn build_input(record: &WalletRecord, decryptor: Option<&dyn WalletService>) -> BuiltInput {
    let record = match record {
        WalletRecord::Serialized(text) => {
            let fields = decode(text);
            return BuiltInput {
                input: ExecutableInput::Plaintext(text.clone()),
                plaintext: text.clone(),
                fields,
                source: InputSource::Serialized,
            };
        }
        WalletRecord::Structured(record) => record,
    };

    if let Some(plaintext) = record.non_empty_plaintext() {
        return BuiltInput::from_plaintext(plaintext.to_string(), InputSource::Plaintext);
    }

    if let (Some(decryptor), Some(ciphertext)) = (decryptor, record.any_ciphertext()) {
        match decryptor.decrypt(ciphertext).await {
            Ok(plaintext) if !plaintext.trim().is_empty() => {
                return BuiltInput::from_plaintext(plaintext, InputSource::Decrypted);
            }
            Ok(_) => debug!("wallet returned empty plaintext for record"),
            Err(error) => warn!(code = error.code(), %error, "record decryption skipped"),
        }
    }

    if let Some(plaintext) = synthesize(record) {
        return BuiltInput::from_plaintext(plaintext, InputSource::Synthesized);
    }

    if let Some(ciphertext) = record.any_ciphertext() {
        return BuiltInput::opaque(
            ExecutableInput::Ciphertext(ciphertext.to_string()),
            InputSource::Ciphertext,
        );
    }

    BuiltInput::opaque(ExecutableInput::Raw(record.to_raw()), InputSource::Raw)
}

/// Rebuild a plaintext block from a record's owner, nonce and data entries.
///
/// Entries are emitted in key order as `.private`; the nonce closes the block
/// as `.public`. Returns `None` when owner, nonce or data are missing.
pub fn synthesize(record: &Record) -> Option<String> {
    let data = record.data.as_ref().filter(|data| !data.is_empty())?;
    let owner = record
        .owner
        .as_deref()
        .map(strip_visibility)
        .filter(|owner| !owner.is_empty())?;
    let nonce = record
        .nonce
        .as_deref()
        .or_else(|| data.get(NONCE_FIELD).map(String::as_str))
        .map(strip_visibility)
        .filter(|nonce| !nonce.is_empty())?;
    Some(render_block(owner, data, nonce))
}

fn render_block(owner: &str, data: &BTreeMap<String, String>, nonce: &str) -> String {
    let mut lines = Vec::with_capacity(data.len() + 2);
    lines.push(format!("  owner: {owner}.private"));
    for (name, value) in data {
        if name == NONCE_FIELD || name == "owner" {
            continue;
        }
        lines.push(format!("  {name}: {}.private", strip_visibility(value)));
    }
    lines.push(format!("  {NONCE_FIELD}: {nonce}.public"));
    format!("{{\n{}\n}}", lines.join(",\n"))
}
