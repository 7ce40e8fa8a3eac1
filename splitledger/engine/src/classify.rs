use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::DecodedFields;

const AGREEMENT_KEYS: [&str; 2] = ["participant_count", "participants"];
const OBLIGATION_KEYS: [&str; 2] = ["creditor", "creditor_address"];
const CURRENCY_KEYS: [&str; 1] = ["microcredits"];

/// Domain variant of a wallet record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordVariant {
    Agreement,
    Obligation,
    Currency,
    Unknown,
}

impl RecordVariant {
    pub fn label(&self) -> &'static str {
        match self {
            RecordVariant::Agreement => "agreement",
            RecordVariant::Obligation => "obligation",
            RecordVariant::Currency => "currency",
            RecordVariant::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RecordVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a record from its decoded fields, falling back to the raw
/// `data` keys only when no fields were decoded.
///
/// The rules are checked in a fixed order so at most one can fire.
pub fn classify(
    fields: &DecodedFields,
    fallback_data: Option<&BTreeMap<String, String>>,
) -> RecordVariant {
    if !fields.is_empty() {
        return classify_keys(|key| fields.contains(key));
    }
    match fallback_data {
        Some(data) if !data.is_empty() => classify_keys(|key| data.contains_key(key)),
        _ => RecordVariant::Unknown,
    }
}

fn classify_keys(has: impl Fn(&str) -> bool) -> RecordVariant {
    let any = |keys: &[&str]| keys.iter().any(|key| has(*key));
    if any(&AGREEMENT_KEYS[..]) {
        RecordVariant::Agreement
    } else if any(&OBLIGATION_KEYS[..]) {
        RecordVariant::Obligation
    } else if any(&CURRENCY_KEYS[..]) {
        RecordVariant::Currency
    } else {
        RecordVariant::Unknown
    }
}
