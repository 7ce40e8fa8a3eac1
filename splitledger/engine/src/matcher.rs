use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{strip_unit, DecodedFields};
use crate::identifier::SYNTHETIC_ID_PREFIX;

const SALT_FIELD: &str = "salt";
const AGREEMENT_ID_FIELDS: [&str; 2] = ["agreement_id", "agreement"];

/// Caller-supplied disambiguator tying a record to one agreement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchContext {
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
}

impl MatchContext {
    pub fn from_salt(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            agreement_id: None,
        }
    }

    pub fn with_agreement_id(mut self, agreement_id: impl Into<String>) -> Self {
        self.agreement_id = Some(agreement_id.into());
        self
    }

    /// The agreement id, unless it is absent or a placeholder.
    pub fn usable_agreement_id(&self) -> Option<&str> {
        self.agreement_id
            .as_deref()
            .filter(|value| !is_placeholder(value))
    }
}

/// Whether an identifier is empty, a JavaScript-ism like `"null"`, or a
/// synthetic id minted before the ledger assigned a real one.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.eq_ignore_ascii_case("null")
        || value.eq_ignore_ascii_case("undefined")
        || value.starts_with(SYNTHETIC_ID_PREFIX)
}

/// Whether a record belongs to the agreement described by `context`.
///
/// True when the record's salt equals the context salt, or its agreement id
/// equals the context agreement id; unit suffixes are ignored on both sides.
/// Empty salts and placeholder ids never match anything.
pub fn matches(
    fields: &DecodedFields,
    fallback_data: Option<&BTreeMap<String, String>>,
    context: &MatchContext,
) -> bool {
    let lookup = |name: &str| -> Option<String> {
        if !fields.is_empty() {
            fields.text(name).map(str::to_owned)
        } else {
            fallback_data.and_then(|data| data.get(name).cloned())
        }
    };

    let salt_matches = !context.salt.trim().is_empty()
        && lookup(SALT_FIELD)
            .map(|salt| same_literal(&salt, &context.salt))
            .unwrap_or(false);
    if salt_matches {
        return true;
    }

    let Some(wanted) = context.usable_agreement_id() else {
        return false;
    };
    AGREEMENT_ID_FIELDS.iter().any(|name| {
        lookup(name)
            .map(|id| same_literal(&id, wanted))
            .unwrap_or(false)
    })
}

fn same_literal(left: &str, right: &str) -> bool {
    let left = strip_unit(left);
    !left.is_empty() && left == strip_unit(right)
}
