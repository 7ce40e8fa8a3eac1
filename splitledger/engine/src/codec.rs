//! Decoder for the brace-delimited record plaintext format.
//!
//! A record plaintext looks like
//!
//! ```text
//! {
//!   owner: aleo1qnr4dkkvkgfqph0vzc3y6z2eu975wnpz2925ntjccd5cfqxtyu8s7pyjh9.private,
//!   participant_count: 3u8.private,
//!   salt: 42field.private,
//!   _nonce: 1597field.public
//! }
//! ```
//!
//! Decoding is total: malformed segments are skipped and an empty input
//! yields an empty [`DecodedFields`]. Unit suffixes the decoder does not
//! know are kept verbatim.

use std::collections::BTreeMap;
use std::fmt;

const VISIBILITY_SUFFIXES: [&str; 3] = [".private", ".public", ".constant"];

/// Shape of a decoded literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    /// `<digits><unit>`, e.g. `42u64`, `7field`, `-3i8`. The unit may be empty.
    Numeric {
        /// Length in bytes of the signed digit run.
        digits_len: usize,
    },
    /// Address or bare identifier, e.g. `aleo1...` or `true`.
    Identifier,
    /// Anything else, such as nested structs or arrays, stored verbatim.
    Raw,
}

/// A typed literal as it appeared in the plaintext, minus visibility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    text: String,
    kind: LiteralKind,
}

impl Literal {
    pub fn parse(value: &str) -> Self {
        let text = strip_visibility(value).to_string();
        let kind = classify_literal(&text);
        Self { text, kind }
    }

    /// The literal including its unit suffix.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> LiteralKind {
        self.kind
    }

    /// Numeric part without the unit; non-numeric literals are returned whole.
    pub fn value(&self) -> &str {
        match self.kind {
            LiteralKind::Numeric { digits_len } => &self.text[..digits_len],
            _ => &self.text,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self.kind {
            LiteralKind::Numeric { digits_len } if digits_len < self.text.len() => {
                Some(&self.text[digits_len..])
            }
            _ => None,
        }
    }

    /// Unsigned integer value, when the digits fit in a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self.kind {
            LiteralKind::Numeric { .. } => self.value().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Field name to literal mapping produced by [`decode`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedFields {
    fields: BTreeMap<String, Literal>,
}

impl DecodedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, literal: Literal) {
        self.fields.insert(name.into(), literal);
    }

    pub fn get(&self, name: &str) -> Option<&Literal> {
        self.fields.get(name)
    }

    /// Full literal text (unit retained) of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).map(Literal::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Literal)> {
        self.fields.iter().map(|(name, literal)| (name.as_str(), literal))
    }
}

/// Decode a plaintext block into its fields.
pub fn decode(plaintext: &str) -> DecodedFields {
    let mut fields = DecodedFields::new();
    let trimmed = plaintext.trim();
    if trimmed.is_empty() {
        return fields;
    }
    let body = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(trimmed);

    for segment in split_top_level(body) {
        let Some((name, value)) = segment.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        fields.insert(name, Literal::parse(value));
    }
    fields
}

/// Unit-suffixed value of a single field, or `None` when absent.
pub fn extract_field(plaintext: &str, name: &str) -> Option<String> {
    if plaintext.trim().is_empty() {
        return None;
    }
    decode(plaintext).text(name).map(str::to_owned)
}

/// Drop a trailing unit suffix from a numeric literal (`"123field"` -> `"123"`).
///
/// Non-numeric input is returned trimmed but otherwise untouched.
pub fn strip_unit(value: &str) -> &str {
    let value = strip_visibility(value);
    match classify_literal(value) {
        LiteralKind::Numeric { digits_len } => &value[..digits_len],
        _ => value,
    }
}

/// Drop a `.private`/`.public`/`.constant` suffix and surrounding whitespace.
pub fn strip_visibility(value: &str) -> &str {
    let value = value.trim();
    VISIBILITY_SUFFIXES
        .iter()
        .find_map(|suffix| value.strip_suffix(suffix))
        .map(str::trim_end)
        .unwrap_or(value)
}

fn classify_literal(text: &str) -> LiteralKind {
    if text.starts_with('{') || text.starts_with('[') {
        return LiteralKind::Raw;
    }
    let bytes = text.as_bytes();
    let sign = usize::from(bytes.first() == Some(&b'-'));
    let digits = bytes[sign..]
        .iter()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits > 0 {
        let unit = &bytes[sign + digits..];
        if unit.iter().all(|byte| byte.is_ascii_alphanumeric()) {
            return LiteralKind::Numeric {
                digits_len: sign + digits,
            };
        }
        return LiteralKind::Raw;
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                LiteralKind::Identifier
            } else {
                LiteralKind::Raw
            }
        }
        _ => LiteralKind::Raw,
    }
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, c) in body.char_indices() {
        match c {
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push(&body[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    segments.push(&body[start..]);
    segments
}
