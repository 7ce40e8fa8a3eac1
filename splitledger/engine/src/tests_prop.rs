use super::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

const DISCRIMINATING_KEYS: [&str; 5] = [
    "participant_count",
    "participants",
    "creditor",
    "creditor_address",
    "microcredits",
];
const OTHER_KEYS: [&str; 5] = ["owner", "amount", "salt", "debtor", "_nonce"];

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

prop_compose! {
    fn arb_unit()(unit in prop::sample::select(vec!["", "u8", "u64", "i32", "field", "group", "scalar"])) -> &'static str {
        unit
    }
}

prop_compose! {
    fn arb_visibility()(visibility in prop::sample::select(vec![".private", ".public"])) -> &'static str {
        visibility
    }
}

prop_compose! {
    /// Field name to (literal, visibility, padding) entries of a record block.
    fn arb_block_entries()(entries in prop::collection::btree_map(
            "[a-z_][a-z0-9_]{0,11}",
            (any::<u64>(), arb_unit(), arb_visibility(), 0usize..3),
            1..8)) -> BTreeMap<String, (String, &'static str, usize)> {
        entries
            .into_iter()
            .map(|(name, (digits, unit, visibility, padding))| {
                (name, (format!("{digits}{unit}"), visibility, padding))
            })
            .collect()
    }
}

prop_compose! {
    fn arb_key_set()(
        discriminating in prop::sample::subsequence(DISCRIMINATING_KEYS.to_vec(), 0..=DISCRIMINATING_KEYS.len()),
        other in prop::sample::subsequence(OTHER_KEYS.to_vec(), 0..=OTHER_KEYS.len()),
    ) -> Vec<&'static str> {
        discriminating.into_iter().chain(other).collect()
    }
}

fn arb_placeholder() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("null".to_string()),
        Just("NULL".to_string()),
        Just("undefined".to_string()),
        "[0-9]{1,12}".prop_map(|digits| format!("pending_{digits}")),
    ]
}

fn render_block(entries: &BTreeMap<String, (String, &'static str, usize)>) -> String {
    let body = entries
        .iter()
        .map(|(name, (literal, visibility, padding))| {
            format!("{name}:{}{literal}{visibility}", " ".repeat(*padding))
        })
        .collect::<Vec<_>>()
        .join(",\n  ");
    format!("{{\n  {body}\n}}")
}

fn fields_with(keys: &[&str]) -> DecodedFields {
    let mut fields = DecodedFields::new();
    for key in keys {
        fields.insert(*key, Literal::parse("1u8.private"));
    }
    fields
}

fn data_with(keys: &[&str]) -> BTreeMap<String, String> {
    keys.iter()
        .map(|key| (key.to_string(), "1u8.private".to_string()))
        .collect()
}

fn expected_variant(keys: &[&str]) -> RecordVariant {
    let has = |wanted: &[&str]| wanted.iter().any(|key| keys.contains(key));
    if has(&DISCRIMINATING_KEYS[..2]) {
        RecordVariant::Agreement
    } else if has(&DISCRIMINATING_KEYS[2..4]) {
        RecordVariant::Obligation
    } else if has(&DISCRIMINATING_KEYS[4..]) {
        RecordVariant::Currency
    } else {
        RecordVariant::Unknown
    }
}

fn render_salt(value: u128, with_unit: bool) -> String {
    if with_unit {
        format!("{value}field")
    } else {
        value.to_string()
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn decoded_blocks_project_back_to_their_literals(entries in arb_block_entries()) {
        let block = render_block(&entries);
        let fields = decode(&block);

        prop_assert_eq!(fields.len(), entries.len());
        for (name, (literal, _, _)) in &entries {
            prop_assert_eq!(fields.text(name), Some(literal.as_str()));
            prop_assert_eq!(extract_field(&block, name), Some(literal.clone()));
        }
        prop_assert_eq!(extract_field(&block, "absent-field"), None);
    }

    #[test]
    fn classification_is_total_and_exclusive(keys in arb_key_set(), on_fields in any::<bool>()) {
        let expected = expected_variant(&keys);
        let variant = if on_fields {
            classify(&fields_with(&keys), None)
        } else {
            classify(&DecodedFields::new(), Some(&data_with(&keys)))
        };
        prop_assert_eq!(variant, expected);

        let discriminating = keys.iter().any(|key| DISCRIMINATING_KEYS.contains(key));
        prop_assert_eq!(variant == RecordVariant::Unknown, !discriminating);
    }

    #[test]
    fn fallback_data_is_ignored_once_fields_decode(
        field_keys in arb_key_set(),
        data_keys in arb_key_set(),
    ) {
        prop_assume!(!field_keys.is_empty());
        let fields = fields_with(&field_keys);
        prop_assert_eq!(
            classify(&fields, Some(&data_with(&data_keys))),
            classify(&fields, None)
        );
    }

    #[test]
    fn salts_match_regardless_of_the_field_suffix(
        salt in any::<u128>(),
        other in any::<u128>(),
        same in any::<bool>(),
        record_unit in any::<bool>(),
        context_unit in any::<bool>(),
        visibility in arb_visibility(),
        on_fields in any::<bool>(),
    ) {
        let wanted = if same { salt } else { other };
        let stored = format!("{}{visibility}", render_salt(salt, record_unit));
        let context = MatchContext::from_salt(render_salt(wanted, context_unit));

        let matched = if on_fields {
            matches(&decode(&format!("{{ salt: {stored} }}")), None, &context)
        } else {
            let data: BTreeMap<String, String> = [("salt".to_string(), stored)].into_iter().collect();
            matches(&DecodedFields::new(), Some(&data), &context)
        };
        prop_assert_eq!(matched, salt == wanted);
    }

    #[test]
    fn placeholder_ids_never_match_any_record(
        placeholder in arb_placeholder(),
        record_id in any::<u64>(),
        echo_placeholder in any::<bool>(),
    ) {
        let stored = if echo_placeholder && !placeholder.is_empty() {
            placeholder.clone()
        } else {
            format!("{record_id}field")
        };
        let fields = decode(&format!(
            "{{ agreement_id: {stored}.private, salt: {record_id}field.private }}"
        ));
        let context = MatchContext::default().with_agreement_id(placeholder);
        prop_assert!(!matches(&fields, None, &context));
    }
}
