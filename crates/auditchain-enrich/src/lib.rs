//! # auditchain-enrich
//!
//! The classifier/enricher: resolves a statement's columns against the
//! schema index, matches them against the sensitivity dictionary, and
//! scores the result with the risk policy.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use auditchain_contracts::Event;
use auditchain_extract::{extract_refs, resolve};
use auditchain_policy::{RiskPolicy, SensitivityDictionary};
use auditchain_schema::SchemaIndex;

/// Enrichment-stage configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichConfig {
    /// When true, events with no sensitivity matches are still emitted
    /// (with an empty `sensitivity` array and `risk_level = default`)
    /// rather than dropped.
    pub emit_unknown: bool,
}

/// Counters accumulated across an enrichment run.
#[derive(Debug, Clone, Default)]
pub struct EnrichCounters {
    pub input_events: u64,
    pub emitted_events: u64,
    pub dropped_unknown: u64,
}

/// Classify and score a single event in place, returning `None` when
/// the emission policy says to drop it.
///
/// `bulk`, `bulk_type`, and `full_table_read` are left untouched — they
/// are set by the parser, preserved as-is if present, and never
/// recomputed here.
pub fn enrich_event(
    mut event: Event,
    schema: &SchemaIndex,
    dictionary: &SensitivityDictionary,
    risk_policy: &RiskPolicy,
    config: EnrichConfig,
) -> Option<Event> {
    // An ERROR event produced upstream must reach the hasher regardless
    // of the emission policy, so it is never subject to the "no
    // sensitivity match -> drop" rule below.
    if event.query_type.as_deref() == Some("ERROR") {
        return Some(event);
    }

    let raw_query = event.raw_query.clone().unwrap_or_default();
    let refs = extract_refs(&raw_query);
    let resolved = resolve(&refs, schema);

    let mut sensitivity: Vec<String> = Vec::new();
    let mut categories: BTreeSet<String> = BTreeSet::new();

    for (qualified_col, column_type) in &resolved {
        let bare_col = qualified_col.rsplit('.').next().unwrap_or(qualified_col);

        if let Some(reason) = dictionary.is_excluded(bare_col) {
            debug!(column = bare_col, reason, "excluded by negative rule");
            continue;
        }

        for (category, rules) in dictionary.categories() {
            let matched = rules.iter().any(|rule| {
                rule.pattern.is_match(bare_col)
                    && (rule.expected_types.is_empty() || rule.expected_types.contains(column_type))
            });
            if matched {
                sensitivity.push(format!("{category}:{bare_col}"));
                categories.insert(category.to_string());
            }
        }
    }

    // Stable, deterministic order across runs: sort by the full
    // "Category:column" token.
    sensitivity.sort();

    if categories.is_empty() && !config.emit_unknown {
        return None;
    }

    let risk_level = risk_policy.resolve(&categories);

    event.sensitivity = Some(sensitivity);
    event.risk_level = Some(risk_level);
    event.extra.insert(
        "categories".to_string(),
        Value::Array(categories.into_iter().map(Value::String).collect()),
    );

    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_contracts::RiskLevel;

    fn schema() -> SchemaIndex {
        let csv = "db_name,schema_name,table_name,column_name,column_type\n\
                    app,public,users,id,uuid\n\
                    app,public,users,ssn,varchar(11)\n\
                    app,public,users,email,varchar(255)\n\
                    app,public,users,bio,text";
        SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn dictionary() -> SensitivityDictionary {
        SensitivityDictionary::from_json_str(
            r#"{"PII": [
                {"regex": "(?i)^ssn$", "expected_types": []},
                {"regex": "(?i)^email$", "expected_types": []}
            ]}"#,
        )
        .unwrap()
    }

    fn risk_policy(dict: &SensitivityDictionary) -> RiskPolicy {
        RiskPolicy::from_json_str(r#"{"base": {"PII": "high"}, "combinations": {}, "default": "low"}"#, dict).unwrap()
    }

    fn event_with_query(query: &str) -> Event {
        let mut event = Event::new("e-1");
        event.raw_query = Some(query.to_string());
        event
    }

    // ── Classification and risk scoring ────────────────────────────────────────

    #[test]
    fn matching_column_produces_sensitivity_and_risk() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let event = event_with_query("SELECT ssn FROM users");

        let enriched = enrich_event(event, &schema, &dictionary, &policy, EnrichConfig::default()).unwrap();
        assert_eq!(enriched.sensitivity, Some(vec!["PII:ssn".to_string()]));
        assert_eq!(enriched.risk_level, Some(RiskLevel::High));
    }

    #[test]
    fn non_matching_query_is_dropped_by_default() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let event = event_with_query("SELECT bio FROM users");

        let enriched = enrich_event(event, &schema, &dictionary, &policy, EnrichConfig::default());
        assert!(enriched.is_none());
    }

    #[test]
    fn non_matching_query_is_emitted_when_emit_unknown_is_set() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let event = event_with_query("SELECT bio FROM users");

        let config = EnrichConfig { emit_unknown: true };
        let enriched = enrich_event(event, &schema, &dictionary, &policy, config).unwrap();
        assert_eq!(enriched.sensitivity, Some(Vec::<String>::new()));
        assert_eq!(enriched.risk_level, Some(RiskLevel::Low));
    }

    // ── Never-lose-data: ERROR events always pass through ─────────────────────

    #[test]
    fn error_events_always_pass_through_regardless_of_emission_policy() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let event = Event::error_event(1, "parse", "bad line", "not json");

        let enriched = enrich_event(event, &schema, &dictionary, &policy, EnrichConfig::default())
            .expect("ERROR events must never be dropped by the emission policy");
        assert_eq!(enriched.query_type.as_deref(), Some("ERROR"));
        assert!(enriched.sensitivity.is_none());
    }

    #[test]
    fn sensitivity_is_sorted_lexicographically() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let event = event_with_query("SELECT email, ssn FROM users");

        let enriched = enrich_event(event, &schema, &dictionary, &policy, EnrichConfig::default()).unwrap();
        assert_eq!(
            enriched.sensitivity,
            Some(vec!["PII:email".to_string(), "PII:ssn".to_string()])
        );
    }

    #[test]
    fn bulk_fields_are_preserved_not_recomputed() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let mut event = event_with_query("SELECT ssn FROM users");
        event.bulk = Some(true);
        event.bulk_type = Some("insert".to_string());

        let enriched = enrich_event(event, &schema, &dictionary, &policy, EnrichConfig::default()).unwrap();
        assert_eq!(enriched.bulk, Some(true));
        assert_eq!(enriched.bulk_type.as_deref(), Some("insert"));
    }

    // ── Idempotence ─────────────────────────────────────────────────────────

    #[test]
    fn enriching_twice_yields_the_same_result() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let event = event_with_query("SELECT ssn, email FROM users");

        let once = enrich_event(event.clone(), &schema, &dictionary, &policy, EnrichConfig::default()).unwrap();
        let twice = enrich_event(once.clone(), &schema, &dictionary, &policy, EnrichConfig::default()).unwrap();

        assert_eq!(once.sensitivity, twice.sensitivity);
        assert_eq!(once.risk_level, twice.risk_level);
    }
}
