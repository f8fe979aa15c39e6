//! The `enrich` stage runner: wraps `auditchain_enrich::enrich_event` in
//! the line-oriented loop, handling the stage's own decode failures so
//! no input line is ever silently lost — a line that isn't valid JSON
//! becomes an ERROR event rather than a silent drop, and `enrich_event`
//! passes ERROR events straight through regardless of `emit_unknown`.

use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use auditchain_contracts::{AuditError, AuditResult, Event};
use auditchain_enrich::{enrich_event, EnrichConfig};
use auditchain_policy::{RiskPolicy, SensitivityDictionary};
use auditchain_schema::SchemaIndex;

use crate::cancel::CancellationToken;

/// Counters accumulated across an enrich-stage run, mirroring
/// `auditchain_enrich::EnrichCounters` but adding the decode-failure
/// count the stage loop itself is responsible for.
#[derive(Debug, Clone, Default)]
pub struct EnrichStreamCounters {
    pub input_events: u64,
    pub enriched_events: u64,
    pub dropped_unknown: u64,
    pub error_events: u64,
    pub cancelled: bool,
}

fn nanos_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Run the enrich stage over `reader`, writing augmented or dropped events
/// to `writer` according to `config.emit_unknown`.
pub fn run_enrich_stream<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    schema: &SchemaIndex,
    dictionary: &SensitivityDictionary,
    risk_policy: &RiskPolicy,
    config: EnrichConfig,
    token: &CancellationToken,
) -> AuditResult<EnrichStreamCounters> {
    let mut counters = EnrichStreamCounters::default();

    for line in reader.lines() {
        if token.is_cancelled() {
            counters.cancelled = true;
            break;
        }

        let line = line.map_err(|e| AuditError::Io {
            path: "<enrich input>".to_string(),
            source: e,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        counters.input_events += 1;

        let event: Event = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(err) => {
                counters.error_events += 1;
                warn!(error = %err, "failed to decode event for enrichment; emitting ERROR event");
                Event::error_event(nanos_now(), "enrich", err.to_string(), trimmed)
            }
        };

        match enrich_event(event, schema, dictionary, risk_policy, config) {
            Some(enriched) => {
                counters.enriched_events += 1;
                let line_out = serde_json::to_string(&enriched).expect("enriched event must serialize");
                writeln!(writer, "{line_out}").map_err(|e| AuditError::Io {
                    path: "<enrich output>".to_string(),
                    source: e,
                })?;
            }
            None => {
                counters.dropped_unknown += 1;
            }
        }
    }

    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn schema() -> SchemaIndex {
        let csv = "db_name,schema_name,table_name,column_name,column_type\n\
                    app,public,users,ssn,varchar(11)";
        SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn dictionary() -> SensitivityDictionary {
        SensitivityDictionary::from_json_str(r#"{"PII": [{"regex": "(?i)^ssn$", "expected_types": []}]}"#).unwrap()
    }

    fn risk_policy(dict: &SensitivityDictionary) -> RiskPolicy {
        RiskPolicy::from_json_str(r#"{"base": {"PII": "high"}, "combinations": {}, "default": "low"}"#, dict).unwrap()
    }

    #[test]
    fn matching_event_is_enriched_and_emitted() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let input = r#"{"event_id":"e-1","raw_query":"SELECT ssn FROM users"}"#;

        let mut out = Vec::new();
        let counters = run_enrich_stream(
            Cursor::new(input),
            &mut out,
            &schema,
            &dictionary,
            &policy,
            EnrichConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(counters.input_events, 1);
        assert_eq!(counters.enriched_events, 1);
        assert_eq!(counters.dropped_unknown, 0);
        assert!(String::from_utf8(out).unwrap().contains("PII:ssn"));
    }

    #[test]
    fn non_matching_event_is_dropped() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let input = r#"{"event_id":"e-1","raw_query":"SELECT bio FROM users"}"#;

        let mut out = Vec::new();
        let counters = run_enrich_stream(
            Cursor::new(input),
            &mut out,
            &schema,
            &dictionary,
            &policy,
            EnrichConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(counters.dropped_unknown, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn malformed_line_becomes_error_event_and_is_always_emitted() {
        let schema = schema();
        let dictionary = dictionary();
        let policy = risk_policy(&dictionary);
        let input = "not valid json";

        let mut out = Vec::new();
        let counters = run_enrich_stream(
            Cursor::new(input),
            &mut out,
            &schema,
            &dictionary,
            &policy,
            EnrichConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(counters.error_events, 1);
        assert_eq!(counters.enriched_events, 1);
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("\"query_type\":\"ERROR\""));
    }
}
