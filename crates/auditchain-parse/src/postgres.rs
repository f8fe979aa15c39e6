//! The Postgres pgAudit parser.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use auditchain_contracts::{DbSystem, Event};

use crate::classify::{detect_query_type, looks_like_sql, normalize_stmt_type};
use crate::time::normalize_timestamp_tolerant;

/// Options shared by both parsers: `raw_query` is emitted only when the
/// caller enables it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub include_raw_query: bool,
}

static AUDIT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?x)^(?P<ts>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:\.\d+)?\s+\S+)\s+
        \[(?P<pid>\d+)\]\s+LOG:\s+AUDIT:\s*(?P<csv>.*)$")
    .unwrap()
});

static QUOTED_GROUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?s)"(.*?)"(?:,|$)"#).unwrap());

const AUTH_AUTHORIZED: &str = "connection authorized";
const AUTH_FAILED: &str = "connection failed";
const AUTH_DISCONNECT: &str = "disconnection";

/// Parse one line of Postgres log output. Returns `None` (SKIP, not an
/// error) for lines that match neither the AUDIT record shape, the
/// auth-event substrings, nor a JSON audit record.
pub fn parse_postgres_line(line: &str, opts: ParseOptions) -> Option<Event> {
    let lower = line.to_ascii_lowercase();
    if lower.contains(AUTH_AUTHORIZED) || lower.contains(AUTH_FAILED) || lower.contains(AUTH_DISCONNECT) {
        return Some(parse_auth_line(line, &lower));
    }

    if let Some(caps) = AUDIT_LINE.captures(line) {
        return Some(parse_audit_record(&caps["ts"], &caps["csv"], opts));
    }

    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            if let Some(event) = parse_json_record(&value, opts) {
                return Some(event);
            }
        }
    }

    None
}

fn parse_auth_line(line: &str, lower: &str) -> Event {
    let mut event = Event::new(Uuid::new_v4().to_string());
    event.db_system = Some(DbSystem::Postgres);
    event.query_type = Some(
        if lower.contains(AUTH_AUTHORIZED) {
            "LOGIN_SUCCESS"
        } else if lower.contains(AUTH_FAILED) {
            "LOGIN_FAILURE"
        } else {
            "LOGOUT"
        }
        .to_string(),
    );

    if let Some(user) = extract_kv(line, "user") {
        event.set_extra_str("user", user);
    }
    if let Some(db) = extract_kv(line, "database") {
        event.set_extra_str("db", db);
    }

    event
}

/// Best-effort `key=value` extraction tolerant of surrounding quotes and
/// trailing punctuation, as Postgres log lines format them
/// (`user=bob database=app`, `user=[bob]`, …).
fn extract_kv(line: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=");
    let idx = line.find(&needle)?;
    let rest = &line[idx + needle.len()..];
    let token = rest.split_whitespace().next()?;
    Some(
        token
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '[' || c == ']' || c == ',')
            .to_string(),
    )
}

fn parse_audit_record(ts: &str, csv_part: &str, opts: ParseOptions) -> Event {
    let fields = parse_csv_fields(csv_part);

    let audit_class = fields.first().cloned().unwrap_or_default();
    let session_id = fields.get(1).cloned().unwrap_or_default();
    let command_id = fields.get(2).cloned().unwrap_or_default();
    let action = fields.get(3).cloned().unwrap_or_default();
    let statement_type = fields.get(4).cloned().unwrap_or_default();
    let object_type = fields.get(5).cloned();
    let object_name = fields.get(6).cloned();

    let query = pick_query_candidate(csv_part, fields.get(7).map(|s| s.as_str()));

    let detected_type = if query.trim().is_empty() {
        normalize_stmt_type(&statement_type)
    } else {
        detect_query_type(&query)
    };

    let normalized_stmt = normalize_stmt_type(&statement_type);
    if !query.trim().is_empty() && normalized_stmt != detected_type {
        warn!(
            statement_type,
            detected = %detected_type,
            "pgAudit statement_type disagrees with detected query type; keeping detected type"
        );
    }

    let mut event = Event::new(Uuid::new_v4().to_string());
    event.db_system = Some(DbSystem::Postgres);
    event.timestamp = normalize_timestamp_tolerant(ts);
    event.query_type = Some(detected_type);
    if opts.include_raw_query && !query.trim().is_empty() {
        event.raw_query = Some(query.clone());
    }

    event.set_extra_str("audit_class", audit_class);
    event.set_extra_str("session_id", session_id);
    event.set_extra_str("command_id", command_id);
    event.set_extra_str("action", action);
    event.set_extra_str("statement_type", statement_type);
    if let Some(object_type) = object_type {
        event.set_extra_str("object_type", object_type);
    }
    if let Some(object_name) = object_name {
        event.set_extra_str("object_name", object_name);
    }

    event
}

/// Pick the most likely SQL text among the quoted groups found in
/// `csv_part`, scanning from last to first, or fall back to the plain
/// 8th CSV field.
fn pick_query_candidate(csv_part: &str, fallback_field: Option<&str>) -> String {
    let candidates: Vec<&str> = QUOTED_GROUP
        .captures_iter(csv_part)
        .map(|c| c.get(1).map(|m| m.as_str()).unwrap_or(""))
        .collect();

    for candidate in candidates.iter().rev() {
        if looks_like_sql(candidate) {
            return candidate.to_string();
        }
    }

    fallback_field.unwrap_or("").trim().to_string()
}

/// Split a pgAudit CSV fragment on top-level commas, honoring
/// double-quoted fields (with `""` as an escaped quote) only where a
/// field actually begins with one — pgAudit only quotes fields that need
/// it, so unquoted fields are split on the first unquoted comma.
fn parse_csv_fields(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = s.chars().peekable();
    let mut current = String::new();

    while let Some(&c) = chars.peek() {
        if c == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => {
                        if chars.peek() == Some(&'"') {
                            current.push('"');
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    Some(other) => current.push(other),
                    None => break,
                }
            }
        } else if c == ',' {
            chars.next();
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
            chars.next();
        }
    }
    fields.push(current);

    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

fn parse_json_record(value: &Value, opts: ParseOptions) -> Option<Event> {
    const QUERY_KEYS: &[&str] = &["query", "statement", "sql", "statement_text", "query_text"];

    let query = QUERY_KEYS
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))?;

    let mut event = Event::new(Uuid::new_v4().to_string());
    event.db_system = Some(DbSystem::Postgres);
    event.query_type = Some(detect_query_type(query));
    if opts.include_raw_query {
        event.raw_query = Some(query.to_string());
    }
    if let Some(ts) = value.get("timestamp").and_then(|v| v.as_str()) {
        event.timestamp = normalize_timestamp_tolerant(ts);
    }

    Some(event)
}
