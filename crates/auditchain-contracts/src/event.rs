//! The open-schema event envelope exchanged between every pipeline stage.
//!
//! Events flow as one compact JSON object per line (NDJSON). Every stage in
//! the pipeline — parser, enricher, hasher, verifier — reads and rewrites
//! the same `Event` type; fields a given stage doesn't know about round-trip
//! through `extra` untouched.

use serde::{Deserialize, Serialize};

/// Which database system produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbSystem {
    Postgres,
    Mysql,
}

/// The risk lattice: `Low < Medium < High < Critical`.
///
/// Serializes to lowercase strings (`"low"`, `"medium"`, …) to match the
/// wire format used by risk-policy documents and enriched events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn rank(self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
            RiskLevel::Critical => 3,
        }
    }

    /// Parse a level from its lowercase wire representation.
    ///
    /// Case-sensitive: only exact lowercase tokens match.
    pub fn from_str_strict(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RiskLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// The `{phase, message}` sub-object carried by every ERROR event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Which stage produced the error (`"parse"`, `"enrich"`, `"hash"`, `"verify"`).
    pub phase: String,
    /// Human-readable description of what went wrong.
    pub message: String,
}

/// A single pipeline event.
///
/// Known, commonly-used fields are typed; anything a stage doesn't
/// recognize is preserved losslessly in `extra` via `#[serde(flatten)]`, so
/// no stage needs to know the full field set produced by every other stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_system: Option<DbSystem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_query: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_table_read: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_prev: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_chain_index: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// System-specific fields not promoted to a named field: `audit_class`,
    /// `session_id`, `command_id`, `connection_id`, `status`, `action`,
    /// `statement_type`, `object_type`, `object_name`, `user`, `host`, `ip`,
    /// `db`, `categories`, and anything future parsers add.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    /// Build a bare event with only `event_id` set — the minimal valid event
    /// per invariant I1 (non-empty, unique `event_id`).
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: None,
            db_system: None,
            query_type: None,
            raw_query: None,
            sensitivity: None,
            risk_level: None,
            bulk: None,
            bulk_type: None,
            full_table_read: None,
            hash_prev: None,
            hash: None,
            hash_chain_index: None,
            error: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Build the sentinel ERROR event used so no input line is ever
    /// silently dropped: `event_id = "error-<nanos>"`, `query_type =
    /// "ERROR"`, `raw_query` set to the offending line, and a populated
    /// `error` sub-object.
    pub fn error_event(nanos: u128, phase: &str, message: impl Into<String>, raw_line: &str) -> Self {
        let mut event = Self::new(format!("error-{nanos}"));
        event.query_type = Some("ERROR".to_string());
        event.raw_query = Some(raw_line.to_string());
        event.error = Some(ErrorInfo {
            phase: phase.to_string(),
            message: message.into(),
        });
        event
    }

    /// Get a named `extra` field as a string, if present and a JSON string.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Set a string-valued `extra` field, replacing any previous value.
    pub fn set_extra_str(&mut self, key: &str, value: impl Into<String>) {
        self.extra
            .insert(key.to_string(), serde_json::Value::String(value.into()));
    }
}
