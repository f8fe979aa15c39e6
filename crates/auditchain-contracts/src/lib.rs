//! # auditchain-contracts
//!
//! Shared types for the auditchain pipeline: the `Event` envelope, chain and
//! checkpoint document shapes, the SQL-reference-extractor output type, and
//! the unified `AuditError`.
//!
//! No business logic lives in this crate — every other crate in the
//! workspace depends on it, never the reverse.

pub mod chain;
pub mod error;
pub mod event;
pub mod query_refs;

pub use chain::{ChainState, Checkpoint, SignedCheckpoint, GENESIS_HASH};
pub use error::{AuditError, AuditResult};
pub use event::{DbSystem, ErrorInfo, Event, RiskLevel};
pub use query_refs::QueryRefs;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_lattice_order() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn risk_level_strict_parse_is_case_sensitive() {
        assert_eq!(RiskLevel::from_str_strict("low"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_str_strict("Low"), None);
        assert_eq!(RiskLevel::from_str_strict("LOW"), None);
        assert_eq!(RiskLevel::from_str_strict("bogus"), None);
    }

    #[test]
    fn genesis_hash_is_64_zero_chars() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn chain_state_default_matches_genesis() {
        let state = ChainState::default();
        assert_eq!(state.last_chain_index, 0);
        assert_eq!(state.last_head_hash, GENESIS_HASH);
    }

    #[test]
    fn error_event_has_required_shape() {
        let event = Event::error_event(12345, "parse", "bad json", "{not json");
        assert_eq!(event.event_id, "error-12345");
        assert_eq!(event.query_type.as_deref(), Some("ERROR"));
        assert_eq!(event.raw_query.as_deref(), Some("{not json"));
        let err = event.error.expect("error sub-object must be set");
        assert_eq!(err.phase, "parse");
        assert_eq!(err.message, "bad json");
    }

    #[test]
    fn event_round_trips_unknown_fields_through_extra() {
        let json = r#"{"event_id":"e1","session_id":"s-42","custom_future_field":7}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.extra_str("session_id"), Some("s-42"));
        assert_eq!(
            event.extra.get("custom_future_field").and_then(|v| v.as_i64()),
            Some(7)
        );

        let back = serde_json::to_string(&event).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed["session_id"], "s-42");
        assert_eq!(reparsed["custom_future_field"], 7);
    }
}
