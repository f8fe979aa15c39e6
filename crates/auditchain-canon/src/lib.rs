//! # auditchain-canon
//!
//! Deterministic byte serialization of an [`Event`] for hashing.
//!
//! The algorithm is:
//!
//! 1. Deep-copy the event, omitting `hash`, `hash_prev`, `hash_chain_index`.
//! 2. Recursively rewrite any string that parses as RFC3339 to its UTC
//!    RFC3339 rendering.
//! 3. Encode as compact JSON with object keys in ascending byte-wise order;
//!    arrays keep input order.
//!
//! The implementation operates on `serde_json::Value`, not the `Event`
//! struct directly, so it stays generic over "JSON-like values" per the
//! design notes — a future event variant needs no canonicalizer change.

use chrono::{DateTime, Utc};
use serde_json::Value;

use auditchain_contracts::Event;

const STRIPPED_KEYS: &[&str] = &["hash", "hash_prev", "hash_chain_index"];

/// Produce the canonical byte representation of `event` used as hash input.
///
/// Never mutates `event` — it is serialized to an owned `Value` first.
pub fn canonicalize(event: &Event) -> Vec<u8> {
    let value = serde_json::to_value(event).expect("Event must always serialize to JSON");
    canonicalize_value(&value)
}

/// Canonicalize an arbitrary JSON value using the same algorithm as
/// [`canonicalize`]. Exposed so the hash-chain engine can canonicalize
/// events it only holds as `Value` (e.g. while decoding a malformed line).
pub fn canonicalize_value(value: &Value) -> Vec<u8> {
    let stripped = strip_hash_fields(value);
    let normalized = normalize_timestamps(&stripped);
    let mut out = String::new();
    write_canonical(&normalized, &mut out);
    out.into_bytes()
}

/// Recursively remove `hash`, `hash_prev`, and `hash_chain_index` keys from
/// every object in the tree.
fn strip_hash_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if STRIPPED_KEYS.contains(&k.as_str()) {
                    continue;
                }
                out.insert(k.clone(), strip_hash_fields(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_hash_fields).collect()),
        other => other.clone(),
    }
}

/// Recursively rewrite any string value that parses as RFC3339 to its UTC
/// RFC3339 rendering, so two timestamps differing only in offset or
/// sub-second precision canonicalize identically.
fn normalize_timestamps(value: &Value) -> Value {
    match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Value::String(to_utc_rfc3339(&dt.with_timezone(&Utc))),
            Err(_) => Value::String(s.clone()),
        },
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize_timestamps(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_timestamps).collect()),
        other => other.clone(),
    }
}

/// Render a UTC timestamp as RFC3339 with a literal `Z` suffix rather than
/// `+00:00`, so semantically-identical offsets always canonicalize to the
/// same bytes (see DESIGN.md's resolution of this detail).
fn to_utc_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

/// Write `value` as compact JSON with object keys sorted ascending by byte
/// value. Arrays preserve their input order. Numbers, booleans, and null
/// round-trip unchanged; strings are escaped via `serde_json`'s own string
/// encoder so escaping rules match the rest of the pipeline exactly.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => {
            // Scalars (string/number/bool/null) serialize identically
            // regardless of key order, so serde_json's own compact encoder
            // is both correct and exactly what the rest of the pipeline uses.
            out.push_str(&serde_json::to_string(other).expect("scalar JSON value must serialize"));
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push_str(&serde_json::to_string(s).expect("string must serialize to JSON"));
}
