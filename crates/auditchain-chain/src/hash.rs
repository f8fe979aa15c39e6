//! The hash-chain engine: streaming hash computation and verification.
//!
//! Explicit, side-effect-free hash computation plus a verification pass
//! that walks the same recomputation, threaded through an explicit
//! `ChainState` rather than an in-memory `Vec`, since this pipeline
//! streams NDJSON files far larger than fit comfortably in memory, and
//! must resume across files.

use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use auditchain_canon::canonicalize_value;
use auditchain_contracts::{AuditError, AuditResult, ChainState, Event};

/// Domain-separation byte between the previous head and the event's
/// canonical bytes: without it, `sha256(a || b)` computed over a
/// concatenation boundary could collide with a different split of the
/// same total bytes.
const SEPARATOR: &[u8] = b"|";

/// Counters accumulated while hashing or verifying a stream.
#[derive(Debug, Clone, Default)]
pub struct HashCounters {
    pub input_events: u64,
    pub error_events: u64,
}

/// The outcome of a verification pass.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// `hash_chain_index` values that failed verification, in the order
    /// encountered.
    pub tampered_indices: Vec<u64>,
    /// The running head after the last event processed.
    pub head_hash: String,
    pub last_chain_index: u64,
    pub events_checked: u64,
}

impl VerifyReport {
    /// The run's overall verify status: fail iff any event was tampered.
    pub fn is_ok(&self) -> bool {
        self.tampered_indices.is_empty()
    }
}

/// Compute the next chain head from the previous head and an event's
/// canonical bytes: `HEX(SHA256(prev_head || "|" || canon))`.
pub fn next_head(prev_head: &str, canon: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_head.as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(canon);
    hex::encode(hasher.finalize())
}

fn nanos_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Stream-hash every line of `reader`, writing augmented events to `writer`
/// and threading `state` forward. Returns counters for the run-log.
///
/// A line that fails to decode as an `Event` is not a fatal error: it is
/// replaced by an ERROR event which is itself canonicalized, hashed, and
/// chained — so tampering with error events is just as detectable as
/// tampering with well-formed ones.
pub fn hash_stream<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    state: &mut ChainState,
) -> AuditResult<HashCounters> {
    let mut counters = HashCounters::default();

    for line in reader.lines() {
        let line = line.map_err(|e| AuditError::Io {
            path: "<hash input>".to_string(),
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
                warn!(error = %err, "failed to decode event for hashing; emitting ERROR event");
                Event::error_event(nanos_now(), "hash", err.to_string(), trimmed)
            }
        };

        let canon = auditchain_canon::canonicalize(&event);
        let new_head = next_head(&state.last_head_hash, &canon);
        let index = state.last_chain_index + 1;

        let mut augmented = event;
        augmented.hash_prev = Some(state.last_head_hash.clone());
        augmented.hash = Some(new_head.clone());
        augmented.hash_chain_index = Some(index);

        let line_out = serde_json::to_string(&augmented).expect("augmented event must serialize");
        writeln!(writer, "{line_out}").map_err(|e| AuditError::Io {
            path: "<hash output>".to_string(),
            source: e,
        })?;

        state.last_chain_index = index;
        state.last_head_hash = new_head;
    }

    debug!(
        events = counters.input_events,
        errors = counters.error_events,
        last_index = state.last_chain_index,
        "hash stage complete"
    );

    Ok(counters)
}

/// Re-derive `canon` bytes for an already-hashed event by stripping and
/// recomputing over the same `Value`, without requiring the caller to have
/// deserialized into the full `Event` struct (verification must tolerate
/// events whose shape is otherwise malformed).
fn canon_for_verify(value: &Value) -> Vec<u8> {
    canonicalize_value(value)
}

/// Stream-verify every line of `reader` against `state`, optionally
/// passing each line through to `writer` unchanged. Returns a report
/// listing every tampered `hash_chain_index`.
///
/// A mismatch at event k invalidates k but does not stop processing —
/// the stored hash of k (or, if unavailable, the recomputed hash)
/// becomes the running head for k+1, so exactly the tampered events are
/// reported rather than a cascade of false positives.
pub fn verify_stream<R: BufRead, W: Write>(
    reader: R,
    mut writer: Option<W>,
    state: &mut ChainState,
) -> AuditResult<VerifyReport> {
    let mut report = VerifyReport {
        head_hash: state.last_head_hash.clone(),
        last_chain_index: state.last_chain_index,
        ..Default::default()
    };
    let mut running_head = state.last_head_hash.clone();
    let mut sequential_index = state.last_chain_index;

    for line in reader.lines() {
        let line = line.map_err(|e| AuditError::Io {
            path: "<verify input>".to_string(),
            source: e,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        report.events_checked += 1;
        sequential_index += 1;

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "line did not decode as JSON during verify; treating as tampered");
                report.tampered_indices.push(sequential_index);
                if let Some(w) = writer.as_mut() {
                    writeln!(w, "{trimmed}").map_err(|e| AuditError::Io {
                        path: "<verify output>".to_string(),
                        source: e,
                    })?;
                }
                continue;
            }
        };

        let stored_prev = value.get("hash_prev").and_then(|v| v.as_str());
        let stored_hash = value.get("hash").and_then(|v| v.as_str());
        let stored_index = value.get("hash_chain_index").and_then(|v| v.as_u64());

        let canon = canon_for_verify(&value);
        let recomputed = next_head(&running_head, &canon);

        let index_for_report = stored_index.unwrap_or(sequential_index);

        let tampered = match (stored_prev, stored_hash, stored_index) {
            (Some(prev), Some(hash), Some(_)) => prev != running_head || hash != recomputed,
            _ => true, // missing hash_chain_index (or prev/hash) is tampered
        };

        if tampered {
            warn!(index = index_for_report, "hash verification mismatch");
            report.tampered_indices.push(index_for_report);
        }

        // Advance the running head to the stored hash when present so a
        // single tampered event doesn't cascade into false positives for
        // every subsequent, untouched event.
        running_head = stored_hash.map(|s| s.to_string()).unwrap_or(recomputed);
        sequential_index = stored_index.unwrap_or(sequential_index);

        if let Some(w) = writer.as_mut() {
            writeln!(w, "{trimmed}").map_err(|e| AuditError::Io {
                path: "<verify output>".to_string(),
                source: e,
            })?;
        }
    }

    report.head_hash = running_head.clone();
    report.last_chain_index = sequential_index;
    state.last_head_hash = running_head;
    state.last_chain_index = sequential_index;

    Ok(report)
}
