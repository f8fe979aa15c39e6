//! Persisted chain-resumption state and checkpoint document types.
//!
//! These are pure data definitions; the hashing, signing, and verification
//! logic that produces and consumes them lives in `auditchain-chain`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The sentinel previous-head hash used before any event has been hashed:
/// 64 ASCII '0' characters, matching a SHA-256 hex digest's length.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Rolling hash-chain state, persisted between runs so a new file can
/// continue a chain started by a previous invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub last_chain_index: u64,
    pub last_head_hash: String,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            last_chain_index: 0,
            last_head_hash: GENESIS_HASH.to_string(),
        }
    }
}

/// A snapshot of the chain head at a point in time, before signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub chain_index: u64,
    pub head_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A `Checkpoint` plus its ECDSA-P256 signature, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCheckpoint {
    pub checkpoint: Checkpoint,
    /// Base64-encoded ASN.1 DER ECDSA-P256 signature.
    pub signature: String,
}
