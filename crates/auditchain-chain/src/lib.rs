//! # auditchain-chain
//!
//! The hash-chain and checkpoint stage of the pipeline: streaming
//! SHA-256 chaining over NDJSON events, tamper localization on verify,
//! and ECDSA-P256-signed checkpoints that bind a chain head to a point
//! in time.

pub mod checkpoint;
pub mod hash;
pub mod state;

pub use checkpoint::{verify_checkpoint, write_checkpoint};
pub use hash::{hash_stream, next_head, verify_stream, HashCounters, VerifyReport};
pub use state::{load_state, save_state};
