//! # auditchain-pipeline
//!
//! The pipeline driver: line-oriented reading, cancellation checks,
//! counters, and run-log appends shared by the
//! `parse` and `enrich` stage runners. The hash/verify stage driver lives
//! in `auditchain-chain` directly since `hash_stream`/`verify_stream` are
//! already the whole of that stage's loop; this crate covers the two
//! stages that need an outer loop wrapped around a per-line function.

pub mod cancel;
pub mod enrich_stage;
pub mod parse_stage;
pub mod runlog;

pub use cancel::CancellationToken;
pub use enrich_stage::{run_enrich_stream, EnrichStreamCounters};
pub use parse_stage::{run_parse_stream, ParseStreamCounters};
pub use runlog::{append_run_log, RunLogEntry};
