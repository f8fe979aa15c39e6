//! Unified fatal-error type for the auditchain pipeline.
//!
//! Only a narrow set of conditions are fatal — everything else (decode
//! failures, unresolved columns, tamper) is recoverable and becomes an
//! ERROR event or a verification-report entry instead of an
//! `AuditError`.

use thiserror::Error;

/// The unified error type for fatal, stage-aborting failures.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The input or output stream could not be opened, read, or written.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The schema CSV is missing its required header or is otherwise
    /// structurally malformed.
    #[error("malformed schema CSV: {reason}")]
    SchemaCsv { reason: String },

    /// The sensitivity dictionary failed validation at load time.
    #[error("dictionary validation failed: {reason}")]
    DictionaryValidation { reason: String },

    /// The risk policy failed validation at load time (unknown level, or a
    /// base category not present in the dictionary).
    #[error("risk policy validation failed: {reason}")]
    RiskPolicyValidation { reason: String },

    /// A PEM-encoded key could not be parsed.
    #[error("key parse error: {reason}")]
    KeyParse { reason: String },

    /// A key used a curve other than NIST P-256.
    #[error("unsupported curve: only NIST P-256 is supported")]
    UnsupportedCurve,

    /// A required configuration value was missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A checkpoint file could not be decoded as JSON matching the expected
    /// schema.
    #[error("checkpoint decode error: {reason}")]
    CheckpointDecode { reason: String },
}

/// Convenience alias used throughout the auditchain crates.
pub type AuditResult<T> = Result<T, AuditError>;
