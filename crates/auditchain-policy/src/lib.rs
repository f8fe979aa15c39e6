//! # auditchain-policy
//!
//! The sensitivity dictionary and risk policy documents that the enricher
//! classifies events against.

pub mod dictionary;
pub mod risk;

pub use dictionary::{NegativeRule, PositiveRule, SensitivityDictionary};
pub use risk::RiskPolicy;
