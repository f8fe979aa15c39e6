//! # auditchain-extract
//!
//! The SQL reference extractor and column resolver: a deliberately
//! heuristic, regex-driven pass over raw statement text, not a SQL
//! parser.

mod extract;
mod keywords;
mod resolve;

pub use extract::extract_refs;
pub use resolve::resolve;
