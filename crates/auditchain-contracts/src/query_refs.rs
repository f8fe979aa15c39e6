//! Transient output of the SQL reference extractor.

use std::collections::BTreeMap;

/// Tables and columns heuristically referenced by a single SQL statement.
///
/// `tables` maps every alias-or-bare-name seen in the statement to the
/// actual table name; a table referenced without an alias gets an
/// `actual -> actual` entry so lookups never need to special-case the
/// alias-less case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRefs {
    pub tables: BTreeMap<String, String>,
    pub columns: Vec<String>,
    pub is_bulk: bool,
    pub bulk_type: Option<String>,
    /// `SELECT * ... ` with no `WHERE` clause — a full-table read.
    pub full_table_read: bool,
}

impl QueryRefs {
    pub fn new() -> Self {
        Self::default()
    }
}
