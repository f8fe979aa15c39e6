//! # auditchain-schema
//!
//! The schema index: a flat `db, schema, table, column, type` table
//! loaded from CSV, folded into canonical types, and exposed through a
//! handful of lookup helpers the enricher and column resolver depend on.
//!
//! The index is built once at stage start and never mutated afterwards.

use std::collections::BTreeMap;
use std::io::Read;

use tracing::warn;

use auditchain_contracts::{AuditError, AuditResult};

/// `schema -> table -> column -> normalized type`.
///
/// `BTreeMap` at every level, not `HashMap`: `find_table_any_schema`'s
/// "first match" is only deterministic under a fixed iteration order, and
/// this index picks alphabetical-by-schema-name (see DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    schemas: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

impl SchemaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive required header.
    const HEADER: [&'static str; 5] = ["db_name", "schema_name", "table_name", "column_name", "column_type"];

    /// Load a schema index from a CSV reader with the required header row
    /// `db_name,schema_name,table_name,column_name,column_type` followed
    /// by `db, schema, table, column, type` data rows.
    ///
    /// Uses flexible-width records: a `type` cell containing unescaped
    /// commas (e.g. an inline `ENUM('a','b','c')` definition) produces
    /// extra CSV fields, which are rejoined with `,` before normalization
    /// rather than rejected as malformed.
    pub fn from_csv_reader<R: Read>(reader: R) -> AuditResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records();

        let header = records
            .next()
            .ok_or_else(|| AuditError::SchemaCsv {
                reason: "schema CSV is empty; expected a header row".to_string(),
            })?
            .map_err(|e| AuditError::SchemaCsv {
                reason: format!("row 1: {e}"),
            })?;
        if header.iter().collect::<Vec<_>>() != Self::HEADER.to_vec() {
            return Err(AuditError::SchemaCsv {
                reason: format!(
                    "expected header '{}', found '{}'",
                    Self::HEADER.join(","),
                    header.iter().collect::<Vec<_>>().join(",")
                ),
            });
        }

        let mut index = SchemaIndex::new();

        for (line_no, record) in records.enumerate() {
            let record = record.map_err(|e| AuditError::SchemaCsv {
                reason: format!("row {}: {e}", line_no + 2),
            })?;

            if record.len() < 5 {
                warn!(row = line_no + 2, "schema row has fewer than 5 fields; skipping");
                continue;
            }

            let db = record.get(0).unwrap_or("").trim();
            let schema = record.get(1).unwrap_or("").trim();
            let table = record.get(2).unwrap_or("").trim();
            let column = record.get(3).unwrap_or("").trim();
            let raw_type = record.iter().skip(4).collect::<Vec<_>>().join(",");
            let raw_type = raw_type.trim();

            if db.is_empty() || schema.is_empty() || table.is_empty() || column.is_empty() || raw_type.is_empty() {
                warn!(row = line_no + 2, "schema row has a blank cell; skipping");
                continue;
            }

            let normalized = normalize_type(raw_type);
            index
                .schemas
                .entry(schema.to_string())
                .or_default()
                .entry(table.to_string())
                .or_default()
                .insert(column.to_string(), normalized);
        }

        Ok(index)
    }

    pub fn get_type(&self, schema: &str, table: &str, column: &str) -> Option<&str> {
        self.schemas
            .get(schema)?
            .get(table)?
            .get(column)
            .map(|s| s.as_str())
    }

    pub fn has_column(&self, schema: &str, table: &str, column: &str) -> bool {
        self.get_type(schema, table, column).is_some()
    }

    pub fn list_columns(&self, schema: &str, table: &str) -> Option<Vec<&str>> {
        let columns = self.schemas.get(schema)?.get(table)?;
        Some(columns.keys().map(|s| s.as_str()).collect())
    }

    /// Scan every schema, in ascending alphabetical order by schema name,
    /// returning the first `table` found and its columns. Returns `None`
    /// if no schema defines that table.
    pub fn find_table_any_schema(&self, table: &str) -> Option<(&str, &BTreeMap<String, String>)> {
        for (schema_name, tables) in &self.schemas {
            if let Some(columns) = tables.get(table) {
                return Some((schema_name.as_str(), columns));
            }
        }
        None
    }
}

/// Fold a raw type string to the canonical set: uppercase, strip a
/// parenthesized size/precision suffix, then fold vendor aliases.
pub fn normalize_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let without_suffix = match upper.find('(') {
        Some(idx) => upper[..idx].trim(),
        None => upper.trim(),
    };
    let folded = without_suffix.replace(['_', '-'], " ");
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    match collapsed.as_str() {
        "CHARACTER VARYING" => "VARCHAR".to_string(),
        "CHARACTER" => "CHAR".to_string(),
        "TIMESTAMP WITH TIME ZONE" => "TIMESTAMPTZ".to_string(),
        "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP".to_string(),
        "DOUBLE PRECISION" => "DOUBLE".to_string(),
        "INTEGER" => "INT".to_string(),
        "USER DEFINED" => "TEXT".to_string(),
        "ENUM" => "VARCHAR".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_ROW: &str = "db_name,schema_name,table_name,column_name,column_type";

    fn csv_row(db: &str, schema: &str, table: &str, column: &str, ty: &str) -> String {
        format!("{db},{schema},{table},{column},{ty}")
    }

    fn with_header(rows: &[String]) -> String {
        std::iter::once(HEADER_ROW.to_string())
            .chain(rows.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── Type normalization ────────────────────────────────────────────────────

    #[test]
    fn strips_size_specifier() {
        assert_eq!(normalize_type("varchar(255)"), "VARCHAR");
        assert_eq!(normalize_type("decimal(10,2)"), "DECIMAL");
    }

    #[test]
    fn folds_vendor_aliases() {
        assert_eq!(normalize_type("character varying(50)"), "VARCHAR");
        assert_eq!(normalize_type("character"), "CHAR");
        assert_eq!(normalize_type("timestamp with time zone"), "TIMESTAMPTZ");
        assert_eq!(normalize_type("timestamp without time zone"), "TIMESTAMP");
        assert_eq!(normalize_type("double precision"), "DOUBLE");
        assert_eq!(normalize_type("integer"), "INT");
        assert_eq!(normalize_type("USER-DEFINED"), "TEXT");
        assert_eq!(normalize_type("enum('a','b')"), "VARCHAR");
    }

    #[test]
    fn unrecognized_types_pass_through_uppercased() {
        assert_eq!(normalize_type("uuid"), "UUID");
        assert_eq!(normalize_type("bigint"), "BIGINT");
    }

    // ── CSV loading ───────────────────────────────────────────────────────────

    #[test]
    fn loads_basic_rows() {
        let csv = with_header(&[
            csv_row("app", "public", "users", "id", "uuid"),
            csv_row("app", "public", "users", "ssn", "varchar(11)"),
        ]);
        let index = SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(index.get_type("public", "users", "id"), Some("UUID"));
        assert_eq!(index.get_type("public", "users", "ssn"), Some("VARCHAR"));
    }

    #[test]
    fn rows_with_blank_cells_are_skipped() {
        let csv = with_header(&[
            csv_row("app", "public", "users", "id", "uuid"),
            csv_row("app", "", "users", "bad", "text"),
        ]);
        let index = SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(!index.has_column("", "users", "bad"));
        assert!(index.has_column("public", "users", "id"));
    }

    #[test]
    fn extra_commas_in_type_are_rejoined() {
        let csv = format!("{HEADER_ROW}\napp,public,users,role,\"enum('a','b','c')\"");
        let index = SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(index.get_type("public", "users", "role"), Some("VARCHAR"));
    }

    #[test]
    fn find_table_any_schema_prefers_alphabetically_first_schema() {
        let csv = with_header(&[
            csv_row("app", "zeta_schema", "accounts", "id", "uuid"),
            csv_row("app", "alpha_schema", "accounts", "id", "bigint"),
        ]);
        let index = SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap();
        let (schema, columns) = index.find_table_any_schema("accounts").unwrap();
        assert_eq!(schema, "alpha_schema");
        assert_eq!(columns.get("id").map(|s| s.as_str()), Some("BIGINT"));
    }

    #[test]
    fn list_columns_returns_none_for_unknown_table() {
        let index = SchemaIndex::new();
        assert!(index.list_columns("public", "ghost").is_none());
    }

    // ── Header validation ──────────────────────────────────────────────────────

    #[test]
    fn rejects_missing_header() {
        let csv = csv_row("app", "public", "users", "id", "uuid");
        let err = SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AuditError::SchemaCsv { .. }));
    }

    #[test]
    fn rejects_wrong_header() {
        let csv = format!(
            "db,schema,table,column,type\n{}",
            csv_row("app", "public", "users", "id", "uuid")
        );
        let err = SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AuditError::SchemaCsv { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        let err = SchemaIndex::from_csv_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, AuditError::SchemaCsv { .. }));
    }
}
