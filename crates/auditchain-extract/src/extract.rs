//! The heuristic SQL reference extractor.
//!
//! Deliberately not a SQL parser: every step here is a regex over the
//! comment-stripped statement text, chosen to prefer false negatives over
//! false positives — an unresolvable statement yields empty sequences,
//! never an error.

use std::sync::LazyLock;

use regex::Regex;

use auditchain_contracts::QueryRefs;

use crate::keywords::{is_reserved, looks_numeric};

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--[^\n]*").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static FROM_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFROM\s+([A-Za-z_][\w.]*)(?:\s+(?:AS\s+)?([A-Za-z_]\w*))?").unwrap()
});
static JOIN_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:INNER\s+|LEFT\s+|RIGHT\s+|FULL\s+)?JOIN\s+([A-Za-z_][\w.]*)(?:\s+(?:AS\s+)?([A-Za-z_]\w*))?").unwrap()
});
static INSERT_INTO_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bINSERT\s+INTO\s+([A-Za-z_][\w.]*)").unwrap());
static UPDATE_ALIAS_SET_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bUPDATE\s+([A-Za-z_][\w.]*)\s+([A-Za-z_]\w*)\s+SET\b").unwrap());
static UPDATE_SET_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bUPDATE\s+([A-Za-z_][\w.]*)\s+SET\b").unwrap());
static DELETE_FROM_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDELETE\s+FROM\s+([A-Za-z_][\w.]*)").unwrap());

static SELECT_COLUMNS_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bSELECT\s+(.+?)\s+FROM\b").unwrap());
static INSERT_COLUMNS_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bINSERT\s+INTO\s+[A-Za-z_][\w.]*\s*\(([^)]*)\)").unwrap());
static SET_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bSET\s+(.+?)(?:\bWHERE\b|$)").unwrap());
static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\bWHERE\b(.*)$").unwrap());
static DOTTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\.([A-Za-z_]\w*)$").unwrap());
static BARE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// Strip `/* ... */` and `-- ...` comments, then collapse whitespace.
fn strip_comments(sql: &str) -> String {
    let no_block = BLOCK_COMMENT.replace_all(sql, " ");
    let no_line = LINE_COMMENT.replace_all(&no_block, " ");
    WHITESPACE.replace_all(&no_line, " ").trim().to_string()
}

fn table_name(qualifier: &str) -> String {
    qualifier.rsplit('.').next().unwrap_or(qualifier).to_string()
}

fn register_table(refs: &mut QueryRefs, qualifier: &str, alias: Option<&str>) {
    let actual = table_name(qualifier);
    refs.tables.insert(actual.clone(), actual.clone());
    if let Some(alias) = alias {
        if !is_reserved(alias) {
            refs.tables.insert(alias.to_string(), actual);
        }
    }
}

fn detect_bulk(upper: &str) -> (bool, Option<String>, bool) {
    let trimmed_upper = upper.trim_start();

    if upper.contains("COPY") {
        let bulk_type = if upper.contains(" TO ") {
            "export"
        } else if upper.contains(" FROM ") {
            "import"
        } else {
            "copy"
        };
        return (true, Some(bulk_type.to_string()), false);
    }

    if upper.contains("LOAD DATA") {
        return (true, Some("import".to_string()), false);
    }

    if upper.contains("SELECT") && (upper.contains("INTO OUTFILE") || upper.contains("INTO DUMPFILE")) {
        return (true, Some("export".to_string()), false);
    }

    if trimmed_upper.starts_with("INSERT") {
        let multi_tuple = upper.contains("),(") || upper.contains("), (");
        let multi_values = upper.matches("VALUES").count() > 1;
        let insert_select = upper.contains("INSERT") && upper.contains("SELECT");
        if multi_tuple || multi_values || insert_select {
            return (true, Some("insert".to_string()), false);
        }
    }

    if trimmed_upper.starts_with("SELECT *") && !upper.contains("WHERE") {
        return (true, Some("select".to_string()), true);
    }

    (false, None, false)
}

fn extract_tables(stripped: &str, refs: &mut QueryRefs) {
    for caps in FROM_CLAUSE.captures_iter(stripped) {
        let qualifier = &caps[1];
        let alias = caps.get(2).map(|m| m.as_str());
        register_table(refs, qualifier, alias);
    }
    for caps in JOIN_CLAUSE.captures_iter(stripped) {
        let qualifier = &caps[1];
        let alias = caps.get(2).map(|m| m.as_str());
        register_table(refs, qualifier, alias);
    }
    for caps in INSERT_INTO_CLAUSE.captures_iter(stripped) {
        register_table(refs, &caps[1], None);
    }
    if let Some(caps) = UPDATE_ALIAS_SET_CLAUSE.captures(stripped) {
        register_table(refs, &caps[1], Some(&caps[2]));
    } else if let Some(caps) = UPDATE_SET_CLAUSE.captures(stripped) {
        register_table(refs, &caps[1], None);
    }
    for caps in DELETE_FROM_CLAUSE.captures_iter(stripped) {
        register_table(refs, &caps[1], None);
    }
}

/// Is `token` (already whitespace-trimmed) acceptable as a column
/// reference: a dotted name, or a bare identifier that is not reserved,
/// numeric, or a function call?
fn accept_column_token(token: &str) -> bool {
    if token.contains('(') || token.contains(')') {
        return false;
    }
    if DOTTED_NAME.is_match(token) {
        return true;
    }
    if BARE_NAME.is_match(token) && !is_reserved(token) && !looks_numeric(token) {
        return true;
    }
    false
}

/// Take the first whitespace-separated token of a column-list item,
/// dropping any `AS alias` suffix.
fn first_token(item: &str) -> &str {
    item.trim().split_whitespace().next().unwrap_or("")
}

fn push_column(columns: &mut Vec<String>, name: &str) {
    if !columns.iter().any(|c| c == name) {
        columns.push(name.to_string());
    }
}

fn extract_select_columns(stripped: &str, columns: &mut Vec<String>) {
    let Some(caps) = SELECT_COLUMNS_CLAUSE.captures(stripped) else {
        return;
    };
    for item in caps[1].split(',') {
        let token = first_token(item);
        if accept_column_token(token) {
            push_column(columns, token);
        }
    }
}

fn extract_insert_columns(stripped: &str, columns: &mut Vec<String>) {
    let Some(caps) = INSERT_COLUMNS_CLAUSE.captures(stripped) else {
        return;
    };
    for item in caps[1].split(',') {
        let token = item.trim();
        if accept_column_token(token) {
            push_column(columns, token);
        }
    }
}

fn extract_set_columns(stripped: &str, columns: &mut Vec<String>) {
    let Some(caps) = SET_CLAUSE.captures(stripped) else {
        return;
    };
    for item in caps[1].split(',') {
        let Some((lhs, _)) = item.split_once('=') else {
            continue;
        };
        let token = lhs.trim();
        if accept_column_token(token) {
            push_column(columns, token);
        }
    }
}

fn extract_where_columns(stripped: &str, columns: &mut Vec<String>) {
    let Some(caps) = WHERE_CLAUSE.captures(stripped) else {
        return;
    };
    for caps in DOTTED_COLUMN_IN_TEXT.captures_iter(&caps[1]) {
        let full = caps.get(0).unwrap().as_str();
        if !is_reserved(&caps[1]) && !is_reserved(&caps[2]) {
            push_column(columns, full);
        }
    }
}

static DOTTED_COLUMN_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\.([A-Za-z_]\w*)\b").unwrap());

/// Extract `QueryRefs` from a raw SQL statement.
pub fn extract_refs(sql: &str) -> QueryRefs {
    let stripped = strip_comments(sql);
    let upper = stripped.to_ascii_uppercase();

    let mut refs = QueryRefs::new();

    let (is_bulk, bulk_type, full_table_read) = detect_bulk(&upper);
    refs.is_bulk = is_bulk;
    refs.bulk_type = bulk_type;
    refs.full_table_read = full_table_read;

    extract_tables(&stripped, &mut refs);

    if upper.trim_start().starts_with("SELECT *") {
        refs.columns = vec!["*".to_string()];
        return refs;
    }

    let mut columns = Vec::new();
    extract_select_columns(&stripped, &mut columns);
    extract_insert_columns(&stripped, &mut columns);
    extract_set_columns(&stripped, &mut columns);
    extract_where_columns(&stripped, &mut columns);
    refs.columns = columns;

    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Comment stripping ──────────────────────────────────────────────────────

    #[test]
    fn strips_block_and_line_comments() {
        let sql = "SELECT id /* pii */ FROM users -- trailing\nWHERE id = 1";
        let stripped = strip_comments(sql);
        assert!(!stripped.contains("pii"));
        assert!(!stripped.contains("trailing"));
    }

    // ── Bulk detection ──────────────────────────────────────────────────────

    #[test]
    fn detects_copy_to_as_export() {
        let refs = extract_refs("COPY users TO '/tmp/out.csv'");
        assert!(refs.is_bulk);
        assert_eq!(refs.bulk_type.as_deref(), Some("export"));
    }

    #[test]
    fn detects_copy_from_as_import() {
        let refs = extract_refs("COPY users FROM '/tmp/in.csv'");
        assert!(refs.is_bulk);
        assert_eq!(refs.bulk_type.as_deref(), Some("import"));
    }

    #[test]
    fn detects_load_data_as_import() {
        let refs = extract_refs("LOAD DATA INFILE '/tmp/in.csv' INTO TABLE users");
        assert!(refs.is_bulk);
        assert_eq!(refs.bulk_type.as_deref(), Some("import"));
    }

    #[test]
    fn detects_select_into_outfile_as_export() {
        let refs = extract_refs("SELECT * FROM users INTO OUTFILE '/tmp/out.csv'");
        assert!(refs.is_bulk);
        assert_eq!(refs.bulk_type.as_deref(), Some("export"));
    }

    #[test]
    fn detects_multi_row_insert_as_bulk() {
        let refs = extract_refs("INSERT INTO users (id, name) VALUES (1,'a'),(2,'b')");
        assert!(refs.is_bulk);
        assert_eq!(refs.bulk_type.as_deref(), Some("insert"));
    }

    #[test]
    fn single_row_insert_is_not_bulk() {
        let refs = extract_refs("INSERT INTO users (id, name) VALUES (1, 'a')");
        assert!(!refs.is_bulk);
    }

    #[test]
    fn select_star_without_where_is_full_table_read() {
        let refs = extract_refs("SELECT * FROM users");
        assert!(refs.full_table_read);
        assert_eq!(refs.bulk_type.as_deref(), Some("select"));
    }

    #[test]
    fn select_star_with_where_is_not_full_table_read() {
        let refs = extract_refs("SELECT * FROM users WHERE id = 1");
        assert!(!refs.full_table_read);
    }

    // ── Table extraction ────────────────────────────────────────────────────

    #[test]
    fn extracts_table_with_alias_from_from_clause() {
        let refs = extract_refs("SELECT u.id FROM users u WHERE u.id = 1");
        assert_eq!(refs.tables.get("u").map(|s| s.as_str()), Some("users"));
        assert_eq!(refs.tables.get("users").map(|s| s.as_str()), Some("users"));
    }

    #[test]
    fn rejects_reserved_word_as_alias() {
        let refs = extract_refs("SELECT id FROM users WHERE id = 1");
        assert!(!refs.tables.contains_key("WHERE"));
        assert_eq!(refs.tables.get("users").map(|s| s.as_str()), Some("users"));
    }

    #[test]
    fn qualified_table_reduces_to_last_segment() {
        let refs = extract_refs("SELECT * FROM app.public.users");
        assert_eq!(refs.tables.get("users").map(|s| s.as_str()), Some("users"));
    }

    #[test]
    fn extracts_join_table_with_alias() {
        let refs = extract_refs("SELECT a.id FROM accounts a LEFT JOIN users u ON a.user_id = u.id");
        assert_eq!(refs.tables.get("u").map(|s| s.as_str()), Some("users"));
    }

    #[test]
    fn extracts_insert_into_table() {
        let refs = extract_refs("INSERT INTO users (id, name) VALUES (1, 'a')");
        assert_eq!(refs.tables.get("users").map(|s| s.as_str()), Some("users"));
    }

    #[test]
    fn extracts_update_table_with_alias() {
        let refs = extract_refs("UPDATE users u SET u.name = 'x' WHERE u.id = 1");
        assert_eq!(refs.tables.get("u").map(|s| s.as_str()), Some("users"));
    }

    #[test]
    fn extracts_delete_from_table() {
        let refs = extract_refs("DELETE FROM users WHERE id = 1");
        assert_eq!(refs.tables.get("users").map(|s| s.as_str()), Some("users"));
    }

    // ── Column extraction ───────────────────────────────────────────────────

    #[test]
    fn select_star_yields_wildcard_column() {
        let refs = extract_refs("SELECT * FROM users");
        assert_eq!(refs.columns, vec!["*".to_string()]);
    }

    #[test]
    fn select_list_drops_alias_and_function_calls() {
        let refs = extract_refs("SELECT id, COUNT(*), name AS full_name FROM users");
        assert!(refs.columns.contains(&"id".to_string()));
        assert!(refs.columns.contains(&"name".to_string()));
        assert!(!refs.columns.iter().any(|c| c.contains('(')));
    }

    #[test]
    fn insert_column_list_is_parsed() {
        let refs = extract_refs("INSERT INTO users (id, email) VALUES (1, 'x@y.com')");
        assert!(refs.columns.contains(&"id".to_string()));
        assert!(refs.columns.contains(&"email".to_string()));
    }

    #[test]
    fn update_set_clause_extracts_target_columns() {
        let refs = extract_refs("UPDATE users SET name = 'x', email = 'y' WHERE id = 1");
        assert!(refs.columns.contains(&"name".to_string()));
        assert!(refs.columns.contains(&"email".to_string()));
    }

    #[test]
    fn where_clause_extracts_only_dotted_columns() {
        let refs = extract_refs("SELECT name FROM users u WHERE u.ssn = '123' AND active = true");
        assert!(refs.columns.contains(&"u.ssn".to_string()));
        assert!(!refs.columns.contains(&"active".to_string()));
    }

    #[test]
    fn unresolvable_statement_yields_empty_refs() {
        let refs = extract_refs("BEGIN");
        assert!(refs.columns.is_empty());
        assert!(refs.tables.is_empty());
    }
}
