//! `detect_query_type`: the canonical-token classifier shared by both
//! the Postgres and MySQL parsers.

const STARTER_TOKENS: &[&str] = &[
    "SELECT", "INSERT", "REPLACE", "UPDATE", "DELETE", "TRUNCATE", "MERGE", "CREATE", "ALTER",
    "DROP", "GRANT", "REVOKE", "COPY", "SET", "SHOW", "ANALYZE", "VACUUM", "COMMENT", "CALL",
    "EXEC", "EXECUTE", "DO", "PREPARE", "DEALLOCATE", "BEGIN", "COMMIT", "ROLLBACK", "SAVEPOINT",
    "START",
];

/// Strip leading `/* ... */` and `-- ...` comments. Returns `None` for an
/// unterminated block comment: an unterminated block comment or
/// all-comment line yields ANON.
fn strip_leading_comments(sql: &str) -> Option<String> {
    let mut rest = sql.trim_start().to_string();
    loop {
        if let Some(after_open) = rest.strip_prefix("/*") {
            match after_open.find("*/") {
                Some(idx) => rest = after_open[idx + 2..].trim_start().to_string(),
                None => return None,
            }
        } else if rest.starts_with("--") {
            match rest.find('\n') {
                Some(idx) => rest = rest[idx + 1..].trim_start().to_string(),
                None => return Some(String::new()),
            }
        } else {
            break;
        }
    }
    Some(rest)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Privilege-escalation refinement. Checked before the plain token so
/// matched statements never also emit their base token.
fn detect_escalation(upper: &str) -> Option<&'static str> {
    let trimmed = upper.trim_start();

    if trimmed.starts_with("GRANT") {
        if contains_any(upper, &["GRANT ROLE", "WITH ADMIN OPTION", "WITH GRANT OPTION"])
            || (upper.contains("GRANT") && upper.contains("ALL PRIVILEGES"))
        {
            return Some("GRANT_ESCALATION");
        }
    }
    if trimmed.starts_with("REVOKE") && upper.contains("REVOKE ROLE") && upper.contains("FROM") {
        return Some("REVOKE_ESCALATION");
    }
    if trimmed.starts_with("ALTER ROLE")
        && contains_any(upper, &["WITH SUPER", "WITH CREATEDB", "WITH CREATEROLE"])
    {
        return Some("ALTER_ROLE_ESCALATION");
    }
    if trimmed.starts_with("ALTER USER")
        && contains_any(upper, &["WITH SUPER", "WITH ALL PRIVILEGES", "WITH GRANT OPTION"])
    {
        return Some("ALTER_USER_ESCALATION");
    }
    if trimmed.starts_with("CREATE USER")
        && contains_any(upper, &["WITH SUPER", "WITH ALL PRIVILEGES", "WITH GRANT OPTION"])
    {
        return Some("CREATE_USER_ESCALATION");
    }
    None
}

fn detect_base_token(upper: &str) -> String {
    let t = upper.trim_start();

    if t.starts_with("BEGIN") || t.starts_with("START TRANSACTION") {
        return "TX_BEGIN".to_string();
    }
    if t.starts_with("COMMIT") {
        return "TX_COMMIT".to_string();
    }
    if t.starts_with("ROLLBACK") {
        return "TX_ROLLBACK".to_string();
    }
    if t.starts_with("SAVEPOINT") {
        return "TX_SAVEPOINT".to_string();
    }
    if t.starts_with("SELECT") {
        if upper.contains("INTO OUTFILE") || upper.contains("INTO DUMPFILE") {
            return "SELECT_INTO_OUTFILE".to_string();
        }
        return "SELECT".to_string();
    }
    if t.starts_with("INSERT") || t.starts_with("REPLACE") {
        return "INSERT".to_string();
    }
    if t.starts_with("UPDATE") {
        return "UPDATE".to_string();
    }
    if t.starts_with("DELETE") || t.starts_with("TRUNCATE") {
        return "DELETE".to_string();
    }
    if t.starts_with("MERGE") {
        return "MERGE".to_string();
    }
    if t.starts_with("CREATE") {
        return "CREATE".to_string();
    }
    if t.starts_with("ALTER") || (t.starts_with("RENAME") && upper.contains("TABLE")) {
        return "ALTER".to_string();
    }
    if t.starts_with("DROP") {
        return "DROP".to_string();
    }
    if t.starts_with("GRANT") {
        return "GRANT".to_string();
    }
    if t.starts_with("REVOKE") {
        return "REVOKE".to_string();
    }
    if t.starts_with("COPY") {
        return "COPY".to_string();
    }
    if t.starts_with("LOAD DATA") {
        return "LOAD_DATA".to_string();
    }
    if t.starts_with("SET") {
        return "SET".to_string();
    }
    if t.starts_with("SHOW") {
        return "SHOW".to_string();
    }
    if t.starts_with("ANALYZE") || t.starts_with("VACUUM") || t.starts_with("COMMENT") {
        return "UTILITY".to_string();
    }
    if t.starts_with("CALL")
        || t.starts_with("EXEC")
        || t.starts_with("EXECUTE")
        || t.starts_with("DO")
        || t.starts_with("PREPARE")
        || t.starts_with("DEALLOCATE")
    {
        return "EXEC".to_string();
    }
    "ANON".to_string()
}

/// Classify a raw SQL statement into a canonical token.
pub fn detect_query_type(sql: &str) -> String {
    let Some(stripped) = strip_leading_comments(sql) else {
        return "ANON".to_string();
    };
    if stripped.trim().is_empty() {
        return "ANON".to_string();
    }

    let upper = stripped.to_ascii_uppercase();

    if let Some(escalation) = detect_escalation(&upper) {
        return escalation.to_string();
    }

    detect_base_token(&upper)
}

/// Whether `s` reads as SQL once comments are stripped: begins with a
/// recognized starter token, or contains ` FROM `, ` INTO `, or ` VALUES `.
/// Used by the Postgres parser's query-candidate disambiguation.
pub fn looks_like_sql(s: &str) -> bool {
    let Some(stripped) = strip_leading_comments(s) else {
        return false;
    };
    let upper = stripped.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return false;
    }
    if STARTER_TOKENS.iter().any(|tok| upper.starts_with(tok)) {
        return true;
    }
    upper.contains(" FROM ") || upper.contains(" INTO ") || upper.contains(" VALUES ")
}

/// Map a pgAudit `statement_type` field to the same canonical vocabulary,
/// used only to cross-check against the detected token; its own output
/// is never emitted as `query_type`.
pub fn normalize_stmt_type(raw: &str) -> String {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" => "DELETE".to_string(),
        other => other.to_string(),
    }
}
