//! The column resolver: turns `QueryRefs` plus a schema index into
//! `qualified-column -> normalized-type`.

use std::collections::BTreeMap;

use tracing::debug;

use auditchain_contracts::QueryRefs;
use auditchain_schema::SchemaIndex;

/// Resolve every reference in `refs` against `schema`.
/// Unresolvable references are dropped silently (logged at debug only).
pub fn resolve(refs: &QueryRefs, schema: &SchemaIndex) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    for column in &refs.columns {
        if column == "*" {
            resolve_wildcard(refs, schema, &mut out);
        } else if let Some((alias, col)) = column.split_once('.') {
            resolve_qualified(refs, schema, alias, col, &mut out);
        } else {
            resolve_bare(refs, schema, column, &mut out);
        }
    }

    out
}

fn resolve_wildcard(refs: &QueryRefs, schema: &SchemaIndex, out: &mut BTreeMap<String, String>) {
    for (alias, table) in &refs.tables {
        match schema.find_table_any_schema(table) {
            Some((_, columns)) => {
                for (col_name, ty) in columns {
                    out.insert(format!("{alias}.{col_name}"), ty.clone());
                }
            }
            None => debug!(table, "wildcard expansion: table not found in any schema"),
        }
    }
}

fn resolve_qualified(
    refs: &QueryRefs,
    schema: &SchemaIndex,
    alias: &str,
    column: &str,
    out: &mut BTreeMap<String, String>,
) {
    let Some(table) = refs.tables.get(alias) else {
        debug!(alias, column, "qualified column: alias does not resolve to a table");
        return;
    };
    match schema.find_table_any_schema(table) {
        Some((_, columns)) => {
            if let Some(ty) = columns.get(column) {
                out.insert(format!("{alias}.{column}"), ty.clone());
            } else {
                debug!(alias, table, column, "qualified column: table has no such column");
            }
        }
        None => debug!(table, "qualified column: table not found in any schema"),
    }
}

fn resolve_bare(refs: &QueryRefs, schema: &SchemaIndex, column: &str, out: &mut BTreeMap<String, String>) {
    for (alias, table) in &refs.tables {
        if let Some((_, columns)) = schema.find_table_any_schema(table) {
            if let Some(ty) = columns.get(column) {
                out.insert(format!("{alias}.{column}"), ty.clone());
                return;
            }
        }
    }
    debug!(column, "bare column: not found on any referenced table");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_users() -> SchemaIndex {
        let csv = "db_name,schema_name,table_name,column_name,column_type\n\
                    app,public,users,id,uuid\n\
                    app,public,users,ssn,varchar(11)\n\
                    app,public,users,email,varchar(255)";
        SchemaIndex::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn refs_with(tables: &[(&str, &str)], columns: &[&str]) -> QueryRefs {
        let mut refs = QueryRefs::new();
        for (alias, table) in tables {
            refs.tables.insert(alias.to_string(), table.to_string());
        }
        refs.columns = columns.iter().map(|s| s.to_string()).collect();
        refs
    }

    #[test]
    fn resolves_wildcard_to_every_column() {
        let schema = schema_with_users();
        let refs = refs_with(&[("u", "users")], &["*"]);
        let resolved = resolve(&refs, &schema);
        assert_eq!(resolved.get("u.ssn").map(|s| s.as_str()), Some("VARCHAR"));
        assert_eq!(resolved.get("u.id").map(|s| s.as_str()), Some("UUID"));
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn resolves_qualified_column() {
        let schema = schema_with_users();
        let refs = refs_with(&[("u", "users")], &["u.ssn"]);
        let resolved = resolve(&refs, &schema);
        assert_eq!(resolved.get("u.ssn").map(|s| s.as_str()), Some("VARCHAR"));
    }

    #[test]
    fn resolves_bare_column_against_first_matching_table() {
        let schema = schema_with_users();
        let refs = refs_with(&[("users", "users")], &["ssn"]);
        let resolved = resolve(&refs, &schema);
        assert_eq!(resolved.get("users.ssn").map(|s| s.as_str()), Some("VARCHAR"));
    }

    #[test]
    fn unresolvable_reference_is_dropped_silently() {
        let schema = schema_with_users();
        let refs = refs_with(&[("u", "users")], &["u.nonexistent"]);
        let resolved = resolve(&refs, &schema);
        assert!(resolved.is_empty());
    }

    #[test]
    fn unknown_table_is_dropped_silently() {
        let schema = schema_with_users();
        let refs = refs_with(&[("g", "ghost_table")], &["g.col"]);
        let resolved = resolve(&refs, &schema);
        assert!(resolved.is_empty());
    }
}
