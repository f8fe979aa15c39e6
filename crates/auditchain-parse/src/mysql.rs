//! The MySQL/Percona audit parser: accepts both the JSON audit-log shape
//! (`{"audit_record": {...}}`) and the XML shape (`<AUDIT_RECORD .../>`).

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use serde_json::Value;
use uuid::Uuid;

use auditchain_contracts::{DbSystem, Event};
use auditchain_extract::extract_refs;

use crate::classify::detect_query_type;
use crate::postgres::ParseOptions;
use crate::time::normalize_timestamp_tolerant;

/// Parse one line of MySQL/Percona audit log output. Returns `None` for
/// lines that are neither a JSON audit record nor an `AUDIT_RECORD` XML
/// element.
pub fn parse_mysql_line(line: &str, opts: ParseOptions) -> Option<Event> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed).ok()?;
        let record = value.get("audit_record").unwrap_or(&value);
        return build_event(FieldSource::Json(record), opts);
    }

    if trimmed.starts_with('<') {
        let attrs = parse_xml_attrs(trimmed)?;
        return build_event(FieldSource::Xml(attrs), opts);
    }

    None
}

enum FieldSource<'a> {
    Json(&'a Value),
    Xml(Vec<(String, String)>),
}

impl FieldSource<'_> {
    fn get(&self, key: &str) -> Option<String> {
        match self {
            FieldSource::Json(v) => v.get(key).and_then(|x| x.as_str()).map(|s| s.to_string()),
            FieldSource::Xml(attrs) => attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
        }
    }
}

/// Pull every attribute off the first `AUDIT_RECORD` element, tolerating
/// both a self-closed `<AUDIT_RECORD .../>` and an opening
/// `<AUDIT_RECORD ...>` tag.
fn parse_xml_attrs(xml: &str) -> Option<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Empty(e)) | Ok(XmlEvent::Start(e)) => {
                if e.name().as_ref() != b"AUDIT_RECORD" {
                    continue;
                }
                let mut attrs = Vec::new();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr
                        .decode_and_unescape_value(reader.decoder())
                        .ok()?
                        .to_string();
                    attrs.push((key, value));
                }
                return Some(attrs);
            }
            Ok(XmlEvent::Eof) => return None,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Reduce MySQL's `user` attribute shape (`bob[bob] @ host []`) down to the
/// bare account name.
fn reduce_user(raw: &str) -> String {
    raw.split(['[', '@']).next().unwrap_or(raw).trim().to_string()
}

fn map_command_class(command_class: &str, has_sqltext: bool) -> &'static str {
    match command_class.to_ascii_lowercase().as_str() {
        "connect" => "LOGIN_SUCCESS",
        "quit" => "LOGOUT",
        "error" if !has_sqltext => "ANON",
        _ => "",
    }
}

fn build_event(source: FieldSource<'_>, opts: ParseOptions) -> Option<Event> {
    let mut event = Event::new(Uuid::new_v4().to_string());
    event.db_system = Some(DbSystem::Mysql);

    if let Some(ts) = source.get("timestamp").or_else(|| source.get("TIMESTAMP")) {
        event.timestamp = normalize_timestamp_tolerant(&ts);
    }

    let user = source.get("user").or_else(|| source.get("USER"));
    if let Some(user) = &user {
        event.set_extra_str("user", reduce_user(user));
    }

    let command_class = source
        .get("command_class")
        .or_else(|| source.get("COMMAND_CLASS"))
        .unwrap_or_default();
    let sqltext = source.get("sqltext").or_else(|| source.get("SQLTEXT"));

    let query_type = match &sqltext {
        Some(sql) if !sql.trim().is_empty() => detect_query_type(sql),
        _ => {
            let mapped = map_command_class(&command_class, false);
            if mapped.is_empty() {
                command_class.to_ascii_uppercase()
            } else {
                mapped.to_string()
            }
        }
    };
    event.query_type = Some(query_type);

    if let Some(sql) = &sqltext {
        if !sql.trim().is_empty() {
            let refs = extract_refs(sql);
            if refs.is_bulk {
                event.bulk = Some(true);
                event.bulk_type = refs.bulk_type;
            }
            if refs.full_table_read {
                event.full_table_read = Some(true);
            }
            if opts.include_raw_query {
                event.raw_query = Some(sql.clone());
            }
        }
    }

    if !command_class.is_empty() {
        event.set_extra_str("command_class", command_class);
    }
    if let Some(db) = source.get("db").or_else(|| source.get("DB")) {
        if !db.is_empty() {
            event.set_extra_str("db", db);
        }
    }
    if let Some(host) = source.get("host").or_else(|| source.get("HOST")) {
        if !host.is_empty() {
            event.set_extra_str("host", host);
        }
    }
    if let Some(ip) = source.get("ip").or_else(|| source.get("IP")) {
        if !ip.is_empty() {
            event.set_extra_str("ip", ip);
        }
    }
    if let Some(connection_id) = source.get("connection_id").or_else(|| source.get("CONNECTION_ID")) {
        event.set_extra_str("connection_id", connection_id);
    }
    if let Some(status) = source.get("status").or_else(|| source.get("STATUS")) {
        event.set_extra_str("status", status);
    }

    Some(event)
}
