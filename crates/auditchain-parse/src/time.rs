//! Tolerant timestamp normalization shared by both parsers: every
//! timestamp they emit is normalized to UTC RFC3339.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Parse `raw` as RFC3339 first; failing that, fall back to the
/// `YYYY-MM-DD HH:MM:SS[.ffffff]` shape used by pgAudit log lines and
/// MySQL audit timestamps, assuming UTC when no offset is present.
pub fn normalize_timestamp_tolerant(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(to_utc_rfc3339(&dt.with_timezone(&Utc)));
    }

    let mut parts = raw.splitn(3, ' ');
    let date = parts.next()?;
    let time = parts.next().unwrap_or("00:00:00");
    let candidate = format!("{date} {time}");

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            let dt = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
            return Some(to_utc_rfc3339(&dt));
        }
    }

    None
}

fn to_utc_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
