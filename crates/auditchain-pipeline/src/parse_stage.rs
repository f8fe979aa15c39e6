//! The `parse` stage runner: wraps `auditchain_parse`'s per-line functions
//! in a line-oriented loop — one parser call per input line, SKIP (not
//! error) for unrecognized lines, optional reject-file capture of
//! exactly those skipped lines.

use std::io::{BufRead, Write};

use tracing::debug;

use auditchain_contracts::{AuditError, AuditResult, DbSystem};
use auditchain_parse::{parse_mysql_line, parse_postgres_line, ParseOptions};

use crate::cancel::CancellationToken;

/// Counters accumulated across a parse-stage run (mirrors the run-log
/// shape used elsewhere: `input_events`, here specialized to
/// `parsed_events`/`skipped_lines`).
#[derive(Debug, Clone, Default)]
pub struct ParseStreamCounters {
    pub input_lines: u64,
    pub parsed_events: u64,
    pub skipped_lines: u64,
    pub cancelled: bool,
}

/// Run the parse stage over `reader`, writing one NDJSON event per
/// recognized line to `writer`. Lines the parser doesn't recognize are
/// SKIP, not errors: they are counted and, if `reject_writer` is given,
/// copied there verbatim for later inspection.
///
/// Checks `token` once per line: on cancellation the loop stops and
/// returns counters as accumulated so far, leaving checkpointing and
/// state persistence to the caller.
pub fn run_parse_stream<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    db_system: DbSystem,
    opts: ParseOptions,
    mut reject_writer: Option<&mut dyn Write>,
    token: &CancellationToken,
) -> AuditResult<ParseStreamCounters> {
    let mut counters = ParseStreamCounters::default();

    for line in reader.lines() {
        if token.is_cancelled() {
            counters.cancelled = true;
            break;
        }

        let line = line.map_err(|e| AuditError::Io {
            path: "<parse input>".to_string(),
            source: e,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        counters.input_lines += 1;

        let parsed = match db_system {
            DbSystem::Postgres => parse_postgres_line(trimmed, opts),
            DbSystem::Mysql => parse_mysql_line(trimmed, opts),
        };

        match parsed {
            Some(event) => {
                counters.parsed_events += 1;
                let line_out = serde_json::to_string(&event).expect("parsed event must serialize");
                writeln!(writer, "{line_out}").map_err(|e| AuditError::Io {
                    path: "<parse output>".to_string(),
                    source: e,
                })?;
            }
            None => {
                counters.skipped_lines += 1;
                debug!("line did not match any recognized audit record shape; skipping");
                if let Some(reject) = reject_writer.as_mut() {
                    writeln!(reject, "{trimmed}").map_err(|e| AuditError::Io {
                        path: "<reject file>".to_string(),
                        source: e,
                    })?;
                }
            }
        }
    }

    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_postgres_line() -> String {
        r#"2024-01-15 12:00:00.123 UTC [4242] LOG:  AUDIT: SESSION,1,1,READ,SELECT,TABLE,public.users,"SELECT * FROM users",<not logged>"#.to_string()
    }

    #[test]
    fn recognized_lines_are_parsed_and_counted() {
        let input = format!("{}\n{}", sample_postgres_line(), sample_postgres_line());
        let mut out = Vec::new();
        let counters = run_parse_stream(
            Cursor::new(input),
            &mut out,
            DbSystem::Postgres,
            ParseOptions::default(),
            None,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(counters.input_lines, 2);
        assert_eq!(counters.parsed_events, 2);
        assert_eq!(counters.skipped_lines, 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn unrecognized_lines_are_skipped_and_rejected() {
        let input = "just some noise in the log file\n";
        let mut out = Vec::new();
        let mut reject = Vec::new();
        let counters = run_parse_stream(
            Cursor::new(input),
            &mut out,
            DbSystem::Postgres,
            ParseOptions::default(),
            Some(&mut reject),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(counters.skipped_lines, 1);
        assert_eq!(counters.parsed_events, 0);
        assert_eq!(String::from_utf8(reject).unwrap().trim(), "just some noise in the log file");
    }

    #[test]
    fn cancellation_stops_the_loop_early() {
        let input = format!("{}\n{}\n{}", sample_postgres_line(), sample_postgres_line(), sample_postgres_line());
        let token = CancellationToken::new();
        token.cancel();
        let mut out = Vec::new();
        let counters = run_parse_stream(
            Cursor::new(input),
            &mut out,
            DbSystem::Postgres,
            ParseOptions::default(),
            None,
            &token,
        )
        .unwrap();

        assert!(counters.cancelled);
        assert_eq!(counters.input_lines, 0);
    }
}
