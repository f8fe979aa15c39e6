//! auditchain — the command-line surface over the pipeline crates:
//! `parse`, `enrich`, `hash`, and `verify` subcommands.
//!
//! `hash` computes a fresh chain over events that don't yet carry
//! `hash_prev`/`hash`/`hash_chain_index`; `verify` recomputes over events
//! that already do, and treats their absence as tampering. The two are
//! kept as separate subcommands rather than one auto-detecting command
//! since they have different failure semantics (see DESIGN.md).
//!
//! This binary owns flag parsing, file I/O, and process exit codes; no
//! pipeline logic lives here — every subcommand is a thin wrapper around
//! a function in `auditchain-pipeline` or `auditchain-chain`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use auditchain_chain::{hash_stream, load_state, save_state, verify_checkpoint, verify_stream, write_checkpoint};
use auditchain_contracts::{AuditResult, ChainState, DbSystem};
use auditchain_enrich::EnrichConfig;
use auditchain_pipeline::{append_run_log, run_enrich_stream, run_parse_stream, CancellationToken, RunLogEntry};
use auditchain_policy::{RiskPolicy, SensitivityDictionary};
use auditchain_parse::ParseOptions;
use auditchain_schema::SchemaIndex;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "auditchain",
    about = "Parse, enrich, and hash-chain database audit logs into tamper-evident NDJSON"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DbKind {
    Postgres,
    Mysql,
}

impl From<DbKind> for DbSystem {
    fn from(kind: DbKind) -> Self {
        match kind {
            DbKind::Postgres => DbSystem::Postgres,
            DbKind::Mysql => DbSystem::Mysql,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum VerifyVerbosity {
    #[default]
    Summary,
    Detailed,
}

#[derive(Subcommand)]
enum Command {
    /// Extract events from a raw Postgres or MySQL/Percona audit log.
    Parse {
        #[arg(long, value_enum)]
        db: DbKind,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        emit_raw: bool,
        #[arg(long)]
        reject_file: Option<PathBuf>,
        /// Accepted for interface parity with external tailing wrappers;
        /// this implementation always processes a finite file per
        /// invocation rather than tailing a growing one.
        #[arg(long)]
        follow: bool,
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Resolve columns against a schema, classify by sensitivity, and score risk.
    Enrich {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        dict: PathBuf,
        #[arg(long)]
        risk: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        emit_unknown: bool,
        #[arg(long)]
        debug: bool,
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Compute a fresh SHA-256 chain over an enriched NDJSON stream.
    Hash {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        state_path: Option<PathBuf>,
        #[arg(long)]
        checkpoint: bool,
        #[arg(long)]
        private_key: Option<PathBuf>,
        #[arg(long)]
        checkpoint_path: Option<PathBuf>,
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Recompute and verify an already-hashed NDJSON event stream.
    Verify {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        checkpoint: bool,
        #[arg(long)]
        private_key: Option<PathBuf>,
        #[arg(long)]
        public_key: Option<PathBuf>,
        #[arg(long)]
        checkpoint_path: Option<PathBuf>,
        #[arg(long, conflicts_with = "detailed")]
        summary: bool,
        #[arg(long)]
        detailed: bool,
        #[arg(long)]
        state_path: Option<PathBuf>,
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Parse {
            db,
            input,
            output,
            emit_raw,
            reject_file,
            follow: _,
            run_log,
        } => run_parse(db, &input, &output, emit_raw, reject_file.as_deref(), run_log.as_deref()),
        Command::Enrich {
            schema,
            dict,
            risk,
            input,
            output,
            emit_unknown,
            debug,
            run_log,
        } => run_enrich(&schema, &dict, &risk, &input, &output, emit_unknown, debug, run_log.as_deref()),
        Command::Hash {
            input,
            output,
            state_path,
            checkpoint,
            private_key,
            checkpoint_path,
            run_log,
        } => run_hash(
            &input,
            &output,
            state_path.as_deref(),
            checkpoint,
            private_key.as_deref(),
            checkpoint_path.as_deref(),
            run_log.as_deref(),
        ),
        Command::Verify {
            input,
            output,
            checkpoint,
            private_key,
            public_key,
            checkpoint_path,
            summary: _,
            detailed,
            state_path,
            run_log,
        } => {
            let verbosity = if detailed { VerifyVerbosity::Detailed } else { VerifyVerbosity::Summary };
            return run_verify(
                &input,
                output.as_deref(),
                checkpoint,
                private_key.as_deref(),
                public_key.as_deref(),
                checkpoint_path.as_deref(),
                verbosity,
                state_path.as_deref(),
                run_log.as_deref(),
            );
        }
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("auditchain: {e}");
            ExitCode::from(1)
        }
    }
}

// ── `parse` ───────────────────────────────────────────────────────────────────

fn run_parse(
    db: DbKind,
    input: &std::path::Path,
    output: &std::path::Path,
    emit_raw: bool,
    reject_file: Option<&std::path::Path>,
    run_log: Option<&std::path::Path>,
) -> AuditResult<()> {
    let reader = open_reader(input)?;
    let mut writer = open_writer(output)?;
    let mut reject_writer = reject_file.map(open_writer).transpose()?;

    let opts = ParseOptions { include_raw_query: emit_raw };
    let token = CancellationToken::new();
    let counters = run_parse_stream(
        reader,
        &mut writer,
        db.into(),
        opts,
        reject_writer.as_mut().map(|w| w as &mut dyn Write),
        &token,
    )?;
    writer.flush().map_err(io_err(output))?;
    if let Some(reject_writer) = reject_writer.as_mut() {
        reject_writer.flush().map_err(io_err(reject_file.unwrap()))?;
    }

    tracing::info!(
        input_lines = counters.input_lines,
        parsed_events = counters.parsed_events,
        skipped_lines = counters.skipped_lines,
        "parse stage complete"
    );

    if let Some(run_log) = run_log {
        append_run_log(
            run_log,
            &RunLogEntry::new(
                "parse",
                chrono::Utc::now(),
                serde_json::json!({
                    "input_events": counters.input_lines,
                    "parsed_events": counters.parsed_events,
                    "skipped_events": counters.skipped_lines,
                }),
            ),
        )?;
    }

    Ok(())
}

// ── `enrich` ──────────────────────────────────────────────────────────────────

fn run_enrich(
    schema_path: &std::path::Path,
    dict_path: &std::path::Path,
    risk_path: &std::path::Path,
    input: &std::path::Path,
    output: &std::path::Path,
    emit_unknown: bool,
    debug: bool,
    run_log: Option<&std::path::Path>,
) -> AuditResult<()> {
    let schema = SchemaIndex::from_csv_reader(File::open(schema_path).map_err(io_err(schema_path))?)?;
    let dict_json = std::fs::read_to_string(dict_path).map_err(io_err(dict_path))?;
    let dictionary = SensitivityDictionary::from_json_str(&dict_json)?;
    let risk_json = std::fs::read_to_string(risk_path).map_err(io_err(risk_path))?;
    let risk_policy = RiskPolicy::from_json_str(&risk_json, &dictionary)?;

    let reader = open_reader(input)?;
    let mut writer = open_writer(output)?;

    let config = EnrichConfig { emit_unknown };
    let token = CancellationToken::new();
    let counters = run_enrich_stream(reader, &mut writer, &schema, &dictionary, &risk_policy, config, &token)?;
    writer.flush().map_err(io_err(output))?;

    if debug {
        tracing::debug!(
            input_events = counters.input_events,
            enriched_events = counters.enriched_events,
            dropped_unknown = counters.dropped_unknown,
            error_events = counters.error_events,
            "enrich stage complete"
        );
    }

    if let Some(run_log) = run_log {
        append_run_log(
            run_log,
            &RunLogEntry::new(
                "enrich",
                chrono::Utc::now(),
                serde_json::json!({
                    "input_events": counters.input_events,
                    "enriched_events": counters.enriched_events,
                    "unknown_events": counters.dropped_unknown,
                    "error_events": counters.error_events,
                }),
            ),
        )?;
    }

    Ok(())
}

// ── `hash` ────────────────────────────────────────────────────────────────────

fn run_hash(
    input: &std::path::Path,
    output: &std::path::Path,
    state_path: Option<&std::path::Path>,
    checkpoint: bool,
    private_key: Option<&std::path::Path>,
    checkpoint_path: Option<&std::path::Path>,
    run_log: Option<&std::path::Path>,
) -> AuditResult<()> {
    let reader = open_reader(input)?;
    let mut writer = open_writer(output)?;

    let mut state = match state_path {
        Some(path) => load_state(path)?,
        None => ChainState::default(),
    };

    let counters = hash_stream(reader, &mut writer, &mut state)?;
    writer.flush().map_err(io_err(output))?;

    if let Some(state_path) = state_path {
        save_state(state_path, &state)?;
    }

    if checkpoint {
        let (private_key, checkpoint_path) = match (private_key, checkpoint_path) {
            (Some(sk), Some(cp)) => (sk, cp),
            _ => {
                return Err(auditchain_contracts::AuditError::ConfigError {
                    reason: "--checkpoint requires --private-key and --checkpoint-path".to_string(),
                })
            }
        };
        let private_pem = std::fs::read_to_string(private_key).map_err(io_err(private_key))?;
        write_checkpoint(checkpoint_path, state.last_chain_index, &state.last_head_hash, chrono::Utc::now(), &private_pem)?;
    }

    tracing::info!(
        input_events = counters.input_events,
        error_events = counters.error_events,
        last_chain_index = state.last_chain_index,
        "hash stage complete"
    );

    if let Some(run_log) = run_log {
        append_run_log(
            run_log,
            &RunLogEntry::new(
                "hash",
                chrono::Utc::now(),
                serde_json::json!({
                    "input_events": counters.input_events,
                    "error_events": counters.error_events,
                }),
            ),
        )?;
    }

    Ok(())
}

// ── `verify` ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_verify(
    input: &std::path::Path,
    output: Option<&std::path::Path>,
    checkpoint: bool,
    private_key: Option<&std::path::Path>,
    public_key: Option<&std::path::Path>,
    checkpoint_path: Option<&std::path::Path>,
    verbosity: VerifyVerbosity,
    state_path: Option<&std::path::Path>,
    run_log: Option<&std::path::Path>,
) -> ExitCode {
    match run_verify_inner(
        input,
        output,
        checkpoint,
        private_key,
        public_key,
        checkpoint_path,
        verbosity,
        state_path,
        run_log,
    ) {
        Ok(true) => ExitCode::from(0),
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("auditchain: {e}");
            ExitCode::from(1)
        }
    }
}

/// Returns `Ok(true)` when the run passed (exit 0), `Ok(false)` when
/// tampering or a checkpoint mismatch was found (exit 2).
#[allow(clippy::too_many_arguments)]
fn run_verify_inner(
    input: &std::path::Path,
    output: Option<&std::path::Path>,
    checkpoint: bool,
    private_key: Option<&std::path::Path>,
    public_key: Option<&std::path::Path>,
    checkpoint_path: Option<&std::path::Path>,
    verbosity: VerifyVerbosity,
    state_path: Option<&std::path::Path>,
    run_log: Option<&std::path::Path>,
) -> AuditResult<bool> {
    let reader = open_reader(input)?;
    let mut writer = output.map(open_writer).transpose()?;

    let mut state = match state_path {
        Some(path) => load_state(path)?,
        None => ChainState::default(),
    };

    let report = verify_stream(reader, writer.as_mut(), &mut state)?;
    if let Some(writer) = writer.as_mut() {
        writer.flush().map_err(io_err(output.unwrap()))?;
    }
    if let Some(state_path) = state_path {
        save_state(state_path, &state)?;
    }

    let mut checkpoint_ok = true;
    if checkpoint {
        let (private_key, public_key, checkpoint_path) = match (private_key, public_key, checkpoint_path) {
            (Some(sk), Some(pk), Some(cp)) => (sk, pk, cp),
            _ => {
                return Err(auditchain_contracts::AuditError::ConfigError {
                    reason: "--checkpoint requires --private-key, --public-key, and --checkpoint-path".to_string(),
                })
            }
        };
        let private_pem = std::fs::read_to_string(private_key).map_err(io_err(private_key))?;
        let public_pem = std::fs::read_to_string(public_key).map_err(io_err(public_key))?;
        let written = write_checkpoint(checkpoint_path, report.last_chain_index, &report.head_hash, chrono::Utc::now(), &private_pem)?;
        checkpoint_ok = verify_checkpoint(&written, &public_pem, &report.head_hash)?;
    }

    let tampered = !report.is_ok();
    let status = if tampered || !checkpoint_ok { "fail" } else { "pass" };

    match verbosity {
        VerifyVerbosity::Summary => {
            println!(
                "status={status} events_checked={} tampered={} head={}",
                report.events_checked,
                report.tampered_indices.len(),
                report.head_hash
            );
        }
        VerifyVerbosity::Detailed => {
            println!(
                "status={status} events_checked={} tampered_indices={:?} head={} last_chain_index={}",
                report.events_checked, report.tampered_indices, report.head_hash, report.last_chain_index
            );
        }
    }

    if let Some(run_log) = run_log {
        let entry = RunLogEntry::new(
            "verify",
            chrono::Utc::now(),
            serde_json::json!({
                "input_events": report.events_checked,
                "error_events": report.tampered_indices.len(),
            }),
        );
        let entry = match verbosity {
            VerifyVerbosity::Detailed => entry.with_detail(serde_json::json!({
                "tampered_indices": report.tampered_indices,
                "checkpoint_ok": checkpoint_ok,
            })),
            VerifyVerbosity::Summary => entry,
        };
        append_run_log(run_log, &entry)?;
    }

    Ok(!tampered && checkpoint_ok)
}

// ── I/O helpers ───────────────────────────────────────────────────────────────

fn open_reader(path: &std::path::Path) -> AuditResult<BufReader<File>> {
    Ok(BufReader::new(File::open(path).map_err(io_err(path))?))
}

fn open_writer(path: &std::path::Path) -> AuditResult<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path).map_err(io_err(path))?))
}

fn io_err(path: &std::path::Path) -> impl Fn(std::io::Error) -> auditchain_contracts::AuditError + '_ {
    move |source| auditchain_contracts::AuditError::Io {
        path: path.display().to_string(),
        source,
    }
}
