//! Persistence for [`ChainState`] between pipeline invocations.
//!
//! A chain that spans multiple input files needs its tail hash and index
//! to survive the process exiting. Writes go through a
//! temp-file-then-rename so a crash mid-write never leaves a
//! half-written state file behind.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use auditchain_contracts::{AuditError, AuditResult, ChainState};

/// Load chain state from `path`. Returns the default (genesis) state when
/// the file does not exist, so the first file in a chain needs no
/// separately-provisioned state file.
pub fn load_state(path: &Path) -> AuditResult<ChainState> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| AuditError::CheckpointDecode {
            reason: format!("chain state file '{}': {e}", path.display()),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChainState::default()),
        Err(e) => Err(AuditError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Persist `state` to `path` atomically: write to a sibling temp file, then
/// rename over the destination.
pub fn save_state(path: &Path, state: &ChainState) -> AuditResult<()> {
    write_atomic(path, &serde_json::to_vec_pretty(state).expect("ChainState must serialize"))
}

/// Write `contents` to `path` via a temp-file-then-rename, so concurrent
/// readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> AuditResult<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| AuditError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("auditchain-state")
    ));

    let mut file = fs::File::create(&tmp_path).map_err(|e| AuditError::Io {
        path: tmp_path.display().to_string(),
        source: e,
    })?;
    file.write_all(contents).map_err(|e| AuditError::Io {
        path: tmp_path.display().to_string(),
        source: e,
    })?;
    file.sync_all().map_err(|e| AuditError::Io {
        path: tmp_path.display().to_string(),
        source: e,
    })?;

    fs::rename(&tmp_path, path).map_err(|e| AuditError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
