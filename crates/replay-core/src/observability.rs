//! Observability: tracing setup and the optional JSONL audit trail.
//!
//! Settings come from [`crate::config::ObservabilityConfig`]: REPLAY_QUIET,
//! REPLAY_LOG_LEVEL, REPLAY_LOG_JSON and REPLAY_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Later calls are no-ops.
///
/// REPLAY_QUIET keeps warnings and errors only; RUST_LOG overrides both it and
/// REPLAY_LOG_LEVEL. Logs go to stderr so stdout stays clean for command output.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let directive = if cfg.quiet { "replay=warn" } else { cfg.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if cfg.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
    };
}

/// Audit file, resolved once. Its parent directory is created on first use.
fn audit_file() -> Option<&'static Path> {
    static AUDIT_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();
    AUDIT_FILE
        .get_or_init(|| {
            let path = PathBuf::from(ObservabilityConfig::from_env().audit_log.as_ref()?);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Some(path)
        })
        .as_deref()
}

fn append_record(path: &Path, record: &Value) {
    let Ok(line) = serde_json::to_string(record) else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{line}");
    }
}

/// Stamp `fields` with the time and event name and append them to the audit file.
fn emit(event: &str, fields: Value) {
    let Some(path) = audit_file() else {
        return;
    };
    let mut record = json!({
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "event": event,
    });
    if let (Some(target), Value::Object(extra)) = (record.as_object_mut(), fields) {
        target.extend(extra);
    }
    append_record(path, &record);
}

/// An external command is about to start.
pub fn audit_command_invoked(command: &str, cwd: &str) {
    emit("command_invoked", json!({ "cmd": command, "cwd": cwd }));
}

pub fn audit_command_completed(command: &str, exit_code: i32, duration_ms: u64) {
    emit(
        "command_completed",
        json!({
            "cmd": command,
            "exit_code": exit_code,
            "success": exit_code == 0,
            "duration_ms": duration_ms,
        }),
    );
}

/// A pipeline run begins; also logged at info level.
pub fn audit_pipeline_started(script: &str, plugins: &[&str]) {
    tracing::info!(script = %script, plugins = ?plugins, "Pipeline started");
    emit("pipeline_started", json!({ "script": script, "plugins": plugins }));
}

pub fn audit_pipeline_completed(script: &str, success: bool, duration_ms: u64, error: Option<&str>) {
    emit(
        "pipeline_completed",
        json!({
            "script": script,
            "success": success,
            "duration_ms": duration_ms,
            "error": error,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_record_writes_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        append_record(&path, &json!({"event": "a"}));
        append_record(&path, &json!({"event": "b", "n": 2}));

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["event"], "a");
        assert_eq!(records[1]["n"], 2);
    }
}
