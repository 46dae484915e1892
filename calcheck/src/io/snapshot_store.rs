//! Payload load/save helpers with JSON Schema validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::payload::SessionPayload;
use crate::core::snapshot::SessionSnapshot;

/// JSON Schema for session payloads and serialized snapshots.
pub const SNAPSHOT_SCHEMA: &str = include_str!("../../schemas/session_snapshot.schema.json");

/// Read a payload file and check it against the snapshot schema.
pub fn load_payload(path: &Path) -> Result<SessionPayload> {
    debug!(path = %path.display(), "loading session payload");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read payload {}", path.display()))?;
    parse_payload(&contents).with_context(|| format!("load payload {}", path.display()))
}

/// Parse a payload from JSON text (schema first, then typed deserialization).
pub fn parse_payload(contents: &str) -> Result<SessionPayload> {
    let value: Value = serde_json::from_str(contents).context("parse payload json")?;
    validate_schema(&value)?;
    let payload: SessionPayload =
        serde_json::from_value(value).context("deserialize session payload")?;
    debug!(
        step = %payload.current_step,
        instruments = payload.instruments.len(),
        "session payload parsed"
    );
    Ok(payload)
}

/// Atomically write a snapshot to disk (temp file + rename).
///
/// The file uses the inbound payload layout, so it loads back through
/// [`load_payload`].
pub fn write_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    debug!(path = %path.display(), step = %snapshot.current_step(), "writing snapshot");
    let mut buf =
        serde_json::to_string_pretty(&snapshot.to_payload()).context("serialize snapshot")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp snapshot {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace snapshot {}", path.display()))?;
    Ok(())
}

fn validate_schema(payload: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SNAPSHOT_SCHEMA).context("parse snapshot schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(payload) {
        let messages = compiled
            .iter_errors(payload)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "payload schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
