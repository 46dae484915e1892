//! Calibration check configuration stored in `calcheck.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::sequencer::{StepGate, StepSequencer};
use crate::core::snapshot::ValidationPolicy;
use crate::core::types::{CalibrationStep, SessionParams};
use crate::session::SessionOptions;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "calcheck.toml";

/// Calibration check configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CalcheckConfig {
    /// Handling of payloads whose derived comparison fields disagree.
    pub policy: ValidationPolicy,

    /// Skip gates keyed by comparison step name (e.g. `comparingPointThree`).
    pub gates: BTreeMap<String, StepGate>,

    /// Parameters the session was created with (`[params]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<SessionParams>,
}

impl CalcheckConfig {
    pub fn validate(&self) -> Result<()> {
        self.sequencer()?;
        let mut racks = self.params.iter().flat_map(|params| &params.tip_racks);
        if let Some(rack) = racks.find(|rack| !rack.is_tiprack) {
            return Err(anyhow!(
                "params.tipRacks: {} in slot {} is not a tip rack",
                rack.uri(),
                rack.slot
            ));
        }
        Ok(())
    }

    /// Build the step sequencer described by `gates`.
    pub fn sequencer(&self) -> Result<StepSequencer> {
        let mut sequencer = StepSequencer::new();
        for (name, gate) in &self.gates {
            let step: CalibrationStep = name
                .parse()
                .map_err(|err| anyhow!("gates.{name}: {err}"))?;
            sequencer = sequencer
                .with_gate(step, *gate)
                .map_err(|err| anyhow!("gates.{name}: {err}"))?;
        }
        Ok(sequencer)
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions {
            policy: self.policy,
            sequencer: self.sequencer()?,
            params: self.params.clone(),
        })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CalcheckConfig::default()`.
pub fn load_config(path: &Path) -> Result<CalcheckConfig> {
    if !path.exists() {
        return Ok(CalcheckConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CalcheckConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CalcheckConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
