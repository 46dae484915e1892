//! Shared deterministic types for the calibration check model.
//!
//! These types define the stable wire contract with the transport layer.
//! Serialized names match the robot's session payloads exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::CalibrationError;

/// One discrete stage of a calibration check.
///
/// Declaration order is the fixed forward order of the workflow; the derived
/// `Ord` follows it. `CheckComplete` and `SessionExited` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationStep {
    SessionStarted,
    LabwareLoaded,
    InspectingTip,
    PreparingPipette,
    ComparingNozzle,
    ComparingTip,
    ComparingHeight,
    ComparingPointOne,
    ComparingPointTwo,
    ComparingPointThree,
    ReturningTip,
    ResultsSummary,
    CheckComplete,
    SessionExited,
}

impl CalibrationStep {
    /// Every step, in workflow order.
    pub const ALL: [CalibrationStep; 14] = [
        CalibrationStep::SessionStarted,
        CalibrationStep::LabwareLoaded,
        CalibrationStep::InspectingTip,
        CalibrationStep::PreparingPipette,
        CalibrationStep::ComparingNozzle,
        CalibrationStep::ComparingTip,
        CalibrationStep::ComparingHeight,
        CalibrationStep::ComparingPointOne,
        CalibrationStep::ComparingPointTwo,
        CalibrationStep::ComparingPointThree,
        CalibrationStep::ReturningTip,
        CalibrationStep::ResultsSummary,
        CalibrationStep::CheckComplete,
        CalibrationStep::SessionExited,
    ];

    /// Position of this step in [`CalibrationStep::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationStep::SessionStarted => "sessionStarted",
            CalibrationStep::LabwareLoaded => "labwareLoaded",
            CalibrationStep::InspectingTip => "inspectingTip",
            CalibrationStep::PreparingPipette => "preparingPipette",
            CalibrationStep::ComparingNozzle => "comparingNozzle",
            CalibrationStep::ComparingTip => "comparingTip",
            CalibrationStep::ComparingHeight => "comparingHeight",
            CalibrationStep::ComparingPointOne => "comparingPointOne",
            CalibrationStep::ComparingPointTwo => "comparingPointTwo",
            CalibrationStep::ComparingPointThree => "comparingPointThree",
            CalibrationStep::ReturningTip => "returningTip",
            CalibrationStep::ResultsSummary => "resultsSummary",
            CalibrationStep::CheckComplete => "checkComplete",
            CalibrationStep::SessionExited => "sessionExited",
        }
    }

    /// True for steps that end the session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CalibrationStep::CheckComplete | CalibrationStep::SessionExited
        )
    }

    /// True for the `comparing*` steps that produce comparison results.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            CalibrationStep::ComparingNozzle
                | CalibrationStep::ComparingTip
                | CalibrationStep::ComparingHeight
                | CalibrationStep::ComparingPointOne
                | CalibrationStep::ComparingPointTwo
                | CalibrationStep::ComparingPointThree
        )
    }
}

impl fmt::Display for CalibrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationStep {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalibrationStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| CalibrationError::UnknownStep(s.to_string()))
    }
}

/// Which of up to two pipettes a record or comparison belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipetteRank {
    First,
    Second,
}

impl PipetteRank {
    pub const ALL: [PipetteRank; 2] = [PipetteRank::First, PipetteRank::Second];

    pub fn as_str(self) -> &'static str {
        match self {
            PipetteRank::First => "first",
            PipetteRank::Second => "second",
        }
    }
}

impl fmt::Display for PipetteRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipette mount side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Left => f.write_str("left"),
            Mount::Right => f.write_str("right"),
        }
    }
}

/// Aggregate pass/fail marker for a calibration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonStatus {
    InThreshold,
    OutsideThreshold,
}

impl ComparisonStatus {
    /// Human-readable label used in rendered summaries.
    pub fn label(self) -> &'static str {
        match self {
            ComparisonStatus::InThreshold => "in threshold",
            ComparisonStatus::OutsideThreshold => "outside threshold",
        }
    }
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonStatus::InThreshold => f.write_str("IN_THRESHOLD"),
            ComparisonStatus::OutsideThreshold => f.write_str("OUTSIDE_THRESHOLD"),
        }
    }
}

/// Calibration data a group of comparison steps checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationType {
    TipLength,
    PipetteOffset,
    Deck,
}

impl CalibrationType {
    pub const ALL: [CalibrationType; 3] = [
        CalibrationType::TipLength,
        CalibrationType::PipetteOffset,
        CalibrationType::Deck,
    ];

    /// Calibration types a comparison step contributes to.
    ///
    /// Non-comparison steps contribute to nothing.
    pub fn for_step(step: CalibrationStep) -> &'static [CalibrationType] {
        match step {
            CalibrationStep::ComparingNozzle | CalibrationStep::ComparingTip => {
                &[CalibrationType::TipLength]
            }
            CalibrationStep::ComparingHeight => &[CalibrationType::PipetteOffset],
            CalibrationStep::ComparingPointOne => {
                &[CalibrationType::PipetteOffset, CalibrationType::Deck]
            }
            CalibrationStep::ComparingPointTwo | CalibrationStep::ComparingPointThree => {
                &[CalibrationType::Deck]
            }
            _ => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationType::TipLength => "tipLength",
            CalibrationType::PipetteOffset => "pipetteOffset",
            CalibrationType::Deck => "deck",
        }
    }
}

impl fmt::Display for CalibrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-initiated transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionEvent {
    Advance,
    Exit,
    JumpToResults,
}

impl TransitionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionEvent::Advance => "advance",
            TransitionEvent::Exit => "exit",
            TransitionEvent::JumpToResults => "jumpToResults",
        }
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionEvent {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advance" => Ok(TransitionEvent::Advance),
            "exit" => Ok(TransitionEvent::Exit),
            "jumpToResults" | "jump-to-results" => Ok(TransitionEvent::JumpToResults),
            other => Err(CalibrationError::UnknownEvent(other.to_string())),
        }
    }
}

/// Three-axis vector `[x, y, z]` in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector3(pub [f64; 3]);

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    pub fn components(&self) -> [f64; 3] {
        self.0
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "({x:.3}, {y:.3}, {z:.3})")
    }
}

impl FromStr for Vector3 {
    type Err = String;

    /// Parse `x,y,z`; every component must be finite.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected three comma-separated numbers, got '{s}'"));
        }
        let mut out = [0.0; 3];
        for (slot, part) in out.iter_mut().zip(&parts) {
            let value = part
                .parse::<f64>()
                .map_err(|err| format!("invalid component '{part}': {err}"))?;
            if !value.is_finite() {
                return Err(format!("component '{part}' is not a finite number"));
            }
            *slot = value;
        }
        Ok(Self(out))
    }
}

/// Pipette record reported by the hardware when the session starts.
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub model: String,
    pub name: String,
    pub tip_length: f64,
    pub mount: Mount,
    pub rank: PipetteRank,
    #[serde(rename = "tipRackDisplay")]
    pub tip_rack_display: String,
    #[serde(rename = "tipRackUri")]
    pub tip_rack_uri: String,
    pub serial: String,
}

/// Labware placed on the deck for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labware {
    pub slot: String,
    pub load_name: String,
    pub namespace: String,
    pub version: u32,
    pub is_tiprack: bool,
}

impl Labware {
    /// Definition URI, `namespace/loadName/version`.
    pub fn uri(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.load_name, self.version)
    }
}

/// Parameters a calibration check session was created with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub has_calibration_block: bool,
    pub tip_racks: Vec<Labware>,
}
