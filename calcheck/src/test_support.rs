//! Test-only helpers for constructing instruments, labware and payloads.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;

use crate::core::payload::{ComparisonMapPayload, ComparisonPayload, SessionPayload};
use crate::core::types::{
    CalibrationStep, CalibrationType, ComparisonStatus, Instrument, Labware, Mount, PipetteRank,
    SessionParams, Vector3,
};
use crate::io::snapshot_store::load_payload;

/// Per-axis tolerance used by every fixture comparison.
pub const THRESHOLD: Vector3 = Vector3([0.25, 0.25, 0.25]);

/// Deterministic instrument for `rank`; both ranks share the 300ul tip rack.
pub fn instrument(rank: PipetteRank) -> Instrument {
    let (mount, serial, model) = match rank {
        PipetteRank::First => (Mount::Left, "P3HSV2020010101", "p300_single_v2.0"),
        PipetteRank::Second => (Mount::Right, "P3HMV2020020202", "p300_multi_v2.0"),
    };
    Instrument {
        model: model.to_string(),
        name: model.trim_end_matches("_v2.0").to_string(),
        tip_length: 51.7,
        mount,
        rank,
        tip_rack_display: "Opentrons 96 Tip Rack 300 µL".to_string(),
        tip_rack_uri: "opentrons/opentrons_96_tiprack_300ul/1".to_string(),
        serial: serial.to_string(),
    }
}

/// 300ul tip rack in `slot`.
pub fn tip_rack(slot: &str) -> Labware {
    Labware {
        slot: slot.to_string(),
        load_name: "opentrons_96_tiprack_300ul".to_string(),
        namespace: "opentrons".to_string(),
        version: 1,
        is_tiprack: true,
    }
}

/// Session parameters listing the slot 8 tip rack, with a calibration block.
pub fn session_params() -> SessionParams {
    SessionParams {
        has_calibration_block: true,
        tip_racks: vec![tip_rack("8")],
    }
}

/// Comparison against [`THRESHOLD`] with an explicit (possibly wrong) flag.
pub fn comparison(difference: Vector3, exceeds_threshold: bool) -> ComparisonPayload {
    ComparisonPayload {
        difference_vector: difference,
        threshold_vector: THRESHOLD,
        exceeds_threshold,
    }
}

/// Tip-length map with in-threshold nozzle and tip comparisons.
pub fn tip_length_map() -> BTreeMap<CalibrationType, ComparisonMapPayload> {
    let steps = BTreeMap::from([
        (
            CalibrationStep::ComparingNozzle,
            comparison(Vector3::new(0.0, 0.0, 0.1), false),
        ),
        (
            CalibrationStep::ComparingTip,
            comparison(Vector3::new(0.0, 0.0, -0.05), false),
        ),
    ]);
    BTreeMap::from([(
        CalibrationType::TipLength,
        ComparisonMapPayload {
            status: ComparisonStatus::InThreshold,
            steps,
        },
    )])
}

/// Consistent payload for a session with only a `first` pipette.
pub fn single_pipette_payload(step: &str) -> SessionPayload {
    let first = instrument(PipetteRank::First);
    SessionPayload {
        instruments: vec![first.clone()],
        current_step: step.to_string(),
        comparisons_by_pipette: BTreeMap::from([(PipetteRank::First, tip_length_map())]),
        labware: vec![tip_rack("8")],
        active_pipette: first,
        active_tip_rack: tip_rack("8"),
    }
}

/// Consistent payload for a two-pipette session, `first` active.
pub fn two_pipette_payload(step: &str) -> SessionPayload {
    let mut payload = single_pipette_payload(step);
    payload.instruments.push(instrument(PipetteRank::Second));
    payload
        .comparisons_by_pipette
        .insert(PipetteRank::Second, tip_length_map());
    payload
}

/// Path of a JSON payload fixture under `tests/fixtures/`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(format!("{name}.json"))
}

/// Load and schema-check a payload fixture.
pub fn load_payload_fixture(name: &str) -> Result<SessionPayload> {
    load_payload(&fixture_path(name))
}
