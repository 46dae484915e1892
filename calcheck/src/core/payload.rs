//! Unvalidated session payloads as delivered by the transport layer.
//!
//! A payload has the same JSON layout as a [`SessionSnapshot`], but nothing
//! about it is trusted yet: the step is a plain string and every comparison
//! carries its own `exceedsThreshold` flag. See
//! [`SessionSnapshot::from_payload`] for the checks that turn one into a
//! snapshot.
//!
//! [`SessionSnapshot`]: crate::core::snapshot::SessionSnapshot
//! [`SessionSnapshot::from_payload`]: crate::core::snapshot::SessionSnapshot::from_payload

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{
    CalibrationStep, CalibrationType, ComparisonStatus, Instrument, Labware, PipetteRank, Vector3,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonPayload {
    pub difference_vector: Vector3,
    pub threshold_vector: Vector3,
    pub exceeds_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMapPayload {
    pub status: ComparisonStatus,
    #[serde(flatten)]
    pub steps: BTreeMap<CalibrationStep, ComparisonPayload>,
}

pub type ComparisonTablePayload =
    BTreeMap<PipetteRank, BTreeMap<CalibrationType, ComparisonMapPayload>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub instruments: Vec<Instrument>,
    pub current_step: String,
    #[serde(default)]
    pub comparisons_by_pipette: ComparisonTablePayload,
    #[serde(default)]
    pub labware: Vec<Labware>,
    pub active_pipette: Instrument,
    pub active_tip_rack: Labware,
}

impl SessionPayload {
    /// Iterate every comparison entry as `(rank, type, step, comparison)`.
    pub fn comparisons(
        &self,
    ) -> impl Iterator<Item = (PipetteRank, CalibrationType, CalibrationStep, &ComparisonPayload)>
    {
        self.comparisons_by_pipette.iter().flat_map(|(rank, maps)| {
            maps.iter().flat_map(move |(kind, map)| {
                map.steps
                    .iter()
                    .map(move |(step, comparison)| (*rank, *kind, *step, comparison))
            })
        })
    }
}
