//! Validated, immutable session snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::comparison::{self, ComparisonMap};
use crate::core::error::CalibrationError;
use crate::core::invariants::{
    dangling_references, derived_field_mismatches, malformed_tip_rack_uris,
    misplaced_comparisons,
};
use crate::core::payload::{ComparisonMapPayload, ComparisonPayload, SessionPayload};
use crate::core::registry::InstrumentRegistry;
use crate::core::sequencer::StepSequencer;
use crate::core::types::{
    CalibrationStep, CalibrationType, ComparisonStatus, Instrument, Labware, PipetteRank,
};

/// How inbound payloads with wrong derived fields are handled.
///
/// Fixed per session; never chosen per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Reject the payload and keep the prior snapshot.
    #[default]
    Strict,
    /// Recompute derived fields and accept the payload.
    Lenient,
}

/// Comparison results keyed by pipette rank, then calibration type.
pub type ComparisonTable = BTreeMap<PipetteRank, BTreeMap<CalibrationType, ComparisonMap>>;

/// Complete state of a calibration check at one point in time.
///
/// Only constructed through [`SessionSnapshot::from_payload`], so every
/// snapshot satisfies the payload invariants: the active pipette is a
/// registered instrument, the active tip rack is on the deck, and every
/// derived comparison field agrees with the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(flatten)]
    registry: InstrumentRegistry,
    current_step: CalibrationStep,
    comparisons_by_pipette: ComparisonTable,
    active_pipette: Instrument,
    active_tip_rack: Labware,
}

impl SessionSnapshot {
    /// Validate `payload` and build a snapshot from it.
    ///
    /// Checks run in a fixed order and the first failing group is returned:
    /// unknown step, duplicate ranks, skipped step, dangling references,
    /// malformed data, then derived-field mismatches. Under
    /// [`ValidationPolicy::Lenient`] mismatches are repaired instead and
    /// returned alongside the snapshot.
    pub fn from_payload(
        payload: SessionPayload,
        policy: ValidationPolicy,
        sequencer: &StepSequencer,
    ) -> Result<(Self, Vec<String>), CalibrationError> {
        let current_step: CalibrationStep = payload.current_step.parse()?;
        let registry =
            InstrumentRegistry::register(payload.instruments.clone(), payload.labware.clone())?;

        if !sequencer.is_enabled(current_step, &registry) {
            return Err(CalibrationError::InconsistentSnapshot(format!(
                "current step {current_step} is skipped for this session"
            )));
        }

        let dangling = dangling_references(&payload);
        if !dangling.is_empty() {
            return Err(CalibrationError::DanglingReference(dangling.join("; ")));
        }

        let mut malformed = malformed_tip_rack_uris(&payload);
        malformed.extend(misplaced_comparisons(&payload));
        if !malformed.is_empty() {
            return Err(CalibrationError::InconsistentSnapshot(malformed.join("; ")));
        }

        let repairs = derived_field_mismatches(&payload);
        if !repairs.is_empty() && policy == ValidationPolicy::Strict {
            return Err(CalibrationError::InconsistentSnapshot(repairs.join("; ")));
        }

        let comparisons_by_pipette = payload
            .comparisons_by_pipette
            .iter()
            .map(|(rank, maps)| {
                let maps = maps
                    .iter()
                    .map(|(kind, map)| (*kind, rebuild_map(map)))
                    .collect();
                (*rank, maps)
            })
            .collect();

        let snapshot = Self {
            registry,
            current_step,
            comparisons_by_pipette,
            active_pipette: payload.active_pipette,
            active_tip_rack: payload.active_tip_rack,
        };
        Ok((snapshot, repairs))
    }

    /// Copy of this snapshot at `step`; every other field is unchanged.
    pub fn with_step(&self, step: CalibrationStep) -> Self {
        Self {
            current_step: step,
            ..self.clone()
        }
    }

    pub fn current_step(&self) -> CalibrationStep {
        self.current_step
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn instruments(&self) -> &[Instrument] {
        self.registry.instruments()
    }

    pub fn labware(&self) -> &[Labware] {
        self.registry.labware()
    }

    pub fn comparisons(&self) -> &ComparisonTable {
        &self.comparisons_by_pipette
    }

    pub fn comparisons_for(
        &self,
        rank: PipetteRank,
        kind: CalibrationType,
    ) -> Option<&ComparisonMap> {
        self.comparisons_by_pipette
            .get(&rank)
            .and_then(|maps| maps.get(&kind))
    }

    pub fn active_pipette(&self) -> &Instrument {
        &self.active_pipette
    }

    pub fn active_tip_rack(&self) -> &Labware {
        &self.active_tip_rack
    }

    /// Aggregate status across every calibration type recorded for `rank`.
    pub fn overall_status(&self, rank: PipetteRank) -> ComparisonStatus {
        let results = self
            .comparisons_by_pipette
            .get(&rank)
            .into_iter()
            .flat_map(|maps| maps.values())
            .flat_map(|map| map.iter().map(|(_, result)| result));
        comparison::aggregate_status(results)
    }

    /// Convert back into the inbound payload layout.
    pub fn to_payload(&self) -> SessionPayload {
        let comparisons_by_pipette = self
            .comparisons_by_pipette
            .iter()
            .map(|(rank, maps)| {
                let maps = maps
                    .iter()
                    .map(|(kind, map)| {
                        let steps = map
                            .iter()
                            .map(|(step, result)| {
                                let comparison = ComparisonPayload {
                                    difference_vector: result.difference(),
                                    threshold_vector: result.threshold(),
                                    exceeds_threshold: result.exceeds_threshold(),
                                };
                                (step, comparison)
                            })
                            .collect();
                        let payload = ComparisonMapPayload {
                            status: map.status(),
                            steps,
                        };
                        (*kind, payload)
                    })
                    .collect();
                (*rank, maps)
            })
            .collect();

        SessionPayload {
            instruments: self.instruments().to_vec(),
            current_step: self.current_step.as_str().to_string(),
            comparisons_by_pipette,
            labware: self.labware().to_vec(),
            active_pipette: self.active_pipette.clone(),
            active_tip_rack: self.active_tip_rack.clone(),
        }
    }
}

/// Re-derive a map from raw differences and thresholds, ignoring reported flags.
fn rebuild_map(map: &ComparisonMapPayload) -> ComparisonMap {
    ComparisonMap::from_results(map.steps.iter().map(|(step, raw)| {
        (
            *step,
            comparison::evaluate(raw.difference_vector, raw.threshold_vector),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vector3;
    use crate::test_support::{comparison, instrument, single_pipette_payload, two_pipette_payload};

    fn build(payload: SessionPayload, policy: ValidationPolicy) -> Result<SessionSnapshot, CalibrationError> {
        SessionSnapshot::from_payload(payload, policy, &StepSequencer::new())
            .map(|(snapshot, _)| snapshot)
    }

    fn corrupt_flag(payload: &mut SessionPayload) {
        payload
            .comparisons_by_pipette
            .get_mut(&PipetteRank::First)
            .and_then(|maps| maps.get_mut(&CalibrationType::TipLength))
            .expect("tip length map")
            .steps
            .insert(
                CalibrationStep::ComparingTip,
                comparison(Vector3::new(0.3, 0.05, 0.05), false),
            );
    }

    #[test]
    fn valid_payload_builds_snapshot() {
        let snapshot =
            build(two_pipette_payload("comparingTip"), ValidationPolicy::Strict).expect("snapshot");
        assert_eq!(snapshot.current_step(), CalibrationStep::ComparingTip);
        assert_eq!(snapshot.instruments().len(), 2);
        assert_eq!(snapshot.active_pipette().rank, PipetteRank::First);
        let map = snapshot
            .comparisons_for(PipetteRank::Second, CalibrationType::TipLength)
            .expect("second tip length");
        assert_eq!(map.status(), ComparisonStatus::InThreshold);
        assert!(
            snapshot
                .comparisons_for(PipetteRank::Second, CalibrationType::Deck)
                .is_none()
        );
    }

    #[test]
    fn unknown_step_is_rejected() {
        let err = build(single_pipette_payload("warmingUp"), ValidationPolicy::Strict)
            .expect_err("unknown step");
        assert_eq!(err, CalibrationError::UnknownStep("warmingUp".to_string()));
    }

    #[test]
    fn duplicate_rank_is_rejected_before_references() {
        let mut payload = two_pipette_payload("inspectingTip");
        payload.instruments[1].rank = PipetteRank::First;
        let err = build(payload, ValidationPolicy::Lenient).expect_err("duplicate");
        assert_eq!(err, CalibrationError::DuplicateRank(PipetteRank::First));
    }

    #[test]
    fn dangling_active_pipette_is_rejected_under_both_policies() {
        for policy in [ValidationPolicy::Strict, ValidationPolicy::Lenient] {
            let mut payload = single_pipette_payload("inspectingTip");
            payload.active_pipette = instrument(PipetteRank::Second);
            let err = build(payload, policy).expect_err("dangling");
            assert!(matches!(err, CalibrationError::DanglingReference(_)));
        }
    }

    #[test]
    fn foreign_calibration_type_entry_is_rejected_under_both_policies() {
        for policy in [ValidationPolicy::Strict, ValidationPolicy::Lenient] {
            let mut payload = single_pipette_payload("comparingPointThree");
            payload
                .comparisons_by_pipette
                .get_mut(&PipetteRank::First)
                .and_then(|maps| maps.get_mut(&CalibrationType::TipLength))
                .expect("tip length map")
                .steps
                .insert(
                    CalibrationStep::ComparingPointThree,
                    comparison(Vector3::new(0.9, 0.0, 0.0), true),
                );
            match build(payload, policy).expect_err("misplaced") {
                CalibrationError::InconsistentSnapshot(message) => {
                    assert!(message.contains("comparingPointThree does not contribute to tipLength"));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn strict_policy_rejects_wrong_exceeds_flag() {
        let mut payload = single_pipette_payload("comparingTip");
        corrupt_flag(&mut payload);
        let err = build(payload, ValidationPolicy::Strict).expect_err("inconsistent");
        match err {
            CalibrationError::InconsistentSnapshot(message) => {
                assert!(message.contains("comparingTip"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn lenient_policy_recomputes_derived_fields() {
        let mut payload = single_pipette_payload("comparingTip");
        corrupt_flag(&mut payload);
        let (snapshot, repairs) =
            SessionSnapshot::from_payload(payload, ValidationPolicy::Lenient, &StepSequencer::new())
                .expect("lenient");
        assert_eq!(repairs.len(), 2);

        let map = snapshot
            .comparisons_for(PipetteRank::First, CalibrationType::TipLength)
            .expect("tip length");
        assert!(
            map.get(CalibrationStep::ComparingTip)
                .expect("tip entry")
                .exceeds_threshold()
        );
        assert_eq!(map.status(), ComparisonStatus::OutsideThreshold);
        assert_eq!(
            snapshot.overall_status(PipetteRank::First),
            ComparisonStatus::OutsideThreshold
        );
    }

    #[test]
    fn overall_status_without_comparisons_is_in_threshold() {
        let mut payload = single_pipette_payload("labwareLoaded");
        payload.comparisons_by_pipette.clear();
        let snapshot = build(payload, ValidationPolicy::Strict).expect("snapshot");
        assert_eq!(
            snapshot.overall_status(PipetteRank::First),
            ComparisonStatus::InThreshold
        );
        assert_eq!(
            snapshot.overall_status(PipetteRank::Second),
            ComparisonStatus::InThreshold
        );
    }

    #[test]
    fn with_step_changes_only_the_step() {
        let snapshot =
            build(two_pipette_payload("comparingTip"), ValidationPolicy::Strict).expect("snapshot");
        let moved = snapshot.with_step(CalibrationStep::ComparingHeight);
        assert_eq!(moved.current_step(), CalibrationStep::ComparingHeight);
        assert_eq!(moved.comparisons(), snapshot.comparisons());
        assert_eq!(moved.registry(), snapshot.registry());
        assert_eq!(moved.active_tip_rack(), snapshot.active_tip_rack());
    }

    #[test]
    fn to_payload_round_trips_through_validation() {
        let payload = two_pipette_payload("comparingHeight");
        let snapshot = build(payload.clone(), ValidationPolicy::Strict).expect("snapshot");
        assert_eq!(snapshot.to_payload(), payload);
    }

    #[test]
    fn snapshot_serializes_in_payload_layout() {
        let snapshot =
            build(single_pipette_payload("comparingTip"), ValidationPolicy::Strict).expect("snapshot");
        let value = serde_json::to_value(&snapshot).expect("json");
        assert_eq!(value["currentStep"], "comparingTip");
        assert_eq!(value["instruments"][0]["rank"], "first");
        assert_eq!(value["activeTipRack"]["isTiprack"], true);
        assert_eq!(
            value["comparisonsByPipette"]["first"]["tipLength"]["status"],
            "IN_THRESHOLD"
        );
    }
}
