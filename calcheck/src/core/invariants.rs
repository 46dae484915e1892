//! Semantic invariants of session payloads not expressible via JSON Schema.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::comparison::{self, exceeds};
use crate::core::payload::{ComparisonPayload, SessionPayload};
use crate::core::registry::InstrumentRegistry;
use crate::core::sequencer::StepSequencer;
use crate::core::types::{CalibrationStep, CalibrationType, ComparisonStatus, SessionParams};

static TIP_RACK_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+/\d+$").expect("tip rack uri pattern")
});

/// Check every payload invariant and report all violations:
/// - `currentStep` is a known step the sequencer visits for these instruments
/// - No two instruments share a rank
/// - Active pipette, active tip rack and comparison ranks reference registered items
/// - Tip rack URIs have the `namespace/loadName/version` shape
/// - Comparison maps only hold comparison steps of their own calibration type
/// - `exceedsThreshold` and map `status` match their derived values
pub fn validate_invariants(payload: &SessionPayload, sequencer: &StepSequencer) -> Vec<String> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for instrument in &payload.instruments {
        if !seen.insert(instrument.rank) {
            errors.push(format!("duplicate instrument rank '{}'", instrument.rank));
        }
    }

    match payload.current_step.parse::<CalibrationStep>() {
        Ok(step) => {
            let registry =
                InstrumentRegistry::register(payload.instruments.clone(), payload.labware.clone());
            if let Ok(registry) = registry {
                if !sequencer.is_enabled(step, &registry) {
                    errors.push(format!("current step {step} is skipped for this session"));
                }
            }
        }
        Err(err) => errors.push(err.to_string()),
    }

    errors.extend(dangling_references(payload));
    errors.extend(malformed_tip_rack_uris(payload));
    errors.extend(misplaced_comparisons(payload));
    errors.extend(derived_field_mismatches(payload));
    errors
}

/// References from the payload to instruments or labware it does not list.
pub fn dangling_references(payload: &SessionPayload) -> Vec<String> {
    let mut errors = Vec::new();

    let active = &payload.active_pipette;
    match payload
        .instruments
        .iter()
        .find(|instrument| instrument.rank == active.rank)
    {
        None => errors.push(format!(
            "activePipette rank '{}' has no registered instrument",
            active.rank
        )),
        Some(registered) if registered != active => errors.push(format!(
            "activePipette '{}' does not match the registered '{}' instrument",
            active.serial, active.rank
        )),
        Some(_) => {}
    }

    if !payload.labware.contains(&payload.active_tip_rack) {
        errors.push(format!(
            "activeTipRack '{}' in slot {} is not in labware",
            payload.active_tip_rack.uri(),
            payload.active_tip_rack.slot
        ));
    }

    for rank in payload.comparisons_by_pipette.keys() {
        if !payload
            .instruments
            .iter()
            .any(|instrument| instrument.rank == *rank)
        {
            errors.push(format!(
                "comparisons reference unregistered rank '{}'",
                rank
            ));
        }
    }

    errors
}

pub fn malformed_tip_rack_uris(payload: &SessionPayload) -> Vec<String> {
    payload
        .instruments
        .iter()
        .filter(|instrument| !TIP_RACK_URI_RE.is_match(&instrument.tip_rack_uri))
        .map(|instrument| {
            format!(
                "{} instrument tipRackUri '{}' is not namespace/loadName/version",
                instrument.rank, instrument.tip_rack_uri
            )
        })
        .collect()
}

/// Tip racks the payload uses that the session was not created with.
pub fn unlisted_tip_racks(payload: &SessionPayload, params: &SessionParams) -> Vec<String> {
    let mut errors: Vec<String> = payload
        .instruments
        .iter()
        .filter(|instrument| {
            !params
                .tip_racks
                .iter()
                .any(|rack| rack.uri() == instrument.tip_rack_uri)
        })
        .map(|instrument| {
            format!(
                "{} instrument tip rack '{}' is not a session tip rack",
                instrument.rank, instrument.tip_rack_uri
            )
        })
        .collect();

    if !params.tip_racks.contains(&payload.active_tip_rack) {
        errors.push(format!(
            "activeTipRack '{}' in slot {} is not a session tip rack",
            payload.active_tip_rack.uri(),
            payload.active_tip_rack.slot
        ));
    }
    errors
}

/// Comparison entries filed under a step that does not compare anything, or
/// under a calibration type the step does not contribute to.
pub fn misplaced_comparisons(payload: &SessionPayload) -> Vec<String> {
    payload
        .comparisons()
        .filter_map(|(rank, kind, step, _)| {
            if !step.is_comparison() {
                Some(format!("{rank}/{kind}: {step} is not a comparison step"))
            } else if !CalibrationType::for_step(step).contains(&kind) {
                Some(format!("{rank}/{kind}: {step} does not contribute to {kind}"))
            } else {
                None
            }
        })
        .collect()
}

/// Derived fields whose reported value disagrees with the evaluator.
pub fn derived_field_mismatches(payload: &SessionPayload) -> Vec<String> {
    let mut errors = Vec::new();

    for (rank, kind, step, comparison) in payload.comparisons() {
        let derived = exceeds(comparison.difference_vector, comparison.threshold_vector);
        if derived != comparison.exceeds_threshold {
            errors.push(format!(
                "{rank}/{kind}/{step}: exceedsThreshold is {} but derived value is {derived}",
                comparison.exceeds_threshold
            ));
        }
    }

    for (rank, maps) in &payload.comparisons_by_pipette {
        for (kind, map) in maps {
            let derived = derived_status(map.steps.values());
            if derived != map.status {
                errors.push(format!(
                    "{rank}/{kind}: status is {} but derived status is {derived}",
                    map.status
                ));
            }
        }
    }

    errors
}

fn derived_status<'a, I>(comparisons: I) -> ComparisonStatus
where
    I: IntoIterator<Item = &'a ComparisonPayload>,
{
    let results: Vec<_> = comparisons
        .into_iter()
        .map(|c| comparison::evaluate(c.difference_vector, c.threshold_vector))
        .collect();
    comparison::aggregate_status(&results)
}
