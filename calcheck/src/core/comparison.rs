//! Threshold evaluation for measured calibration offsets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::{CalibrationStep, ComparisonStatus, Vector3};

/// Outcome of comparing one measured difference against its tolerance.
///
/// `exceeds_threshold` is derived from the two vectors and cannot be set
/// independently; build results with [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    difference_vector: Vector3,
    threshold_vector: Vector3,
    exceeds_threshold: bool,
}

impl ComparisonResult {
    pub fn difference(&self) -> Vector3 {
        self.difference_vector
    }

    pub fn threshold(&self) -> Vector3 {
        self.threshold_vector
    }

    pub fn exceeds_threshold(&self) -> bool {
        self.exceeds_threshold
    }
}

/// True if any axis of `difference` is further from zero than its threshold.
///
/// A difference equal to the threshold is within tolerance.
pub fn exceeds(difference: Vector3, threshold: Vector3) -> bool {
    difference
        .components()
        .iter()
        .zip(threshold.components().iter())
        .any(|(d, t)| d.abs() > *t)
}

/// Compare a measured difference against a per-axis threshold.
pub fn evaluate(difference: Vector3, threshold: Vector3) -> ComparisonResult {
    ComparisonResult {
        difference_vector: difference,
        threshold_vector: threshold,
        exceeds_threshold: exceeds(difference, threshold),
    }
}

/// Fold results into a single status.
///
/// An empty sequence is `InThreshold`: there is no evidence of failure.
pub fn aggregate_status<'a, I>(results: I) -> ComparisonStatus
where
    I: IntoIterator<Item = &'a ComparisonResult>,
{
    if results.into_iter().any(ComparisonResult::exceeds_threshold) {
        ComparisonStatus::OutsideThreshold
    } else {
        ComparisonStatus::InThreshold
    }
}

/// Results for one calibration type, keyed by comparison step.
///
/// Serializes as `{ "status": ..., "<step>": { ... }, ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonMap {
    status: ComparisonStatus,
    #[serde(flatten)]
    steps: BTreeMap<CalibrationStep, ComparisonResult>,
}

impl ComparisonMap {
    /// Build a map whose status is the aggregate of its entries.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = (CalibrationStep, ComparisonResult)>,
    {
        let steps: BTreeMap<_, _> = results.into_iter().collect();
        let status = aggregate_status(steps.values());
        Self { status, steps }
    }

    pub fn status(&self) -> ComparisonStatus {
        self.status
    }

    pub fn get(&self, step: CalibrationStep) -> Option<&ComparisonResult> {
        self.steps.get(&step)
    }

    /// Entries in workflow order.
    pub fn iter(&self) -> impl Iterator<Item = (CalibrationStep, &ComparisonResult)> {
        self.steps.iter().map(|(step, result)| (*step, result))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
