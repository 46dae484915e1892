//! Plain-text results summary rendered from a snapshot.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::snapshot::SessionSnapshot;
use crate::core::types::{CalibrationType, Instrument, SessionParams};

const SUMMARY_TEMPLATE: &str = include_str!("templates/summary.txt");

#[derive(Debug, Clone, Serialize)]
struct PipetteContext {
    rank: String,
    name: String,
    model: String,
    mount: String,
    serial: String,
    tip_rack: String,
    status: &'static str,
    checks: Vec<CheckContext>,
}

#[derive(Debug, Clone, Serialize)]
struct CheckContext {
    kind: &'static str,
    status: &'static str,
    steps: Vec<EntryContext>,
}

#[derive(Debug, Clone, Serialize)]
struct EntryContext {
    name: &'static str,
    difference: String,
    threshold: String,
    exceeds: bool,
}

impl PipetteContext {
    fn from_instrument(snapshot: &SessionSnapshot, instrument: &Instrument) -> Self {
        let checks = CalibrationType::ALL
            .into_iter()
            .filter_map(|kind| {
                let map = snapshot
                    .comparisons_for(instrument.rank, kind)
                    .filter(|map| !map.is_empty())?;
                let steps = map
                    .iter()
                    .map(|(step, result)| EntryContext {
                        name: step.as_str(),
                        difference: result.difference().to_string(),
                        threshold: result.threshold().to_string(),
                        exceeds: result.exceeds_threshold(),
                    })
                    .collect();
                Some(CheckContext {
                    kind: kind.as_str(),
                    status: map.status().label(),
                    steps,
                })
            })
            .collect();

        Self {
            rank: instrument.rank.to_string(),
            name: instrument.name.clone(),
            model: instrument.model.clone(),
            mount: instrument.mount.to_string(),
            serial: instrument.serial.clone(),
            tip_rack: instrument.tip_rack_display.clone(),
            status: snapshot.overall_status(instrument.rank).label(),
            checks,
        }
    }
}

/// Render the results summary for every registered pipette, in rank order.
///
/// `params`, when known, adds the session's calibration block and tip racks.
pub fn render_summary(
    snapshot: &SessionSnapshot,
    params: Option<&SessionParams>,
) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("summary", SUMMARY_TEMPLATE)?;

    let registry = snapshot.registry();
    let pipettes = registry
        .ranks()
        .into_iter()
        .map(|rank| {
            registry
                .get_active(rank)
                .map(|instrument| PipetteContext::from_instrument(snapshot, instrument))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let session = params.map(|params| {
        context! {
            calibration_block => if params.has_calibration_block { "yes" } else { "no" },
            tip_racks => params
                .tip_racks
                .iter()
                .map(|rack| format!("{} (slot {})", rack.uri(), rack.slot))
                .collect::<Vec<_>>(),
        }
    });
    let rendered = env.get_template("summary")?.render(context! {
        step => snapshot.current_step().as_str(),
        session => session,
        pipettes => pipettes,
    })?;
    Ok(rendered)
}
