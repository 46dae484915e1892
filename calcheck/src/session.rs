//! Session state store: the owned entry point consumed by the UI.
//!
//! A [`SessionStore`] holds the latest validated [`SessionSnapshot`] behind an
//! `Arc`. Every update builds a new snapshot and swaps the pointer, so callers
//! holding an earlier `Arc` keep a consistent, unmodified view. The store is a
//! single writer: updates take `&mut self` and complete before returning.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::comparison::ComparisonMap;
use crate::core::error::CalibrationError;
use crate::core::invariants::unlisted_tip_racks;
use crate::core::payload::SessionPayload;
use crate::core::sequencer::StepSequencer;
use crate::core::snapshot::{SessionSnapshot, ValidationPolicy};
use crate::core::types::{
    CalibrationStep, CalibrationType, ComparisonStatus, Instrument, Labware, PipetteRank,
    SessionParams, TransitionEvent,
};

/// Per-session settings fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub policy: ValidationPolicy,
    pub sequencer: StepSequencer,
    /// Parameters the session was created with; when set, payloads may only
    /// use the tip racks listed here.
    pub params: Option<SessionParams>,
}

/// Owner of the current snapshot of one calibration check session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    options: SessionOptions,
    current: Arc<SessionSnapshot>,
}

impl SessionStore {
    /// Start a session from its first payload.
    pub fn open(
        payload: SessionPayload,
        options: SessionOptions,
    ) -> Result<Self, CalibrationError> {
        let snapshot = admit(payload, &options)?;
        info!(
            step = %snapshot.current_step(),
            instruments = snapshot.instruments().len(),
            policy = ?options.policy,
            "calibration check session opened"
        );
        Ok(Self {
            options,
            current: Arc::new(snapshot),
        })
    }

    /// Replace the current snapshot with one reported by the robot.
    ///
    /// On failure the prior snapshot stays current.
    pub fn apply_snapshot(
        &mut self,
        payload: SessionPayload,
    ) -> Result<Arc<SessionSnapshot>, CalibrationError> {
        self.ensure_active()?;
        let snapshot = admit(payload, &self.options)?;
        debug!(
            from = %self.current.current_step(),
            to = %snapshot.current_step(),
            "snapshot applied"
        );
        self.current = Arc::new(snapshot);
        Ok(Arc::clone(&self.current))
    }

    /// Apply a user transition and return the resulting snapshot.
    pub fn transition(
        &mut self,
        event: TransitionEvent,
    ) -> Result<Arc<SessionSnapshot>, CalibrationError> {
        let from = self.current.current_step();
        let to = self
            .options
            .sequencer
            .next(from, event, self.current.registry())?;
        info!(%from, %to, %event, "session transition");
        self.current = Arc::new(self.current.with_step(to));
        Ok(Arc::clone(&self.current))
    }

    /// Handle to the latest snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn current_step(&self) -> CalibrationStep {
        self.current.current_step()
    }

    pub fn comparisons_for(
        &self,
        rank: PipetteRank,
        kind: CalibrationType,
    ) -> Option<&ComparisonMap> {
        self.current.comparisons_for(rank, kind)
    }

    pub fn active_instrument(&self) -> &Instrument {
        self.current.active_pipette()
    }

    pub fn active_labware(&self) -> &Labware {
        self.current.active_tip_rack()
    }

    pub fn overall_status(&self, rank: PipetteRank) -> ComparisonStatus {
        self.current.overall_status(rank)
    }

    /// Forward path the sequencer follows for this session's instruments.
    pub fn plan(&self) -> Vec<CalibrationStep> {
        self.options.sequencer.plan(self.current.registry())
    }

    pub fn is_terminated(&self) -> bool {
        self.current.current_step().is_terminal()
    }

    pub fn params(&self) -> Option<&SessionParams> {
        self.options.params.as_ref()
    }

    /// Release the session and return its final snapshot.
    pub fn close(self) -> Arc<SessionSnapshot> {
        info!(step = %self.current.current_step(), "calibration check session closed");
        self.current
    }

    fn ensure_active(&self) -> Result<(), CalibrationError> {
        let step = self.current.current_step();
        if step.is_terminal() {
            return Err(CalibrationError::SessionTerminated { step });
        }
        Ok(())
    }
}

fn admit(
    payload: SessionPayload,
    options: &SessionOptions,
) -> Result<SessionSnapshot, CalibrationError> {
    let unlisted = options
        .params
        .as_ref()
        .map(|params| unlisted_tip_racks(&payload, params))
        .unwrap_or_default();
    let (snapshot, repairs) =
        SessionSnapshot::from_payload(payload, options.policy, &options.sequencer).inspect_err(
            |err| debug!(error = %err, "session payload rejected"),
        )?;
    if !unlisted.is_empty() {
        let err = CalibrationError::InconsistentSnapshot(unlisted.join("; "));
        debug!(error = %err, "session payload rejected");
        return Err(err);
    }
    for repair in &repairs {
        warn!(%repair, "repaired derived comparison field");
    }
    Ok(snapshot)
}
