//! Errors raised by the calibration check model.

use thiserror::Error;

use crate::core::types::{CalibrationStep, PipetteRank, TransitionEvent};

/// Local, synchronous failures of the session model.
///
/// None of these are retried by the model itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("cannot {event} from step {from}")]
    InvalidTransition {
        from: CalibrationStep,
        event: TransitionEvent,
    },

    #[error("session already ended at step {step}")]
    SessionTerminated { step: CalibrationStep },

    #[error("duplicate instrument rank '{0}'")]
    DuplicateRank(PipetteRank),

    #[error("no instrument registered for rank '{0}'")]
    UnknownRank(PipetteRank),

    #[error("inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    #[error("dangling reference: {0}")]
    DanglingReference(String),

    #[error("unknown calibration step '{0}'")]
    UnknownStep(String),

    #[error("unknown transition event '{0}'")]
    UnknownEvent(String),

    #[error("step {0} is not a comparison step and cannot be gated")]
    UngatableStep(CalibrationStep),
}

impl CalibrationError {
    /// True when the error ends the session instance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CalibrationError::SessionTerminated { .. })
    }
}
