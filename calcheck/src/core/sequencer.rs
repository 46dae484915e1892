//! Step ordering and legal transitions for a calibration check.
//!
//! The forward path is the declaration order of [`CalibrationStep`]. Each
//! comparison step carries a [`StepGate`] deciding whether the sequencer
//! visits it for the instruments present; every other step is always
//! visited. Skipping never moves backwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::CalibrationError;
use crate::core::registry::InstrumentRegistry;
use crate::core::types::{CalibrationStep, PipetteRank, TransitionEvent};

/// Rule deciding whether a comparison step is part of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepGate {
    /// Always visited.
    #[default]
    Always,
    /// Visited only when a `first` rank instrument is registered.
    First,
    /// Visited only when a `second` rank instrument is registered.
    Second,
    /// Never visited.
    Disabled,
}

impl StepGate {
    fn admits(self, registry: &InstrumentRegistry) -> bool {
        match self {
            StepGate::Always => true,
            StepGate::First => registry.contains_rank(PipetteRank::First),
            StepGate::Second => registry.contains_rank(PipetteRank::Second),
            StepGate::Disabled => false,
        }
    }
}

/// Transition table with per-step skip gates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepSequencer {
    gates: BTreeMap<CalibrationStep, StepGate>,
}

impl StepSequencer {
    /// Sequencer that visits every step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gate for a comparison step.
    ///
    /// Only `comparing*` steps can be gated.
    pub fn with_gate(
        mut self,
        step: CalibrationStep,
        gate: StepGate,
    ) -> Result<Self, CalibrationError> {
        if !step.is_comparison() {
            return Err(CalibrationError::UngatableStep(step));
        }
        self.gates.insert(step, gate);
        Ok(self)
    }

    pub fn gate(&self, step: CalibrationStep) -> StepGate {
        self.gates.get(&step).copied().unwrap_or_default()
    }

    /// True if the sequencer visits `step` for the registered instruments.
    pub fn is_enabled(&self, step: CalibrationStep, registry: &InstrumentRegistry) -> bool {
        if step == CalibrationStep::SessionExited {
            return true;
        }
        self.gate(step).admits(registry)
    }

    /// The full forward path from `sessionStarted` to `checkComplete`.
    pub fn plan(&self, registry: &InstrumentRegistry) -> Vec<CalibrationStep> {
        CalibrationStep::ALL
            .into_iter()
            .filter(|step| *step != CalibrationStep::SessionExited)
            .filter(|step| self.is_enabled(*step, registry))
            .collect()
    }

    /// Step reached by applying `event` at `current`.
    ///
    /// Terminal steps reject every event with `SessionTerminated`.
    pub fn next(
        &self,
        current: CalibrationStep,
        event: TransitionEvent,
        registry: &InstrumentRegistry,
    ) -> Result<CalibrationStep, CalibrationError> {
        if current.is_terminal() {
            return Err(CalibrationError::SessionTerminated { step: current });
        }

        match event {
            TransitionEvent::Exit => Ok(CalibrationStep::SessionExited),
            TransitionEvent::JumpToResults if current < CalibrationStep::ResultsSummary => {
                Ok(CalibrationStep::ResultsSummary)
            }
            TransitionEvent::JumpToResults => Err(CalibrationError::InvalidTransition {
                from: current,
                event,
            }),
            TransitionEvent::Advance => CalibrationStep::ALL[current.index() + 1..]
                .iter()
                .copied()
                .filter(|step| *step != CalibrationStep::SessionExited)
                .find(|step| self.is_enabled(*step, registry))
                .ok_or(CalibrationError::InvalidTransition {
                    from: current,
                    event,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::instrument;

    fn two_pipettes() -> InstrumentRegistry {
        InstrumentRegistry::register(
            vec![
                instrument(PipetteRank::First),
                instrument(PipetteRank::Second),
            ],
            Vec::new(),
        )
        .expect("register")
    }

    fn single_pipette() -> InstrumentRegistry {
        InstrumentRegistry::register(vec![instrument(PipetteRank::First)], Vec::new())
            .expect("register")
    }

    fn walk(sequencer: &StepSequencer, registry: &InstrumentRegistry) -> Vec<CalibrationStep> {
        let mut current = CalibrationStep::SessionStarted;
        let mut visited = vec![current];
        while !current.is_terminal() {
            current = sequencer
                .next(current, TransitionEvent::Advance, registry)
                .expect("advance");
            visited.push(current);
        }
        visited
    }

    #[test]
    fn advance_yields_unique_successor() {
        let sequencer = StepSequencer::new();
        let registry = two_pipettes();
        let forward = &CalibrationStep::ALL[..=CalibrationStep::CheckComplete.index()];
        for pair in forward.windows(2) {
            let next = sequencer
                .next(pair[0], TransitionEvent::Advance, &registry)
                .expect("advance");
            assert_eq!(next, pair[1]);
        }
    }

    #[test]
    fn returning_tip_advances_to_results_summary() {
        let next = StepSequencer::new()
            .next(
                CalibrationStep::ReturningTip,
                TransitionEvent::Advance,
                &two_pipettes(),
            )
            .expect("advance");
        assert_eq!(next, CalibrationStep::ResultsSummary);
    }

    #[test]
    fn exit_is_legal_from_every_non_terminal_step() {
        let sequencer = StepSequencer::new();
        let registry = two_pipettes();
        for step in CalibrationStep::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert_eq!(
                sequencer.next(step, TransitionEvent::Exit, &registry),
                Ok(CalibrationStep::SessionExited)
            );
        }
    }

    #[test]
    fn terminal_steps_reject_every_event() {
        let sequencer = StepSequencer::new();
        let registry = two_pipettes();
        for step in [CalibrationStep::CheckComplete, CalibrationStep::SessionExited] {
            for event in [
                TransitionEvent::Advance,
                TransitionEvent::Exit,
                TransitionEvent::JumpToResults,
            ] {
                assert_eq!(
                    sequencer.next(step, event, &registry),
                    Err(CalibrationError::SessionTerminated { step })
                );
            }
        }
    }

    #[test]
    fn jump_to_results_only_before_results_summary() {
        let sequencer = StepSequencer::new();
        let registry = two_pipettes();
        assert_eq!(
            sequencer.next(
                CalibrationStep::ComparingTip,
                TransitionEvent::JumpToResults,
                &registry
            ),
            Ok(CalibrationStep::ResultsSummary)
        );
        assert_eq!(
            sequencer.next(
                CalibrationStep::ResultsSummary,
                TransitionEvent::JumpToResults,
                &registry
            ),
            Err(CalibrationError::InvalidTransition {
                from: CalibrationStep::ResultsSummary,
                event: TransitionEvent::JumpToResults,
            })
        );
    }

    #[test]
    fn advance_never_reaches_session_exited() {
        let visited = walk(&StepSequencer::new(), &two_pipettes());
        assert_eq!(visited.last(), Some(&CalibrationStep::CheckComplete));
        assert!(!visited.contains(&CalibrationStep::SessionExited));
    }

    #[test]
    fn single_pipette_session_skips_second_rank_steps() {
        let sequencer = StepSequencer::new()
            .with_gate(CalibrationStep::ComparingPointTwo, StepGate::Second)
            .expect("gate")
            .with_gate(CalibrationStep::ComparingPointThree, StepGate::Second)
            .expect("gate");

        let visited = walk(&sequencer, &single_pipette());
        assert!(!visited.contains(&CalibrationStep::ComparingPointTwo));
        assert!(!visited.contains(&CalibrationStep::ComparingPointThree));
        let idx = visited
            .iter()
            .position(|step| *step == CalibrationStep::ComparingPointOne)
            .expect("point one visited");
        assert_eq!(visited[idx + 1], CalibrationStep::ReturningTip);
        assert!(visited.contains(&CalibrationStep::ResultsSummary));
        assert!(visited.windows(2).all(|pair| pair[0] < pair[1]));

        let both = walk(&sequencer, &two_pipettes());
        assert!(both.contains(&CalibrationStep::ComparingPointThree));
    }

    #[test]
    fn disabled_gate_skips_step_for_every_session() {
        let sequencer = StepSequencer::new()
            .with_gate(CalibrationStep::ComparingPointThree, StepGate::Disabled)
            .expect("gate");
        let registry = two_pipettes();
        assert_eq!(
            sequencer.next(
                CalibrationStep::ComparingPointTwo,
                TransitionEvent::Advance,
                &registry
            ),
            Ok(CalibrationStep::ReturningTip)
        );
        assert!(!sequencer.is_enabled(CalibrationStep::ComparingPointThree, &registry));
    }

    #[test]
    fn plan_lists_enabled_forward_path() {
        let sequencer = StepSequencer::new()
            .with_gate(CalibrationStep::ComparingHeight, StepGate::Second)
            .expect("gate");
        let plan = sequencer.plan(&single_pipette());
        assert_eq!(plan.first(), Some(&CalibrationStep::SessionStarted));
        assert_eq!(plan.last(), Some(&CalibrationStep::CheckComplete));
        assert_eq!(plan.len(), 12);
        assert!(!plan.contains(&CalibrationStep::ComparingHeight));
    }

    #[test]
    fn non_comparison_steps_cannot_be_gated() {
        let err = StepSequencer::new()
            .with_gate(CalibrationStep::ReturningTip, StepGate::Disabled)
            .expect_err("ungatable");
        assert_eq!(
            err,
            CalibrationError::UngatableStep(CalibrationStep::ReturningTip)
        );
    }
}
