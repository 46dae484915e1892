//! Rank-indexed instrument and labware lookup for one session.

use serde::Serialize;

use crate::core::error::CalibrationError;
use crate::core::types::{Instrument, Labware, PipetteRank};

/// Instruments and labware registered for a session.
///
/// Built once per snapshot and read-only afterwards. Serializes as the
/// `instruments` and `labware` fields of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
    labware: Vec<Labware>,
}

impl InstrumentRegistry {
    /// Register the full instrument and labware set.
    ///
    /// Fails with `DuplicateRank` if two instruments share a rank.
    pub fn register(
        instruments: Vec<Instrument>,
        labware: Vec<Labware>,
    ) -> Result<Self, CalibrationError> {
        for (idx, instrument) in instruments.iter().enumerate() {
            if instruments[..idx]
                .iter()
                .any(|earlier| earlier.rank == instrument.rank)
            {
                return Err(CalibrationError::DuplicateRank(instrument.rank));
            }
        }
        Ok(Self {
            instruments,
            labware,
        })
    }

    /// Instrument registered under `rank`.
    pub fn get_active(&self, rank: PipetteRank) -> Result<&Instrument, CalibrationError> {
        self.instruments
            .iter()
            .find(|instrument| instrument.rank == rank)
            .ok_or(CalibrationError::UnknownRank(rank))
    }

    pub fn contains_rank(&self, rank: PipetteRank) -> bool {
        self.instruments.iter().any(|instrument| instrument.rank == rank)
    }

    /// Registered ranks in `first`, `second` order.
    pub fn ranks(&self) -> Vec<PipetteRank> {
        PipetteRank::ALL
            .into_iter()
            .filter(|rank| self.contains_rank(*rank))
            .collect()
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn labware(&self) -> &[Labware] {
        &self.labware
    }

    /// Tip rack the instrument of `rank` draws tips from, matched by URI.
    ///
    /// `Ok(None)` means the instrument exists but its tip rack is not on the deck.
    pub fn tip_rack_for(&self, rank: PipetteRank) -> Result<Option<&Labware>, CalibrationError> {
        let instrument = self.get_active(rank)?;
        Ok(self
            .labware
            .iter()
            .find(|labware| labware.is_tiprack && labware.uri() == instrument.tip_rack_uri))
    }
}
