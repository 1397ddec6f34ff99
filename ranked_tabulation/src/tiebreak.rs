//! Tie resolution between candidates with equal tallies.
//!
//! A tie-break selects a single loser (for elimination) or a single
//! winner (for modes that elect at most one candidate per round). Given
//! identical inputs and an identical seed, the selection is identical.

use std::collections::BTreeMap;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::config::{RoundTally, TieBreakMode};
use crate::error::{EngineError, EngineResult};

/// Injected capability for interactive tie-break modes. The engine does
/// not manage I/O; a front-end supplies the prompt.
pub trait TieBreakOracle {
    /// Picks one member of `tied`, or `None` to decline. Anything that is
    /// not a member of `tied` surfaces as `TieBreakUnresolved`.
    fn choose(&mut self, tied: &[String], round: u32, selecting_winner: bool) -> Option<String>;
}

/// Oracle for non-interactive runs; always declines.
pub struct NoOracle;

impl TieBreakOracle for NoOracle {
    fn choose(&mut self, _tied: &[String], _round: u32, _selecting_winner: bool) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TieKind {
    Loser,
    Winner,
}

/// One tie to resolve, with the context the resolution modes draw on.
pub(crate) struct TieBreak<'a> {
    /// Tied candidates in canonical (sorted) order.
    tied: Vec<String>,
    mode: TieBreakMode,
    round: u32,
    tied_tally: Decimal,
    round_tallies: &'a BTreeMap<u32, RoundTally>,
    permutation: &'a [String],
    random_seed: Option<u64>,
}

impl<'a> TieBreak<'a> {
    pub fn new(
        tied: &[String],
        mode: TieBreakMode,
        round: u32,
        tied_tally: Decimal,
        round_tallies: &'a BTreeMap<u32, RoundTally>,
        permutation: &'a [String],
        random_seed: Option<u64>,
    ) -> TieBreak<'a> {
        let mut tied = tied.to_vec();
        tied.sort();
        TieBreak {
            tied,
            mode,
            round,
            tied_tally,
            round_tallies,
            permutation,
            random_seed,
        }
    }

    pub fn select_loser(&self, oracle: &mut dyn TieBreakOracle) -> EngineResult<String> {
        self.select(TieKind::Loser, oracle)
    }

    pub fn select_winner(&self, oracle: &mut dyn TieBreakOracle) -> EngineResult<String> {
        self.select(TieKind::Winner, oracle)
    }

    fn select(&self, kind: TieKind, oracle: &mut dyn TieBreakOracle) -> EngineResult<String> {
        let selection = match self.mode {
            TieBreakMode::Random => self.by_random(&self.tied)?,
            TieBreakMode::Interactive => self.by_oracle(&self.tied, kind, oracle)?,
            TieBreakMode::PreviousRoundCountsThenRandom => {
                match self.by_previous_rounds(kind) {
                    Resolution::Resolved(candidate) => candidate,
                    Resolution::StillTied(narrowed) => self.by_random(&narrowed)?,
                }
            }
            TieBreakMode::PreviousRoundCountsThenInteractive => {
                match self.by_previous_rounds(kind) {
                    Resolution::Resolved(candidate) => candidate,
                    Resolution::StillTied(narrowed) => self.by_oracle(&narrowed, kind, oracle)?,
                }
            }
            TieBreakMode::UseCandidateOrder | TieBreakMode::GeneratePermutation => {
                self.by_permutation(kind)?
            }
            TieBreakMode::Unknown => {
                return Err(EngineError::TabulationInvariant {
                    round: self.round,
                    message: "tie-break requested with an unvalidated mode".to_string(),
                })
            }
        };
        info!(
            "round {}: tie between {:?} at {} resolved to {} ({:?})",
            self.round, self.tied, self.tied_tally, selection, kind
        );
        Ok(selection)
    }

    /// Uniform draw over the canonical ordering, seeded from the contest
    /// seed XORed with the current round so each round draws differently
    /// but reproducibly.
    fn by_random(&self, tied: &[String]) -> EngineResult<String> {
        let seed = self.random_seed.ok_or_else(|| EngineError::TabulationInvariant {
            round: self.round,
            message: "random tie-break without a configured seed".to_string(),
        })?;
        let mut rng = StdRng::seed_from_u64(seed ^ u64::from(self.round));
        let index = rng.gen_range(0..tied.len());
        Ok(tied[index].clone())
    }

    /// Winner ties take the earliest permutation position, loser ties the
    /// latest.
    fn by_permutation(&self, kind: TieKind) -> EngineResult<String> {
        let ordered = self.permutation.iter().filter(|c| self.tied.contains(*c));
        let selection = match kind {
            TieKind::Winner => ordered.clone().next(),
            TieKind::Loser => ordered.clone().last(),
        };
        selection.cloned().ok_or_else(|| EngineError::TabulationInvariant {
            round: self.round,
            message: format!(
                "tied candidates {:?} are missing from the candidate permutation",
                self.tied
            ),
        })
    }

    /// Walks prior rounds from the most recent backwards, keeping only the
    /// tied candidates with the extreme tally of each round. Stops as soon
    /// as a single candidate remains.
    fn by_previous_rounds(&self, kind: TieKind) -> Resolution {
        let mut remaining = self.tied.clone();
        for prior in (1..self.round).rev() {
            let tally = match self.round_tallies.get(&prior) {
                Some(tally) => tally,
                None => continue,
            };
            let counts: Vec<Decimal> = remaining
                .iter()
                .map(|c| tally.get(c).copied().unwrap_or(Decimal::ZERO))
                .collect();
            let extreme = match kind {
                TieKind::Loser => counts.iter().min(),
                TieKind::Winner => counts.iter().max(),
            };
            let extreme = match extreme {
                Some(value) => *value,
                None => break,
            };
            let narrowed: Vec<String> = remaining
                .iter()
                .zip(counts.iter())
                .filter(|(_, count)| **count == extreme)
                .map(|(candidate, _)| candidate.clone())
                .collect();
            if narrowed.len() == 1 {
                return Resolution::Resolved(narrowed.into_iter().next().unwrap_or_default());
            }
            remaining = narrowed;
        }
        Resolution::StillTied(remaining)
    }

    fn by_oracle(
        &self,
        tied: &[String],
        kind: TieKind,
        oracle: &mut dyn TieBreakOracle,
    ) -> EngineResult<String> {
        let choice = oracle.choose(tied, self.round, kind == TieKind::Winner);
        match choice {
            Some(candidate) if tied.contains(&candidate) => Ok(candidate),
            _ => Err(EngineError::TieBreakUnresolved {
                candidates: tied.to_vec(),
            }),
        }
    }
}

enum Resolution {
    Resolved(String),
    StillTied(Vec<String>),
}
