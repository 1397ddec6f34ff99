//! Cast vote records and ballot interpretation.
//!
//! A [`CastVoteRecord`] pairs the immutable ballot data (rankings,
//! provenance, raw row content) with the bookkeeping the tabulator
//! mutates round by round: exhaustion, the current vote recipient, the
//! fractional transfer value and the audit trail.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use rust_decimal::Decimal;

use crate::config::{CandidateRoster, ContestRules, MaxRankings};

/// Rankings found in a CVR contain this label where the source file
/// marked an explicit overvote. It is never a candidate.
pub const EXPLICIT_OVERVOTE_LABEL: &str = "overvote";

/// rank (1 = most preferred) -> candidates marked at that rank. Ranks are
/// sparse; a rank holding more than one candidate is an overvote.
pub type Rankings = BTreeMap<u32, BTreeSet<String>>;

/// What happened to one ballot in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    CountedFor { candidate: String },
    Ignored { reason: String },
    Exhausted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u32,
    pub outcome: VoteOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastVoteRecord {
    file_name: String,
    record_id: String,
    precinct: Option<String>,
    raw_row: Vec<String>,
    rankings: Rankings,

    exhausted: bool,
    current_recipient: Option<String>,
    ftv: Decimal,
    audit: Vec<RoundOutcome>,
}

impl CastVoteRecord {
    pub fn new(
        file_name: String,
        record_id: String,
        precinct: Option<String>,
        rankings: Rankings,
        raw_row: Vec<String>,
    ) -> CastVoteRecord {
        CastVoteRecord {
            file_name,
            record_id,
            precinct,
            raw_row,
            rankings,
            exhausted: false,
            current_recipient: None,
            ftv: Decimal::ONE,
            audit: Vec::new(),
        }
    }

    /// Builds a CVR from raw per-rank cell strings, applying the contest's
    /// interpretation rules:
    ///
    /// - a cell equal to the undervote label is dropped (the rank stays
    ///   empty, which makes it a skipped rank);
    /// - a cell equal to the overvote label becomes the reserved explicit
    ///   overvote marker, and the marker owns the whole rank;
    /// - a blank cell becomes the undeclared write-in bucket when
    ///   `treatBlankAsUndeclaredWriteIn` is set, otherwise it is dropped;
    /// - a cell matching a declared candidate's code or name resolves to
    ///   that candidate's identifier;
    /// - anything else is an undeclared write-in (or dropped, with a
    ///   warning, when no write-in label is configured);
    /// - ranks past the `maxRankingsAllowed` cutoff are not read.
    pub fn from_raw_choices(
        file_name: &str,
        record_id: &str,
        precinct: Option<String>,
        raw_choices: &[Vec<String>],
        rules: &ContestRules,
        roster: &CandidateRoster,
    ) -> CastVoteRecord {
        let max_ranks = match rules.max_rankings_allowed {
            MaxRankings::Limit(n) => n as usize,
            // "max" allows one ranking per declared candidate; Unknown is
            // rejected by validation before any ballot is interpreted.
            _ => roster.num_declared(),
        };

        let mut rankings: Rankings = BTreeMap::new();
        let mut raw_row: Vec<String> = Vec::new();
        for (idx, cells) in raw_choices.iter().take(max_ranks).enumerate() {
            let rank = (idx + 1) as u32;
            let mut marks: BTreeSet<String> = BTreeSet::new();
            let mut explicit_overvote = false;
            for cell in cells {
                let cell = cell.trim();
                raw_row.push(cell.to_string());
                if matches_label(cell, &rules.undervote_label) {
                    continue;
                }
                if matches_label(cell, &rules.overvote_label) {
                    explicit_overvote = true;
                    continue;
                }
                if cell.is_empty() {
                    if rules.treat_blank_as_undeclared_write_in {
                        if let Some(label) = roster.uwi_label() {
                            marks.insert(label.to_string());
                        }
                    }
                    continue;
                }
                match roster.identifier_for(cell) {
                    Some(id) => {
                        marks.insert(id.to_string());
                    }
                    None => match roster.uwi_label() {
                        Some(label) => {
                            marks.insert(label.to_string());
                        }
                        None => {
                            warn!(
                                "ballot {}: no match for choice {:?} at rank {}, dropping it",
                                record_id, cell, rank
                            );
                        }
                    },
                }
            }
            // A rank carrying the explicit marker holds the marker alone,
            // whatever else the source file put next to it.
            if explicit_overvote {
                marks.clear();
                marks.insert(EXPLICIT_OVERVOTE_LABEL.to_string());
            }
            if !marks.is_empty() {
                rankings.insert(rank, marks);
            }
        }

        CastVoteRecord::new(
            file_name.to_string(),
            record_id.to_string(),
            precinct,
            rankings,
            raw_row,
        )
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn precinct(&self) -> Option<&str> {
        self.precinct.as_deref()
    }

    pub fn raw_row(&self) -> &[String] {
        &self.raw_row
    }

    pub fn rankings(&self) -> &Rankings {
        &self.rankings
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn current_recipient(&self) -> Option<&str> {
        self.current_recipient.as_deref()
    }

    /// Fractional transfer value, in [0, 1]. Starts at one and only ever
    /// shrinks, when this ballot's recipient is elected with surplus.
    pub fn fractional_transfer_value(&self) -> Decimal {
        self.ftv
    }

    pub fn audit_trail(&self) -> &[RoundOutcome] {
        &self.audit
    }

    pub(crate) fn clear_current_recipient(&mut self) {
        self.current_recipient = None;
    }

    pub(crate) fn set_current_recipient(&mut self, candidate: &str) {
        self.current_recipient = Some(candidate.to_string());
    }

    pub(crate) fn set_fractional_transfer_value(&mut self, ftv: Decimal) {
        debug_assert!(ftv <= self.ftv);
        self.ftv = ftv;
    }

    pub(crate) fn add_outcome(&mut self, round: u32, outcome: VoteOutcome) {
        self.audit.push(RoundOutcome { round, outcome });
    }

    /// Marks the ballot exhausted. Once exhausted, always exhausted.
    pub(crate) fn exhaust(&mut self, round: u32, reason: &str) {
        self.exhausted = true;
        self.add_outcome(
            round,
            VoteOutcome::Exhausted {
                reason: reason.to_string(),
            },
        );
    }

    /// One-line audit rendering: provenance, then the outcome of every
    /// round this ballot took part in.
    pub fn audit_string(&self) -> String {
        let mut parts = vec![format!("[cvr {} {}]", self.file_name, self.record_id)];
        if let Some(precinct) = &self.precinct {
            parts.push(format!("[precinct {}]", precinct));
        }
        for entry in &self.audit {
            let rendered = match &entry.outcome {
                VoteOutcome::CountedFor { candidate } => format!("counted for {}", candidate),
                VoteOutcome::Ignored { reason } => format!("ignored ({})", reason),
                VoteOutcome::Exhausted { reason } => format!("exhausted ({})", reason),
            };
            parts.push(format!("round {}: {}", entry.round, rendered));
        }
        parts.join(" ")
    }
}

fn matches_label(cell: &str, label: &Option<String>) -> bool {
    match label {
        Some(label) => !label.is_empty() && cell == label,
        None => false,
    }
}
