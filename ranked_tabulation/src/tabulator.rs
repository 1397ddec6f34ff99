//! The round-by-round tabulation driver.
//!
//! One `Tabulator` owns the cast vote records for the length of a run.
//! Each round it re-applies every live ballot to the continuing
//! candidates, detects winners against the round threshold, transfers
//! surplus fractionally, or eliminates candidates through the ordered
//! strategy list. All round-indexed structures are append-only: once a
//! round is written it is never edited, so a failed run still leaves a
//! readable audit trail.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rust_decimal::Decimal;

use crate::ballot::{CastVoteRecord, Rankings, VoteOutcome, EXPLICIT_OVERVOTE_LABEL};
use crate::config::{
    CandidateRoster, ContestConfig, ContestRules, MaxSkippedRanks, OvervoteRule, RoundTally,
    TabulationResult, WinnerElectionMode,
};
use crate::decimal::VoteArithmetic;
use crate::error::{EngineError, EngineResult};
use crate::tiebreak::{TieBreak, TieBreakOracle};

/// Transfers into this bucket mean the ballot ran out of continuing
/// candidates. Reserved; no candidate may use it.
pub const EXHAUSTED_TRANSFER_LABEL: &str = "exhausted";

/// The three live states of a candidate during tabulation, plus
/// `Excluded` for candidates that are declared but never eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    Continuing,
    Winner,
    Eliminated,
    Excluded,
}

/// How each re-assigned ballot's fractional value moved between
/// candidates, per round. Keyed by the round in which the votes arrived
/// at their new recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTransfers {
    by_round: BTreeMap<u32, BTreeMap<String, BTreeMap<String, Decimal>>>,
}

impl VoteTransfers {
    pub(crate) fn record(&mut self, round: u32, from: &str, to: &str, amount: Decimal) {
        let slot = self
            .by_round
            .entry(round)
            .or_default()
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(Decimal::ZERO);
        *slot += amount;
    }

    /// Where the votes held by `from` at the end of round `round - 1`
    /// landed in `round`.
    pub fn outflows(&self, round: u32, from: &str) -> Option<&BTreeMap<String, Decimal>> {
        self.by_round.get(&round).and_then(|by_from| by_from.get(from))
    }
}

/// "Inverts" a round tally into tally -> candidates, ascending.
///
/// Candidates inside a bucket keep the order of `candidates_to_include`;
/// callers must not assume any other order, but the order is stable for
/// identical input. Candidates missing from the tally count as zero (this
/// happens when a tie-break restricts an old round's tally to the tied
/// candidates).
pub fn build_tally_to_candidates(
    round_tally: &RoundTally,
    candidates_to_include: &[String],
    should_log: bool,
) -> BTreeMap<Decimal, Vec<String>> {
    let mut tally_to_candidates: BTreeMap<Decimal, Vec<String>> = BTreeMap::new();
    for candidate in candidates_to_include {
        let votes = round_tally.get(candidate).copied().unwrap_or(Decimal::ZERO);
        if should_log {
            debug!("candidate {} has {} vote(s)", candidate, votes);
        }
        tally_to_candidates.entry(votes).or_default().push(candidate.clone());
    }
    tally_to_candidates
}

/// Result of applying an overvote rule to the candidate set at one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OvervoteDecision {
    None,
    Exhaust,
    Ignore,
    SkipToNextRank,
}

/// Candidate status lookups decoupled from the tabulator so the rank walk
/// can run while the ballot list is mutably borrowed.
pub(crate) struct StatusView<'a> {
    winners: &'a BTreeMap<String, u32>,
    eliminated: &'a BTreeMap<String, u32>,
    roster: &'a CandidateRoster,
    known: &'a BTreeSet<String>,
}

impl StatusView<'_> {
    pub fn status(&self, candidate: &str) -> CandidateStatus {
        if self.winners.contains_key(candidate) {
            CandidateStatus::Winner
        } else if self.eliminated.contains_key(candidate) {
            CandidateStatus::Eliminated
        } else if self.roster.is_excluded(candidate) || !self.known.contains(candidate) {
            // reserved markers and anything else outside the roster can
            // never receive votes
            CandidateStatus::Excluded
        } else {
            CandidateStatus::Continuing
        }
    }
}

/// The overvote decision table. The explicit marker may only appear alone
/// at a rank and only under the two rules that know how to handle it;
/// both conditions are enforced upstream and re-checked here.
pub(crate) fn overvote_decision(
    candidate_set: &BTreeSet<String>,
    rule: OvervoteRule,
    statuses: &StatusView,
    round: u32,
) -> EngineResult<OvervoteDecision> {
    if candidate_set.contains(EXPLICIT_OVERVOTE_LABEL) {
        if candidate_set.len() != 1 {
            return Err(EngineError::TabulationInvariant {
                round,
                message: "explicit overvote marker sharing a rank with a candidate".to_string(),
            });
        }
        return match rule {
            OvervoteRule::ExhaustImmediately => Ok(OvervoteDecision::Exhaust),
            OvervoteRule::AlwaysSkipToNextRank => Ok(OvervoteDecision::SkipToNextRank),
            _ => Err(EngineError::TabulationInvariant {
                round,
                message: format!("explicit overvote marker under rule {:?}", rule),
            }),
        };
    }
    if candidate_set.len() <= 1 {
        return Ok(OvervoteDecision::None);
    }
    match rule {
        OvervoteRule::ExhaustImmediately => return Ok(OvervoteDecision::Exhaust),
        OvervoteRule::AlwaysSkipToNextRank => return Ok(OvervoteDecision::SkipToNextRank),
        _ => {}
    }

    let continuing = candidate_set
        .iter()
        .filter(|c| statuses.status(c) == CandidateStatus::Continuing)
        .count();
    if continuing == 0 {
        // nothing eligible here; the walk moves on
        return Ok(OvervoteDecision::None);
    }
    match rule {
        OvervoteRule::ExhaustIfAnyContinuing => Ok(OvervoteDecision::Exhaust),
        OvervoteRule::IgnoreIfAnyContinuing => Ok(OvervoteDecision::Ignore),
        _ if continuing == 1 => Ok(OvervoteDecision::None),
        OvervoteRule::ExhaustIfMultipleContinuing => Ok(OvervoteDecision::Exhaust),
        OvervoteRule::IgnoreIfMultipleContinuing => Ok(OvervoteDecision::Ignore),
        _ => Err(EngineError::TabulationInvariant {
            round,
            message: format!("overvote with multiple continuing candidates under rule {:?}", rule),
        }),
    }
}

/// Outcome of walking one ballot's rankings for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RankWalk {
    Exhaust(&'static str),
    Ignore(&'static str),
    Count(String),
    /// Every rank was skipped; the ballot stays live but counts for
    /// nobody this round.
    NoSelection,
}

fn has_continuing_candidates(rankings: &Rankings, statuses: &StatusView) -> bool {
    rankings.values().any(|candidate_set| {
        candidate_set
            .iter()
            .any(|c| statuses.status(c) == CandidateStatus::Continuing)
    })
}

/// Walks ranks in ascending order and decides what this ballot does this
/// round: count for the unique continuing candidate at the first rank
/// that has one, or exhaust on an overvote, too many skipped ranks, or a
/// repeated candidate.
fn walk_rankings(
    rankings: &Rankings,
    rules: &ContestRules,
    statuses: &StatusView,
    round: u32,
) -> EngineResult<RankWalk> {
    let mut last_rank: u32 = 0;
    let mut seen: BTreeSet<&String> = BTreeSet::new();
    for (&rank, candidate_set) in rankings {
        match overvote_decision(candidate_set, rules.overvote_rule, statuses, round)? {
            OvervoteDecision::Exhaust => return Ok(RankWalk::Exhaust("overvote")),
            OvervoteDecision::Ignore => return Ok(RankWalk::Ignore("overvote")),
            // a skipped overvote rank does not advance last_rank
            OvervoteDecision::SkipToNextRank => continue,
            OvervoteDecision::None => {}
        }

        if let MaxSkippedRanks::Limit(allowed) = rules.max_skipped_ranks_allowed {
            if rank - last_rank > allowed + 1 {
                return Ok(RankWalk::Exhaust("undervote"));
            }
        }

        if rules.exhaust_on_duplicate_candidate && candidate_set.iter().any(|c| seen.contains(c)) {
            return Ok(RankWalk::Exhaust("duplicate candidate"));
        }

        let mut continuing = candidate_set
            .iter()
            .filter(|c| statuses.status(c) == CandidateStatus::Continuing);
        match (continuing.next(), continuing.next()) {
            (Some(candidate), None) => return Ok(RankWalk::Count(candidate.clone())),
            (Some(_), Some(_)) => {
                return Err(EngineError::TabulationInvariant {
                    round,
                    message: format!(
                        "rank {} reached the count step with multiple continuing candidates",
                        rank
                    ),
                });
            }
            (None, _) => {
                seen.extend(candidate_set.iter());
                last_rank = rank;
            }
        }
    }
    Ok(RankWalk::NoSelection)
}

/// Context for one batch-eliminated candidate, kept for the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BatchElimination {
    pub candidate: String,
    pub running_total: Decimal,
    pub next_highest_tally: Decimal,
}

/// Sums tallies low to high; whenever the running total cannot catch the
/// next-highest tally, everybody summed so far is mathematically unable
/// to win and is marked for elimination.
pub(crate) fn run_batch_elimination(
    tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
) -> Vec<BatchElimination> {
    let mut running_total = Decimal::ZERO;
    let mut candidates_seen: Vec<String> = Vec::new();
    let mut candidates_eliminated: BTreeSet<String> = BTreeSet::new();
    let mut eliminations: Vec<BatchElimination> = Vec::new();
    for (current_tally, candidates) in tally_to_candidates {
        if running_total < *current_tally {
            for candidate in &candidates_seen {
                if candidates_eliminated.insert(candidate.clone()) {
                    eliminations.push(BatchElimination {
                        candidate: candidate.clone(),
                        running_total,
                        next_highest_tally: *current_tally,
                    });
                }
            }
        }
        running_total += *current_tally * Decimal::from(candidates.len() as u64);
        candidates_seen.extend(candidates.iter().cloned());
    }
    eliminations
}

/// The four mutually exclusive ways to eliminate candidates, attempted in
/// order; the first to produce a non-empty set wins the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EliminationStrategy {
    DropUwi,
    DropBelowMinimum,
    Batch,
    Regular,
}

const ELIMINATION_STRATEGIES: [EliminationStrategy; 4] = [
    EliminationStrategy::DropUwi,
    EliminationStrategy::DropBelowMinimum,
    EliminationStrategy::Batch,
    EliminationStrategy::Regular,
];

/// A single-use tabulation over one contest configuration and one set of
/// cast vote records.
pub struct Tabulator<'a> {
    rules: &'a ContestRules,
    roster: CandidateRoster,
    known: BTreeSet<String>,
    arithmetic: VoteArithmetic,
    tabulate_by_precinct: bool,

    cvrs: Vec<CastVoteRecord>,
    round_tallies: BTreeMap<u32, RoundTally>,
    thresholds: BTreeMap<u32, Decimal>,
    precinct_round_tallies: BTreeMap<String, BTreeMap<u32, RoundTally>>,
    transfers: VoteTransfers,
    winner_to_round: BTreeMap<String, u32>,
    eliminated_to_round: BTreeMap<String, u32>,
    current_round: u32,
}

impl<'a> Tabulator<'a> {
    pub fn new(config: &'a ContestConfig, cvrs: Vec<CastVoteRecord>) -> Tabulator<'a> {
        let roster = CandidateRoster::from_config(config);
        let known: BTreeSet<String> = roster.tabulation_order().iter().cloned().collect();
        let tabulate_by_precinct = config.output_settings.tabulate_by_precinct;

        let mut precinct_round_tallies: BTreeMap<String, BTreeMap<u32, RoundTally>> =
            BTreeMap::new();
        if tabulate_by_precinct {
            for cvr in &cvrs {
                if let Some(precinct) = cvr.precinct() {
                    precinct_round_tallies.entry(precinct.to_string()).or_default();
                }
            }
        }

        Tabulator {
            rules: &config.rules,
            arithmetic: VoteArithmetic::new(config.rules.decimal_places_for_vote_arithmetic),
            roster,
            known,
            tabulate_by_precinct,
            cvrs,
            round_tallies: BTreeMap::new(),
            thresholds: BTreeMap::new(),
            precinct_round_tallies,
            transfers: VoteTransfers::default(),
            winner_to_round: BTreeMap::new(),
            eliminated_to_round: BTreeMap::new(),
            current_round: 0,
        }
    }

    /// Runs the round loop to completion and returns the result together
    /// with the read-only audit view of the ballots.
    pub fn tabulate(mut self, oracle: &mut dyn TieBreakOracle) -> EngineResult<TabulationResult> {
        info!(
            "beginning tabulation: {} candidate(s), {} cast vote record(s)",
            self.roster.tabulation_order().len(),
            self.cvrs.len()
        );
        let seats = self.rules.number_of_winners;
        let max_rounds = self.roster.tabulation_order().len() as u32 + 1;

        while (self.winner_to_round.len() as u32) < seats {
            self.current_round += 1;
            let round = self.current_round;
            if round > max_rounds {
                return Err(EngineError::TabulationInvariant {
                    round,
                    message: "tabulation did not terminate within the candidate count".to_string(),
                });
            }
            info!("round {}", round);

            let round_tally = self.tally_round()?;
            self.round_tallies.insert(round, round_tally.clone());

            let threshold = self.winning_threshold(&round_tally);
            self.thresholds.insert(round, threshold);
            info!("round {} winning threshold is {}", round, threshold);

            let continuing = self.continuing_candidates();
            let tally_to_candidates = build_tally_to_candidates(&round_tally, &continuing, true);

            let winners =
                self.identify_winners(&tally_to_candidates, threshold, oracle)?;
            if !winners.is_empty() {
                for winner in &winners {
                    self.winner_to_round.insert(winner.clone(), round);
                    info!(
                        "{} won in round {} with {} vote(s)",
                        self.roster.name_for(winner),
                        round,
                        round_tally.get(winner).copied().unwrap_or(Decimal::ZERO)
                    );
                }
                for winner in &winners {
                    if (self.winner_to_round.len() as u32) < seats {
                        self.transfer_surplus(winner, &round_tally, threshold);
                    }
                }
            } else if self.bottoms_up_complete(seats) {
                self.elect_all_continuing(round);
            } else {
                let eliminated = self.run_eliminations(&tally_to_candidates, oracle)?;
                if eliminated.is_empty() {
                    return Err(EngineError::TabulationInvariant {
                        round,
                        message: "no winner was found and no strategy eliminated a candidate"
                            .to_string(),
                    });
                }
                for loser in &eliminated {
                    self.eliminated_to_round.insert(loser.clone(), round);
                }
                if self.bottoms_up_complete(seats) {
                    self.elect_all_continuing(round);
                }
            }
        }

        Ok(TabulationResult {
            winner_to_round: self.winner_to_round,
            eliminated_to_round: self.eliminated_to_round,
            round_tallies: self.round_tallies,
            thresholds: self.thresholds,
            precinct_round_tallies: self.precinct_round_tallies,
            transfers: self.transfers,
            cvrs: self.cvrs,
            num_rounds: self.current_round,
        })
    }

    fn status_view(&self) -> StatusView<'_> {
        StatusView {
            winners: &self.winner_to_round,
            eliminated: &self.eliminated_to_round,
            roster: &self.roster,
            known: &self.known,
        }
    }

    pub fn status(&self, candidate: &str) -> CandidateStatus {
        self.status_view().status(candidate)
    }

    /// Continuing candidates, in tabulation order (write-in bucket last).
    fn continuing_candidates(&self) -> Vec<String> {
        let view = self.status_view();
        self.roster
            .tabulation_order()
            .iter()
            .filter(|c| view.status(c) == CandidateStatus::Continuing)
            .cloned()
            .collect()
    }

    /// Continuing candidates that are allowed to win a seat: the
    /// undeclared write-in bucket never is.
    fn electable_continuing(&self) -> Vec<String> {
        self.continuing_candidates()
            .into_iter()
            .filter(|c| Some(c.as_str()) != self.roster.uwi_label())
            .collect()
    }

    fn bottoms_up_complete(&self, seats: u32) -> bool {
        self.rules.winner_election_mode == WinnerElectionMode::MultiSeatBottomsUp
            && self.electable_continuing().len() as u32 <= seats
    }

    fn elect_all_continuing(&mut self, round: u32) {
        for candidate in self.electable_continuing() {
            info!(
                "{} won in round {}: remaining candidates fill the remaining seats",
                self.roster.name_for(&candidate),
                round
            );
            self.winner_to_round.insert(candidate, round);
        }
    }

    /// Applies every live ballot once (§ vote application): reset the
    /// recipient, pre-scan for exhaustion, walk the ranks, count the FTV
    /// for the selected candidate and mirror it per precinct.
    fn tally_round(&mut self) -> EngineResult<RoundTally> {
        let round = self.current_round;
        let statuses = StatusView {
            winners: &self.winner_to_round,
            eliminated: &self.eliminated_to_round,
            roster: &self.roster,
            known: &self.known,
        };
        let rules = self.rules;

        // every continuing candidate starts the round at zero
        let mut tally: RoundTally = RoundTally::new();
        for candidate in self.roster.tabulation_order() {
            if statuses.status(candidate) == CandidateStatus::Continuing {
                tally.insert(candidate.clone(), Decimal::ZERO);
            }
        }
        let mut precinct_tallies: BTreeMap<String, RoundTally> = self
            .precinct_round_tallies
            .keys()
            .map(|p| (p.clone(), tally.clone()))
            .collect();

        for cvr in self.cvrs.iter_mut() {
            let previous = cvr.current_recipient().map(|s| s.to_string());
            cvr.clear_current_recipient();
            if cvr.is_exhausted() {
                continue;
            }
            if !has_continuing_candidates(cvr.rankings(), &statuses) {
                cvr.exhaust(round, "no continuing candidates");
                if let Some(from) = &previous {
                    self.transfers.record(
                        round,
                        from,
                        EXHAUSTED_TRANSFER_LABEL,
                        cvr.fractional_transfer_value(),
                    );
                }
                continue;
            }

            match walk_rankings(cvr.rankings(), rules, &statuses, round)? {
                RankWalk::Exhaust(reason) => {
                    cvr.exhaust(round, reason);
                    if let Some(from) = &previous {
                        self.transfers.record(
                            round,
                            from,
                            EXHAUSTED_TRANSFER_LABEL,
                            cvr.fractional_transfer_value(),
                        );
                    }
                }
                RankWalk::Ignore(reason) => {
                    cvr.add_outcome(
                        round,
                        VoteOutcome::Ignored {
                            reason: reason.to_string(),
                        },
                    );
                }
                RankWalk::Count(candidate) => {
                    let ftv = cvr.fractional_transfer_value();
                    *tally.entry(candidate.clone()).or_insert(Decimal::ZERO) += ftv;
                    cvr.add_outcome(
                        round,
                        VoteOutcome::CountedFor {
                            candidate: candidate.clone(),
                        },
                    );
                    cvr.set_current_recipient(&candidate);
                    if self.tabulate_by_precinct {
                        if let Some(precinct) = cvr.precinct() {
                            if let Some(precinct_tally) = precinct_tallies.get_mut(precinct) {
                                *precinct_tally
                                    .entry(candidate.clone())
                                    .or_insert(Decimal::ZERO) += ftv;
                            }
                        }
                    }
                    match &previous {
                        Some(from) if *from != candidate => {
                            self.transfers.record(round, from, &candidate, ftv);
                        }
                        _ => {}
                    }
                }
                RankWalk::NoSelection => {}
            }
        }

        if self.tabulate_by_precinct {
            for (precinct, precinct_tally) in precinct_tallies {
                if let Some(rounds) = self.precinct_round_tallies.get_mut(&precinct) {
                    rounds.insert(round, precinct_tally);
                }
            }
        }

        Ok(tally)
    }

    /// Droop-style quota: total continuing votes divided by one more than
    /// the seats still to fill (the Hare variant divides by the seats
    /// themselves). Truncated at the configured scale.
    fn winning_threshold(&self, round_tally: &RoundTally) -> Decimal {
        let total = round_tally
            .values()
            .copied()
            .fold(Decimal::ZERO, |acc, votes| acc + votes);
        let seats_remaining = self.rules.number_of_winners - self.winner_to_round.len() as u32;
        let divisor = if self.rules.hare_quota {
            seats_remaining
        } else {
            seats_remaining + 1
        };
        self.arithmetic.divide(total, Decimal::from(divisor))
    }

    fn tie_break<'t>(
        &'t self,
        tied: &[String],
        tied_tally: Decimal,
    ) -> TieBreak<'t> {
        TieBreak::new(
            tied,
            self.rules.tiebreak_mode,
            self.current_round,
            tied_tally,
            &self.round_tallies,
            self.roster.permutation(),
            self.rules.random_seed,
        )
    }

    /// Winner detection for the round. A candidate wins by strictly
    /// exceeding the threshold; the write-in bucket never wins. The
    /// continue-until-two mode instead waits for the field to narrow to
    /// two and takes the higher tally, threshold not consulted.
    fn identify_winners(
        &self,
        tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
        threshold: Decimal,
        oracle: &mut dyn TieBreakOracle,
    ) -> EngineResult<Vec<String>> {
        match self.rules.winner_election_mode {
            WinnerElectionMode::MultiSeatBottomsUp => Ok(Vec::new()),
            WinnerElectionMode::SingleSeatContinueUntilTwoCandidatesRemain => {
                if self.electable_continuing().len() > 2 {
                    return Ok(Vec::new());
                }
                for (votes, candidates) in tally_to_candidates.iter().rev() {
                    let contenders: Vec<String> = candidates
                        .iter()
                        .filter(|c| Some(c.as_str()) != self.roster.uwi_label())
                        .cloned()
                        .collect();
                    if contenders.is_empty() {
                        continue;
                    }
                    let winner = if contenders.len() > 1 {
                        self.tie_break(&contenders, *votes).select_winner(oracle)?
                    } else {
                        contenders.into_iter().next().unwrap_or_default()
                    };
                    return Ok(vec![winner]);
                }
                Ok(Vec::new())
            }
            WinnerElectionMode::Standard
            | WinnerElectionMode::MultiSeatAllowOnlyOneWinnerPerRound
            | WinnerElectionMode::MultiSeatSequentialWinnerTakesAll => {
                let mut selected: Vec<String> = Vec::new();
                for (votes, candidates) in tally_to_candidates {
                    if *votes > threshold {
                        for candidate in candidates {
                            if Some(candidate.as_str()) != self.roster.uwi_label() {
                                selected.push(candidate.clone());
                            }
                        }
                    }
                }
                if self.rules.winner_election_mode
                    == WinnerElectionMode::MultiSeatAllowOnlyOneWinnerPerRound
                    && selected.len() > 1
                {
                    selected = vec![self.highest_tally_winner(tally_to_candidates, oracle)?];
                }
                Ok(selected)
            }
            WinnerElectionMode::Unknown => Err(EngineError::TabulationInvariant {
                round: self.current_round,
                message: "winner detection with an unvalidated election mode".to_string(),
            }),
        }
    }

    /// Highest-tally candidate for modes that elect one winner per round;
    /// a tie at the top is broken as a winner tie.
    fn highest_tally_winner(
        &self,
        tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
        oracle: &mut dyn TieBreakOracle,
    ) -> EngineResult<String> {
        for (votes, candidates) in tally_to_candidates.iter().rev() {
            let contenders: Vec<String> = candidates
                .iter()
                .filter(|c| Some(c.as_str()) != self.roster.uwi_label())
                .cloned()
                .collect();
            if contenders.is_empty() {
                continue;
            }
            if contenders.len() > 1 {
                return self.tie_break(&contenders, *votes).select_winner(oracle);
            }
            return Ok(contenders.into_iter().next().unwrap_or_default());
        }
        Err(EngineError::TabulationInvariant {
            round: self.current_round,
            message: "no electable candidate while selecting the round winner".to_string(),
        })
    }

    /// Fractional surplus transfer: every ballot currently held by the
    /// winner keeps only `surplus / winner_votes` of its transfer value.
    fn transfer_surplus(&mut self, winner: &str, round_tally: &RoundTally, threshold: Decimal) {
        let candidate_votes = round_tally.get(winner).copied().unwrap_or(Decimal::ZERO);
        let surplus = candidate_votes - threshold;
        debug_assert!(surplus > Decimal::ZERO);
        let fraction = self.arithmetic.divide(surplus, candidate_votes);
        info!(
            "transferring the surplus of {}: {} of {} vote(s), fraction {}",
            self.roster.name_for(winner),
            surplus,
            candidate_votes,
            fraction
        );
        for cvr in self.cvrs.iter_mut() {
            if cvr.current_recipient() == Some(winner) {
                let reduced =
                    self.arithmetic.multiply(cvr.fractional_transfer_value(), fraction);
                cvr.set_fractional_transfer_value(reduced);
            }
        }
    }

    fn run_eliminations(
        &self,
        tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
        oracle: &mut dyn TieBreakOracle,
    ) -> EngineResult<Vec<String>> {
        for strategy in ELIMINATION_STRATEGIES {
            let eliminated = match strategy {
                EliminationStrategy::DropUwi => self.drop_uwi(),
                EliminationStrategy::DropBelowMinimum => {
                    self.drop_below_minimum(tally_to_candidates)
                }
                EliminationStrategy::Batch => self.batch_eliminate(tally_to_candidates),
                EliminationStrategy::Regular => {
                    self.regular_eliminate(tally_to_candidates, oracle)?
                }
            };
            if !eliminated.is_empty() {
                return Ok(eliminated);
            }
        }
        Ok(Vec::new())
    }

    /// Round 1 only: a write-in bucket that received votes is dropped
    /// before anything else.
    fn drop_uwi(&self) -> Vec<String> {
        if self.current_round != 1 {
            return Vec::new();
        }
        let uwi = match self.roster.uwi_label() {
            Some(label) => label,
            None => return Vec::new(),
        };
        let votes = self
            .round_tallies
            .get(&1)
            .and_then(|tally| tally.get(uwi))
            .copied()
            .unwrap_or(Decimal::ZERO);
        if votes > Decimal::ZERO {
            info!(
                "eliminated {} in round 1: it aggregates undeclared write-ins and had {} vote(s)",
                uwi, votes
            );
            vec![uwi.to_string()]
        } else {
            Vec::new()
        }
    }

    fn drop_below_minimum(
        &self,
        tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
    ) -> Vec<String> {
        if self.rules.minimum_vote_threshold == 0 {
            return Vec::new();
        }
        let minimum = Decimal::from(self.rules.minimum_vote_threshold);
        let mut eliminated: Vec<String> = Vec::new();
        for (votes, candidates) in tally_to_candidates {
            if *votes >= minimum {
                break;
            }
            for candidate in candidates {
                info!(
                    "eliminated {} in round {}: {} vote(s) is below the minimum threshold of {}",
                    self.roster.name_for(candidate),
                    self.current_round,
                    votes,
                    minimum
                );
                eliminated.push(candidate.clone());
            }
        }
        eliminated
    }

    /// Batch elimination never removes a single candidate: one loser is
    /// left to the regular path so its tie-breaking applies.
    fn batch_eliminate(
        &self,
        tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
    ) -> Vec<String> {
        if !self.rules.batch_elimination {
            return Vec::new();
        }
        let eliminations = run_batch_elimination(tally_to_candidates);
        if eliminations.len() <= 1 {
            return Vec::new();
        }
        eliminations
            .into_iter()
            .map(|elimination| {
                info!(
                    "batch-eliminated {} in round {}: running total {} vote(s), next-highest count {} vote(s)",
                    self.roster.name_for(&elimination.candidate),
                    self.current_round,
                    elimination.running_total,
                    elimination.next_highest_tally
                );
                elimination.candidate
            })
            .collect()
    }

    fn regular_eliminate(
        &self,
        tally_to_candidates: &BTreeMap<Decimal, Vec<String>>,
        oracle: &mut dyn TieBreakOracle,
    ) -> EngineResult<Vec<String>> {
        let (min_votes, last_place) = match tally_to_candidates.iter().next() {
            Some((votes, candidates)) => (*votes, candidates),
            None => return Ok(Vec::new()),
        };
        let loser = if last_place.len() > 1 {
            let loser = self.tie_break(last_place, min_votes).select_loser(oracle)?;
            info!(
                "{} lost a tie-break in round {} at {} vote(s)",
                self.roster.name_for(&loser),
                self.current_round,
                min_votes
            );
            loser
        } else {
            let loser = last_place[0].clone();
            info!(
                "{} was eliminated in round {} with {} vote(s)",
                self.roster.name_for(&loser),
                self.current_round,
                min_votes
            );
            loser
        };
        Ok(vec![loser])
    }
}
