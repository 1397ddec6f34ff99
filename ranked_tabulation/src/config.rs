//! Contest configuration value objects and tabulation results.
//!
//! The configuration follows the option surface of the BrightSpots RCV
//! configuration files. All enum-shaped rule fields carry an `Unknown`
//! sentinel: label parsing never fails, the validator rejects the
//! sentinel, and the tabulation code may then assume exhaustive coverage
//! of the real variants.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::Decimal;

use crate::ballot::CastVoteRecord;
use crate::tabulator::VoteTransfers;

/// Candidate -> votes for one round.
pub type RoundTally = BTreeMap<String, Decimal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreakMode {
    Random,
    Interactive,
    PreviousRoundCountsThenRandom,
    PreviousRoundCountsThenInteractive,
    UseCandidateOrder,
    GeneratePermutation,
    Unknown,
}

impl TieBreakMode {
    pub fn from_label(label: &str) -> TieBreakMode {
        match label {
            "random" => TieBreakMode::Random,
            "stopCountingAndAsk" => TieBreakMode::Interactive,
            "previousRoundCountsThenRandom" => TieBreakMode::PreviousRoundCountsThenRandom,
            "previousRoundCountsThenAsk" => TieBreakMode::PreviousRoundCountsThenInteractive,
            "useCandidateOrder" => TieBreakMode::UseCandidateOrder,
            "generatePermutation" => TieBreakMode::GeneratePermutation,
            _ => TieBreakMode::Unknown,
        }
    }

    /// Modes for which `randomSeed` is mandatory.
    pub fn needs_random_seed(self) -> bool {
        matches!(
            self,
            TieBreakMode::Random
                | TieBreakMode::PreviousRoundCountsThenRandom
                | TieBreakMode::GeneratePermutation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvervoteRule {
    ExhaustImmediately,
    AlwaysSkipToNextRank,
    ExhaustIfAnyContinuing,
    IgnoreIfAnyContinuing,
    ExhaustIfMultipleContinuing,
    IgnoreIfMultipleContinuing,
    Unknown,
}

impl OvervoteRule {
    pub fn from_label(label: &str) -> OvervoteRule {
        match label {
            "exhaustImmediately" => OvervoteRule::ExhaustImmediately,
            "alwaysSkipToNextRank" => OvervoteRule::AlwaysSkipToNextRank,
            "exhaustIfAnyContinuing" => OvervoteRule::ExhaustIfAnyContinuing,
            "ignoreIfAnyContinuing" => OvervoteRule::IgnoreIfAnyContinuing,
            "exhaustIfMultipleContinuing" => OvervoteRule::ExhaustIfMultipleContinuing,
            "ignoreIfMultipleContinuing" => OvervoteRule::IgnoreIfMultipleContinuing,
            _ => OvervoteRule::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerElectionMode {
    Standard,
    SingleSeatContinueUntilTwoCandidatesRemain,
    MultiSeatAllowOnlyOneWinnerPerRound,
    MultiSeatBottomsUp,
    MultiSeatSequentialWinnerTakesAll,
    Unknown,
}

impl WinnerElectionMode {
    pub fn from_label(label: &str) -> WinnerElectionMode {
        match label {
            "standard" => WinnerElectionMode::Standard,
            "singleSeatContinueUntilTwoCandidatesRemain" => {
                WinnerElectionMode::SingleSeatContinueUntilTwoCandidatesRemain
            }
            "multiSeatAllowOnlyOneWinnerPerRound" => {
                WinnerElectionMode::MultiSeatAllowOnlyOneWinnerPerRound
            }
            "multiSeatBottomsUp" => WinnerElectionMode::MultiSeatBottomsUp,
            "multiSeatSequentialWinnerTakesAll" => {
                WinnerElectionMode::MultiSeatSequentialWinnerTakesAll
            }
            _ => WinnerElectionMode::Unknown,
        }
    }
}

/// `maxRankingsAllowed`: `"max"` (one rank per declared candidate) or a
/// positive integer cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxRankings {
    Max,
    Limit(u32),
    Unknown,
}

impl MaxRankings {
    pub fn from_label(label: &str) -> MaxRankings {
        if label == "max" {
            MaxRankings::Max
        } else {
            match label.parse::<u32>() {
                Ok(n) => MaxRankings::Limit(n),
                Err(_) => MaxRankings::Unknown,
            }
        }
    }
}

/// `maxSkippedRanksAllowed`: `"unlimited"` or a non-negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxSkippedRanks {
    Unlimited,
    Limit(u32),
    Unknown,
}

impl MaxSkippedRanks {
    pub fn from_label(label: &str) -> MaxSkippedRanks {
        if label == "unlimited" {
            MaxSkippedRanks::Unlimited
        } else {
            match label.parse::<u32>() {
                Ok(n) => MaxSkippedRanks::Limit(n),
                Err(_) => MaxSkippedRanks::Unknown,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub code: Option<String>,
    /// Declared but not eligible; never continuing.
    pub excluded: bool,
}

impl Candidate {
    pub fn new(name: &str) -> Candidate {
        Candidate {
            name: name.to_string(),
            code: None,
            excluded: false,
        }
    }

    /// The identifier ballots and tallies use for this candidate: the code
    /// when one is configured, the name otherwise.
    pub fn identifier(&self) -> &str {
        match &self.code {
            Some(code) if !code.is_empty() => code,
            _ => &self.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvrSource {
    pub provider: String,
    pub file_path: String,
    pub first_vote_column_index: Option<u32>,
    pub first_vote_row_index: Option<u32>,
    pub id_column_index: Option<u32>,
    pub precinct_column_index: Option<u32>,
    /// Splits a single cell holding several marks into an overvote set.
    pub overvote_delimiter: Option<String>,
}

impl CvrSource {
    pub fn new(provider: &str, file_path: &str) -> CvrSource {
        CvrSource {
            provider: provider.to_string(),
            file_path: file_path.to_string(),
            first_vote_column_index: None,
            first_vote_row_index: None,
            id_column_index: None,
            precinct_column_index: None,
            overvote_delimiter: None,
        }
    }

    /// CDF sources are JSON files tagged with the `CDF` provider; they are
    /// subject to their own validation rules.
    pub fn is_cdf(&self) -> bool {
        self.provider.eq_ignore_ascii_case("CDF")
            && self.file_path.to_lowercase().ends_with(".json")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub contest_name: String,
    pub output_directory: Option<String>,
    pub contest_date: Option<String>,
    pub contest_jurisdiction: Option<String>,
    pub contest_office: Option<String>,
    pub tabulate_by_precinct: bool,
    pub generate_cdf_json: bool,
}

impl OutputSettings {
    pub fn named(contest_name: &str) -> OutputSettings {
        OutputSettings {
            contest_name: contest_name.to_string(),
            output_directory: None,
            contest_date: None,
            contest_jurisdiction: None,
            contest_office: None,
            tabulate_by_precinct: false,
            generate_cdf_json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestRules {
    pub tiebreak_mode: TieBreakMode,
    pub overvote_rule: OvervoteRule,
    pub winner_election_mode: WinnerElectionMode,
    pub number_of_winners: u32,
    pub decimal_places_for_vote_arithmetic: u32,
    pub minimum_vote_threshold: u64,
    pub max_rankings_allowed: MaxRankings,
    pub max_skipped_ranks_allowed: MaxSkippedRanks,
    pub non_integer_winning_threshold: bool,
    pub hare_quota: bool,
    pub batch_elimination: bool,
    pub exhaust_on_duplicate_candidate: bool,
    pub treat_blank_as_undeclared_write_in: bool,
    pub undeclared_write_in_label: Option<String>,
    pub overvote_label: Option<String>,
    pub undervote_label: Option<String>,
    pub random_seed: Option<u64>,
}

impl Default for ContestRules {
    fn default() -> ContestRules {
        ContestRules {
            tiebreak_mode: TieBreakMode::UseCandidateOrder,
            overvote_rule: OvervoteRule::ExhaustImmediately,
            winner_election_mode: WinnerElectionMode::Standard,
            number_of_winners: 1,
            decimal_places_for_vote_arithmetic: 4,
            minimum_vote_threshold: 0,
            max_rankings_allowed: MaxRankings::Max,
            max_skipped_ranks_allowed: MaxSkippedRanks::Unlimited,
            non_integer_winning_threshold: false,
            hare_quota: false,
            batch_elimination: false,
            exhaust_on_duplicate_candidate: false,
            treat_blank_as_undeclared_write_in: false,
            undeclared_write_in_label: None,
            overvote_label: None,
            undervote_label: None,
            random_seed: None,
        }
    }
}

/// The validated contest description consumed by the tabulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestConfig {
    /// Must match [`crate::TABULATOR_VERSION`].
    pub tabulator_version: String,
    pub output_settings: OutputSettings,
    pub cvr_sources: Vec<CvrSource>,
    pub candidates: Vec<Candidate>,
    pub rules: ContestRules,
    /// Directory against which relative source paths resolve (usually the
    /// directory holding the configuration file).
    pub source_directory: Option<String>,
}

impl ContestConfig {
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            match &self.source_directory {
                Some(dir) => Path::new(dir).join(p),
                None => p.to_path_buf(),
            }
        }
    }
}

/// The candidate bookkeeping derived from a configuration before
/// tabulation starts: identifier order, tie-break permutation, name
/// lookups, exclusions and the optional undeclared-write-in bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRoster {
    tabulation_order: Vec<String>,
    permutation: Vec<String>,
    identifier_to_name: BTreeMap<String, String>,
    name_to_identifier: BTreeMap<String, String>,
    excluded: BTreeSet<String>,
    uwi_label: Option<String>,
}

impl CandidateRoster {
    pub fn from_config(config: &ContestConfig) -> CandidateRoster {
        let mut permutation: Vec<String> = Vec::new();
        let mut identifier_to_name = BTreeMap::new();
        let mut name_to_identifier = BTreeMap::new();
        let mut excluded = BTreeSet::new();

        for candidate in &config.candidates {
            let id = candidate.identifier().to_string();
            identifier_to_name.insert(id.clone(), candidate.name.clone());
            name_to_identifier.insert(candidate.name.clone(), id.clone());
            if candidate.excluded {
                excluded.insert(id.clone());
            }
            permutation.push(id);
        }

        // The permutation defaults to declaration order; generatePermutation
        // shuffles it once here, as a function of the seed and the
        // candidate list only.
        if config.rules.tiebreak_mode == TieBreakMode::GeneratePermutation {
            if let Some(seed) = config.rules.random_seed {
                let mut rng = StdRng::seed_from_u64(seed);
                permutation.shuffle(&mut rng);
            }
        }

        let uwi_label = config
            .rules
            .undeclared_write_in_label
            .clone()
            .filter(|label| !label.is_empty());

        // The write-in bucket is tallied like a candidate; it goes last so
        // it never influences the declared candidates' iteration order.
        let mut tabulation_order = permutation.clone();
        if let Some(label) = &uwi_label {
            tabulation_order.push(label.clone());
            identifier_to_name.insert(label.clone(), label.clone());
        }

        CandidateRoster {
            tabulation_order,
            permutation,
            identifier_to_name,
            name_to_identifier,
            excluded,
            uwi_label,
        }
    }

    /// Candidate identifiers in tabulation order, write-in bucket last.
    pub fn tabulation_order(&self) -> &[String] {
        &self.tabulation_order
    }

    /// Declared candidate identifiers in tie-break order.
    pub fn permutation(&self) -> &[String] {
        &self.permutation
    }

    pub fn is_excluded(&self, identifier: &str) -> bool {
        self.excluded.contains(identifier)
    }

    pub fn uwi_label(&self) -> Option<&str> {
        self.uwi_label.as_deref()
    }

    pub fn num_declared(&self) -> usize {
        self.permutation.len()
    }

    /// Resolves a raw ballot cell to a candidate identifier, accepting
    /// either the configured code or the full name.
    pub fn identifier_for(&self, cell: &str) -> Option<&str> {
        self.identifier_to_name
            .get_key_value(cell)
            .map(|(k, _)| k.as_str())
            .or_else(|| self.name_to_identifier.get(cell).map(|s| s.as_str()))
    }

    pub fn name_for<'a>(&'a self, identifier: &'a str) -> &'a str {
        self.identifier_to_name
            .get(identifier)
            .map(|s| s.as_str())
            .unwrap_or(identifier)
    }
}

/// The outcome of one tabulation run (one pass, for sequential modes).
///
/// Round-indexed maps are 1-based and append-only during tabulation; the
/// cast vote records are returned for read-only audit.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulationResult {
    pub winner_to_round: BTreeMap<String, u32>,
    pub eliminated_to_round: BTreeMap<String, u32>,
    pub round_tallies: BTreeMap<u32, RoundTally>,
    pub thresholds: BTreeMap<u32, Decimal>,
    pub precinct_round_tallies: BTreeMap<String, BTreeMap<u32, RoundTally>>,
    pub transfers: VoteTransfers,
    pub cvrs: Vec<CastVoteRecord>,
    pub num_rounds: u32,
}

impl TabulationResult {
    /// Winners ordered by election round, then identifier.
    pub fn winners_in_order(&self) -> Vec<String> {
        let mut winners: Vec<(&u32, &String)> =
            self.winner_to_round.iter().map(|(c, r)| (r, c)).collect();
        winners.sort();
        winners.into_iter().map(|(_, c)| c.clone()).collect()
    }
}

/// The full result of `run_contest`: one pass for every mode except
/// sequential winner-takes-all, which records one pass per seat.
#[derive(Debug, Clone, PartialEq)]
pub struct ContestOutcome {
    pub passes: Vec<TabulationResult>,
}

impl ContestOutcome {
    /// All winners, in pass order then round order.
    pub fn winners(&self) -> Vec<String> {
        self.passes.iter().flat_map(|p| p.winners_in_order()).collect()
    }

    pub fn final_pass(&self) -> &TabulationResult {
        // run_contest never constructs an empty pass list
        self.passes.last().expect("contest outcome with no passes")
    }
}
