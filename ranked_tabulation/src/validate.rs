//! Static validation of a contest configuration.
//!
//! Tabulation runs only on a configuration that validates cleanly. The
//! validator collects every violation it can find rather than stopping at
//! the first, and logs each one as it is recorded.

use std::collections::BTreeSet;

use log::error;

use crate::config::{
    ContestConfig, MaxRankings, MaxSkippedRanks, OvervoteRule, TieBreakMode, WinnerElectionMode,
};
use crate::RESERVED_TALLY_STRINGS;

const MIN_COLUMN_INDEX: u32 = 1;
const MAX_COLUMN_INDEX: u32 = 1000;
const MIN_ROW_INDEX: u32 = 1;
const MAX_ROW_INDEX: u32 = 100_000;
const MIN_DECIMAL_PLACES: u32 = 1;
const MAX_DECIMAL_PLACES: u32 = 20;
const MAX_MINIMUM_VOTE_THRESHOLD: u64 = 1_000_000;

/// Everything the validator found wrong with a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    problems: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    pub fn into_problems(self) -> Vec<String> {
        self.problems
    }

    fn flag(&mut self, message: String) {
        error!("invalid contest config: {}", message);
        self.problems.push(message);
    }
}

/// Runs every check over the configuration and returns the collected
/// violation list.
pub fn validate(config: &ContestConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_version(config, &mut report);
    check_output_settings(config, &mut report);
    check_cvr_sources(config, &mut report);
    check_candidates(config, &mut report);
    check_rules(config, &mut report);
    report
}

fn check_version(config: &ContestConfig, report: &mut ValidationReport) {
    if config.tabulator_version.is_empty() {
        report.flag("tabulatorVersion is required".to_string());
    } else if config.tabulator_version != crate::TABULATOR_VERSION {
        report.flag(format!(
            "tabulatorVersion {} is not supported; this tabulator is version {}",
            config.tabulator_version,
            crate::TABULATOR_VERSION
        ));
    }
}

fn check_output_settings(config: &ContestConfig, report: &mut ValidationReport) {
    if config.output_settings.contest_name.trim().is_empty() {
        report.flag("contestName is required".to_string());
    }
}

fn check_range(
    report: &mut ValidationReport,
    value: Option<u32>,
    name: &str,
    low: u32,
    high: u32,
    required: bool,
    location: &str,
) {
    match value {
        None if required => {
            report.flag(format!("{} must be from {} to {}: {}", name, low, high, location))
        }
        Some(v) if v < low || v > high => report.flag(format!(
            "{} must be from {} to {}{}: {}",
            name,
            low,
            high,
            if required { "" } else { " if supplied" },
            location
        )),
        _ => {}
    }
}

fn check_cvr_sources(config: &ContestConfig, report: &mut ValidationReport) {
    if config.cvr_sources.is_empty() {
        report.flag("the contest config must contain at least 1 cast vote record file".to_string());
        return;
    }
    let by_precinct = config.output_settings.tabulate_by_precinct;
    let mut resolved_paths: BTreeSet<String> = BTreeSet::new();
    for source in &config.cvr_sources {
        if source.file_path.trim().is_empty() {
            report.flag("filePath is required for each cast vote record file".to_string());
            continue;
        }
        let resolved = config.resolve_path(&source.file_path);
        let location = resolved.display().to_string();
        if !resolved_paths.insert(location.clone()) {
            report.flag(format!("duplicate cast vote record filePaths are not allowed: {}", location));
        }
        if !resolved.exists() {
            report.flag(format!("cast vote record file not found: {}", location));
        }

        if source.is_cdf() {
            if config.cvr_sources.len() != 1 {
                report.flag("CDF files must be tabulated individually".to_string());
            }
            if by_precinct {
                report.flag("tabulateByPrecinct may not be used with CDF files".to_string());
            }
        } else {
            check_range(
                report,
                source.first_vote_column_index,
                "firstVoteColumnIndex",
                MIN_COLUMN_INDEX,
                MAX_COLUMN_INDEX,
                true,
                &location,
            );
            check_range(
                report,
                source.first_vote_row_index,
                "firstVoteRowIndex",
                MIN_ROW_INDEX,
                MAX_ROW_INDEX,
                true,
                &location,
            );
            check_range(
                report,
                source.id_column_index,
                "idColumnIndex",
                MIN_COLUMN_INDEX,
                MAX_COLUMN_INDEX,
                false,
                &location,
            );
            check_range(
                report,
                source.precinct_column_index,
                "precinctColumnIndex",
                MIN_COLUMN_INDEX,
                MAX_COLUMN_INDEX,
                false,
                &location,
            );
            if by_precinct && source.precinct_column_index.is_none() {
                report.flag(format!(
                    "precinctColumnIndex is required when tabulateByPrecinct is enabled: {}",
                    location
                ));
            }
        }
    }
}

/// Reserved tally-transfer strings and the three configurable labels may
/// not collide with each other or with candidate names and codes.
fn string_in_use_elsewhere(
    config: &ContestConfig,
    string: &str,
    field: &str,
    report: &mut ValidationReport,
) -> bool {
    for reserved in RESERVED_TALLY_STRINGS {
        if string.eq_ignore_ascii_case(reserved) {
            report.flag(format!(
                "{:?} is a reserved term and cannot be used for {}",
                string, field
            ));
            return true;
        }
    }
    let other_labels = [
        ("overvoteLabel", &config.rules.overvote_label),
        ("undervoteLabel", &config.rules.undervote_label),
        ("undeclaredWriteInLabel", &config.rules.undeclared_write_in_label),
    ];
    for (other_field, other_value) in other_labels {
        if field == other_field {
            continue;
        }
        match other_value {
            Some(value) if !value.is_empty() && value.eq_ignore_ascii_case(string) => {
                report.flag(format!(
                    "{:?} cannot be used as {} while it is also used as {}",
                    string, field, other_field
                ));
                return true;
            }
            _ => {}
        }
    }
    false
}

fn check_candidates(config: &ContestConfig, report: &mut ValidationReport) {
    let mut names_seen: BTreeSet<String> = BTreeSet::new();
    let mut codes_seen: BTreeSet<String> = BTreeSet::new();
    let mut num_declared = 0usize;
    let mut num_excluded = 0usize;

    for candidate in &config.candidates {
        num_declared += 1;
        if candidate.excluded {
            num_excluded += 1;
        }
        if candidate.name.trim().is_empty() {
            report.flag("a name is required for each candidate".to_string());
        } else if !names_seen.insert(candidate.name.clone()) {
            report.flag(format!("duplicate candidate names are not allowed: {}", candidate.name));
        } else {
            string_in_use_elsewhere(config, &candidate.name, "a candidate name", report);
        }

        if let Some(code) = &candidate.code {
            if !code.is_empty() {
                if !codes_seen.insert(code.clone()) {
                    report.flag(format!("duplicate candidate codes are not allowed: {}", code));
                } else {
                    string_in_use_elsewhere(config, code, "a candidate code", report);
                }
            }
        }
    }

    if !codes_seen.is_empty() && codes_seen.len() != names_seen.len() {
        report.flag(
            "if candidate codes are used, a unique code is required for each candidate".to_string(),
        );
    }

    if num_declared < 1 {
        report.flag("the contest config must contain at least 1 declared candidate".to_string());
    } else if num_declared == num_excluded {
        report.flag("the contest config must contain at least 1 non-excluded candidate".to_string());
    }
}

fn check_rules(config: &ContestConfig, report: &mut ValidationReport) {
    let rules = &config.rules;

    if rules.tiebreak_mode == TieBreakMode::Unknown {
        report.flag("invalid tiebreakMode".to_string());
    }
    if rules.tiebreak_mode.needs_random_seed() && rules.random_seed.is_none() {
        report.flag(
            "randomSeed must be supplied when tiebreakMode involves a random element".to_string(),
        );
    }

    if rules.overvote_rule == OvervoteRule::Unknown {
        report.flag("invalid overvoteRule".to_string());
    } else if label_present(&rules.overvote_label)
        && rules.overvote_rule != OvervoteRule::ExhaustImmediately
        && rules.overvote_rule != OvervoteRule::AlwaysSkipToNextRank
    {
        report.flag(
            "when overvoteLabel is supplied, overvoteRule must be either exhaustImmediately or alwaysSkipToNextRank"
                .to_string(),
        );
    }

    if rules.winner_election_mode == WinnerElectionMode::Unknown {
        report.flag("invalid winnerElectionMode".to_string());
    }

    let num_declared = config.candidates.len() as u32;
    match rules.max_rankings_allowed {
        MaxRankings::Unknown => {
            report.flag("maxRankingsAllowed must either be \"max\" or an integer".to_string())
        }
        MaxRankings::Limit(n) if n < 1 => {
            report.flag("maxRankingsAllowed must be 1 or higher".to_string())
        }
        _ => {}
    }
    if rules.max_skipped_ranks_allowed == MaxSkippedRanks::Unknown {
        report.flag("maxSkippedRanksAllowed must either be \"unlimited\" or an integer".to_string());
    }

    if rules.number_of_winners < 1 || (num_declared >= 1 && rules.number_of_winners > num_declared)
    {
        report.flag(format!(
            "numberOfWinners must be from 1 to {}",
            num_declared.max(1)
        ));
    }

    if rules.decimal_places_for_vote_arithmetic < MIN_DECIMAL_PLACES
        || rules.decimal_places_for_vote_arithmetic > MAX_DECIMAL_PLACES
    {
        report.flag(format!(
            "decimalPlacesForVoteArithmetic must be from {} to {}",
            MIN_DECIMAL_PLACES, MAX_DECIMAL_PLACES
        ));
    }

    if rules.minimum_vote_threshold > MAX_MINIMUM_VOTE_THRESHOLD {
        report.flag(format!(
            "minimumVoteThreshold must be from 0 to {}",
            MAX_MINIMUM_VOTE_THRESHOLD
        ));
    }

    // multi-seat compatibility matrix
    if rules.number_of_winners > 1 {
        if rules.winner_election_mode
            == WinnerElectionMode::SingleSeatContinueUntilTwoCandidatesRemain
        {
            report.flag(
                "winnerElectionMode cannot be singleSeatContinueUntilTwoCandidatesRemain in a multi-seat contest"
                    .to_string(),
            );
        }
        if rules.batch_elimination {
            report.flag("batchElimination cannot be true in a multi-seat contest".to_string());
        }
    } else {
        match rules.winner_election_mode {
            WinnerElectionMode::MultiSeatSequentialWinnerTakesAll => report.flag(
                "winnerElectionMode cannot be multiSeatSequentialWinnerTakesAll in a single-seat contest"
                    .to_string(),
            ),
            WinnerElectionMode::MultiSeatBottomsUp => report.flag(
                "winnerElectionMode cannot be multiSeatBottomsUp in a single-seat contest"
                    .to_string(),
            ),
            WinnerElectionMode::MultiSeatAllowOnlyOneWinnerPerRound => report.flag(
                "winnerElectionMode cannot be multiSeatAllowOnlyOneWinnerPerRound in a single-seat contest"
                    .to_string(),
            ),
            _ => {}
        }
        if rules.hare_quota {
            report.flag("hareQuota can only be true in a multi-seat contest".to_string());
        }
    }
    if rules.winner_election_mode == WinnerElectionMode::MultiSeatBottomsUp
        && rules.batch_elimination
    {
        report.flag(
            "batchElimination cannot be true when winnerElectionMode is multiSeatBottomsUp"
                .to_string(),
        );
    }

    for (field, label) in [
        ("overvoteLabel", &rules.overvote_label),
        ("undervoteLabel", &rules.undervote_label),
        ("undeclaredWriteInLabel", &rules.undeclared_write_in_label),
    ] {
        if let Some(label) = label {
            if !label.is_empty() {
                string_in_use_elsewhere(config, label, field, report);
            }
        }
    }

    if rules.treat_blank_as_undeclared_write_in && !label_present(&rules.undeclared_write_in_label)
    {
        report.flag(
            "undeclaredWriteInLabel must be supplied if treatBlankAsUndeclaredWriteIn is true"
                .to_string(),
        );
    }
}

fn label_present(label: &Option<String>) -> bool {
    matches!(label, Some(l) if !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Candidate, ContestRules, CvrSource, OutputSettings};

    /// A source path that always exists so file checks stay quiet.
    fn existing_source() -> CvrSource {
        let mut source = CvrSource::new("csv", concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        source.first_vote_column_index = Some(2);
        source.first_vote_row_index = Some(2);
        source
    }

    fn valid_config() -> ContestConfig {
        ContestConfig {
            tabulator_version: crate::TABULATOR_VERSION.to_string(),
            output_settings: OutputSettings::named("Validation Test"),
            cvr_sources: vec![existing_source()],
            candidates: vec![
                Candidate::new("Alice"),
                Candidate::new("Bob"),
                Candidate::new("Carol"),
            ],
            rules: ContestRules::default(),
            source_directory: None,
        }
    }

    fn problems_of(config: &ContestConfig) -> Vec<String> {
        validate(config).into_problems()
    }

    fn assert_flagged(config: &ContestConfig, needle: &str) {
        let problems = problems_of(config);
        assert!(
            problems.iter().any(|p| p.contains(needle)),
            "expected a problem mentioning {:?}, got {:?}",
            needle,
            problems
        );
    }

    #[test]
    fn a_sound_config_passes() {
        assert!(validate(&valid_config()).is_valid());
    }

    #[test]
    fn version_must_match_the_engine() {
        let mut config = valid_config();
        config.tabulator_version = "0.0.1".to_string();
        assert_flagged(&config, "tabulatorVersion");
        config.tabulator_version = String::new();
        assert_flagged(&config, "tabulatorVersion is required");
    }

    #[test]
    fn contest_name_is_required() {
        let mut config = valid_config();
        config.output_settings.contest_name = "  ".to_string();
        assert_flagged(&config, "contestName");
    }

    #[test]
    fn sources_must_exist_and_be_unique() {
        let mut config = valid_config();
        config.cvr_sources = vec![];
        assert_flagged(&config, "at least 1 cast vote record");

        let mut config = valid_config();
        config.cvr_sources.push(existing_source());
        assert_flagged(&config, "duplicate cast vote record filePaths");

        let mut config = valid_config();
        config.cvr_sources[0].file_path = "no/such/file.csv".to_string();
        assert_flagged(&config, "not found");
    }

    #[test]
    fn non_cdf_sources_need_vote_coordinates() {
        let mut config = valid_config();
        config.cvr_sources[0].first_vote_column_index = None;
        assert_flagged(&config, "firstVoteColumnIndex");

        let mut config = valid_config();
        config.cvr_sources[0].first_vote_row_index = Some(200_000);
        assert_flagged(&config, "firstVoteRowIndex");

        let mut config = valid_config();
        config.cvr_sources[0].id_column_index = Some(0);
        assert_flagged(&config, "idColumnIndex");
    }

    #[test]
    fn cdf_sources_are_exclusive_and_precinct_free() {
        let mut config = valid_config();
        let mut cdf = CvrSource::new("cdf", concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        cdf.file_path.push_str(".json"); // missing file, but tagged CDF
        config.cvr_sources.push(cdf);
        assert_flagged(&config, "CDF files must be tabulated individually");

        let mut config = valid_config();
        let cdf = CvrSource::new("cdf", "records.json");
        config.cvr_sources = vec![cdf];
        config.output_settings.tabulate_by_precinct = true;
        assert_flagged(&config, "tabulateByPrecinct may not be used with CDF");
    }

    #[test]
    fn per_precinct_requires_a_precinct_column() {
        let mut config = valid_config();
        config.output_settings.tabulate_by_precinct = true;
        assert_flagged(&config, "precinctColumnIndex is required");
    }

    #[test]
    fn candidate_names_and_codes_must_be_consistent() {
        let mut config = valid_config();
        config.candidates.push(Candidate::new("Alice"));
        assert_flagged(&config, "duplicate candidate names");

        let mut config = valid_config();
        config.candidates[0].code = Some("X1".to_string());
        config.candidates[1].code = Some("X1".to_string());
        assert_flagged(&config, "duplicate candidate codes");

        let mut config = valid_config();
        config.candidates[0].code = Some("X1".to_string());
        assert_flagged(&config, "a unique code is required for each candidate");

        let mut config = valid_config();
        config.candidates = vec![];
        assert_flagged(&config, "at least 1 declared candidate");

        let mut config = valid_config();
        for candidate in &mut config.candidates {
            candidate.excluded = true;
        }
        assert_flagged(&config, "at least 1 non-excluded candidate");
    }

    #[test]
    fn reserved_and_label_collisions_are_rejected() {
        let mut config = valid_config();
        config.candidates[0].name = "Exhausted".to_string();
        assert_flagged(&config, "reserved term");

        let mut config = valid_config();
        config.rules.undeclared_write_in_label = Some("Alice".to_string());
        assert_flagged(&config, "undeclaredWriteInLabel");

        let mut config = valid_config();
        config.rules.overvote_label = Some("skip".to_string());
        config.rules.undervote_label = Some("skip".to_string());
        // overvote label also forces a compatible overvote rule, which the
        // default (exhaustImmediately) is; only the collision is flagged.
        assert_flagged(&config, "undervoteLabel");
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let mut config = valid_config();
        config.rules.tiebreak_mode = TieBreakMode::Unknown;
        assert_flagged(&config, "tiebreakMode");

        let mut config = valid_config();
        config.rules.overvote_rule = OvervoteRule::Unknown;
        assert_flagged(&config, "overvoteRule");

        let mut config = valid_config();
        config.rules.winner_election_mode = WinnerElectionMode::Unknown;
        assert_flagged(&config, "winnerElectionMode");

        let mut config = valid_config();
        config.rules.max_rankings_allowed = MaxRankings::Unknown;
        assert_flagged(&config, "maxRankingsAllowed");

        let mut config = valid_config();
        config.rules.max_skipped_ranks_allowed = MaxSkippedRanks::Unknown;
        assert_flagged(&config, "maxSkippedRanksAllowed");
    }

    #[test]
    fn randomizing_tiebreaks_need_a_seed() {
        for mode in [
            TieBreakMode::Random,
            TieBreakMode::PreviousRoundCountsThenRandom,
            TieBreakMode::GeneratePermutation,
        ] {
            let mut config = valid_config();
            config.rules.tiebreak_mode = mode;
            assert_flagged(&config, "randomSeed");

            config.rules.random_seed = Some(1);
            assert!(validate(&config).is_valid());
        }
    }

    #[test]
    fn overvote_label_constrains_the_rule() {
        let mut config = valid_config();
        config.rules.overvote_label = Some("OV".to_string());
        config.rules.overvote_rule = OvervoteRule::ExhaustIfAnyContinuing;
        assert_flagged(&config, "overvoteRule must be either exhaustImmediately");
    }

    #[test]
    fn numeric_ranges_are_enforced() {
        let mut config = valid_config();
        config.rules.number_of_winners = 0;
        assert_flagged(&config, "numberOfWinners");

        let mut config = valid_config();
        config.rules.number_of_winners = 4; // only 3 declared
        assert_flagged(&config, "numberOfWinners");

        let mut config = valid_config();
        config.rules.decimal_places_for_vote_arithmetic = 21;
        assert_flagged(&config, "decimalPlacesForVoteArithmetic");

        let mut config = valid_config();
        config.rules.minimum_vote_threshold = 1_000_001;
        assert_flagged(&config, "minimumVoteThreshold");

        let mut config = valid_config();
        config.rules.max_rankings_allowed = MaxRankings::Limit(0);
        assert_flagged(&config, "maxRankingsAllowed");
    }

    #[test]
    fn the_multi_seat_matrix_holds() {
        let mut config = valid_config();
        config.rules.number_of_winners = 2;
        config.rules.winner_election_mode =
            WinnerElectionMode::SingleSeatContinueUntilTwoCandidatesRemain;
        assert_flagged(&config, "singleSeatContinueUntilTwoCandidatesRemain");

        let mut config = valid_config();
        config.rules.number_of_winners = 2;
        config.rules.batch_elimination = true;
        assert_flagged(&config, "batchElimination cannot be true in a multi-seat");

        let mut config = valid_config();
        config.rules.winner_election_mode = WinnerElectionMode::MultiSeatBottomsUp;
        assert_flagged(&config, "multiSeatBottomsUp in a single-seat");

        let mut config = valid_config();
        config.rules.hare_quota = true;
        assert_flagged(&config, "hareQuota");

        let mut config = valid_config();
        config.rules.number_of_winners = 2;
        config.rules.winner_election_mode = WinnerElectionMode::MultiSeatBottomsUp;
        config.rules.batch_elimination = true;
        assert_flagged(&config, "multiSeatBottomsUp");
    }

    #[test]
    fn blank_as_write_in_needs_the_label() {
        let mut config = valid_config();
        config.rules.treat_blank_as_undeclared_write_in = true;
        assert_flagged(&config, "undeclaredWriteInLabel must be supplied");
    }
}
