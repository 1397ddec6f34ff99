//! serde model of the JSON contest configuration and its conversion into
//! the engine's typed configuration.
//!
//! The file layout follows the RCTab configuration documentation: camelCase
//! field names, and numeric options that may be written either as JSON
//! numbers or as strings. Unknown enum labels convert to the engine's
//! `Unknown` sentinels so the validator can report them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::ResultExt;

use ranked_tabulation::{
    Candidate, ContestConfig, ContestRules, CvrSource, MaxRankings, MaxSkippedRanks,
    OutputSettings, OvervoteRule, TieBreakMode, WinnerElectionMode,
};

use crate::rcv::{OpeningConfigSnafu, ParsingConfigSnafu, RcvResult};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawOutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_jurisdiction: Option<String>,
    #[serde(rename = "contestOffice")]
    pub contest_office: Option<String>,
    #[serde(rename = "tabulateByPrecinct")]
    pub tabulate_by_precinct: Option<bool>,
    #[serde(rename = "generateCdfJson")]
    pub generate_cdf_json: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "firstVoteColumnIndex")]
    pub first_vote_column_index: Option<JSValue>,
    #[serde(rename = "firstVoteRowIndex")]
    pub first_vote_row_index: Option<JSValue>,
    #[serde(rename = "idColumnIndex")]
    pub id_column_index: Option<JSValue>,
    #[serde(rename = "precinctColumnIndex")]
    pub precinct_column_index: Option<JSValue>,
    #[serde(rename = "overvoteDelimiter")]
    pub overvote_delimiter: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    pub code: Option<String>,
    pub excluded: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawRules {
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: String,
    #[serde(rename = "overvoteRule")]
    pub overvote_rule: String,
    #[serde(rename = "winnerElectionMode")]
    pub winner_election_mode: Option<String>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<JSValue>,
    #[serde(rename = "numberOfWinners")]
    pub number_of_winners: Option<JSValue>,
    #[serde(rename = "decimalPlacesForVoteArithmetic")]
    pub decimal_places_for_vote_arithmetic: Option<JSValue>,
    #[serde(rename = "minimumVoteThreshold")]
    pub minimum_vote_threshold: Option<JSValue>,
    #[serde(rename = "maxRankingsAllowed")]
    pub max_rankings_allowed: Option<JSValue>,
    #[serde(rename = "maxSkippedRanksAllowed")]
    pub max_skipped_ranks_allowed: Option<JSValue>,
    #[serde(rename = "nonIntegerWinningThreshold")]
    pub non_integer_winning_threshold: Option<bool>,
    #[serde(rename = "hareQuota")]
    pub hare_quota: Option<bool>,
    #[serde(rename = "batchElimination")]
    pub batch_elimination: Option<bool>,
    #[serde(rename = "exhaustOnDuplicateCandidate")]
    pub exhaust_on_duplicate_candidate: Option<bool>,
    #[serde(rename = "treatBlankAsUndeclaredWriteIn")]
    pub treat_blank_as_undeclared_write_in: Option<bool>,
    #[serde(rename = "undeclaredWriteInLabel")]
    pub undeclared_write_in_label: Option<String>,
    #[serde(rename = "overvoteLabel")]
    pub overvote_label: Option<String>,
    #[serde(rename = "undervoteLabel")]
    pub undervote_label: Option<String>,
    #[serde(rename = "rulesDescription")]
    pub rules_description: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "tabulatorVersion")]
    pub tabulator_version: Option<String>,
    #[serde(rename = "outputSettings")]
    pub output_settings: RawOutputSettings,
    #[serde(rename = "cvrFileSources")]
    pub cvr_file_sources: Vec<RawSource>,
    pub candidates: Vec<RawCandidate>,
    pub rules: RawRules,
}

/// Reads a configuration file and converts it, resolving relative source
/// paths against the file's directory.
pub fn read_contest_config(config_path: &str) -> RcvResult<ContestConfig> {
    let contents = std::fs::read_to_string(config_path).context(OpeningConfigSnafu {
        path: config_path,
    })?;
    let raw: RawConfig = serde_json::from_str(contents.as_str()).context(ParsingConfigSnafu {
        path: config_path,
    })?;
    let source_directory = Path::new(config_path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.display().to_string());
    Ok(raw.into_contest_config(source_directory))
}

impl RawConfig {
    pub fn into_contest_config(self, source_directory: Option<String>) -> ContestConfig {
        let rules = ContestRules {
            tiebreak_mode: TieBreakMode::from_label(&self.rules.tiebreak_mode),
            overvote_rule: OvervoteRule::from_label(&self.rules.overvote_rule),
            winner_election_mode: WinnerElectionMode::from_label(
                self.rules.winner_election_mode.as_deref().unwrap_or("standard"),
            ),
            number_of_winners: js_u32_or(&self.rules.number_of_winners, 1),
            decimal_places_for_vote_arithmetic: js_u32_or(
                &self.rules.decimal_places_for_vote_arithmetic,
                4,
            ),
            minimum_vote_threshold: js_u64_or(&self.rules.minimum_vote_threshold, 0),
            max_rankings_allowed: match js_label(&self.rules.max_rankings_allowed) {
                Some(label) => MaxRankings::from_label(&label),
                None => MaxRankings::Max,
            },
            max_skipped_ranks_allowed: match js_label(&self.rules.max_skipped_ranks_allowed) {
                Some(label) => MaxSkippedRanks::from_label(&label),
                None => MaxSkippedRanks::Unlimited,
            },
            non_integer_winning_threshold: self.rules.non_integer_winning_threshold.unwrap_or(false),
            hare_quota: self.rules.hare_quota.unwrap_or(false),
            batch_elimination: self.rules.batch_elimination.unwrap_or(false),
            exhaust_on_duplicate_candidate: self
                .rules
                .exhaust_on_duplicate_candidate
                .unwrap_or(false),
            treat_blank_as_undeclared_write_in: self
                .rules
                .treat_blank_as_undeclared_write_in
                .unwrap_or(false),
            undeclared_write_in_label: non_empty(self.rules.undeclared_write_in_label),
            overvote_label: non_empty(self.rules.overvote_label),
            undervote_label: non_empty(self.rules.undervote_label),
            random_seed: js_u64(&self.rules.random_seed),
        };

        ContestConfig {
            tabulator_version: self.tabulator_version.unwrap_or_default(),
            output_settings: OutputSettings {
                contest_name: self.output_settings.contest_name,
                output_directory: self.output_settings.output_directory,
                contest_date: self.output_settings.contest_date,
                contest_jurisdiction: self.output_settings.contest_jurisdiction,
                contest_office: self.output_settings.contest_office,
                tabulate_by_precinct: self.output_settings.tabulate_by_precinct.unwrap_or(false),
                generate_cdf_json: self.output_settings.generate_cdf_json.unwrap_or(false),
            },
            cvr_sources: self
                .cvr_file_sources
                .into_iter()
                .map(|source| CvrSource {
                    provider: source.provider,
                    file_path: source.file_path,
                    first_vote_column_index: js_u32(&source.first_vote_column_index),
                    first_vote_row_index: js_u32(&source.first_vote_row_index),
                    id_column_index: js_u32(&source.id_column_index),
                    precinct_column_index: js_u32(&source.precinct_column_index),
                    overvote_delimiter: non_empty(source.overvote_delimiter),
                })
                .collect(),
            candidates: self
                .candidates
                .into_iter()
                .map(|candidate| Candidate {
                    name: candidate.name,
                    code: non_empty(candidate.code),
                    excluded: candidate.excluded.unwrap_or(false),
                })
                .collect(),
            rules,
            source_directory,
        }
    }
}

/// Integer-or-string field, the way RCTab config files write numbers.
fn js_u64(value: &Option<JSValue>) -> Option<u64> {
    match value {
        Some(JSValue::Number(n)) => n.as_u64(),
        Some(JSValue::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn js_u64_or(value: &Option<JSValue>, default: u64) -> u64 {
    match value {
        // a present but unparsable value is carried as 0 so validation
        // reports it; an absent value takes the documented default
        None => default,
        Some(_) => js_u64(value).unwrap_or(0),
    }
}

fn js_u32(value: &Option<JSValue>) -> Option<u32> {
    js_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn js_u32_or(value: &Option<JSValue>, default: u32) -> u32 {
    match value {
        None => default,
        Some(_) => js_u32(value).unwrap_or(0),
    }
}

/// String-or-number field holding an enum-ish label such as "max" or "3".
fn js_label(value: &Option<JSValue>) -> Option<String> {
    match value {
        Some(JSValue::String(s)) => Some(s.trim().to_string()),
        Some(JSValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "tabulatorVersion": "1.1.0",
            "outputSettings": {
                "contestName": "Portland Mayor",
                "contestJurisdiction": "Portland, ME",
                "tabulateByPrecinct": true
            },
            "cvrFileSources": [{
                "provider": "ess",
                "filePath": "votes.xlsx",
                "firstVoteColumnIndex": "4",
                "firstVoteRowIndex": 2,
                "precinctColumnIndex": 2,
                "overvoteDelimiter": "|"
            }],
            "candidates": [
                { "name": "Alice Adams", "code": "ALI" },
                { "name": "Bob Brown", "excluded": true }
            ],
            "rules": {
                "tiebreakMode": "previousRoundCountsThenRandom",
                "overvoteRule": "exhaustImmediately",
                "winnerElectionMode": "standard",
                "randomSeed": "1234",
                "numberOfWinners": 1,
                "decimalPlacesForVoteArithmetic": "4",
                "maxRankingsAllowed": "max",
                "maxSkippedRanksAllowed": 1,
                "exhaustOnDuplicateCandidate": true,
                "undeclaredWriteInLabel": "Undeclared Write-ins"
            }
        }"#
    }

    #[test]
    fn a_full_config_file_converts() {
        let raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        let config = raw.into_contest_config(Some("/elections/2024".to_string()));

        assert_eq!(config.tabulator_version, "1.1.0");
        assert_eq!(config.output_settings.contest_name, "Portland Mayor");
        assert!(config.output_settings.tabulate_by_precinct);

        let source = &config.cvr_sources[0];
        assert_eq!(source.provider, "ess");
        assert_eq!(source.first_vote_column_index, Some(4));
        assert_eq!(source.first_vote_row_index, Some(2));
        assert_eq!(source.precinct_column_index, Some(2));
        assert_eq!(source.overvote_delimiter.as_deref(), Some("|"));

        assert_eq!(config.candidates[0].code.as_deref(), Some("ALI"));
        assert!(config.candidates[1].excluded);

        let rules = &config.rules;
        assert_eq!(rules.tiebreak_mode, TieBreakMode::PreviousRoundCountsThenRandom);
        assert_eq!(rules.overvote_rule, OvervoteRule::ExhaustImmediately);
        assert_eq!(rules.winner_election_mode, WinnerElectionMode::Standard);
        assert_eq!(rules.random_seed, Some(1234));
        assert_eq!(rules.number_of_winners, 1);
        assert_eq!(rules.decimal_places_for_vote_arithmetic, 4);
        assert_eq!(rules.max_rankings_allowed, MaxRankings::Max);
        assert_eq!(rules.max_skipped_ranks_allowed, MaxSkippedRanks::Limit(1));
        assert!(rules.exhaust_on_duplicate_candidate);
        assert_eq!(
            rules.undeclared_write_in_label.as_deref(),
            Some("Undeclared Write-ins")
        );
        // resolve against the config file's directory
        assert_eq!(
            config.resolve_path("votes.xlsx"),
            Path::new("/elections/2024/votes.xlsx")
        );
    }

    #[test]
    fn unknown_labels_become_sentinels() {
        let mut raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        raw.rules.tiebreak_mode = "flipACoin".to_string();
        raw.rules.overvote_rule = "whoKnows".to_string();
        raw.rules.winner_election_mode = Some("firstPastThePost".to_string());
        raw.rules.max_rankings_allowed = Some(JSValue::String("lots".to_string()));
        let config = raw.into_contest_config(None);
        assert_eq!(config.rules.tiebreak_mode, TieBreakMode::Unknown);
        assert_eq!(config.rules.overvote_rule, OvervoteRule::Unknown);
        assert_eq!(config.rules.winner_election_mode, WinnerElectionMode::Unknown);
        assert_eq!(config.rules.max_rankings_allowed, MaxRankings::Unknown);
    }

    #[test]
    fn missing_optional_fields_take_the_documented_defaults() {
        let minimal = r#"{
            "outputSettings": { "contestName": "Minimal" },
            "cvrFileSources": [{ "provider": "csv", "filePath": "votes.csv" }],
            "candidates": [{ "name": "Alice" }],
            "rules": {
                "tiebreakMode": "useCandidateOrder",
                "overvoteRule": "alwaysSkipToNextRank"
            }
        }"#;
        let raw: RawConfig = serde_json::from_str(minimal).unwrap();
        let config = raw.into_contest_config(None);
        assert_eq!(config.tabulator_version, "");
        assert_eq!(config.rules.number_of_winners, 1);
        assert_eq!(config.rules.decimal_places_for_vote_arithmetic, 4);
        assert_eq!(config.rules.minimum_vote_threshold, 0);
        assert_eq!(config.rules.max_rankings_allowed, MaxRankings::Max);
        assert_eq!(
            config.rules.max_skipped_ranks_allowed,
            MaxSkippedRanks::Unlimited
        );
        assert!(!config.rules.batch_elimination);
        assert!(config.rules.random_seed.is_none());
        assert!(config.cvr_sources[0].first_vote_column_index.is_none());
    }

    #[test]
    fn unparsable_numbers_surface_as_invalid_rather_than_defaults() {
        let mut raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        raw.rules.number_of_winners = Some(JSValue::String("two".to_string()));
        let config = raw.into_contest_config(None);
        // zero is outside every validated range, so the validator reports it
        assert_eq!(config.rules.number_of_winners, 0);
        assert!(!ranked_tabulation::validate(&config).is_valid());
    }
}
