/*!
Round-by-round ranked choice voting (RCV) tabulation.

The engine consumes a validated [`ContestConfig`] and a list of
[`CastVoteRecord`]s and produces a deterministic winner set, the full
elimination and round-tally history, an optional per-precinct breakdown
and a per-ballot audit trail. File parsing and result rendering live in
front-end crates; this crate is the tabulation core.

```
use ranked_tabulation::{
    run_contest, Candidate, CastVoteRecord, ContestConfig, ContestRules,
    CandidateRoster, CvrSource, NoOracle, OutputSettings, TABULATOR_VERSION,
};

let mut source = CvrSource::new("csv", "Cargo.toml");
source.first_vote_column_index = Some(1);
source.first_vote_row_index = Some(1);
let config = ContestConfig {
    tabulator_version: TABULATOR_VERSION.to_string(),
    output_settings: OutputSettings::named("Quick start"),
    cvr_sources: vec![source],
    candidates: vec![Candidate::new("Alice"), Candidate::new("Bob")],
    rules: ContestRules::default(),
    source_directory: None,
};

let roster = CandidateRoster::from_config(&config);
let ballot = |id: u32, choices: &[&str]| {
    let cells: Vec<Vec<String>> = choices.iter().map(|c| vec![c.to_string()]).collect();
    CastVoteRecord::from_raw_choices("demo", &id.to_string(), None, &cells, &config.rules, &roster)
};
let cvrs = vec![ballot(1, &["Alice", "Bob"]), ballot(2, &["Alice"]), ballot(3, &["Bob"])];

let outcome = run_contest(&config, cvrs, &mut NoOracle)?;
assert_eq!(outcome.winners(), vec!["Alice".to_string()]);
# Ok::<(), ranked_tabulation::EngineError>(())
```
*/

pub mod ballot;
pub mod config;
pub mod decimal;
mod error;
pub mod manual;
pub mod tabulator;
pub mod tiebreak;
pub mod validate;

pub use ballot::{CastVoteRecord, RoundOutcome, VoteOutcome, EXPLICIT_OVERVOTE_LABEL};
pub use config::{
    Candidate, CandidateRoster, ContestConfig, ContestOutcome, ContestRules, CvrSource,
    MaxRankings, MaxSkippedRanks, OutputSettings, OvervoteRule, RoundTally, TabulationResult,
    TieBreakMode, WinnerElectionMode,
};
pub use decimal::VoteArithmetic;
pub use error::{EngineError, EngineResult};
pub use tabulator::{
    build_tally_to_candidates, CandidateStatus, Tabulator, VoteTransfers,
    EXHAUSTED_TRANSFER_LABEL,
};
pub use tiebreak::{NoOracle, TieBreakOracle};
pub use validate::{validate, ValidationReport};

use log::info;
use snafu::ensure;

/// The engine version; configurations must name it in `tabulatorVersion`.
pub const TABULATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Strings the vote-transfer ledger claims for itself. Compared
/// case-insensitively against labels, candidate names and codes.
pub const RESERVED_TALLY_STRINGS: [&str; 2] =
    [EXHAUSTED_TRANSFER_LABEL, EXPLICIT_OVERVOTE_LABEL];

/// Validates the configuration and tabulates the contest.
///
/// Every mode runs a single tabulation pass except sequential
/// winner-takes-all, which runs one single-winner pass per seat over a
/// pristine clone of the ballots, marking each pass's winner excluded for
/// the following passes.
pub fn run_contest(
    config: &ContestConfig,
    cvrs: Vec<CastVoteRecord>,
    oracle: &mut dyn TieBreakOracle,
) -> EngineResult<ContestOutcome> {
    let report = validate(config);
    ensure!(
        report.is_valid(),
        error::ConfigInvalidSnafu {
            problems: report.into_problems()
        }
    );

    if config.rules.winner_election_mode == WinnerElectionMode::MultiSeatSequentialWinnerTakesAll {
        let seats = config.rules.number_of_winners;
        let mut pass_config = config.clone();
        pass_config.rules.winner_election_mode = WinnerElectionMode::Standard;
        pass_config.rules.number_of_winners = 1;

        let mut passes: Vec<TabulationResult> = Vec::new();
        for pass in 1..=seats {
            info!("sequential tabulation pass {} of {}", pass, seats);
            let result = Tabulator::new(&pass_config, cvrs.clone()).tabulate(oracle)?;
            let winner = match result.winners_in_order().into_iter().next() {
                Some(winner) => winner,
                None => {
                    return Err(EngineError::TabulationInvariant {
                        round: result.num_rounds,
                        message: format!("sequential pass {} ended without a winner", pass),
                    })
                }
            };
            passes.push(result);
            for candidate in pass_config.candidates.iter_mut() {
                if candidate.identifier() == winner {
                    candidate.excluded = true;
                }
            }
        }
        Ok(ContestOutcome { passes })
    } else {
        let result = Tabulator::new(config, cvrs).tabulate(oracle)?;
        Ok(ContestOutcome {
            passes: vec![result],
        })
    }
}
