//! Election runner for the command line: reads the JSON contest
//! configuration and the cast vote record files, hands everything to the
//! `ranked_tabulation` engine, and renders the round-by-round summary as
//! JSON (RCVis-compatible).

pub mod config_reader;
pub mod io_cdf;
pub mod io_common;
pub mod io_csv;
pub mod io_ess;

use std::fs;

use log::{debug, info, warn};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::{ResultExt, Snafu};
use text_diff::print_diff;

use ranked_tabulation::{
    run_contest, CandidateRoster, CastVoteRecord, ContestConfig, ContestOutcome, EngineError,
    NoOracle, TabulationResult,
};

pub use config_reader::read_contest_config;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RcvError {
    #[snafu(display("could not open configuration file {}: {}", path, source))]
    OpeningConfig { path: String, source: std::io::Error },

    #[snafu(display("could not parse the configuration in {}: {}", path, source))]
    ParsingConfig {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display("could not open JSON file {}: {}", path, source))]
    OpeningJson { path: String, source: std::io::Error },

    #[snafu(display("could not parse JSON: {}", source))]
    ParsingJson { source: serde_json::Error },

    #[snafu(display("could not open spreadsheet {}: {}", path, source))]
    OpeningExcel {
        path: String,
        source: calamine::XlsxError,
    },

    #[snafu(display("spreadsheet {} has no readable worksheet", path))]
    EmptyExcel { path: String },

    #[snafu(display("could not open CSV file {}: {}", path, source))]
    OpeningCsv { path: String, source: csv::Error },

    #[snafu(display("could not read a record from {}: {}", path, source))]
    CsvRecord { path: String, source: csv::Error },

    #[snafu(display("line {} of {} is missing column {}", lineno, path, column))]
    ShortRow {
        path: String,
        lineno: usize,
        column: usize,
    },

    #[snafu(display("malformed CDF content in {}: {}", path, message))]
    CdfMalformed { path: String, message: String },

    #[snafu(display("unsupported CVR provider {:?} for {}", provider, path))]
    UnsupportedProvider { provider: String, path: String },

    #[snafu(display("could not write the summary to {}: {}", path, source))]
    WritingSummary { path: String, source: std::io::Error },

    #[snafu(display("{}", source))]
    Tabulation { source: EngineError },

    #[snafu(display("the tabulated summary differs from the reference summary"))]
    ReferenceMismatch,

    #[snafu(whatever, display("{}", message))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RcvResult<T> = Result<T, RcvError>;

/// Raw per-rank cells read out of a source file. All interpretation
/// (labels, write-ins, overvote sets) happens in the engine's ballot
/// module; readers only locate the cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBallot {
    pub id: Option<String>,
    pub precinct: Option<String>,
    pub choices: Vec<Vec<String>>,
}

/// Reads, validates and tabulates an election, then writes the summary.
///
/// `out_path` of `"stdout"` (or nothing) prints the summary; a reference
/// summary, when given, is compared structurally against the tabulated
/// one and any difference fails the run.
pub fn run_election(
    config_path: String,
    reference_path: Option<String>,
    out_path: Option<String>,
) -> RcvResult<()> {
    let contest = read_contest_config(&config_path)?;
    info!(
        "loaded contest config for {:?} with {} candidate(s) and {} source(s)",
        contest.output_settings.contest_name,
        contest.candidates.len(),
        contest.cvr_sources.len()
    );

    let report = ranked_tabulation::validate(&contest);
    if !report.is_valid() {
        return Err(RcvError::Tabulation {
            source: EngineError::ConfigInvalid {
                problems: report.into_problems(),
            },
        });
    }

    let cvrs = read_cast_vote_records(&contest)?;
    let outcome = run_contest(&contest, cvrs, &mut NoOracle).context(TabulationSnafu)?;
    for cvr in &outcome.final_pass().cvrs {
        debug!("{}", cvr.audit_string());
    }

    let summary = build_summary_js(&contest, &outcome);
    let rendered = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu)?;
    match &out_path {
        Some(path) if path.as_str() != "stdout" => {
            fs::write(path, &rendered).context(WritingSummarySnafu { path })?;
            info!("summary written to {}", path);
        }
        _ => println!("{}", rendered),
    }

    if let Some(reference) = reference_path {
        let reference_js = read_summary(&reference)?;
        if reference_js != summary {
            warn!("the tabulated summary differs from {}", reference);
            let reference_pretty =
                serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu)?;
            print_diff(reference_pretty.as_str(), rendered.as_str(), "\n");
            return Err(RcvError::ReferenceMismatch);
        }
        info!("summary matches the reference {}", reference);
    }

    Ok(())
}

/// Reads every configured source and interprets its rows into cast vote
/// records, generating record ids for readers that have none.
fn read_cast_vote_records(config: &ContestConfig) -> RcvResult<Vec<CastVoteRecord>> {
    let roster = CandidateRoster::from_config(config);
    let mut cvrs: Vec<CastVoteRecord> = Vec::new();
    for source in &config.cvr_sources {
        let path = config.resolve_path(&source.file_path).display().to_string();
        info!("reading cast vote records from {}", path);
        let parsed = if source.is_cdf() {
            io_cdf::read_cdf_json(&path)?
        } else {
            match source.provider.to_lowercase().as_str() {
                "ess" => io_ess::read_excel_file(&path, source)?,
                "csv" => io_csv::read_csv_ranking(&path, source)?,
                other => {
                    return UnsupportedProviderSnafu {
                        provider: other,
                        path,
                    }
                    .fail()
                }
            }
        };
        let file_name = io_common::simplify_file_name(&path);
        for (idx, ballot) in parsed.into_iter().enumerate() {
            let record_id = ballot
                .id
                .unwrap_or_else(|| format!("{}-{:08}", file_name, idx + 1));
            cvrs.push(CastVoteRecord::from_raw_choices(
                &file_name,
                &record_id,
                ballot.precinct,
                &ballot.choices,
                &config.rules,
                &roster,
            ));
        }
    }
    info!("read {} cast vote record(s)", cvrs.len());
    Ok(cvrs)
}

fn read_summary(path: &str) -> RcvResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu)
}

/// The summary JSON: contest metadata plus one entry per round with the
/// tally and the elected/eliminated results and their vote transfers.
fn build_summary_js(config: &ContestConfig, outcome: &ContestOutcome) -> JSValue {
    let result = outcome.final_pass();
    let roster = CandidateRoster::from_config(config);
    let threshold = result
        .thresholds
        .get(&result.num_rounds)
        .map(|t| t.to_string());
    json!({
        "config": {
            "contest": config.output_settings.contest_name,
            "date": config.output_settings.contest_date,
            "jurisdiction": config.output_settings.contest_jurisdiction,
            "office": config.output_settings.contest_office,
            "threshold": threshold,
        },
        "results": rounds_to_json(result, &roster),
    })
}

fn rounds_to_json(result: &TabulationResult, roster: &CandidateRoster) -> Vec<JSValue> {
    let mut rounds: Vec<JSValue> = Vec::new();
    for round in 1..=result.num_rounds {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        if let Some(round_tally) = result.round_tallies.get(&round) {
            for (candidate, votes) in round_tally {
                tally.insert(
                    roster.name_for(candidate).to_string(),
                    json!(votes.to_string()),
                );
            }
        }

        let mut tally_results: Vec<JSValue> = Vec::new();
        for (candidate, eliminated_round) in &result.eliminated_to_round {
            if *eliminated_round == round {
                tally_results.push(json!({
                    "eliminated": roster.name_for(candidate),
                    "transfers": transfers_to_json(result, round + 1, candidate, roster),
                }));
            }
        }
        for (candidate, won_round) in &result.winner_to_round {
            if *won_round == round {
                tally_results.push(json!({
                    "elected": roster.name_for(candidate),
                    "transfers": transfers_to_json(result, round + 1, candidate, roster),
                }));
            }
        }

        rounds.push(json!({
            "round": round,
            "tally": tally,
            "tallyResults": tally_results,
        }));
    }
    rounds
}

fn transfers_to_json(
    result: &TabulationResult,
    round: u32,
    from: &str,
    roster: &CandidateRoster,
) -> JSValue {
    let mut transfers: JSMap<String, JSValue> = JSMap::new();
    if let Some(outflows) = result.transfers.outflows(round, from) {
        for (to, amount) in outflows {
            transfers.insert(roster.name_for(to).to_string(), json!(amount.to_string()));
        }
    }
    JSValue::Object(transfers)
}
