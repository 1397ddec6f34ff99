//! Reader for cast vote records in the NIST Common Data Format (JSON
//! notation, single contest).

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use crate::rcv::{CdfMalformedSnafu, OpeningJsonSnafu, ParsingJsonSnafu, ParsedBallot, RcvResult};

pub fn read_cdf_json(path: &str) -> RcvResult<Vec<ParsedBallot>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let report: CastVoteRecordReport =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu)?;

    let election = report.elections.first().context(CdfMalformedSnafu {
        path,
        message: "the report holds no election",
    })?;

    // candidate id -> name, then contest selection id -> name
    let mut candidate_names: HashMap<&str, &str> = HashMap::new();
    for candidate in &election.candidates {
        candidate_names.insert(candidate.id.as_str(), candidate.name.as_str());
    }
    let mut selection_names: HashMap<&str, &str> = HashMap::new();
    for contest in &election.contests {
        for selection in &contest.contest_selections {
            for candidate_id in &selection.candidate_ids {
                let name = candidate_names
                    .get(candidate_id.as_str())
                    .context(CdfMalformedSnafu {
                        path,
                        message: format!("selection references unknown candidate {}", candidate_id),
                    })?;
                selection_names.insert(selection.id.as_str(), *name);
            }
        }
    }

    let mut ballots: Vec<ParsedBallot> = Vec::new();
    for cvr in &report.cvrs {
        for snapshot in &cvr.snapshots {
            for contest in &snapshot.contests {
                let mut ranked: Vec<(u32, &str)> = Vec::new();
                for selection in &contest.selections {
                    let name = selection_names
                        .get(selection.selection_id.as_str())
                        .context(CdfMalformedSnafu {
                            path,
                            message: format!(
                                "vote references unknown selection {}",
                                selection.selection_id
                            ),
                        })?;
                    for position in &selection.positions {
                        ranked.push((position.rank, *name));
                    }
                }
                let max_rank = ranked.iter().map(|(rank, _)| *rank).max().unwrap_or(0);
                let mut choices: Vec<Vec<String>> = vec![Vec::new(); max_rank as usize];
                for (rank, name) in ranked {
                    if let Some(cells) = choices.get_mut(rank as usize - 1) {
                        cells.push(name.to_string());
                    }
                }
                ballots.push(ParsedBallot {
                    id: cvr.ballot_id.clone().filter(|id| !id.is_empty()),
                    precinct: None,
                    choices,
                });
            }
        }
    }
    Ok(ballots)
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct SelectionPosition {
    #[serde(rename = "Rank")]
    rank: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct ContestSelectionVote {
    #[serde(rename = "ContestSelectionId")]
    selection_id: String,
    #[serde(rename = "SelectionPosition")]
    positions: Vec<SelectionPosition>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct ContestVote {
    #[serde(rename = "CVRContestSelection")]
    selections: Vec<ContestSelectionVote>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(rename = "CVRContest")]
    contests: Vec<ContestVote>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Cvr {
    #[serde(rename = "BallotPrePrintedId")]
    ballot_id: Option<String>,
    #[serde(rename = "CVRSnapshot")]
    snapshots: Vec<Snapshot>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct CdfCandidate {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct ContestSelection {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "CandidateIds")]
    candidate_ids: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct CdfContest {
    #[serde(rename = "ContestSelection")]
    contest_selections: Vec<ContestSelection>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Election {
    #[serde(rename = "Candidate")]
    candidates: Vec<CdfCandidate>,
    #[serde(rename = "Contest")]
    contests: Vec<CdfContest>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct CastVoteRecordReport {
    #[serde(rename = "Election")]
    elections: Vec<Election>,
    #[serde(rename = "CVR")]
    cvrs: Vec<Cvr>,
}
