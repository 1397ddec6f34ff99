//! Reader for plain CSV ranking files: one ballot per line, one choice
//! per column starting at `firstVoteColumnIndex`.

use snafu::{OptionExt, ResultExt};

use ranked_tabulation::CvrSource;

use crate::rcv::io_common::split_marks;
use crate::rcv::{CsvRecordSnafu, OpeningCsvSnafu, ParsedBallot, RcvResult, ShortRowSnafu};

pub fn read_csv_ranking(path: &str, source: &CvrSource) -> RcvResult<Vec<ParsedBallot>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;

    let first_vote_row = source.first_vote_row_index.unwrap_or(1) as usize;
    let first_vote_column = source.first_vote_column_index.unwrap_or(1) as usize - 1;

    let mut ballots: Vec<ParsedBallot> = Vec::new();
    for (idx, record) in reader.into_records().enumerate() {
        // row numbering follows spreadsheet conventions, starting at 1
        let lineno = idx + 1;
        if lineno < first_vote_row {
            continue;
        }
        let record = record.context(CsvRecordSnafu { path })?;

        let id = match source.id_column_index {
            Some(column) => Some(
                record
                    .get(column as usize - 1)
                    .context(ShortRowSnafu {
                        path,
                        lineno,
                        column: column as usize,
                    })?
                    .trim()
                    .to_string(),
            ),
            None => None,
        };
        let precinct = match source.precinct_column_index {
            Some(column) => Some(
                record
                    .get(column as usize - 1)
                    .context(ShortRowSnafu {
                        path,
                        lineno,
                        column: column as usize,
                    })?
                    .trim()
                    .to_string(),
            ),
            None => None,
        };

        let choices: Vec<Vec<String>> = record
            .iter()
            .skip(first_vote_column)
            .map(|cell| split_marks(cell, &source.overvote_delimiter))
            .collect();

        ballots.push(ParsedBallot {
            id: id.filter(|s| !s.is_empty()),
            precinct: precinct.filter(|s| !s.is_empty()),
            choices,
        });
    }
    Ok(ballots)
}
