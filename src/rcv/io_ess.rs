//! Reader for ES&S-style cast vote record spreadsheets (xlsx).
//!
//! Each data row is one ballot; ranking cells run from
//! `firstVoteColumnIndex` to the end of the row, and the optional id and
//! precinct columns are picked out by index. Cells are passed through as
//! raw strings; the engine interprets labels and write-ins.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use snafu::{OptionExt, ResultExt};

use ranked_tabulation::CvrSource;

use crate::rcv::io_common::split_marks;
use crate::rcv::{EmptyExcelSnafu, OpeningExcelSnafu, ParsedBallot, RcvResult};

pub fn read_excel_file(path: &str, source: &CvrSource) -> RcvResult<Vec<ParsedBallot>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let range = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;

    let first_vote_row = source.first_vote_row_index.unwrap_or(1) as usize;
    let first_vote_column = source.first_vote_column_index.unwrap_or(1) as usize - 1;
    let id_column = source.id_column_index.map(|c| c as usize - 1);
    let precinct_column = source.precinct_column_index.map(|c| c as usize - 1);

    let mut ballots: Vec<ParsedBallot> = Vec::new();
    for row in range.rows().skip(first_vote_row - 1) {
        let id = id_column
            .and_then(|column| row.get(column))
            .map(cell_to_string)
            .filter(|id| !id.is_empty());
        let precinct = precinct_column
            .and_then(|column| row.get(column))
            .map(cell_to_string)
            .filter(|precinct| !precinct.is_empty());
        let choices: Vec<Vec<String>> = row
            .iter()
            .skip(first_vote_column)
            .map(|cell| split_marks(&cell_to_string(cell), &source.overvote_delimiter))
            .collect();
        ballots.push(ParsedBallot {
            id,
            precinct,
            choices,
        });
    }
    Ok(ballots)
}

/// Renders a cell the way it reads in the sheet; whole floats drop the
/// trailing ".0" the xlsx format stores them with.
fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Empty => String::new(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
