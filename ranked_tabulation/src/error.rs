use snafu::Snafu;

/// Errors surfaced by the engine.
///
/// `ConfigInvalid` carries the full violation list collected by the
/// validator. `TabulationInvariant` indicates a programming defect (an
/// elimination round that removed nobody, an overvote marker sharing a
/// rank with a candidate); round tallies computed before the failure
/// remain readable on the tabulator for post-mortem audit.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngineError {
    #[snafu(display("contest configuration failed validation:\n{}", problems.join("\n")))]
    ConfigInvalid { problems: Vec<String> },

    #[snafu(display("tabulation invariant violated in round {round}: {message}"))]
    TabulationInvariant { round: u32, message: String },

    #[snafu(display("tie-break did not resolve to one of the tied candidates: {candidates:?}"))]
    TieBreakUnresolved { candidates: Vec<String> },
}

pub type EngineResult<T> = Result<T, EngineError>;
