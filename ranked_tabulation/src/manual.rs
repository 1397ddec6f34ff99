/*!

This is the long-form manual for `ranked_tabulation` and `rcvtally`.

## Input formats

The following providers are supported by the `rcvtally` front-end:
* `ess` ES&S-style Excel spreadsheets (.xlsx)
* `csv` Comma Separated Values ranking files
* `CDF` NIST Common Data Format (JSON notation, one contest)

For `ess` and `csv`, each row is one ballot and the ranking cells run from
`firstVoteColumnIndex` to the end of the row. `idColumnIndex` and
`precinctColumnIndex` pick out the optional ballot id and precinct
columns. A cell holding several marks separated by `overvoteDelimiter` is
read as an overvote at that rank.

## Configuration

The configuration file follows the JSON layout of the
[RCTab configuration documentation](https://github.com/BrightSpots/rcv/blob/develop/config_file_documentation.txt).
The options recognized by the engine:

| Option | Meaning |
|--------|---------|
| `tabulatorVersion` | must equal this engine's version |
| `outputSettings.contestName` | required contest name |
| `outputSettings.tabulateByPrecinct` | also tally each precinct separately |
| `cvrFileSources` | the ballot files, with their cell coordinates |
| `candidates` | declared candidates: `name`, optional `code`, `excluded` |
| `rules.tiebreakMode` | `random`, `stopCountingAndAsk`, `previousRoundCountsThenRandom`, `previousRoundCountsThenAsk`, `useCandidateOrder`, `generatePermutation` |
| `rules.overvoteRule` | `exhaustImmediately`, `alwaysSkipToNextRank`, `exhaustIfAnyContinuing`, `ignoreIfAnyContinuing`, `exhaustIfMultipleContinuing`, `ignoreIfMultipleContinuing` |
| `rules.winnerElectionMode` | `standard`, `singleSeatContinueUntilTwoCandidatesRemain`, `multiSeatAllowOnlyOneWinnerPerRound`, `multiSeatBottomsUp`, `multiSeatSequentialWinnerTakesAll` |
| `rules.numberOfWinners` | seats to fill |
| `rules.decimalPlacesForVoteArithmetic` | fixed scale (1 to 20) for all vote arithmetic |
| `rules.minimumVoteThreshold` | eliminate everybody below this count |
| `rules.maxRankingsAllowed` | `"max"` or a ranking cutoff |
| `rules.maxSkippedRanksAllowed` | `"unlimited"` or a gap tolerance |
| `rules.batchElimination` | eliminate all mathematically-unable candidates at once |
| `rules.exhaustOnDuplicateCandidate` | exhaust a ballot that repeats a candidate |
| `rules.hareQuota` | divide by seats instead of seats + 1 |
| `rules.treatBlankAsUndeclaredWriteIn` | blank cells count as write-ins |
| `rules.undeclaredWriteInLabel`, `overvoteLabel`, `undervoteLabel` | reserved marker strings |
| `rules.randomSeed` | required by the randomized tie-break modes |

Every option is checked by [`crate::validate::validate`] before
tabulation; the validator reports every violation it finds, not just the
first.

## Determinism

Two runs over the same configuration and ballot files produce identical
results, bit for bit: vote arithmetic is fixed-scale decimal with
truncation, candidate iteration follows the configured order, and the
randomized tie-break modes draw from a seeded generator.

*/
