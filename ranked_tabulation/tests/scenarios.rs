use ranked_tabulation::*;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

/// A contest over the given candidate names, with a source whose path
/// exists so validation stays quiet.
fn base_config(names: &[&str], winners: u32) -> ContestConfig {
    let mut source = CvrSource::new("csv", concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
    source.first_vote_column_index = Some(2);
    source.first_vote_row_index = Some(2);
    ContestConfig {
        tabulator_version: TABULATOR_VERSION.to_string(),
        output_settings: OutputSettings::named("scenario"),
        cvr_sources: vec![source],
        candidates: names.iter().map(|n| Candidate::new(n)).collect(),
        rules: ContestRules {
            number_of_winners: winners,
            ..ContestRules::default()
        },
        source_directory: None,
    }
}

/// `specs` is (multiplicity, ranked choices); an empty choice string
/// leaves that rank blank.
fn ballots(config: &ContestConfig, specs: &[(u32, &[&str])]) -> Vec<CastVoteRecord> {
    let roster = CandidateRoster::from_config(config);
    let mut cvrs = Vec::new();
    let mut next_id = 0u32;
    for (count, choices) in specs {
        let cells: Vec<Vec<String>> = choices.iter().map(|c| vec![c.to_string()]).collect();
        for _ in 0..*count {
            next_id += 1;
            cvrs.push(CastVoteRecord::from_raw_choices(
                "scenario.csv",
                &next_id.to_string(),
                None,
                &cells,
                &config.rules,
                &roster,
            ));
        }
    }
    cvrs
}

fn run(config: &ContestConfig, specs: &[(u32, &[&str])]) -> ContestOutcome {
    run_contest(config, ballots(config, specs), &mut NoOracle).unwrap()
}

fn round_tally<'a>(result: &'a TabulationResult, round: u32) -> &'a RoundTally {
    result.round_tallies.get(&round).unwrap()
}

fn votes(result: &TabulationResult, round: u32, candidate: &str) -> Decimal {
    round_tally(result, round)
        .get(candidate)
        .copied()
        .unwrap_or(Decimal::ZERO)
}

#[test]
fn scenario_single_seat_majority_in_round_one() {
    let config = base_config(&["A", "B", "C"], 1);
    let outcome = run(&config, &[(6, &["A"]), (3, &["B"]), (1, &["C"])]);
    let result = outcome.final_pass();

    assert_eq!(result.winner_to_round.get("A"), Some(&1));
    assert!(result.eliminated_to_round.is_empty());
    assert_eq!(result.num_rounds, 1);
    assert_eq!(result.thresholds.get(&1), Some(&dec("5")));
    assert_eq!(votes(result, 1, "A"), dec("6"));
    assert_eq!(votes(result, 1, "B"), dec("3"));
    assert_eq!(votes(result, 1, "C"), dec("1"));
}

#[test]
fn scenario_transfer_after_elimination_with_seeded_tiebreak() {
    let mut config = base_config(&["A", "B", "C"], 1);
    config.rules.tiebreak_mode = TieBreakMode::Random;
    config.rules.random_seed = Some(1);
    let specs: &[(u32, &[&str])] = &[
        (4, &["A", "B"]),
        (3, &["B", "A"]),
        (2, &["C", "A"]),
        (1, &["C", "B"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    // round 1 is a 3-3 tie for last place between B and C
    assert_eq!(votes(result, 1, "A"), dec("4"));
    assert_eq!(votes(result, 1, "B"), dec("3"));
    assert_eq!(votes(result, 1, "C"), dec("3"));
    assert_eq!(result.eliminated_to_round.len(), 1);
    let loser = result.eliminated_to_round.keys().next().unwrap().clone();
    assert_eq!(result.eliminated_to_round.get(&loser), Some(&1));
    assert!(loser == "B" || loser == "C");

    // whichever way the seeded tie-break went, A passes the 5-vote
    // threshold in round 2 on the transfers
    assert_eq!(result.winner_to_round.get("A"), Some(&2));
    if loser == "C" {
        assert_eq!(votes(result, 2, "A"), dec("6"));
        assert_eq!(votes(result, 2, "B"), dec("4"));
        let from_c = result.transfers.outflows(2, "C").unwrap();
        assert_eq!(from_c.get("A"), Some(&dec("2")));
        assert_eq!(from_c.get("B"), Some(&dec("1")));
    } else {
        assert_eq!(votes(result, 2, "A"), dec("7"));
        assert_eq!(votes(result, 2, "C"), dec("3"));
        assert_eq!(
            result.transfers.outflows(2, "B").unwrap().get("A"),
            Some(&dec("3"))
        );
    }
}

#[test]
fn scenario_batch_elimination_clears_the_tail() {
    let mut config = base_config(&["A", "B", "C", "D"], 1);
    config.rules.batch_elimination = true;
    // keep counting past a majority so the batch pass gets to run
    config.rules.winner_election_mode =
        WinnerElectionMode::SingleSeatContinueUntilTwoCandidatesRemain;
    let outcome = run(
        &config,
        &[(10, &["A"]), (1, &["B"]), (2, &["C"]), (3, &["D"])],
    );
    let result = outcome.final_pass();

    assert_eq!(result.eliminated_to_round.get("B"), Some(&1));
    assert_eq!(result.eliminated_to_round.get("C"), Some(&1));
    assert_eq!(result.eliminated_to_round.get("D"), Some(&1));
    assert_eq!(result.winner_to_round.get("A"), Some(&2));
    assert_eq!(result.num_rounds, 2);
}

#[test]
fn scenario_explicit_overvote_exhausts_immediately() {
    let mut config = base_config(&["A", "B"], 1);
    config.rules.overvote_label = Some("OV".to_string());
    config.rules.overvote_rule = OvervoteRule::ExhaustImmediately;
    let outcome = run(&config, &[(1, &["OV", "A"]), (2, &["A"]), (1, &["B"])]);
    let result = outcome.final_pass();

    // the overvoted ballot never counts
    assert_eq!(votes(result, 1, "A"), dec("2"));
    let overvoted = &result.cvrs[0];
    assert!(overvoted.is_exhausted());
    assert_eq!(
        overvoted.audit_trail(),
        &[RoundOutcome {
            round: 1,
            outcome: VoteOutcome::Exhausted {
                reason: "overvote".to_string()
            },
        }]
    );
    assert_eq!(result.winner_to_round.get("A"), Some(&1));
}

#[test]
fn scenario_explicit_overvote_can_skip_to_next_rank() {
    let mut config = base_config(&["A", "B"], 1);
    config.rules.overvote_label = Some("OV".to_string());
    config.rules.overvote_rule = OvervoteRule::AlwaysSkipToNextRank;
    let outcome = run(&config, &[(1, &["OV", "A"]), (2, &["A"]), (1, &["B"])]);
    let result = outcome.final_pass();

    assert_eq!(votes(result, 1, "A"), dec("3"));
    let skipped = &result.cvrs[0];
    assert!(!skipped.is_exhausted());
    assert_eq!(
        skipped.audit_trail(),
        &[RoundOutcome {
            round: 1,
            outcome: VoteOutcome::CountedFor {
                candidate: "A".to_string()
            },
        }]
    );
}

#[test]
fn scenario_multi_seat_fractional_surplus() {
    let config = base_config(&["A", "B", "C"], 2);
    let outcome = run(&config, &[(70, &["A", "B"]), (30, &["B", "A"])]);
    let result = outcome.final_pass();

    assert_eq!(result.thresholds.get(&1), Some(&dec("33.3333")));
    assert_eq!(result.winner_to_round.get("A"), Some(&1));
    assert_eq!(result.winner_to_round.get("B"), Some(&2));

    // surplus 36.6667 over 70 votes keeps 0.5238 of each ballot
    let a_first = result
        .cvrs
        .iter()
        .find(|cvr| {
            matches!(
                cvr.audit_trail().first(),
                Some(RoundOutcome {
                    outcome: VoteOutcome::CountedFor { candidate },
                    ..
                }) if candidate == "A"
            )
        })
        .unwrap();
    assert_eq!(a_first.fractional_transfer_value(), dec("0.5238"));
    assert_eq!(votes(result, 2, "B"), dec("66.6660"));
}

#[test]
fn scenario_bottoms_up_elects_the_survivors() {
    let mut config = base_config(&["A", "B", "C"], 2);
    config.rules.winner_election_mode = WinnerElectionMode::MultiSeatBottomsUp;
    let outcome = run(&config, &[(5, &["A"]), (3, &["B"]), (2, &["C"])]);
    let result = outcome.final_pass();

    assert_eq!(result.eliminated_to_round.get("C"), Some(&1));
    assert_eq!(result.winner_to_round.get("A"), Some(&1));
    assert_eq!(result.winner_to_round.get("B"), Some(&1));
    assert_eq!(result.num_rounds, 1);
    // no surplus transfer happened: every counted ballot still carries
    // its full vote
    assert!(result
        .cvrs
        .iter()
        .all(|cvr| cvr.fractional_transfer_value() == Decimal::ONE));
}

#[test]
fn scenario_duplicate_candidate_exhausts_when_enabled() {
    let mut config = base_config(&["A", "B", "C"], 1);
    config.rules.exhaust_on_duplicate_candidate = true;
    let specs: &[(u32, &[&str])] = &[
        (1, &["A", "A", "B"]),
        (2, &["B"]),
        (2, &["C"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    // A goes out first; the repeated-A ballot then exhausts instead of
    // reaching B
    assert_eq!(result.eliminated_to_round.get("A"), Some(&1));
    let repeated = &result.cvrs[0];
    assert!(repeated.is_exhausted());
    assert!(repeated.audit_trail().iter().any(|entry| matches!(
        &entry.outcome,
        VoteOutcome::Exhausted { reason } if reason == "duplicate candidate"
    )));
}

#[test]
fn scenario_duplicate_candidate_skips_when_disabled() {
    let config = base_config(&["A", "B", "C"], 1);
    let specs: &[(u32, &[&str])] = &[
        (1, &["A", "A", "B"]),
        (2, &["B"]),
        (2, &["C"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    assert_eq!(result.eliminated_to_round.get("A"), Some(&1));
    let repeated = &result.cvrs[0];
    // the second A is just skipped; the ballot lands on B in round 2
    assert!(repeated.audit_trail().iter().any(|entry| matches!(
        &entry.outcome,
        VoteOutcome::CountedFor { candidate } if candidate == "B"
    )));
}

#[test]
fn scenario_skipped_ranks_exhaust_past_the_limit() {
    let mut config = base_config(&["A", "B", "C"], 1);
    config.rules.max_skipped_ranks_allowed = MaxSkippedRanks::Limit(0);
    let specs: &[(u32, &[&str])] = &[
        (1, &["A", "", "B"]),
        (2, &["B"]),
        (2, &["C"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    assert_eq!(result.eliminated_to_round.get("A"), Some(&1));
    let gappy = &result.cvrs[0];
    assert!(gappy.is_exhausted());
    assert!(gappy.audit_trail().iter().any(|entry| matches!(
        &entry.outcome,
        VoteOutcome::Exhausted { reason } if reason == "undervote"
    )));
}

#[test]
fn scenario_write_ins_are_tallied_then_dropped() {
    let mut config = base_config(&["A", "B"], 1);
    config.rules.undeclared_write_in_label = Some("Undeclared Write-ins".to_string());
    let outcome = run(&config, &[(2, &["Zorro"]), (3, &["A"]), (2, &["B"])]);
    let result = outcome.final_pass();

    assert_eq!(votes(result, 1, "Undeclared Write-ins"), dec("2"));
    assert_eq!(
        result.eliminated_to_round.get("Undeclared Write-ins"),
        Some(&1)
    );
    assert_eq!(result.winner_to_round.get("A"), Some(&2));
    assert!(result.winner_to_round.get("Undeclared Write-ins").is_none());
}

#[test]
fn scenario_continue_until_two_ignores_the_threshold() {
    let mut config = base_config(&["A", "B", "C", "D"], 1);
    config.rules.winner_election_mode =
        WinnerElectionMode::SingleSeatContinueUntilTwoCandidatesRemain;
    let specs: &[(u32, &[&str])] = &[
        (4, &["A"]),
        (3, &["B", "A"]),
        (2, &["C", "B"]),
        (1, &["D", "C"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    assert_eq!(result.eliminated_to_round.get("D"), Some(&1));
    assert_eq!(result.eliminated_to_round.get("C"), Some(&2));
    // with two candidates left, B leads 5 to 4 and takes the seat
    assert_eq!(votes(result, 3, "B"), dec("5"));
    assert_eq!(votes(result, 3, "A"), dec("4"));
    assert_eq!(result.winner_to_round.get("B"), Some(&3));
}

#[test]
fn scenario_one_winner_per_round_defers_the_second() {
    let mut config = base_config(&["A", "B", "C"], 2);
    config.rules.winner_election_mode =
        WinnerElectionMode::MultiSeatAllowOnlyOneWinnerPerRound;
    let specs: &[(u32, &[&str])] = &[
        (40, &["A", "B"]),
        (35, &["B", "A"]),
        (25, &["C", "B"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    // A and B both clear 33.3333 in round 1; only A (the higher tally)
    // is elected, B waits for round 2
    assert_eq!(result.winner_to_round.get("A"), Some(&1));
    assert_eq!(result.winner_to_round.get("B"), Some(&2));
    assert_eq!(result.eliminated_to_round.len(), 0);
}

#[test]
fn scenario_sequential_winner_takes_all_runs_fresh_passes() {
    let mut config = base_config(&["A", "B", "C"], 2);
    config.rules.winner_election_mode =
        WinnerElectionMode::MultiSeatSequentialWinnerTakesAll;
    let specs: &[(u32, &[&str])] = &[(5, &["A", "B"]), (4, &["B"]), (3, &["C"])];
    let outcome = run(&config, specs);

    assert_eq!(outcome.passes.len(), 2);
    assert_eq!(outcome.winners(), vec!["A".to_string(), "B".to_string()]);

    // pass 2 starts over with A excluded: the A>B ballots count for B
    // from round 1
    let second = &outcome.passes[1];
    assert_eq!(second.winner_to_round.get("B"), Some(&1));
    assert_eq!(votes(second, 1, "B"), dec("9"));
    // each pass gets a pristine ballot set
    assert!(second.cvrs.iter().all(|cvr| cvr.fractional_transfer_value() == Decimal::ONE));
}

#[test]
fn scenario_precinct_tallies_mirror_the_contest() {
    let mut config = base_config(&["A", "B"], 1);
    config.output_settings.tabulate_by_precinct = true;
    config.cvr_sources[0].precinct_column_index = Some(1);

    let roster = CandidateRoster::from_config(&config);
    let mut cvrs = Vec::new();
    for (id, precinct, choice) in [
        (1, "P-1", "A"),
        (2, "P-1", "A"),
        (3, "P-1", "B"),
        (4, "P-2", "A"),
        (5, "P-2", "B"),
    ] {
        cvrs.push(CastVoteRecord::from_raw_choices(
            "scenario.csv",
            &id.to_string(),
            Some(precinct.to_string()),
            &[vec![choice.to_string()]],
            &config.rules,
            &roster,
        ));
    }
    let outcome = run_contest(&config, cvrs, &mut NoOracle).unwrap();
    let result = outcome.final_pass();

    let p1 = result.precinct_round_tallies.get("P-1").unwrap();
    let p2 = result.precinct_round_tallies.get("P-2").unwrap();
    assert_eq!(p1.get(&1).unwrap().get("A"), Some(&dec("2")));
    assert_eq!(p1.get(&1).unwrap().get("B"), Some(&dec("1")));
    assert_eq!(p2.get(&1).unwrap().get("A"), Some(&dec("1")));
    assert_eq!(p2.get(&1).unwrap().get("B"), Some(&dec("1")));

    // per-precinct tallies sum to the contest tally
    let total_a: Decimal = [p1, p2]
        .iter()
        .map(|p| p.get(&1).unwrap().get("A").copied().unwrap_or(Decimal::ZERO))
        .sum();
    assert_eq!(total_a, votes(result, 1, "A"));
}

#[test]
fn scenario_identical_inputs_produce_identical_outputs() {
    let mut config = base_config(&["A", "B", "C"], 1);
    config.rules.tiebreak_mode = TieBreakMode::Random;
    config.rules.random_seed = Some(1);
    let specs: &[(u32, &[&str])] = &[
        (4, &["A", "B"]),
        (3, &["B", "A"]),
        (2, &["C", "A"]),
        (1, &["C", "B"]),
    ];
    let first = run(&config, specs);
    let second = run(&config, specs);
    assert_eq!(first, second);
}

#[test]
fn scenario_round_totals_never_grow() {
    let mut config = base_config(&["A", "B", "C"], 1);
    config.rules.tiebreak_mode = TieBreakMode::Random;
    config.rules.random_seed = Some(7);
    let specs: &[(u32, &[&str])] = &[
        (4, &["A"]),
        (3, &["B", "A"]),
        (2, &["C"]),
        (1, &["C", "B"]),
    ];
    let outcome = run(&config, specs);
    let result = outcome.final_pass();

    let sum = |round: u32| -> Decimal {
        round_tally(result, round)
            .values()
            .copied()
            .fold(Decimal::ZERO, |a, b| a + b)
    };
    let first = sum(1);
    for round in 2..=result.num_rounds {
        assert!(sum(round) <= first);
    }
}

#[test]
fn invalid_configurations_never_tabulate() {
    let mut config = base_config(&["A", "B"], 1);
    config.tabulator_version = "not-this-version".to_string();
    let cvrs = ballots(&config, &[(1, &["A"])]);
    let err = run_contest(&config, cvrs, &mut NoOracle).unwrap_err();
    assert!(matches!(err, EngineError::ConfigInvalid { .. }));
}
