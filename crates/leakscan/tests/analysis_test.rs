mod common;

use common::{fens_along, hero_game, MockEngine};
use leakscan::config::AnalyzeOptions;
use leakscan::engine::oracle::EngineOracle;
use leakscan::openings::{aggregate_positions, find_leaks, habitual_positions};
use leakscan::progress::Reporter;
use leakscan::report::PositionOutcome;
use leakscan::tactics::scan_missed_tactics;

use chess_core::position::{apply_token, fen, position_from_fen};

/// A player reaches the position after 1. e4 e5 in four games, plays Nf3
/// in three of them and a3 in one; Nf3 costs 150 cp against a 100 cp
/// threshold, so exactly one leak comes out.
#[tokio::test]
async fn repeated_opening_leak_is_flagged_once() {
    let games = vec![
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "a3"]),
    ];
    let fens = fens_along(&["e4", "e5", "Nf3"]);

    let engine = MockEngine::new();
    // Start position: playing e4 loses almost nothing.
    engine.script(&fens[0], 30, "e2e4");
    engine.script(&fens[1], -25, "e7e5");
    // After 1. e4 e5: the habitual Nf3 gives up 150 cp.
    engine.script(&fens[2], 80, "d2d4");
    engine.script(&fens[3], 70, "b8c6");
    let oracle = EngineOracle::new(engine);

    let opts = AnalyzeOptions::default().normalized();
    let reporter = Reporter::new(None);
    let mut diagnostics = Vec::new();

    let habitual = habitual_positions(aggregate_positions(&games, "hero", 24, &mut diagnostics));
    assert_eq!(habitual.len(), 2);

    let leaks = find_leaks(&habitual, &opts, &oracle, &reporter, &mut diagnostics).await;
    assert_eq!(leaks.len(), 1);

    let leak = &leaks[0];
    assert_eq!(leak.player_move, "Nf3");
    assert_eq!(leak.reach_count, 4);
    assert_eq!(leak.move_count, 3);
    assert_eq!(leak.centipawn_loss, 150);
    assert_eq!(leak.eval_before, 80);
    assert_eq!(leak.eval_after, -70);
    assert_eq!(leak.engine_best_move, "d2d4");
    assert_eq!(leak.side_to_move, "white");
    assert!(leak.tags.contains(&"Repeated Habit".to_string()));
    assert!(!leak.tags.is_empty() && leak.tags.len() <= 3);

    // Round-trip: the recorded move really takes fenBefore to fenAfter.
    let mut pos = position_from_fen(&leak.position_before).unwrap();
    apply_token(&mut pos, &leak.player_move).unwrap();
    assert_eq!(fen(&pos), leak.position_after);

    // Both habitual positions were judged and traced.
    let evaluated = diagnostics
        .iter()
        .filter(|d| matches!(d, PositionOutcome::Evaluated { .. }))
        .count();
    assert_eq!(evaluated, 2);
}

/// Below the habitual threshold nothing is ever flagged, no matter how bad
/// the move is.
#[tokio::test]
async fn positions_reached_twice_are_never_leaks() {
    let games = vec![
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "Nf3"]),
    ];
    let mut diagnostics = Vec::new();
    let habitual = habitual_positions(aggregate_positions(&games, "hero", 24, &mut diagnostics));
    assert!(habitual.is_empty());
}

/// Engine unreachable for every call: analysis still completes, with empty
/// findings and a missing_eval trace for every touched position.
#[tokio::test]
async fn unreachable_engine_degrades_to_diagnostics() {
    let games = vec![
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "Nf3"]),
        hero_game(&["e4", "e5", "Nf3", "Nc6", "Nc3", "Nf6"]),
    ];
    let oracle = EngineOracle::new(MockEngine::unreachable());
    let opts = AnalyzeOptions::default().normalized();
    let reporter = Reporter::new(None);
    let mut diagnostics = Vec::new();

    let habitual = habitual_positions(aggregate_positions(&games, "hero", 24, &mut diagnostics));
    let leaks = find_leaks(&habitual, &opts, &oracle, &reporter, &mut diagnostics).await;
    let scan = scan_missed_tactics(&games, "hero", &opts, &oracle, &reporter, &mut diagnostics)
        .await;

    assert!(leaks.is_empty());
    assert!(scan.tactics.is_empty());
    assert_eq!(scan.total_found, 0);
    assert!(!diagnostics.is_empty());
    for entry in &diagnostics {
        match entry {
            PositionOutcome::MissingEval { skipped_reason, .. } => {
                assert_eq!(*skipped_reason, "missing_eval");
            }
            other => panic!("expected missing_eval entries only, got {other:?}"),
        }
    }
}

/// After 1. e4 e5 2. Nf3 Nc6 the engine sees Nxe5 winning; the player
/// plays Nc3 instead and the swing confirms a missed tactic.
#[tokio::test]
async fn missed_tactic_is_confirmed_and_deduplicated() {
    let tokens = ["e4", "e5", "Nf3", "Nc6", "Nc3", "Nf6"];
    let mut game = hero_game(&tokens);
    // 15 s on the clock at the miss: low-time territory.
    game.clocks_centis = Some(vec![60000, 60000, 30000, 30000, 1500, 1500]);
    let games = vec![game.clone(), game];

    let fens = fens_along(&tokens);
    let engine = MockEngine::new();
    // Position before the miss: a forcing capture is best.
    engine.script(&fens[4], 400, "f3e5");
    // Position after Nc3, opponent to move.
    engine.script(&fens[5], -150, "g8f6");
    let stats = engine.stats();
    let oracle = EngineOracle::new(engine);

    let opts = AnalyzeOptions::default().normalized();
    let reporter = Reporter::new(None);
    let mut diagnostics = Vec::new();

    let scan = scan_missed_tactics(&games, "hero", &opts, &oracle, &reporter, &mut diagnostics)
        .await;

    // Reported once, counted twice (the second game repeats the key).
    assert_eq!(scan.tactics.len(), 1);
    assert_eq!(scan.total_found, 2);

    let tactic = &scan.tactics[0];
    assert_eq!(tactic.player_move, "Nc3");
    assert_eq!(tactic.engine_best_move, "f3e5");
    assert_eq!(tactic.eval_before, 400);
    assert_eq!(tactic.eval_after, 150);
    assert_eq!(tactic.centipawn_loss, 250);
    assert_eq!(tactic.game_index, 0);
    assert_eq!(tactic.ply_number, 5);
    assert_eq!(tactic.time_remaining_seconds, Some(15));
    assert!(tactic.tags.contains(&"Mistake".to_string()));
    assert!(tactic.tags.contains(&"Low Time".to_string()));

    // Round-trip: player's move reproduces the recorded after-position.
    let mut pos = position_from_fen(&tactic.position_before).unwrap();
    apply_token(&mut pos, &tactic.player_move).unwrap();
    assert_eq!(fen(&pos), tactic.position_after);

    // Both evaluations of the repeated position came from the cache.
    assert_eq!(stats.calls(), 2);
}

/// A position that was already lost is not a missed tactic.
#[tokio::test]
async fn lost_positions_are_not_missed_tactics() {
    let tokens = ["e4", "e5", "Nf3", "Nc6", "Nc3", "Nf6"];
    let games = vec![hero_game(&tokens)];

    let fens = fens_along(&tokens);
    let engine = MockEngine::new();
    // Forcing best move exists, but the player was already dead lost.
    engine.script(&fens[4], -450, "f3e5");
    engine.script(&fens[5], 800, "g8f6");
    let oracle = EngineOracle::new(engine);

    let opts = AnalyzeOptions::default().normalized();
    let reporter = Reporter::new(None);
    let mut diagnostics = Vec::new();

    let scan = scan_missed_tactics(&games, "hero", &opts, &oracle, &reporter, &mut diagnostics)
        .await;
    assert!(scan.tactics.is_empty());
    assert_eq!(scan.total_found, 0);
}

/// The scanner halts once the report list is full.
#[tokio::test]
async fn scanner_halts_at_max_tactics() {
    let first = ["e4", "e5", "Nf3", "Nc6", "Nc3", "Nf6"];
    let second = ["d4", "d5", "Nf3", "Nc6", "Nc3", "Nf6"];
    let games = vec![hero_game(&first), hero_game(&second)];

    let engine = MockEngine::new();
    let first_fens = fens_along(&first);
    let second_fens = fens_along(&second);
    engine.script(&first_fens[4], 400, "f3e5");
    engine.script(&first_fens[5], -150, "g8f6");
    engine.script(&second_fens[4], 400, "f3e5");
    engine.script(&second_fens[5], -150, "g8f6");
    let oracle = EngineOracle::new(engine);

    let mut opts = AnalyzeOptions::default().normalized();
    opts.max_tactics = 1;
    let reporter = Reporter::new(None);
    let mut diagnostics = Vec::new();

    let scan = scan_missed_tactics(&games, "hero", &opts, &oracle, &reporter, &mut diagnostics)
        .await;
    assert_eq!(scan.tactics.len(), 1);
    assert_eq!(scan.total_found, 1);
}
