//! Opening leak aggregation.
//!
//! Pass one replays every game's opening plies and buckets the positions
//! where the tracked player was to move, keyed by canonical position key.
//! Pass two takes the habitually reached positions, evaluates the player's
//! usual move there, and flags the ones that repeatedly give up evaluation.

use std::collections::HashMap;

use shakmaty::{Chess, Color, Position};
use tracing::{debug, warn};

use chess_core::game_data::SourceGame;
use chess_core::position as board;

use crate::config::AnalyzeOptions;
use crate::engine::oracle::{EngineEvaluation, EngineOracle};
use crate::engine::uci::EngineBackend;
use crate::error::AnalysisError;
use crate::progress::{Phase, Reporter};
use crate::report::{PositionOutcome, RepeatedOpeningLeak};
use crate::tags;

/// Positions reached at least this often count as habitual; a one-off
/// deviation is not a leak.
pub const HABITUAL_REACH_COUNT: u32 = 3;

/// One player-to-move position accumulated across games.
#[derive(Debug, Clone)]
pub struct AggregatedPosition {
    pub key: String,
    /// Full FEN from the first game that reached this position.
    pub fen: String,
    pub total_reach_count: u32,
    /// Move token → occurrence count, in first-encounter order.
    pub move_counts: Vec<(String, u32)>,
}

impl AggregatedPosition {
    /// The plurality move; ties break toward the earliest-seen move.
    pub fn chosen_move(&self) -> Option<(&str, u32)> {
        let mut chosen: Option<(&str, u32)> = None;
        for (token, count) in &self.move_counts {
            if chosen.map_or(true, |(_, best)| *count > best) {
                chosen = Some((token, *count));
            }
        }
        chosen
    }
}

/// Ingestion pass: walk each game's opening plies and count the player's
/// choices per position. Replay failures truncate the offending game and
/// land in diagnostics; they never abort the pass.
pub fn aggregate_positions(
    games: &[SourceGame],
    identifier: &str,
    max_plies: usize,
    diagnostics: &mut Vec<PositionOutcome>,
) -> Vec<AggregatedPosition> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut positions: Vec<AggregatedPosition> = Vec::new();

    for game in games {
        let Some(color) = game.color_of(identifier) else {
            continue;
        };

        let mut pos = Chess::default();
        for token in game.moves.iter().take(max_plies) {
            let player_to_move = pos.turn() == color;
            if player_to_move {
                record_choice(&mut index, &mut positions, &pos, token);
            }
            if board::apply_token(&mut pos, token).is_err() {
                diagnostics.push(PositionOutcome::invalid_move(
                    board::position_key(&pos),
                    token.clone(),
                ));
                break;
            }
        }
    }

    positions
}

fn record_choice(
    index: &mut HashMap<String, usize>,
    positions: &mut Vec<AggregatedPosition>,
    pos: &Chess,
    token: &str,
) {
    let key = board::position_key(pos);
    let idx = match index.get(&key) {
        Some(&idx) => idx,
        None => {
            let idx = positions.len();
            positions.push(AggregatedPosition {
                key: key.clone(),
                fen: board::fen(pos),
                total_reach_count: 0,
                move_counts: Vec::new(),
            });
            index.insert(key, idx);
            idx
        }
    };

    let slot = &mut positions[idx];
    slot.total_reach_count += 1;
    match slot.move_counts.iter_mut().find(|(t, _)| t == token) {
        Some((_, count)) => *count += 1,
        None => slot.move_counts.push((token.to_string(), 1)),
    }
}

/// Keep only habitually reached positions, in first-reach order.
pub fn habitual_positions(positions: Vec<AggregatedPosition>) -> Vec<AggregatedPosition> {
    positions
        .into_iter()
        .filter(|p| p.total_reach_count >= HABITUAL_REACH_COUNT)
        .collect()
}

/// Evaluation pass over the habitual positions. Per-position failures
/// degrade into diagnostics; the pass itself cannot fail.
pub async fn find_leaks<B: EngineBackend>(
    habitual: &[AggregatedPosition],
    opts: &AnalyzeOptions,
    oracle: &EngineOracle<B>,
    reporter: &Reporter,
    diagnostics: &mut Vec<PositionOutcome>,
) -> Vec<RepeatedOpeningLeak> {
    let mut leaks = Vec::new();
    let total = habitual.len() as u32;

    for (i, agg) in habitual.iter().enumerate() {
        reporter.step(
            Phase::Eval,
            format!("evaluating repeated position {}", agg.key),
            (i + 1) as u32,
            total,
        );

        let Some((token, move_count)) = agg.chosen_move() else {
            continue;
        };

        let Some(pos) = board::position_from_fen(&agg.fen) else {
            diagnostics.push(PositionOutcome::invalid_move(
                agg.key.clone(),
                token.to_string(),
            ));
            continue;
        };

        let mut after = pos.clone();
        let mv = match board::apply_token(&mut after, token) {
            Ok(mv) => mv,
            Err(err) => {
                warn!(key = %agg.key, error = %AnalysisError::from(err), "skipping position");
                diagnostics.push(PositionOutcome::invalid_move(
                    agg.key.clone(),
                    token.to_string(),
                ));
                continue;
            }
        };
        let fen_after = board::fen(&after);

        let Some(before) = usable(oracle.evaluate(&agg.fen, opts.engine_depth).await, &agg.key)
        else {
            diagnostics.push(PositionOutcome::missing_eval(agg.key.clone()));
            continue;
        };
        let Some(after_eval) = usable(
            oracle.evaluate(&fen_after, opts.engine_depth).await,
            &agg.key,
        ) else {
            diagnostics.push(PositionOutcome::missing_eval(agg.key.clone()));
            continue;
        };

        // At an aggregated position the player is the side to move, so the
        // before score is already player-relative; after the move it is the
        // opponent's turn and the sign flips.
        let eval_before = before.cp;
        let eval_after = -after_eval.cp;
        let centipawn_loss = eval_before - eval_after;
        let flagged = centipawn_loss > opts.cp_loss_threshold;

        diagnostics.push(PositionOutcome::Evaluated {
            key: agg.key.clone(),
            player_move: token.to_string(),
            engine_best_move: before.best_move.clone(),
            eval_before,
            eval_after,
            centipawn_loss,
            flagged,
        });

        if !flagged {
            continue;
        }

        let share = f64::from(move_count) / f64::from(agg.total_reach_count);
        let leak_tags = tags::opening_tags(&pos, &mv, before.best_move.as_deref(), share);
        let side = match pos.turn() {
            Color::White => "white",
            Color::Black => "black",
        };

        debug!(key = %agg.key, centipawn_loss, "flagged opening leak");
        leaks.push(RepeatedOpeningLeak {
            position_before: agg.fen.clone(),
            position_after: fen_after,
            player_move: token.to_string(),
            engine_best_move: before.best_move.clone().unwrap_or_default(),
            tags: leak_tags,
            reach_count: agg.total_reach_count,
            move_count,
            centipawn_loss,
            eval_before,
            eval_after,
            side_to_move: side,
            player_color: side,
        });
    }

    leaks
}

/// Flatten an oracle response into a usable evaluation; unavailable or
/// scoreless answers become a skip, never an abort.
pub(crate) fn usable(
    result: Result<Option<EngineEvaluation>, AnalysisError>,
    key: &str,
) -> Option<EngineEvaluation> {
    match result {
        Ok(Some(eval)) => Some(eval),
        Ok(None) => None,
        Err(err) => {
            warn!(%key, error = %err, "engine evaluation unavailable");
            None
        }
    }
}
