//! Missed tactic scanning.
//!
//! Walks every ply of every game. At the tracked player's turns a cheap
//! local filter (any forcing move available?) gates the engine work; the
//! oracle then confirms whether a forcing best move existed, whether the
//! player ignored it, and how much evaluation the actual move gave up.

use std::collections::HashSet;

use shakmaty::{Chess, Position};
use tracing::debug;

use chess_core::game_data::SourceGame;
use chess_core::position as board;

use crate::config::AnalyzeOptions;
use crate::engine::oracle::{is_mate_score, EngineOracle};
use crate::engine::uci::EngineBackend;
use crate::progress::{Phase, Reporter};
use crate::report::{MissedTactic, PositionOutcome};
use crate::tags;

/// Scanner output: the capped report list plus the true number of
/// qualifying misses, key-level duplicates included.
#[derive(Debug, Default)]
pub struct TacticScan {
    pub tactics: Vec<MissedTactic>,
    pub total_found: u32,
}

pub async fn scan_missed_tactics<B: EngineBackend>(
    games: &[SourceGame],
    identifier: &str,
    opts: &AnalyzeOptions,
    oracle: &EngineOracle<B>,
    reporter: &Reporter,
    diagnostics: &mut Vec<PositionOutcome>,
) -> TacticScan {
    let mut reported: HashSet<String> = HashSet::new();
    let mut scan = TacticScan::default();

    'games: for (game_index, game) in games.iter().enumerate() {
        reporter.step(
            Phase::Tactics,
            format!("scanning game {}", game_index + 1),
            (game_index + 1) as u32,
            games.len() as u32,
        );

        let Some(color) = game.color_of(identifier) else {
            continue;
        };

        let mut pos = Chess::default();
        for (ply, token) in game.moves.iter().enumerate() {
            let before_pos = pos.clone();
            let player_to_move = pos.turn() == color;

            let played = match board::apply_token(&mut pos, token) {
                Ok(mv) => mv,
                Err(_) => {
                    diagnostics.push(PositionOutcome::invalid_move(
                        board::position_key(&before_pos),
                        token.clone(),
                    ));
                    break;
                }
            };

            if !player_to_move {
                continue;
            }

            // Cheap local filter: without a capture or check on the board
            // there is no tactic to miss.
            if !board::has_forcing_move(&before_pos) {
                continue;
            }

            let key = board::position_key(&before_pos);
            let fen_before = board::fen(&before_pos);

            let Some(before) = crate::openings::usable(
                oracle.evaluate(&fen_before, opts.engine_depth).await,
                &key,
            ) else {
                diagnostics.push(PositionOutcome::missing_eval(key));
                continue;
            };
            let Some(best_uci) = before.best_move.clone() else {
                diagnostics.push(PositionOutcome::missing_eval(key));
                continue;
            };
            let Some(best) = board::move_from_uci(&before_pos, &best_uci) else {
                diagnostics.push(PositionOutcome::invalid_move(key, best_uci));
                continue;
            };

            // Only a forcing best move that the player ignored counts.
            if !board::is_forcing(&before_pos, &best) {
                continue;
            }
            if best == played {
                continue;
            }

            // Already lost beyond the margin: nothing left to convert.
            let eval_before = before.cp;
            if eval_before <= opts.lost_position_margin {
                continue;
            }

            let fen_after = board::fen(&pos);
            let Some(after) = crate::openings::usable(
                oracle.evaluate(&fen_after, opts.engine_depth).await,
                &key,
            ) else {
                diagnostics.push(PositionOutcome::missing_eval(key));
                continue;
            };

            let eval_after = -after.cp;
            let centipawn_loss = eval_before - eval_after;
            let flagged = centipawn_loss > opts.tactic_threshold;

            diagnostics.push(PositionOutcome::Evaluated {
                key: key.clone(),
                player_move: token.clone(),
                engine_best_move: Some(best_uci.clone()),
                eval_before,
                eval_after,
                centipawn_loss,
                flagged,
            });

            if !flagged {
                continue;
            }

            scan.total_found += 1;
            if !reported.insert(key) {
                // Same tactic already reported from another game.
                continue;
            }

            let missed_mate =
                board::delivers_mate(&before_pos, &best) || is_mate_score(eval_before);
            let time_remaining = game.time_remaining_secs(ply);
            let low_time =
                time_remaining.map_or(false, |secs| secs < opts.low_time_threshold_secs);

            debug!(game_index, ply, centipawn_loss, "missed tactic confirmed");
            scan.tactics.push(MissedTactic {
                position_before: fen_before,
                position_after: fen_after,
                player_move: token.clone(),
                engine_best_move: board::uci_string(&best),
                eval_before,
                eval_after,
                centipawn_loss,
                game_index,
                ply_number: ply + 1,
                tags: tags::tactic_tags(centipawn_loss, missed_mate, low_time),
                time_remaining_seconds: time_remaining,
            });

            if scan.tactics.len() >= opts.max_tactics {
                break 'games;
            }
        }
    }

    scan
}
