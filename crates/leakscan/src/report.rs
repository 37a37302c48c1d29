//! Report records and final assembly.

use serde::Serialize;

use crate::tactics::TacticScan;

/// A habitual opening mistake: a position the player keeps reaching where
/// their usual move gives up meaningful evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatedOpeningLeak {
    /// Full FEN before the player's usual move.
    pub position_before: String,
    /// Full FEN after it.
    pub position_after: String,
    /// The move token the player most often chooses here.
    pub player_move: String,
    /// Engine best move in UCI notation.
    pub engine_best_move: String,
    pub tags: Vec<String>,
    /// How many games reached this position.
    pub reach_count: u32,
    /// How many of those games saw the chosen move.
    pub move_count: u32,
    pub centipawn_loss: i32,
    /// Evaluation before the move, player's perspective.
    pub eval_before: i32,
    /// Evaluation after the move, player's perspective.
    pub eval_after: i32,
    pub side_to_move: &'static str,
    pub player_color: &'static str,
}

/// A position where a forcing win was available and the player played
/// something else.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedTactic {
    pub position_before: String,
    pub position_after: String,
    pub player_move: String,
    pub engine_best_move: String,
    pub eval_before: i32,
    pub eval_after: i32,
    pub centipawn_loss: i32,
    pub game_index: usize,
    /// 1-based half-move number of the miss.
    pub ply_number: usize,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_seconds: Option<u32>,
}

/// One entry per examined position: what happened there, including the
/// skip reason when the position could not be judged. Per-position
/// failures land here instead of aborting the run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PositionOutcome {
    #[serde(rename_all = "camelCase")]
    Evaluated {
        key: String,
        player_move: String,
        engine_best_move: Option<String>,
        eval_before: i32,
        eval_after: i32,
        centipawn_loss: i32,
        flagged: bool,
    },
    #[serde(rename_all = "camelCase")]
    InvalidMove {
        key: String,
        token: String,
        skipped_reason: &'static str,
    },
    #[serde(rename_all = "camelCase")]
    MissingEval {
        key: String,
        skipped_reason: &'static str,
    },
}

impl PositionOutcome {
    pub fn invalid_move(key: String, token: String) -> Self {
        PositionOutcome::InvalidMove {
            key,
            token,
            skipped_reason: "invalid_move",
        }
    }

    pub fn missing_eval(key: String) -> Self {
        PositionOutcome::MissingEval {
            key,
            skipped_reason: "missing_eval",
        }
    }
}

/// The complete leak report for one analysis run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub games_analyzed: usize,
    /// Positions the player reached often enough to count as habitual.
    pub repeated_position_count: usize,
    /// Ordered by descending centipawn loss.
    pub leaks: Vec<RepeatedOpeningLeak>,
    /// Ordered by descending centipawn loss, capped at `max_tactics`.
    pub missed_tactics: Vec<MissedTactic>,
    /// Every qualifying miss, including repeats of already-reported keys.
    pub tactics_found: u32,
    pub diagnostics: Vec<PositionOutcome>,
}

/// Merge the pass outputs into the final report, most severe first.
pub fn assemble(
    games_analyzed: usize,
    repeated_position_count: usize,
    mut leaks: Vec<RepeatedOpeningLeak>,
    scan: TacticScan,
    diagnostics: Vec<PositionOutcome>,
) -> AnalysisReport {
    // Stable sorts: ties keep discovery order.
    leaks.sort_by(|a, b| b.centipawn_loss.cmp(&a.centipawn_loss));
    let mut missed_tactics = scan.tactics;
    missed_tactics.sort_by(|a, b| b.centipawn_loss.cmp(&a.centipawn_loss));

    AnalysisReport {
        games_analyzed,
        repeated_position_count,
        leaks,
        missed_tactics,
        tactics_found: scan.total_found,
        diagnostics,
    }
}
