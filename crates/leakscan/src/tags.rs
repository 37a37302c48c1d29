//! Heuristic tag derivation.
//!
//! Each check is independently fallible and contributes only on success;
//! the resulting set is never empty and never exceeds `MAX_TAGS`.

use shakmaty::{Chess, Move, Square};

use chess_core::position as board;

/// Share of reaches at which the chosen move counts as an ingrained habit.
pub const REPEAT_HABIT_SHARE: f64 = 0.70;

/// A leak or tactic carries at most this many tags.
pub const MAX_TAGS: usize = 3;

/// Loss at or above which a miss is a blunder rather than a mistake.
const BLUNDER_BAND: i32 = 500;

fn is_center(square: Square) -> bool {
    matches!(
        square,
        Square::D4 | Square::E4 | Square::D5 | Square::E5
    )
}

/// Tags for a repeated opening leak, derived by comparing the player's
/// habitual move against the engine's best move at the same position.
pub fn opening_tags(
    pos: &Chess,
    player_move: &Move,
    engine_best_uci: Option<&str>,
    chosen_share: f64,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    if chosen_share >= REPEAT_HABIT_SHARE {
        tags.push("Repeated Habit".to_string());
    }

    // Every comparison needs the engine move to resolve at this position;
    // when it doesn't, the heuristics simply contribute nothing.
    if let Some(best) = engine_best_uci.and_then(|uci| board::move_from_uci(pos, uci)) {
        if board::delivers_mate(pos, &best) {
            tags.push("Missed Mate".to_string());
        } else if board::gives_check(pos, &best) && !board::gives_check(pos, player_move) {
            tags.push("Missed Check".to_string());
        }
        if best.is_capture() && !player_move.is_capture() {
            tags.push("Missed Capture".to_string());
        }
        if board::is_castle(&best) && !board::is_castle(player_move) {
            tags.push("Delayed Castling".to_string());
        }
        if is_center(best.to()) && !is_center(player_move.to()) {
            tags.push("Center Neglect".to_string());
        }
    }

    if tags.is_empty() {
        tags.push("Opening Inaccuracy".to_string());
    }
    tags.truncate(MAX_TAGS);
    tags
}

/// Tags for a confirmed missed tactic: a severity band, what kind of win
/// was on the board, and optionally the time-pressure marker.
pub fn tactic_tags(centipawn_loss: i32, missed_mate: bool, low_time: bool) -> Vec<String> {
    let mut tags = Vec::new();

    tags.push(
        if centipawn_loss >= BLUNDER_BAND {
            "Blunder"
        } else {
            "Mistake"
        }
        .to_string(),
    );
    tags.push(
        if missed_mate {
            "Missed Mate"
        } else {
            "Missed Material"
        }
        .to_string(),
    );
    if low_time {
        tags.push("Low Time".to_string());
    }

    tags
}
