//! Position replay helpers on top of shakmaty.
//!
//! Everything the analysis passes need from the rules engine lives here:
//! applying recorded move tokens, canonical position keys, and the forcing
//! move predicates used by the tactic pre-filter.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Move, Position, Square};
use thiserror::Error;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A recorded move token that cannot be applied to the position it was
/// recorded against, either because it does not parse or because it is
/// not legal there.
#[derive(Debug, Clone, Error)]
#[error("cannot apply move token `{token}`")]
pub struct InvalidMoveToken {
    pub token: String,
}

/// Resolve a move token against a position. Tokens are SAN as recorded by
/// the sources; UCI is accepted as a fallback so engine moves can be
/// replayed through the same path.
pub fn parse_token(pos: &Chess, token: &str) -> Result<Move, InvalidMoveToken> {
    if let Ok(san) = token.parse::<SanPlus>() {
        if let Ok(mv) = san.san.to_move(pos) {
            return Ok(mv);
        }
    }
    if let Ok(uci) = token.parse::<UciMove>() {
        if let Ok(mv) = uci.to_move(pos) {
            return Ok(mv);
        }
    }
    Err(InvalidMoveToken {
        token: token.to_string(),
    })
}

/// Apply a move token in place, returning the resolved move.
pub fn apply_token(pos: &mut Chess, token: &str) -> Result<Move, InvalidMoveToken> {
    let mv = parse_token(pos, token)?;
    pos.play_unchecked(mv);
    Ok(mv)
}

/// Resolve an engine move (UCI notation) against a position.
pub fn move_from_uci(pos: &Chess, uci: &str) -> Option<Move> {
    let uci_move: UciMove = uci.parse().ok()?;
    uci_move.to_move(pos).ok()
}

/// Full FEN for the position.
pub fn fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Canonical position key: board, side to move, castling rights and
/// en-passant target. Move counters are dropped so transposed move orders
/// that differ only in counters still produce identical keys.
pub fn position_key(pos: &Chess) -> String {
    let full = fen(pos);
    full.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// The key corresponding to a full FEN string, without replaying it.
pub fn key_of_fen(fen_str: &str) -> String {
    fen_str
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a full FEN back into a position.
pub fn position_from_fen(fen_str: &str) -> Option<Chess> {
    let parsed: Fen = fen_str.parse().ok()?;
    parsed.into_position::<Chess>(CastlingMode::Standard).ok()
}

/// Standard UCI rendering of a move (castling as the king's two-square hop).
pub fn uci_string(mv: &Move) -> String {
    match *mv {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            format!("{}{}", king, Square::from_coords(file, king.rank()))
        }
        Move::Normal {
            from,
            to,
            promotion,
            ..
        } => {
            let mut out = format!("{}{}", from, to);
            if let Some(role) = promotion {
                out.push(role.char());
            }
            out
        }
        Move::EnPassant { from, to } => format!("{}{}", from, to),
        Move::Put { .. } => String::new(),
    }
}

/// Does this move leave the opponent in check?
pub fn gives_check(pos: &Chess, mv: &Move) -> bool {
    let mut next = pos.clone();
    next.play_unchecked(*mv);
    next.is_check()
}

/// Does this move checkmate the opponent?
pub fn delivers_mate(pos: &Chess, mv: &Move) -> bool {
    let mut next = pos.clone();
    next.play_unchecked(*mv);
    next.is_checkmate()
}

/// A forcing move captures material or gives check (mate included).
pub fn is_forcing(pos: &Chess, mv: &Move) -> bool {
    mv.is_capture() || gives_check(pos, mv)
}

/// Cheap tactic pre-filter: is any legal move from here forcing?
pub fn has_forcing_move(pos: &Chess) -> bool {
    pos.legal_moves()
        .iter()
        .any(|mv| mv.is_capture() || gives_check(pos, mv))
}

pub fn is_castle(mv: &Move) -> bool {
    matches!(mv, Move::Castle { .. })
}
