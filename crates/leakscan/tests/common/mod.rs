#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_core::game_data::SourceGame;
use chess_core::position::key_of_fen;
use leakscan::engine::uci::{EngineBackend, RawEval, RawLine};
use leakscan::error::AnalysisError;

/// Shared observation channel for a `MockEngine` that has been moved into
/// an oracle.
#[derive(Clone, Default)]
pub struct EngineStats {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
}

impl EngineStats {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// True if two searches were ever in flight at once, which a real
    /// engine process cannot survive.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

/// Scripted engine: answers per position key, counts protocol calls and
/// trips a flag if a search starts while another is still running.
pub struct MockEngine {
    stats: EngineStats,
    script: Arc<Mutex<HashMap<String, RawEval>>>,
    fail_all: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            stats: EngineStats::default(),
            script: Arc::new(Mutex::new(HashMap::new())),
            fail_all: false,
        }
    }

    /// An engine that never comes up: every call fails.
    pub fn unreachable() -> Self {
        let mut engine = Self::new();
        engine.fail_all = true;
        engine
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.clone()
    }

    /// Script the answer for a position (keyed canonically, so move
    /// counters don't matter).
    pub fn script(&self, fen: &str, cp: i32, best_move: &str) {
        self.script.lock().unwrap().insert(
            key_of_fen(fen),
            RawEval {
                cp: Some(cp),
                mate: None,
                best_move: Some(best_move.to_string()),
            },
        );
    }
}

impl EngineBackend for MockEngine {
    async fn search(&mut self, fen: &str, _depth: u32) -> Result<RawEval, AnalysisError> {
        if self.stats.in_flight.swap(true, Ordering::SeqCst) {
            self.stats.overlapped.store(true, Ordering::SeqCst);
        }
        // Give an interleaved caller every chance to collide.
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.stats.in_flight.store(false, Ordering::SeqCst);
        self.stats.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all {
            return Err(AnalysisError::EngineUnavailable(
                "engine offline".to_string(),
            ));
        }

        Ok(self
            .script
            .lock()
            .unwrap()
            .get(&key_of_fen(fen))
            .cloned()
            .unwrap_or_default())
    }

    async fn search_line(&mut self, fen: &str, depth: u32) -> Result<RawLine, AnalysisError> {
        let eval = self.search(fen, depth).await?;
        let pv = eval.best_move.iter().cloned().collect();
        Ok(RawLine { eval, pv })
    }
}

/// A game played by "hero" (White) against "villain".
pub fn hero_game(tokens: &[&str]) -> SourceGame {
    SourceGame {
        moves: tokens.iter().map(|t| t.to_string()).collect(),
        white: Some("hero".to_string()),
        black: Some("villain".to_string()),
        clocks_centis: None,
    }
}

/// Full FENs along a token sequence: index 0 is the start position, index
/// i the position after i plies.
pub fn fens_along(tokens: &[&str]) -> Vec<String> {
    let mut pos = shakmaty::Chess::default();
    let mut fens = vec![chess_core::position::fen(&pos)];
    for token in tokens {
        chess_core::position::apply_token(&mut pos, token).unwrap();
        fens.push(chess_core::position::fen(&pos));
    }
    fens
}
