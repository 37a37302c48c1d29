//! Serialized, cached front-end over the engine backend.
//!
//! The engine is one stateful process with no internal concurrency, so all
//! evaluation requests from the analysis passes funnel through a fair
//! (FIFO) mutex here: at most one request is ever in flight. Results are
//! cached per position key and depth; a deeper search strictly subsumes a
//! shallower one.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::engine::uci::{EngineBackend, RawEval};
use crate::error::AnalysisError;

/// Mate scores are folded onto the centipawn scale as `±(10000 − 10·n)`;
/// anything beyond this threshold is a forced mate.
pub const MATE_THRESHOLD: i32 = 9_000;

/// A usable engine verdict on a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvaluation {
    /// Centipawns from the side to move's perspective (mates folded in).
    pub cp: i32,
    pub best_move: Option<String>,
}

/// An evaluation together with the engine's predicted continuation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineLine {
    #[serde(flatten)]
    pub eval: EngineEvaluation,
    pub principal_variation: Vec<String>,
}

pub fn is_mate_score(cp: i32) -> bool {
    cp.abs() > MATE_THRESHOLD
}

/// Map mate-in-n onto the centipawn scale, closer mates scoring higher.
fn mate_to_cp(mate: i32) -> i32 {
    if mate > 0 {
        10_000 - mate * 10
    } else {
        -10_000 - mate * 10
    }
}

fn to_evaluation(raw: RawEval) -> Option<EngineEvaluation> {
    let cp = match (raw.cp, raw.mate) {
        (_, Some(mate)) => mate_to_cp(mate),
        (Some(cp), None) => cp,
        (None, None) => return None,
    };
    Some(EngineEvaluation {
        cp,
        best_move: raw.best_move,
    })
}

/// Cache key: the canonical position key (move counters dropped), so the
/// same position reached through different move orders shares one entry.
fn cache_key(fen: &str) -> String {
    chess_core::position::key_of_fen(fen)
}

pub struct EngineOracle<B> {
    backend: Mutex<B>,
    cache: Mutex<HashMap<String, BTreeMap<u32, Option<EngineEvaluation>>>>,
}

impl<B: EngineBackend> EngineOracle<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate a position at the given depth.
    ///
    /// Cached results return without touching the engine; a cached result
    /// at a greater depth is reused and re-recorded under the requested
    /// depth. Returns `Ok(None)` when the engine produced no usable score.
    pub async fn evaluate(
        &self,
        fen: &str,
        depth: u32,
    ) -> Result<Option<EngineEvaluation>, AnalysisError> {
        let key = cache_key(fen);
        if let Some(hit) = self.cached(&key, depth).await {
            return Ok(hit);
        }

        let mut backend = self.backend.lock().await;
        // Another caller may have filled the cache while we queued.
        if let Some(hit) = self.cached(&key, depth).await {
            return Ok(hit);
        }
        let raw = backend.search(fen, depth).await?;
        drop(backend);

        let eval = to_evaluation(raw);
        if eval.is_none() {
            debug!(%key, depth, "engine returned no usable score");
        }
        self.store(key, depth, eval.clone()).await;
        Ok(eval)
    }

    /// Best line from a position, bounded to `max_plies` moves. Same
    /// serialization discipline as `evaluate`, but not cached: lines are
    /// derived ad hoc for explanation purposes.
    pub async fn principal_variation(
        &self,
        fen: &str,
        max_plies: usize,
        depth: u32,
    ) -> Result<Option<EngineLine>, AnalysisError> {
        let mut backend = self.backend.lock().await;
        let raw = backend.search_line(fen, depth).await?;
        drop(backend);

        Ok(to_evaluation(raw.eval).map(|eval| EngineLine {
            eval,
            principal_variation: raw.pv.into_iter().take(max_plies).collect(),
        }))
    }

    async fn cached(&self, key: &str, depth: u32) -> Option<Option<EngineEvaluation>> {
        let mut cache = self.cache.lock().await;
        let by_depth = cache.get_mut(key)?;

        if let Some(hit) = by_depth.get(&depth) {
            return Some(hit.clone());
        }

        // A deeper search strictly subsumes a shallower one.
        let deeper = by_depth
            .range((Excluded(depth), Unbounded))
            .next()
            .map(|(_, hit)| hit.clone());
        if let Some(hit) = deeper {
            by_depth.insert(depth, hit.clone());
            return Some(hit);
        }
        None
    }

    async fn store(&self, key: String, depth: u32, eval: Option<EngineEvaluation>) {
        let mut cache = self.cache.lock().await;
        cache.entry(key).or_default().insert(depth, eval);
    }
}
