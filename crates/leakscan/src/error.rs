//! Pipeline error taxonomy.
//!
//! Only source exhaustion and engine failures ever reach the caller as
//! errors; move replay and evaluation problems at individual positions
//! degrade into the report's diagnostics trace instead.

use thiserror::Error;

use crate::config::SourceKind;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The remote source exhausted its retries; fatal for the whole run.
    #[error("source unavailable ({kind}): {cause}")]
    SourceUnavailable { kind: SourceKind, cause: String },

    /// The engine process could not be started or never completed its
    /// handshake.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A single engine request exceeded its time bound.
    #[error("engine request timed out: {0}")]
    EngineTimeout(String),

    /// A recorded move token could not be legally applied.
    #[error("invalid move token `{0}`")]
    InvalidMove(String),

    /// The engine answered but produced no usable score.
    #[error("no usable evaluation at {0}")]
    MissingEvaluation(String),
}

impl From<chess_core::position::InvalidMoveToken> for AnalysisError {
    fn from(err: chess_core::position::InvalidMoveToken) -> Self {
        AnalysisError::InvalidMove(err.token)
    }
}
