//! Engine oracle: UCI protocol session over a spawned process, plus the
//! serialized and cached client everything else talks to.

pub mod oracle;
pub mod uci;

pub use oracle::{EngineEvaluation, EngineLine, EngineOracle};
pub use uci::{EngineBackend, RawEval, RawLine, UciProcessBackend};
