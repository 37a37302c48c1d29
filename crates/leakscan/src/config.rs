//! Analysis options and engine configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::progress::Progress;

/// Callback invoked synchronously at phase boundaries.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Which remote source to pull games from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Streamed newline-delimited JSON export with inline clock arrays.
    Lichess,
    /// Monthly archive documents carrying free-form move text.
    ChessCom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Lichess => write!(f, "lichess"),
            SourceKind::ChessCom => write!(f, "chess.com"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lichess" => Ok(SourceKind::Lichess),
            "chesscom" | "chess.com" => Ok(SourceKind::ChessCom),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Which analysis passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Openings,
    Tactics,
    Both,
}

impl ScanMode {
    pub fn includes_openings(self) -> bool {
        matches!(self, ScanMode::Openings | ScanMode::Both)
    }

    pub fn includes_tactics(self) -> bool {
        matches!(self, ScanMode::Tactics | ScanMode::Both)
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openings" => Ok(ScanMode::Openings),
            "tactics" => Ok(ScanMode::Tactics),
            "both" => Ok(ScanMode::Both),
            other => Err(format!("unknown scan mode: {other}")),
        }
    }
}

/// Tunable knobs for one analysis run. `normalized()` clamps every numeric
/// field into its supported range before the pipeline uses it.
#[derive(Clone)]
pub struct AnalyzeOptions {
    /// Most recent games to fetch (clamped 1..=1000).
    pub max_games: usize,
    /// Opening window in plies for the aggregation pass (clamped 4..=60).
    pub max_opening_plies: usize,
    /// A repeated position is a leak when the loss strictly exceeds this.
    pub cp_loss_threshold: i32,
    /// Stricter bar for confirming a missed tactic.
    pub tactic_threshold: i32,
    /// Engine search depth (clamped 6..=24).
    pub engine_depth: u32,
    pub source: SourceKind,
    pub scan_mode: ScanMode,
    /// Cap on reported tactics; scanning halts once reached.
    pub max_tactics: usize,
    /// Positions already lost beyond this margin are not "missed tactics".
    pub lost_position_margin: i32,
    /// Seconds on the clock under which a miss gets the low-time tag.
    pub low_time_threshold_secs: u32,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            max_games: 200,
            max_opening_plies: 24,
            cp_loss_threshold: 100,
            tactic_threshold: 200,
            engine_depth: 10,
            source: SourceKind::Lichess,
            scan_mode: ScanMode::Both,
            max_tactics: 25,
            lost_position_margin: -300,
            low_time_threshold_secs: 20,
            on_progress: None,
        }
    }
}

impl AnalyzeOptions {
    /// Clamp every numeric option into its supported range.
    pub fn normalized(&self) -> Self {
        let mut opts = self.clone();
        opts.max_games = opts.max_games.clamp(1, 1000);
        opts.max_opening_plies = opts.max_opening_plies.clamp(4, 60);
        opts.engine_depth = opts.engine_depth.clamp(6, 24);
        opts.max_tactics = opts.max_tactics.max(1);
        opts
    }
}

impl fmt::Debug for AnalyzeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzeOptions")
            .field("max_games", &self.max_games)
            .field("max_opening_plies", &self.max_opening_plies)
            .field("cp_loss_threshold", &self.cp_loss_threshold)
            .field("tactic_threshold", &self.tactic_threshold)
            .field("engine_depth", &self.engine_depth)
            .field("source", &self.source)
            .field("scan_mode", &self.scan_mode)
            .field("max_tactics", &self.max_tactics)
            .field("lost_position_margin", &self.lost_position_margin)
            .field("low_time_threshold_secs", &self.low_time_threshold_secs)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// How to reach the external UCI engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the engine binary.
    pub path: String,
    /// Bound on the `uci`/`isready` handshake.
    pub handshake_timeout: Duration,
    /// Bound on a single search request.
    pub request_timeout: Duration,
}

impl EngineConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let path = env::var("STOCKFISH_PATH")
            .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string());

        let handshake_secs = env::var("ENGINE_HANDSHAKE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let request_secs = env::var("ENGINE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Self {
            path,
            handshake_timeout: Duration::from_secs(handshake_secs),
            request_timeout: Duration::from_secs(request_secs),
        }
    }
}
