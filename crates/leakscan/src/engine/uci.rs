//! UCI engine process wrapper (async I/O).
//!
//! The engine is a single long-lived, stateful process: it must be
//! handshaken once before use and accepts one search at a time. This module
//! owns the process; serialization across callers is the oracle's job.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::AnalysisError;

/// Raw search result straight off the protocol.
#[derive(Debug, Clone, Default)]
pub struct RawEval {
    /// Centipawn score, side-to-move perspective.
    pub cp: Option<i32>,
    /// Mate in N moves (positive = side to move mates).
    pub mate: Option<i32>,
    /// Best move in UCI notation; absent when the engine printed `(none)`.
    pub best_move: Option<String>,
}

/// Raw search result with the principal variation kept.
#[derive(Debug, Clone, Default)]
pub struct RawLine {
    pub eval: RawEval,
    pub pv: Vec<String>,
}

/// Seam between the oracle and the engine process, so tests can script an
/// engine without spawning one.
#[allow(async_fn_in_trait)]
pub trait EngineBackend: Send {
    async fn search(&mut self, fen: &str, depth: u32) -> Result<RawEval, AnalysisError>;

    async fn search_line(&mut self, fen: &str, depth: u32) -> Result<RawLine, AnalysisError>;
}

/// Spawns and drives the engine process lazily. Handshake failures and
/// request timeouts tear the session down so the next call retries from a
/// clean spawn instead of wedging on a desynchronized protocol stream.
pub struct UciProcessBackend {
    config: EngineConfig,
    session: Option<UciSession>,
}

impl UciProcessBackend {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    async fn ensure_session(&mut self) -> Result<(), AnalysisError> {
        if self.session.is_some() {
            return Ok(());
        }
        debug!(path = %self.config.path, "starting engine process");
        match timeout(
            self.config.handshake_timeout,
            UciSession::connect(&self.config.path),
        )
        .await
        {
            Ok(Ok(session)) => {
                self.session = Some(session);
                Ok(())
            }
            Ok(Err(cause)) => Err(AnalysisError::EngineUnavailable(cause)),
            Err(_) => Err(AnalysisError::EngineUnavailable(format!(
                "handshake timed out after {:?}",
                self.config.handshake_timeout
            ))),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.process.start_kill();
        }
    }

    async fn run(&mut self, fen: &str, depth: u32) -> Result<RawLine, AnalysisError> {
        self.ensure_session().await?;
        let request_timeout = self.config.request_timeout;
        let Some(session) = self.session.as_mut() else {
            return Err(AnalysisError::EngineUnavailable(
                "engine session not established".to_string(),
            ));
        };

        match timeout(request_timeout, session.go(fen, depth)).await {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(cause)) => {
                self.teardown();
                Err(AnalysisError::EngineUnavailable(cause))
            }
            Err(_) => {
                self.teardown();
                Err(AnalysisError::EngineTimeout(format!(
                    "search at depth {depth} exceeded {request_timeout:?}"
                )))
            }
        }
    }
}

impl EngineBackend for UciProcessBackend {
    async fn search(&mut self, fen: &str, depth: u32) -> Result<RawEval, AnalysisError> {
        Ok(self.run(fen, depth).await?.eval)
    }

    async fn search_line(&mut self, fen: &str, depth: u32) -> Result<RawLine, AnalysisError> {
        self.run(fen, depth).await
    }
}

/// One live engine process with the UCI handshake completed.
struct UciSession {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl UciSession {
    async fn connect(path: &str) -> Result<Self, String> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn engine: {e}"))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| "engine stdin unavailable".to_string())?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| "engine stdout unavailable".to_string())?;

        let mut session = Self {
            process,
            stdin,
            stdout,
        };

        // Initialize UCI
        session.send("uci").await?;
        session.wait_for("uciok").await?;

        // Configure for analysis
        session.send("setoption name Threads value 1").await?;
        session.send("setoption name Hash value 256").await?;
        session
            .send("setoption name UCI_AnalyseMode value true")
            .await?;
        session.send("isready").await?;
        session.wait_for("readyok").await?;

        Ok(session)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), String> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| format!("failed to write to engine: {e}"))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| format!("failed to flush engine stdin: {e}"))?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, String> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| format!("failed to read from engine: {e}"))?;
        if n == 0 {
            return Err("engine closed its output".to_string());
        }
        Ok(line.trim().to_string())
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), String> {
        loop {
            let line = self.read_line().await?;
            debug!(line = %line, "engine >");
            if line == expected {
                return Ok(());
            }
        }
    }

    /// Run one depth-bounded search and collect score, PV and best move.
    async fn go(&mut self, fen: &str, depth: u32) -> Result<RawLine, String> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut result = RawLine::default();

        loop {
            let line = self.read_line().await?;

            if line.starts_with("info") && line.contains(" pv ") {
                if let Some(cp) = parse_cp(&line) {
                    result.eval.cp = Some(cp);
                    result.eval.mate = None;
                }
                if let Some(mate) = parse_mate(&line) {
                    result.eval.mate = Some(mate);
                    result.eval.cp = None;
                }
                result.pv = parse_pv(&line);
            } else if line.starts_with("bestmove") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if let Some(best) = parts.get(1) {
                    if *best != "(none)" {
                        result.eval.best_move = Some(best.to_string());
                    }
                }
                break;
            }
        }

        Ok(result)
    }
}

impl Drop for UciSession {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Parse centipawn score from an info line.
fn parse_cp(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "cp" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse mate score from an info line.
fn parse_mate(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "mate" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse PV moves from an info line.
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at the next keyword
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 10 seldepth 14 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 10 score mate 3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(3));
        assert_eq!(parse_cp(line), None);
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 10 score cp 35 pv e2e4 e7e5 g1f3";
        assert_eq!(parse_pv(line), vec!["e2e4", "e7e5", "g1f3"]);
    }
}
