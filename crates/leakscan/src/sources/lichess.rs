//! Lichess source adapter — streamed NDJSON game export.

use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use chess_core::game_data::SourceGame;

use crate::config::SourceKind;
use crate::error::AnalysisError;
use crate::progress::{Phase, Reporter};
use crate::sources::{check_status, with_backoff, FetchFailure};

pub struct LichessClient {
    client: Client,
}

impl LichessClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("leakscan/0.1")
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap();
        Self { client }
    }

    /// Fetch up to `max_games` of the user's games, newest first.
    pub async fn fetch_games(
        &self,
        username: &str,
        max_games: usize,
        reporter: &Reporter,
    ) -> Result<Vec<SourceGame>, AnalysisError> {
        with_backoff(SourceKind::Lichess, || {
            self.try_fetch(username, max_games, reporter)
        })
        .await
    }

    async fn try_fetch(
        &self,
        username: &str,
        max_games: usize,
        reporter: &Reporter,
    ) -> Result<Vec<SourceGame>, FetchFailure> {
        let url = format!("https://lichess.org/api/games/user/{username}");
        let params = [
            ("moves", "true".to_string()),
            ("clocks", "true".to_string()),
            ("max", max_games.to_string()),
        ];

        // Rate limit
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .header("Accept", "application/x-ndjson")
            .send()
            .await
            .map_err(|e| FetchFailure::transient(format!("request error: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchFailure::Fatal("user not found".to_string()));
        }
        let resp = check_status(resp)?;

        reporter.phase(Phase::Parse, "reading game stream");

        // The export arrives as one JSON record per line; consume the body
        // incrementally so a large archive never sits in memory twice.
        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut games = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| FetchFailure::transient(format!("stream error: {e}")))?;
            buf.extend_from_slice(&chunk);

            while let Some(newline) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=newline).collect();
                if let Some(game) = parse_record(&line, username) {
                    games.push(game);
                    if games.len() >= max_games {
                        return Ok(games);
                    }
                }
            }
        }

        // Final record may arrive without a trailing newline.
        if !buf.is_empty() {
            if let Some(game) = parse_record(&buf, username) {
                games.push(game);
            }
        }

        games.truncate(max_games);
        Ok(games)
    }
}

impl Default for LichessClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one NDJSON record into a `SourceGame`. Malformed or irrelevant
/// records are skipped, never fatal.
fn parse_record(line: &[u8], username: &str) -> Option<SourceGame> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }

    let record: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping malformed game record");
            return None;
        }
    };

    let moves: Vec<String> = record
        .get("moves")?
        .as_str()?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if moves.is_empty() {
        return None;
    }

    let clocks = record
        .get("clocks")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c.as_u64())
                .map(|c| c as u32)
                .collect::<Vec<u32>>()
        })
        .filter(|clocks| !clocks.is_empty());

    let game = SourceGame {
        moves,
        white: player_name(&record, "white"),
        black: player_name(&record, "black"),
        clocks_centis: clocks,
    };

    // Only games the requested player actually took part in.
    game.color_of(username)?;
    Some(game)
}

fn player_name(record: &Value, side: &str) -> Option<String> {
    record
        .get("players")?
        .get(side)?
        .get("user")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
