//! Chess.com source adapter — monthly archive documents.
//!
//! Games arrive as free-form PGN text with inline `[%clk]` annotations;
//! move tokens and clocks are reconstructed via `chess_core::pgn`. A game
//! that cannot be parsed is skipped, never fatal for the batch.

use reqwest::Client;
use serde_json::Value;

use chess_core::game_data::SourceGame;

use crate::config::SourceKind;
use crate::error::AnalysisError;
use crate::progress::{Phase, Reporter};
use crate::sources::{check_status, with_backoff, FetchFailure};

pub struct ChessComClient {
    client: Client,
}

impl ChessComClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("leakscan/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();
        Self { client }
    }

    /// Fetch up to `max_games` of the user's games, consuming monthly
    /// archives from most recent to oldest.
    pub async fn fetch_games(
        &self,
        username: &str,
        max_games: usize,
        reporter: &Reporter,
    ) -> Result<Vec<SourceGame>, AnalysisError> {
        let months =
            with_backoff(SourceKind::ChessCom, || self.try_fetch_archives(username)).await?;

        let mut games = Vec::new();
        for (i, &(year, month)) in months.iter().enumerate() {
            if games.len() >= max_games {
                break;
            }
            reporter.step(
                Phase::Fetch,
                format!("archive {year}-{month:02}"),
                (i + 1) as u32,
                months.len() as u32,
            );

            let records = with_backoff(SourceKind::ChessCom, || {
                self.try_fetch_month(username, year, month)
            })
            .await?;

            reporter.phase(
                Phase::Parse,
                format!("parsing {} games from {year}-{month:02}", records.len()),
            );
            for record in &records {
                if let Some(game) = normalize_game(record, username) {
                    games.push(game);
                    if games.len() >= max_games {
                        break;
                    }
                }
            }
        }

        Ok(games)
    }

    /// Fetch the list of monthly archives as (year, month), newest first.
    async fn try_fetch_archives(&self, username: &str) -> Result<Vec<(i32, u32)>, FetchFailure> {
        let url = format!("https://api.chess.com/pub/player/{username}/games/archives");

        // Rate limit
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchFailure::transient(format!("archives request error: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchFailure::Fatal("user not found".to_string()));
        }
        let resp = check_status(resp)?;

        let data: Value = resp
            .json()
            .await
            .map_err(|e| FetchFailure::transient(format!("archives JSON parse error: {e}")))?;

        let mut months: Vec<(i32, u32)> = data["archives"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| {
                // URLs look like ".../pub/player/username/games/2024/03"
                let s = v.as_str()?;
                let parts: Vec<&str> = s.trim_end_matches('/').rsplit('/').collect();
                let month: u32 = parts.first()?.parse().ok()?;
                let year: i32 = parts.get(1)?.parse().ok()?;
                Some((year, month))
            })
            .collect();

        // Newest-first so we can stop as soon as max_games is reached
        months.sort_by(|a, b| b.cmp(a));
        Ok(months)
    }

    /// Fetch one month's games. A missing month contributes zero games.
    async fn try_fetch_month(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<Value>, FetchFailure> {
        let url = format!("https://api.chess.com/pub/player/{username}/games/{year}/{month:02}");

        // Rate limit
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchFailure::transient(format!("request error: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }
        let resp = check_status(resp)?;

        let data: Value = resp
            .json()
            .await
            .map_err(|e| FetchFailure::transient(format!("JSON parse error: {e}")))?;

        Ok(data["games"].as_array().cloned().unwrap_or_default())
    }
}

impl Default for ChessComClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize one archive record. Unrated, variant, unparseable and
/// non-participant games are skipped.
fn normalize_game(record: &Value, username: &str) -> Option<SourceGame> {
    if !record
        .get("rated")
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
    {
        return None;
    }

    let rules = record
        .get("rules")
        .and_then(|v| v.as_str())
        .unwrap_or("chess");
    if rules != "chess" {
        return None;
    }

    let pgn = record.get("pgn").and_then(|v| v.as_str())?;
    let (moves, clocks_centis) = chess_core::pgn::parse_game_text(pgn)?;

    let game = SourceGame {
        moves,
        white: side_name(record, "white"),
        black: side_name(record, "black"),
        clocks_centis,
    };

    game.color_of(username)?;
    Some(game)
}

fn side_name(record: &Value, side: &str) -> Option<String> {
    record
        .get(side)?
        .get("username")?
        .as_str()
        .map(str::to_string)
}
