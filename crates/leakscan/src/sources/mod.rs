//! Remote game sources and the shared retry discipline.
//!
//! Both upstream APIs rate-limit aggressively and fail transiently; every
//! request goes through bounded exponential backoff that honors a
//! server-supplied retry delay. Exhausting retries is fatal for the run.

pub mod chess_com;
pub mod lichess;

pub use chess_com::ChessComClient;
pub use lichess::LichessClient;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::SourceKind;
use crate::error::AnalysisError;

const MAX_ATTEMPTS: u32 = 4;
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Why a fetch attempt failed, and whether retrying can help.
pub(crate) enum FetchFailure {
    Transient {
        cause: String,
        retry_after: Option<Duration>,
    },
    Fatal(String),
}

impl FetchFailure {
    pub(crate) fn transient(cause: impl Into<String>) -> Self {
        FetchFailure::Transient {
            cause: cause.into(),
            retry_after: None,
        }
    }
}

/// Reject non-success statuses. 429 and 5xx are transient (with the
/// server's `Retry-After` when present); everything else is final.
pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FetchFailure> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(FetchFailure::Transient {
            cause: format!("HTTP {status}"),
            retry_after,
        })
    } else {
        Err(FetchFailure::Fatal(format!("HTTP {status}")))
    }
}

/// Run `op` under bounded exponential backoff: base delay doubling per
/// attempt, capped attempt count, server-supplied delay taking precedence.
pub(crate) async fn with_backoff<T, F, Fut>(kind: SourceKind, mut op: F) -> Result<T, AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    let mut delay = BASE_DELAY;
    let mut last_cause = String::from("no attempts made");

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(FetchFailure::Fatal(cause)) => {
                return Err(AnalysisError::SourceUnavailable { kind, cause });
            }
            Err(FetchFailure::Transient { cause, retry_after }) => {
                warn!(%kind, attempt, %cause, "transient fetch failure");
                last_cause = cause;
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(retry_after.unwrap_or(delay)).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(AnalysisError::SourceUnavailable {
        kind,
        cause: last_cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_with_backoff_retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = with_backoff(SourceKind::Lichess, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchFailure::transient("HTTP 503"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_backoff_exhausts_with_last_cause() {
        let result: Result<(), _> = with_backoff(SourceKind::ChessCom, || async {
            Err(FetchFailure::transient("HTTP 502"))
        })
        .await;
        match result {
            Err(AnalysisError::SourceUnavailable { kind, cause }) => {
                assert_eq!(kind, SourceKind::ChessCom);
                assert_eq!(cause, "HTTP 502");
            }
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_backoff_fatal_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(SourceKind::Lichess, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchFailure::Fatal("HTTP 404".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
