//! Phase progress reporting.
//!
//! Progress delivery is fire-and-forget: the callback runs synchronously at
//! phase boundaries and a panicking callback is swallowed, so reporting can
//! never abort or stall the pipeline.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

use crate::config::ProgressCallback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetch,
    Parse,
    Aggregate,
    Eval,
    Tactics,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub phase: Phase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

#[derive(Clone)]
pub struct Reporter {
    callback: Option<ProgressCallback>,
}

impl Reporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    /// Report entering a phase.
    pub fn phase(&self, phase: Phase, message: impl Into<String>) {
        self.send(Progress {
            phase,
            message: message.into(),
            current: None,
            total: None,
        });
    }

    /// Report progress within a phase.
    pub fn step(&self, phase: Phase, message: impl Into<String>, current: u32, total: u32) {
        self.send(Progress {
            phase,
            message: message.into(),
            current: Some(current),
            total: Some(total),
        });
    }

    fn send(&self, progress: Progress) {
        if let Some(callback) = &self.callback {
            let _ = catch_unwind(AssertUnwindSafe(|| callback(&progress)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_reporter_delivers_phases() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        let reporter = Reporter::new(Some(Arc::new(move |p: &Progress| {
            assert_eq!(p.phase, Phase::Fetch);
            seen.fetch_add(1, Ordering::SeqCst);
        })));

        reporter.phase(Phase::Fetch, "fetching");
        reporter.step(Phase::Fetch, "archive", 1, 3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_is_swallowed() {
        let reporter = Reporter::new(Some(Arc::new(|_: &Progress| {
            panic!("listener bug");
        })));
        // Must not propagate.
        reporter.phase(Phase::Done, "done");
    }

    #[test]
    fn test_no_callback_is_noop() {
        Reporter::new(None).phase(Phase::Eval, "quiet");
    }
}
