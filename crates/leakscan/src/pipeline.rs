//! Pipeline entry point: fetch → aggregate → evaluate → scan → assemble.

use tracing::info;

use crate::config::{AnalyzeOptions, EngineConfig, SourceKind};
use crate::engine::oracle::EngineOracle;
use crate::engine::uci::{EngineBackend, UciProcessBackend};
use crate::error::AnalysisError;
use crate::openings;
use crate::progress::{Phase, Reporter};
use crate::report::{self, AnalysisReport};
use crate::sources::{ChessComClient, LichessClient};
use crate::tactics::{self, TacticScan};

/// One analyzer owns the single engine oracle; every evaluation from both
/// passes funnels through it.
pub struct LeakAnalyzer<B: EngineBackend> {
    oracle: EngineOracle<B>,
}

impl LeakAnalyzer<UciProcessBackend> {
    /// Analyzer backed by a spawned UCI engine process. The process starts
    /// lazily on the first evaluation.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(UciProcessBackend::new(config))
    }
}

impl<B: EngineBackend> LeakAnalyzer<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            oracle: EngineOracle::new(backend),
        }
    }

    /// The underlying oracle, for callers that want principal variations
    /// to explain a finding.
    pub fn oracle(&self) -> &EngineOracle<B> {
        &self.oracle
    }

    /// Run the full analysis for one player.
    pub async fn analyze(
        &self,
        identifier: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        let opts = options.normalized();
        let reporter = Reporter::new(opts.on_progress.clone());

        reporter.phase(
            Phase::Fetch,
            format!("fetching games for {identifier} from {}", opts.source),
        );
        let games = match opts.source {
            SourceKind::Lichess => {
                LichessClient::new()
                    .fetch_games(identifier, opts.max_games, &reporter)
                    .await?
            }
            SourceKind::ChessCom => {
                ChessComClient::new()
                    .fetch_games(identifier, opts.max_games, &reporter)
                    .await?
            }
        };
        info!(games = games.len(), source = %opts.source, "games fetched");

        let mut diagnostics = Vec::new();
        let mut leaks = Vec::new();
        let mut repeated_position_count = 0;

        if opts.scan_mode.includes_openings() {
            reporter.phase(Phase::Aggregate, "aggregating opening positions");
            let aggregated = openings::aggregate_positions(
                &games,
                identifier,
                opts.max_opening_plies,
                &mut diagnostics,
            );
            let habitual = openings::habitual_positions(aggregated);
            repeated_position_count = habitual.len();
            info!(repeated_position_count, "habitual positions found");

            reporter.phase(Phase::Eval, "evaluating repeated positions");
            leaks =
                openings::find_leaks(&habitual, &opts, &self.oracle, &reporter, &mut diagnostics)
                    .await;
        }

        let scan = if opts.scan_mode.includes_tactics() {
            reporter.phase(Phase::Tactics, "scanning for missed tactics");
            tactics::scan_missed_tactics(
                &games,
                identifier,
                &opts,
                &self.oracle,
                &reporter,
                &mut diagnostics,
            )
            .await
        } else {
            TacticScan::default()
        };

        info!(
            leaks = leaks.len(),
            tactics = scan.tactics.len(),
            tactics_found = scan.total_found,
            "analysis passes complete"
        );
        reporter.phase(Phase::Done, "analysis complete");

        Ok(report::assemble(
            games.len(),
            repeated_position_count,
            leaks,
            scan,
            diagnostics,
        ))
    }
}
