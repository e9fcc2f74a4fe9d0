//! Sequential evaluation of every ply of a game.
//!
//! For each ply the pipeline fetches the evaluation after the move actually
//! played and the evaluation after the engine's own best move from the same
//! base position. Requests are strictly sequential with a fixed pause before
//! each one. Individual misses are patched from neighbouring values, so the
//! run always completes once every ply has been attempted.

use std::time::Duration;

use chess_core::position::{apply_uci, to_fen};
use chess_core::PositionCodec;
use shakmaty::{Chess, Color, Position};
use tracing::{debug, info, warn};

use crate::config::EvaluationConfig;
use crate::error::ReviewError;
use crate::evaluation::{EngineEvaluation, EvaluationSample, PositionEvaluator, MATE_SCORE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running { completed: usize, total: usize },
    Complete,
    Failed(String),
}

impl PipelineState {
    pub fn is_finished(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed(_))
    }
}

/// The two parallel evaluation series, index 0 = starting position.
/// Both only ever grow, one entry per finished ply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSeries {
    after_actual: Vec<EvaluationSample>,
    after_best: Vec<EvaluationSample>,
    /// Engine suggestion from the position before each ply
    best_moves: Vec<Option<String>>,
}

impl EvaluationSeries {
    pub fn after_actual(&self) -> &[EvaluationSample] {
        &self.after_actual
    }

    pub fn after_best(&self) -> &[EvaluationSample] {
        &self.after_best
    }

    pub fn best_move(&self, ply: usize) -> Option<&str> {
        self.best_moves.get(ply).and_then(|m| m.as_deref())
    }

    /// Plies whose evaluations are both available.
    pub fn completed_plies(&self) -> usize {
        self.after_actual.len().min(self.after_best.len()).saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.after_actual.is_empty()
    }

    /// Record the starting position; both series share it.
    pub fn push_start(&mut self, sample: EvaluationSample) {
        self.after_actual.push(sample);
        self.after_best.push(sample);
    }

    pub fn push_ply(
        &mut self,
        actual: EvaluationSample,
        best: EvaluationSample,
        best_move: Option<String>,
    ) {
        self.after_actual.push(actual);
        self.after_best.push(best);
        self.best_moves.push(best_move);
    }

    pub fn last_actual(&self) -> Option<EvaluationSample> {
        self.after_actual.last().copied()
    }
}

pub struct EvaluationPipeline {
    state: PipelineState,
    series: EvaluationSeries,
    total: usize,
    depth: u8,
    delay: Duration,
}

impl EvaluationPipeline {
    pub fn new(config: &EvaluationConfig) -> Self {
        Self {
            state: PipelineState::Idle,
            series: EvaluationSeries::default(),
            total: 0,
            depth: config.search_depth,
            delay: config.request_delay,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn series(&self) -> &EvaluationSeries {
        &self.series
    }

    /// Fraction of plies done, 0.0..=1.0
    pub fn progress(&self) -> f64 {
        match self.state {
            PipelineState::Idle => 0.0,
            PipelineState::Running { total: 0, .. } | PipelineState::Complete => 1.0,
            PipelineState::Running { completed, total } => completed as f64 / total as f64,
            PipelineState::Failed(_) if self.total == 0 => 0.0,
            PipelineState::Failed(_) => self.series.completed_plies() as f64 / self.total as f64,
        }
    }

    /// Drop everything from a previous run.
    pub fn reset(&mut self) {
        self.state = PipelineState::Idle;
        self.series = EvaluationSeries::default();
        self.total = 0;
    }

    /// Evaluate every ply of `codec`. `on_progress` is called after the
    /// starting position and after every ply, and once more on completion.
    pub async fn run<E, F>(
        &mut self,
        codec: &PositionCodec,
        evaluator: &E,
        mut on_progress: F,
    ) -> Result<(), ReviewError>
    where
        E: PositionEvaluator,
        F: FnMut(&EvaluationPipeline),
    {
        self.reset();
        let total = codec.len();
        self.total = total;
        self.state = PipelineState::Running {
            completed: 0,
            total,
        };
        info!(plies = total, depth = self.depth, "Evaluation pipeline started");

        let start = self.evaluate_position(evaluator, codec.initial(), 0).await;
        let start = match start {
            Ok(eval) => eval.sample(0),
            Err(e) => {
                warn!(error = %e, "Starting position unavailable, using neutral score");
                EvaluationSample::neutral(0)
            }
        };
        self.series.push_start(start);
        on_progress(&*self);

        for ply in 0..total {
            let (Some(before), Some(after)) =
                (codec.position_before(ply), codec.position_after(ply))
            else {
                return self.fail(format!("Codec has no position for ply {ply}"));
            };
            let actual_uci = codec.ply(ply).map(|p| p.uci.as_str());

            let actual = match self.evaluate_position(evaluator, after, ply + 1).await {
                Ok(eval) => eval.sample(ply + 1),
                Err(e) => {
                    warn!(ply, error = %e, "After-move evaluation missing, reusing previous");
                    match self.series.last_actual() {
                        Some(prev) => prev.at_ply(ply + 1),
                        None => EvaluationSample::neutral(ply + 1),
                    }
                }
            };

            let (best, best_move) = match self
                .evaluate_best_line(evaluator, before, actual_uci, actual, ply + 1)
                .await
            {
                Ok(found) => found,
                Err((e, best_move)) => {
                    warn!(ply, error = %e, "Best-move evaluation missing, using actual move");
                    (actual, best_move)
                }
            };
            self.series.push_ply(actual, best, best_move);

            self.state = PipelineState::Running {
                completed: ply + 1,
                total,
            };
            debug!(
                ply,
                actual = actual.score_centipawns,
                best = best.score_centipawns,
                "Ply evaluated"
            );
            on_progress(&*self);
        }

        if self.series.after_actual.len() != total + 1 || self.series.after_best.len() != total + 1
        {
            return self.fail(format!(
                "Series length mismatch: {} / {} for {total} plies",
                self.series.after_actual.len(),
                self.series.after_best.len()
            ));
        }

        self.state = PipelineState::Complete;
        info!(plies = total, "Evaluation pipeline complete");
        on_progress(&*self);
        Ok(())
    }

    fn fail(&mut self, reason: String) -> Result<(), ReviewError> {
        warn!(reason = %reason, "Evaluation pipeline failed");
        self.state = PipelineState::Failed(reason.clone());
        Err(ReviewError::PipelineFailed(reason))
    }

    /// Ask the engine for its move in `before`, play it and score the result.
    /// On failure the engine's suggestion, if playable, is handed back with the error.
    async fn evaluate_best_line<E: PositionEvaluator>(
        &self,
        evaluator: &E,
        before: &Chess,
        actual_uci: Option<&str>,
        actual: EvaluationSample,
        index: usize,
    ) -> Result<(EvaluationSample, Option<String>), (ReviewError, Option<String>)> {
        let suggestion = self
            .evaluate_position(evaluator, before, index - 1)
            .await
            .map_err(|e| (e, None))?;

        let Some(best_uci) = suggestion.best_move else {
            return Err((
                ReviewError::BestMoveUnparsable("engine returned no best move".into()),
                None,
            ));
        };

        // Same move as played; the position was just scored
        if actual_uci == Some(best_uci.as_str()) {
            return Ok((actual, Some(best_uci)));
        }

        let best_position = match apply_uci(before, &best_uci) {
            Ok(pos) => pos,
            Err(e) => return Err((ReviewError::BestMoveUnparsable(e.to_string()), None)),
        };

        match self.evaluate_position(evaluator, &best_position, index).await {
            Ok(eval) => Ok((eval.sample(index), Some(best_uci))),
            Err(e) => Err((e, Some(best_uci))),
        }
    }

    /// One throttled request. Finished games are scored locally.
    async fn evaluate_position<E: PositionEvaluator>(
        &self,
        evaluator: &E,
        position: &Chess,
        index: usize,
    ) -> Result<EngineEvaluation, ReviewError> {
        if let Some(terminal) = terminal_evaluation(position) {
            debug!(index, "Terminal position scored locally");
            return Ok(terminal);
        }

        tokio::time::sleep(self.delay).await;
        evaluator.evaluate(&to_fen(position), self.depth).await
    }
}

/// Checkmate and drawn positions need no engine.
fn terminal_evaluation(position: &Chess) -> Option<EngineEvaluation> {
    if position.is_checkmate() {
        let score = match position.turn() {
            Color::White => -MATE_SCORE,
            Color::Black => MATE_SCORE,
        };
        return Some(EngineEvaluation {
            score_centipawns: score,
            mate_in: Some(0),
            best_move: None,
        });
    }
    if position.is_stalemate() || position.is_insufficient_material() {
        return Some(EngineEvaluation::from_centipawns(0.0, None));
    }
    None
}
