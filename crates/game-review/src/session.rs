//! One review of one game: owns the pipeline task and publishes snapshots.
//!
//! Each loaded game gets its own task and its own watch channel. Loading a
//! new game (or dropping the session) aborts the previous task, so a stale
//! run can never publish into the new game's channel.

use std::path::Path;
use std::sync::Arc;

use chess_core::{GameSource, PositionCodec};
use serde::Serialize;
use shakmaty::Color;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analysis::{MoveAnalysis, ReviewBuilder};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::evaluation::PositionEvaluator;
use crate::export::annotate_game;
use crate::pipeline::{EvaluationPipeline, EvaluationSeries, PipelineState};
use crate::rating::{RunningRatings, SideSummary};
use crate::replay::ReplayController;

/// Everything a presentation layer needs at one point of the run.
/// Only entries that have actually been produced are present.
#[derive(Debug, Clone)]
pub struct ReviewSnapshot {
    pub generation: u64,
    pub state: PipelineState,
    pub completed_plies: usize,
    pub total_plies: usize,
    pub series: EvaluationSeries,
    pub moves: Vec<MoveAnalysis>,
    pub ratings: RunningRatings,
    pub white: SideSummary,
    pub black: SideSummary,
}

/// Serialisable per-side result.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub white: SideSummary,
    pub black: SideSummary,
    pub complete: bool,
}

impl ReviewSnapshot {
    pub(crate) fn idle(generation: u64, total_plies: usize, builder: &ReviewBuilder) -> Self {
        Self {
            generation,
            state: PipelineState::Idle,
            completed_plies: 0,
            total_plies,
            series: EvaluationSeries::default(),
            moves: Vec::new(),
            ratings: builder.ratings(),
            white: builder.summary(Color::White),
            black: builder.summary(Color::Black),
        }
    }

    fn capture(
        generation: u64,
        pipeline: &EvaluationPipeline,
        builder: &ReviewBuilder,
        total_plies: usize,
    ) -> Self {
        Self {
            generation,
            state: pipeline.state().clone(),
            completed_plies: builder.moves().len(),
            total_plies,
            series: pipeline.series().clone(),
            moves: builder.moves().to_vec(),
            ratings: builder.ratings(),
            white: builder.summary(Color::White),
            black: builder.summary(Color::Black),
        }
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_plies == 0 {
            return if self.state.is_finished() { 100.0 } else { 0.0 };
        }
        100.0 * self.completed_plies as f64 / self.total_plies as f64
    }

    pub fn is_complete(&self) -> bool {
        self.state == PipelineState::Complete
    }

    pub fn summary(&self) -> ReviewSummary {
        ReviewSummary {
            white: self.white.clone(),
            black: self.black.clone(),
            complete: self.is_complete(),
        }
    }

    /// Summary plus per-move records as JSON.
    pub fn to_json(&self) -> Result<String, ReviewError> {
        #[derive(Serialize)]
        struct Report<'a> {
            #[serde(flatten)]
            summary: ReviewSummary,
            moves: &'a [MoveAnalysis],
        }

        Ok(serde_json::to_string_pretty(&Report {
            summary: self.summary(),
            moves: &self.moves,
        })?)
    }
}

pub struct ReviewSession<E> {
    evaluator: Arc<E>,
    config: ReviewConfig,
    game: GameSource,
    codec: Arc<PositionCodec>,
    generation: u64,
    snapshots: watch::Receiver<Arc<ReviewSnapshot>>,
    task: JoinHandle<()>,
    replay: Arc<ReplayController>,
}

impl<E> ReviewSession<E>
where
    E: PositionEvaluator + 'static,
{
    /// Validate the game and start evaluating it in the background.
    /// An illegal move list is returned here and nothing is spawned.
    pub fn start(
        game: GameSource,
        evaluator: Arc<E>,
        config: ReviewConfig,
    ) -> Result<Self, ReviewError> {
        let codec = Arc::new(PositionCodec::new(game.starting_fen.as_deref(), &game.moves)?);
        let (snapshots, task) = spawn_review(1, &game, &codec, &evaluator, &config);
        let replay = Arc::new(ReplayController::new(
            Arc::clone(&codec),
            snapshots.clone(),
            config.replay.clone(),
        ));

        Ok(Self {
            evaluator,
            config,
            game,
            codec,
            generation: 1,
            snapshots,
            task,
            replay,
        })
    }

    /// Replace the current game. The running evaluation is cancelled and the
    /// replay cursor is rebound to the new game; if the new game is invalid
    /// the current one is kept.
    pub fn load_game(&mut self, game: GameSource) -> Result<(), ReviewError> {
        let codec = Arc::new(PositionCodec::new(game.starting_fen.as_deref(), &game.moves)?);

        self.task.abort();
        self.generation += 1;
        info!(generation = self.generation, plies = codec.len(), "Loading new game");

        let (snapshots, task) =
            spawn_review(self.generation, &game, &codec, &self.evaluator, &self.config);
        self.replay.rebind(Arc::clone(&codec), snapshots.clone());
        self.game = game;
        self.codec = codec;
        self.snapshots = snapshots;
        self.task = task;
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn game(&self) -> &GameSource {
        &self.game
    }

    pub fn codec(&self) -> &Arc<PositionCodec> {
        &self.codec
    }

    pub fn snapshot(&self) -> Arc<ReviewSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ReviewSnapshot>> {
        self.snapshots.clone()
    }

    /// Resolve once the pipeline has completed or failed.
    pub async fn wait_until_finished(&self) -> Arc<ReviewSnapshot> {
        let mut rx = self.snapshots.clone();
        let finished = rx
            .wait_for(|s| s.state.is_finished())
            .await
            .map(|s| Arc::clone(&s))
            .ok();
        // Sender gone without finishing: the task was aborted
        finished.unwrap_or_else(|| self.snapshot())
    }

    /// The session's replay cursor. It follows the session across
    /// [`load_game`](Self::load_game).
    pub fn replay(&self) -> Arc<ReplayController> {
        Arc::clone(&self.replay)
    }

    /// PGN of the current game annotated with whatever has been analysed.
    pub fn download_annotated_game(&self) -> String {
        let snapshot = self.snapshot();
        annotate_game(&self.game, &self.codec, &snapshot.moves)
    }

    pub fn save_annotated_game(&self, path: impl AsRef<Path>) -> Result<(), ReviewError> {
        std::fs::write(path, self.download_annotated_game())?;
        Ok(())
    }
}

impl<E> Drop for ReviewSession<E> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn spawn_review<E>(
    generation: u64,
    game: &GameSource,
    codec: &Arc<PositionCodec>,
    evaluator: &Arc<E>,
    config: &ReviewConfig,
) -> (watch::Receiver<Arc<ReviewSnapshot>>, JoinHandle<()>)
where
    E: PositionEvaluator + 'static,
{
    let builder = ReviewBuilder::new(
        game.white.rating,
        game.black.rating,
        config.classifier.clone(),
    );
    let initial = ReviewSnapshot::idle(generation, codec.len(), &builder);
    let (tx, rx) = watch::channel(Arc::new(initial));

    let task = tokio::spawn(run_review(
        generation,
        Arc::clone(codec),
        Arc::clone(evaluator),
        config.clone(),
        builder,
        tx,
    ));
    (rx, task)
}

async fn run_review<E: PositionEvaluator>(
    generation: u64,
    codec: Arc<PositionCodec>,
    evaluator: Arc<E>,
    config: ReviewConfig,
    mut builder: ReviewBuilder,
    tx: watch::Sender<Arc<ReviewSnapshot>>,
) {
    let total = codec.len();
    let mut pipeline = EvaluationPipeline::new(&config.evaluation);

    let result = pipeline
        .run(&codec, evaluator.as_ref(), |p| {
            builder.extend(&codec, p.series());
            tx.send_replace(Arc::new(ReviewSnapshot::capture(generation, p, &builder, total)));
        })
        .await;

    match result {
        Ok(()) => info!(
            generation,
            white_accuracy = builder.summary(Color::White).accuracy,
            black_accuracy = builder.summary(Color::Black).accuracy,
            "Review complete"
        ),
        Err(e) => {
            warn!(generation, error = %e, "Review failed");
            let snapshot = ReviewSnapshot::capture(generation, &pipeline, &builder, total);
            tx.send_replace(Arc::new(snapshot));
        }
    }
}
