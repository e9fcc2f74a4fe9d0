//! Game review: engine evaluation of every ply, move-quality labels,
//! running rating estimates and a replay cursor over the result.

pub mod analysis;
pub mod classification;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod pipeline;
pub mod rating;
pub mod replay;
pub mod session;
pub mod stockfish;

pub use analysis::{review_game, GameReview, MoveAnalysis, ReviewBuilder};
pub use classification::MoveQuality;
pub use config::ReviewConfig;
pub use error::ReviewError;
pub use evaluation::{EngineEvaluation, EvaluationSample, HttpEvaluator, PositionEvaluator};
pub use pipeline::{EvaluationPipeline, EvaluationSeries, PipelineState};
pub use replay::{NavigationRejected, ReplayController, ReplayView};
pub use session::{ReviewSession, ReviewSnapshot};
pub use stockfish::UciEvaluator;
