//! Review error types

use chess_core::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    /// The supplied game cannot be replayed; analysis does not start.
    #[error("Game cannot be replayed: {0}")]
    InvalidMoveSequence(#[from] CodecError),

    #[error("Evaluation unavailable: {0}")]
    EvaluationUnavailable(String),

    #[error("Best move unparsable: {0}")]
    BestMoveUnparsable(String),

    #[error("Pipeline failed: {0}")]
    PipelineFailed(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
