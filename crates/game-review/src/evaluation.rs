//! Position evaluation: score normalisation and the HTTP evaluation service.
//!
//! All scores leaving this module are centipawns from White's point of view.
//! Mate scores are folded into the same scale at a large magnitude so that
//! a faster mate always orders above a slower one.

use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EvaluationConfig;
use crate::error::ReviewError;

/// Base magnitude of a mate score
pub const MATE_SCORE: f64 = 10_000.0;

/// Distance penalty per move to mate
const MATE_STEP: f64 = 10.0;

/// Ordinary scores are clamped below the mate band
pub const MAX_CENTIPAWNS: f64 = 9_000.0;

/// Map mate-in-N (positive = White mates) onto the centipawn scale.
pub fn mate_score(mate_in: i32) -> f64 {
    let m = mate_in as f64;
    if mate_in > 0 {
        MATE_SCORE - m * MATE_STEP
    } else {
        -MATE_SCORE - m * MATE_STEP
    }
}

/// One point of an evaluation series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSample {
    pub ply: usize,
    pub score_centipawns: f64,
    pub is_mate: bool,
    pub mate_ply: Option<i32>,
}

impl EvaluationSample {
    pub fn neutral(ply: usize) -> Self {
        Self {
            ply,
            score_centipawns: 0.0,
            is_mate: false,
            mate_ply: None,
        }
    }

    /// Same score, re-indexed. Used when a missing value falls back to a
    /// neighbouring one.
    pub fn at_ply(self, ply: usize) -> Self {
        Self { ply, ..self }
    }

    /// "+0.35", "-1.20", "#3", "#-2"
    pub fn display(&self) -> String {
        match self.mate_ply {
            Some(m) if self.is_mate => format!("#{m}"),
            _ => format!("{:+.2}", self.score_centipawns / 100.0),
        }
    }
}

/// Normalised result of a single evaluation request.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvaluation {
    pub score_centipawns: f64,
    pub mate_in: Option<i32>,
    /// Engine's preferred move in UCI notation
    pub best_move: Option<String>,
}

impl EngineEvaluation {
    pub fn from_centipawns(cp: f64, best_move: Option<String>) -> Self {
        Self {
            score_centipawns: cp.clamp(-MAX_CENTIPAWNS, MAX_CENTIPAWNS),
            mate_in: None,
            best_move,
        }
    }

    pub fn from_mate(mate_in: i32, best_move: Option<String>) -> Self {
        Self {
            score_centipawns: mate_score(mate_in),
            mate_in: Some(mate_in),
            best_move,
        }
    }

    pub fn sample(&self, ply: usize) -> EvaluationSample {
        EvaluationSample {
            ply,
            score_centipawns: self.score_centipawns,
            is_mate: self.mate_in.is_some(),
            mate_ply: self.mate_in,
        }
    }
}

/// Something that can score a position given as FEN.
///
/// Implementations report transport or format problems as
/// [`ReviewError::EvaluationUnavailable`]; the caller owns the fallback policy.
pub trait PositionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        fen: &str,
        depth: u8,
    ) -> impl Future<Output = Result<EngineEvaluation, ReviewError>> + Send;
}

/// Response body of the evaluation service.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    /// Pawns, White's point of view
    evaluation: Option<f64>,
    /// Moves to mate, positive when White mates
    mate: Option<i32>,
    /// "bestmove e2e4 ponder e7e5"
    bestmove: Option<String>,
    data: Option<String>,
}

/// Pull the move out of "bestmove e2e4 ponder e7e5" (or a bare "e2e4").
pub fn parse_bestmove(raw: &str) -> Option<String> {
    let mut parts = raw.split_whitespace();
    let first = parts.next()?;
    let mv = if first == "bestmove" { parts.next()? } else { first };
    if mv == "(none)" || mv.len() < 4 {
        return None;
    }
    Some(mv.to_string())
}

/// Decode a service response body.
pub fn parse_response(body: &str) -> Result<EngineEvaluation, ReviewError> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ReviewError::EvaluationUnavailable(format!("Malformed response: {e}")))?;

    if !response.success {
        let reason = response.data.unwrap_or_else(|| "success=false".to_string());
        return Err(ReviewError::EvaluationUnavailable(reason));
    }

    let best_move = response.bestmove.as_deref().and_then(parse_bestmove);

    match (response.mate, response.evaluation) {
        (Some(m), _) if m != 0 => Ok(EngineEvaluation::from_mate(m, best_move)),
        (_, Some(pawns)) if pawns.is_finite() => {
            Ok(EngineEvaluation::from_centipawns(pawns * 100.0, best_move))
        }
        _ => Err(ReviewError::EvaluationUnavailable(
            "Response has no usable score".to_string(),
        )),
    }
}

/// Client for the hosted evaluation service.
pub struct HttpEvaluator {
    client: Client,
    api_url: String,
}

impl HttpEvaluator {
    pub fn new(config: &EvaluationConfig) -> Result<Self, ReviewError> {
        let client = Client::builder()
            .user_agent("GameReview/1.0")
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }
}

impl PositionEvaluator for HttpEvaluator {
    async fn evaluate(&self, fen: &str, depth: u8) -> Result<EngineEvaluation, ReviewError> {
        let params = [("fen", fen.to_string()), ("depth", depth.to_string())];

        let resp = self
            .client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ReviewError::EvaluationUnavailable(format!("Request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ReviewError::EvaluationUnavailable(format!(
                "HTTP {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ReviewError::EvaluationUnavailable(format!("Body read error: {e}")))?;

        debug!(fen, depth, "Evaluation response received");
        parse_response(&body)
    }
}
