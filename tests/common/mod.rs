#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chess_core::{GameSource, PositionCodec};
use game_review::config::ReviewConfig;
use game_review::error::ReviewError;
use game_review::evaluation::{EngineEvaluation, PositionEvaluator};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position};

pub const RUY_LOPEZ: &str = "e4 e5 Nf3 Nc6 Bb5 a6 Ba4 Nf6 O-O Be7 Re1 b5 Bb3 d6";

/// Defaults with no pause between requests.
pub fn fast_config() -> ReviewConfig {
    let mut config = ReviewConfig::default();
    config.evaluation.request_delay = Duration::ZERO;
    config
}

pub fn game(line: &str) -> GameSource {
    GameSource::from_san_line(line)
}

pub fn codec(line: &str) -> PositionCodec {
    let game = game(line);
    PositionCodec::new(None, &game.moves).unwrap()
}

/// In-memory evaluator with per-FEN scripted answers.
///
/// Unscripted positions score `default_cp` and suggest their first legal move.
pub struct ScriptedEvaluator {
    scores: HashMap<String, f64>,
    best_moves: HashMap<String, String>,
    failing: HashSet<String>,
    suggest_moves: bool,
    default_cp: f64,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
            best_moves: HashMap::new(),
            failing: HashSet::new(),
            suggest_moves: true,
            default_cp: 0.0,
            latency: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_score(mut self, fen: impl Into<String>, cp: f64) -> Self {
        self.scores.insert(fen.into(), cp);
        self
    }

    pub fn with_best_move(mut self, fen: impl Into<String>, uci: impl Into<String>) -> Self {
        self.best_moves.insert(fen.into(), uci.into());
        self
    }

    pub fn failing_on(mut self, fen: impl Into<String>) -> Self {
        self.failing.insert(fen.into());
        self
    }

    pub fn without_best_moves(mut self) -> Self {
        self.suggest_moves = false;
        self
    }

    pub fn with_default(mut self, cp: f64) -> Self {
        self.default_cp = cp;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// FENs requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn best_move_for(&self, fen: &str) -> Option<String> {
        if let Some(uci) = self.best_moves.get(fen) {
            return Some(uci.clone());
        }
        if !self.suggest_moves {
            return None;
        }
        let pos: Chess = fen
            .parse::<Fen>()
            .ok()?
            .into_position(CastlingMode::Standard)
            .ok()?;
        let moves = pos.legal_moves();
        moves
            .first()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
    }
}

impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, fen: &str, _depth: u8) -> Result<EngineEvaluation, ReviewError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(fen.to_string());

        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(fen) {
            return Err(ReviewError::EvaluationUnavailable("scripted failure".into()));
        }
        let cp = self.scores.get(fen).copied().unwrap_or(self.default_cp);
        Ok(EngineEvaluation::from_centipawns(cp, self.best_move_for(fen)))
    }
}
