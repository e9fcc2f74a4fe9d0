//! Per-move analysis records built from the evaluation series.

use chess_core::PositionCodec;
use serde::Serialize;
use shakmaty::Color;
use tracing::debug;

use crate::classification::{centipawn_loss, classify_move, MoveQuality};
use crate::config::ClassifierConfig;
use crate::pipeline::EvaluationSeries;
use crate::rating::{summarize, RunningRatings, SideSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveAnalysis {
    pub ply: usize,
    pub move_number: u32,
    pub is_white: bool,
    pub san: String,
    #[serde(rename = "move")]
    pub uci: String,
    pub best_move: Option<String>,
    pub cpl: f64,
    pub quality: MoveQuality,
    /// White-POV centipawns before the move
    pub eval_before: f64,
    pub eval_after: f64,
    pub best_eval: f64,
    pub estimated_rating_after_move: f64,
}

impl MoveAnalysis {
    pub fn side(&self) -> Color {
        if self.is_white {
            Color::White
        } else {
            Color::Black
        }
    }
}

/// Both sides' results for a finished (or partial) review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameReview {
    pub moves: Vec<MoveAnalysis>,
    pub white: SideSummary,
    pub black: SideSummary,
}

/// Incrementally turns evaluated plies into [`MoveAnalysis`] records.
///
/// Plies are consumed strictly in order, so ratings are folded in the same
/// order the moves were played no matter how often `extend` is called.
#[derive(Debug, Clone)]
pub struct ReviewBuilder {
    config: ClassifierConfig,
    ratings: RunningRatings,
    moves: Vec<MoveAnalysis>,
}

impl ReviewBuilder {
    pub fn new(
        white_rating: Option<u32>,
        black_rating: Option<u32>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            ratings: RunningRatings::new(white_rating, black_rating, &config),
            config,
            moves: Vec::new(),
        }
    }

    pub fn moves(&self) -> &[MoveAnalysis] {
        &self.moves
    }

    pub fn ratings(&self) -> RunningRatings {
        self.ratings
    }

    /// Analyse every ply the series covers that has not been analysed yet.
    /// Returns the number of new records.
    pub fn extend(&mut self, codec: &PositionCodec, series: &EvaluationSeries) -> usize {
        let start = self.moves.len();
        let available = series.completed_plies().min(codec.len());

        for ply in start..available {
            let Some(record) = codec.ply(ply) else {
                break;
            };
            let eval_before = series.after_actual()[ply].score_centipawns;
            let eval_after = series.after_actual()[ply + 1].score_centipawns;
            let best_eval = series.after_best()[ply + 1].score_centipawns;

            let side = record.side;
            let cpl = centipawn_loss(best_eval, eval_after, side);
            let quality = classify_move(ply, cpl, eval_before, eval_after, side, &self.config);
            let rating = self.ratings.update(side, quality, cpl);

            debug!(ply, san = %record.san, cpl, quality = %quality, rating, "Move classified");

            self.moves.push(MoveAnalysis {
                ply,
                move_number: record.move_number,
                is_white: side == Color::White,
                san: record.san.clone(),
                uci: record.uci.clone(),
                best_move: series.best_move(ply).map(str::to_string),
                cpl,
                quality,
                eval_before,
                eval_after,
                best_eval,
                estimated_rating_after_move: rating,
            });
        }

        self.moves.len() - start
    }

    pub fn summary(&self, side: Color) -> SideSummary {
        summarize(
            self.moves
                .iter()
                .filter(|m| m.side() == side)
                .map(|m| (m.quality, m.cpl)),
            self.ratings.get(side),
        )
    }

    pub fn finish(self) -> GameReview {
        GameReview {
            white: self.summary(Color::White),
            black: self.summary(Color::Black),
            moves: self.moves,
        }
    }
}

/// Analyse a fully evaluated game in one go.
pub fn review_game(
    codec: &PositionCodec,
    series: &EvaluationSeries,
    white_rating: Option<u32>,
    black_rating: Option<u32>,
    config: &ClassifierConfig,
) -> GameReview {
    let mut builder = ReviewBuilder::new(white_rating, black_rating, config.clone());
    builder.extend(codec, series);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::EvaluationSample;

    fn sample(ply: usize, cp: f64) -> EvaluationSample {
        EvaluationSample {
            score_centipawns: cp,
            ..EvaluationSample::neutral(ply)
        }
    }

    fn codec(line: &str) -> PositionCodec {
        let moves: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        PositionCodec::new(None, &moves).unwrap()
    }

    #[test]
    fn test_opening_with_level_evals_is_book() {
        let codec = codec("e4 e5 Nf3 Nc6");
        let mut series = EvaluationSeries::default();
        series.push_start(sample(0, 0.0));
        for ply in 1..=4 {
            series.push_ply(sample(ply, 0.0), sample(ply, 0.0), None);
        }

        let review = review_game(&codec, &series, None, Some(1720), &ClassifierConfig::default());
        assert_eq!(review.moves.len(), 4);
        assert!(review.moves.iter().all(|m| m.quality == MoveQuality::Book));
        assert_eq!(review.white.final_rating, 1500.0);
        assert_eq!(review.black.final_rating, 1720.0);
        assert_eq!(review.white.counts.book, 2);
        assert_eq!(review.black.accuracy, 100.0);
    }

    #[test]
    fn test_extend_only_consumes_completed_plies() {
        let codec = codec("d4 d5 c4 e6");
        let mut series = EvaluationSeries::default();
        let mut builder = ReviewBuilder::new(None, None, ClassifierConfig::default());
        assert_eq!(builder.extend(&codec, &series), 0);

        series.push_start(sample(0, 20.0));
        series.push_ply(sample(1, 30.0), sample(1, 30.0), Some("d2d4".into()));
        assert_eq!(builder.extend(&codec, &series), 1);
        assert_eq!(builder.extend(&codec, &series), 0);

        // Black drops a pawn and a half against the engine line
        series.push_ply(sample(2, 180.0), sample(2, 25.0), Some("g8f6".into()));
        assert_eq!(builder.extend(&codec, &series), 1);

        let black = &builder.moves()[1];
        assert!(!black.is_white);
        assert_eq!(black.move_number, 1);
        assert_eq!(black.cpl, 155.0);
        assert_eq!(black.quality, MoveQuality::Blunder);
        assert_eq!(black.best_move.as_deref(), Some("g8f6"));
        assert!(black.estimated_rating_after_move < 1500.0);
        assert_eq!(builder.ratings().white, 1500.0);
    }
}
