//! Running rating estimate and per-side accuracy.

use serde::Serialize;
use shakmaty::Color;

use crate::classification::{rating_for_cpl, MoveQuality};
use crate::config::ClassifierConfig;

/// Accuracy curve coefficients
const ACCURACY_SCALE: f64 = 103.1668;
const ACCURACY_DECAY: f64 = 0.04354;
const ACCURACY_OFFSET: f64 = 3.1668;

/// Exponentially smoothed rating estimate for both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunningRatings {
    pub white: f64,
    pub black: f64,
    #[serde(skip)]
    initial_white: f64,
    #[serde(skip)]
    initial_black: f64,
    #[serde(skip)]
    alpha: f64,
}

impl RunningRatings {
    /// Seed from the players' known ratings, or the configured default.
    pub fn new(white: Option<u32>, black: Option<u32>, config: &ClassifierConfig) -> Self {
        let seed = |r: Option<u32>| r.map(f64::from).unwrap_or(config.default_rating);
        let (white, black) = (seed(white), seed(black));
        Self {
            white,
            black,
            initial_white: white,
            initial_black: black,
            alpha: config.rating_smoothing,
        }
    }

    pub fn get(&self, side: Color) -> f64 {
        match side {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn initial(&self, side: Color) -> f64 {
        match side {
            Color::White => self.initial_white,
            Color::Black => self.initial_black,
        }
    }

    /// Fold one move into the mover's rating and return the new value.
    /// Book moves leave the rating untouched.
    pub fn update(&mut self, side: Color, quality: MoveQuality, cpl: f64) -> f64 {
        let alpha = self.alpha;
        let rating = match side {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        if quality != MoveQuality::Book {
            *rating = alpha * rating_for_cpl(cpl) + (1.0 - alpha) * *rating;
        }
        *rating
    }
}

/// Accuracy percentage for an average centipawn loss, one decimal.
pub fn calculate_accuracy(avg_cpl: f64) -> f64 {
    let raw = ACCURACY_SCALE * (-ACCURACY_DECAY * avg_cpl).exp() - ACCURACY_OFFSET;
    ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityCounts {
    pub book: u32,
    pub brilliant: u32,
    pub best: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl QualityCounts {
    pub fn record(&mut self, quality: MoveQuality) {
        let slot = match quality {
            MoveQuality::Book => &mut self.book,
            MoveQuality::Brilliant => &mut self.brilliant,
            MoveQuality::Best => &mut self.best,
            MoveQuality::Excellent => &mut self.excellent,
            MoveQuality::Good => &mut self.good,
            MoveQuality::Inaccuracy => &mut self.inaccuracy,
            MoveQuality::Mistake => &mut self.mistake,
            MoveQuality::Blunder => &mut self.blunder,
        };
        *slot += 1;
    }

    pub fn get(&self, quality: MoveQuality) -> u32 {
        match quality {
            MoveQuality::Book => self.book,
            MoveQuality::Brilliant => self.brilliant,
            MoveQuality::Best => self.best,
            MoveQuality::Excellent => self.excellent,
            MoveQuality::Good => self.good,
            MoveQuality::Inaccuracy => self.inaccuracy,
            MoveQuality::Mistake => self.mistake,
            MoveQuality::Blunder => self.blunder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideSummary {
    pub accuracy: f64,
    /// Average over non-book moves
    pub avg_cpl: f64,
    pub move_count: u32,
    pub counts: QualityCounts,
    pub final_rating: f64,
}

/// Summarise one side from its (quality, cpl) pairs.
pub fn summarize<I>(moves: I, final_rating: f64) -> SideSummary
where
    I: IntoIterator<Item = (MoveQuality, f64)>,
{
    let mut counts = QualityCounts::default();
    let mut move_count = 0;
    let mut scored = 0u32;
    let mut total_cpl = 0.0;

    for (quality, cpl) in moves {
        counts.record(quality);
        move_count += 1;
        if quality != MoveQuality::Book {
            scored += 1;
            total_cpl += cpl;
        }
    }

    let avg_cpl = if scored == 0 {
        0.0
    } else {
        total_cpl / f64::from(scored)
    };

    SideSummary {
        accuracy: calculate_accuracy(avg_cpl),
        avg_cpl,
        move_count,
        counts,
        final_rating,
    }
}
