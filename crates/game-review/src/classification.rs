//! Move classification and per-move rating estimate. Pure functions only.
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::config::ClassifierConfig;

/// Classification thresholds (centipawn loss, inclusive)
const THRESHOLD_BEST: f64 = 8.0;
const THRESHOLD_EXCELLENT: f64 = 20.0;
const THRESHOLD_GOOD: f64 = 40.0;
const THRESHOLD_INACCURACY: f64 = 80.0;
const THRESHOLD_MISTAKE: f64 = 150.0;

/// Rating estimate for a near-perfect move
const RATING_CEILING: f64 = 2200.0;
/// Rating estimate for anything past the last curve point
const RATING_FLOOR: f64 = 700.0;

/// (cpl, rating) knots of the piecewise-linear rating curve
const RATING_CURVE: [(f64, f64); 8] = [
    (5.0, 2200.0),
    (10.0, 2000.0),
    (20.0, 1800.0),
    (35.0, 1600.0),
    (55.0, 1400.0),
    (80.0, 1200.0),
    (120.0, 1000.0),
    (180.0, 800.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    Book,
    Brilliant,
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveQuality {
    pub const ALL: [MoveQuality; 8] = [
        MoveQuality::Book,
        MoveQuality::Brilliant,
        MoveQuality::Best,
        MoveQuality::Excellent,
        MoveQuality::Good,
        MoveQuality::Inaccuracy,
        MoveQuality::Mistake,
        MoveQuality::Blunder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveQuality::Book => "book",
            MoveQuality::Brilliant => "brilliant",
            MoveQuality::Best => "best",
            MoveQuality::Excellent => "excellent",
            MoveQuality::Good => "good",
            MoveQuality::Inaccuracy => "inaccuracy",
            MoveQuality::Mistake => "mistake",
            MoveQuality::Blunder => "blunder",
        }
    }

    /// PGN numeric annotation glyph, if the quality has one
    pub fn nag(&self) -> Option<u8> {
        match self {
            MoveQuality::Brilliant => Some(3),
            MoveQuality::Mistake => Some(2),
            MoveQuality::Blunder => Some(4),
            MoveQuality::Inaccuracy => Some(6),
            _ => None,
        }
    }
}

impl std::fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Centipawns the mover gave up relative to the engine's move. Never negative.
pub fn centipawn_loss(best_eval: f64, actual_eval: f64, side: Color) -> f64 {
    let loss = match side {
        Color::White => best_eval - actual_eval,
        Color::Black => actual_eval - best_eval,
    };
    if loss.is_nan() {
        return 0.0;
    }
    loss.max(0.0)
}

/// Classify ply `ply` (0-based). `prev_eval` and `actual_eval` are the
/// White-POV evaluations before and after the move.
pub fn classify_move(
    ply: usize,
    cpl: f64,
    prev_eval: f64,
    actual_eval: f64,
    side: Color,
    config: &ClassifierConfig,
) -> MoveQuality {
    if ply < config.book_ply_limit && cpl < config.book_cpl_limit {
        return MoveQuality::Book;
    }

    let (prev_for_mover, swing) = match side {
        Color::White => (prev_eval, actual_eval - prev_eval),
        Color::Black => (-prev_eval, prev_eval - actual_eval),
    };
    if cpl <= config.brilliant_max_cpl
        && prev_for_mover < config.brilliant_winning_cp
        && swing >= config.brilliant_min_swing_cp
    {
        return MoveQuality::Brilliant;
    }

    if cpl <= THRESHOLD_BEST {
        MoveQuality::Best
    } else if cpl <= THRESHOLD_EXCELLENT {
        MoveQuality::Excellent
    } else if cpl <= THRESHOLD_GOOD {
        MoveQuality::Good
    } else if cpl <= THRESHOLD_INACCURACY {
        MoveQuality::Inaccuracy
    } else if cpl <= THRESHOLD_MISTAKE {
        MoveQuality::Mistake
    } else {
        MoveQuality::Blunder
    }
}

/// Playing strength suggested by a single move's centipawn loss.
pub fn rating_for_cpl(cpl: f64) -> f64 {
    let (first_cpl, _) = RATING_CURVE[0];
    if cpl < first_cpl {
        return RATING_CEILING;
    }
    for pair in RATING_CURVE.windows(2) {
        let ((lo_cpl, lo_rating), (hi_cpl, hi_rating)) = (pair[0], pair[1]);
        if cpl < hi_cpl {
            let t = (cpl - lo_cpl) / (hi_cpl - lo_cpl);
            return lo_rating + t * (hi_rating - lo_rating);
        }
    }
    RATING_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(ply: usize, cpl: f64) -> MoveQuality {
        classify_move(ply, cpl, 0.0, 0.0, Color::White, &ClassifierConfig::default())
    }

    #[test]
    fn test_classify_move() {
        assert_eq!(classify(30, 0.0), MoveQuality::Best);
        assert_eq!(classify(30, 8.0), MoveQuality::Best);
        assert_eq!(classify(30, 15.0), MoveQuality::Excellent);
        assert_eq!(classify(30, 40.0), MoveQuality::Good);
        assert_eq!(classify(30, 75.0), MoveQuality::Inaccuracy);
        assert_eq!(classify(30, 150.0), MoveQuality::Mistake);
        assert_eq!(classify(30, 151.0), MoveQuality::Blunder);
    }

    #[test]
    fn test_book_window() {
        assert_eq!(classify(0, 0.0), MoveQuality::Book);
        assert_eq!(classify(9, 24.9), MoveQuality::Book);
        assert_eq!(classify(9, 25.0), MoveQuality::Good);
        assert_eq!(classify(10, 0.0), MoveQuality::Best);
    }

    #[test]
    fn test_brilliant_requires_swing_from_level_position() {
        let config = ClassifierConfig::default();
        // White turns +0.20 into +1.50 with the engine's move
        assert_eq!(
            classify_move(30, 2.0, 20.0, 150.0, Color::White, &config),
            MoveQuality::Brilliant
        );
        // Already winning: just best
        assert_eq!(
            classify_move(30, 2.0, 300.0, 450.0, Color::White, &config),
            MoveQuality::Best
        );
        // Black's swing is measured downwards
        assert_eq!(
            classify_move(30, 0.0, 0.0, -120.0, Color::Black, &config),
            MoveQuality::Brilliant
        );
        assert_eq!(
            classify_move(30, 0.0, 0.0, 120.0, Color::Black, &config),
            MoveQuality::Best
        );
    }

    #[test]
    fn test_cpl_calculation() {
        assert_eq!(centipawn_loss(100.0, 80.0, Color::White), 20.0);
        assert_eq!(centipawn_loss(100.0, 120.0, Color::Black), 20.0);
        assert_eq!(centipawn_loss(80.0, 100.0, Color::White), 0.0);
        assert!((centipawn_loss(0.2, -3.0, Color::White) - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_rating_curve() {
        assert_eq!(rating_for_cpl(0.0), 2200.0);
        assert_eq!(rating_for_cpl(4.9), 2200.0);
        assert_eq!(rating_for_cpl(5.0), 2200.0);
        assert_eq!(rating_for_cpl(7.5), 2100.0);
        assert_eq!(rating_for_cpl(20.0), 1800.0);
        assert_eq!(rating_for_cpl(150.0), 900.0);
        assert_eq!(rating_for_cpl(180.0), 700.0);
        assert_eq!(rating_for_cpl(5000.0), 700.0);

        let mut last = f64::INFINITY;
        for cpl in 0..400 {
            let r = rating_for_cpl(cpl as f64 * 0.5);
            assert!(r <= last);
            last = r;
        }
    }

    #[test]
    fn test_quality_labels() {
        assert_eq!(MoveQuality::Blunder.nag(), Some(4));
        assert_eq!(MoveQuality::Best.nag(), None);
        assert_eq!(
            serde_json::to_string(&MoveQuality::Inaccuracy).unwrap(),
            "\"inaccuracy\""
        );
        assert_eq!(MoveQuality::ALL.len(), 8);
    }
}
