//! Review configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ReviewError;

pub const DEFAULT_EVAL_API_URL: &str = "https://stockfish.online/api/s/v2.php";

#[derive(Clone, Debug)]
pub struct EvaluationConfig {
    /// Position-evaluation service endpoint
    pub api_url: String,

    /// Local UCI engine binary; when set it replaces the HTTP service
    pub engine_path: Option<String>,

    /// Fixed search depth for every request
    pub search_depth: u8,

    /// Pause before every request to the rate-limited service
    pub request_delay: Duration,

    pub request_timeout: Duration,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_EVAL_API_URL.to_string(),
            engine_path: None,
            search_depth: 13,
            request_delay: Duration::from_millis(150),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Classification and rating thresholds. Centipawn values are from the
/// mover's point of view.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    /// Plies below this index may be classified as book
    pub book_ply_limit: usize,
    /// Book moves must lose strictly less than this
    pub book_cpl_limit: f64,

    pub brilliant_max_cpl: f64,
    /// Evaluation gain the move must produce for the mover
    pub brilliant_min_swing_cp: f64,
    /// The mover must not already be this far ahead
    pub brilliant_winning_cp: f64,

    /// Starting rating for players without a known rating
    pub default_rating: f64,
    /// Exponential smoothing factor for the running rating
    pub rating_smoothing: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            book_ply_limit: 10,
            book_cpl_limit: 25.0,
            brilliant_max_cpl: 5.0,
            brilliant_min_swing_cp: 100.0,
            brilliant_winning_cp: 150.0,
            default_rating: 1500.0,
            rating_smoothing: 0.1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Minimum wall time between two accepted cursor transitions
    pub throttle: Duration,
    /// Step interval while auto-playing
    pub autoplay_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(100),
            autoplay_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReviewConfig {
    pub evaluation: EvaluationConfig,
    pub classifier: ClassifierConfig,
    pub replay: ReplayConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ReviewConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ReviewError> {
        let defaults = Self::default();

        let api_url = env::var("EVAL_API_URL").unwrap_or(defaults.evaluation.api_url);
        let engine_path = env::var("STOCKFISH_PATH").ok().filter(|p| !p.trim().is_empty());

        let evaluation = EvaluationConfig {
            api_url,
            engine_path,
            search_depth: env_or("EVAL_SEARCH_DEPTH", defaults.evaluation.search_depth),
            request_delay: Duration::from_millis(env_or("EVAL_REQUEST_DELAY_MS", 150)),
            request_timeout: Duration::from_secs(env_or("EVAL_REQUEST_TIMEOUT_SECS", 30)),
        };

        let d = &defaults.classifier;
        let classifier = ClassifierConfig {
            book_ply_limit: env_or("BOOK_PLY_LIMIT", d.book_ply_limit),
            book_cpl_limit: env_or("BOOK_CPL_LIMIT", d.book_cpl_limit),
            brilliant_max_cpl: env_or("BRILLIANT_MAX_CPL", d.brilliant_max_cpl),
            brilliant_min_swing_cp: env_or("BRILLIANT_MIN_SWING_CP", d.brilliant_min_swing_cp),
            brilliant_winning_cp: env_or("BRILLIANT_WINNING_CP", d.brilliant_winning_cp),
            default_rating: env_or("DEFAULT_RATING", d.default_rating),
            rating_smoothing: env_or("RATING_SMOOTHING", d.rating_smoothing),
        };

        let replay = ReplayConfig {
            throttle: Duration::from_millis(env_or("REPLAY_THROTTLE_MS", 100)),
            autoplay_interval: Duration::from_millis(env_or("AUTOPLAY_INTERVAL_MS", 1000)),
        };

        let config = Self {
            evaluation,
            classifier,
            replay,
        };
        config.validate()?;

        info!(
            api_url = %config.evaluation.api_url,
            engine = config.evaluation.engine_path.as_deref().unwrap_or("-"),
            depth = config.evaluation.search_depth,
            delay_ms = config.evaluation.request_delay.as_millis() as u64,
            "Review config loaded"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.evaluation.search_depth == 0 {
            return Err(ReviewError::Config("EVAL_SEARCH_DEPTH must be positive"));
        }
        let alpha = self.classifier.rating_smoothing;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ReviewError::Config("RATING_SMOOTHING must be in (0, 1]"));
        }
        if self.replay.autoplay_interval.is_zero() {
            return Err(ReviewError::Config("AUTOPLAY_INTERVAL_MS must be positive"));
        }
        Ok(())
    }
}
