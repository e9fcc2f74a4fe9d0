//! Replay cursor over a reviewed game.
//!
//! The cursor runs from -1 (starting position) to N-1 (after the last ply).
//! Transitions are single-flight and throttled; every accepted transition
//! yields a fresh [`ReplayView`] built from the latest published snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chess_core::{captured_since, CapturedMaterial, PlyRecord, PositionCodec};
use shakmaty::Color;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::analysis::MoveAnalysis;
use crate::config::ReplayConfig;
use crate::evaluation::EvaluationSample;
use crate::session::ReviewSnapshot;

/// Why a transition was ignored. The cursor is unchanged in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavigationRejected {
    #[error("Target ply is outside the game")]
    OutOfRange,
    #[error("Another transition is still settling")]
    InFlight,
    #[error("Transition requested too soon after the previous one")]
    Throttled,
}

/// What the board, evaluation bar and move panel show for one cursor.
#[derive(Debug, Clone)]
pub struct ReplayView {
    pub cursor: i32,
    pub fen: String,
    pub last_move: Option<PlyRecord>,
    pub evaluation: Option<EvaluationSample>,
    pub captured: CapturedMaterial,
    pub analysis: Option<MoveAnalysis>,
    pub white_rating: f64,
    pub black_rating: f64,
    /// Review progress, 0-100
    pub progress: f64,
}

/// Where a transition goes. Relative steps are resolved against the cursor
/// only once the transition holds the navigating flag.
#[derive(Debug, Clone, Copy)]
enum Target {
    Index(i32),
    Step(i32),
    Last,
}

/// Whether a transition was requested by the user or by autoplay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Manual,
    Autoplay,
}

/// The game being replayed and the channel its review publishes on.
struct ReplaySource {
    codec: Arc<PositionCodec>,
    snapshots: watch::Receiver<Arc<ReviewSnapshot>>,
}

#[derive(Debug)]
struct CursorState {
    cursor: i32,
    last_accepted: Option<Instant>,
}

/// Clears the navigating flag when the transition ends.
struct NavigationGuard<'a>(&'a AtomicBool);

impl Drop for NavigationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReplayController {
    source: Mutex<ReplaySource>,
    config: ReplayConfig,
    state: Mutex<CursorState>,
    navigating: AtomicBool,
    autoplay: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayController {
    pub fn new(
        codec: Arc<PositionCodec>,
        snapshots: watch::Receiver<Arc<ReviewSnapshot>>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            source: Mutex::new(ReplaySource { codec, snapshots }),
            config,
            state: Mutex::new(CursorState {
                cursor: -1,
                last_accepted: None,
            }),
            navigating: AtomicBool::new(false),
            autoplay: Mutex::new(None),
        }
    }

    pub fn cursor(&self) -> i32 {
        self.lock_state().cursor
    }

    fn last_index(&self) -> i32 {
        self.lock_source().codec.len() as i32 - 1
    }

    /// Point the controller at another game. Autoplay stops and the cursor
    /// returns to the starting position.
    pub fn rebind(
        &self,
        codec: Arc<PositionCodec>,
        snapshots: watch::Receiver<Arc<ReviewSnapshot>>,
    ) {
        self.stop();
        *self.lock_source() = ReplaySource { codec, snapshots };
        *self.lock_state() = CursorState {
            cursor: -1,
            last_accepted: None,
        };
        debug!("Replay rebound to a new game");
    }

    /// View for the current cursor without moving it.
    pub fn view(&self) -> ReplayView {
        self.build_view(self.cursor())
    }

    /// Move the cursor to `target`. An accepted move stops autoplay; a
    /// rejected one leaves everything as it was.
    pub fn go_to(&self, target: i32) -> Result<ReplayView, NavigationRejected> {
        self.transition(Target::Index(target), Origin::Manual)
    }

    pub fn next(&self) -> Result<ReplayView, NavigationRejected> {
        self.transition(Target::Step(1), Origin::Manual)
    }

    pub fn prev(&self) -> Result<ReplayView, NavigationRejected> {
        self.transition(Target::Step(-1), Origin::Manual)
    }

    pub fn first(&self) -> Result<ReplayView, NavigationRejected> {
        self.transition(Target::Index(-1), Origin::Manual)
    }

    pub fn last(&self) -> Result<ReplayView, NavigationRejected> {
        self.transition(Target::Last, Origin::Manual)
    }

    /// Start advancing one ply per interval until the end of the game.
    /// Returns false when already at the last ply.
    pub fn play_through(self: &Arc<Self>) -> bool {
        self.stop();
        if self.cursor() >= self.last_index() {
            return false;
        }

        let period = self.config.autoplay_interval;
        let controller = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !advance(&controller) {
                    break;
                }
            }
            debug!("Autoplay finished");
        });

        *self.lock_autoplay() = Some(handle);
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock_autoplay().take() {
            handle.abort();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock_autoplay()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn transition(
        &self,
        target: Target,
        origin: Origin,
    ) -> Result<ReplayView, NavigationRejected> {
        if self
            .navigating
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(NavigationRejected::InFlight);
        }
        let _guard = NavigationGuard(&self.navigating);

        let last_index = self.last_index();
        let target = {
            let mut state = self.lock_state();
            let target = match target {
                Target::Index(index) => index,
                Target::Step(delta) => state.cursor + delta,
                Target::Last => last_index,
            };
            if target < -1 || target > last_index {
                return Err(NavigationRejected::OutOfRange);
            }
            if state.cursor == target {
                drop(state);
                return Ok(self.build_view(target));
            }

            let now = Instant::now();
            if let Some(last) = state.last_accepted {
                if now.duration_since(last) < self.config.throttle {
                    return Err(NavigationRejected::Throttled);
                }
            }
            state.cursor = target;
            state.last_accepted = Some(now);
            target
        };

        if origin == Origin::Manual {
            self.stop();
        }

        debug!(cursor = target, "Cursor moved");
        Ok(self.build_view(target))
    }

    fn build_view(&self, cursor: i32) -> ReplayView {
        let (codec, snapshot) = {
            let source = self.lock_source();
            let snapshot = Arc::clone(&source.snapshots.borrow());
            (Arc::clone(&source.codec), snapshot)
        };

        let position = codec.position_at(cursor).unwrap_or_else(|| codec.initial());
        let fen = codec.fen_at(cursor).unwrap_or_default();
        let captured = captured_since(codec.initial(), position);

        let ply = usize::try_from(cursor).ok();
        let last_move = ply.and_then(|p| codec.ply(p)).cloned();
        let analysis = ply.and_then(|p| snapshot.moves.get(p)).cloned();

        let series = snapshot.series.after_actual();
        let evaluation = series
            .get((cursor + 1) as usize)
            .or_else(|| series.first())
            .copied();

        ReplayView {
            cursor,
            fen,
            last_move,
            evaluation,
            captured,
            analysis,
            white_rating: rating_at(&snapshot, cursor, Color::White),
            black_rating: rating_at(&snapshot, cursor, Color::Black),
            progress: snapshot.progress_percent(),
        }
    }

    fn lock_source(&self) -> MutexGuard<'_, ReplaySource> {
        self.source.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_autoplay(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.autoplay.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ReplayController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One autoplay step. Returns whether to keep going.
fn advance(controller: &Weak<ReplayController>) -> bool {
    let Some(controller) = controller.upgrade() else {
        return false;
    };
    match controller.transition(Target::Step(1), Origin::Autoplay) {
        Ok(view) => view.cursor < controller.last_index(),
        Err(NavigationRejected::OutOfRange) => false,
        Err(_) => true,
    }
}

/// Running rating of `side` as of the cursor: the estimate after that
/// side's latest analysed move, or the starting value.
fn rating_at(snapshot: &ReviewSnapshot, cursor: i32, side: Color) -> f64 {
    snapshot
        .moves
        .iter()
        .take_while(|m| (m.ply as i32) <= cursor)
        .filter(|m| m.side() == side)
        .last()
        .map(|m| m.estimated_rating_after_move)
        .unwrap_or_else(|| snapshot.ratings.initial(side))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ReviewBuilder;
    use crate::config::ClassifierConfig;

    fn controller(line: &str) -> (ReplayController, watch::Sender<Arc<ReviewSnapshot>>) {
        let moves: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let codec = Arc::new(PositionCodec::new(None, &moves).unwrap());
        let builder = ReviewBuilder::new(Some(1900), None, ClassifierConfig::default());
        let (tx, rx) = watch::channel(Arc::new(ReviewSnapshot::idle(1, codec.len(), &builder)));
        (ReplayController::new(codec, rx, ReplayConfig::default()), tx)
    }

    #[test]
    fn test_transition_while_navigating_is_rejected() {
        let (replay, _tx) = controller("e4 e5");
        replay.navigating.store(true, Ordering::SeqCst);
        assert_eq!(replay.go_to(0).unwrap_err(), NavigationRejected::InFlight);
        assert_eq!(replay.cursor(), -1);

        replay.navigating.store(false, Ordering::SeqCst);
        assert_eq!(replay.go_to(0).unwrap().cursor, 0);
        assert!(!replay.navigating.load(Ordering::SeqCst));
    }

    #[test]
    fn test_view_before_any_evaluation() {
        let (replay, _tx) = controller("e4 d5 exd5");
        replay.go_to(2).unwrap();
        let view = replay.view();

        assert_eq!(view.cursor, 2);
        assert!(view.evaluation.is_none());
        assert!(view.analysis.is_none());
        assert_eq!(view.last_move.map(|m| m.san), Some("exd5".to_string()));
        assert_eq!(view.captured.by_white, vec![shakmaty::Role::Pawn]);
        assert_eq!(view.white_rating, 1900.0);
        assert_eq!(view.black_rating, 1500.0);
        assert_eq!(view.progress, 0.0);
    }

    #[test]
    fn test_concurrent_steps_never_share_a_base() {
        let moves: Vec<String> = "e4 e5 Nf3 Nc6 Bb5 a6 Ba4 Nf6 O-O Be7 Re1 b5 Bb3 d6"
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let codec = Arc::new(PositionCodec::new(None, &moves).unwrap());
        let builder = ReviewBuilder::new(None, None, ClassifierConfig::default());
        let (_tx, rx) = watch::channel(Arc::new(ReviewSnapshot::idle(1, codec.len(), &builder)));
        let config = ReplayConfig {
            throttle: std::time::Duration::ZERO,
            ..ReplayConfig::default()
        };
        let replay = Arc::new(ReplayController::new(codec, rx, config));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let replay = Arc::clone(&replay);
                std::thread::spawn(move || {
                    (0..40)
                        .filter_map(|_| replay.next().ok().map(|v| v.cursor))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut landed: Vec<i32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        landed.sort_unstable();

        let total = landed.len();
        landed.dedup();
        assert_eq!(landed.len(), total, "two steps landed on the same ply");
        assert_eq!(replay.cursor(), *landed.last().unwrap());
    }

    #[test]
    fn test_rebind_resets_cursor() {
        let (replay, _tx) = controller("e4 e5 Nf3");
        replay.go_to(2).unwrap();

        let moves = vec!["d4".to_string()];
        let codec = Arc::new(PositionCodec::new(None, &moves).unwrap());
        let builder = ReviewBuilder::new(None, None, ClassifierConfig::default());
        let (_tx2, rx) = watch::channel(Arc::new(ReviewSnapshot::idle(2, 1, &builder)));
        replay.rebind(Arc::clone(&codec), rx);

        assert_eq!(replay.cursor(), -1);
        assert_eq!(replay.go_to(1).unwrap_err(), NavigationRejected::OutOfRange);
        let view = replay.last().unwrap();
        assert_eq!(view.cursor, 0);
        assert_eq!(view.fen, codec.fen_at(0).unwrap());
        assert_eq!(view.white_rating, 1500.0);
    }

    #[test]
    fn test_out_of_range() {
        let (replay, _tx) = controller("e4");
        assert_eq!(replay.go_to(1).unwrap_err(), NavigationRejected::OutOfRange);
        assert_eq!(replay.go_to(-2).unwrap_err(), NavigationRejected::OutOfRange);
        assert_eq!(replay.prev().unwrap_err(), NavigationRejected::OutOfRange);
        assert_eq!(replay.cursor(), -1);
    }
}
