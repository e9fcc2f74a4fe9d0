mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{codec, fast_config, game, ScriptedEvaluator, RUY_LOPEZ};
use game_review::replay::NavigationRejected;
use game_review::ReviewSession;

async fn finished_session(
    line: &str,
    evaluator: ScriptedEvaluator,
) -> ReviewSession<ScriptedEvaluator> {
    let session = ReviewSession::start(game(line), Arc::new(evaluator), fast_config()).unwrap();
    session.wait_until_finished().await;
    session
}

#[tokio::test(start_paused = true)]
async fn test_second_next_within_throttle_window_is_ignored() {
    let session = finished_session(RUY_LOPEZ, ScriptedEvaluator::new()).await;
    let replay = session.replay();

    assert_eq!(replay.next().unwrap().cursor, 0);
    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(replay.next().unwrap_err(), NavigationRejected::Throttled);
    assert_eq!(replay.cursor(), 0);

    tokio::time::advance(Duration::from_millis(60)).await;
    assert_eq!(replay.next().unwrap().cursor, 1);
}

#[tokio::test(start_paused = true)]
async fn test_go_to_current_index_is_idempotent() {
    let session = finished_session(RUY_LOPEZ, ScriptedEvaluator::new()).await;
    let replay = session.replay();

    let first = replay.go_to(5).unwrap();
    let again = replay.go_to(5).unwrap();
    let third = replay.go_to(5).unwrap();
    assert_eq!(first.cursor, again.cursor);
    assert_eq!(first.fen, again.fen);
    assert_eq!(again.fen, third.fen);
    assert_eq!(first.evaluation, third.evaluation);
    assert_eq!(replay.cursor(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_view_tracks_cursor() {
    let codec = codec(RUY_LOPEZ);
    let mut evaluator = ScriptedEvaluator::new();
    for i in -1..codec.len() as i32 {
        evaluator = evaluator.with_score(codec.fen_at(i).unwrap(), f64::from(i * 5));
    }
    let session = finished_session(RUY_LOPEZ, evaluator).await;
    let replay = session.replay();

    let start = replay.view();
    assert_eq!(start.cursor, -1);
    assert_eq!(start.fen, codec.fen_at(-1).unwrap());
    assert!(start.last_move.is_none());
    assert!(start.analysis.is_none());
    assert_eq!(start.evaluation.map(|e| e.score_centipawns), Some(-5.0));
    assert_eq!(start.progress, 100.0);

    let view = replay.last().unwrap();
    assert_eq!(view.cursor, 13);
    assert_eq!(view.fen, codec.fen_at(13).unwrap());
    assert_eq!(view.last_move.as_ref().map(|m| m.san.as_str()), Some("d6"));
    assert_eq!(view.evaluation.map(|e| e.score_centipawns), Some(65.0));
    let analysis = view.analysis.unwrap();
    assert_eq!(analysis.ply, 13);
    assert_eq!(view.black_rating, analysis.estimated_rating_after_move);

    tokio::time::advance(Duration::from_millis(100)).await;
    let back = replay.first().unwrap();
    assert_eq!(back.cursor, -1);
    assert_eq!(back.white_rating, 1500.0);
}

#[tokio::test(start_paused = true)]
async fn test_view_while_review_in_progress() {
    let evaluator = ScriptedEvaluator::new().with_latency(Duration::from_millis(400));
    let session =
        ReviewSession::start(game(RUY_LOPEZ), Arc::new(evaluator), fast_config()).unwrap();
    let replay = session.replay();

    // Start position plus a couple of plies
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let snapshot = session.snapshot();
    assert!(snapshot.completed_plies < 14);

    let view = replay.last().unwrap();
    assert!(view.analysis.is_none());
    // Falls back to the starting evaluation
    assert_eq!(view.evaluation, snapshot.series.after_actual().first().copied());
    assert!(view.progress < 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_play_through_stops_at_last_ply() {
    let session = finished_session("e4 e5 Nf3 Nc6", ScriptedEvaluator::new()).await;
    let replay = session.replay();

    assert!(replay.play_through());
    assert!(replay.is_playing());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(replay.cursor(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(replay.cursor(), 3);
    assert!(!replay.is_playing());

    // Nothing left to play
    assert!(!replay.play_through());
}

#[tokio::test(start_paused = true)]
async fn test_manual_navigation_stops_autoplay() {
    let session = finished_session(RUY_LOPEZ, ScriptedEvaluator::new()).await;
    let replay = session.replay();

    assert!(replay.play_through());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(replay.cursor(), 1);

    assert_eq!(replay.prev().unwrap().cursor, 0);
    assert!(!replay.is_playing());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(replay.cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_navigation_keeps_autoplay_running() {
    let session = finished_session(RUY_LOPEZ, ScriptedEvaluator::new()).await;
    let replay = session.replay();

    assert!(replay.play_through());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(replay.cursor(), 0);

    assert_eq!(replay.go_to(99).unwrap_err(), NavigationRejected::OutOfRange);
    assert!(replay.is_playing());
    // Same index is a no-op, not a manual move
    assert_eq!(replay.go_to(0).unwrap().cursor, 0);
    assert!(replay.is_playing());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(replay.cursor(), 3);
    assert!(replay.is_playing());
}
