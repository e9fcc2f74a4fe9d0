//! Game review CLI
//!
//! Evaluates every ply of a game through the evaluation service (or a local
//! UCI engine), prints the move-quality table and per-side summary, and
//! optionally writes an annotated PGN.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use chess_core::pgn::parse_pgn;
use chess_core::GameSource;
use tracing::{info, warn};

use game_review::evaluation::{HttpEvaluator, PositionEvaluator};
use game_review::stockfish::UciEvaluator;
use game_review::{ReviewConfig, ReviewSession, ReviewSnapshot};

const USAGE: &str = "usage: game-review (--pgn <file> | --moves \"e4 e5 ...\") \
[--out <file>] [--engine <path>] [--depth <n>] [--json] [--replay]";

/// Value following `flag` on the command line
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn load_game(args: &[String]) -> anyhow::Result<GameSource> {
    if let Some(path) = arg_value(args, "--pgn") {
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        return parse_pgn(&text).ok_or_else(|| anyhow!("{path} contains no moves"));
    }
    if let Some(line) = arg_value(args, "--moves") {
        return Ok(GameSource::from_san_line(&line));
    }
    Err(anyhow!(USAGE))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let game = load_game(&args)?;

    let mut config = ReviewConfig::from_env()?;
    if let Some(depth) = arg_value(&args, "--depth") {
        config.evaluation.search_depth = depth.parse().context("--depth must be a number")?;
    }
    if let Some(engine) = arg_value(&args, "--engine") {
        config.evaluation.engine_path = Some(engine);
    }
    config.validate()?;

    match config.evaluation.engine_path.clone() {
        Some(path) => {
            let engine = Arc::new(UciEvaluator::spawn(&path).await?);
            info!(path = %path, "Using local engine");
            let result = run(game, Arc::clone(&engine), config, &args).await;
            engine.shutdown().await;
            result
        }
        None => {
            let client = Arc::new(HttpEvaluator::new(&config.evaluation)?);
            info!(api_url = %config.evaluation.api_url, "Using evaluation service");
            run(game, client, config, &args).await
        }
    }
}

async fn run<E>(
    game: GameSource,
    evaluator: Arc<E>,
    config: ReviewConfig,
    args: &[String],
) -> anyhow::Result<()>
where
    E: PositionEvaluator + 'static,
{
    info!(
        white = %game.white.username,
        black = %game.black.username,
        plies = game.moves.len(),
        "Starting review"
    );
    let session = ReviewSession::start(game, evaluator, config)?;

    let mut updates = session.subscribe();
    let mut last_logged = 0;
    while updates.changed().await.is_ok() {
        let snapshot = Arc::clone(&updates.borrow_and_update());
        if snapshot.completed_plies >= last_logged + 10 {
            last_logged = snapshot.completed_plies;
            info!(
                completed = snapshot.completed_plies,
                total = snapshot.total_plies,
                "Review progress"
            );
        }
        if snapshot.state.is_finished() {
            break;
        }
    }

    let snapshot = session.wait_until_finished().await;
    if !snapshot.is_complete() {
        warn!(state = ?snapshot.state, "Review did not complete");
    }

    if has_flag(args, "--json") {
        println!("{}", snapshot.to_json()?);
    } else {
        print_report(&snapshot);
    }

    if let Some(out) = arg_value(args, "--out") {
        session
            .save_annotated_game(&out)
            .with_context(|| format!("writing {out}"))?;
        info!(path = %out, "Annotated game written");
    }

    if has_flag(args, "--replay") {
        let replay = session.replay();
        let interval = session.config().replay.autoplay_interval;
        if replay.play_through() {
            while replay.is_playing() {
                tokio::time::sleep(interval).await;
                let view = replay.view();
                info!(
                    cursor = view.cursor,
                    last_move = view.last_move.as_ref().map(|m| m.san.as_str()).unwrap_or("-"),
                    eval = %view.evaluation.map(|e| e.display()).unwrap_or_default(),
                    white_rating = view.white_rating.round(),
                    black_rating = view.black_rating.round(),
                    "Replay"
                );
            }
        }
    }

    Ok(())
}

fn print_report(snapshot: &ReviewSnapshot) {
    println!(
        "{:>4}  {:<8} {:<8} {:>7} {:>7} {:>6}  {:<11} {:>6}",
        "#", "move", "best", "eval", "best", "cpl", "quality", "rating"
    );
    for m in &snapshot.moves {
        let number = if m.is_white {
            format!("{}.", m.move_number)
        } else {
            format!("{}...", m.move_number)
        };
        println!(
            "{:>4}  {:<8} {:<8} {:>+7.2} {:>+7.2} {:>6.0}  {:<11} {:>6.0}",
            number,
            m.san,
            m.best_move.as_deref().unwrap_or("-"),
            m.eval_after / 100.0,
            m.best_eval / 100.0,
            m.cpl,
            m.quality.as_str(),
            m.estimated_rating_after_move,
        );
    }

    println!();
    for (name, side) in [("White", &snapshot.white), ("Black", &snapshot.black)] {
        println!(
            "{name}: accuracy {:.1}%, avg cpl {:.1}, est. rating {:.0}, \
             {} brilliant / {} best / {} inaccuracies / {} mistakes / {} blunders",
            side.accuracy,
            side.avg_cpl,
            side.final_rating,
            side.counts.brilliant,
            side.counts.best,
            side.counts.inaccuracy,
            side.counts.mistake,
            side.counts.blunder,
        );
    }
}
