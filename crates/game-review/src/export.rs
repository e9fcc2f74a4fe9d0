//! Annotated PGN export

use chess_core::pgn::{write_pgn, AnnotatedMove};
use chess_core::{GameSource, PositionCodec};
use shakmaty::{Color, Position};

use crate::analysis::MoveAnalysis;

const ANNOTATOR: &str = "game-review";

fn comment_for(analysis: &MoveAnalysis) -> String {
    format!(
        "{}, cpl {:.0}, est. rating {:.0}",
        analysis.quality, analysis.cpl, analysis.estimated_rating_after_move
    )
}

fn headers_for(game: &GameSource, codec: &PositionCodec) -> Vec<(String, String)> {
    let date = game
        .date
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%Y.%m.%d").to_string());

    let mut headers: Vec<(String, String)> = vec![
        ("Event".into(), game.event.clone().unwrap_or_else(|| "Game review".into())),
        ("Site".into(), "?".into()),
        ("Date".into(), date),
        ("Round".into(), "?".into()),
        ("White".into(), game.white.username.clone()),
        ("Black".into(), game.black.username.clone()),
        ("Result".into(), game.result.clone()),
    ];
    if let Some(elo) = game.white.rating {
        headers.push(("WhiteElo".into(), elo.to_string()));
    }
    if let Some(elo) = game.black.rating {
        headers.push(("BlackElo".into(), elo.to_string()));
    }
    if !codec.is_standard_start() {
        headers.push(("SetUp".into(), "1".into()));
        headers.push(("FEN".into(), codec.start_fen()));
    }
    headers.push(("Annotator".into(), ANNOTATOR.into()));
    headers
}

/// Render the game as PGN with a NAG and a comment on every analysed move.
/// Plies without analysis yet are written bare.
pub fn annotate_game(
    game: &GameSource,
    codec: &PositionCodec,
    analyses: &[MoveAnalysis],
) -> String {
    let moves: Vec<AnnotatedMove> = codec
        .plies()
        .iter()
        .map(|ply| match analyses.get(ply.index) {
            Some(a) => AnnotatedMove {
                san: ply.san.clone(),
                nag: a.quality.nag(),
                comment: Some(comment_for(a)),
            },
            None => AnnotatedMove {
                san: ply.san.clone(),
                ..Default::default()
            },
        })
        .collect();

    let initial = codec.initial();
    write_pgn(
        &headers_for(game, codec),
        &moves,
        initial.fullmoves().get(),
        initial.turn() == Color::Black,
        &game.result,
    )
}
