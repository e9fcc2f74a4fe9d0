//! Move list → position stream.
//!
//! The codec replays a game once and keeps every intermediate position, so
//! any cursor index can be served without replaying again.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position, Role, Square};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid starting FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("Invalid move sequence at ply {ply} ({san}): {reason}")]
    InvalidMoveSequence {
        ply: usize,
        san: String,
        reason: String,
    },

    #[error("Invalid UCI move '{uci}': {reason}")]
    InvalidUci { uci: String, reason: String },
}

/// One half-move of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyRecord {
    pub index: usize,
    pub side: Color,
    pub san: String,
    pub uci: String,
    pub from: Option<Square>,
    pub to: Square,
    pub promotion: Option<Role>,
    pub move_number: u32,
}

#[derive(Debug, Clone)]
pub struct PositionCodec {
    /// positions[0] is the start, positions[i + 1] follows ply i
    positions: Vec<Chess>,
    plies: Vec<PlyRecord>,
}

impl PositionCodec {
    /// Replay `san_moves` from `start_fen` (standard start when None).
    pub fn new(start_fen: Option<&str>, san_moves: &[String]) -> Result<Self, CodecError> {
        let start = match start_fen {
            Some(fen) => parse_fen(fen)?,
            None => Chess::default(),
        };

        let first_move_number = start.fullmoves().get();
        let black_first = start.turn() == Color::Black;

        let mut positions = Vec::with_capacity(san_moves.len() + 1);
        let mut plies = Vec::with_capacity(san_moves.len());
        let mut pos = start.clone();
        positions.push(start);

        for (index, san_str) in san_moves.iter().enumerate() {
            let invalid = |reason: String| CodecError::InvalidMoveSequence {
                ply: index,
                san: san_str.clone(),
                reason,
            };

            let san: SanPlus = san_str
                .trim()
                .parse()
                .map_err(|e| invalid(format!("unparsable SAN: {e}")))?;
            let mv = san
                .san
                .to_move(&pos)
                .map_err(|e| invalid(format!("illegal move: {e}")))?;

            let side = pos.turn();
            let ply_offset = index as u32 + u32::from(black_first);
            let uci = mv.to_uci(CastlingMode::Standard).to_string();
            // Normalised SAN with check/mate suffix
            let san = SanPlus::from_move_and_play_unchecked(&mut pos, mv.clone());
            plies.push(PlyRecord {
                index,
                side,
                san: san.to_string(),
                uci,
                from: mv.from(),
                to: mv.to(),
                promotion: mv.promotion(),
                move_number: first_move_number + ply_offset / 2,
            });
            positions.push(pos.clone());
        }

        Ok(Self { positions, plies })
    }

    /// Number of plies (N).
    pub fn len(&self) -> usize {
        self.plies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }

    pub fn initial(&self) -> &Chess {
        &self.positions[0]
    }

    /// Position after ply `index`; `-1` is the starting position.
    pub fn position_at(&self, index: i32) -> Option<&Chess> {
        if index < -1 {
            return None;
        }
        self.positions.get((index + 1) as usize)
    }

    /// Position before ply `ply` was played.
    pub fn position_before(&self, ply: usize) -> Option<&Chess> {
        self.positions.get(ply)
    }

    /// Position after ply `ply` was played.
    pub fn position_after(&self, ply: usize) -> Option<&Chess> {
        self.positions.get(ply + 1)
    }

    pub fn fen_at(&self, index: i32) -> Option<String> {
        self.position_at(index).map(to_fen)
    }

    pub fn ply(&self, index: usize) -> Option<&PlyRecord> {
        self.plies.get(index)
    }

    pub fn plies(&self) -> &[PlyRecord] {
        &self.plies
    }

    pub fn start_fen(&self) -> String {
        to_fen(self.initial())
    }

    /// True when the game starts from the standard position.
    pub fn is_standard_start(&self) -> bool {
        self.start_fen() == crate::pgn::STANDARD_START_FEN
    }
}

pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn parse_fen(fen: &str) -> Result<Chess, CodecError> {
    let invalid = |reason: String| CodecError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{e}")))
}

/// Apply an engine move given in UCI notation to `pos`.
pub fn apply_uci(pos: &Chess, uci: &str) -> Result<Chess, CodecError> {
    let invalid = |reason: String| CodecError::InvalidUci {
        uci: uci.to_string(),
        reason,
    };
    let uci_move: UciMove = uci.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    let mv = uci_move
        .to_move(pos)
        .map_err(|e| invalid(format!("{e}")))?;
    let mut next = pos.clone();
    next.play_unchecked(mv);
    Ok(next)
}
