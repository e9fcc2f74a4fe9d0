use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub username: String,
    pub rating: Option<u32>,
}

impl PlayerInfo {
    pub fn new(username: impl Into<String>, rating: Option<u32>) -> Self {
        Self {
            username: username.into(),
            rating,
        }
    }
}

/// A finished game as handed over by the game source. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSource {
    pub moves: Vec<String>, // SAN notation
    pub starting_fen: Option<String>,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub event: Option<String>,
}

impl GameSource {
    /// Game from the standard starting position with unknown players.
    pub fn from_moves(moves: Vec<String>) -> Self {
        Self {
            moves,
            starting_fen: None,
            white: PlayerInfo::new("White", None),
            black: PlayerInfo::new("Black", None),
            result: "*".to_string(),
            date: None,
            event: None,
        }
    }

    /// Split a whitespace-separated SAN list ("e4 e5 Nf3 Nc6").
    pub fn from_san_line(line: &str) -> Self {
        Self::from_moves(line.split_whitespace().map(str::to_string).collect())
    }
}
