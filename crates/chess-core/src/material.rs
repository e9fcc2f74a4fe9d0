//! Captured-material snapshot between two positions.

use shakmaty::{Board, Chess, Color, Piece, Position, Role};

/// Roles that can be captured, in display order.
const CAPTURABLE: [Role; 5] = [Role::Queen, Role::Rook, Role::Bishop, Role::Knight, Role::Pawn];

pub fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedMaterial {
    /// Black pieces taken by White
    pub by_white: Vec<Role>,
    /// White pieces taken by Black
    pub by_black: Vec<Role>,
}

impl CapturedMaterial {
    pub fn captured_by(&self, color: Color) -> &[Role] {
        match color {
            Color::White => &self.by_white,
            Color::Black => &self.by_black,
        }
    }

    /// Material won by White minus material won by Black, in pawns.
    pub fn material_balance(&self) -> i32 {
        let sum = |roles: &[Role]| roles.iter().map(|r| piece_value(*r)).sum::<i32>();
        sum(&self.by_white) - sum(&self.by_black)
    }
}

fn count(board: &Board, color: Color, role: Role) -> usize {
    board.by_piece(Piece { color, role }).count()
}

/// Pieces missing from `current` relative to `initial`, credited to the
/// opposite colour. Promotions show up as a captured pawn.
pub fn captured_since(initial: &Chess, current: &Chess) -> CapturedMaterial {
    let mut captured = CapturedMaterial::default();

    for color in [Color::White, Color::Black] {
        for role in CAPTURABLE {
            let missing = count(initial.board(), color, role)
                .saturating_sub(count(current.board(), color, role));
            let bucket = match color {
                Color::White => &mut captured.by_black,
                Color::Black => &mut captured.by_white,
            };
            bucket.extend(std::iter::repeat(role).take(missing));
        }
    }

    captured
}
