pub mod game_data;
pub mod material;
pub mod pgn;
pub mod position;

pub use game_data::{GameSource, PlayerInfo};
pub use material::{captured_since, CapturedMaterial};
pub use position::{CodecError, PlyRecord, PositionCodec};
