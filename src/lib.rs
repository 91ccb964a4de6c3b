pub mod board;
pub mod engine;
pub mod error;
pub mod game;
pub mod movegen;
pub mod net;
pub mod wire;

pub use board::{Board, GameResult, Move, Piece, Rank, Side, Square};
pub use engine::Engine;
pub use error::CheckersError;
pub use game::{ClickOutcome, Difficulty, Game, TurnState};
