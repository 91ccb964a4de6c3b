use thiserror::Error;

use crate::board::{Move, Side};
use crate::wire::WireError;

#[derive(Debug, Error)]
pub enum CheckersError {
    #[error("illegal move {0}")]
    IllegalMove(Move),
    #[error("it is not {0}'s turn")]
    OutOfTurn(Side),
    #[error("invalid board: {0}")]
    InvalidBoard(String),
    #[error("malformed move record: {0}")]
    Wire(#[from] WireError),
    #[error("peer connection failed: {0}")]
    Connectivity(#[source] std::io::Error),
    #[error("peer closed the connection")]
    Disconnected,
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckersError>;
