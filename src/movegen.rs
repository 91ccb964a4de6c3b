use lazy_static::lazy_static;

use crate::board::{Board, Move, Piece, Rank, Side, Square, BLOCK_CELLS};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::NorthWest,
        Direction::NorthEast,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    /// (row, column) delta; north is toward row 0.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::NorthWest => (-1, -1),
            Direction::NorthEast => (-1, 1),
            Direction::SouthWest => (1, -1),
            Direction::SouthEast => (1, 1),
        }
    }
}

const LIGHT_FORWARD: [Direction; 2] = [Direction::NorthWest, Direction::NorthEast];
const DARK_FORWARD: [Direction; 2] = [Direction::SouthWest, Direction::SouthEast];

pub fn directions(piece: Piece) -> &'static [Direction] {
    match (piece.rank, piece.side) {
        (Rank::King, _) => &Direction::ALL,
        (Rank::Man, Side::Light) => &LIGHT_FORWARD,
        (Rank::Man, Side::Dark) => &DARK_FORWARD,
    }
}

/// Neighbouring cell in one direction, and the landing cell of a jump over it.
#[derive(Copy, Clone, Debug)]
struct Ray {
    step: Square,
    jump: Option<Square>,
}

lazy_static! {
    static ref RAYS: Vec<[Option<Ray>; 4]> = (0..BLOCK_CELLS).map(|index| {
        let square = Square::from_index(index);
        Direction::ALL.map(|direction| {
            let (d_row, d_col) = direction.delta();
            square.offset(d_row, d_col).map(|step| Ray { step, jump: step.offset(d_row, d_col) })
        })
    }).collect();
}

fn ray(square: Square, direction: Direction) -> Option<Ray> {
    RAYS[square.index()][direction as usize]
}

fn push_piece_moves(board: &Board, from: Square, piece: Piece, captures_only: bool, moves: &mut Vec<Move>) {
    for &direction in directions(piece) {
        let Some(Ray { step, jump }) = ray(from, direction) else { continue };
        match board.piece_at(step) {
            None if !captures_only => moves.push(Move::step(from, step)),
            Some(victim) if victim.side != piece.side => {
                if let Some(landing) = jump.filter(|landing| board.is_empty(*landing)) {
                    moves.push(Move::capture(from, step, landing));
                }
            }
            _ => {}
        }
    }
}

/// Every single step and capture for `side`, before the mandatory capture filter.
pub fn generate_moves(board: &Board, side: Side) -> Vec<Move> {
    let mut moves = Vec::new();
    for (square, piece) in board.pieces(side) {
        push_piece_moves(board, square, piece, false, &mut moves);
    }
    moves
}

pub fn has_capture(moves: &[Move]) -> bool {
    moves.iter().any(Move::is_capture)
}

/// Drops the single steps when at least one capture is on offer.
pub fn filter_captures(moves: Vec<Move>) -> Vec<Move> {
    if has_capture(&moves) {
        moves.into_iter().filter(Move::is_capture).collect()
    } else {
        moves
    }
}

pub fn legal_moves(board: &Board, side: Side) -> Vec<Move> {
    filter_captures(generate_moves(board, side))
}

/// Captures available to the piece standing on `square`.
pub fn captures_from(board: &Board, square: Square) -> Vec<Move> {
    let mut moves = Vec::new();
    if let Some(piece) = board.piece_at(square) {
        push_piece_moves(board, square, piece, true, &mut moves);
    }
    moves
}

impl Board {
    /// Legal moves for the side to move; nothing once the game is decided.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.result().is_decided() {
            return Vec::new();
        }
        self.legal_moves_for(self.side_to_move())
    }

    /// Legal moves for `side`, restricted to the capturing piece's follow-up jumps while
    /// `side` is in the middle of a capture chain.
    pub fn legal_moves_for(&self, side: Side) -> Vec<Move> {
        match self.continuing_capture() {
            Some(square) if side == self.side_to_move() => captures_from(self, square),
            _ => legal_moves(self, side),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{GameResult, CELLS_PER_ROW};

    fn board(diagram: &str, side_to_move: Side) -> Board {
        Board::from_diagram(diagram, side_to_move).unwrap()
    }

    #[test]
    fn rays_start_from_their_own_square() {
        for row in 0..CELLS_PER_ROW {
            for col in 0..CELLS_PER_ROW {
                let square = Square::new(row, col);
                for direction in Direction::ALL {
                    let (d_row, d_col) = direction.delta();
                    let expected = square.offset(d_row, d_col);
                    assert_eq!(ray(square, direction).map(|ray| ray.step), expected, "{} {:?}", square, direction);
                }
            }
        }
        let corner = ray(Square::new(7, 0), Direction::NorthEast).unwrap();
        assert_eq!((corner.step, corner.jump), (Square::new(6, 1), Some(Square::new(5, 2))));
        assert!(ray(Square::new(7, 0), Direction::SouthEast).is_none());
    }

    #[test]
    fn opening_moves_for_light() {
        let moves = legal_moves(&Board::new(), Side::Light);
        assert_eq!(moves.len(), 7);
        assert!(moves.iter().all(|m| !m.is_capture() && m.from.row() == 5 && m.to.row() == 4));
        assert!(moves.contains(&Move::step(Square::new(5, 0), Square::new(4, 1))));
    }

    #[test]
    fn opening_moves_for_dark() {
        let moves = legal_moves(&Board::new(), Side::Dark);
        assert_eq!(moves.len(), 7);
        assert!(moves.iter().all(|m| m.from.row() == 2 && m.to.row() == 3));
    }

    #[test]
    fn destinations_stay_on_board_and_empty() {
        let positions = [
            Board::new(),
            board("
                .X.....x
                ........
                .....x..
                ..o.O...
                .x......
                ......o.
                .x......
                O.......
            ", Side::Light),
        ];
        for position in &positions {
            for side in [Side::Light, Side::Dark] {
                for move_ in generate_moves(position, side) {
                    assert!(position.is_empty(move_.to), "{} lands on an occupied cell", move_);
                    assert_eq!(position.piece_at(move_.from).map(|p| p.side), Some(side));
                    let row_delta = move_.to.row() as i32 - move_.from.row() as i32;
                    let col_delta = move_.to.col() as i32 - move_.from.col() as i32;
                    assert_eq!(row_delta.abs(), col_delta.abs());
                    assert_eq!(row_delta.abs(), if move_.is_capture() { 2 } else { 1 });
                }
            }
        }
    }

    #[test]
    fn capture_is_mandatory_side_wide() {
        let position = board("
            ........
            ........
            ..x.....
            ...o....
            ........
            ........
            .....o..
            ........
        ", Side::Light);
        let all = generate_moves(&position, Side::Light);
        assert!(all.iter().any(|m| !m.is_capture()));
        let legal = legal_moves(&position, Side::Light);
        assert_eq!(legal, vec![Move::capture(Square::new(3, 3), Square::new(2, 2), Square::new(1, 1))]);
    }

    #[test]
    fn men_only_move_forward_kings_move_both_ways() {
        let position = board("
            ........
            ........
            ........
            ...o....
            ........
            ........
            ........
            .......X
        ", Side::Light);
        let man: Vec<Move> = generate_moves(&position, Side::Light);
        assert_eq!(man.len(), 2);
        assert!(man.iter().all(|m| m.to.row() == 2));

        let king = generate_moves(&position, Side::Dark);
        assert_eq!(king, vec![Move::step(Square::new(7, 7), Square::new(6, 6))]);
    }

    #[test]
    fn blocked_jumps_are_not_generated() {
        let position = board("
            ........
            .x......
            ..x.....
            ...o....
            ........
            ........
            ........
            ........
        ", Side::Light);
        let moves = legal_moves(&position, Side::Light);
        assert_eq!(moves, vec![Move::step(Square::new(3, 3), Square::new(2, 4))]);
    }

    #[test]
    fn jump_past_edge_is_not_generated() {
        let position = board("
            ........
            x.......
            .o......
            ........
            ........
            ........
            ........
            ........
        ", Side::Light);
        assert_eq!(legal_moves(&position, Side::Light), vec![Move::step(Square::new(2, 1), Square::new(1, 2))]);
    }

    #[test]
    fn kings_capture_backwards() {
        let position = board("
            ........
            ........
            ........
            ........
            ...O....
            ..x.....
            ........
            ........
        ", Side::Light);
        let moves = legal_moves(&position, Side::Light);
        assert_eq!(moves, vec![Move::capture(Square::new(4, 3), Square::new(5, 2), Square::new(6, 1))]);
    }

    #[test]
    fn no_pieces_means_no_moves() {
        let position = board("
            ........
            ........
            ........
            ........
            ........
            ........
            ......o.
            ........
        ", Side::Dark);
        assert!(generate_moves(&position, Side::Dark).is_empty());
        assert!(position.legal_moves().is_empty());
    }

    #[test]
    fn immobilized_side_has_no_moves() {
        let stuck = board("
            ........
            ........
            ........
            ........
            ..x.....
            .x......
            o.......
            ........
        ", Side::Light);
        assert!(legal_moves(&stuck, Side::Light).is_empty());
    }

    #[test]
    fn continuing_piece_restricts_legal_moves() {
        let mut position = board("
            ........
            ........
            ...x.x..
            ....o...
            ........
            ..x.....
            .o......
            ........
        ", Side::Light);
        assert_eq!(legal_moves(&position, Side::Light).len(), 3);
        position.set_continuing_capture(Some(Square::new(3, 4)));
        let moves = position.legal_moves();
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(|m| m.from == Square::new(3, 4) && m.is_capture()));
        // the other side is not bound by light's chain
        assert_eq!(position.legal_moves_for(Side::Dark), legal_moves(&position, Side::Dark));
    }

    #[test]
    fn decided_board_offers_nothing() {
        let mut position = Board::new();
        position.set_result(GameResult::Winner(Side::Dark));
        assert!(position.legal_moves().is_empty());
    }
}
