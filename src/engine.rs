use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::{Board, Move, Rank, Side};

pub const KING_VALUE: i32 = 10;
/// Beyond any material total either side can reach.
pub const WIN_SCORE: i32 = 1_000;
pub const DEFAULT_DEPTH: u32 = 3;

/// Static score of `board`, positive when dark (the computer) is ahead. A king is worth
/// a flat `KING_VALUE`; a man is worth the rows it has advanced from its own back row.
pub fn evaluate(board: &Board) -> i32 {
    let total = |side: Side| -> i32 {
        board.pieces(side).map(|(square, piece)| match piece.rank {
            Rank::King => KING_VALUE,
            Rank::Man => side.rows_travelled(square.row()) as i32,
        }).sum()
    };
    total(Side::Dark) - total(Side::Light)
}

fn is_maximizing(side: Side) -> bool {
    side == Side::COMPUTER
}

/// Score for a node where `side` has nothing left to play. Losing sooner is worse.
fn lost_score(side: Side, depth: u32) -> i32 {
    let score = WIN_SCORE + depth as i32;
    if is_maximizing(side) { -score } else { score }
}

/// Full-width minimax over `depth` plies with `side` to move. Dark maximizes, light
/// minimizes. Every child is searched on its own copy of the board.
pub fn minimax(board: &Board, depth: u32, side: Side) -> i32 {
    if depth == 0 {
        return evaluate(board);
    }
    let moves = board.legal_moves_for(side);
    if moves.is_empty() {
        return lost_score(side, depth);
    }

    let scores = moves.iter()
        .map(|move_| minimax(&board.successor(move_, side), depth - 1, side.opposite()));
    if is_maximizing(side) {
        scores.fold(i32::MIN, i32::max)
    } else {
        scores.fold(i32::MAX, i32::min)
    }
}

pub struct Engine {
    depth: u32,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl Engine {
    /// Depth is counted in plies and never below one.
    pub fn new(depth: u32) -> Self {
        Self {
            depth: depth.max(1),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn eval(&self, board: &Board) -> i32 {
        evaluate(board)
    }

    /// Picks the first legal move for `side` whose subtree reproduces the minimax value
    /// of the whole position.
    pub fn best_move(&self, board: &Board, side: Side) -> Option<Move> {
        let moves = board.legal_moves_for(side);
        let fallback = *moves.first()?;
        let target = minimax(board, self.depth, side);

        for move_ in &moves {
            let score = minimax(&board.successor(move_, side), self.depth - 1, side.opposite());
            if score == target {
                debug!("{} picks {} (score {}, depth {})", side, move_, score, self.depth);
                return Some(*move_);
            }
        }

        warn!("no root move of {} reproduces search value {}; falling back to {}", side, target, fallback);
        Some(fallback)
    }
}

/// Uniform choice among the legal moves for `side`.
pub fn random_move<R: Rng + ?Sized>(board: &Board, side: Side, rng: &mut R) -> Option<Move> {
    board.legal_moves_for(side).choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Square;
    use rand::{rngs::StdRng, SeedableRng};

    fn board(diagram: &str, side_to_move: Side) -> Board {
        Board::from_diagram(diagram, side_to_move).unwrap()
    }

    #[test]
    fn opening_position_is_balanced() {
        assert_eq!(evaluate(&Board::new()), 0);
    }

    #[test]
    fn kings_are_flat_men_count_progress() {
        let position = board("
            ........
            ........
            ........
            ..x.....
            ........
            .o......
            ........
            O.......
        ", Side::Light);
        // dark man on row 3 has travelled 3, light man on row 5 travelled 2, light king 10
        assert_eq!(evaluate(&position), 3 - (2 + KING_VALUE));
    }

    #[test]
    fn depth_zero_is_the_static_evaluation() {
        let positions = [
            Board::new(),
            board("
                ........
                ........
                ..x.....
                ...o....
                ........
                ........
                .....o..
                ........
            ", Side::Light),
        ];
        for position in &positions {
            for side in [Side::Light, Side::Dark] {
                assert_eq!(minimax(position, 0, side), evaluate(position));
            }
        }
    }

    #[test]
    fn one_ply_picks_the_best_child_for_each_side() {
        let position = Board::new();
        for side in [Side::Light, Side::Dark] {
            let children = position.legal_moves_for(side).into_iter()
                .map(|move_| evaluate(&position.successor(&move_, side)));
            let expected = if side == Side::Dark { children.max() } else { children.min() };
            assert_eq!(Some(minimax(&position, 1, side)), expected);
        }
    }

    #[test]
    fn side_without_moves_loses_in_search() {
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
        assert_eq!(minimax(&position, 2, Side::Dark), -(WIN_SCORE + 2));
        assert!(minimax(&position, 1, Side::Light) <= 0);
    }

    #[test]
    fn engine_takes_a_free_piece() {
        let position = board("
            ........
            ........
            ........
            ...x....
            ....o...
            ........
            ........
            ........
        ", Side::Dark);
        let engine = Engine::new(3);
        let best = engine.best_move(&position, Side::Dark);
        assert_eq!(best, Some(Move::capture(Square::new(3, 3), Square::new(4, 4), Square::new(5, 5))));
    }

    #[test]
    fn engine_avoids_handing_over_a_piece() {
        // stepping to (3,4) lets light jump it; stepping to (3,2) is safe
        let position = board("
            ........
            ........
            ...x....
            ........
            .....o..
            ........
            ........
            ........
        ", Side::Dark);
        let engine = Engine::new(2);
        let best = engine.best_move(&position, Side::Dark).unwrap();
        assert_eq!(best, Move::step(Square::new(2, 3), Square::new(3, 2)));
    }

    #[test]
    fn best_move_is_always_legal() {
        let engine = Engine::default();
        let mut position = Board::new();
        for _ in 0..6 {
            let side = position.side_to_move();
            let legal = position.legal_moves();
            let Some(chosen) = engine.best_move(&position, side) else { break };
            assert!(legal.contains(&chosen));
            position = position.successor(&chosen, side);
        }
    }

    #[test]
    fn best_move_is_none_without_moves() {
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
        assert_eq!(Engine::default().best_move(&position, Side::Dark), None);
    }

    #[test]
    fn depth_is_clamped_to_one_ply() {
        assert_eq!(Engine::new(0).depth(), 1);
        assert_eq!(Engine::new(0).best_move(&Board::new(), Side::Dark).map(|m| m.from.row()), Some(2));
    }

    #[test]
    fn random_move_respects_mandatory_capture() {
        let position = board("
            ........
            ........
            .x...x..
            ..o.....
            ........
            ........
            ........
            ........
        ", Side::Dark);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let move_ = random_move(&position, Side::Dark, &mut rng).unwrap();
            assert_eq!(move_, Move::capture(Square::new(2, 1), Square::new(3, 2), Square::new(4, 3)));
        }
    }
}
