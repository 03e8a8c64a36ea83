//! The chessboard: piece placement, transient rights, and the position
//! history used for threefold-repetition detection.

use crate::model::{
    CastlingDirection, ChessColor, ChessMan, ChessPiece, DataBoard, EnPassant, Square, Transients,
    zobrist::ZobristTables,
};

/// A full chess position: piece placement plus the transient state that
/// can't be recovered by looking at the board alone.
#[derive(Debug, Clone)]
pub struct Board {
    pub squares: DataBoard<Option<ChessMan>>,
    pub transients: Transients,
    pub side_to_move: ChessColor,
    /// Zobrist fingerprints of every position reached so far, one per ply,
    /// in the order they occurred. Used for threefold-repetition counting;
    /// see [`Board::position_count`].
    pub position_history: Vec<u64>,
}

impl Board {
    /// The standard chess starting position.
    pub fn startpos() -> Self {
        use ChessMan::*;
        use Square::*;

        let mut squares = DataBoard([None; 64]);

        let back_rank = [
            WHITE_ROOK,
            WHITE_KNIGHT,
            WHITE_BISHOP,
            WHITE_QUEEN,
            WHITE_KING,
            WHITE_BISHOP,
            WHITE_KNIGHT,
            WHITE_ROOK,
        ];

        for (file, man) in back_rank.into_iter().enumerate() {
            squares.set(Square::from_u8(file as u8), Some(man));
            squares.set(Square::from_u8(file as u8 | 0o10), Some(WHITE_PAWN));
            squares.set(Square::from_u8(file as u8 | 0o60), Some(BLACK_PAWN));
            squares.set(
                Square::from_u8(file as u8 | 0o70),
                Some(match man {
                    WHITE_ROOK => BLACK_ROOK,
                    WHITE_KNIGHT => BLACK_KNIGHT,
                    WHITE_BISHOP => BLACK_BISHOP,
                    WHITE_QUEEN => BLACK_QUEEN,
                    WHITE_KING => BLACK_KING,
                    _ => unreachable!(),
                }),
            );
        }

        let _ = (a1, h8);

        let mut board = Self {
            squares,
            transients: Transients::startpos(),
            side_to_move: ChessColor::WHITE,
            position_history: Vec::new(),
        };
        board.record_position();
        board
    }

    /// An empty board, white to move, no castling rights. Useful for
    /// constructing test positions and the oracle's BFS fallback.
    pub fn empty() -> Self {
        Self {
            squares: DataBoard([None; 64]),
            transients: Transients::empty(),
            side_to_move: ChessColor::WHITE,
            position_history: Vec::new(),
        }
    }

    #[inline]
    pub fn at(&self, sq: Square) -> Option<ChessMan> {
        self.squares.get(sq)
    }

    #[inline]
    pub fn king_square(&self, color: ChessColor) -> Square {
        self.squares
            .0
            .iter()
            .enumerate()
            .find_map(|(ix, man)| match man {
                Some(man) if man.piece() == ChessPiece::KING && man.color() == color => {
                    Some(Square::from_u8(ix as u8))
                }
                _ => None,
            })
            .expect("exactly one king per color")
    }

    /// Zobrist fingerprint of the current position, per the threefold
    /// definition: placement, side-to-move, castling rights, en-passant
    /// target. The halfmove clock is deliberately excluded.
    pub fn fingerprint(&self) -> u64 {
        let occupied = self
            .squares
            .0
            .iter()
            .enumerate()
            .filter_map(|(ix, man)| man.map(|man| (Square::from_u8(ix as u8), man)));
        ZobristTables::get().hash_position(occupied, self.side_to_move, &self.transients)
    }

    /// Push the current position's fingerprint onto the history. Called
    /// once per ply, after a move (including duel/retreat resolution) is
    /// fully applied.
    pub fn record_position(&mut self) {
        self.position_history.push(self.fingerprint());
    }

    /// Number of times the current position has occurred, including now.
    pub fn position_count(&self) -> usize {
        let current = self.fingerprint();
        self.position_history
            .iter()
            .filter(|&&h| h == current)
            .count()
    }

    pub fn threefold_repetition(&self) -> bool {
        self.position_count() >= 3
    }

    pub fn fifty_move_rule(&self) -> bool {
        self.transients.halfmove_clock >= 100
    }

    /// Revoke castling rights when a king or rook moves away from, or a
    /// rook is captured on, its home square.
    pub fn revoke_rights_touching(&mut self, sq: Square) {
        use CastlingDirection::*;
        use Square::*;
        match sq {
            e1 => self.transients.rights[ChessColor::WHITE.ix()] = [false; 2],
            e8 => self.transients.rights[ChessColor::BLACK.ix()] = [false; 2],
            a1 => self.transients.rights[ChessColor::WHITE.ix()][EAST.ix()] = false,
            h1 => self.transients.rights[ChessColor::WHITE.ix()][WEST.ix()] = false,
            a8 => self.transients.rights[ChessColor::BLACK.ix()][EAST.ix()] = false,
            h8 => self.transients.rights[ChessColor::BLACK.ix()][WEST.ix()] = false,
            _ => {}
        }
    }

    /// Material remaining is insufficient to deliver checkmate under any
    /// sequence of legal moves (K v K, K+N v K, K+B v K, same-color
    /// bishops only).
    pub fn material_is_insufficient(&self) -> bool {
        let mut minor_count = 0u8;
        let mut bishop_square_colors: Vec<bool> = Vec::new();

        for (ix, man) in self.squares.0.iter().enumerate() {
            let Some(man) = man else { continue };
            match man.piece() {
                ChessPiece::KING => {}
                ChessPiece::KNIGHT => minor_count += 1,
                ChessPiece::BISHOP => {
                    minor_count += 1;
                    let sq = Square::from_u8(ix as u8);
                    bishop_square_colors.push((sq.file() + sq.rank()) % 2 == 0);
                }
                _ => return false,
            }
        }

        match minor_count {
            0 => true,
            1 => true,
            _ => {
                bishop_square_colors.len() == minor_count as usize
                    && bishop_square_colors
                        .windows(2)
                        .all(|w| w[0] == w[1])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_both_kings() {
        let b = Board::startpos();
        assert_eq!(b.at(Square::e1), Some(ChessMan::WHITE_KING));
        assert_eq!(b.at(Square::e8), Some(ChessMan::BLACK_KING));
        assert_eq!(b.side_to_move, ChessColor::WHITE);
    }

    #[test]
    fn startpos_recorded_once() {
        let b = Board::startpos();
        assert_eq!(b.position_count(), 1);
        assert!(!b.threefold_repetition());
    }

    #[test]
    fn bare_kings_is_insufficient_material() {
        let mut b = Board::empty();
        b.squares.set(Square::a1, Some(ChessMan::WHITE_KING));
        b.squares.set(Square::h8, Some(ChessMan::BLACK_KING));
        assert!(b.material_is_insufficient());
    }

    #[test]
    fn rook_and_king_is_sufficient_material() {
        let mut b = Board::empty();
        b.squares.set(Square::a1, Some(ChessMan::WHITE_KING));
        b.squares.set(Square::h8, Some(ChessMan::BLACK_KING));
        b.squares.set(Square::a8, Some(ChessMan::WHITE_ROOK));
        assert!(!b.material_is_insufficient());
    }
}
