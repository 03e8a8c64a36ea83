//! Zobrist hashing of chess positions.
//!
//! Used to build the cheap position fingerprint the threefold-repetition
//! rule compares: `(piece placement, side-to-move, castling rights,
//! en-passant target)`. The halfmove clock and move history are
//! deliberately excluded, matching the position-fingerprint definition
//! in the rule kernel's draw detection.
//!
//! Random values are generated with [`rand::rngs::SmallRng`] seeded with
//! the first 32 bytes of the ASCII representation of π, the same
//! convention used for the chess engine this crate grew out of.

use std::sync::LazyLock;

use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};

use crate::model::{CastlingDirection, ChessColor, ChessMan, EnPassant, Square, Transients};

/// Seed the rng used to populate the Zobrist tables. Discards the first
/// 1000 values just in case.
pub fn pi_rng() -> SmallRng {
    let mut res = SmallRng::from_seed(*b"3.141592653589793238462643383279");
    for _ in 0..1000 {
        res.next_u64();
    }
    res
}

/// Random values for every (chessman, square) pair, plus the transient
/// state that a bare board doesn't carry.
#[derive(Debug, Clone)]
pub struct ZobristTables {
    /// Indexed by `ChessMan as i8 + 6` (so `0..12`), then by square.
    men: [[u64; 64]; 12],
    ep_files: [u64; 8],
    rights: [[u64; 2]; 2],
    black_to_move: u64,
}

impl ZobristTables {
    fn new() -> Self {
        let mut rng = pi_rng();

        let mut men = [[0u64; 64]; 12];
        for row in men.iter_mut() {
            rng.fill(&mut row[..]);
        }

        let mut ep_files = [0u64; 8];
        rng.fill(&mut ep_files[..]);

        let rights = [
            [rng.next_u64(), rng.next_u64()],
            [rng.next_u64(), rng.next_u64()],
        ];

        let black_to_move = rng.next_u64();

        Self {
            men,
            ep_files,
            rights,
            black_to_move,
        }
    }

    /// Reference the process-wide singleton table.
    pub fn get() -> &'static Self {
        &ZOBRIST
    }

    #[inline]
    fn man_ix(man: ChessMan) -> usize {
        (man as i8 + 6) as usize
    }

    #[inline]
    pub fn hash_man(&self, man: ChessMan, sq: Square) -> u64 {
        self.men[Self::man_ix(man)][sq.ix()]
    }

    #[inline]
    pub fn hash_en_passant(&self, ep: Option<EnPassant>) -> u64 {
        match ep {
            Some(ep) => self.ep_files[ep.capture.file() as usize],
            None => 0,
        }
    }

    #[inline]
    pub fn hash_rights(&self, rights: [[bool; 2]; 2]) -> u64 {
        let mut res = 0;
        for c in [ChessColor::WHITE, ChessColor::BLACK] {
            for d in [CastlingDirection::EAST, CastlingDirection::WEST] {
                if rights[c.ix()][d.ix()] {
                    res ^= self.rights[c.ix()][d.ix()];
                }
            }
        }
        res
    }

    #[inline]
    pub fn hash_side(&self, side: ChessColor) -> u64 {
        if side.is_black() { self.black_to_move } else { 0 }
    }

    /// Fingerprint of a full position: board occupancy plus the subset of
    /// [`Transients`] relevant to repetition (castling rights and the
    /// en-passant target square, not the halfmove clock).
    pub fn hash_position(
        &self,
        squares: impl Iterator<Item = (Square, ChessMan)>,
        side: ChessColor,
        transients: &Transients,
    ) -> u64 {
        let mut h = self.hash_side(side)
            ^ self.hash_rights(transients.rights)
            ^ self.hash_en_passant(transients.en_passant);
        for (sq, man) in squares {
            h ^= self.hash_man(man, sq);
        }
        h
    }
}

static ZOBRIST: LazyLock<ZobristTables> = LazyLock::new(ZobristTables::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_order_independent() {
        let squares = [
            (Square::e1, ChessMan::WHITE_KING),
            (Square::e8, ChessMan::BLACK_KING),
        ];
        let transients = Transients::startpos();
        let a = ZobristTables::get().hash_position(
            squares.iter().copied(),
            ChessColor::WHITE,
            &transients,
        );
        let b = ZobristTables::get().hash_position(
            squares.iter().rev().copied(),
            ChessColor::WHITE,
            &transients,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn side_to_move_changes_hash() {
        let squares = [(Square::e1, ChessMan::WHITE_KING)];
        let transients = Transients::startpos();
        let white = ZobristTables::get().hash_position(
            squares.iter().copied(),
            ChessColor::WHITE,
            &transients,
        );
        let black = ZobristTables::get().hash_position(
            squares.iter().copied(),
            ChessColor::BLACK,
            &transients,
        );
        assert_ne!(white, black);
    }
}
