use std::fmt::{Display, Write};

use chumsky::{Parser, error::Rich, extra::Err, prelude::*};
use strum::VariantNames;

use crate::model::{BoardFile, BoardRank, PawnPromotion, Square};

pub trait Prs<'s, O> = Parser<'s, &'s str, O, Err<Rich<'s, char>>>;

/// Types with a canonical algebraic textual form.
pub trait Parsable: Sized {
    fn parser<'s>() -> impl Prs<'s, Self>;

    /// Parse the whole of `s`, failing if anything is left over.
    fn parse_exact(s: &str) -> Option<Self> {
        Self::parser().then_ignore(end()).parse(s).into_output()
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VARIANTS[self.ix()])
    }
}

impl Display for BoardFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VARIANTS[self.ix()])
    }
}

impl Display for BoardRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VARIANTS[self.ix()])
    }
}

impl Display for PawnPromotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(["n", "b", "r", "q"][self.ix()])
    }
}

fn board_file<'s>() -> impl Prs<'s, BoardFile> {
    one_of('a'..='h').map(|c| BoardFile::from_u8((c as u32 - 'a' as u32) as u8))
}

fn board_rank<'s>() -> impl Prs<'s, BoardRank> {
    one_of('1'..='8').map(|c| BoardRank::from_u8((c as u32 - '1' as u32) as u8))
}

impl Parsable for BoardFile {
    fn parser<'s>() -> impl Prs<'s, Self> {
        board_file()
    }
}

impl Parsable for BoardRank {
    fn parser<'s>() -> impl Prs<'s, Self> {
        board_rank()
    }
}

impl Parsable for Square {
    fn parser<'s>() -> impl Prs<'s, Self> {
        board_file()
            .then(board_rank())
            .map(|(f, r)| Square::from_coords(f, r))
    }
}

fn pawn_promotion<'s>() -> impl Prs<'s, PawnPromotion> {
    use PawnPromotion::*;
    choice((
        just('n').to(KNIGHT),
        just('b').to(BISHOP),
        just('r').to(ROOK),
        just('q').to(QUEEN),
    ))
}

impl Parsable for PawnPromotion {
    fn parser<'s>() -> impl Prs<'s, Self> {
        pawn_promotion()
    }
}

/// Wire representation of a move: a pair of algebraic squares plus an
/// optional promotion letter, e.g. `e7e8q`.
///
/// This is the shape the transport layer's `game:move` frame carries
/// `{ from, to, promotion? }` as, and is also what `MoveRecord` display
/// uses for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordNotation {
    pub from: Square,
    pub to: Square,
    pub prom: Option<PawnPromotion>,
}

impl CoordNotation {
    pub fn new(from: Square, to: Square, prom: Option<PawnPromotion>) -> Self {
        Self { from, to, prom }
    }
}

impl Parsable for CoordNotation {
    fn parser<'s>() -> impl Prs<'s, Self> {
        group((Square::parser(), Square::parser(), pawn_promotion().or_not())).map_group(Self::new)
    }
}

impl Display for CoordNotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.from.fmt(f)?;
        self.to.fmt(f)?;
        if let Some(p) = self.prom {
            p.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_square_parser() {
        for sq in Square::iter() {
            let text = sq.to_string();
            assert_eq!(Square::parse_exact(&text).expect("parse"), sq);
        }
    }

    #[test]
    fn test_coord_notation_roundtrip() {
        let mv = CoordNotation::new(Square::e7, Square::e8, Some(PawnPromotion::QUEEN));
        assert_eq!(CoordNotation::parse_exact(&mv.to_string()), Some(mv));

        let mv = CoordNotation::new(Square::e2, Square::e4, None);
        assert_eq!(CoordNotation::parse_exact(&mv.to_string()), Some(mv));
    }
}
