//! Legal move generation, application, and check/mate/draw detection.
//!
//! The kernel treats captures as ordinary moves — destination occupied by
//! an enemy chessman. It has no notion of Battle Points; the Gambit
//! overlay decides whether an admitted capture executes immediately or
//! spawns a duel.

use crate::model::{
    Board, CastlingDirection, CastlingRules, ChessColor, ChessCommoner, ChessMan, ChessPiece,
    EnPassant, PawnPromotion, SpecialMove, Square, Transients,
};

/// Failure modes of the rule kernel. Always returned by value, never
/// panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleError {
    IllegalMove,
    WrongTurn,
    OwnKingInCheck,
    MalformedPromotion,
    CastleThroughAttack,
    NoPieceOnOrigin,
}

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Move produced by the pseudo-legal enumerator. Distinct from
/// [`crate::model::ChessMove`] only in that it has not yet been checked
/// for leaving the mover's own king in check.
pub type Move = crate::model::ChessMove;

fn sliding_dirs(piece: ChessPiece) -> &'static [(i8, i8)] {
    match piece {
        ChessPiece::BISHOP => &BISHOP_DIRS,
        ChessPiece::ROOK => &ROOK_DIRS,
        ChessPiece::QUEEN => &[
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
            (1, 0),
            (-1, 0),
            (0, 1),
            (0, -1),
        ],
        _ => &[],
    }
}

/// Every square attacked by `color`'s pieces on `board`, ignoring whose
/// turn it is and ignoring check. Used both for `is_in_check` and for
/// castle-through-attack validation.
pub fn attacked_squares(board: &Board, color: ChessColor) -> [bool; 64] {
    let mut attacked = [false; 64];

    for (ix, man) in board.squares.0.iter().enumerate() {
        let Some(man) = man else { continue };
        if man.color() != color {
            continue;
        }
        let from = Square::from_u8(ix as u8);
        match man.piece() {
            ChessPiece::PAWN => {
                let dr = color.sign();
                for df in [-1, 1] {
                    if let Some(to) = from.offset(df, dr) {
                        attacked[to.ix()] = true;
                    }
                }
            }
            ChessPiece::KNIGHT => {
                for (df, dr) in KNIGHT_DELTAS {
                    if let Some(to) = from.offset(df, dr) {
                        attacked[to.ix()] = true;
                    }
                }
            }
            ChessPiece::KING => {
                for (df, dr) in KING_DELTAS {
                    if let Some(to) = from.offset(df, dr) {
                        attacked[to.ix()] = true;
                    }
                }
            }
            piece => {
                for (df, dr) in sliding_dirs(piece) {
                    let mut sq = from;
                    while let Some(to) = sq.offset(*df, *dr) {
                        attacked[to.ix()] = true;
                        if board.at(to).is_some() {
                            break;
                        }
                        sq = to;
                    }
                }
            }
        }
    }

    attacked
}

pub fn is_in_check(board: &Board, color: ChessColor) -> bool {
    let king = board.king_square(color);
    attacked_squares(board, color.opp())[king.ix()]
}

/// Pseudo-legal moves for `color`: respects piece geometry and blocking
/// but does not yet exclude moves that leave the mover's own king in
/// check.
pub fn pseudo_legal_moves(board: &Board, color: ChessColor) -> Vec<Move> {
    let mut moves = Vec::new();

    for (ix, man) in board.squares.0.iter().enumerate() {
        let Some(man) = man else { continue };
        if man.color() != color {
            continue;
        }
        let from = Square::from_u8(ix as u8);
        match man.piece() {
            ChessPiece::PAWN => pawn_moves(board, color, from, &mut moves),
            ChessPiece::KNIGHT => leaper_moves(board, color, from, ChessPiece::KNIGHT, &KNIGHT_DELTAS, &mut moves),
            ChessPiece::KING => {
                leaper_moves(board, color, from, ChessPiece::KING, &KING_DELTAS, &mut moves);
                castling_moves(board, color, from, &mut moves);
            }
            piece => slider_moves(board, color, from, piece, &mut moves),
        }
    }

    moves
}

fn commoner_at(board: &Board, sq: Square) -> Option<ChessCommoner> {
    board.at(sq).and_then(|m| ChessCommoner::from_piece(m.piece()))
}

fn leaper_moves(
    board: &Board,
    color: ChessColor,
    from: Square,
    piece: ChessPiece,
    deltas: &[(i8, i8)],
    out: &mut Vec<Move>,
) {
    for (df, dr) in deltas {
        let Some(to) = from.offset(*df, *dr) else {
            continue;
        };
        match board.at(to) {
            Some(occ) if occ.color() == color => continue,
            occ => out.push(Move {
                ech: piece,
                from,
                to,
                special: None,
                capture: occ.and_then(|_| commoner_at(board, to)),
            }),
        }
    }
}

fn slider_moves(board: &Board, color: ChessColor, from: Square, piece: ChessPiece, out: &mut Vec<Move>) {
    for (df, dr) in sliding_dirs(piece) {
        let mut sq = from;
        while let Some(to) = sq.offset(*df, *dr) {
            match board.at(to) {
                None => {
                    out.push(Move {
                        ech: piece,
                        from,
                        to,
                        special: None,
                        capture: None,
                    });
                    sq = to;
                }
                Some(occ) if occ.color() != color => {
                    out.push(Move {
                        ech: piece,
                        from,
                        to,
                        special: None,
                        capture: commoner_at(board, to),
                    });
                    break;
                }
                Some(_) => break,
            }
        }
    }
}

fn pawn_moves(board: &Board, color: ChessColor, from: Square, out: &mut Vec<Move>) {
    let dr = color.sign();
    let start_rank = if color.is_white() { 1 } else { 6 };
    let promo_rank = if color.is_white() { 7 } else { 0 };

    if let Some(one) = from.offset(0, dr) {
        if board.at(one).is_none() {
            push_pawn_move(from, one, None, one.rank() == promo_rank, out);

            if from.rank() == start_rank {
                if let Some(two) = from.offset(0, 2 * dr) {
                    if board.at(two).is_none() {
                        out.push(Move {
                            ech: ChessPiece::PAWN,
                            from,
                            to: two,
                            special: Some(SpecialMove::PAWN),
                            capture: None,
                        });
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        let Some(to) = from.offset(df, dr) else {
            continue;
        };
        if let Some(occ) = board.at(to) {
            if occ.color() != color {
                push_pawn_move(from, to, commoner_at(board, to), to.rank() == promo_rank, out);
            }
        } else if board.transients.en_passant.map(|ep| ep.square) == Some(to) {
            out.push(Move {
                ech: ChessPiece::PAWN,
                from,
                to,
                special: Some(SpecialMove::PAWN),
                capture: Some(ChessCommoner::PAWN),
            });
        }
    }
}

fn push_pawn_move(from: Square, to: Square, capture: Option<ChessCommoner>, promoting: bool, out: &mut Vec<Move>) {
    if promoting {
        for promo in [
            PawnPromotion::QUEEN,
            PawnPromotion::ROOK,
            PawnPromotion::BISHOP,
            PawnPromotion::KNIGHT,
        ] {
            out.push(Move {
                ech: ChessPiece::PAWN,
                from,
                to,
                special: Some(promo.into()),
                capture,
            });
        }
    } else {
        out.push(Move {
            ech: ChessPiece::PAWN,
            from,
            to,
            special: None,
            capture,
        });
    }
}

fn castling_moves(board: &Board, color: ChessColor, from: Square, out: &mut Vec<Move>) {
    if is_in_check(board, color) {
        return;
    }
    let rules = &CastlingRules::STANDARD;
    for dir in [CastlingDirection::EAST, CastlingDirection::WEST] {
        if !board.transients.rights[color.ix()][dir.ix()] {
            continue;
        }
        let rook_sq = rules.rook_start[color.ix()][dir.ix()];
        let king_end = rules.king_end[color.ix()][dir.ix()];

        if board.at(rook_sq) != Some(ChessMan::new(color, ChessPiece::ROOK)) {
            continue;
        }

        let step: i8 = if king_end.file() > from.file() { 1 } else { -1 };
        let mut clear = true;
        let mut sq = from;
        loop {
            let Some(next) = sq.offset(step, 0) else {
                clear = false;
                break;
            };
            if next == king_end {
                if board.at(next).is_some() && next != rook_sq {
                    clear = false;
                }
                break;
            }
            if board.at(next).is_some() && next != rook_sq {
                clear = false;
                break;
            }
            sq = next;
        }
        if !clear {
            continue;
        }

        let attacked = attacked_squares(board, color.opp());
        let mut sq = from;
        let mut passes_through_check = false;
        loop {
            if attacked[sq.ix()] {
                passes_through_check = true;
                break;
            }
            if sq == king_end {
                break;
            }
            sq = sq.offset(step, 0).expect("checked clear above");
        }
        if passes_through_check {
            continue;
        }

        out.push(Move {
            ech: ChessPiece::KING,
            from,
            to: king_end,
            special: Some(dir.into()),
            capture: None,
        });
    }
}

/// Apply a pseudo-legal move, returning the resulting board. Does not
/// check legality (own king left in check); callers filter via
/// [`generate_legal_moves`] or check after the fact with [`is_in_check`].
pub fn apply_move(board: &Board, mv: Move) -> Board {
    let mut next = board.clone();
    let man = next.squares.get(mv.from).expect("move origin must be occupied");

    next.squares.set(mv.from, None);

    if let Some(castling) = mv.castling() {
        let rules = &CastlingRules::STANDARD;
        let color = man.color();
        let rook_from = rules.rook_start[color.ix()][castling.ix()];
        let rook_to = rules.rook_end[color.ix()][castling.ix()];
        next.squares.set(rook_from, None);
        next.squares.set(rook_to, Some(ChessMan::new(color, ChessPiece::ROOK)));
        next.squares.set(mv.to, Some(man));
    } else if mv.is_en_passant() {
        let captured_sq = board
            .transients
            .en_passant
            .expect("en-passant move requires transient state")
            .capture;
        next.squares.set(captured_sq, None);
        next.squares.set(mv.to, Some(man));
    } else if let Some(promo) = mv.promotion() {
        next.squares.set(mv.to, Some(ChessMan::new(man.color(), promo.into())));
    } else {
        next.squares.set(mv.to, Some(man));
    }

    next.revoke_rights_touching(mv.from);
    next.revoke_rights_touching(mv.to);

    next.transients.en_passant = if mv.is_double_push() {
        let dir = man.color().sign();
        Some(EnPassant {
            square: mv.from.offset(0, dir).expect("double push origin has a square ahead"),
            capture: mv.to,
        })
    } else {
        None
    };

    next.transients.halfmove_clock = if mv.ech == ChessPiece::PAWN || mv.capture.is_some() {
        0
    } else {
        board.transients.halfmove_clock + 1
    };

    next.side_to_move = board.side_to_move.opp();
    next.record_position();
    next
}

/// Moves that do not leave the mover's own king in check.
pub fn generate_legal_moves(board: &Board, color: ChessColor) -> Vec<Move> {
    pseudo_legal_moves(board, color)
        .into_iter()
        .filter(|&mv| !is_in_check(&apply_move(board, mv), color))
        .collect()
}

/// Validate and classify a candidate move against the current position.
/// Does not apply it.
pub fn validate_move(board: &Board, color: ChessColor, mv: Move) -> Result<Move, RuleError> {
    if board.side_to_move != color {
        return Err(RuleError::WrongTurn);
    }
    let Some(man) = board.at(mv.from) else {
        return Err(RuleError::NoPieceOnOrigin);
    };
    if man.color() != color {
        return Err(RuleError::NoPieceOnOrigin);
    }

    let legal = generate_legal_moves(board, color);
    let found = legal.iter().find(|candidate| {
        candidate.from == mv.from && candidate.to == mv.to && candidate.promotion() == mv.promotion()
    });

    match found {
        Some(&mv) => Ok(mv),
        None => {
            let same_from_to = legal
                .iter()
                .any(|candidate| candidate.from == mv.from && candidate.to == mv.to);
            if same_from_to {
                Err(RuleError::MalformedPromotion)
            } else if pseudo_legal_moves(board, color)
                .iter()
                .any(|candidate| candidate.from == mv.from && candidate.to == mv.to)
            {
                Err(RuleError::OwnKingInCheck)
            } else {
                Err(RuleError::IllegalMove)
            }
        }
    }
}

pub fn is_checkmate(board: &Board, color: ChessColor) -> bool {
    is_in_check(board, color) && generate_legal_moves(board, color).is_empty()
}

pub fn is_stalemate(board: &Board, color: ChessColor) -> bool {
    !is_in_check(board, color) && generate_legal_moves(board, color).is_empty()
}

pub fn threefold_repetition(board: &Board) -> bool {
    board.threefold_repetition()
}

pub fn fifty_move_rule(board: &Board) -> bool {
    board.fifty_move_rule()
}

pub fn material_is_insufficient(board: &Board) -> bool {
    board.material_is_insufficient()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::notation::{CoordNotation, Parsable};

    fn mv(board: &Board, from: Square, to: Square) -> Move {
        *generate_legal_moves(board, board.side_to_move)
            .iter()
            .find(|m| m.from == from && m.to == to)
            .unwrap_or_else(|| panic!("no legal move {from:?}-{to:?}"))
    }

    #[test]
    fn startpos_has_twenty_legal_moves() {
        let board = Board::startpos();
        assert_eq!(generate_legal_moves(&board, ChessColor::WHITE).len(), 20);
    }

    #[test]
    fn scholars_mate_sequence() {
        let mut board = Board::startpos();
        for (from, to) in [
            (Square::e2, Square::e4),
            (Square::e7, Square::e5),
            (Square::f1, Square::c4),
            (Square::b8, Square::c6),
            (Square::d1, Square::h5),
            (Square::g8, Square::f6),
            (Square::h5, Square::f7),
        ] {
            let m = mv(&board, from, to);
            board = apply_move(&board, m);
        }
        assert!(is_checkmate(&board, ChessColor::BLACK));
    }

    #[test]
    fn fools_mate_is_stalemate_free() {
        let board = Board::startpos();
        assert!(!is_stalemate(&board, ChessColor::WHITE));
        assert!(!is_checkmate(&board, ChessColor::WHITE));
    }

    #[test]
    fn pinned_piece_cannot_move_illegally() {
        // White king e1, white bishop e2 pinned by black rook e8; bishop
        // must not be allowed to move off the e-file.
        let mut board = Board::empty();
        board.squares.set(Square::e1, Some(ChessMan::WHITE_KING));
        board.squares.set(Square::e2, Some(ChessMan::WHITE_BISHOP));
        board.squares.set(Square::e8, Some(ChessMan::BLACK_ROOK));
        board.squares.set(Square::a8, Some(ChessMan::BLACK_KING));
        board.transients = Transients::empty();

        let legal = generate_legal_moves(&board, ChessColor::WHITE);
        assert!(legal.iter().all(|m| m.from != Square::e2 || m.to.file() == Square::e2.file()));
    }

    #[test]
    fn double_push_sets_en_passant_target() {
        let board = Board::startpos();
        let m = mv(&board, Square::e2, Square::e4);
        let next = apply_move(&board, m);
        assert_eq!(
            next.transients.en_passant,
            Some(EnPassant {
                square: Square::e3,
                capture: Square::e4,
            })
        );
    }

    #[test]
    fn coord_notation_resolves_to_legal_move() {
        let board = Board::startpos();
        let wire = CoordNotation::parse_exact("e2e4").unwrap();
        let candidate = Move {
            ech: ChessPiece::PAWN,
            from: wire.from,
            to: wire.to,
            special: None,
            capture: None,
        };
        assert!(validate_move(&board, ChessColor::WHITE, candidate).is_ok());
    }
}
