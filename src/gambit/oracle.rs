//! Knight Retreat Oracle: a pre-computed lookup from `(origin,
//! attack-target)` to the set of `(square, cost)` retreat options for a
//! knight whose capture attempt failed.
//!
//! The table is generated offline (every knight-legal `(origin, attack)`
//! pair, BFS cost from origin to every square in the bounding rectangle)
//! and embedded at compile time, compressed, via [`include_flate`]. It
//! is decoded once into a process-wide map; per §9's "global mutable
//! state" note, decoding happens eagerly at startup rather than on first
//! use, to avoid a lazy-init race.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::model::Square;

include_flate::flate!(static ORACLE_BYTES: [u8] from "data/knight_retreat_oracle.bin");

/// One retreat option: destination square plus its BP cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetreatOption {
    pub square: Square,
    pub cost: u8,
}

fn pack_key(origin: Square, attack: Square) -> u16 {
    ((origin.file() as u16) << 9)
        | ((origin.rank() as u16) << 6)
        | ((attack.file() as u16) << 3)
        | (attack.rank() as u16)
}

fn unpack_option(packed: u16) -> RetreatOption {
    let file = ((packed >> 6) & 0x7) as u8;
    let rank = ((packed >> 3) & 0x7) as u8;
    let cost = (packed & 0x7) as u8;
    RetreatOption {
        square: Square::from_coords(
            crate::model::BoardFile::from_u8(file),
            crate::model::BoardRank::from_u8(rank),
        ),
        cost,
    }
}

fn decode_table(bytes: &[u8]) -> HashMap<u16, Vec<RetreatOption>> {
    let mut table = HashMap::new();
    let mut pos = 0usize;

    let count = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
    pos += 2;

    for _ in 0..count {
        let key = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]);
        pos += 2;
        let option_count = bytes[pos] as usize;
        pos += 1;

        let mut options = Vec::with_capacity(option_count);
        for _ in 0..option_count {
            let packed = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]);
            pos += 2;
            options.push(unpack_option(packed));
        }

        table.insert(key, options);
    }

    table
}

static TABLE: LazyLock<HashMap<u16, Vec<RetreatOption>>> = LazyLock::new(|| decode_table(&ORACLE_BYTES));

/// Initialize the oracle eagerly. Call once at startup; subsequent
/// lookups are then guaranteed not to pay (or race on) the decode cost.
pub fn init() {
    LazyLock::force(&TABLE);
}

/// Retreat options for a knight on `origin` whose attack on `attack`
/// failed. Falls back to a direct BFS if the table has no entry for this
/// pair (e.g. corrupted/partial embed) — results must match the table
/// exactly; see the `oracle_matches_bfs_fallback` test.
pub fn lookup(origin: Square, attack: Square) -> Vec<RetreatOption> {
    let key = pack_key(origin, attack);
    match TABLE.get(&key) {
        Some(options) => options.clone(),
        None => bfs_fallback(origin, attack),
    }
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

/// Breadth-first search over knight moves on an empty board, restricted
/// to the axis-aligned bounding rectangle of `(origin, attack)`, minus
/// `attack` itself — the invariant spec'd for knight retreat options.
pub fn bfs_fallback(origin: Square, attack: Square) -> Vec<RetreatOption> {
    let lo_file = origin.file().min(attack.file());
    let hi_file = origin.file().max(attack.file());
    let lo_rank = origin.rank().min(attack.rank());
    let hi_rank = origin.rank().max(attack.rank());

    let mut dist: HashMap<Square, u8> = HashMap::new();
    dist.insert(origin, 0);
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(origin);

    while let Some(sq) = queue.pop_front() {
        let d = dist[&sq];
        for (df, dr) in KNIGHT_DELTAS {
            let Some(next) = sq.offset(df, dr) else {
                continue;
            };
            if dist.contains_key(&next) {
                continue;
            }
            dist.insert(next, d + 1);
            queue.push_back(next);
        }
    }

    let mut options = Vec::new();
    for file in lo_file..=hi_file {
        for rank in lo_rank..=hi_rank {
            let sq = Square::from_coords(
                crate::model::BoardFile::from_u8(file),
                crate::model::BoardRank::from_u8(rank),
            );
            if sq == attack {
                continue;
            }
            if let Some(&cost) = dist.get(&sq) {
                if cost <= 7 {
                    options.push(RetreatOption { square: sq, cost });
                }
            }
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_always_present_at_zero_cost() {
        init();
        let options = lookup(Square::d4, Square::f5);
        assert!(options.iter().any(|o| o.square == Square::d4 && o.cost == 0));
    }

    #[test]
    fn worked_example_from_spec() {
        init();
        let mut options = lookup(Square::d4, Square::f5);
        options.sort_by_key(|o| (o.square.file(), o.square.rank()));
        let expected: HashMap<Square, u8> = [
            (Square::d4, 0),
            (Square::e4, 3),
            (Square::f4, 2),
            (Square::d5, 3),
            (Square::e5, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(options.len(), expected.len());
        for opt in options {
            assert_eq!(opt.cost, expected[&opt.square]);
        }
    }

    #[test]
    fn oracle_matches_bfs_fallback() {
        init();
        for origin in [Square::a1, Square::d4, Square::h8, Square::c3] {
            for (df, dr) in KNIGHT_DELTAS {
                let Some(attack) = origin.offset(df, dr) else {
                    continue;
                };
                let mut from_table = lookup(origin, attack);
                let mut from_bfs = bfs_fallback(origin, attack);
                from_table.sort_by_key(|o| (o.square.file(), o.square.rank()));
                from_bfs.sort_by_key(|o| (o.square.file(), o.square.rank()));
                assert_eq!(from_table, from_bfs, "mismatch for {origin:?}->{attack:?}");
            }
        }
    }
}
