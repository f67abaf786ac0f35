//! Set validation: groups, runs, and whole tables.
//!
//! Every check here is pure and order-independent; the tile order of a set
//! only matters for display, see [`arrange`].

use crate::error::{GameError, GroupFault, RunFault, SetError};
use crate::{Meld, MeldType, Tile};

/// Smallest legal set.
pub const MIN_SET_SIZE: usize = 3;
/// Largest legal group: one tile per suit.
pub const MAX_GROUP_SIZE: usize = 4;
/// Minimum value of a player's first meld.
pub const OPENING_THRESHOLD: u32 = 30;

fn split_jokers(tiles: &[Tile]) -> (usize, Vec<Tile>) {
    let jokers = tiles.iter().filter(|t| t.is_joker()).count();
    let numbered = tiles.iter().copied().filter(|t| !t.is_joker()).collect();
    (jokers, numbered)
}

/// Group rules, assuming the minimum size has already been checked.
pub fn check_group(tiles: &[Tile]) -> Result<(), GroupFault> {
    // Checked on its own so five tiles fail here even before suits repeat.
    if tiles.len() > MAX_GROUP_SIZE {
        return Err(GroupFault::TooLarge);
    }
    let (jokers, numbered) = split_jokers(tiles);
    if jokers > 1 {
        return Err(GroupFault::TooManyJokers);
    }
    let Some(anchor) = numbered.first() else {
        return Err(GroupFault::NoAnchor);
    };
    if numbered.iter().any(|t| !t.same_rank(anchor)) {
        return Err(GroupFault::MixedRanks);
    }
    let mut suits: Vec<_> = numbered.iter().map(Tile::suit).collect();
    suits.sort();
    suits.dedup();
    if suits.len() != numbered.len() {
        return Err(GroupFault::RepeatedSuit);
    }
    Ok(())
}

/// Run rules, assuming the minimum size has already been checked.
///
/// Jokers may only fill gaps between numbered tiles: the rank span of the
/// numbered tiles must equal the tile count exactly.
pub fn check_run(tiles: &[Tile]) -> Result<(), RunFault> {
    let (_, mut numbered) = split_jokers(tiles);
    let Some(anchor) = numbered.first().copied() else {
        return Err(RunFault::NoAnchor);
    };
    if numbered.iter().any(|t| t.suit() != anchor.suit()) {
        return Err(RunFault::MixedSuits);
    }
    numbered.sort();
    if numbered.windows(2).any(|pair| pair[0].rank() == pair[1].rank()) {
        return Err(RunFault::RepeatedRank);
    }
    let low = usize::from(numbered[0].rank());
    let high = usize::from(numbered[numbered.len() - 1].rank());
    if high - low + 1 != tiles.len() {
        return Err(RunFault::SpanMismatch);
    }
    Ok(())
}

/// 3-4 tiles of one rank in distinct suits, at most one joker.
pub fn is_group(tiles: &[Tile]) -> bool {
    (MIN_SET_SIZE..=MAX_GROUP_SIZE).contains(&tiles.len()) && check_group(tiles).is_ok()
}

/// 3+ tiles of one suit and consecutive ranks, jokers filling the gaps.
pub fn is_run(tiles: &[Tile]) -> bool {
    tiles.len() >= MIN_SET_SIZE && check_run(tiles).is_ok()
}

pub fn is_valid_set(tiles: &[Tile]) -> bool {
    is_group(tiles) || is_run(tiles)
}

/// Decide whether `tiles` is a group or a run, explaining the failure otherwise.
pub fn classify(tiles: &[Tile]) -> Result<MeldType, SetError> {
    if tiles.is_empty() {
        return Err(SetError::Empty);
    }
    if tiles.len() < MIN_SET_SIZE {
        return Err(SetError::TooShort(tiles.len()));
    }
    let group = match check_group(tiles) {
        Ok(()) => return Ok(MeldType::Group),
        Err(fault) => fault,
    };
    match check_run(tiles) {
        Ok(()) => Ok(MeldType::Run),
        Err(run) => Err(SetError::Neither { group, run }),
    }
}

/// Check every set on a proposed table, reporting the first bad one.
pub fn validate_table(melds: &[Meld]) -> Result<(), GameError> {
    for (index, meld) in melds.iter().enumerate() {
        classify(meld.tiles()).map_err(|reason| GameError::InvalidArrangement { index, reason })?;
    }
    Ok(())
}

/// Total point value of a tile list.
pub fn tiles_value(tiles: &[Tile]) -> u32 {
    tiles.iter().map(Tile::value).sum()
}

/// Whether `tiles` is worth enough to be a first meld.
pub fn meets_opening_threshold(tiles: &[Tile], threshold: u32) -> bool {
    tiles_value(tiles) >= threshold
}

/// Put a valid set in reading order.
///
/// Runs are sorted by rank with jokers placed in the gaps; groups keep
/// their numbered tiles first, then the joker. Invalid input is returned unchanged.
pub fn arrange(tiles: &[Tile]) -> Vec<Tile> {
    match classify(tiles) {
        Ok(MeldType::Run) => {
            let (_, mut numbered) = split_jokers(tiles);
            numbered.sort();
            let low = numbered[0].rank();
            let mut ordered = Vec::with_capacity(tiles.len());
            let mut next = numbered.iter().peekable();
            for rank in low..low + tiles.len() as u8 {
                match next.peek() {
                    Some(tile) if tile.rank() == rank => {
                        ordered.push(**tile);
                        next.next();
                    }
                    _ => ordered.push(Tile::joker()),
                }
            }
            ordered
        }
        Ok(MeldType::Group) => {
            let (jokers, mut numbered) = split_jokers(tiles);
            numbered.extend(std::iter::repeat_n(Tile::joker(), jokers));
            numbered
        }
        Err(_) => tiles.to_vec(),
    }
}

/// Add `additions` to an existing set, returning the combined set in reading order.
pub fn extend(set: &[Tile], additions: &[Tile]) -> Result<Vec<Tile>, SetError> {
    let mut combined = set.to_vec();
    combined.extend_from_slice(additions);
    classify(&combined)?;
    Ok(arrange(&combined))
}

/// Split a set at `at` (in reading order) if both halves stand on their own.
pub fn split(set: &[Tile], at: usize) -> Option<(Vec<Tile>, Vec<Tile>)> {
    let ordered = arrange(set);
    if at > ordered.len() {
        return None;
    }
    let (left, right) = ordered.split_at(at);
    if is_valid_set(left) && is_valid_set(right) {
        Some((left.to_vec(), right.to_vec()))
    } else {
        None
    }
}
