use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod game;
pub mod rules;
pub mod solver;
#[cfg(target_arch = "wasm32")]
pub mod wasm_api;

pub use error::{GameError, SetError, TileError};
pub use game::{
    GameConfig, GamePhase, GameState, GameStatus, Move, MoveOutcome, Player, PlayerId, PlayerStatus,
};

/// Highest rank printed on a tile.
pub const MAX_RANK: u8 = 13;
/// Rank sentinel carried by jokers.
pub const JOKER_RANK: u8 = 0;
/// Point value of a joker, both for the opening meld and for penalties.
pub const JOKER_VALUE: u32 = 30;
/// Physical copies of every (rank, suit) pair in the standard pool.
pub const COPIES_PER_TILE: usize = 2;
/// Jokers in the standard pool.
pub const JOKERS_IN_POOL: usize = 2;
/// Size of the standard pool.
pub const POOL_SIZE: usize = Suit::PLAYABLE.len() * MAX_RANK as usize * COPIES_PER_TILE + JOKERS_IN_POOL;

/// Suit of a tile. `Joker` is the marker carried only by jokers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Red,
    Blue,
    Orange,
    Black,
    Joker,
}

impl Suit {
    /// The four suits that numbered tiles come in.
    pub const PLAYABLE: [Suit; 4] = [Suit::Red, Suit::Blue, Suit::Orange, Suit::Black];

    fn index(self) -> Option<u8> {
        match self {
            Suit::Red => Some(0),
            Suit::Blue => Some(1),
            Suit::Orange => Some(2),
            Suit::Black => Some(3),
            Suit::Joker => None,
        }
    }

    fn from_index(index: u8) -> Suit {
        Suit::PLAYABLE[usize::from(index & 0b11)]
    }

    fn letter(self) -> char {
        match self {
            Suit::Red => 'r',
            Suit::Blue => 'b',
            Suit::Orange => 'o',
            Suit::Black => 'k',
            Suit::Joker => 'j',
        }
    }

    fn from_letter(letter: char) -> Option<Suit> {
        match letter {
            'r' => Some(Suit::Red),
            'b' => Some(Suit::Blue),
            'o' => Some(Suit::Orange),
            'k' => Some(Suit::Black),
            'j' => Some(Suit::Joker),
            _ => None,
        }
    }
}

/// A tile represented as a u8.
/// - Bits 0-1: Suit (00 = Red, 01 = Blue, 10 = Orange, 11 = Black)
/// - Bits 2-5: Rank (1-13)
/// - All 1s (0xFF): Joker
///
/// Tiles compare by value, so both physical copies of a (rank, suit) pair
/// are interchangeable. Numbered tiles order by rank, then suit; jokers sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tile(u8);

impl Tile {
    const SUIT_MASK: u8 = 0b0000_0011;
    const RANK_MASK: u8 = 0b0011_1100;
    const RANK_SHIFT: u8 = 2;
    const JOKER: u8 = 0xFF;

    /// Create a numbered tile.
    ///
    /// Panics on an out-of-range rank or on `Suit::Joker`: a malformed tile
    /// is a caller bug, not a game-rule rejection. Use [`Tile::try_new`] for
    /// untrusted input.
    pub fn new(suit: Suit, rank: u8) -> Self {
        match Self::try_new(suit, rank) {
            Ok(tile) => tile,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a tile, checking that rank and suit agree.
    ///
    /// A joker must carry [`JOKER_RANK`]; every other suit needs a rank in 1..=13.
    pub fn try_new(suit: Suit, rank: u8) -> Result<Self, TileError> {
        match suit.index() {
            None if rank == JOKER_RANK => Ok(Tile(Self::JOKER)),
            None => Err(TileError::JokerWithRank(rank)),
            Some(_) if !(1..=MAX_RANK).contains(&rank) => Err(TileError::RankOutOfRange(rank)),
            Some(index) => Ok(Tile((rank << Self::RANK_SHIFT) | index)),
        }
    }

    /// Create a joker tile
    pub fn joker() -> Self {
        Tile(Self::JOKER)
    }

    /// Check if this is a joker tile
    pub fn is_joker(&self) -> bool {
        self.0 == Self::JOKER
    }

    /// Get the suit, `Suit::Joker` for jokers
    pub fn suit(&self) -> Suit {
        if self.is_joker() {
            Suit::Joker
        } else {
            Suit::from_index(self.0 & Self::SUIT_MASK)
        }
    }

    /// Get the rank (1-13), or None for a joker
    pub fn number(&self) -> Option<u8> {
        if self.is_joker() {
            None
        } else {
            Some((self.0 & Self::RANK_MASK) >> Self::RANK_SHIFT)
        }
    }

    /// Rank including the joker sentinel.
    pub fn rank(&self) -> u8 {
        self.number().unwrap_or(JOKER_RANK)
    }

    /// Point value: the rank for numbered tiles, [`JOKER_VALUE`] for jokers.
    pub fn value(&self) -> u32 {
        self.number().map_or(JOKER_VALUE, u32::from)
    }

    /// True if this tile could sit directly after `other` in a run.
    pub fn can_extend(&self, other: &Tile) -> bool {
        if self.is_joker() || other.is_joker() {
            return true;
        }
        self.suit() == other.suit() && self.rank() == other.rank() + 1
    }

    /// True if the ranks match or either tile is a joker.
    pub fn same_rank(&self, other: &Tile) -> bool {
        self.is_joker() || other.is_joker() || self.rank() == other.rank()
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            None => write!(f, "{}", Suit::Joker.letter()),
            Some(rank) => write!(f, "{}{}", self.suit().letter(), rank),
        }
    }
}

/// Parses "r13" (red 13), "b1" (blue 1), "o7" (orange 7), "k9" (black 9), "j" (joker).
impl FromStr for Tile {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let letter = chars.next().ok_or_else(|| TileError::Unparsable(s.to_string()))?;
        let suit = Suit::from_letter(letter).ok_or_else(|| TileError::Unparsable(s.to_string()))?;
        let digits = chars.as_str();
        if suit == Suit::Joker {
            return if digits.is_empty() {
                Ok(Tile::joker())
            } else {
                Err(TileError::Unparsable(s.to_string()))
            };
        }
        let rank: u8 = digits
            .parse()
            .map_err(|_| TileError::Unparsable(s.to_string()))?;
        Tile::try_new(suit, rank)
    }
}

impl TryFrom<String> for Tile {
    type Error = TileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tile> for String {
    fn from(tile: Tile) -> Self {
        tile.to_string()
    }
}

/// The 106-tile standard pool, unshuffled.
pub fn standard_pool() -> Vec<Tile> {
    let mut tiles = Vec::with_capacity(POOL_SIZE);
    for suit in Suit::PLAYABLE {
        for rank in 1..=MAX_RANK {
            for _ in 0..COPIES_PER_TILE {
                tiles.push(Tile::new(suit, rank));
            }
        }
    }
    tiles.extend(std::iter::repeat_n(Tile::joker(), JOKERS_IN_POOL));
    tiles
}

/// Type of meld in Rummikub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeldType {
    /// A group: same number, different suits
    Group,
    /// A run: consecutive numbers, same suit
    Run,
}

/// An ordered set of tiles grouped together on the table.
///
/// The group/run kind is not stored; [`Meld::kind`] recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meld {
    tiles: Vec<Tile>,
}

impl Meld {
    /// Create a new meld
    pub fn new(tiles: Vec<Tile>) -> Self {
        Meld { tiles }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Group or run, or None if the tiles form neither.
    pub fn kind(&self) -> Option<MeldType> {
        rules::classify(&self.tiles).ok()
    }

    pub fn value(&self) -> u32 {
        self.tiles.iter().map(Tile::value).sum()
    }

    /// The meld's tiles as a counted multiset.
    pub fn counts(&self) -> Hand {
        Hand::from_tiles(self.tiles.iter().copied())
    }
}

impl From<Vec<Tile>> for Meld {
    fn from(tiles: Vec<Tile>) -> Self {
        Meld::new(tiles)
    }
}

impl fmt::Display for Meld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.tiles.iter().map(Tile::to_string).collect();
        write!(f, "[{}]", labels.join(" "))
    }
}

/// A counted multiset of tiles: a player's hand, the draw pile census,
/// or the solver's working pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Hand(BTreeMap<Tile, u8>);

impl Hand {
    /// Create a new empty hand
    pub fn new() -> Self {
        Hand(BTreeMap::new())
    }

    pub fn from_tiles(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut hand = Hand::new();
        for tile in tiles {
            hand.add(tile);
        }
        hand
    }

    /// Add a tile to the hand. Counts saturate at `u8::MAX`.
    pub fn add(&mut self, tile: Tile) {
        let count = self.0.entry(tile).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Remove one copy of a tile; false if none is held
    pub fn remove(&mut self, tile: &Tile) -> bool {
        if let Some(count) = self.0.get_mut(tile) {
            if *count > 0 {
                *count -= 1;
                if *count == 0 {
                    self.0.remove(tile);
                }
                return true;
            }
        }
        false
    }

    /// Get the count of a specific tile
    pub fn count(&self, tile: &Tile) -> u8 {
        self.0.get(tile).copied().unwrap_or(0)
    }

    /// True if every tile in `tiles` is held, counting duplicates.
    pub fn contains_all(&self, tiles: &[Tile]) -> bool {
        let wanted = Hand::from_tiles(tiles.iter().copied());
        wanted.iter().all(|(tile, &count)| self.count(tile) >= count)
    }

    /// Remove every tile in `tiles`, or nothing at all if any is missing.
    pub fn remove_all(&mut self, tiles: &[Tile]) -> bool {
        if !self.contains_all(tiles) {
            return false;
        }
        for tile in tiles {
            self.remove(tile);
        }
        true
    }

    /// Merge another multiset into this one.
    pub fn absorb(&mut self, other: &Hand) {
        for (tile, &count) in other.iter() {
            let held = self.0.entry(*tile).or_insert(0);
            *held = held.saturating_add(count);
        }
    }

    /// True if no tile is held more often than the standard pool has it.
    pub fn within_standard_pool(&self) -> bool {
        self.0.iter().all(|(tile, &count)| {
            let limit = if tile.is_joker() { JOKERS_IN_POOL } else { COPIES_PER_TILE };
            usize::from(count) <= limit
        })
    }

    /// Get an iterator over all tile types and their counts
    pub fn iter(&self) -> impl Iterator<Item = (&Tile, &u8)> {
        self.0.iter()
    }

    /// Every tile, with duplicates repeated, in ascending order.
    pub fn tiles(&self) -> Vec<Tile> {
        self.0
            .iter()
            .flat_map(|(tile, &count)| std::iter::repeat_n(*tile, usize::from(count)))
            .collect()
    }

    /// Lowest-ordered tile that is not a joker.
    pub fn first_numbered(&self) -> Option<Tile> {
        self.0.keys().copied().find(|tile| !tile.is_joker())
    }

    pub fn len(&self) -> usize {
        self.0.values().map(|&count| usize::from(count)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of tile values, jokers at [`JOKER_VALUE`].
    pub fn value(&self) -> u32 {
        self.0
            .iter()
            .map(|(tile, &count)| tile.value() * u32::from(count))
            .sum()
    }
}

/// The table state (all melds currently on the table)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table(Vec<Meld>);

impl Table {
    /// Create a new empty table
    pub fn new() -> Self {
        Table(Vec::new())
    }

    pub fn from_melds(melds: Vec<Meld>) -> Self {
        Table(melds)
    }

    /// Add a meld to the table
    pub fn add_meld(&mut self, meld: Meld) {
        self.0.push(meld);
    }

    /// Swap the meld at `index` for `meld`; false if the index is out of range
    pub fn replace_meld(&mut self, index: usize, meld: Meld) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = meld;
                true
            }
            None => false,
        }
    }

    /// Get all melds on the table
    pub fn melds(&self) -> &[Meld] {
        &self.0
    }

    /// Get the number of melds on the table
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every tile on the table as a counted multiset.
    pub fn counts(&self) -> Hand {
        Hand::from_tiles(self.0.iter().flat_map(|meld| meld.tiles().iter().copied()))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, meld) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{meld}")?;
        }
        Ok(())
    }
}

/// Parse a whitespace or comma separated tile list, e.g. `"r1 r2 j"`.
pub fn parse_tiles(input: &str) -> Result<Vec<Tile>, TileError> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}
