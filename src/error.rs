//! Error types for tiles, sets, and moves.
//!
//! Game-rule rejections are ordinary values: every failed move comes back as
//! a [`GameError`] and leaves the game untouched.

use derive_more::{Display, Error};

/// A rank/suit combination that cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TileError {
    #[display("rank {_0} is outside 1..=13")]
    RankOutOfRange(#[error(not(source))] u8),

    #[display("a joker cannot carry rank {_0}")]
    JokerWithRank(#[error(not(source))] u8),

    #[display("cannot parse tile {_0:?}")]
    Unparsable(#[error(not(source))] String),
}

/// Why tiles fail the group rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GroupFault {
    #[display("a group holds at most 4 tiles")]
    TooLarge,
    #[display("a group holds at most one joker")]
    TooManyJokers,
    #[display("a group needs at least one numbered tile")]
    NoAnchor,
    #[display("group tiles must share one rank")]
    MixedRanks,
    #[display("group tiles must have distinct suits")]
    RepeatedSuit,
}

/// Why tiles fail the run rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunFault {
    #[display("a run needs at least one numbered tile")]
    NoAnchor,
    #[display("run tiles must share one suit")]
    MixedSuits,
    #[display("a run cannot repeat a rank")]
    RepeatedRank,
    #[display("jokers must exactly fill the gaps of a run")]
    SpanMismatch,
}

/// Why a tile sequence is not a valid set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum SetError {
    #[display("set is empty")]
    Empty,

    #[display("set has {_0} tiles, at least 3 are required")]
    TooShort(#[error(not(source))] usize),

    #[display("not a group ({group}) and not a run ({run})")]
    Neither { group: GroupFault, run: RunFault },
}

/// Every reason the game can refuse a request.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GameError {
    #[display("not your turn")]
    NotYourTurn,

    #[display("unknown player {_0}")]
    UnknownPlayer(#[error(not(source))] usize),

    #[display("draw pile is empty")]
    EmptyDrawPile,

    #[display("you do not hold all of those tiles")]
    TilesNotOwned,

    #[display("tiles do not form a valid set: {_0}")]
    InvalidSet(SetError),

    #[display("initial meld is worth {value}, at least {threshold} is required")]
    BelowOpeningThreshold { value: u32, threshold: u32 },

    #[display("an initial meld must be played first")]
    InitialMeldRequired,

    #[display("there is no set {_0} on the table")]
    InvalidTargetSet(#[error(not(source))] usize),

    #[display("proposed table does not hold exactly the table tiles plus the played tiles")]
    ArrangementTileMismatch,

    #[display("proposed set {index} is invalid: {reason}")]
    InvalidArrangement {
        index: usize,
        #[error(source)]
        reason: SetError,
    },

    #[display("a game needs at least one player")]
    NoPlayers,

    #[display("player name {_0:?} is used twice")]
    DuplicatePlayerName(#[error(not(source))] String),

    #[display("pool is not a permutation of the standard 106 tiles")]
    NonStandardPool,

    #[display("no legal layout absorbs those tiles")]
    NoArrangement,

    #[display("cannot deal {needed} tiles from a pool of {available}")]
    NotEnoughTiles { needed: usize, available: usize },

    #[display("game has not started")]
    GameNotStarted,

    #[display("game has already started")]
    AlreadyStarted,

    #[display("game is finished")]
    GameFinished,

    #[display("game is not finished yet")]
    GameNotFinished,
}

impl From<SetError> for GameError {
    fn from(err: SetError) -> Self {
        GameError::InvalidSet(err)
    }
}
