//! Turn-based game state machine.
//!
//! A [`GameState`] moves through `NotStarted -> InProgress -> Finished`.
//! Every [`Move`] is validated against the current state without touching
//! it; only a move that passes every check is applied, in one step.

use crate::error::{GameError, SetError};
use crate::rules::{self, OPENING_THRESHOLD};
use crate::solver;
use crate::{Hand, Meld, Table, Tile, standard_pool};
use derive_more::{Display, From};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, instrument};

/// Tiles dealt to each player unless configured otherwise.
pub const DEFAULT_HAND_SIZE: usize = 14;

/// Stable player identifier: the player's seat, in turn order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[display("not started")]
    NotStarted,
    #[display("in progress")]
    InProgress,
    #[display("finished")]
    Finished,
}

/// Game setup knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tiles dealt to each player at the start
    pub hand_size: usize,
    /// Minimum value of each player's first meld
    pub opening_threshold: u32,
    /// Shuffle seed; fresh entropy when absent
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            hand_size: DEFAULT_HAND_SIZE,
            opening_threshold: OPENING_THRESHOLD,
            seed: None,
        }
    }
}

/// A seat at the table: identity, private tiles, and whether the player has opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    name: String,
    hand: Hand,
    has_opened: bool,
}

impl Player {
    fn new(id: PlayerId, name: String) -> Self {
        Player {
            id,
            name,
            hand: Hand::new(),
            has_opened: false,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    pub fn has_opened(&self) -> bool {
        self.has_opened
    }

    pub fn tile_count(&self) -> usize {
        self.hand.len()
    }

    /// Penalty value of the tiles still held.
    pub fn hand_value(&self) -> u32 {
        self.hand.value()
    }
}

/// A request from the current player. Each kind carries exactly what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Move {
    /// Take the top tile of the draw pile.
    Draw { player: PlayerId },
    /// Lay a new set from the hand.
    PlayNewSet { player: PlayerId, tiles: Vec<Tile> },
    /// Add hand tiles to the set at `target`.
    AddToSet {
        player: PlayerId,
        target: usize,
        tiles: Vec<Tile>,
    },
    /// Replace the whole table with `layout`, which must hold exactly the
    /// current table tiles plus `tiles` from the hand.
    RearrangeTable {
        player: PlayerId,
        tiles: Vec<Tile>,
        layout: Vec<Meld>,
    },
}

impl Move {
    pub fn player(&self) -> PlayerId {
        match self {
            Move::Draw { player }
            | Move::PlayNewSet { player, .. }
            | Move::AddToSet { player, .. }
            | Move::RearrangeTable { player, .. } => *player,
        }
    }

    /// Tiles leaving the mover's hand.
    pub fn played_tiles(&self) -> &[Tile] {
        match self {
            Move::Draw { .. } => &[],
            Move::PlayNewSet { tiles, .. }
            | Move::AddToSet { tiles, .. }
            | Move::RearrangeTable { tiles, .. } => tiles,
        }
    }
}

/// What a committed move led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Play passes to `next` on turn `turn`.
    Continue { next: PlayerId, turn: u32 },
    /// The mover emptied their hand.
    Won { winner: PlayerId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub name: String,
    pub tile_count: usize,
    pub has_opened: bool,
    pub hand_value: u32,
}

/// Snapshot for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    pub phase: GamePhase,
    pub turn_number: u32,
    pub current_player: String,
    pub draw_pile_size: usize,
    pub table_sets: usize,
    pub players: Vec<PlayerStatus>,
    pub winner: Option<String>,
}

/// The aggregate root: players, draw pile, table, and turn order.
#[derive(Debug, Clone)]
pub struct GameState {
    config: GameConfig,
    phase: GamePhase,
    players: Vec<Player>,
    current: usize,
    draw_pile: VecDeque<Tile>,
    table: Table,
    turn: u32,
    seed: Option<u64>,
    last_move: Option<Move>,
    winner: Option<PlayerId>,
}

impl GameState {
    /// Seat the players. Nothing is dealt until [`GameState::start`].
    pub fn new<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        config: GameConfig,
    ) -> Result<Self, GameError> {
        let mut players: Vec<Player> = Vec::new();
        for (seat, name) in names.into_iter().enumerate() {
            let name = name.into();
            if players.iter().any(|p| p.name == name) {
                return Err(GameError::DuplicatePlayerName(name));
            }
            players.push(Player::new(PlayerId(seat), name));
        }
        if players.is_empty() {
            return Err(GameError::NoPlayers);
        }

        Ok(GameState {
            config,
            phase: GamePhase::NotStarted,
            players,
            current: 0,
            draw_pile: VecDeque::new(),
            table: Table::new(),
            turn: 0,
            seed: None,
            last_move: None,
            winner: None,
        })
    }

    /// Seat the players and deal straight away.
    pub fn start_new<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        config: GameConfig,
    ) -> Result<Self, GameError> {
        let mut state = GameState::new(names, config)?;
        state.start()?;
        Ok(state)
    }

    /// Shuffle a fresh standard pool and deal.
    #[instrument(skip(self), fields(players = self.players.len()))]
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::NotStarted {
            return Err(GameError::AlreadyStarted);
        }
        let seed = self.config.seed.unwrap_or_else(fresh_seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pool = standard_pool();
        pool.shuffle(&mut rng);
        self.deal(pool)?;
        self.seed = Some(seed);
        Ok(())
    }

    /// Deal from a caller-ordered standard pool: player 0 takes the first
    /// `hand_size` tiles, player 1 the next, and so on; the rest is the draw
    /// pile, drawn from the front.
    ///
    /// Fails with `NonStandardPool` if `pool` is not a permutation of the
    /// standard pool.
    #[instrument(skip_all, fields(players = self.players.len()))]
    pub fn start_with_pool(&mut self, pool: Vec<Tile>) -> Result<(), GameError> {
        if self.phase != GamePhase::NotStarted {
            return Err(GameError::AlreadyStarted);
        }
        if Hand::from_tiles(pool.iter().copied()) != Hand::from_tiles(standard_pool()) {
            return Err(GameError::NonStandardPool);
        }
        self.deal(pool)
    }

    fn deal(&mut self, pool: Vec<Tile>) -> Result<(), GameError> {
        let needed = self.players.len() * self.config.hand_size;
        if needed > pool.len() {
            return Err(GameError::NotEnoughTiles {
                needed,
                available: pool.len(),
            });
        }

        let mut pile: VecDeque<Tile> = pool.into();
        for player in &mut self.players {
            for tile in pile.drain(..self.config.hand_size) {
                player.hand.add(tile);
            }
        }
        self.draw_pile = pile;
        self.phase = GamePhase::InProgress;
        self.turn = 1;
        self.current = 0;
        info!(
            hand_size = self.config.hand_size,
            draw_pile = self.draw_pile.len(),
            "game started"
        );
        Ok(())
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Seed the shuffle used, once started by [`GameState::start`].
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0)
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.current]
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn draw_pile_len(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn last_move(&self) -> Option<&Move> {
        self.last_move.as_ref()
    }

    pub fn winner(&self) -> Option<&Player> {
        self.winner.and_then(|id| self.player(id))
    }

    /// Every tile in the game, wherever it is.
    pub fn tile_census(&self) -> Hand {
        let mut census = Hand::from_tiles(self.draw_pile.iter().copied());
        for player in &self.players {
            census.absorb(&player.hand);
        }
        census.absorb(&self.table.counts());
        census
    }

    fn ensure_in_progress(&self) -> Result<(), GameError> {
        match self.phase {
            GamePhase::NotStarted => Err(GameError::GameNotStarted),
            GamePhase::Finished => Err(GameError::GameFinished),
            GamePhase::InProgress => Ok(()),
        }
    }

    /// The mover, provided it is their turn.
    fn mover(&self, id: PlayerId) -> Result<&Player, GameError> {
        self.ensure_in_progress()?;
        let player = self
            .players
            .get(id.0)
            .ok_or(GameError::UnknownPlayer(id.0))?;
        if id.0 != self.current {
            return Err(GameError::NotYourTurn);
        }
        Ok(player)
    }

    fn owned(player: &Player, tiles: &[Tile]) -> Result<(), GameError> {
        if player.hand.contains_all(tiles) {
            Ok(())
        } else {
            Err(GameError::TilesNotOwned)
        }
    }

    fn opened(player: &Player) -> Result<(), GameError> {
        if player.has_opened {
            Ok(())
        } else {
            Err(GameError::InitialMeldRequired)
        }
    }

    /// Check a move against the current state without changing anything.
    pub fn validate(&self, mv: &Move) -> Result<(), GameError> {
        let player = self.mover(mv.player())?;

        match mv {
            Move::Draw { .. } => {
                if self.draw_pile.is_empty() {
                    return Err(GameError::EmptyDrawPile);
                }
            }
            Move::PlayNewSet { tiles, .. } => {
                Self::owned(player, tiles)?;
                rules::classify(tiles)?;
                let threshold = self.config.opening_threshold;
                if !player.has_opened && !rules::meets_opening_threshold(tiles, threshold) {
                    return Err(GameError::BelowOpeningThreshold {
                        value: rules::tiles_value(tiles),
                        threshold,
                    });
                }
            }
            Move::AddToSet { target, tiles, .. } => {
                Self::opened(player)?;
                if tiles.is_empty() {
                    return Err(GameError::InvalidSet(SetError::Empty));
                }
                Self::owned(player, tiles)?;
                let set = self
                    .table
                    .melds()
                    .get(*target)
                    .ok_or(GameError::InvalidTargetSet(*target))?;
                rules::extend(set.tiles(), tiles)?;
            }
            Move::RearrangeTable { tiles, layout, .. } => {
                Self::opened(player)?;
                if tiles.is_empty() {
                    return Err(GameError::InvalidSet(SetError::Empty));
                }
                Self::owned(player, tiles)?;
                let mut expected = self.table.counts();
                expected.absorb(&Hand::from_tiles(tiles.iter().copied()));
                let proposed = Table::from_melds(layout.clone()).counts();
                if proposed != expected {
                    return Err(GameError::ArrangementTileMismatch);
                }
                rules::validate_table(layout)?;
            }
        }
        Ok(())
    }

    /// Validate and, if legal, apply a move.
    ///
    /// On error nothing has changed. On success the move is recorded and
    /// either the turn passes on or, if the mover's hand is empty, the game
    /// finishes with the mover as winner.
    #[instrument(skip(self, mv), fields(player = %mv.player(), turn = self.turn))]
    pub fn submit(&mut self, mv: Move) -> Result<MoveOutcome, GameError> {
        if let Err(err) = self.validate(&mv) {
            debug!(%err, "move rejected");
            return Err(err);
        }

        let seat = mv.player().0;
        match &mv {
            Move::Draw { .. } => {
                if let Some(tile) = self.draw_pile.pop_front() {
                    self.players[seat].hand.add(tile);
                }
            }
            Move::PlayNewSet { tiles, .. } => {
                let player = &mut self.players[seat];
                player.hand.remove_all(tiles);
                player.has_opened = true;
                self.table.add_meld(Meld::new(rules::arrange(tiles)));
            }
            Move::AddToSet { target, tiles, .. } => {
                let extended = rules::extend(self.table.melds()[*target].tiles(), tiles)?;
                self.players[seat].hand.remove_all(tiles);
                self.table.replace_meld(*target, Meld::new(extended));
            }
            Move::RearrangeTable { tiles, layout, .. } => {
                self.players[seat].hand.remove_all(tiles);
                self.table = Table::from_melds(layout.clone());
            }
        }
        info!(kind = move_kind(&mv), tiles = mv.played_tiles().len(), "move applied");
        self.last_move = Some(mv);

        if self.players[seat].hand.is_empty() {
            self.phase = GamePhase::Finished;
            self.winner = Some(PlayerId(seat));
            info!(winner = %self.players[seat].name, "game finished");
            return Ok(MoveOutcome::Won {
                winner: PlayerId(seat),
            });
        }

        self.current = (self.current + 1) % self.players.len();
        self.turn += 1;
        Ok(MoveOutcome::Continue {
            next: PlayerId(self.current),
            turn: self.turn,
        })
    }

    /// Moves always open to `player`: drawing, while the pile lasts.
    ///
    /// Set plays are not enumerated; [`GameState::suggest_arrangement`]
    /// searches for those on request.
    pub fn valid_moves(&self, player: PlayerId) -> Vec<Move> {
        let draw = Move::Draw { player };
        if self.validate(&draw).is_ok() {
            vec![draw]
        } else {
            Vec::new()
        }
    }

    /// Search for a table layout that absorbs `tiles` from `player`'s hand.
    ///
    /// Pure: the returned layout can be submitted as a
    /// [`Move::RearrangeTable`].
    #[instrument(skip(self, tiles), fields(tiles = tiles.len()))]
    pub fn suggest_arrangement(&self, player: PlayerId, tiles: &[Tile]) -> Result<Vec<Meld>, GameError> {
        let mover = self.mover(player)?;
        Self::opened(mover)?;
        if tiles.is_empty() {
            return Err(GameError::InvalidSet(SetError::Empty));
        }
        Self::owned(mover, tiles)?;
        solver::rearrange(&self.table, tiles)
            .map(|found| found.table.melds().to_vec())
            .ok_or(GameError::NoArrangement)
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            phase: self.phase,
            turn_number: self.turn,
            current_player: self.current_player().name.clone(),
            draw_pile_size: self.draw_pile.len(),
            table_sets: self.table.len(),
            players: self
                .players
                .iter()
                .map(|p| PlayerStatus {
                    name: p.name.clone(),
                    tile_count: p.tile_count(),
                    has_opened: p.has_opened,
                    hand_value: p.hand_value(),
                })
                .collect(),
            winner: self.winner().map(|p| p.name.clone()),
        }
    }

    /// Final penalties: 0 for the winner, remaining hand value for everyone else.
    pub fn scores(&self) -> Result<BTreeMap<String, u32>, GameError> {
        if self.phase != GamePhase::Finished {
            return Err(GameError::GameNotFinished);
        }
        Ok(self
            .players
            .iter()
            .map(|p| {
                let score = if Some(p.id) == self.winner { 0 } else { p.hand_value() };
                (p.name.clone(), score)
            })
            .collect())
    }
}

fn move_kind(mv: &Move) -> &'static str {
    match mv {
        Move::Draw { .. } => "draw",
        Move::PlayNewSet { .. } => "play_new_set",
        Move::AddToSet { .. } => "add_to_set",
        Move::RearrangeTable { .. } => "rearrange_table",
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn fresh_seed() -> u64 {
    rand::random()
}

#[cfg(target_arch = "wasm32")]
fn fresh_seed() -> u64 {
    (js_sys::Math::random() * u64::MAX as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Suit, parse_tiles};

    fn t(input: &str) -> Vec<Tile> {
        parse_tiles(input).unwrap()
    }

    /// Deal `hands` first, in seat order, then the rest of the standard pool.
    fn rigged(hands: &[&str], pile_front: &str) -> GameState {
        let config = GameConfig {
            hand_size: t(hands[0]).len(),
            ..GameConfig::default()
        };
        let names: Vec<String> = (0..hands.len()).map(|i| format!("p{i}")).collect();
        let mut state = GameState::new(names, config).unwrap();

        let mut rest = Hand::from_tiles(standard_pool());
        let mut order = Vec::new();
        for hand in hands.iter().copied().chain([pile_front]) {
            for tile in t(hand) {
                assert!(rest.remove(&tile));
                order.push(tile);
            }
        }
        order.extend(rest.tiles());
        state.start_with_pool(order).unwrap();
        state
    }

    fn opened(state: &mut GameState, seat: usize) {
        state.players[seat].has_opened = true;
    }

    #[test]
    fn test_new_game_is_not_started() {
        let state = GameState::new(["Alice", "Bob"], GameConfig::default()).unwrap();
        assert_eq!(state.phase(), GamePhase::NotStarted);
        assert_eq!(state.players().len(), 2);
        assert_eq!(state.players()[1].name(), "Bob");
        assert!(state.table().is_empty());
        assert_eq!(
            state.validate(&Move::Draw { player: PlayerId(0) }),
            Err(GameError::GameNotStarted)
        );
    }

    #[test]
    fn test_setup_errors() {
        let none: [&str; 0] = [];
        assert_eq!(GameState::new(none, GameConfig::default()).unwrap_err(), GameError::NoPlayers);
        assert_eq!(
            GameState::new(["A", "A"], GameConfig::default()).unwrap_err(),
            GameError::DuplicatePlayerName("A".to_string())
        );
        let config = GameConfig {
            hand_size: 60,
            seed: Some(1),
            ..GameConfig::default()
        };
        assert_eq!(
            GameState::start_new(["A", "B"], config).unwrap_err(),
            GameError::NotEnoughTiles {
                needed: 120,
                available: 106
            }
        );
    }

    #[test]
    fn test_start_deals_and_cannot_restart() {
        let config = GameConfig {
            hand_size: 5,
            seed: Some(42),
            ..GameConfig::default()
        };
        let mut state = GameState::start_new(["Alice", "Bob"], config).unwrap();

        assert_eq!(state.phase(), GamePhase::InProgress);
        assert_eq!(state.turn(), 1);
        assert_eq!(state.players()[0].tile_count(), 5);
        assert_eq!(state.players()[1].tile_count(), 5);
        assert_eq!(state.draw_pile_len(), 106 - 10);
        assert_eq!(state.seed(), Some(42));
        assert_eq!(state.start(), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn test_same_seed_same_deal() {
        let config = GameConfig {
            seed: Some(7),
            ..GameConfig::default()
        };
        let a = GameState::start_new(["A", "B"], config.clone()).unwrap();
        let b = GameState::start_new(["A", "B"], config).unwrap();
        assert_eq!(a.players()[0].hand(), b.players()[0].hand());
        assert_eq!(a.draw_pile, b.draw_pile);
    }

    #[test]
    fn test_start_with_pool_rejects_foreign_tiles() {
        let mut state = GameState::new(["A"], GameConfig::default()).unwrap();
        let mut pool = standard_pool();
        pool[0] = Tile::joker();
        assert_eq!(state.start_with_pool(pool), Err(GameError::NonStandardPool));
        assert_eq!(state.phase(), GamePhase::NotStarted);
    }

    #[test]
    fn test_draw_moves_tile_and_advances() {
        let mut state = rigged(&["r1 r2", "b1 b2"], "k13");
        let outcome = state.submit(Move::Draw { player: PlayerId(0) }).unwrap();

        assert_eq!(outcome, MoveOutcome::Continue { next: PlayerId(1), turn: 2 });
        assert_eq!(state.players()[0].hand().count(&Tile::new(Suit::Black, 13)), 1);
        assert_eq!(state.draw_pile_len(), 106 - 5);
        assert_eq!(state.last_move(), Some(&Move::Draw { player: PlayerId(0) }));
    }

    #[test]
    fn test_turn_enforcement() {
        let mut state = rigged(&["r1 r2", "b1 b2"], "");
        let before = state.clone();
        assert_eq!(
            state.submit(Move::Draw { player: PlayerId(1) }),
            Err(GameError::NotYourTurn)
        );
        assert_eq!(
            state.submit(Move::Draw { player: PlayerId(9) }),
            Err(GameError::UnknownPlayer(9))
        );
        assert_eq!(state.players, before.players);
        assert_eq!(state.draw_pile, before.draw_pile);
        assert_eq!(state.turn(), 1);
    }

    #[test]
    fn test_empty_draw_pile() {
        let mut state = rigged(&["r1 r2", "b1 b2"], "");
        state.draw_pile.clear();
        assert_eq!(
            state.submit(Move::Draw { player: PlayerId(0) }),
            Err(GameError::EmptyDrawPile)
        );
        assert!(state.valid_moves(PlayerId(0)).is_empty());
    }

    #[test]
    fn test_opening_threshold_exactly_thirty() {
        let mut state = rigged(&["r9 r10 r11 b1", "o1 o2 o3 o4"], "");
        let mv = Move::PlayNewSet {
            player: PlayerId(0),
            tiles: t("r9 r10 r11"),
        };
        state.submit(mv).unwrap();
        assert!(state.players()[0].has_opened());
        assert_eq!(state.table().melds(), &[Meld::new(t("r9 r10 r11"))]);
    }

    #[test]
    fn test_opening_below_threshold_rejected() {
        let mut state = rigged(&["r8 r10 r11 r9", "o1 o2 o3 o4"], "");
        let mv = Move::PlayNewSet {
            player: PlayerId(0),
            tiles: t("r8 r9 r10"),
        };
        assert_eq!(
            state.submit(mv),
            Err(GameError::BelowOpeningThreshold { value: 27, threshold: 30 })
        );
        assert!(state.table().is_empty());
        assert_eq!(state.players()[0].tile_count(), 4);
    }

    #[test]
    fn test_joker_counts_thirty_toward_opening() {
        let mut state = rigged(&["r1 j r3 b1", "o1 o2 o3 o4"], "");
        let mv = Move::PlayNewSet {
            player: PlayerId(0),
            tiles: t("r1 j r3"),
        };
        assert!(state.submit(mv).is_ok());
    }

    #[test]
    fn test_play_needs_owned_tiles_with_duplicates() {
        let mut state = rigged(&["r10 b10 k10 o12", "o1 o2 o3 o4"], "");
        let mv = Move::PlayNewSet {
            player: PlayerId(0),
            tiles: t("r10 r10 b10"),
        };
        assert_eq!(state.submit(mv), Err(GameError::TilesNotOwned));
    }

    #[test]
    fn test_play_invalid_set() {
        let mut state = rigged(&["r10 b11 k12 o12", "o1 o2 o3 o4"], "");
        let mv = Move::PlayNewSet {
            player: PlayerId(0),
            tiles: t("r10 b11 k12"),
        };
        assert!(matches!(state.submit(mv), Err(GameError::InvalidSet(_))));
    }

    #[test]
    fn test_add_to_set_requires_opening_and_target() {
        let mut state = rigged(&["r10 b10 k10 o10 r11", "o1 o2 o3 o4 o5"], "");
        state.table.add_meld(Meld::new(t("k1 k2 k3")));

        let add = |target| Move::AddToSet {
            player: PlayerId(0),
            target,
            tiles: t("o10"),
        };
        assert_eq!(state.validate(&add(0)), Err(GameError::InitialMeldRequired));

        opened(&mut state, 0);
        assert_eq!(state.validate(&add(5)), Err(GameError::InvalidTargetSet(5)));
        assert!(matches!(state.validate(&add(0)), Err(GameError::InvalidSet(_))));
    }

    #[test]
    fn test_add_to_set_extends_run_in_order() {
        let mut state = rigged(&["k4 b2 b3", "o1 o2 o3"], "");
        state.table.add_meld(Meld::new(t("k5 k6 k7")));
        opened(&mut state, 0);

        state
            .submit(Move::AddToSet {
                player: PlayerId(0),
                target: 0,
                tiles: t("k4"),
            })
            .unwrap();
        assert_eq!(state.table().melds()[0], Meld::new(t("k4 k5 k6 k7")));
        assert_eq!(state.players()[0].tile_count(), 2);
    }

    #[test]
    fn test_rearrange_table() {
        let mut state = rigged(&["b4 k4 o9", "o1 o2 o3"], "");
        state.table.add_meld(Meld::new(t("r1 r2 r3 r4 r5 r6 r7")));
        opened(&mut state, 0);

        let layout = vec![
            Meld::new(t("r1 r2 r3")),
            Meld::new(t("r4 b4 k4")),
            Meld::new(t("r5 r6 r7")),
        ];
        let mismatch = Move::RearrangeTable {
            player: PlayerId(0),
            tiles: t("b4"),
            layout: layout.clone(),
        };
        assert_eq!(state.validate(&mismatch), Err(GameError::ArrangementTileMismatch));

        let bad_layout = vec![Meld::new(t("r1 r2 r3 r4 b4 k4")), Meld::new(t("r5 r6 r7"))];
        let invalid = Move::RearrangeTable {
            player: PlayerId(0),
            tiles: t("b4 k4"),
            layout: bad_layout,
        };
        assert!(matches!(
            state.validate(&invalid),
            Err(GameError::InvalidArrangement { index: 0, .. })
        ));

        let good = Move::RearrangeTable {
            player: PlayerId(0),
            tiles: t("b4 k4"),
            layout: layout.clone(),
        };
        state.submit(good).unwrap();
        assert_eq!(state.table().melds(), layout.as_slice());
        assert_eq!(state.players()[0].hand().tiles(), t("o9"));
    }

    #[test]
    fn test_suggest_arrangement_feeds_rearrange_move() {
        let mut state = rigged(&["b4 k4 o9", "o1 o2 o3"], "");
        state.table.add_meld(Meld::new(t("r1 r2 r3 r4 r5 r6 r7")));
        opened(&mut state, 0);

        let layout = state.suggest_arrangement(PlayerId(0), &t("b4 k4")).unwrap();
        let mv = Move::RearrangeTable {
            player: PlayerId(0),
            tiles: t("b4 k4"),
            layout,
        };
        assert!(state.submit(mv).is_ok());
        assert_eq!(state.table().len(), 3);
    }

    #[test]
    fn test_suggest_arrangement_without_layout() {
        let mut state = rigged(&["b4 k4 o9", "o1 o2 o3"], "");
        state.table.add_meld(Meld::new(t("r1 r2 r3")));
        assert_eq!(
            state.suggest_arrangement(PlayerId(0), &t("o9")),
            Err(GameError::InitialMeldRequired)
        );
        opened(&mut state, 0);
        assert_eq!(
            state.suggest_arrangement(PlayerId(0), &t("o9")),
            Err(GameError::NoArrangement)
        );
        assert_eq!(
            state.suggest_arrangement(PlayerId(1), &t("o1")),
            Err(GameError::NotYourTurn)
        );
    }

    #[test]
    fn test_winning_move_finishes_game() {
        let mut state = rigged(&["r10 b10 k10", "o1 o2 o13"], "");
        let outcome = state
            .submit(Move::PlayNewSet {
                player: PlayerId(0),
                tiles: t("r10 b10 k10"),
            })
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Won { winner: PlayerId(0) });
        assert_eq!(state.phase(), GamePhase::Finished);
        assert_eq!(state.winner().map(Player::name), Some("p0"));
        assert_eq!(state.turn(), 1);

        let scores = state.scores().unwrap();
        assert_eq!(scores["p0"], 0);
        assert_eq!(scores["p1"], 16);

        assert_eq!(
            state.submit(Move::Draw { player: PlayerId(1) }),
            Err(GameError::GameFinished)
        );
    }

    #[test]
    fn test_scores_before_finish() {
        let state = rigged(&["r1", "b1"], "");
        assert_eq!(state.scores(), Err(GameError::GameNotFinished));
    }

    #[test]
    fn test_status_snapshot() {
        let state = rigged(&["r1 j", "b1 b2"], "");
        let status = state.status();
        assert_eq!(status.phase, GamePhase::InProgress);
        assert_eq!(status.current_player, "p0");
        assert_eq!(status.draw_pile_size, 102);
        assert_eq!(status.players[0].hand_value, 31);
        assert!(!status.players[0].has_opened);
        assert_eq!(status.winner, None);
    }

    #[test]
    fn test_census_is_standard_pool_after_moves() {
        let mut state = rigged(&["r10 b10 k10 o1", "o2 o3 o4 o5"], "");
        let pool = Hand::from_tiles(standard_pool());
        state
            .submit(Move::PlayNewSet {
                player: PlayerId(0),
                tiles: t("r10 b10 k10"),
            })
            .unwrap();
        assert_eq!(state.tile_census(), pool);
        state.submit(Move::Draw { player: PlayerId(1) }).unwrap();
        assert_eq!(state.tile_census(), pool);
    }
}
