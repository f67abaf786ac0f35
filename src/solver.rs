//! Partition solver for table rearrangements.
//!
//! A pool is partitioned by sweeping the ranks from 1 to 13. At each rank
//! every tile extends a run still open in its suit, starts a new run, or
//! joins a group of that rank; jokers extend a run or take one group slot.
//! An open run only matters through its suit, its length (1, 2 or 3+) and
//! whether it ends on a joker, so the sweep state stays small and states
//! that lead nowhere are remembered. Over the standard pool this search is
//! complete and its cost is polynomial in the pool size.

use crate::rules::{self, MAX_GROUP_SIZE, MIN_SET_SIZE};
use crate::{Hand, MAX_RANK, Meld, Suit, Table, Tile};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Outcome of a successful rearrangement search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rearrangement {
    /// The new layout, covering every table tile plus the added tiles
    pub table: Table,
    /// Number of original sets carried over unchanged
    pub preserved: usize,
    /// Number of search states expanded
    pub explored: usize,
}

/// Enumerate every valid set that could be formed from `pool`.
///
/// Each set is listed once per distinct tile combination, longest first.
/// Duplicate physical copies are handled by the caller's counts, not by
/// repeating candidates.
pub fn candidate_melds(pool: &Hand) -> Vec<Meld> {
    let mut melds = Vec::new();

    // Generate runs for each suit
    for suit in Suit::PLAYABLE {
        generate_runs_for_suit(pool, suit, &mut melds);
    }

    // Generate groups for each number
    for number in 1..=MAX_RANK {
        generate_groups_for_number(pool, number, &mut melds);
    }

    melds.sort_by(|a, b| b.len().cmp(&a.len()));
    melds
}

/// Partition the whole pool into valid sets, or None if no partition exists.
///
/// Pools holding more copies of a tile than the standard pool are never
/// partitioned.
pub fn partition(pool: &Hand) -> Option<Vec<Meld>> {
    RankSearch::new(pool)?.run()
}

/// Find a layout for the current table plus `additions`.
///
/// The existing sets are kept as they are and only the remaining tiles are
/// partitioned. If that fails, each set in turn is released back into the
/// pool; then, as a last resort, the whole pool is partitioned. The result is
/// realigned so that surviving and extended sets stay in their original slots.
#[instrument(skip_all, fields(sets = table.len(), additions = additions.len()))]
pub fn rearrange(table: &Table, additions: &[Tile]) -> Option<Rearrangement> {
    let mut pool = table.counts();
    for tile in additions {
        pool.add(*tile);
    }
    if !pool.within_standard_pool() {
        debug!("more copies than the standard pool holds");
        return None;
    }

    let originals = table.melds();
    let mut explored = 0;
    let passes = std::iter::once(None).chain((0..originals.len()).map(Some));
    for released in passes {
        let mut remaining = pool.clone();
        let mut kept = Vec::new();
        for (index, meld) in originals.iter().enumerate() {
            if Some(index) != released
                && rules::is_valid_set(meld.tiles())
                && remaining.remove_all(meld.tiles())
            {
                kept.push(meld.clone());
            }
        }

        let mut search = RankSearch::new(&remaining)?;
        let filled = search.run();
        explored += search.explored;
        if let Some(filled) = filled {
            kept.extend(filled);
            let (table, preserved) = realign(originals, kept);
            debug!(?released, preserved, explored, "filled around kept sets");
            return Some(Rearrangement {
                table,
                preserved,
                explored,
            });
        }
    }
    if originals.len() < 2 {
        debug!(explored, "no partition of table and additions");
        return None;
    }

    let mut search = RankSearch::new(&pool)?;
    let found = search.run();
    explored += search.explored;
    let Some(found) = found else {
        debug!(explored, "no partition of table and additions");
        return None;
    };

    let (table, preserved) = realign(originals, found);
    debug!(preserved, explored, "rearranged from scratch");
    Some(Rearrangement {
        table,
        preserved,
        explored,
    })
}

/// Order `found` sets to follow `originals`: exact survivors and then
/// extensions take the slot of the set they came from, the rest follow.
fn realign(originals: &[Meld], found: Vec<Meld>) -> (Table, usize) {
    let mut unclaimed: Vec<Option<Meld>> = found.into_iter().map(Some).collect();
    let mut slots: Vec<Option<Meld>> = vec![None; originals.len()];
    let mut preserved = 0;

    for (slot, original) in slots.iter_mut().zip(originals) {
        let counts = original.counts();
        let exact = unclaimed
            .iter_mut()
            .find(|meld| meld.as_ref().is_some_and(|m| m.counts() == counts));
        if let Some(entry) = exact {
            *entry = None;
            *slot = Some(original.clone());
            preserved += 1;
        }
    }

    for (slot, original) in slots.iter_mut().zip(originals) {
        if slot.is_some() {
            continue;
        }
        let superset = unclaimed.iter_mut().find(|meld| {
            meld.as_ref()
                .is_some_and(|m| m.counts().contains_all(original.tiles()))
        });
        if let Some(meld) = superset.and_then(Option::take) {
            let mut extras = meld.counts();
            extras.remove_all(original.tiles());
            let mut tiles = original.tiles().to_vec();
            tiles.extend(extras.tiles());
            *slot = Some(Meld::new(rules::arrange(&tiles)));
        }
    }

    let mut melds: Vec<Meld> = slots.into_iter().flatten().collect();
    melds.extend(
        unclaimed
            .into_iter()
            .flatten()
            .map(|meld| Meld::new(rules::arrange(meld.tiles()))),
    );
    (Table::from_melds(melds), preserved)
}

const SUITS: usize = Suit::PLAYABLE.len();

/// What the sweep needs to know about an open run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct RunShape {
    /// Tiles so far, capped at the minimum set size
    len: u8,
    /// Ends on a joker, so it has to go on
    joker_last: bool,
}

impl RunShape {
    const STARTED: RunShape = RunShape {
        len: 1,
        joker_last: false,
    };

    fn can_close(self) -> bool {
        usize::from(self.len) >= MIN_SET_SIZE && !self.joker_last
    }

    fn extended(self, joker: bool) -> RunShape {
        RunShape {
            len: (self.len + 1).min(MIN_SET_SIZE as u8),
            joker_last: joker,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenRun {
    suit: usize,
    shape: RunShape,
    tiles: Vec<Tile>,
}

/// What happens to one open run at the current rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Tile,
    Joker,
    Close,
}

/// One way to spend a suit's tiles at the current rank.
#[derive(Debug, Clone)]
struct SuitPlan {
    /// One step per open run of the suit, in sweep order
    steps: Vec<Step>,
    new_runs: u8,
    to_groups: u8,
    jokers: u8,
}

/// Rank, sorted open-run shapes, jokers left.
type SweepKey = (u8, Vec<(usize, RunShape)>, u8);

/// Rank-by-rank sweep with a dead-state memo.
struct RankSearch {
    counts: [[u8; MAX_RANK as usize]; SUITS],
    jokers: u8,
    dead_ends: HashSet<SweepKey>,
    explored: usize,
}

impl RankSearch {
    fn new(pool: &Hand) -> Option<Self> {
        if !pool.within_standard_pool() {
            return None;
        }
        let mut counts = [[0; MAX_RANK as usize]; SUITS];
        let mut jokers = 0;
        for (tile, &count) in pool.iter() {
            match (tile.suit().index(), tile.number()) {
                (Some(suit), Some(rank)) => {
                    counts[usize::from(suit)][usize::from(rank - 1)] = count;
                }
                _ => jokers = count,
            }
        }
        Some(RankSearch {
            counts,
            jokers,
            dead_ends: HashSet::new(),
            explored: 0,
        })
    }

    fn run(&mut self) -> Option<Vec<Meld>> {
        let mut melds = Vec::new();
        if self.sweep(1, Vec::new(), self.jokers, &mut melds) {
            Some(melds)
        } else {
            None
        }
    }

    fn sweep(
        &mut self,
        rank: u8,
        open: Vec<OpenRun>,
        jokers: u8,
        melds: &mut Vec<Meld>,
    ) -> bool {
        if rank > MAX_RANK {
            if jokers > 0 || open.iter().any(|run| !run.shape.can_close()) {
                return false;
            }
            melds.extend(open.into_iter().map(|run| Meld::new(run.tiles)));
            return true;
        }

        let mut shapes: Vec<(usize, RunShape)> =
            open.iter().map(|run| (run.suit, run.shape)).collect();
        shapes.sort();
        let key = (rank, shapes, jokers);
        if self.dead_ends.contains(&key) {
            return false;
        }
        self.explored += 1;

        let plans: Vec<Vec<SuitPlan>> = (0..SUITS)
            .map(|suit| {
                let runs: Vec<RunShape> = open
                    .iter()
                    .filter(|run| run.suit == suit)
                    .map(|run| run.shape)
                    .collect();
                let tiles = self.counts[suit][usize::from(rank - 1)];
                suit_plans(&runs, tiles, rank, jokers)
            })
            .collect();
        if plans.iter().any(Vec::is_empty) {
            self.dead_ends.insert(key);
            return false;
        }

        // Odometer over one plan per suit.
        let mut choice = [0usize; SUITS];
        loop {
            let chosen: [&SuitPlan; SUITS] =
                std::array::from_fn(|suit| &plans[suit][choice[suit]]);
            let run_jokers: u8 = chosen.iter().map(|plan| plan.jokers).sum();
            if run_jokers <= jokers {
                let spare = std::array::from_fn(|suit| chosen[suit].to_groups);
                for (group_jokers, groups) in group_layouts(rank, spare, jokers - run_jokers) {
                    let mark = melds.len();
                    let next = advance(rank, &open, &chosen, melds);
                    melds.extend(groups);
                    if self.sweep(rank + 1, next, jokers - run_jokers - group_jokers, melds) {
                        return true;
                    }
                    melds.truncate(mark);
                }
            }

            let mut suit = 0;
            loop {
                if suit == SUITS {
                    self.dead_ends.insert(key);
                    return false;
                }
                choice[suit] += 1;
                if choice[suit] < plans[suit].len() {
                    break;
                }
                choice[suit] = 0;
                suit += 1;
            }
        }
    }
}

/// Every distinct way to use `tiles` copies of one suit's tile at `rank`,
/// given the suit's open runs and a joker budget.
fn suit_plans(runs: &[RunShape], tiles: u8, rank: u8, jokers: u8) -> Vec<SuitPlan> {
    let jokers_allowed = rank < MAX_RANK && jokers > 0;
    // A run started this late cannot reach three tiles.
    let starts_allowed = usize::from(MAX_RANK - rank) + 1 >= MIN_SET_SIZE;

    let options: Vec<Vec<Step>> = runs
        .iter()
        .map(|shape| {
            let mut steps = vec![Step::Tile];
            if jokers_allowed {
                steps.push(Step::Joker);
            }
            if shape.can_close() {
                steps.push(Step::Close);
            }
            steps
        })
        .collect();

    let mut plans = Vec::new();
    let mut seen = HashSet::new();
    let mut pick = vec![0usize; runs.len()];
    loop {
        let steps: Vec<Step> = pick
            .iter()
            .zip(&options)
            .map(|(&i, steps)| steps[i])
            .collect();
        let used = steps.iter().filter(|&&step| step == Step::Tile).count();
        let joker_steps = steps.iter().filter(|&&step| step == Step::Joker).count();
        if used <= usize::from(tiles) && joker_steps <= usize::from(jokers) {
            let spare = tiles - used as u8;
            let continuing: Vec<RunShape> = runs
                .iter()
                .zip(&steps)
                .filter_map(|(shape, step)| match step {
                    Step::Tile => Some(shape.extended(false)),
                    Step::Joker => Some(shape.extended(true)),
                    Step::Close => None,
                })
                .collect();
            let most_new = if starts_allowed { spare } else { 0 };
            for new_runs in (0..=most_new).rev() {
                let mut shapes = continuing.clone();
                shapes.extend(std::iter::repeat_n(RunShape::STARTED, usize::from(new_runs)));
                shapes.sort();
                let to_groups = spare - new_runs;
                let joker_count = joker_steps as u8;
                if seen.insert((shapes, to_groups, joker_count)) {
                    plans.push(SuitPlan {
                        steps: steps.clone(),
                        new_runs,
                        to_groups,
                        jokers: joker_count,
                    });
                }
            }
        }

        let mut run = 0;
        loop {
            if run == pick.len() {
                return plans;
            }
            pick[run] += 1;
            if pick[run] < options[run].len() {
                break;
            }
            pick[run] = 0;
            run += 1;
        }
    }
}

/// Apply the chosen plans: extend or close open runs and start new ones.
/// Closed runs go straight into `melds`.
fn advance(
    rank: u8,
    open: &[OpenRun],
    plans: &[&SuitPlan; SUITS],
    melds: &mut Vec<Meld>,
) -> Vec<OpenRun> {
    let mut next = Vec::with_capacity(open.len());
    let mut taken = [0usize; SUITS];
    for run in open {
        let step = plans[run.suit].steps[taken[run.suit]];
        taken[run.suit] += 1;
        let tile = match step {
            Step::Close => {
                melds.push(Meld::new(run.tiles.clone()));
                continue;
            }
            Step::Tile => Tile::new(Suit::PLAYABLE[run.suit], rank),
            Step::Joker => Tile::joker(),
        };
        let mut tiles = run.tiles.clone();
        tiles.push(tile);
        next.push(OpenRun {
            suit: run.suit,
            shape: run.shape.extended(step == Step::Joker),
            tiles,
        });
    }
    for (suit, plan) in plans.iter().enumerate() {
        for _ in 0..plan.new_runs {
            next.push(OpenRun {
                suit,
                shape: RunShape::STARTED,
                tiles: vec![Tile::new(Suit::PLAYABLE[suit], rank)],
            });
        }
    }
    next
}

/// Ways to split the spare tiles of one rank into groups, one per number of
/// jokers used, within a budget of `jokers`.
fn group_layouts(rank: u8, mut spare: [u8; SUITS], jokers: u8) -> Vec<(u8, Vec<Meld>)> {
    let mut layouts = Vec::new();
    let mut current = Vec::new();
    form_groups(rank, &mut spare, jokers, 0, &mut current, &mut layouts);
    layouts
}

fn form_groups(
    rank: u8,
    spare: &mut [u8; SUITS],
    jokers: u8,
    used: u8,
    current: &mut Vec<Meld>,
    layouts: &mut Vec<(u8, Vec<Meld>)>,
) {
    // The lowest suit with a spare tile must belong to some group.
    let Some(first) = spare.iter().position(|&count| count > 0) else {
        if layouts.iter().all(|(jokers_used, _)| *jokers_used != used) {
            layouts.push((used, current.clone()));
        }
        return;
    };
    let others: Vec<usize> = (first + 1..SUITS).filter(|&suit| spare[suit] > 0).collect();

    for mask in 0u8..(1 << others.len()) {
        let mut suits = vec![first];
        suits.extend(
            others
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &suit)| suit),
        );
        for joker in [false, true] {
            let size = suits.len() + usize::from(joker);
            if !(MIN_SET_SIZE..=MAX_GROUP_SIZE).contains(&size) || (joker && used >= jokers) {
                continue;
            }
            for &suit in &suits {
                spare[suit] -= 1;
            }
            let mut tiles: Vec<Tile> = suits
                .iter()
                .map(|&suit| Tile::new(Suit::PLAYABLE[suit], rank))
                .collect();
            if joker {
                tiles.push(Tile::joker());
            }
            current.push(Meld::new(tiles));
            form_groups(rank, spare, jokers, used + u8::from(joker), current, layouts);
            current.pop();
            for &suit in &suits {
                spare[suit] += 1;
            }
        }
    }
}

/// Generate all possible runs for a specific suit
fn generate_runs_for_suit(pool: &Hand, suit: Suit, melds: &mut Vec<Meld>) {
    let num_jokers = pool.count(&Tile::joker());
    let min_len = MIN_SET_SIZE as u8;

    for start in 1..=MAX_RANK - min_len + 1 {
        // Both ends of a run are numbered tiles.
        if pool.count(&Tile::new(suit, start)) == 0 {
            continue;
        }
        let max_len = MAX_RANK - start + 1;

        for length in min_len..=max_len {
            if pool.count(&Tile::new(suit, start + length - 1)) == 0 {
                continue;
            }
            for pattern in generate_joker_patterns(length, num_jokers) {
                if can_form_run(pool, suit, start, length, &pattern) {
                    melds.push(build_run(suit, start, length, &pattern));
                }
            }
        }
    }
}

/// Interior positions of a run that jokers could occupy, using at most
/// `available` jokers. Always includes the joker-free pattern.
fn generate_joker_patterns(length: u8, available: u8) -> Vec<Vec<u8>> {
    let interior: Vec<u8> = (1..length - 1).collect();
    let limit = usize::from(available).min(interior.len());
    let mut patterns = vec![Vec::new()];
    let mut current = Vec::new();
    for size in 1..=limit {
        choose_positions(&interior, size, 0, &mut current, &mut patterns);
    }
    patterns
}

fn choose_positions(
    positions: &[u8],
    size: usize,
    start: usize,
    current: &mut Vec<u8>,
    out: &mut Vec<Vec<u8>>,
) {
    if current.len() == size {
        out.push(current.clone());
        return;
    }
    for i in start..positions.len() {
        current.push(positions[i]);
        choose_positions(positions, size, i + 1, current, out);
        current.pop();
    }
}

/// Check if a run can be formed with the given parameters
fn can_form_run(pool: &Hand, suit: Suit, start: u8, length: u8, joker_positions: &[u8]) -> bool {
    if usize::from(pool.count(&Tile::joker())) < joker_positions.len() {
        return false;
    }

    (0..length)
        .filter(|i| !joker_positions.contains(i))
        .all(|i| pool.count(&Tile::new(suit, start + i)) > 0)
}

/// Build a run meld
fn build_run(suit: Suit, start: u8, length: u8, joker_positions: &[u8]) -> Meld {
    let tiles = (0..length)
        .map(|i| {
            if joker_positions.contains(&i) {
                Tile::joker()
            } else {
                Tile::new(suit, start + i)
            }
        })
        .collect();
    Meld::new(tiles)
}

/// Generate all possible groups for a specific number
fn generate_groups_for_number(pool: &Hand, number: u8, melds: &mut Vec<Meld>) {
    let has_joker = pool.count(&Tile::joker()) > 0;

    let available_suits: Vec<Suit> = Suit::PLAYABLE
        .into_iter()
        .filter(|suit| pool.count(&Tile::new(*suit, number)) > 0)
        .collect();

    // A group takes at most one joker.
    for jokers in 0..=usize::from(has_joker) {
        for group_size in rules::MIN_SET_SIZE..=rules::MAX_GROUP_SIZE {
            let suits_needed = group_size - jokers;
            if suits_needed > available_suits.len() {
                continue;
            }
            let mut combination = Vec::with_capacity(suits_needed);
            generate_suit_combinations(
                &available_suits,
                suits_needed,
                0,
                &mut combination,
                jokers,
                number,
                melds,
            );
        }
    }
}

/// Emit every group using `needed` of the available suits plus `jokers` jokers
fn generate_suit_combinations(
    available: &[Suit],
    needed: usize,
    start: usize,
    combination: &mut Vec<Suit>,
    jokers: usize,
    number: u8,
    melds: &mut Vec<Meld>,
) {
    if combination.len() == needed {
        let mut tiles: Vec<Tile> = combination.iter().map(|suit| Tile::new(*suit, number)).collect();
        tiles.extend(std::iter::repeat_n(Tile::joker(), jokers));
        melds.push(Meld::new(tiles));
        return;
    }

    for i in start..available.len() {
        combination.push(available[i]);
        generate_suit_combinations(available, needed, i + 1, combination, jokers, number, melds);
        combination.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_tiles, standard_pool};
    use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
    use std::time::{Duration, Instant};

    fn hand(input: &str) -> Hand {
        Hand::from_tiles(parse_tiles(input).unwrap())
    }

    fn meld(input: &str) -> Meld {
        Meld::new(parse_tiles(input).unwrap())
    }

    fn covers(melds: &[Meld], pool: &Hand) -> bool {
        let mut used = Hand::new();
        for m in melds {
            assert!(rules::is_valid_set(m.tiles()), "invalid set {m}");
            used.absorb(&m.counts());
        }
        used == *pool
    }

    /// Plain backtracking over every candidate set, for cross-checking.
    fn exhaustive(pool: &Hand) -> bool {
        let Some(first) = pool.first_numbered() else {
            return pool.is_empty();
        };
        candidate_melds(pool)
            .into_iter()
            .filter(|m| m.tiles().contains(&first))
            .any(|m| {
                let mut rest = pool.clone();
                rest.remove_all(m.tiles()) && exhaustive(&rest)
            })
    }

    fn full_run(suit: &str) -> Meld {
        let labels: Vec<String> = (1..=MAX_RANK).map(|rank| format!("{suit}{rank}")).collect();
        meld(&labels.join(" "))
    }

    #[test]
    fn test_generate_runs_simple() {
        let melds = candidate_melds(&hand("r1 r2 r3 r4"));

        // [1,2,3], [2,3,4], [1,2,3,4]
        assert_eq!(melds.len(), 3);
        assert_eq!(melds[0].len(), 4);
    }

    #[test]
    fn test_generate_groups_simple() {
        let melds = candidate_melds(&hand("r5 b5 o5"));
        assert_eq!(melds, vec![meld("r5 b5 o5")]);
    }

    #[test]
    fn test_generate_runs_with_joker_only_inside() {
        let melds = candidate_melds(&hand("r1 r3 j"));
        assert!(melds.contains(&meld("r1 j r3")));
        assert!(melds.iter().all(|m| rules::is_valid_set(m.tiles())));

        // No numbered tile on the far side, so no run.
        let melds = candidate_melds(&hand("r1 r2 j"));
        assert!(melds.is_empty());
    }

    #[test]
    fn test_generate_groups_with_joker() {
        let melds = candidate_melds(&hand("r5 b5 j"));
        assert_eq!(melds, vec![meld("r5 b5 j")]);

        let melds = candidate_melds(&hand("r5 b5 k5 j"));
        assert!(melds.contains(&meld("r5 b5 k5 j")));
        assert!(melds.contains(&meld("r5 b5 k5")));
        assert!(melds.contains(&meld("b5 k5 j")));
        assert!(melds.iter().all(|m| m.tiles().iter().filter(|t| t.is_joker()).count() <= 1));
    }

    #[test]
    fn test_joker_patterns_are_interior() {
        let patterns = generate_joker_patterns(4, 2);
        // {}, {1}, {2}, {1,2}
        assert_eq!(patterns.len(), 4);
        assert!(patterns.iter().flatten().all(|&p| p == 1 || p == 2));
        assert_eq!(generate_joker_patterns(5, 0), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_partition_where_longest_first_fails() {
        // Taking r1..r7 whole strands b4 and k4.
        let pool = hand("r1 r2 r3 r4 r5 r6 r7 b4 k4");
        let melds = partition(&pool).unwrap();
        assert!(covers(&melds, &pool));
        assert_eq!(melds.len(), 3);
    }

    #[test]
    fn test_partition_uses_duplicate_copies() {
        let pool = hand("r5 b5 k5 r5 b5 k5");
        let melds = partition(&pool).unwrap();
        assert!(covers(&melds, &pool));
        assert_eq!(melds.len(), 2);
    }

    #[test]
    fn test_partition_rejects_leftovers() {
        assert!(partition(&hand("r1 r2 r3 b9")).is_none());
        assert!(partition(&hand("j")).is_none());
        assert!(partition(&hand("r1 r2 r3 j")).is_none());
        assert_eq!(partition(&Hand::new()), Some(vec![]));
    }

    #[test]
    fn test_partition_places_joker() {
        let pool = hand("b7 b9 r8 o8 j k8");
        let melds = partition(&pool).unwrap();
        assert!(covers(&melds, &pool));
    }

    #[test]
    fn test_rearrange_absorbs_tile_into_group() {
        let table = Table::from_melds(vec![meld("r7 b7 k7")]);
        let result = rearrange(&table, &parse_tiles("o7").unwrap()).unwrap();

        assert_eq!(result.table.melds(), &[meld("r7 b7 k7 o7")]);
        assert_eq!(result.preserved, 0);
    }

    #[test]
    fn test_rearrange_leaves_other_sets_alone() {
        let table = Table::from_melds(vec![meld("b1 b2 b3"), meld("r7 b7 k7"), meld("o10 o11 o12")]);
        let result = rearrange(&table, &parse_tiles("o7").unwrap()).unwrap();

        assert_eq!(
            result.table.melds(),
            &[meld("b1 b2 b3"), meld("r7 b7 k7 o7"), meld("o10 o11 o12")]
        );
        assert_eq!(result.preserved, 2);
    }

    #[test]
    fn test_rearrange_keeps_table_and_appends_new_set() {
        let table = Table::from_melds(vec![meld("k1 k2 k3")]);
        let result = rearrange(&table, &parse_tiles("r9 b9 o9").unwrap()).unwrap();

        assert_eq!(result.table.melds(), &[meld("k1 k2 k3"), meld("r9 b9 o9")]);
        assert_eq!(result.preserved, 1);
    }

    #[test]
    fn test_rearrange_splits_run_to_make_room() {
        // r4 must leave the run to join b4 and k4.
        let table = Table::from_melds(vec![meld("r1 r2 r3 r4 r5 r6 r7")]);
        let result = rearrange(&table, &parse_tiles("b4 k4").unwrap()).unwrap();

        let mut expected = table.counts();
        expected.absorb(&hand("b4 k4"));
        assert!(covers(result.table.melds(), &expected));
        assert_eq!(result.table.len(), 3);
    }

    #[test]
    fn test_rearrange_impossible() {
        let table = Table::from_melds(vec![meld("r1 r2 r3")]);
        assert!(rearrange(&table, &parse_tiles("b12").unwrap()).is_none());
    }

    #[test]
    fn test_partition_agrees_with_exhaustive_search() {
        let mut low: Vec<Tile> = standard_pool()
            .into_iter()
            .filter(|tile| tile.number().is_none_or(|rank| rank <= 4))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut feasible = 0;

        for round in 0..400 {
            low.shuffle(&mut rng);
            let pool = Hand::from_tiles(low.iter().copied().take(3 + round % 7));
            let found = partition(&pool);
            assert_eq!(found.is_some(), exhaustive(&pool), "pool {:?}", pool.tiles());
            if let Some(melds) = found {
                assert!(covers(&melds, &pool));
                feasible += 1;
            }
        }
        assert!(feasible > 0);
    }

    #[test]
    fn test_partition_standard_pool() {
        let pool = Hand::from_tiles(standard_pool());
        let melds = partition(&pool).unwrap();
        assert!(covers(&melds, &pool));
    }

    #[test]
    fn test_partition_rejects_pool_beyond_standard_counts() {
        assert!(partition(&hand("r5 r5 r5 b5 o5")).is_none());
        assert!(partition(&hand("r4 r5 r6 j j j")).is_none());
    }

    #[test]
    fn test_last_rank_takes_no_jokers_and_starts_nothing() {
        let long = RunShape::STARTED.extended(false).extended(false);
        let plans = suit_plans(&[long], 1, MAX_RANK, 2);

        // Extend with the tile, or close and send the tile to a group.
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|plan| plan.jokers == 0 && plan.new_runs == 0));
        assert!(plans.iter().any(|plan| plan.steps == [Step::Close] && plan.to_groups == 1));
    }

    #[test]
    fn test_rearrange_large_table_is_fast() {
        let mut melds: Vec<Meld> = ["r", "b", "o", "k"].into_iter().map(full_run).collect();
        for rank in 1..=5 {
            melds.push(meld(&format!("r{rank} b{rank} o{rank} k{rank}")));
        }
        let table = Table::from_melds(melds);
        assert_eq!(table.counts().len(), 72);

        let started = Instant::now();
        let result = rearrange(&table, &parse_tiles("r6").unwrap()).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        let mut expected = table.counts();
        expected.add(Tile::new(Suit::Red, 6));
        assert!(covers(result.table.melds(), &expected));
    }

    #[test]
    fn test_rearrange_large_table_failure_is_fast() {
        let table = Table::from_melds(vec![full_run("r"), full_run("r"), full_run("b")]);

        let started = Instant::now();
        assert!(rearrange(&table, &parse_tiles("b13").unwrap()).is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_rearrange_refuses_inflated_counts() {
        let table = Table::from_melds(vec![Meld::new(vec![Tile::new(Suit::Red, 5); 300])]);
        assert!(rearrange(&table, &parse_tiles("b5 o5").unwrap()).is_none());
    }
}
