use log::{debug, trace};
use serde::Serialize;

use crate::block::{Block, LogicalTime, NextRef, Stamp};
use crate::config::{Geometry, ReplacementPolicy};
use crate::future::{FutureAccessIndex, Identity};
use crate::trace::{Command, Op};
use crate::utils::{SetIndex, Tag, index_of, tag_of};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub reads: u64,
    pub read_misses: u64,
    pub writes: u64,
    pub write_misses: u64,
    pub writebacks: u64,
    /// Dirty lines dropped by an inclusion invalidation, written straight to memory.
    pub invalidation_writebacks: u64,
}

impl LevelStats {
    pub fn misses(&self) -> u64 {
        self.read_misses + self.write_misses
    }

    pub fn accesses(&self) -> u64 {
        self.reads + self.writes
    }
}

/// Where a missed request goes inside its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Hit,
    /// A never-used slot; nothing has to leave.
    Fill { set: usize, slot: usize },
    /// An occupied slot whose block has to be evicted first.
    Evict { set: usize, slot: usize },
}

/// One level of the hierarchy: `num_sets` sets of `assoc` slots each.
///
/// A level only manages its own storage and counters. Everything that crosses
/// levels (fetches, writebacks and inclusion invalidations) is driven by
/// [`crate::hierarchy::CacheHierarchy`].
#[derive(Debug, Clone)]
pub struct CacheLevel {
    number: u8,
    geometry: Geometry,
    policy: ReplacementPolicy,
    sets: Vec<Vec<Option<Block>>>,
    future: Option<FutureAccessIndex>,
    stats: LevelStats,
}

impl CacheLevel {
    pub fn new(number: u8, geometry: Geometry, policy: ReplacementPolicy) -> Self {
        let sets = vec![vec![None; geometry.assoc as usize]; geometry.num_sets as usize];
        CacheLevel {
            number,
            geometry,
            policy,
            sets,
            future: None,
            stats: LevelStats::default(),
        }
    }

    /// Hands the level the future references it needs under the optimal policy.
    pub fn set_future_index(&mut self, index: FutureAccessIndex) {
        self.future = Some(index);
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn stats(&self) -> &LevelStats {
        &self.stats
    }

    pub fn sets(&self) -> &[Vec<Option<Block>>] {
        &self.sets
    }

    pub fn is_present(&self) -> bool {
        self.geometry.is_present()
    }

    pub fn tag_of(&self, addr: u32) -> Tag {
        tag_of(addr, self.geometry.tag_bits)
    }

    pub fn index_of(&self, addr: u32) -> SetIndex {
        index_of(addr, self.geometry.tag_bits, self.geometry.index_bits)
    }

    pub fn identity(&self, addr: u32) -> Identity {
        (self.tag_of(addr), self.index_of(addr))
    }

    pub fn block(&self, set: usize, slot: usize) -> Option<&Block> {
        self.sets[set][slot].as_ref()
    }

    /// Tallies the request and decides where it lands. A hit is fully handled
    /// here; for a miss the caller performs the propagation and then calls
    /// [`CacheLevel::install`].
    pub fn lookup(&mut self, command: Command, now: LogicalTime) -> Placement {
        match command.op {
            Op::Read => self.stats.reads += 1,
            Op::Write => self.stats.writes += 1,
        }

        let (tag, index) = self.identity(command.addr);
        let set = index as usize;
        debug!(
            "L{} {} {:x} (tag {:x}, index {}) @{}",
            self.number,
            command.op.as_str(),
            command.addr,
            tag,
            index,
            now
        );

        // A stale copy of the same tag is replaced in place, ahead of any empty slot.
        let mut stale = None;
        for slot in 0..self.sets[set].len() {
            let Some(block) = self.sets[set][slot] else {
                continue;
            };
            if block.tag != tag {
                continue;
            }
            if block.valid {
                self.touch(set, slot, now, command.is_write());
                debug!("L{} hit", self.number);
                return Placement::Hit;
            }
            stale = Some(slot);
            break;
        }

        debug!("L{} miss", self.number);
        if let Some(slot) = stale {
            return Placement::Evict { set, slot };
        }
        if let Some(slot) = self.sets[set].iter().position(Option::is_none) {
            debug!("L{} victim: none", self.number);
            return Placement::Fill { set, slot };
        }
        let slot = self.select_victim(set, now);
        Placement::Evict { set, slot }
    }

    fn touch(&mut self, set: usize, slot: usize, now: LogicalTime, write: bool) {
        let identity = match &self.sets[set][slot] {
            Some(block) => (block.tag, set as SetIndex),
            None => return,
        };
        let stamp = match self.policy {
            ReplacementPolicy::Lru => Some(Stamp::LastTouch(now)),
            ReplacementPolicy::Fifo => None,
            ReplacementPolicy::Optimal => Some(Stamp::NextRef(self.poll_next(identity))),
        };
        if let Some(block) = self.sets[set][slot].as_mut() {
            if let Some(stamp) = stamp {
                block.stamp = stamp;
            }
            if write {
                block.dirty = true;
            }
        }
    }

    fn poll_next(&mut self, identity: Identity) -> NextRef {
        self.future
            .as_mut()
            .map_or(NextRef::Never, |future| future.poll(identity))
    }

    fn next_ref(&mut self, identity: Identity, now: LogicalTime) -> NextRef {
        self.future
            .as_mut()
            .map_or(NextRef::Never, |future| future.next_after(identity, now))
    }

    fn select_victim(&mut self, set: usize, now: LogicalTime) -> usize {
        match self.policy {
            ReplacementPolicy::Lru | ReplacementPolicy::Fifo => self.oldest_slot(set),
            ReplacementPolicy::Optimal => self.farthest_slot(set, now),
        }
    }

    /// First invalid slot, else the valid slot with the smallest time
    /// (lowest slot index on ties).
    fn oldest_slot(&self, set: usize) -> usize {
        let mut victim = 0;
        let mut oldest = LogicalTime::MAX;
        for (slot, block) in self.sets[set].iter().enumerate() {
            let Some(block) = block else {
                continue;
            };
            if !block.valid {
                return slot;
            }
            let time = match block.stamp {
                Stamp::LastTouch(t) | Stamp::InsertedAt(t) => t,
                Stamp::NextRef(_) => LogicalTime::MAX,
            };
            if time < oldest {
                victim = slot;
                oldest = time;
            }
        }
        victim
    }

    /// First invalid slot, else the valid slot referenced farthest in the
    /// future (left-most among those never referenced again).
    ///
    /// Every examined slot whose next reference is already in the past is
    /// fast-forwarded first, whether or not it ends up chosen.
    fn farthest_slot(&mut self, set: usize, now: LogicalTime) -> usize {
        let mut victim = 0;
        let mut farthest: Option<NextRef> = None;
        for slot in 0..self.sets[set].len() {
            let Some(block) = self.sets[set][slot] else {
                continue;
            };
            let mut next = match block.stamp {
                Stamp::NextRef(next) => next,
                Stamp::LastTouch(t) | Stamp::InsertedAt(t) => NextRef::At(t),
            };
            if next <= NextRef::At(now) {
                next = self.next_ref((block.tag, set as SetIndex), now);
                if let Some(block) = self.sets[set][slot].as_mut() {
                    block.stamp = Stamp::NextRef(next);
                }
            }
            if !block.valid {
                return slot;
            }
            if farthest.is_none_or(|best| next > best) {
                victim = slot;
                farthest = Some(next);
            }
        }
        victim
    }

    pub fn count_writeback(&mut self) {
        self.stats.writebacks += 1;
    }

    pub fn clean(&mut self, set: usize, slot: usize) {
        if let Some(block) = self.sets[set][slot].as_mut() {
            block.dirty = false;
        }
    }

    /// Places the block for `command` into `slot`, replacing whatever was there,
    /// and charges the miss.
    ///
    /// Under the optimal policy a block filling an empty slot takes the next
    /// queued reference. One replacing a victim is stamped `now`, so the next
    /// victim scan resolves its real next reference.
    pub fn install(&mut self, set: usize, slot: usize, command: Command, now: LogicalTime) {
        let tag = self.tag_of(command.addr);
        let stamp = match self.policy {
            ReplacementPolicy::Lru => Stamp::LastTouch(now),
            ReplacementPolicy::Fifo => Stamp::InsertedAt(now),
            ReplacementPolicy::Optimal if self.sets[set][slot].is_none() => {
                Stamp::NextRef(self.poll_next((tag, set as SetIndex)))
            }
            ReplacementPolicy::Optimal => Stamp::NextRef(NextRef::At(now)),
        };
        self.sets[set][slot] = Some(Block::new(tag, command.addr, command.is_write(), stamp));
        match command.op {
            Op::Read => self.stats.read_misses += 1,
            Op::Write => self.stats.write_misses += 1,
        }
        trace!("L{} set {}: {}", self.number, set, self.describe_set(set));
    }

    /// Invalidates every slot holding the tag of `addr` under this level's own
    /// bit widths. A dirty copy counts as a writeback straight to memory.
    /// Never propagates further.
    pub fn invalidate(&mut self, addr: u32) {
        if !self.is_present() {
            return;
        }
        let (tag, index) = self.identity(addr);
        let number = self.number;
        for block in self.sets[index as usize].iter_mut().flatten() {
            if block.tag != tag {
                continue;
            }
            debug!(
                "L{} invalidated: {:x} (tag {:x}, index {}, {})",
                number,
                addr,
                tag,
                index,
                if block.dirty { "dirty" } else { "clean" }
            );
            block.valid = false;
            if block.dirty {
                self.stats.invalidation_writebacks += 1;
                block.dirty = false;
                debug!("L{number} writeback to main memory directly");
            }
        }
    }

    /// At most one valid slot per set holds any given tag.
    pub fn valid_tags_unique(&self) -> bool {
        self.sets.iter().all(|set| {
            let valid: Vec<Tag> = set.iter().flatten().filter(|b| b.valid).map(|b| b.tag).collect();
            valid
                .iter()
                .enumerate()
                .all(|(i, tag)| !valid[i + 1..].contains(tag))
        })
    }

    pub fn describe_set(&self, set: usize) -> String {
        self.sets[set]
            .iter()
            .map(|slot| match slot {
                Some(block) => format!("{} {}", block, block.stamp),
                None => "-".to_owned(),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// One fully associative set of `assoc` 16-byte blocks.
    fn one_set(assoc: u32, policy: ReplacementPolicy) -> CacheLevel {
        let geometry = Geometry {
            num_sets: 1,
            assoc,
            offset_bits: 4,
            index_bits: 0,
            tag_bits: 28,
        };
        CacheLevel::new(1, geometry, policy)
    }

    /// Runs `command` against a level with no neighbours.
    fn access(level: &mut CacheLevel, command: Command, now: LogicalTime) -> Placement {
        let placement = level.lookup(command, now);
        match placement {
            Placement::Hit => {}
            Placement::Fill { set, slot } => level.install(set, slot, command, now),
            Placement::Evict { set, slot } => {
                if level.block(set, slot).is_some_and(|b| b.dirty) {
                    level.count_writeback();
                }
                level.install(set, slot, command, now);
            }
        }
        placement
    }

    fn tags(level: &CacheLevel) -> Vec<Tag> {
        level.sets()[0].iter().flatten().map(|b| b.tag).collect()
    }

    #[test]
    fn lru_hit_refreshes_and_spares_block() {
        let mut level = one_set(2, ReplacementPolicy::Lru);
        access(&mut level, Command::read(0x100), 1);
        access(&mut level, Command::read(0x200), 2);
        assert_eq!(access(&mut level, Command::read(0x100), 3), Placement::Hit);
        assert_eq!(level.block(0, 0).unwrap().stamp, Stamp::LastTouch(3));
        assert_eq!(
            access(&mut level, Command::read(0x300), 4),
            Placement::Evict { set: 0, slot: 1 }
        );
        assert_eq!(tags(&level), vec![0x10, 0x30]);
    }

    #[test]
    fn lru_ties_go_to_lowest_slot() {
        let mut level = one_set(2, ReplacementPolicy::Lru);
        access(&mut level, Command::read(0x100), 5);
        access(&mut level, Command::read(0x200), 5);
        assert_eq!(
            access(&mut level, Command::read(0x300), 6),
            Placement::Evict { set: 0, slot: 0 }
        );
    }

    #[test]
    fn fifo_ignores_hits() {
        let mut level = one_set(2, ReplacementPolicy::Fifo);
        access(&mut level, Command::read(0x100), 1);
        access(&mut level, Command::read(0x200), 2);
        access(&mut level, Command::read(0x100), 3);
        assert_eq!(level.block(0, 0).unwrap().stamp, Stamp::InsertedAt(1));
        assert_eq!(
            access(&mut level, Command::read(0x300), 4),
            Placement::Evict { set: 0, slot: 0 }
        );
        assert_eq!(level.block(0, 0).unwrap().stamp, Stamp::InsertedAt(4));
    }

    #[test]
    fn fifo_stamps_follow_insertion_order() {
        let mut level = one_set(4, ReplacementPolicy::Fifo);
        for (i, addr) in [0x100, 0x200, 0x300, 0x400].into_iter().enumerate() {
            access(&mut level, Command::read(addr), i as LogicalTime + 1);
        }
        let stamps: Vec<Stamp> = level.sets()[0].iter().flatten().map(|b| b.stamp).collect();
        assert_eq!(
            stamps,
            vec![
                Stamp::InsertedAt(1),
                Stamp::InsertedAt(2),
                Stamp::InsertedAt(3),
                Stamp::InsertedAt(4)
            ]
        );
    }

    #[test]
    fn optimal_evicts_block_never_used_again() {
        // A B C A: B is never referenced again and must go, although it is
        // younger than A.
        let trace = [
            Command::read(0xa0),
            Command::read(0xb0),
            Command::read(0xc0),
            Command::read(0xa0),
        ];
        let mut level = one_set(2, ReplacementPolicy::Optimal);
        level.set_future_index(FutureAccessIndex::build(&trace, level.geometry()));
        for (i, command) in trace.iter().enumerate() {
            access(&mut level, *command, i as LogicalTime + 1);
        }
        assert_eq!(tags(&level), vec![0xa, 0xc]);
        assert_eq!(level.stats().read_misses, 3);
        assert_eq!(level.stats().reads, 4);
    }

    #[test]
    fn optimal_evicts_farthest_next_reference() {
        // A B C B A: at C, A recurs at 5 and B at 4, so A goes.
        let trace = [
            Command::read(0xa0),
            Command::read(0xb0),
            Command::read(0xc0),
            Command::read(0xb0),
            Command::read(0xa0),
        ];
        let mut level = one_set(2, ReplacementPolicy::Optimal);
        level.set_future_index(FutureAccessIndex::build(&trace, level.geometry()));
        access(&mut level, trace[0], 1);
        access(&mut level, trace[1], 2);
        assert_eq!(
            access(&mut level, trace[2], 3),
            Placement::Evict { set: 0, slot: 0 }
        );
        assert_eq!(access(&mut level, trace[3], 4), Placement::Hit);
    }

    #[test]
    fn optimal_never_ties_pick_leftmost() {
        let trace = [
            Command::read(0xa0),
            Command::read(0xb0),
            Command::read(0xc0),
        ];
        let mut level = one_set(2, ReplacementPolicy::Optimal);
        level.set_future_index(FutureAccessIndex::build(&trace, level.geometry()));
        access(&mut level, trace[0], 1);
        access(&mut level, trace[1], 2);
        assert_eq!(
            access(&mut level, trace[2], 3),
            Placement::Evict { set: 0, slot: 0 }
        );
        assert_eq!(
            level.block(0, 1).unwrap().stamp,
            Stamp::NextRef(NextRef::Never)
        );
    }

    #[test]
    fn stale_next_refs_are_fast_forwarded() {
        // A B A C A, but this level never sees position 3 (it hit further in).
        let trace = [
            Command::read(0xa0),
            Command::read(0xb0),
            Command::read(0xa0),
            Command::read(0xc0),
            Command::read(0xa0),
        ];
        let mut level = one_set(2, ReplacementPolicy::Optimal);
        level.set_future_index(FutureAccessIndex::build(&trace, level.geometry()));
        access(&mut level, trace[0], 1);
        access(&mut level, trace[1], 2);
        // a fill takes the front of the queue: its own position
        assert_eq!(level.block(0, 0).unwrap().stamp, Stamp::NextRef(NextRef::At(1)));
        assert_eq!(
            access(&mut level, trace[3], 4),
            Placement::Evict { set: 0, slot: 1 }
        );
        assert_eq!(level.block(0, 0).unwrap().stamp, Stamp::NextRef(NextRef::At(5)));
        assert_eq!(level.block(0, 1).unwrap().stamp, Stamp::NextRef(NextRef::At(4)));
    }

    #[test]
    fn repeated_touch_keeps_the_pending_reference() {
        // Outer levels see a fetch and a writeback of the same block in quick
        // succession, before the block's next trace position comes up.
        let trace = [
            Command::read(0xa0),
            Command::read(0xb0),
            Command::read(0xa0),
        ];
        let mut level = one_set(2, ReplacementPolicy::Optimal);
        level.set_future_index(FutureAccessIndex::build(&trace, level.geometry()));
        access(&mut level, Command::read(0xa0), 2);
        assert_eq!(access(&mut level, Command::write(0xa0), 3), Placement::Hit);
        let block = level.block(0, 0).unwrap();
        assert_eq!(block.stamp, Stamp::NextRef(NextRef::At(3)));
        assert!(block.dirty);
    }

    #[test]
    fn write_hit_sets_dirty() {
        let mut level = one_set(2, ReplacementPolicy::Lru);
        access(&mut level, Command::read(0x100), 1);
        assert!(!level.block(0, 0).unwrap().dirty);
        access(&mut level, Command::write(0x104), 2);
        assert!(level.block(0, 0).unwrap().dirty);
        assert_eq!(level.stats().write_misses, 0);
        assert_eq!(level.stats().writes, 1);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let mut level = one_set(2, ReplacementPolicy::Lru);
        access(&mut level, Command::write(0x100), 1);
        level.invalidate(0x100);
        assert_eq!(level.stats().invalidation_writebacks, 1);
        let block = *level.block(0, 0).unwrap();
        assert!(!block.valid && !block.dirty);

        level.invalidate(0x100);
        level.invalidate(0x900);
        assert_eq!(level.stats().invalidation_writebacks, 1);
        assert_eq!(*level.block(0, 0).unwrap(), block);
    }

    #[test]
    fn stale_tag_is_reused_before_empty_slot() {
        let mut level = one_set(4, ReplacementPolicy::Lru);
        access(&mut level, Command::read(0x100), 1);
        access(&mut level, Command::read(0x200), 2);
        level.invalidate(0x200);
        assert_eq!(
            access(&mut level, Command::read(0x200), 3),
            Placement::Evict { set: 0, slot: 1 }
        );
        assert_eq!(level.stats().read_misses, 3);
        assert!(level.sets()[0][2].is_none());
    }

    #[test]
    fn invalid_slot_is_preferred_victim() {
        let mut level = one_set(2, ReplacementPolicy::Lru);
        access(&mut level, Command::read(0x100), 1);
        access(&mut level, Command::read(0x200), 2);
        level.invalidate(0x200);
        assert_eq!(
            access(&mut level, Command::read(0x300), 3),
            Placement::Evict { set: 0, slot: 1 }
        );
        assert!(level.valid_tags_unique());
    }

    #[test]
    fn absent_level_ignores_invalidate() {
        let mut level = CacheLevel::new(2, Geometry::absent(), ReplacementPolicy::Lru);
        level.invalidate(0x1234);
        assert_eq!(*level.stats(), LevelStats::default());
        assert!(level.sets().is_empty());
    }
}
