use std::ops::Index;

use log::{debug, info, trace};

use crate::block::LogicalTime;
use crate::config::{HierarchyConfig, Inclusion, ReplacementPolicy};
use crate::future::FutureAccessIndex;
use crate::level::{CacheLevel, Placement};
use crate::trace::Command;

/// Handle of a level inside its hierarchy. Lower handles sit closer to the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LevelId(usize);

impl LevelId {
    pub const L1: LevelId = LevelId(0);
    pub const L2: LevelId = LevelId(1);
}

/// L1 plus an L2 that may be an absent terminus. The hierarchy owns both
/// levels and resolves inner/outer adjacency through `LevelId`s.
#[derive(Debug, Clone)]
pub struct CacheHierarchy {
    levels: Vec<CacheLevel>,
    inclusion: Inclusion,
}

impl CacheHierarchy {
    pub fn new(config: &HierarchyConfig) -> Self {
        let levels = vec![
            CacheLevel::new(1, config.l1_geometry, config.policy),
            CacheLevel::new(2, config.l2_geometry, config.policy),
        ];
        CacheHierarchy {
            levels,
            inclusion: config.inclusion,
        }
    }

    /// Builds the hierarchy and, under the optimal policy, each present
    /// level's future-reference index from the complete trace.
    pub fn with_trace(config: &HierarchyConfig, commands: &[Command]) -> Self {
        let mut hierarchy = CacheHierarchy::new(config);
        if config.policy == ReplacementPolicy::Optimal {
            for level in hierarchy.levels.iter_mut().filter(|l| l.is_present()) {
                let index = FutureAccessIndex::build(commands, level.geometry());
                info!(
                    "L{}: {} distinct blocks in future-reference index",
                    level.number(),
                    index.len()
                );
                level.set_future_index(index);
            }
        }
        hierarchy
    }

    pub fn l1(&self) -> &CacheLevel {
        &self[LevelId::L1]
    }

    pub fn l2(&self) -> &CacheLevel {
        &self[LevelId::L2]
    }

    pub fn inclusion(&self) -> Inclusion {
        self.inclusion
    }

    /// Level toward memory, if it has storage. `None` means main memory.
    pub fn outer_of(&self, id: LevelId) -> Option<LevelId> {
        let outer = id.0 + 1;
        self.levels
            .get(outer)
            .filter(|level| level.is_present())
            .map(|_| LevelId(outer))
    }

    /// Level toward the CPU. `None` for L1 and for an absent level.
    pub fn inner_of(&self, id: LevelId) -> Option<LevelId> {
        if id.0 == 0 || !self.levels[id.0].is_present() {
            return None;
        }
        Some(LevelId(id.0 - 1))
    }

    /// Replays trace command number `sequence` (1-based) against L1.
    pub fn submit(&mut self, command: Command, sequence: LogicalTime) {
        debug!("# {sequence} : {command}");
        self.access(LevelId::L1, command, sequence);
        if log::log_enabled!(log::Level::Trace) {
            for level in self.levels.iter().filter(|l| l.is_present()) {
                let set = level.index_of(command.addr) as usize;
                trace!("L{} set {}: {}", level.number(), set, level.describe_set(set));
            }
        }
    }

    pub fn run(&mut self, commands: &[Command]) {
        for (i, command) in commands.iter().enumerate() {
            self.submit(*command, i as LogicalTime + 1);
        }
    }

    /// Each nested access toward the outer level runs one logical tick after
    /// the one before it, writeback ahead of fetch.
    fn access(&mut self, id: LevelId, command: Command, now: LogicalTime) {
        match self.levels[id.0].lookup(command, now) {
            Placement::Hit => {}
            Placement::Fill { set, slot } => {
                if let Some(outer) = self.outer_of(id) {
                    self.access(outer, Command::read(command.addr), now + 1);
                }
                self.levels[id.0].install(set, slot, command, now);
            }
            Placement::Evict { set, slot } => self.evict(id, set, slot, command, now),
        }
    }

    fn evict(&mut self, id: LevelId, set: usize, slot: usize, command: Command, now: LogicalTime) {
        let Some(victim) = self.levels[id.0].block(set, slot).copied() else {
            return;
        };
        debug!(
            "L{} victim: {:x} (tag {:x}, index {}, {})",
            self.levels[id.0].number(),
            victim.addr,
            victim.tag,
            set,
            if !victim.valid {
                "invalid"
            } else if victim.dirty {
                "dirty"
            } else {
                "clean"
            }
        );

        if victim.dirty {
            self.levels[id.0].count_writeback();
        }

        if self.inclusion == Inclusion::Inclusive && victim.valid {
            if let Some(inner) = self.inner_of(id) {
                self.levels[inner.0].invalidate(victim.addr);
            }
        }

        if let Some(outer) = self.outer_of(id) {
            let mut tick = now;
            if victim.dirty && victim.valid {
                tick += 1;
                self.access(outer, Command::write(victim.addr), tick);
                self.levels[id.0].clean(set, slot);
            }
            tick += 1;
            self.access(outer, Command::read(command.addr), tick);
        }

        self.levels[id.0].install(set, slot, command, now);
    }
}

impl Index<LevelId> for CacheHierarchy {
    type Output = CacheLevel;

    fn index(&self, id: LevelId) -> &CacheLevel {
        &self.levels[id.0]
    }
}
