use std::collections::{HashMap, VecDeque};

use crate::block::{LogicalTime, NextRef};
use crate::config::Geometry;
use crate::trace::Command;
use crate::utils::{SetIndex, Tag, index_of, tag_of};

/// Block identity under one level's bit widths.
pub type Identity = (Tag, SetIndex);

/// For every identity, the ascending trace positions at which it is referenced.
/// Queues are consumed as the simulation advances, so an index serves exactly
/// one run of one level.
#[derive(Debug, Clone, Default)]
pub struct FutureAccessIndex {
    queues: HashMap<Identity, VecDeque<LogicalTime>>,
}

impl FutureAccessIndex {
    pub fn build(commands: &[Command], geometry: &Geometry) -> Self {
        let mut queues: HashMap<Identity, VecDeque<LogicalTime>> = HashMap::new();
        for (i, command) in commands.iter().enumerate() {
            let identity = (
                tag_of(command.addr, geometry.tag_bits),
                index_of(command.addr, geometry.tag_bits, geometry.index_bits),
            );
            queues
                .entry(identity)
                .or_default()
                .push_back(i as LogicalTime + 1);
        }
        FutureAccessIndex { queues }
    }

    /// Takes the front of the queue as it stands. Entries already in the past
    /// are left for the victim scan to skip.
    pub fn poll(&mut self, identity: Identity) -> NextRef {
        self.queues
            .get_mut(&identity)
            .and_then(VecDeque::pop_front)
            .map_or(NextRef::Never, NextRef::At)
    }

    /// Drops every queued time `<= now` and pops the next one.
    pub fn next_after(&mut self, identity: Identity, now: LogicalTime) -> NextRef {
        let Some(queue) = self.queues.get_mut(&identity) else {
            return NextRef::Never;
        };
        while queue.front().is_some_and(|&t| t <= now) {
            queue.pop_front();
        }
        queue.pop_front().map_or(NextRef::Never, NextRef::At)
    }

    pub fn remaining(&self, identity: Identity) -> usize {
        self.queues.get(&identity).map_or(0, VecDeque::len)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
