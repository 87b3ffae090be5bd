use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::utils::Tag;

/// Position in the logical access order. Trace commands start at their 1-based
/// sequence number and every nested propagated access adds one.
pub type LogicalTime = u64;

/// Time of the next reference to a block under the optimal policy.
/// `Never` orders after every concrete time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NextRef {
    At(LogicalTime),
    Never,
}

/// Per-policy replacement metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// LRU: time of the latest hit or of the allocation.
    LastTouch(LogicalTime),
    /// FIFO: allocation time, never refreshed.
    InsertedAt(LogicalTime),
    /// Optimal: next time this identity is referenced.
    NextRef(NextRef),
}

impl Display for Stamp {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Stamp::LastTouch(t) => write!(f, "touched@{t}"),
            Stamp::InsertedAt(t) => write!(f, "inserted@{t}"),
            Stamp::NextRef(NextRef::At(t)) => write!(f, "next@{t}"),
            Stamp::NextRef(NextRef::Never) => "next@never".fmt(f),
        }
    }
}

/// Metadata of one cache line. The full address of the allocating request is
/// kept so that victims can be written back and invalidated by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub valid: bool,
    pub dirty: bool,
    pub tag: Tag,
    pub addr: u32,
    pub stamp: Stamp,
}

impl Block {
    pub fn new(tag: Tag, addr: u32, dirty: bool, stamp: Stamp) -> Self {
        Block {
            valid: true,
            dirty,
            tag,
            addr,
            stamp,
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{:x}", self.tag)?;
        if self.dirty {
            write!(f, " D")?;
        }
        if !self.valid {
            write!(f, " (invalid)")?;
        }
        Ok(())
    }
}
