use std::error::Error;
use std::fmt::{self, Display, Formatter, Write};

use serde::Serialize;

use crate::config::{HierarchyConfig, Inclusion};
use crate::hierarchy::CacheHierarchy;
use crate::level::CacheLevel;

/// Raw simulation results, in the order they are printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub l1_reads: u64,
    pub l1_read_misses: u64,
    pub l1_writes: u64,
    pub l1_write_misses: u64,
    pub l1_miss_rate: f32,
    /// Writebacks leaving L1 toward the next level, or toward memory when there is no L2.
    pub l1_writebacks: u64,
    pub l2_reads: u64,
    pub l2_read_misses: u64,
    pub l2_writes: u64,
    pub l2_write_misses: u64,
    pub l2_miss_rate: f32,
    pub l2_writebacks: u64,
    pub total_memory_traffic: u64,
}

impl Report {
    pub fn from_hierarchy(hierarchy: &CacheHierarchy) -> Self {
        let l1 = hierarchy.l1().stats();
        let l2 = hierarchy.l2().stats();
        let has_l2 = hierarchy.l2().is_present();

        let l1_miss_rate = if l1.accesses() > 0 {
            l1.misses() as f32 / l1.accesses() as f32
        } else {
            0.0
        };
        // L2 only counts read misses over reads.
        let l2_miss_rate = if has_l2 && l2.reads > 0 {
            l2.read_misses as f32 / l2.reads as f32
        } else {
            0.0
        };

        let (l1_writebacks, total_memory_traffic) = if has_l2 {
            let mut traffic =
                l2.read_misses + l2.write_misses + l2.writebacks + l2.invalidation_writebacks;
            if hierarchy.inclusion() == Inclusion::Inclusive {
                traffic += l1.invalidation_writebacks;
            }
            (l1.writebacks, traffic)
        } else {
            let writebacks = l1.writebacks + l1.invalidation_writebacks;
            (writebacks, l1.read_misses + l1.write_misses + writebacks)
        };

        Report {
            l1_reads: l1.reads,
            l1_read_misses: l1.read_misses,
            l1_writes: l1.writes,
            l1_write_misses: l1.write_misses,
            l1_miss_rate,
            l1_writebacks,
            l2_reads: l2.reads,
            l2_read_misses: l2.read_misses,
            l2_writes: l2.writes,
            l2_write_misses: l2.write_misses,
            l2_miss_rate,
            l2_writebacks: l2.writebacks + l2.invalidation_writebacks,
            total_memory_traffic,
        }
    }

    pub fn write_csv(&self, path: &str) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.serialize(self)?;
        writer.flush()?;
        Ok(())
    }
}

/// `0` when not strictly positive, else six decimals with halves rounded up.
pub fn format_rate(rate: f32) -> String {
    if rate > 0.0 {
        format!("{:.6}", (f64::from(rate) * 1e6).round() / 1e6)
    } else {
        "0".to_owned()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "===== Simulation results (raw) =====")?;
        writeln!(f, "a. number of L1 reads:\t\t\t{}", self.l1_reads)?;
        writeln!(f, "b. number of L1 read misses:\t\t{}", self.l1_read_misses)?;
        writeln!(f, "c. number of L1 writes:\t\t\t{}", self.l1_writes)?;
        writeln!(f, "d. number of L1 write misses:\t\t{}", self.l1_write_misses)?;
        writeln!(f, "e. L1 miss rate:\t\t\t{}", format_rate(self.l1_miss_rate))?;
        writeln!(f, "f. number of L1 writebacks:\t\t{}", self.l1_writebacks)?;
        writeln!(f, "g. number of L2 reads:\t\t\t{}", self.l2_reads)?;
        writeln!(f, "h. number of L2 read misses:\t\t{}", self.l2_read_misses)?;
        writeln!(f, "i. number of L2 writes:\t\t\t{}", self.l2_writes)?;
        writeln!(f, "j. number of L2 write misses:\t\t{}", self.l2_write_misses)?;
        writeln!(f, "k. L2 miss rate:\t\t\t{}", format_rate(self.l2_miss_rate))?;
        writeln!(f, "l. number of L2 writebacks:\t\t{}", self.l2_writebacks)?;
        writeln!(f, "m. total memory traffic:\t\t{}", self.total_memory_traffic)
    }
}

pub fn write_configuration(out: &mut impl Write, config: &HierarchyConfig) -> fmt::Result {
    writeln!(out, "===== Simulator configuration =====")?;
    writeln!(out, "BLOCKSIZE:\t\t{}", config.block_size)?;
    writeln!(out, "L1_SIZE:\t\t{}", config.l1.size)?;
    writeln!(out, "L1_ASSOC:\t\t{}", config.l1.assoc)?;
    writeln!(out, "L2_SIZE:\t\t{}", config.l2.size)?;
    writeln!(out, "L2_ASSOC:\t\t{}", config.l2.assoc)?;
    writeln!(out, "REPLACEMENT POLICY:\t{}", config.policy.as_str())?;
    writeln!(out, "INCLUSION PROPERTY:\t{}", config.inclusion.as_str())?;
    writeln!(out, "trace_file:\t\t{}", config.trace_file)
}

/// Final contents of a present level, one line per set. Occupied slots are
/// listed by tag, with ` D` after dirty ones.
pub fn write_contents(out: &mut impl Write, level: &CacheLevel) -> fmt::Result {
    if !level.is_present() {
        return Ok(());
    }
    writeln!(out, "===== L{} contents =====", level.number())?;
    for (i, set) in level.sets().iter().enumerate() {
        write!(out, "Set\t{i}:\t")?;
        for block in set.iter().flatten() {
            write!(out, "{:x}", block.tag)?;
            if block.dirty {
                write!(out, " D\t")?;
            } else {
                write!(out, "\t")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// The complete text report: configuration, contents (optional) and results.
pub fn render(
    config: &HierarchyConfig,
    hierarchy: &CacheHierarchy,
    report: &Report,
    with_contents: bool,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_configuration(&mut out, config)?;
    if with_contents {
        write_contents(&mut out, hierarchy.l1())?;
        write_contents(&mut out, hierarchy.l2())?;
    }
    write!(out, "{report}")?;
    Ok(out)
}
