use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::cli::Cli;
use crate::utils::{ADDRESS_BITS, calculate_num_sets, log2_exact};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplacementPolicy {
    Lru,
    Fifo,
    Optimal,
}

impl ReplacementPolicy {
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(ReplacementPolicy::Lru),
            1 => Ok(ReplacementPolicy::Fifo),
            2 => Ok(ReplacementPolicy::Optimal),
            other => Err(Error::InvalidPolicy(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplacementPolicy::Lru => "LRU",
            ReplacementPolicy::Fifo => "FIFO",
            ReplacementPolicy::Optimal => "optimal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Inclusion {
    NonInclusive,
    Inclusive,
}

impl Inclusion {
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Inclusion::NonInclusive),
            1 => Ok(Inclusion::Inclusive),
            other => Err(Error::InvalidInclusion(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Inclusion::NonInclusive => "non-inclusive",
            Inclusion::Inclusive => "inclusive",
        }
    }
}

/// Size parameters of one level as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelConfig {
    pub size: u32,
    pub assoc: u32,
    pub block_size: u32,
}

/// Bit widths and shape of one level, derived from a validated `LevelConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub num_sets: u32,
    pub assoc: u32,
    pub offset_bits: u32,
    pub index_bits: u32,
    pub tag_bits: u32,
}

impl Geometry {
    /// A level with no storage. It still terminates propagation.
    pub fn absent() -> Self {
        Geometry::default()
    }

    pub fn is_present(&self) -> bool {
        self.num_sets > 0
    }
}

impl LevelConfig {
    pub fn geometry(&self, level: u8) -> Result<Geometry, Error> {
        if self.assoc == 0 {
            return Err(Error::ZeroAssociativity { level });
        }
        let offset_bits =
            log2_exact(self.block_size).ok_or(Error::BlockSizeNotPowerOfTwo(self.block_size))?;
        let num_sets =
            calculate_num_sets(self.size, self.assoc, self.block_size).ok_or(Error::InexactSets {
                level,
                size: self.size,
                assoc: self.assoc,
                block_size: self.block_size,
            })?;
        if num_sets == 0 {
            return Err(Error::NoSets { level });
        }
        let index_bits =
            log2_exact(num_sets).ok_or(Error::SetsNotPowerOfTwo { level, num_sets })?;
        Ok(Geometry {
            num_sets,
            assoc: self.assoc,
            offset_bits,
            index_bits,
            tag_bits: ADDRESS_BITS - offset_bits - index_bits,
        })
    }
}

/// A fully validated hierarchy description. Constructing one is the only way
/// to obtain geometries, so a misconfigured hierarchy never reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyConfig {
    pub block_size: u32,
    pub l1: LevelConfig,
    pub l2: LevelConfig,
    pub l1_geometry: Geometry,
    pub l2_geometry: Geometry,
    pub policy: ReplacementPolicy,
    pub inclusion: Inclusion,
    pub trace_file: String,
}

impl HierarchyConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, Error> {
        let l1 = LevelConfig {
            size: cli.l1_size,
            assoc: cli.l1_assoc,
            block_size: cli.block_size,
        };
        let l2 = LevelConfig {
            size: cli.l2_size,
            assoc: cli.l2_assoc,
            block_size: cli.block_size,
        };
        HierarchyConfig::new(
            l1,
            l2,
            ReplacementPolicy::from_code(cli.replacement_policy)?,
            Inclusion::from_code(cli.inclusion_property)?,
            &cli.trace_file,
        )
    }

    pub fn new(
        l1: LevelConfig,
        l2: LevelConfig,
        policy: ReplacementPolicy,
        inclusion: Inclusion,
        trace_file: &str,
    ) -> Result<Self, Error> {
        let block_size = l1.block_size;
        if block_size == 0 {
            return Err(Error::ZeroBlockSize);
        }
        if l2.block_size != block_size {
            return Err(Error::BlockSizeMismatch {
                l1: block_size,
                l2: l2.block_size,
            });
        }
        if l1.size == 0 {
            return Err(Error::MissingL1);
        }
        let l1_geometry = l1.geometry(1)?;
        let l2_geometry = if l2.size > 0 {
            l2.geometry(2)?
        } else {
            Geometry::absent()
        };

        Ok(HierarchyConfig {
            block_size,
            l1,
            l2,
            l1_geometry,
            l2_geometry,
            policy,
            inclusion,
            trace_file: trace_file.to_owned(),
        })
    }

    pub fn has_l2(&self) -> bool {
        self.l2_geometry.is_present()
    }
}

/// Configuration errors. All of them are reported before any simulation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    ZeroBlockSize,
    BlockSizeNotPowerOfTwo(u32),
    BlockSizeMismatch { l1: u32, l2: u32 },
    MissingL1,
    ZeroAssociativity { level: u8 },
    InexactSets { level: u8, size: u32, assoc: u32, block_size: u32 },
    NoSets { level: u8 },
    SetsNotPowerOfTwo { level: u8, num_sets: u32 },
    InvalidPolicy(u8),
    InvalidInclusion(u8),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::ZeroBlockSize => "block size must be positive".fmt(f),
            Self::BlockSizeNotPowerOfTwo(size) => {
                write!(f, "block size {size} is not a power of two")
            }
            Self::BlockSizeMismatch { l1, l2 } => {
                write!(f, "L1 block size {l1} differs from L2 block size {l2}")
            }
            Self::MissingL1 => "L1 size must be positive".fmt(f),
            Self::ZeroAssociativity { level } => {
                write!(f, "L{level} associativity must be positive")
            }
            Self::InexactSets {
                level,
                size,
                assoc,
                block_size,
            } => write!(
                f,
                "L{level} size {size} is not a multiple of assoc {assoc} * block size {block_size}"
            ),
            Self::NoSets { level } => write!(f, "L{level} has no sets"),
            Self::SetsNotPowerOfTwo { level, num_sets } => {
                write!(f, "L{level} set count {num_sets} is not a power of two")
            }
            Self::InvalidPolicy(code) => write!(
                f,
                "invalid replacement policy {code} (expected 0 = LRU, 1 = FIFO, 2 = optimal)"
            ),
            Self::InvalidInclusion(code) => write!(
                f,
                "invalid inclusion property {code} (expected 0 = non-inclusive, 1 = inclusive)"
            ),
        }
    }
}

impl StdError for Error {}
