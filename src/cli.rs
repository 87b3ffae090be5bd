use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sim_cache",
    version = "1.0",
    about = "Two-level set-associative cache hierarchy simulator"
)]
pub struct Cli {
    /// Block size in bytes (shared by both levels)
    pub block_size: u32,

    /// L1 capacity in bytes
    pub l1_size: u32,

    /// L1 associativity
    pub l1_assoc: u32,

    /// L2 capacity in bytes (0 disables L2)
    pub l2_size: u32,

    /// L2 associativity
    pub l2_assoc: u32,

    /// Replacement policy: 0 = LRU, 1 = FIFO, 2 = optimal
    pub replacement_policy: u8,

    /// Inclusion property: 0 = non-inclusive, 1 = inclusive
    pub inclusion_property: u8,

    /// Trace file of `r|w <hex address>` lines (`.zst` is decompressed)
    pub trace_file: String,

    /// Log every cache access
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable even more information, including set contents after each access
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Also write the raw results to this CSV file
    #[arg(short = 'c', long)]
    pub csv: Option<String>,

    /// Leave the per-set contents out of the report
    #[arg(short = 'q', long)]
    pub quiet_contents: bool,
}

impl Cli {
    /// Positional arguments only, with every flag left at its default.
    pub fn positional(
        block_size: u32,
        l1: (u32, u32),
        l2: (u32, u32),
        replacement_policy: u8,
        inclusion_property: u8,
        trace_file: &str,
    ) -> Self {
        Cli {
            block_size,
            l1_size: l1.0,
            l1_assoc: l1.1,
            l2_size: l2.0,
            l2_assoc: l2.1,
            replacement_policy,
            inclusion_property,
            trace_file: trace_file.to_owned(),
            verbose: false,
            debug: false,
            csv: None,
            quiet_contents: false,
        }
    }
}
