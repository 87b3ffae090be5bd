use crate::cli::Cli;
use crate::config::HierarchyConfig;
use crate::hierarchy::CacheHierarchy;
use crate::report::Report;
use log::info;
use std::error::Error;

pub mod cli;
/// Cache line metadata and per-policy stamps
pub mod block;
/// Validated hierarchy parameters
pub mod config;
/// Future-reference index for the optimal policy
pub mod future;
/// Two-level composition, propagation and inclusion
pub mod hierarchy;
/// One cache level: lookup, victim selection, install, invalidate
pub mod level;
/// Raw results, text report and CSV export
pub mod report;
/// Trace file parsing
pub mod trace;
/// Address decomposition
pub mod utils;

/// Everything a finished simulation produces.
pub struct Simulation {
    pub config: HierarchyConfig,
    pub hierarchy: CacheHierarchy,
    pub report: Report,
}

/// Validates the configuration, loads the whole trace and replays it.
/// Nothing is simulated unless both the configuration and the trace are valid.
pub fn run(cli: &Cli) -> Result<Simulation, Box<dyn Error>> {
    let config = HierarchyConfig::from_cli(cli)?;
    info!(
        "L1: {} sets x {} ways, L2: {} sets x {} ways, {} {}",
        config.l1_geometry.num_sets,
        config.l1_geometry.assoc,
        config.l2_geometry.num_sets,
        config.l2_geometry.assoc,
        config.policy.as_str(),
        config.inclusion.as_str()
    );

    let commands = trace::load_trace(&config.trace_file)?;
    info!("loaded {} commands from {}", commands.len(), config.trace_file);

    let mut hierarchy = CacheHierarchy::with_trace(&config, &commands);
    hierarchy.run(&commands);
    info!("simulation complete");

    let report = Report::from_hierarchy(&hierarchy);
    if let Some(path) = &cli.csv {
        report.write_csv(path)?;
        info!("wrote raw results to {path}");
    }

    Ok(Simulation {
        config,
        hierarchy,
        report,
    })
}
