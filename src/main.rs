use clap::Parser;
use env_logger::Env;
use log::LevelFilter;
use sim_cache::cli::Cli;
use sim_cache::report;

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Trace
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::from_env(Env::default().filter_or("SIM_CACHE_LOG", level.as_str()))
        .format_timestamp(None)
        .init();

    let simulation = match sim_cache::run(&cli) {
        Ok(simulation) => simulation,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    match report::render(
        &simulation.config,
        &simulation.hierarchy,
        &simulation.report,
        !cli.quiet_contents,
    ) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
