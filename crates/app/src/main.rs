//! qpack-sim: simulate header-block delivery and acknowledgment over a
//! reordering network and report compression and head-of-line statistics.

mod config;
mod input_gen;

use config::Config;
use qpack_sim_core::simulator::Simulator;
use qpack_sim_core::QpackScheme;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("run with --help for usage");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(false)
        .init();

    if config.print_config {
        config.print();
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> qpack_sim_core::Result<()> {
    let requests = input_gen::generate_requests(config.seed, config.requests, config.hosts);

    let scheme = QpackScheme::with_table_size(config.table_size);
    let mut sim = Simulator::new(scheme, config.sim)?;
    let stats = sim.run(&requests)?;

    if config.print_metrics {
        stats.print_summary();
    } else {
        print!("{}", stats.export_text());
    }
    Ok(())
}
