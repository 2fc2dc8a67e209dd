//! Configuration for the qpack-sim application.
//!
//! Handles parsing command-line arguments and generating sensible defaults
//! (including randomized defaults that are reproducible with a seed).
//!
//! # Philosophy
//!
//! The tool should work with ZERO arguments, using intelligent defaults.
//! All defaults are printed so runs are reproducible.

use qpack_sim_core::network::LinkConfig;
use qpack_sim_core::simulator::SimConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::Level;

/// Complete configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seed for request generation and both links
    pub seed: u64,

    // === Workload ===
    /// Number of requests to encode
    pub requests: usize,

    /// Number of distinct hosts requests are spread over
    pub hosts: usize,

    // === Compression ===
    /// Dynamic table budget in bytes
    pub table_size: u32,

    // === Network ===
    /// Simulated connection config
    pub sim: SimConfig,

    // === Behavior ===
    /// Whether to print detailed config
    pub print_config: bool,

    /// Whether to print detailed metrics summary
    pub print_metrics: bool,

    /// Maximum log level
    pub log_level: Level,
}

/// Parse the value following a flag.
fn value<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> Result<T, String> {
    *i += 1;
    let raw = args
        .get(*i)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {flag}: {raw}"))
}

impl Config {
    /// Parse configuration from command-line arguments.
    ///
    /// If no arguments provided, generates randomized defaults using a time-based seed.
    /// If --seed is provided, uses that seed for all randomness (fully deterministic).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut seed: Option<u64> = None;
        let mut requests: Option<usize> = None;
        let mut hosts: Option<usize> = None;
        let mut table_size: Option<u32> = None;
        let mut base_latency_ms: Option<u64> = None;
        let mut jitter_ms: Option<u64> = None;
        let mut packet_interval: Option<usize> = None;
        let mut request_spacing_ms: Option<u64> = None;
        let mut print_config = false;
        let mut print_metrics = true;
        let mut log_level = Level::INFO;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--seed" => seed = Some(value(args, &mut i, "--seed")?),
                "--requests" => requests = Some(value(args, &mut i, "--requests")?),
                "--hosts" => hosts = Some(value(args, &mut i, "--hosts")?),
                "--table-size" => table_size = Some(value(args, &mut i, "--table-size")?),
                "--latency" => base_latency_ms = Some(value(args, &mut i, "--latency")?),
                "--jitter" => jitter_ms = Some(value(args, &mut i, "--jitter")?),
                "--no-jitter" => jitter_ms = Some(0),
                "--packet-interval" => {
                    packet_interval = Some(value(args, &mut i, "--packet-interval")?)
                }
                "--spacing" => request_spacing_ms = Some(value(args, &mut i, "--spacing")?),
                "--print-config" => print_config = true,
                "--no-metrics" => print_metrics = false,
                "--verbose" | "-v" => log_level = Level::DEBUG,
                "--quiet" | "-q" => log_level = Level::WARN,
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => return Err(format!("unknown argument: {other}")),
            }
            i += 1;
        }

        // Determine seed (explicit or time-based)
        let seed = seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });

        // Generate defaults using seed
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let base_latency_ms = base_latency_ms.unwrap_or_else(|| rng.gen_range(10..=80));
        let jitter_ms = jitter_ms.unwrap_or_else(|| rng.gen_range(0..=40));
        let link = |seed| LinkConfig {
            base_latency_ms,
            jitter_ms,
            seed,
        };

        let packet_interval = packet_interval.unwrap_or(1);
        if packet_interval == 0 {
            return Err("--packet-interval must be at least 1".to_string());
        }

        let config = Config {
            seed,
            requests: requests.unwrap_or(1000),
            hosts: hosts.unwrap_or_else(|| rng.gen_range(1..=8)).max(1),
            table_size: table_size.unwrap_or(4096),
            sim: SimConfig {
                request_link: link(seed),
                ack_link: link(seed.wrapping_add(1)),
                packet_interval,
                request_spacing_ms: request_spacing_ms.unwrap_or_else(|| rng.gen_range(1..=20)),
            },
            print_config,
            print_metrics,
            log_level,
        };

        Ok(config)
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        println!("Seed: {}", self.seed);
        println!("Requests: {}", self.requests);
        println!("Hosts: {}", self.hosts);
        println!("Table size: {} bytes", self.table_size);
        println!();
        println!("=== Network Simulation ===");
        println!("Base latency: {} ms", self.sim.request_link.base_latency_ms);
        println!("Jitter: ±{} ms", self.sim.request_link.jitter_ms);
        println!("Request spacing: {} ms", self.sim.request_spacing_ms);
        println!("Packet interval: {} requests", self.sim.packet_interval);
        println!();
    }
}

fn print_help() {
    println!("qpack-sim: header compression ack/ordering simulator");
    println!();
    println!("USAGE:");
    println!("    qpack-sim [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --seed <N>              Random seed for determinism");
    println!("    --requests <N>          Requests to encode (default: 1000)");
    println!("    --hosts <N>             Distinct hosts (default: random 1-8)");
    println!("    --table-size <N>        Dynamic table bytes (default: 4096)");
    println!();
    println!("    --latency <MS>          Base link latency (default: random 10-80)");
    println!("    --jitter <MS>           Latency jitter (default: random 0-40)");
    println!("    --no-jitter             Disable jitter (no reordering)");
    println!("    --spacing <MS>          Time between requests (default: random 1-20)");
    println!("    --packet-interval <N>   Requests per flushed packet (default: 1)");
    println!();
    println!("    --print-config          Print resolved configuration");
    println!("    --no-metrics            Don't print metrics summary");
    println!("    --verbose, -v           Debug logging");
    println!("    --quiet, -q             Warnings only");
    println!("    --help, -h              Print this help");
    println!();
    println!("EXAMPLES:");
    println!("    qpack-sim                                  # Run with random defaults");
    println!("    qpack-sim --seed 42                        # Deterministic run");
    println!("    qpack-sim --table-size 256 --jitter 30     # Eviction-heavy, reordering");
    println!();
}
