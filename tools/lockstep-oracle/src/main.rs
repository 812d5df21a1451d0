use anyhow::{bail, Result};
use clap::Parser;

mod cases;

#[derive(Parser, Debug)]
#[command(
    name = "lockstep-oracle",
    about = "Run the atomic-operation contract oracle: semantic scenarios, randomized \
             differential sweeps, concurrent stress passes and codegen expectation checks."
)]
struct Args {
    /// Only run cases whose name contains this substring
    filter: Option<String>,

    /// List matching cases without running them
    #[arg(long, action = clap::ArgAction::SetTrue)]
    list: bool,

    /// Threads per concurrent stress case
    #[arg(long, default_value_t = 8)]
    stress_threads: usize,

    /// Operations per thread in stress cases
    #[arg(long, default_value_t = 5_000)]
    stress_iters: usize,

    /// Seed for the randomized differential sweep
    #[arg(long, default_value_t = 0x10c4_57e9)]
    seed: u64,

    /// Random cases per width in the differential sweep
    #[arg(long, default_value_t = 2_000)]
    sweep_cases: usize,

    /// Per-case debug logging (RUST_LOG overrides)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = cases::Config {
        threads: args.stress_threads.max(1),
        iters: args.stress_iters.max(1),
        seed: args.seed,
        sweep_cases: args.sweep_cases,
    };

    let all = cases::build(config);
    let filter = args.filter.as_deref().unwrap_or("");
    let selected: Vec<_> = all.iter().filter(|c| c.name.contains(filter)).collect();
    if selected.is_empty() {
        bail!("no cases match filter `{filter}`");
    }

    if args.list {
        for case in &selected {
            println!("{}", case.name);
        }
        return Ok(());
    }

    let mut failures = 0usize;
    for case in &selected {
        tracing::debug!(case = %case.name, "running");
        if let Err(err) = (case.run)() {
            failures += 1;
            eprintln!("FAIL {}: {err:#}", case.name);
        }
    }

    println!("{} cases run, {} failed", selected.len(), failures);
    if failures > 0 {
        bail!("{failures} case(s) failed");
    }
    Ok(())
}
