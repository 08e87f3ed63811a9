use bus::Bus;
use clap::Parser;
use mimalloc::MiMalloc;
use runtime_store::{StoreOptions, start_store_runtime};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use watch_sync::EngineConfig;

mod scenario;

use scenario::{Report, Runner, Scenario, ScenarioError};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Replays a scripted page session against the watched-marker engine and a
/// local store, then prints what the page ended up showing.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (TOML).
    scenario: PathBuf,
    /// Engine config file (TOML); defaults apply to missing keys.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Ask the page to hide the site's own resume bar.
    #[arg(long)]
    hide_progress_bar: bool,
    /// How long to wait for store replies after each step.
    #[arg(long, default_value_t = 100)]
    settle_ms: u64,
}

fn run(args: &Args) -> Result<Report, ScenarioError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let scenario = Scenario::load(&args.scenario)?;

    let (bus, cmd_rx) = Bus::new();
    let store = start_store_runtime(
        cmd_rx,
        StoreOptions {
            hide_progress_bar: args.hide_progress_bar || scenario.hide_progress_bar,
            preload: scenario.preloaded(),
        },
    );

    let mut runner = Runner::new(
        &scenario,
        config,
        bus.connect(),
        bus.connect(),
        Duration::from_millis(args.settle_ms),
    )?;
    let outcome = runner.run(&scenario.steps);
    let report = runner.report();

    drop(runner);
    drop(bus);
    let store = store.join().map_err(|_| ScenarioError::StoreThread)?;
    log::info!(target: "watchmark", "store holds {} watched videos", store.len());

    outcome.map(|()| report)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!(target: "watchmark", "{err}");
            ExitCode::FAILURE
        }
    }
}
