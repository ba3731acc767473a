use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use log::error;

use signal_chain::blockchain::BlockLedger;
use signal_chain::config::MinerConfig;
use signal_chain::miner::Miner;
use signal_chain::mining::CancelToken;
use signal_chain::report::parse_batch;
use signal_chain::reward::ThreatLevel;
use signal_chain::scoring::{ScoreEngine, TrajectoryTracker};
use signal_chain::{Error, Result};

#[derive(Parser)]
#[command(name = "signal-chain", version)]
#[command(about = "Score signal reports, mine them and keep a tamper-evident ledger")]
struct Cli {
    /// Directory holding the ledger file
    #[arg(long, global = true)]
    ledger_dir: Option<PathBuf>,

    /// Network name stamped on blocks
    #[arg(long, global = true)]
    network: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a batch of reports and try to mine a block
    Mine(MineArgs),
    /// Recompute every block and report tampering
    Verify,
    /// Print chain statistics
    Stats {
        /// Also list report transactions recorded at this location
        #[arg(long)]
        location: Option<String>,
    },
    /// Score a reports file without mining
    Score {
        /// JSON array of reports, or an object with a `reports` array
        reports: PathBuf,
        /// EMA smoothing factor in [0, 1]; 0 disables smoothing
        #[arg(long, default_value_t = 0.0)]
        alpha: f64,
    },
}

#[derive(Args)]
struct MineArgs {
    /// JSON array of reports, or an object with a `reports` array
    reports: PathBuf,
    #[arg(long)]
    difficulty: Option<u32>,
    /// Batch time budget in seconds
    #[arg(long)]
    timeout: Option<f64>,
    #[arg(long)]
    threat_level: Option<String>,
    /// Search targets on the rayon thread pool
    #[arg(long)]
    parallel: bool,
    /// Keep mining the same batch for this many cycles
    #[arg(long)]
    cycles: Option<u64>,
}

fn main() -> ExitCode {
    let _ = dotenv();
    env_logger::init();

    let cli = Cli::parse();
    let mut config = MinerConfig::from_env();
    if let Some(dir) = cli.ledger_dir {
        config.ledger_dir = dir;
    }
    if let Some(network) = cli.network {
        config.network = network;
    }

    let result = match cli.command {
        Command::Mine(args) => mine(config, args),
        Command::Verify => verify(&config),
        Command::Stats { location } => stats(&config, location.as_deref()),
        Command::Score { reports, alpha } => score(&config, &reports, alpha),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn mine(mut config: MinerConfig, args: MineArgs) -> Result<ExitCode> {
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(secs) = args.timeout {
        config.timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| Error::InvalidConfiguration(format!("invalid timeout {secs}")))?;
    }
    if let Some(level) = args.threat_level {
        config.threat_level = ThreatLevel::parse(&level);
    }
    config.parallel |= args.parallel;

    let reports = read_reports(&args.reports)?;
    let miner = Miner::open(config)?;
    let cancel = CancelToken::new();

    if let Some(cycles) = args.cycles {
        let summary = miner.run_continuous(&reports, &cancel, Some(cycles));
        print_json(&summary);
        if !summary.is_clean() {
            eprintln!("{} of {} cycle(s) failed", summary.failed_cycles, summary.cycles);
            return Ok(ExitCode::FAILURE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = miner.run_cycle(&reports, &cancel)?;
    match &outcome.mined {
        Some(mined) => println!(
            "block #{} mined: hash={} nonce={} ratio={} reward={:.8}",
            mined.block.index, mined.block.block_hash, mined.nonce, mined.ratio, mined.reward
        ),
        None => println!(
            "no block found ({} accepted, {} skipped)",
            outcome.accepted, outcome.skipped
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn verify(config: &MinerConfig) -> Result<ExitCode> {
    let ledger = BlockLedger::open(&config.ledger_dir, &config.network)?;
    let report = ledger.verify();
    print_json(&report);
    if report.tamper_detected {
        eprintln!("tampering detected at block(s) {:?}", report.invalid_indices());
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn stats(config: &MinerConfig, location: Option<&str>) -> Result<ExitCode> {
    let ledger = BlockLedger::open(&config.ledger_dir, &config.network)?;
    print_json(&ledger.stats()?);
    if let Some(location) = location {
        print_json(&ledger.reports_at_location(location));
    }
    Ok(ExitCode::SUCCESS)
}

fn score(config: &MinerConfig, path: &Path, alpha: f64) -> Result<ExitCode> {
    let reports = read_reports(path)?;
    let mut tracker = TrajectoryTracker::new(ScoreEngine::new(config.honor)?, alpha)?;
    tracker.batch_update(&reports);
    print!("{}", tracker.history_ndjson());
    Ok(ExitCode::SUCCESS)
}

fn read_reports(path: &Path) -> Result<Vec<serde_json::Value>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
    parse_batch(&raw)
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).expect("json serialize"));
}
