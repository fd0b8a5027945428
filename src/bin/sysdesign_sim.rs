use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use sysdesign_sim::game::{GameError, SimulationDriver};
use sysdesign_sim::net::NodeKind;
use sysdesign_sim::sim::{CampaignSpec, SimTime};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "sysdesign-sim",
    about = "Run one level of the system-design traffic simulation headlessly"
)]
struct Args {
    /// Path to a campaign JSON file; defaults to the built-in campaign
    #[arg(long)]
    campaign: Option<PathBuf>,

    /// Level number (1-based)
    #[arg(long, default_value_t = 1)]
    level: usize,

    /// Override the level's random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this much logical time (ms) even if the level is unfinished
    #[arg(long, default_value_t = 600_000)]
    until_ms: u64,

    /// Buy a node before starting (repeatable): app, cache, cdn, lb, db, replica, queue
    #[arg(long = "add")]
    add: Vec<String>,

    /// Upgrade a node by key before starting (repeatable), e.g. App1
    #[arg(long = "upgrade")]
    upgrade: Vec<String>,

    /// Output viz JSON file
    #[arg(long)]
    viz_json: Option<PathBuf>,

    /// Print the final snapshot as JSON instead of the summary line
    #[arg(long)]
    json: bool,
}

fn load_campaign(path: Option<&PathBuf>) -> Result<CampaignSpec, String> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| format!("read {}: {e}", path.display()))?;
            CampaignSpec::from_json(&raw).map_err(|e| e.to_string())
        }
        None => CampaignSpec::builtin().map_err(|e| e.to_string()),
    }
}

fn build_driver(args: &Args, campaign: CampaignSpec) -> Result<SimulationDriver, GameError> {
    let mut driver = SimulationDriver::new(campaign, args.level)?;
    if let Some(seed) = args.seed {
        driver = driver.with_seed(seed)?;
    }
    if args.viz_json.is_some() {
        driver = driver.with_event_log()?;
    }
    Ok(driver)
}

fn apply_purchases(args: &Args, driver: &mut SimulationDriver) -> Result<(), String> {
    for raw in &args.add {
        let (kind, role) = NodeKind::parse_purchase(raw)?;
        let id = driver.add_node(kind, role).map_err(|e| e.to_string())?;
        info!(%kind, ?role, ?id, "🛒 已购买");
    }
    for key in &args.upgrade {
        let level = driver.upgrade_node(key).map_err(|e| e.to_string())?;
        info!(key = %key, level, "⬆️  已升级");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let campaign = match load_campaign(args.campaign.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    let mut driver = match build_driver(&args, campaign) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = apply_purchases(&args, &mut driver) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    let outcome = driver.run_to_completion(SimTime::from_millis(args.until_ms));
    let snap = driver.snapshot();

    if args.json {
        match serde_json::to_string_pretty(&snap) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: serialize snapshot: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        let result = match outcome {
            Some(o) if o.won => "won",
            Some(_) => "lost",
            None => "unfinished",
        };
        println!(
            "level={} result={} success={} errors={} total={} error_rate={:.4} money={} storage={} difficulty={} t_ms={}",
            snap.level,
            result,
            snap.success,
            snap.errors,
            snap.total,
            snap.error_rate,
            snap.money,
            snap.storage,
            snap.difficulty,
            snap.t_ms
        );
    }

    if let Some(path) = &args.viz_json {
        let json = match serde_json::to_string_pretty(driver.events()) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("error: serialize viz events: {e}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = fs::write(path, json) {
            eprintln!("error: write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        eprintln!("wrote viz events to {}", path.display());
    }
    ExitCode::SUCCESS
}
