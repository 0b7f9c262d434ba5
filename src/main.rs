//! MOCR - Mission Operations Control Room
//!
//! Deterministic Apollo-class mission simulation engine.
//!
//! # Usage
//!
//! ```bash
//! # Fly the mission to a GET limit
//! mocr --mission missions/apollo11.json --until 195:18:35
//!
//! # Replay a recorded crew script, capture frames and the mission log
//! mocr --mission missions/apollo11.json --until 010:00:00 \
//!      --manual-script crew.json --frames frames.jsonl \
//!      --log-file mission_log.json --log-pretty
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: console tracing filter (default: info)
//! - `MOCR_PROFILE`: progression profile path (default: mocr_profile.json)

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mocr::manual::script::ManualScript;
use mocr::progression::ProgressionService;
use mocr::types::GetTime;
use mocr::{MissionData, SimConfig, Simulation};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "mocr")]
#[command(about = "MOCR deterministic Apollo-class mission simulator")]
#[command(version)]
struct CliArgs {
    /// Mission data JSON document
    #[arg(long, value_name = "PATH")]
    mission: PathBuf,

    /// Engine config TOML (defaults apply when omitted)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run until this GET (HHH:MM:SS)
    #[arg(long, value_name = "HHH:MM:SS")]
    until: String,

    /// Start GET for mission slices (HHH:MM:SS, default 000:00:00)
    #[arg(long, value_name = "HHH:MM:SS")]
    start: Option<String>,

    /// Tick rate in Hz
    #[arg(long, value_name = "N")]
    tick_rate: Option<u32>,

    /// Seconds between periodic mission-log status records
    #[arg(long, value_name = "S")]
    log_interval: Option<f64>,

    /// Disable checklist auto-advance (crew must ack every step)
    #[arg(long)]
    manual_checklists: bool,

    /// Auto-advance step duration in seconds
    #[arg(long, value_name = "S")]
    checklist_step_seconds: Option<f64>,

    /// Manual action script to replay
    #[arg(long, value_name = "PATH")]
    manual_script: Option<PathBuf>,

    /// Record executed manual actions to this file
    #[arg(long, value_name = "PATH")]
    record_manual_script: Option<PathBuf>,

    /// Flush the mission log to this file on exit
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Pretty-print the flushed mission log
    #[arg(long)]
    log_pretty: bool,

    /// HUD frame interval in seconds
    #[arg(long, value_name = "S")]
    hud_interval: Option<f64>,

    /// Disable HUD frame emission
    #[arg(long)]
    no_hud: bool,

    /// Write the HUD frame stream as JSON lines
    #[arg(long, value_name = "PATH")]
    frames: Option<PathBuf>,

    /// Suppress console output
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let mut config = match &args.config {
        Some(path) => SimConfig::load_from_file(path)?,
        None => SimConfig::default(),
    };
    apply_cli_overrides(&mut config, &args);

    let mission = MissionData::from_json_file(&args.mission)?;
    mission.validate()?;
    let mission_id = mission.mission.id.clone();

    let until = GetTime::parse(&args.until).context("--until")?;
    let start = args
        .start
        .as_deref()
        .map(GetTime::parse)
        .transpose()
        .context("--start")?
        .unwrap_or(GetTime::ZERO);

    let mut simulation = Simulation::new(mission, config)?.with_start(start);
    if let Some(path) = &args.manual_script {
        let script = ManualScript::load_from_file(path)?;
        info!(actions = script.actions.len(), path = %path.display(), "manual script loaded");
        simulation = simulation.with_manual_script(script);
    }
    if args.record_manual_script.is_some() {
        simulation = simulation.with_recording();
    }

    let summary = simulation.run(until)?;

    // Outputs: frames, recorded script, mission log
    if let Some(path) = &args.frames {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for frame in simulation.frames() {
            serde_json::to_writer(&mut file, frame)?;
            writeln!(file)?;
        }
        info!(frames = simulation.frames().len(), path = %path.display(), "frame stream written");
    }
    if let (Some(path), Some(recorder)) = (&args.record_manual_script, simulation.recorder()) {
        recorder.write_to_file(path)?;
        info!(actions = recorder.len(), path = %path.display(), "manual script recorded");
    }
    if let Some(path) = &args.log_file {
        simulation
            .mission_log()
            .flush_to_file(path, args.log_pretty)
            .with_context(|| format!("flushing mission log to {}", path.display()))?;
    }

    // Progression updates land only after a completed run.
    if summary.fatal_error.is_none() {
        let profile_path = std::env::var("MOCR_PROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("mocr_profile.json"));
        match ProgressionService::load_or_default(&profile_path) {
            Ok(mut progression) => {
                progression.record_run(&mission_id, &summary.score);
                progression.save_or_warn();
            }
            Err(e) => warn!(error = %e, "progression profile unavailable"),
        }
    }

    if !args.quiet {
        print_summary(&summary);
    }

    // Recoverable faults still exit zero; only fatal errors are non-zero.
    if let Some(fatal) = &summary.fatal_error {
        anyhow::bail!("fatal error during run: {fatal}");
    }
    Ok(())
}

fn apply_cli_overrides(config: &mut SimConfig, args: &CliArgs) {
    if let Some(tick_rate) = args.tick_rate {
        config.clock.tick_rate_hz = tick_rate;
    }
    if let Some(interval) = args.log_interval {
        config.clock.log_interval_seconds = interval;
    }
    if args.manual_checklists {
        config.checklists.auto_advance = false;
    }
    if let Some(seconds) = args.checklist_step_seconds {
        config.checklists.step_duration_seconds = seconds;
    }
    if let Some(interval) = args.hud_interval {
        config.clock.hud_interval_seconds = interval;
    }
    if args.no_hud {
        config.clock.hud_enabled = false;
    }
}

fn print_summary(summary: &mocr::RunSummary) {
    println!("────────────────────────────────────────────────────────");
    println!("  {}  {} → {}", summary.mission_id, summary.start_get, summary.final_get);
    println!(
        "  events: {} complete / {} failed / {} skipped (of {})",
        summary.events.complete, summary.events.failed, summary.events.skipped, summary.events.total
    );
    println!(
        "  faults: {} recoverable, {} hard",
        summary.recoverable_faults, summary.fatal_faults
    );
    println!(
        "  commander score: {:.1} ({})",
        summary.score.commander_score, summary.score.grade
    );
    println!(
        "  ticks: {} | frames: {} | log records: {}",
        summary.ticks, summary.frames_emitted, summary.log_records
    );
    println!("────────────────────────────────────────────────────────");
}
