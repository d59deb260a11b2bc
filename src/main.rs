use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant};

use minidrone_pilot::drone::{DroneCall, RecordingDrone};
use minidrone_pilot::live_status::LiveStatus;
use minidrone_pilot::script::{InputScript, ScriptPlayer};
use minidrone_pilot::{
    ControlMode, ControlSession, DroneControl, PilotConfig, PilotError, SharedSensors,
};

#[derive(Parser, Debug)]
#[command(name = "minidrone_pilot")]
#[command(about = "Headless minidrone pilot - replays an input script against a recording drone", long_about = None)]
struct Args {
    /// Control mode (flow, gsensor, buttons)
    #[arg(long, default_value = "flow")]
    mode: ControlMode,

    /// Duration in seconds (0 = until the script is done)
    #[arg(long, default_value = "0")]
    duration_secs: u64,

    /// JSON config file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON input script; a built-in demo flight is used when omitted
    #[arg(long)]
    script: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "pilot_sessions")]
    output_dir: String,
}

#[derive(Serialize, Deserialize)]
struct SessionOutput {
    session_id: String,
    mode: ControlMode,
    started_at: String,
    calls: Vec<DroneCall>,
    stats: Stats,
}

#[derive(Serialize, Deserialize)]
struct Stats {
    ticks: u64,
    emergency_lands: u64,
    total_calls: usize,
    take_offs: usize,
    lands: usize,
    emergencies: usize,
    script_events_applied: usize,
    script_events_rejected: usize,
    disconnect_confirmed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("[{}] Minidrone Pilot Starting", ts_now());
    println!("  Mode: {:?}", args.mode);
    println!("  Duration: {} seconds (0=script length)", args.duration_secs);
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    let config = match &args.config {
        Some(path) => PilotConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PilotConfig::default(),
    };
    let script = match &args.script {
        Some(path) => InputScript::load(path)
            .with_context(|| format!("loading script {}", path.display()))?,
        None => InputScript::demo(args.mode, &config),
    };
    let run_for = if args.duration_secs > 0 {
        Duration::from_secs(args.duration_secs)
    } else {
        script.duration() + Duration::from_secs(1)
    };
    println!(
        "[{}] {} scripted inputs over {:.1}s",
        ts_now(),
        script.events.len(),
        run_for.as_secs_f64()
    );

    let drone = Arc::new(RecordingDrone::new());
    let sensors = SharedSensors::new();
    let session = ControlSession::start(drone.clone(), args.mode, &config, sensors.clone())?;
    let started_at = session.started_at();
    let mut player = ScriptPlayer::new(script);

    let start = Instant::now();
    let mut step = interval(Duration::from_millis(10));
    let mut status_tick = interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut applied = 0usize;
    let mut rejected = 0usize;

    loop {
        tokio::select! {
            _ = step.tick() => {
                let elapsed = start.elapsed();
                if elapsed >= run_for {
                    println!("[{}] Duration reached, stopping...", ts_now());
                    break;
                }
                for event in player.due(elapsed) {
                    match event.input.apply(&session, &sensors) {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            log::warn!("input at {} ms rejected: {}", event.at_ms, e);
                            rejected += 1;
                        }
                    }
                }
            }
            _ = status_tick.tick() => {
                let status = snapshot(&session, start.elapsed().as_secs())?;
                let status_path = format!("{}/live_status.json", args.output_dir);
                let _ = status.save(&status_path);
            }
            _ = &mut ctrl_c => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
        }
    }

    let final_status = snapshot(&session, start.elapsed().as_secs())?;
    let session_id = session.session_id().to_string();

    let disconnect_confirmed = match session.shutdown().await {
        Ok(()) => true,
        Err(PilotError::DisconnectTimeout(limit)) => {
            println!("[{}] Drone did not confirm disconnect within {:?}", ts_now(), limit);
            false
        }
        Err(e) => return Err(e.into()),
    };

    let calls = drone.calls();
    let output = SessionOutput {
        session_id,
        mode: args.mode,
        started_at: started_at.to_rfc3339(),
        stats: Stats {
            ticks: final_status.ticks,
            emergency_lands: final_status.emergency_lands,
            total_calls: calls.len(),
            take_offs: drone.count(DroneCall::TakeOff),
            lands: drone.count(DroneCall::Land),
            emergencies: drone.count(DroneCall::Emergency),
            script_events_applied: applied,
            script_events_rejected: rejected,
            disconnect_confirmed,
        },
        calls,
    };
    let filename = format!("{}/commands_{}.json", args.output_dir, ts_now_clean());
    let json = serde_json::to_string_pretty(&output)?;
    std::fs::write(&filename, json)?;
    println!(
        "[{}] Final save: {} drone calls to {}",
        ts_now(),
        output.stats.total_calls,
        filename
    );

    let mut final_status = final_status;
    final_status.connection = drone.connection_state();
    let status_path = format!("{}/live_status_final.json", args.output_dir);
    let _ = final_status.save(&status_path);

    println!("\n=== Final Stats ===");
    println!("Ticks: {}", output.stats.ticks);
    println!("Emergency lands: {}", output.stats.emergency_lands);
    println!(
        "Script inputs: {} applied, {} rejected",
        output.stats.script_events_applied, output.stats.script_events_rejected
    );
    println!("Take-offs: {}, lands: {}", output.stats.take_offs, output.stats.lands);

    Ok(())
}

fn snapshot<D: DroneControl>(session: &ControlSession<D>, uptime: u64) -> Result<LiveStatus> {
    Ok(LiveStatus::new(session.session_id(), session.mode())
        .with_engine(&session.stats()?)
        .with_flight(&session.status()?)
        .with_uptime(uptime))
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
