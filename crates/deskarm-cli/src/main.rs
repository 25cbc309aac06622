//! deskarm CLI - headless driver for the arm simulator
//!
//! Runs the tick loop, optionally fed by live MQTT telemetry, and prints
//! render frames as JSON.

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use deskarm_kinematics::{AngleSnapshot, AngleState, ArmDimensions};
use deskarm_physics::{NamedPose, SceneConfig, SimConfig, Simulation};
use deskarm_telemetry::{TelemetryBridge, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// Ticks run when neither `--ticks` nor `--realtime` is given.
const DEFAULT_TICKS: u64 = 600;

#[derive(Parser)]
#[command(name = "deskarm")]
#[command(about = "Desk arm simulator with a physics shadow", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tick loop
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
        /// Pace ticks to the configured timestep
        #[arg(long)]
        realtime: bool,
        /// Feed angles from the MQTT broker
        #[arg(long)]
        mqtt: bool,
    },
    /// Pose the arm once and print the hand and finger poses
    Pose {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        angles: PoseArgs,
    },
    /// Print the default configuration
    Config,
}

#[derive(clap::Args, Debug, Default)]
struct PoseArgs {
    /// Base turntable (degrees)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    base: f64,
    /// Shoulder (degrees)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    shoulder: f64,
    /// Elbow (degrees)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    elbow: f64,
    /// Wrist twist (degrees)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    wrist: f64,
    /// Wrist pitch (degrees)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    wrist2: f64,
    /// Wrist roll (degrees)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    wrist3: f64,
    /// Gripper openness (degrees, 0-90)
    #[arg(long, default_value_t = 0.0)]
    hand: f64,
}

impl From<&PoseArgs> for AngleSnapshot {
    fn from(args: &PoseArgs) -> Self {
        AngleSnapshot {
            base: args.base,
            shoulder: args.shoulder,
            elbow: args.elbow,
            wrist: args.wrist,
            wrist2: args.wrist2,
            wrist3: args.wrist3,
            hand: args.hand,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    arm: ArmDimensions,
    scene: SceneConfig,
    telemetry: TelemetryConfig,
}

impl AppConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.sim().validate()?;
        config.telemetry.validate()?;
        Ok(config)
    }

    fn sim(&self) -> SimConfig {
        SimConfig {
            arm: self.arm.clone(),
            scene: self.scene.clone(),
        }
    }
}

#[derive(Serialize)]
struct PoseOutput {
    angles: AngleSnapshot,
    hand: deskarm_kinematics::Pose,
    fingers: Vec<NamedPose>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            ticks,
            realtime,
            mqtt,
        } => {
            let config = AppConfig::load(config.as_deref())?;
            run_loop(config, ticks, realtime, mqtt).await?;
        }
        Commands::Pose { config, angles } => {
            let config = AppConfig::load(config.as_deref())?;
            show_pose(&config, AngleSnapshot::from(&angles))?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&AppConfig::default())?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_loop(config: AppConfig, ticks: Option<u64>, realtime: bool, mqtt: bool) -> Result<()> {
    let angles = AngleState::shared();
    let mut sim = Simulation::new(config.sim(), angles.clone())?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let telemetry = if mqtt {
        let bridge = TelemetryBridge::connect(config.telemetry.clone(), angles.clone())
            .await
            .context("connecting to the telemetry broker")?;
        Some(tokio::spawn(async move { bridge.run(stop_rx).await }))
    } else {
        None
    };

    let limit = match ticks {
        Some(n) => Some(n),
        None if realtime => None,
        None => Some(DEFAULT_TICKS),
    };
    let period = Duration::try_from_secs_f32(config.scene.dt).context("invalid timestep")?;
    ensure!(!period.is_zero(), "timestep {} rounds to zero", config.scene.dt);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frame = sim.render_frame()?;
    while limit.map_or(true, |n| sim.tick_count() < n) {
        if realtime {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut ctrl_c => {
                    tracing::info!("interrupted");
                    break;
                }
            }
        }
        let report = sim.tick()?;
        for hit in &report.collisions {
            tracing::info!(
                tick = report.tick,
                object = %hit.object,
                shadow = %hit.shadow,
                phase = ?hit.phase,
                "contact"
            );
        }
        frame = report.frame;
    }

    let _ = stop_tx.send(true);
    if let Some(handle) = telemetry {
        handle.await??;
    }

    tracing::info!(ticks = sim.tick_count(), "simulation finished");
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

fn show_pose(config: &AppConfig, snapshot: AngleSnapshot) -> Result<()> {
    let angles = AngleState::shared();
    angles.load(&snapshot);
    let mut sim = Simulation::new(config.sim(), angles.clone())?;
    let report = sim.tick()?;

    let output = PoseOutput {
        angles: angles.snapshot(),
        hand: report.frame.hand,
        fingers: report.frame.fingers,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pose_args_parse_negative() {
        let cli = Cli::try_parse_from(["deskarm", "pose", "--base", "-45", "--hand", "30"]).unwrap();
        let Commands::Pose { angles, .. } = cli.command else {
            panic!("expected pose");
        };
        let snapshot = AngleSnapshot::from(&angles);
        assert_eq!(snapshot.base, -45.0);
        assert_eq!(snapshot.hand, 30.0);
    }

    #[test]
    fn test_default_config_dump_parses() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert_eq!(AppConfig::parse(&text).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::parse("[telemetry]\nhost = \"10.0.0.2\"\n[arm]\nelbow = 0.3").unwrap();
        assert_eq!(config.telemetry.host, "10.0.0.2");
        assert_eq!(config.arm.elbow, 0.3);
        assert_eq!(config.scene, SceneConfig::default());
    }

    #[test]
    fn test_bad_telemetry_config_rejected() {
        assert!(AppConfig::parse("[telemetry]\nkeep_alive_secs = 0").is_err());
    }

    #[test]
    fn test_huge_timestep_rejected() {
        assert!(AppConfig::parse("[scene]\ndt = 1e30").is_err());
    }

    #[test]
    fn test_show_pose_runs() {
        let snapshot = AngleSnapshot {
            shoulder: 30.0,
            hand: 45.0,
            ..Default::default()
        };
        show_pose(&AppConfig::default(), snapshot).unwrap();
    }
}
