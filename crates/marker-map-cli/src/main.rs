//! Replay scripted frames through the marker-map pipeline.
//!
//! Stands in for a live camera demo: camera poses and marker detections
//! come from a JSON script instead of a SLAM backend and a QR decoder;
//! everything downstream of them is the real pipeline.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::Deserialize;

use marker_map::core::{init_with_level, WorldToCamera};
use marker_map::{
    AppConfig, ConfigError, Detection, FrameView, MapSession, MarkerDetector, MarkerTracker,
    PoseOracle,
};

#[derive(Parser)]
#[command(name = "marker-map", version, about = "Marker-map replay utilities")]
struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON frame script against a camera profile.
    Replay {
        /// Session configuration: camera profile + scan settings (JSON).
        #[arg(long)]
        config: PathBuf,
        /// Frame script: per-frame camera pose and detections (JSON).
        #[arg(long)]
        frames: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read frame script: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse frame script: {0}")]
    Script(#[from] serde_json::Error),
}

/// Frame script. A frame's detections are only consumed when the scan
/// gate fires on that frame, so scripts are normally replayed with
/// `scan.interval_frames = 1`.
#[derive(Deserialize)]
struct FrameScript {
    frames: Vec<ScriptFrame>,
}

#[derive(Deserialize)]
struct ScriptFrame {
    #[serde(default)]
    timestamp_s: f64,
    /// World-to-camera pose; absent while tracking is lost.
    pose: Option<ScriptPose>,
    #[serde(default)]
    detections: Vec<Detection>,
}

#[derive(Deserialize)]
struct ScriptPose {
    /// Row-major 3x3 rotation.
    rotation: [[f64; 3]; 3],
    /// Translation, meters.
    translation: [f64; 3],
}

impl ScriptPose {
    fn to_pose(&self) -> WorldToCamera {
        let r = &self.rotation;
        let m = Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        );
        // Scripted matrices may carry rounding; snap to the nearest
        // proper rotation.
        WorldToCamera::from_parts(Rotation3::from_matrix(&m), Vector3::from(self.translation))
    }
}

/// Replays scripted poses in frame order. The shared cursor tells the
/// detector which frame is current, since the scan gate does not fire on
/// every frame.
struct ScriptedOracle {
    poses: Vec<Option<WorldToCamera>>,
    cursor: Rc<Cell<usize>>,
    next: usize,
    last: Option<WorldToCamera>,
}

impl PoseOracle for ScriptedOracle {
    fn feed_frame(&mut self, _frame: &FrameView<'_>, _timestamp_s: f64) -> Option<WorldToCamera> {
        self.cursor.set(self.next);
        let pose = self.poses.get(self.next).copied().flatten();
        self.next += 1;
        if pose.is_some() {
            self.last = pose;
        }
        pose
    }

    fn current_pose(&self) -> Option<WorldToCamera> {
        self.last
    }

    fn reset(&mut self) {
        self.next = 0;
        self.last = None;
    }
}

struct ScriptedDetector {
    batches: Vec<Vec<Detection>>,
    cursor: Rc<Cell<usize>>,
}

impl MarkerDetector for ScriptedDetector {
    fn scan(&mut self, _frame: &FrameView<'_>) -> Vec<Detection> {
        self.batches.get(self.cursor.get()).cloned().unwrap_or_default()
    }
}

fn run_replay(config_path: &Path, frames_path: &Path) -> Result<(), ReplayError> {
    let cfg = AppConfig::from_json_file(config_path)?;
    let text = std::fs::read_to_string(frames_path)?;
    let script: FrameScript = serde_json::from_str(&text)?;

    let cursor = Rc::new(Cell::new(0));
    let oracle = ScriptedOracle {
        poses: script
            .frames
            .iter()
            .map(|f| f.pose.as_ref().map(ScriptPose::to_pose))
            .collect(),
        cursor: Rc::clone(&cursor),
        next: 0,
        last: None,
    };
    let detector = ScriptedDetector {
        batches: script.frames.iter().map(|f| f.detections.clone()).collect(),
        cursor,
    };

    let tracker = MarkerTracker::new(cfg.camera.intrinsics());
    let mut session = MapSession::new(oracle, detector, tracker, cfg.scan);

    let frame = FrameView {
        width: cfg.camera.cols,
        height: cfg.camera.rows,
        data: &[],
    };

    for (index, sf) in script.frames.iter().enumerate() {
        let summary = session.process_frame(&frame, sf.timestamp_s);
        if !summary.pose_available {
            println!("frame {index}: no pose");
            continue;
        }
        println!(
            "frame {index}: {} new, {} updated, {} mapped",
            summary.stats.new,
            summary.stats.updated,
            session.tracker().len()
        );
        for pm in &summary.projected {
            match (pm.pixel, pm.in_view) {
                (Some(px), true) => {
                    println!("  {}: ({:.1}, {:.1}) depth {:.3} m", pm.id, px.x, px.y, pm.depth_m)
                }
                (Some(px), false) => {
                    println!("  {}: ({:.1}, {:.1}) off-frame", pm.id, px.x, px.y)
                }
                (None, _) => println!("  {}: behind camera", pm.id),
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = init_with_level(level);

    let result = match cli.command {
        Command::Replay { config, frames } => run_replay(&config, &frames),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
