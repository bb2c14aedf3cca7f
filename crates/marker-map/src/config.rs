//! Session configuration, loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use marker_map_core::CameraIntrinsics;

/// Errors produced while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid camera profile (fx={fx}, fy={fy} must be positive)")]
    InvalidCamera { fx: f64, fy: f64 },
}

/// Camera profile: calibrated intrinsics plus sensor resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub cols: u32,
    pub rows: u32,
}

impl CameraConfig {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(self.fx, self.fy, self.cx, self.cy)
    }
}

/// Marker-scan settings for the session loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Master switch for automatic scans.
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// Run the detector on every N-th frame; 0 disables automatic scans
    /// (manual scans still work).
    #[serde(default = "default_interval")]
    pub interval_frames: u64,
    /// Physical marker side length, meters.
    #[serde(default = "default_marker_size")]
    pub marker_size_m: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            interval_frames: default_interval(),
            marker_size_m: default_marker_size(),
        }
    }
}

fn default_enable() -> bool {
    true
}

fn default_interval() -> u64 {
    30
}

fn default_marker_size() -> f64 {
    0.04
}

/// Top-level session configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub camera: CameraConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl AppConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_json::from_str(text)?;
        if !(cfg.camera.fx > 0.0 && cfg.camera.fy > 0.0) {
            return Err(ConfigError::InvalidCamera {
                fx: cfg.camera.fx,
                fy: cfg.camera.fy,
            });
        }
        Ok(cfg)
    }
}
