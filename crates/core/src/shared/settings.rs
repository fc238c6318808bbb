use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orientation::domain::device_orientation::{CameraPosition, DeviceOrientation};
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_CONFIDENCE, DEFAULT_VIEW_HEIGHT, DEFAULT_VIEW_WIDTH, OVERLAY_COLOR,
    VIDEO_QUEUE_LABEL,
};
use crate::shared::sample_buffer::CameraIntrinsics;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted pipeline settings. Command-line flags override these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera_position: CameraPosition,
    pub device_orientation: DeviceOrientation,
    /// Capture device URL or path; `None` uses the platform default.
    pub device: Option<String>,
    /// libavdevice input format name (e.g. `v4l2`, `avfoundation`).
    pub device_format: Option<String>,
    pub camera_intrinsics: Option<CameraIntrinsics>,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub confidence: f64,
    pub view_width: u32,
    pub view_height: u32,
    pub discard_late_frames: bool,
    pub queue_label: String,
    pub overlay_color: [u8; 3],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_position: CameraPosition::Back,
            device_orientation: DeviceOrientation::Portrait,
            device: None,
            device_format: None,
            camera_intrinsics: None,
            model_path: None,
            model_url: None,
            confidence: DEFAULT_CONFIDENCE,
            view_width: DEFAULT_VIEW_WIDTH,
            view_height: DEFAULT_VIEW_HEIGHT,
            discard_late_frames: true,
            queue_label: VIDEO_QUEUE_LABEL.to_string(),
            overlay_color: OVERLAY_COLOR,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads from the default location, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings: {e}");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source: std::io::Error| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.into()))?;
        fs::write(path, json).map_err(write_err)
    }
}
