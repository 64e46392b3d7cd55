//! Configuration module for datacollect-rs
//!
//! This module handles the device configuration shared by all tools:
//! - Data timezone used to interpret camera file names and calendar days
//! - Per-device-type clock offsets
//! - The camera registry (which camera is mounted, which is handheld)
//! - Gap detection thresholds for the inspector
//! - ELAN export settings
//!
//! # File
//!
//! The configuration is a TOML file, `datacollect.toml` in the working
//! directory unless `--config` points elsewhere. Every key is optional.
//!
//! # Example
//!
//! ```toml
//! data_timezone = 7
//!
//! [devices.watch]
//! msec_offset = -250
//!
//! [cameras]
//! a33 = "mounted_rgb"
//! s21 = "handheld_rgb"
//!
//! [elan]
//! down_sample_by = 4
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{DataCollectError, Result};
use crate::types::{DataType, DeviceId, DeviceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default config filename looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "datacollect.toml";

/// Default data timezone (hours east of UTC)
pub const DEFAULT_DATA_TIMEZONE: i32 = 7;

/// Default maximum gap between consecutive inertial samples, in ms
pub const DEFAULT_MAX_TIME_GAP_MS: i64 = 1000;

/// Default minimum length of an inertial segment, in ms
pub const DEFAULT_MIN_SESSION_LEN_MS: i64 = 10_000;

/// Default ELAN down-sampling factor
pub const DEFAULT_DOWN_SAMPLE_BY: usize = 4;

/// Settings for one device type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Added to every timestamp read from this device type's files
    pub msec_offset: i64,
}

/// Per-device-type settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTable {
    pub cam: DeviceSettings,
    pub watch: DeviceSettings,
    pub sensorlogger: DeviceSettings,
    pub timerapp: DeviceSettings,
}

impl DeviceTable {
    /// Settings of a device type
    pub fn get(&self, device_type: DeviceType) -> &DeviceSettings {
        match device_type {
            DeviceType::Camera => &self.cam,
            DeviceType::Watch => &self.watch,
            DeviceType::SensorLogger => &self.sensorlogger,
            DeviceType::TimerApp => &self.timerapp,
        }
    }
}

/// ELAN export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElanSettings {
    /// Keep one inertial sample out of every `down_sample_by`
    pub down_sample_by: usize,
}

impl Default for ElanSettings {
    fn default() -> Self {
        Self {
            down_sample_by: DEFAULT_DOWN_SAMPLE_BY,
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timezone of camera file names and log calendar days (hours east of UTC)
    pub data_timezone: i32,

    /// Consecutive inertial samples further apart than this start a new segment (ms)
    pub max_time_gap: i64,

    /// Inertial segments shorter than this are ignored by the inspector (ms)
    pub min_session_len: i64,

    /// Per-device-type settings
    pub devices: DeviceTable,

    /// Camera device ID to video data type
    pub cameras: BTreeMap<String, DataType>,

    /// ELAN export settings
    pub elan: ElanSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_timezone: DEFAULT_DATA_TIMEZONE,
            max_time_gap: DEFAULT_MAX_TIME_GAP_MS,
            min_session_len: DEFAULT_MIN_SESSION_LEN_MS,
            devices: DeviceTable::default(),
            cameras: BTreeMap::new(),
            elan: ElanSettings::default(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataCollectError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            DataCollectError::Toml(inner) => {
                DataCollectError::Config(format!("Failed to parse {}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `datacollect.toml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    tracing::info!("Using config {}", default_path.display());
                    Self::load(default_path)
                } else {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check value ranges and the camera registry
    pub fn validate(&self) -> Result<()> {
        if !(-12..=14).contains(&self.data_timezone) {
            return Err(DataCollectError::Config(format!(
                "data_timezone must be between -12 and 14, got {}",
                self.data_timezone
            )));
        }
        if self.max_time_gap <= 0 {
            return Err(DataCollectError::Config(
                "max_time_gap must be a positive number of milliseconds".to_string(),
            ));
        }
        if self.min_session_len < 0 {
            return Err(DataCollectError::Config(
                "min_session_len must not be negative".to_string(),
            ));
        }
        if self.elan.down_sample_by == 0 {
            return Err(DataCollectError::Config(
                "elan.down_sample_by must be at least 1".to_string(),
            ));
        }
        for (camera, data_type) in &self.cameras {
            if !data_type.is_video() {
                return Err(DataCollectError::Config(format!(
                    "camera '{}' is registered as '{}', expected handheld_rgb or mounted_rgb",
                    camera, data_type
                )));
            }
        }
        Ok(())
    }

    /// Serialize to a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DataCollectError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Clock offset for a device type in ms
    pub fn offset_ms(&self, device_type: DeviceType) -> i64 {
        self.devices.get(device_type).msec_offset
    }

    /// Registered video data type of a camera
    pub fn camera_data_type(&self, device_id: &DeviceId) -> Option<DataType> {
        self.cameras.get(device_id.as_str()).copied()
    }

    /// Data timezone in milliseconds east of UTC
    pub fn timezone_offset_ms(&self) -> i64 {
        i64::from(self.data_timezone) * 3_600_000
    }
}
