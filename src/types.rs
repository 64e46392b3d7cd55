//! Core data types for datacollect-rs
//!
//! This module contains the vocabulary shared by every tool: what kind of
//! device produced an artifact, which data type it belongs to in the
//! processed tree, and the millisecond time ranges used for matching.
//!
//! # Main Types
//!
//! - [`DeviceType`] - Functional role of a capture device (camera, watch, ...)
//! - [`DataType`] - Category of data in the processed tree (mounted video, watch inertia, ...)
//! - [`DeviceId`] - Identifier of a physical device, taken from the raw layout
//! - [`TimeRange`] - Closed millisecond interval
//!
//! # Directory Names
//!
//! Device types appear as directory names in the raw layout
//! (`{date}/{device_id}/{device_type}/{file}`), data types as directory
//! names in the processed tree (`{session_id}/{data_type}/{file}`). Both
//! enums round-trip through those names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functional role of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceType {
    /// Phone running the Timestamp Camera app
    #[serde(rename = "cam")]
    Camera,
    /// Wrist watch with a 6-axis IMU
    #[serde(rename = "watch")]
    Watch,
    /// Phone running the SensorLogger app
    #[serde(rename = "sensorlogger")]
    SensorLogger,
    /// Phone running TimerApp for live labelling
    #[serde(rename = "timerapp")]
    TimerApp,
}

impl DeviceType {
    /// Directory name of this device type in the raw layout
    pub fn dir_name(&self) -> &'static str {
        match self {
            DeviceType::Camera => "cam",
            DeviceType::Watch => "watch",
            DeviceType::SensorLogger => "sensorlogger",
            DeviceType::TimerApp => "timerapp",
        }
    }

    /// Parse a raw-layout directory name
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.dir_name() == name)
    }

    /// Get all device types
    pub fn all() -> &'static [DeviceType] {
        &[
            DeviceType::Camera,
            DeviceType::Watch,
            DeviceType::SensorLogger,
            DeviceType::TimerApp,
        ]
    }

    /// Data type implied by the device type alone.
    ///
    /// Cameras return `None`: whether a camera is mounted or handheld is
    /// declared per device in the configuration.
    pub fn implied_data_type(&self) -> Option<DataType> {
        match self {
            DeviceType::Camera => None,
            DeviceType::Watch => Some(DataType::InertiaWatch),
            DeviceType::SensorLogger => Some(DataType::InertiaPhone),
            DeviceType::TimerApp => Some(DataType::OnlineLabel),
        }
    }

    /// Whether artifacts of this type are inertial time series
    pub fn is_inertial(&self) -> bool {
        matches!(self, DeviceType::Watch | DeviceType::SensorLogger)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Category of data in the processed tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "handheld_rgb")]
    HandheldRgb,
    #[serde(rename = "mounted_rgb")]
    MountedRgb,
    #[serde(rename = "inertia_watch")]
    InertiaWatch,
    #[serde(rename = "inertia_phone")]
    InertiaPhone,
    #[serde(rename = "online_label")]
    OnlineLabel,
    #[serde(rename = "offline_label")]
    OfflineLabel,
}

impl DataType {
    /// Directory name of this data type in the processed tree
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::HandheldRgb => "handheld_rgb",
            DataType::MountedRgb => "mounted_rgb",
            DataType::InertiaWatch => "inertia_watch",
            DataType::InertiaPhone => "inertia_phone",
            DataType::OnlineLabel => "online_label",
            DataType::OfflineLabel => "offline_label",
        }
    }

    /// Get all data types
    pub fn all() -> &'static [DataType] {
        &[
            DataType::HandheldRgb,
            DataType::MountedRgb,
            DataType::InertiaWatch,
            DataType::InertiaPhone,
            DataType::OnlineLabel,
            DataType::OfflineLabel,
        ]
    }

    /// Check if this is an RGB video type
    pub fn is_video(&self) -> bool {
        matches!(self, DataType::HandheldRgb | DataType::MountedRgb)
    }

    /// Check if this is an inertial type
    pub fn is_inertial(&self) -> bool {
        matches!(self, DataType::InertiaWatch | DataType::InertiaPhone)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown data type '{}'", s))
    }
}

/// Identifier of a physical capture device (e.g. `a33`, `W2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed time interval in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    /// Create a range; the bounds are swapped if given in reverse order
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        if start_ms <= end_ms {
            Self { start_ms, end_ms }
        } else {
            Self {
                start_ms: end_ms,
                end_ms: start_ms,
            }
        }
    }

    /// Create a range only if `start_ms <= end_ms`
    pub fn checked(start_ms: i64, end_ms: i64) -> Option<Self> {
        (start_ms <= end_ms).then_some(Self { start_ms, end_ms })
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Whether the two closed intervals share at least one instant
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start_ms <= other.end_ms && other.start_ms <= self.end_ms
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start_ms <= other.start_ms && other.end_ms <= self.end_ms
    }

    /// Intersection of two ranges, if any
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        TimeRange::checked(
            self.start_ms.max(other.start_ms),
            self.end_ms.min(other.end_ms),
        )
    }

    /// Shift both bounds by `offset_ms`, `None` if either bound overflows
    pub fn shifted(&self, offset_ms: i64) -> Option<TimeRange> {
        Some(TimeRange {
            start_ms: self.start_ms.checked_add(offset_ms)?,
            end_ms: self.end_ms.checked_add(offset_ms)?,
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_ms, self.end_ms)
    }
}
