//! Timestamp inspector
//!
//! Read-only view of what the reorganizer would see: for each artifact the
//! device type, its time range (with offsets) in ms and as local datetimes,
//! and for inertial recordings the continuous segments between gaps.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{DataCollectError, Result};
use crate::raw::{discover, InertialSeries, TimestampReader, VideoProbe};
use crate::types::{DeviceType, TimeRange};

/// Local datetime layout used in reports
const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One continuous inertial segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRecord {
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
}

/// Inspection result of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectRecord {
    pub path: PathBuf,
    pub device_type: Option<DeviceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InspectRecord {
    fn failed(path: PathBuf, device_type: Option<DeviceType>, error: impl ToString) -> Self {
        Self {
            path,
            device_type,
            start_ms: None,
            end_ms: None,
            start_local: None,
            end_local: None,
            duration_ms: None,
            segments: None,
            error: Some(error.to_string()),
        }
    }
}

/// Format a timestamp in the data timezone
pub fn format_local(ms: i64, timezone_hours: i32) -> String {
    match (
        FixedOffset::east_opt(timezone_hours * 3600),
        DateTime::from_timestamp_millis(ms),
    ) {
        (Some(offset), Some(dt)) => dt.with_timezone(&offset).format(LOCAL_FORMAT).to_string(),
        _ => format!("{} ms", ms),
    }
}

/// Inspects artifacts with a shared configuration and video probe
pub struct Inspector<'a> {
    config: &'a Config,
    reader: TimestampReader<'a>,
}

impl<'a> Inspector<'a> {
    pub fn new(config: &'a Config, probe: &'a dyn VideoProbe) -> Self {
        Self {
            config,
            reader: TimestampReader::new(config, probe),
        }
    }

    /// Inspect one artifact
    pub fn inspect(&self, path: &Path, device_type: Option<DeviceType>) -> InspectRecord {
        let Some(device_type) = device_type else {
            return InspectRecord::failed(path.to_path_buf(), None, "unknown device type");
        };

        let offset = self.config.offset_ms(device_type);
        let range = match self.reader.raw_range(device_type, path) {
            Ok(raw) => match raw.shifted(offset) {
                Some(range) => range,
                None => {
                    let message = format!("offset {} ms overflows {}", offset, raw);
                    return InspectRecord::failed(path.to_path_buf(), Some(device_type), message);
                }
            },
            Err(e) => return InspectRecord::failed(path.to_path_buf(), Some(device_type), e),
        };

        let segments = if device_type.is_inertial() {
            match InertialSeries::load(device_type, path) {
                Ok(series) => Some(
                    series
                        .segments(self.config.max_time_gap, self.config.min_session_len)
                        .into_iter()
                        .filter_map(|s| s.shifted(offset).map(segment_record))
                        .collect(),
                ),
                Err(e) => {
                    return InspectRecord::failed(path.to_path_buf(), Some(device_type), e)
                }
            }
        } else {
            None
        };

        let tz = self.config.data_timezone;
        InspectRecord {
            path: path.to_path_buf(),
            device_type: Some(device_type),
            start_ms: Some(range.start_ms),
            end_ms: Some(range.end_ms),
            start_local: Some(format_local(range.start_ms, tz)),
            end_local: Some(format_local(range.end_ms, tz)),
            duration_ms: Some(range.duration_ms()),
            segments,
            error: None,
        }
    }

    /// Inspect every artifact under a raw root
    pub fn inspect_root(&self, root: &Path) -> Result<Vec<InspectRecord>> {
        let discovery = discover(root)?;
        let mut records: Vec<InspectRecord> = discovery
            .artifacts
            .iter()
            .map(|a| self.inspect(&a.path, a.device_type))
            .collect();
        for failure in discovery.failures {
            let path = match &failure {
                DataCollectError::Classification { path, .. } => path.clone(),
                _ => root.to_path_buf(),
            };
            records.push(InspectRecord::failed(path, None, failure));
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    /// Inspect explicit paths; the device type is the parent directory name
    pub fn inspect_paths(&self, paths: &[PathBuf]) -> Vec<InspectRecord> {
        paths
            .iter()
            .map(|path| self.inspect(path, device_type_of(path)))
            .collect()
    }
}

fn segment_record(range: TimeRange) -> SegmentRecord {
    SegmentRecord {
        start_ms: range.start_ms,
        end_ms: range.end_ms,
        duration_ms: range.duration_ms(),
    }
}

/// Device type from the directory holding an artifact
pub fn device_type_of(path: &Path) -> Option<DeviceType> {
    let parent = path.parent()?.file_name()?.to_string_lossy().into_owned();
    DeviceType::from_dir_name(&parent)
}

/// Write records as text or JSON lines
pub fn write_records<W: Write>(out: &mut W, records: &[InspectRecord], json: bool) -> Result<()> {
    for record in records {
        if json {
            serde_json::to_writer(&mut *out, record)?;
            writeln!(out)?;
            continue;
        }

        writeln!(out, "{}", record.path.display())?;
        if let Some(device_type) = record.device_type {
            writeln!(out, "  device type: {}", device_type)?;
        }
        if let Some(error) = &record.error {
            writeln!(out, "  error: {}", error)?;
            continue;
        }
        if let (Some(start), Some(end)) = (record.start_ms, record.end_ms) {
            writeln!(
                out,
                "  start: {} ({})",
                start,
                record.start_local.as_deref().unwrap_or("")
            )?;
            writeln!(
                out,
                "  end:   {} ({})",
                end,
                record.end_local.as_deref().unwrap_or("")
            )?;
            writeln!(out, "  duration: {:.3} s", (end - start) as f64 / 1000.0)?;
        }
        if let Some(segments) = &record.segments {
            writeln!(out, "  segments: {}", segments.len())?;
            for segment in segments {
                writeln!(
                    out,
                    "    [{}, {}] {:.3} s",
                    segment.start_ms,
                    segment.end_ms,
                    segment.duration_ms as f64 / 1000.0
                )?;
            }
        }
    }
    Ok(())
}
