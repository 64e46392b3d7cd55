//! Timestamp extraction for raw artifacts
//!
//! Every device type stores its time range differently:
//!
//! | Device       | Source                                                          |
//! |--------------|-----------------------------------------------------------------|
//! | cam          | start in the file name, end = start + video duration (ffprobe)  |
//! | watch        | first column of the first and last rows of a headerless CSV     |
//! | timerapp     | `start` of the first row, `end` of the last row                 |
//! | sensorlogger | overlap of the Accelerometer and Gyroscope `time` columns (ns)  |
//!
//! Only the first and last lines of CSV files are read, so large recordings
//! are classified without loading them. The configured per-device offset is
//! added to both ends of every range.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::Command;

use super::RawArtifact;
use crate::config::Config;
use crate::error::{DataCollectError, Result};
use crate::types::{DeviceType, TimeRange};

/// File name prefix of Timestamp Camera recordings
pub const CAMERA_FILE_PREFIX: &str = "TimeVideo_";

/// `strftime` layout of the rest of the camera file stem
pub const CAMERA_TIME_FORMAT: &str = "%Y%m%d_%H%M%S%.f";

/// Expected TimerApp header
pub const TIMERAPP_COLUMNS: [&str; 3] = ["label", "start", "end"];

/// SensorLogger files whose ranges are intersected
pub const SENSORLOGGER_FILES: [&str; 2] = ["Gyroscope.csv", "Accelerometer.csv"];

/// SensorLogger timestamp column (nanoseconds)
pub const SENSORLOGGER_TIME_COLUMN: &str = "time";

/// Chunk size when scanning a file backwards for its last line
const TAIL_CHUNK: u64 = 4096;

/// Access to video durations
#[cfg_attr(test, mockall::automock)]
pub trait VideoProbe {
    /// Duration of the first video stream in milliseconds
    fn duration_ms(&self, path: &Path) -> Result<i64>;
}

/// [`VideoProbe`] backed by the `ffprobe` executable
#[derive(Debug, Clone)]
pub struct FfprobeVideoProbe {
    program: String,
}

impl Default for FfprobeVideoProbe {
    fn default() -> Self {
        Self {
            program: "ffprobe".to_string(),
        }
    }
}

impl FfprobeVideoProbe {
    /// Use a specific ffprobe binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    duration: Option<String>,
}

/// Extract the video duration from `ffprobe -of json` output
pub fn parse_ffprobe_duration(json: &str) -> Result<i64> {
    let output: FfprobeOutput = serde_json::from_str(json)?;
    let stream = output
        .streams
        .first()
        .ok_or_else(|| DataCollectError::Probe("no video stream".to_string()))?;
    let seconds: f64 = stream
        .duration
        .as_deref()
        .ok_or_else(|| DataCollectError::Probe("video stream has no duration".to_string()))?
        .parse()
        .map_err(|e| DataCollectError::Probe(format!("bad duration: {}", e)))?;
    Ok((seconds * 1000.0).round() as i64)
}

impl VideoProbe for FfprobeVideoProbe {
    fn duration_ms(&self, path: &Path) -> Result<i64> {
        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-show_streams", "-select_streams", "v:0", "-of", "json"])
            .arg(path)
            .output()
            .map_err(|e| DataCollectError::Probe(format!("cannot run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(DataCollectError::Probe(format!(
                "{} exited with {} for {}",
                self.program,
                output.status,
                path.display()
            )));
        }

        parse_ffprobe_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Start time of a camera recording from its file name.
///
/// `TimeVideo_20220709_113327.07.mp4` is 2022-07-09 11:33:27.070 in the data
/// timezone.
pub fn camera_start_ms(file_name: &str, timezone_offset_ms: i64) -> Option<i64> {
    let rest = file_name.strip_prefix(CAMERA_FILE_PREFIX)?;
    let stem = rest.rsplit_once('.').map(|(stem, _ext)| stem)?;
    let local = NaiveDateTime::parse_from_str(stem, CAMERA_TIME_FORMAT).ok()?;
    Some(local.and_utc().timestamp_millis() - timezone_offset_ms)
}

/// First `count` non-blank lines of a text file
fn read_first_lines(path: &Path, count: usize) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| DataCollectError::io(path, e))?;
    let mut lines = Vec::with_capacity(count);
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| DataCollectError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push(line);
        if lines.len() == count {
            break;
        }
    }
    Ok(lines)
}

/// Last non-blank line of a text file, read from the end
pub fn read_last_line(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| DataCollectError::io(path, e))?;
    let len = file
        .seek(SeekFrom::End(0))
        .map_err(|e| DataCollectError::io(path, e))?;

    let mut tail: Vec<u8> = Vec::new();
    let mut pos = len;
    loop {
        let trimmed_len = tail
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);
        if let Some(newline) = tail[..trimmed_len].iter().rposition(|&b| b == b'\n') {
            return Ok(String::from_utf8_lossy(&tail[newline + 1..trimmed_len]).into_owned());
        }
        if pos == 0 {
            return Ok(String::from_utf8_lossy(&tail[..trimmed_len]).into_owned());
        }

        let step = pos.min(TAIL_CHUNK);
        pos -= step;
        let mut chunk = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(pos))
            .and_then(|_| file.read_exact(&mut chunk))
            .map_err(|e| DataCollectError::io(path, e))?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
    }
}

fn field(path: &Path, line: &str, column: usize) -> Result<i64> {
    let raw = line
        .split(',')
        .nth(column)
        .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\''))
        .ok_or_else(|| {
            DataCollectError::parse(path, format!("line '{}' has no column {}", line, column))
        })?;
    raw.parse::<i64>()
        .map_err(|_| DataCollectError::parse(path, format!("'{}' is not a timestamp", raw)))
}

fn header_columns(line: &str) -> Vec<String> {
    line.split(',')
        .map(|c| {
            c.trim()
                .trim_matches(|ch| ch == '"' || ch == '\'')
                .to_string()
        })
        .collect()
}

/// Range of a headerless watch CSV (first column, ms)
pub fn watch_range(path: &Path) -> Result<TimeRange> {
    let first = read_first_lines(path, 1)?
        .pop()
        .ok_or_else(|| DataCollectError::parse(path, "file is empty"))?;
    let last = read_last_line(path)?;
    let range = TimeRange::checked(field(path, &first, 0)?, field(path, &last, 0)?)
        .ok_or_else(|| DataCollectError::parse(path, "timestamps go backwards"))?;
    Ok(range)
}

/// Range of a TimerApp label CSV (`label,start,end`, ms)
pub fn timerapp_range(path: &Path) -> Result<TimeRange> {
    let lines = read_first_lines(path, 2)?;
    let header = lines
        .first()
        .ok_or_else(|| DataCollectError::parse(path, "file is empty"))?;
    if header_columns(header) != TIMERAPP_COLUMNS {
        return Err(DataCollectError::parse(
            path,
            format!("expected header {}, found '{}'", TIMERAPP_COLUMNS.join(","), header),
        ));
    }
    let first = lines
        .get(1)
        .ok_or_else(|| DataCollectError::parse(path, "no label rows"))?;
    let last = read_last_line(path)?;

    TimeRange::checked(field(path, first, 1)?, field(path, &last, 2)?)
        .ok_or_else(|| DataCollectError::parse(path, "last label ends before the first starts"))
}

fn ns_to_ms(ns: i64) -> i64 {
    (ns as f64 / 1e6).round() as i64
}

/// Range of one SensorLogger CSV (`time` column, ns rounded to ms)
pub fn sensorlogger_file_range(path: &Path) -> Result<TimeRange> {
    let lines = read_first_lines(path, 2)?;
    let header = lines
        .first()
        .ok_or_else(|| DataCollectError::parse(path, "file is empty"))?;
    if header_columns(header).first().map(String::as_str) != Some(SENSORLOGGER_TIME_COLUMN) {
        return Err(DataCollectError::parse(
            path,
            format!("first column must be '{}'", SENSORLOGGER_TIME_COLUMN),
        ));
    }
    let first = lines
        .get(1)
        .ok_or_else(|| DataCollectError::parse(path, "no samples"))?;
    let last = read_last_line(path)?;

    TimeRange::checked(ns_to_ms(field(path, first, 0)?), ns_to_ms(field(path, &last, 0)?))
        .ok_or_else(|| DataCollectError::parse(path, "timestamps go backwards"))
}

/// Range covered by every sensor of a SensorLogger recording directory
pub fn sensorlogger_range(dir: &Path) -> Result<TimeRange> {
    if !dir.is_dir() {
        return Err(DataCollectError::parse(
            dir,
            "expected a SensorLogger recording directory",
        ));
    }
    let mut overlap: Option<TimeRange> = None;
    for name in SENSORLOGGER_FILES {
        let range = sensorlogger_file_range(&dir.join(name))?;
        overlap = Some(match overlap {
            None => range,
            Some(current) => current.intersection(&range).ok_or_else(|| {
                DataCollectError::parse(dir, "sensor files do not overlap in time")
            })?,
        });
    }
    overlap.ok_or_else(|| DataCollectError::parse(dir, "no sensor files"))
}

/// Reads artifact time ranges with the configured offsets applied
pub struct TimestampReader<'a> {
    config: &'a Config,
    probe: &'a dyn VideoProbe,
}

impl<'a> TimestampReader<'a> {
    pub fn new(config: &'a Config, probe: &'a dyn VideoProbe) -> Self {
        Self { config, probe }
    }

    /// Range of a camera recording before offsets
    pub fn camera_range(&self, path: &Path) -> Result<TimeRange> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let start = camera_start_ms(&name, self.config.timezone_offset_ms()).ok_or_else(|| {
            DataCollectError::parse(
                path,
                format!(
                    "file name does not match {}{}.mp4",
                    CAMERA_FILE_PREFIX, CAMERA_TIME_FORMAT
                ),
            )
        })?;
        let duration = self.probe.duration_ms(path)?;
        let end = start.checked_add(duration).ok_or_else(|| {
            DataCollectError::parse(
                path,
                format!("duration {} ms overflows the start time {}", duration, start),
            )
        })?;
        Ok(TimeRange::new(start, end))
    }

    /// Raw range of a file of the given device type, without offset
    pub fn raw_range(&self, device_type: DeviceType, path: &Path) -> Result<TimeRange> {
        match device_type {
            DeviceType::Camera => self.camera_range(path),
            DeviceType::Watch => watch_range(path),
            DeviceType::TimerApp => timerapp_range(path),
            DeviceType::SensorLogger => sensorlogger_range(path),
        }
    }

    /// Range of an artifact with the device offset applied
    pub fn range(&self, artifact: &RawArtifact) -> Result<TimeRange> {
        let device_type = artifact.device_type.ok_or_else(|| {
            DataCollectError::parse(
                &artifact.path,
                format!("unknown device type '{}'", artifact.device_dir),
            )
        })?;
        let range = self.raw_range(device_type, &artifact.path)?;
        let offset = self.config.offset_ms(device_type);
        tracing::trace!(
            "{}: {} + offset {}",
            artifact.path.display(),
            range,
            offset
        );
        range.shifted(offset).ok_or_else(|| {
            DataCollectError::parse(
                &artifact.path,
                format!("offset {} ms overflows {}", offset, range),
            )
        })
    }
}
