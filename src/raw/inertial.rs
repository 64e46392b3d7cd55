//! Inertial time series
//!
//! Loads watch and SensorLogger recordings into a plain in-memory table used
//! by the inspector (gap detection), the sync viewer (plots) and the ELAN
//! exporter (down-sampled CSVs). Values are kept exactly as recorded.

use serde::Serialize;
use std::path::Path;

use crate::error::{DataCollectError, Result};
use crate::types::{DeviceType, TimeRange};

use super::timestamps::SENSORLOGGER_TIME_COLUMN;

/// Column names of a watch recording (headerless file)
pub const WATCH_COLUMNS: [&str; 6] = ["acc_x", "acc_y", "acc_z", "gyr_x", "gyr_y", "gyr_z"];

/// Column names given to SensorLogger accelerometer axes
pub const PHONE_COLUMNS: [&str; 3] = ["acc_x", "acc_y", "acc_z"];

/// SensorLogger accelerometer file inside a recording directory
pub const ACCELEROMETER_FILE: &str = "Accelerometer.csv";

/// Timestamped samples with named value columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InertialSeries {
    /// Names of the value columns
    pub columns: Vec<String>,
    /// Sample timestamps in ms
    pub timestamps: Vec<i64>,
    /// One row per timestamp, one value per column
    pub values: Vec<Vec<f64>>,
}

impl InertialSeries {
    /// Load an inertial artifact of the given device type
    pub fn load(device_type: DeviceType, path: &Path) -> Result<Self> {
        match device_type {
            DeviceType::Watch => Self::load_watch(path),
            DeviceType::SensorLogger => Self::load_sensorlogger(path),
            other => Err(DataCollectError::parse(
                path,
                format!("{} recordings are not inertial", other),
            )),
        }
    }

    /// Load a headerless watch CSV (timestamp ms + six axes)
    pub fn load_watch(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| DataCollectError::parse(path, e.to_string()))?;

        let mut series = Self {
            columns: WATCH_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        };

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| DataCollectError::parse(path, e.to_string()))?;
            if record.len() < 1 + WATCH_COLUMNS.len() {
                return Err(DataCollectError::parse(
                    path,
                    format!("row {} has {} columns, expected 7", row + 1, record.len()),
                ));
            }
            let ts = parse_number::<i64>(path, row, &record[0])?;
            let mut values = Vec::with_capacity(WATCH_COLUMNS.len());
            for value in record.iter().skip(1).take(WATCH_COLUMNS.len()) {
                values.push(parse_number::<f64>(path, row, value)?);
            }
            series.timestamps.push(ts);
            series.values.push(values);
        }

        tracing::debug!("Loaded {} watch samples from {}", series.len(), path.display());
        Ok(series)
    }

    /// Load SensorLogger accelerometer samples.
    ///
    /// `path` is either a recording directory or a sensor CSV. Timestamps are
    /// converted from ns to ms.
    pub fn load_sensorlogger(path: &Path) -> Result<Self> {
        let file = if path.is_dir() {
            path.join(ACCELEROMETER_FILE)
        } else {
            path.to_path_buf()
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&file)
            .map_err(|e| DataCollectError::parse(&file, e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| DataCollectError::parse(&file, e.to_string()))?
            .clone();
        let position = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataCollectError::parse(&file, format!("missing column '{}'", name)))
        };
        let time_col = position(SENSORLOGGER_TIME_COLUMN)?;
        let axis_cols = [position("x")?, position("y")?, position("z")?];

        let mut series = Self {
            columns: PHONE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        };

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| DataCollectError::parse(&file, e.to_string()))?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let ns = parse_number::<i64>(&file, row, field(time_col))?;
            let mut values = Vec::with_capacity(axis_cols.len());
            for col in axis_cols {
                values.push(parse_number::<f64>(&file, row, field(col))?);
            }
            series.timestamps.push((ns as f64 / 1e6).round() as i64);
            series.values.push(values);
        }

        tracing::debug!("Loaded {} phone samples from {}", series.len(), file.display());
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// First and last timestamp
    pub fn range(&self) -> Option<TimeRange> {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(&first), Some(&last)) => Some(TimeRange::new(first, last)),
            _ => None,
        }
    }

    /// Index of a value column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Keep every `factor`-th sample, starting with the first
    pub fn down_sample(&self, factor: usize) -> Self {
        let factor = factor.max(1);
        Self {
            columns: self.columns.clone(),
            timestamps: self.timestamps.iter().copied().step_by(factor).collect(),
            values: self.values.iter().cloned().step_by(factor).collect(),
        }
    }

    /// Continuous stretches of samples.
    ///
    /// A new segment starts wherever consecutive timestamps are more than
    /// `max_gap_ms` apart; segments shorter than `min_len_ms` are dropped.
    pub fn segments(&self, max_gap_ms: i64, min_len_ms: i64) -> Vec<TimeRange> {
        let mut segments = Vec::new();
        let Some(&first) = self.timestamps.first() else {
            return segments;
        };

        let mut start = first;
        let mut prev = first;
        for &ts in &self.timestamps[1..] {
            if ts - prev > max_gap_ms {
                segments.push(TimeRange::new(start, prev));
                start = ts;
            }
            prev = ts;
        }
        segments.push(TimeRange::new(start, prev));

        segments.retain(|s| s.duration_ms() >= min_len_ms);
        segments
    }

    /// `[time_ms + offset_ms, value]` pairs of one column, for plotting
    pub fn column_points(&self, column: usize, offset_ms: i64) -> Vec<[f64; 2]> {
        self.timestamps
            .iter()
            .zip(&self.values)
            .filter_map(|(&ts, row)| row.get(column).map(|&v| [ts.saturating_add(offset_ms) as f64, v]))
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(path: &Path, row: usize, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        DataCollectError::parse(path, format!("row {}: '{}' is not a number", row + 1, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn series(timestamps: &[i64]) -> InertialSeries {
        InertialSeries {
            columns: vec!["acc_x".into()],
            timestamps: timestamps.to_vec(),
            values: timestamps.iter().map(|&t| vec![t as f64]).collect(),
        }
    }

    #[test]
    fn test_load_watch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.csv");
        fs::write(&path, "1000,0.1,0.2,9.8,0.01,0.02,0.03\n1020,0.2,0.3,9.7,0,0,0\n").unwrap();

        let s = InertialSeries::load(DeviceType::Watch, &path).unwrap();
        assert_eq!(s.timestamps, vec![1000, 1020]);
        assert_eq!(s.columns.len(), 6);
        assert_eq!(s.values[0][2], 9.8);
        assert_eq!(s.range(), Some(TimeRange::new(1000, 1020)));
    }

    #[test]
    fn test_load_watch_rejects_short_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.csv");
        fs::write(&path, "1000,0.1,0.2\n").unwrap();
        assert!(InertialSeries::load_watch(&path).is_err());
    }

    #[test]
    fn test_load_sensorlogger_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(ACCELEROMETER_FILE),
            "time,seconds_elapsed,z,y,x\n1000400000,0,3,2,1\n1020600000,0.02,6,5,4\n",
        )
        .unwrap();

        let s = InertialSeries::load(DeviceType::SensorLogger, dir.path()).unwrap();
        assert_eq!(s.timestamps, vec![1000, 1021]);
        // columns are reordered to x, y, z
        assert_eq!(s.values[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(s.column_index("acc_z"), Some(2));
    }

    #[test]
    fn test_timerapp_is_not_inertial() {
        assert!(InertialSeries::load(DeviceType::TimerApp, Path::new("x.csv")).is_err());
    }

    #[test]
    fn test_segments_split_on_gaps() {
        let s = series(&[0, 10, 20, 5000, 5010, 30_000, 45_000]);
        assert_eq!(
            s.segments(1000, 0),
            vec![
                TimeRange::new(0, 20),
                TimeRange::new(5000, 5010),
                TimeRange::new(30_000, 30_000),
                TimeRange::new(45_000, 45_000),
            ]
        );
        // the first stretch is too short to keep
        assert_eq!(
            s.segments(20_000, 10_000),
            vec![TimeRange::new(30_000, 45_000)]
        );
        assert!(s.segments(1000, 100).is_empty());
        assert!(series(&[]).segments(1000, 0).is_empty());
    }

    #[test]
    fn test_down_sample_keeps_first() {
        let s = series(&[0, 1, 2, 3, 4, 5, 6]).down_sample(3);
        assert_eq!(s.timestamps, vec![0, 3, 6]);
        assert_eq!(s.values.len(), 3);
        assert_eq!(series(&[0, 1]).down_sample(0).len(), 2);
    }

    #[test]
    fn test_column_points_shifted() {
        let s = series(&[100, 200]);
        assert_eq!(s.column_points(0, -100), vec![[0.0, 100.0], [100.0, 200.0]]);
        assert!(s.column_points(5, 0).is_empty());
    }
}
