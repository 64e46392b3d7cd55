//! Builders for raw trees and session logs

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary workspace with a raw root, a session log and an output root
pub struct Workspace {
    pub dir: TempDir,
    pub raw: PathBuf,
    pub log: PathBuf,
    pub out: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        fs::create_dir_all(&raw).unwrap();
        Self {
            log: dir.path().join("sessions.csv"),
            out: dir.path().join("processed"),
            raw,
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn raw_tree(&self) -> RawTreeBuilder<'_> {
        RawTreeBuilder { root: &self.raw }
    }

    pub fn write_log(&self, log: SessionLogBuilder) {
        fs::write(&self.log, log.build()).unwrap();
    }
}

/// Writes artifacts under `{root}/{date}/{device_id}/{device_type}/`
pub struct RawTreeBuilder<'a> {
    root: &'a Path,
}

impl RawTreeBuilder<'_> {
    fn file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Headerless watch CSV with one zeroed sample per timestamp
    pub fn watch(&self, date: &str, device: &str, name: &str, timestamps: &[i64]) -> PathBuf {
        let body: String = timestamps
            .iter()
            .map(|ts| format!("{},0.1,0.2,9.8,0,0,0\n", ts))
            .collect();
        self.file(&format!("{}/{}/watch/{}", date, device, name), &body)
    }

    /// TimerApp label file
    pub fn timerapp(&self, date: &str, device: &str, name: &str, rows: &[(&str, i64, i64)]) -> PathBuf {
        let mut body = String::from("label,start,end\n");
        for (label, start, end) in rows {
            body.push_str(&format!("{},{},{}\n", label, start, end));
        }
        self.file(&format!("{}/{}/timerapp/{}", date, device, name), &body)
    }

    /// Camera file; the name carries the local start time
    pub fn camera(&self, date: &str, device: &str, name: &str) -> PathBuf {
        self.file(&format!("{}/{}/cam/{}", date, device, name), "video")
    }

    /// SensorLogger recording directory with two sensors sharing `[start_ms, end_ms]`
    pub fn sensorlogger(&self, date: &str, device: &str, name: &str, start_ms: i64, end_ms: i64) -> PathBuf {
        let dir = self.root.join(format!("{}/{}/sensorlogger/{}", date, device, name));
        fs::create_dir_all(&dir).unwrap();
        for sensor in ["Accelerometer.csv", "Gyroscope.csv"] {
            let body = format!(
                "time,seconds_elapsed,z,y,x\n{},0,9.8,0.2,0.1\n{},1,9.8,0.2,0.1\n",
                start_ms * 1_000_000,
                end_ms * 1_000_000
            );
            fs::write(dir.join(sensor), body).unwrap();
        }
        dir
    }

    /// Any file at a path relative to the raw root
    pub fn other(&self, relative: &str, contents: &str) -> PathBuf {
        self.file(relative, contents)
    }
}

/// Session log rows
#[derive(Default)]
pub struct SessionLogBuilder {
    rows: Vec<(u32, i64, i64, String, String)>,
}

impl SessionLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(mut self, number: u32, start_ms: i64, end_ms: i64, subject: &str, setup: &str) -> Self {
        self.rows
            .push((number, start_ms, end_ms, subject.to_string(), setup.to_string()));
        self
    }

    pub fn build(&self) -> String {
        let mut text = String::from("session_no,start_ms,end_ms,subject_id,setup_id\n");
        for (number, start, end, subject, setup) in &self.rows {
            text.push_str(&format!("{},{},{},{},{}\n", number, start, end, subject, setup));
        }
        text
    }
}
