//! ELAN project export
//!
//! For every complete session in the processed tree this writes an ELAN
//! project folder `{elan_root}/{setup_id}/{session_id}/` containing:
//!
//! - `{session_id}.pfsx`, `{session_id}_tsconf.xml`, `{session_id}.eaf`
//!   rendered from the setup's templates
//! - `{session_id}_{data_type}.csv` for each inertial recording, down-sampled
//!   and with a leading `sec` column so ELAN can plot it
//!
//! # Templates
//!
//! Templates are picked from the template directory by setup ID
//! (`*{setup_id}*.pfsx`, `*{setup_id}*_tsconf.xml`, `*{setup_id}*.eaf`) and use
//! `{name}` placeholders; `{{` and `}}` produce literal braces.
//!
//! Existing output files are never overwritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DataCollectError, Result, ResultExt};
use crate::fsutil::{is_plain_name, write_atomic};
use crate::raw::InertialSeries;
use crate::reorganize::{SessionManifest, SessionStatus, MANIFEST_FILE};
use crate::types::{DataType, DeviceType};

/// Template kinds and the suffix of the files rendered from them
pub const TEMPLATE_SUFFIXES: [&str; 3] = [".pfsx", "_tsconf.xml", ".eaf"];

/// Render `{name}` placeholders
pub fn render_template(template: &str, params: &BTreeMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(DataCollectError::Template(format!(
                                "unclosed placeholder '{{{}'",
                                name
                            )))
                        }
                    }
                }
                let value = params.get(name.as_str()).ok_or_else(|| {
                    DataCollectError::Template(format!("no value for placeholder '{}'", name))
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(DataCollectError::Template(
                    "single '}' outside a placeholder".to_string(),
                ))
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// First template in `dir` matching `*{setup_id}*{suffix}`
pub fn find_template(dir: &Path, setup_id: &str, suffix: &str) -> Result<PathBuf> {
    let pattern = format!(
        "{}/*{}*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(setup_id),
        glob::Pattern::escape(suffix)
    );
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| DataCollectError::Template(format!("bad pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();
    matches.into_iter().next().ok_or_else(|| {
        DataCollectError::Template(format!(
            "no {} template for setup '{}' in {}",
            suffix,
            setup_id,
            dir.display()
        ))
    })
}

/// Inertial series as an ELAN CSV with a leading `sec` column
pub fn elan_csv(series: &InertialSeries) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["sec".to_string(), "timestamp".to_string()];
    header.extend(series.columns.iter().cloned());
    writer.write_record(&header)?;

    let first = series.timestamps.first().copied().unwrap_or(0);
    for (ts, row) in series.timestamps.iter().zip(&series.values) {
        let mut record = vec![
            ((ts - first) as f64 / 1000.0).to_string(),
            ts.to_string(),
        ];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| DataCollectError::Io(e.into_error()))
}

/// Outcome of an export run
#[derive(Debug, Default)]
pub struct ElanSummary {
    /// Session directories with a manifest
    pub sessions_found: usize,
    /// Sessions for which at least one file was written
    pub sessions_processed: usize,
    pub files_written: usize,
    /// Sessions left out on purpose, with the reason
    pub skipped: Vec<(String, String)>,
    /// Sessions that failed, with the error
    pub failures: Vec<(String, String)>,
}

impl std::fmt::Display for ElanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} sessions found", self.sessions_found)?;
        writeln!(f, "{} sessions processed", self.sessions_processed)?;
        writeln!(f, "{} files written", self.files_written)?;
        for (session, reason) in &self.skipped {
            writeln!(f, "  skipped {}: {}", session, reason)?;
        }
        for (session, error) in &self.failures {
            writeln!(f, "  failed {}: {}", session, error)?;
        }
        Ok(())
    }
}

/// Writes ELAN projects for a processed tree
#[derive(Debug, Clone)]
pub struct ElanExporter {
    processed_root: PathBuf,
    template_dir: PathBuf,
    elan_root: PathBuf,
    down_sample_by: usize,
}

enum SessionOutcome {
    Written(usize),
    Skipped(String),
}

impl ElanExporter {
    pub fn new(
        processed_root: impl Into<PathBuf>,
        template_dir: impl Into<PathBuf>,
        elan_root: impl Into<PathBuf>,
        down_sample_by: usize,
    ) -> Self {
        Self {
            processed_root: processed_root.into(),
            template_dir: template_dir.into(),
            elan_root: elan_root.into(),
            down_sample_by: down_sample_by.max(1),
        }
    }

    /// Session directories holding a manifest, sorted
    fn session_dirs(&self) -> Result<Vec<PathBuf>> {
        let root = &self.processed_root;
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| DataCollectError::io(root, e))? {
            let path = entry.map_err(|e| DataCollectError::io(root, e))?.path();
            if path.join(crate::reorganize::MANIFEST_FILE).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Export every complete session
    pub fn run(&self) -> Result<ElanSummary> {
        for (dir, what) in [
            (&self.processed_root, "Processed root"),
            (&self.template_dir, "Template directory"),
        ] {
            if !dir.is_dir() {
                return Err(DataCollectError::FatalSetup(format!(
                    "{} {} does not exist",
                    what,
                    dir.display()
                )));
            }
        }
        fs::create_dir_all(&self.elan_root).map_err(|e| {
            DataCollectError::FatalSetup(format!(
                "Cannot create {}: {}",
                self.elan_root.display(),
                e
            ))
        })?;

        let mut summary = ElanSummary::default();
        let dirs = self.session_dirs()?;
        summary.sessions_found = dirs.len();
        tracing::info!("Found {} session(s) in {}", dirs.len(), self.processed_root.display());

        for dir in dirs {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.export_session(&dir) {
                Ok(SessionOutcome::Written(0)) => {
                    tracing::info!("No new file for {}", name);
                }
                Ok(SessionOutcome::Written(files)) => {
                    summary.sessions_processed += 1;
                    summary.files_written += files;
                }
                Ok(SessionOutcome::Skipped(reason)) => {
                    tracing::info!("Skipping {}: {}", name, reason);
                    summary.skipped.push((name, reason));
                }
                Err(e) => {
                    tracing::warn!("Failed to export {}: {}", name, e);
                    summary.failures.push((name, e.to_string()));
                }
            }
        }

        tracing::info!(
            "{} sessions found, {} processed, {} files written",
            summary.sessions_found,
            summary.sessions_processed,
            summary.files_written
        );
        Ok(summary)
    }

    fn export_session(&self, session_dir: &Path) -> Result<SessionOutcome> {
        let manifest = SessionManifest::load(session_dir)?;
        if manifest.status != SessionStatus::Complete {
            return Ok(SessionOutcome::Skipped("session is incomplete".to_string()));
        }

        let video = manifest
            .files_of(DataType::MountedRgb)
            .chain(manifest.files_of(DataType::HandheldRgb))
            .next();
        let Some(video) = video else {
            return Ok(SessionOutcome::Skipped("no video".to_string()));
        };

        if !is_plain_name(&manifest.setup_id) {
            return Err(DataCollectError::parse(
                session_dir.join(MANIFEST_FILE),
                format!("setup '{}' is not a plain directory name", manifest.setup_id),
            ));
        }
        let session_id = manifest.session_id.to_string();
        let dest = self.elan_root.join(&manifest.setup_id).join(&session_id);
        fs::create_dir_all(&dest).map_err(|e| DataCollectError::io(&dest, e))?;
        let dest = absolute(&dest)?;

        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("session_id", session_id.clone());
        params.insert(
            "absolute_video_path",
            path_string(&absolute(&session_dir.join(&video.path))?),
        );
        params.insert(
            "absolute_xml_path",
            path_string(&dest.join(format!("{}_tsconf.xml", session_id))),
        );

        let mut written = 0;
        for (data_type, device_type, key) in [
            (DataType::InertiaWatch, DeviceType::Watch, "absolute_wrist_path"),
            (DataType::InertiaPhone, DeviceType::SensorLogger, "absolute_phone_path"),
        ] {
            let Some(entry) = manifest.files_of(data_type).next() else {
                continue;
            };
            let target = dest.join(format!("{}_{}.csv", session_id, data_type));
            if target.exists() {
                tracing::info!("Not writing {} because it already exists", target.display());
            } else {
                let series = InertialSeries::load(device_type, &session_dir.join(&entry.path))?
                    .down_sample(self.down_sample_by);
                write_atomic(&target, &elan_csv(&series)?)?;
                written += 1;
            }
            params.insert(key, path_string(&target));
        }

        for suffix in TEMPLATE_SUFFIXES {
            let target = dest.join(format!("{}{}", session_id, suffix));
            if target.exists() {
                tracing::info!("Skipping {} because it already exists", target.display());
                continue;
            }
            let template_path = find_template(&self.template_dir, &manifest.setup_id, suffix)?;
            tracing::debug!("Using template {}", template_path.display());
            let template = fs::read_to_string(&template_path)
                .map_err(|e| DataCollectError::io(&template_path, e))?;
            let content = render_template(&template, &params)
                .with_context(|| format!("Rendering {}", template_path.display()))?;
            write_atomic(&target, content.as_bytes())?;
            written += 1;
        }

        if written > 0 {
            tracing::info!("{} ELAN file(s) saved to {}", written, dest.display());
        }
        Ok(SessionOutcome::Written(written))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| DataCollectError::io(path, e))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
