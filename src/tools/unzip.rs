//! SensorLogger archive extraction
//!
//! SensorLogger exports each recording as a zip archive. This tool finds
//! `{raw_root}/*/*/sensorlogger/*.zip` and extracts every archive into a
//! sibling directory named after the archive stem, which is the layout the
//! reorganizer expects.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{DataCollectError, Result};
use crate::fsutil::partial_path;
use crate::types::DeviceType;

/// Outcome of one unzip run
#[derive(Debug, Default)]
pub struct UnzipReport {
    /// Archives matched by the pattern
    pub found: usize,
    /// Destination directories created
    pub extracted: Vec<PathBuf>,
    /// Archives whose destination already existed
    pub skipped: Vec<PathBuf>,
    /// Archives that could not be extracted
    pub failures: Vec<(PathBuf, String)>,
}

impl UnzipReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Glob pattern of SensorLogger archives under `raw_root`
pub fn archive_pattern(raw_root: &Path) -> String {
    let root = glob::Pattern::escape(&raw_root.to_string_lossy());
    format!(
        "{}/*/*/{}/*.zip",
        root.trim_end_matches('/'),
        DeviceType::SensorLogger.dir_name()
    )
}

/// Destination directory of an archive
pub fn destination_of(archive: &Path) -> PathBuf {
    archive.with_extension("")
}

/// Extract `archive` into `destination`, refusing entries that escape it
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| DataCollectError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;

    let staging = partial_path(destination);
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| DataCollectError::io(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| DataCollectError::io(&staging, e))?;

    let extracted = (|| -> Result<usize> {
        let mut count = 0;
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let relative = entry.enclosed_name().ok_or_else(|| {
                DataCollectError::parse(
                    archive,
                    format!("entry '{}' escapes the destination", entry.name()),
                )
            })?;
            let out_path = staging.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| DataCollectError::io(&out_path, e))?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| DataCollectError::io(parent, e))?;
            }
            let mut out = File::create(&out_path).map_err(|e| DataCollectError::io(&out_path, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| DataCollectError::io(&out_path, e))?;
            count += 1;
        }
        Ok(count)
    })();

    match extracted {
        Ok(count) => {
            fs::rename(&staging, destination).map_err(|e| DataCollectError::io(destination, e))?;
            Ok(count)
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            Err(e)
        }
    }
}

/// Extract every SensorLogger archive under `raw_root`
pub fn unzip_all(raw_root: &Path, delete_zip: bool) -> Result<UnzipReport> {
    if !raw_root.is_dir() {
        return Err(DataCollectError::FatalSetup(format!(
            "Raw data root {} is not a directory",
            raw_root.display()
        )));
    }

    let pattern = archive_pattern(raw_root);
    tracing::info!("Searching for archives in {}", pattern);
    let paths = glob::glob(&pattern)
        .map_err(|e| DataCollectError::FatalSetup(format!("Bad pattern {}: {}", pattern, e)))?;

    let mut report = UnzipReport::default();
    let mut archives = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => archives.push(path),
            Err(e) => report
                .failures
                .push((e.path().to_path_buf(), e.error().to_string())),
        }
    }
    archives.sort();
    report.found = archives.len();
    tracing::info!("Found {} archive(s)", archives.len());

    for archive in archives {
        let destination = destination_of(&archive);
        if destination.exists() {
            tracing::info!("Skipping {}, {} exists", archive.display(), destination.display());
            report.skipped.push(archive);
            continue;
        }

        match extract_archive(&archive, &destination) {
            Ok(count) => {
                tracing::info!(
                    "Extracted {} file(s) from {} to {}",
                    count,
                    archive.display(),
                    destination.display()
                );
                if delete_zip {
                    if let Err(e) = fs::remove_file(&archive) {
                        tracing::warn!("Could not delete {}: {}", archive.display(), e);
                    }
                }
                report.extracted.push(destination);
            }
            Err(e) => {
                tracing::warn!("Failed to extract {}: {}", archive.display(), e);
                report.failures.push((archive, e.to_string()));
            }
        }
    }

    Ok(report)
}
