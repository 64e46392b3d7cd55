//! Applying session plans to the output tree
//!
//! Each placement is copied through a partial sibling, renamed into place
//! and verified against its source. Directory artifacts are copied member by
//! member. After all placements the session manifest (`session.json`) is
//! written, recording whether the session is complete.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::plan::{Placement, SessionPlan};
use super::report::{FileAction, FileFailure, FileOutcome, SessionReport, SessionStatus};
use crate::config::OverwritePolicy;
use crate::error::{DataCollectError, Result, ResultExt};
use crate::fsutil::{copy_verified, display_relative, files_identical, write_if_changed};
use crate::session::SessionId;
use crate::types::{DataType, DeviceId};

/// Manifest file name inside a session directory
pub const MANIFEST_FILE: &str = "session.json";

/// One placed artifact in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the session directory
    pub path: String,
    pub data_type: DataType,
    pub device_id: DeviceId,
    /// Raw path relative to the raw root
    pub source: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Contents of `session.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: SessionId,
    pub session_no: u32,
    pub setup_id: String,
    pub subject_id: String,
    pub day_index: u32,
    pub start_ms: i64,
    pub end_ms: i64,
    pub status: SessionStatus,
    pub files: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl SessionManifest {
    /// Read the manifest of a session directory
    pub fn load(session_dir: &Path) -> Result<Self> {
        let path = session_dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| DataCollectError::io(&path, e))?;
        serde_json::from_str(&text)
            .map_err(DataCollectError::from)
            .with_context(|| format!("Reading {}", path.display()))
    }

    /// Entries of one data type
    pub fn files_of(&self, data_type: DataType) -> impl Iterator<Item = &ManifestEntry> {
        self.files.iter().filter(move |f| f.data_type == data_type)
    }
}

/// Copy one file according to the overwrite policy
fn place_file(source: &Path, target: &Path, policy: OverwritePolicy) -> Result<FileAction> {
    if target.is_dir() {
        return Err(DataCollectError::io(
            target,
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "a directory occupies the target path",
            ),
        ));
    }
    if !target.exists() {
        copy_verified(source, target)?;
        return Ok(FileAction::Created);
    }
    if files_identical(source, target)? {
        return Ok(FileAction::Unchanged);
    }
    match policy {
        OverwritePolicy::Skip => Ok(FileAction::Kept),
        OverwritePolicy::Replace => {
            copy_verified(source, target)?;
            Ok(FileAction::Replaced)
        }
    }
}

/// Member files of a directory artifact, relative and sorted
fn member_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).map_err(|e| DataCollectError::io(&current, e))? {
            let entry = entry.map_err(|e| DataCollectError::io(&current, e))?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Copy a directory artifact member by member.
///
/// Target members missing from the source are removed under `replace` and
/// make the artifact `kept` under `skip`.
fn place_dir(source: &Path, target: &Path, policy: OverwritePolicy) -> Result<FileAction> {
    if target.exists() && !target.is_dir() {
        return Err(DataCollectError::io(
            target,
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "a file occupies the target directory path",
            ),
        ));
    }
    let existed = target.is_dir();
    let members = member_files(source)?;
    let mut actions = Vec::new();
    for member in &members {
        actions.push(place_file(&source.join(member), &target.join(member), policy)?);
    }
    if !existed {
        fs::create_dir_all(target).map_err(|e| DataCollectError::io(target, e))?;
        return Ok(FileAction::Created);
    }

    let wanted: HashSet<&PathBuf> = members.iter().collect();
    for extra in member_files(target)?.iter().filter(|m| !wanted.contains(m)) {
        match policy {
            OverwritePolicy::Skip => actions.push(FileAction::Kept),
            OverwritePolicy::Replace => {
                let path = target.join(extra);
                fs::remove_file(&path).map_err(|e| DataCollectError::io(&path, e))?;
                tracing::debug!("Removed stale {}", path.display());
                actions.push(FileAction::Replaced);
            }
        }
    }

    let action = if actions.iter().all(|a| *a == FileAction::Unchanged) {
        FileAction::Unchanged
    } else if actions.contains(&FileAction::Kept) {
        FileAction::Kept
    } else {
        FileAction::Replaced
    };
    Ok(action)
}

fn place(placement: &Placement, policy: OverwritePolicy) -> Result<FileAction> {
    if placement.is_dir {
        place_dir(&placement.source, &placement.target, policy)
    } else {
        place_file(&placement.source, &placement.target, policy)
    }
}

fn manifest_for(plan: &SessionPlan, report: &SessionReport) -> SessionManifest {
    let placed: HashSet<&Path> =
        report.files.iter().map(|f| f.target.as_path()).collect();
    let session = &plan.session;

    SessionManifest {
        session_id: session.id.clone(),
        session_no: session.number,
        setup_id: session.setup_id.clone(),
        subject_id: session.id.subject_id.clone(),
        day_index: session.id.day_index,
        start_ms: session.id.start_ms,
        end_ms: session.id.end_ms,
        status: report.status(),
        files: plan
            .placements
            .iter()
            .filter(|p| placed.contains(p.target.as_path()))
            .map(|p| ManifestEntry {
                path: display_relative(&p.target, &plan.directory),
                data_type: p.data_type,
                device_id: p.device_id.clone(),
                source: p.source_relative.clone(),
                start_ms: p.range.start_ms,
                end_ms: p.range.end_ms,
            })
            .collect(),
        failures: report
            .failures
            .iter()
            .map(|f| f.message.clone())
            .collect(),
    }
}

/// Apply one session plan.
///
/// Per-file failures are recorded in the report; the manifest is written
/// last and only if its content changed.
pub fn apply_session(plan: &SessionPlan, policy: OverwritePolicy, dry_run: bool) -> SessionReport {
    let mut report = SessionReport::new(plan.session.id.clone());

    if dry_run {
        report.files = plan
            .placements
            .iter()
            .map(|p| FileOutcome {
                source: p.source.clone(),
                target: p.target.clone(),
                action: FileAction::Planned,
            })
            .collect();
        return report;
    }

    tracing::info!(
        "Session {} ({} file(s))",
        plan.session.id,
        plan.placements.len()
    );

    for placement in &plan.placements {
        match place(placement, policy) {
            Ok(action) => {
                if action == FileAction::Kept {
                    tracing::warn!(
                        "Kept differing {} (overwrite policy: skip)",
                        placement.target.display()
                    );
                } else {
                    tracing::debug!("{} {}", action, placement.target.display());
                }
                report.files.push(FileOutcome {
                    source: placement.source.clone(),
                    target: placement.target.clone(),
                    action,
                });
            }
            Err(e) => {
                tracing::warn!("Failed to place {}: {}", placement.source.display(), e);
                report
                    .failures
                    .push(FileFailure::from_error(&placement.source, &e));
            }
        }
    }

    let manifest = manifest_for(plan, &report);
    let manifest_path = plan.directory.join(MANIFEST_FILE);
    let written = serde_json::to_vec_pretty(&manifest)
        .map_err(DataCollectError::from)
        .and_then(|bytes| write_if_changed(&manifest_path, &bytes));
    if let Err(e) = written {
        tracing::warn!("Failed to write {}: {}", manifest_path.display(), e);
        report
            .failures
            .push(FileFailure::from_error(&manifest_path, &e));
    }

    if report.status() == SessionStatus::Incomplete {
        tracing::warn!("Session {} is incomplete", plan.session.id);
    }
    report
}
