//! Raw data discovery
//!
//! The raw root is laid out as `{date}/{device_id}/{device_type}/{artifact}`,
//! where an artifact is either a single file (video, watch CSV, TimerApp
//! CSV) or a SensorLogger recording directory.
//!
//! Discovery only walks the tree and reads path components. Timestamps are
//! read separately ([`timestamps`]) so the walk stays cheap and every
//! artifact can be reported individually.
//!
//! Hidden entries (leading `.`) and `.zip` archives are ignored; zipped
//! SensorLogger recordings are expanded first by the unzip tool.

pub mod inertial;
pub mod timestamps;

pub use inertial::InertialSeries;
pub use timestamps::{FfprobeVideoProbe, TimestampReader, VideoProbe};

use std::path::{Path, PathBuf};

use crate::error::{ClassificationReason, DataCollectError, Result};
use crate::types::{DeviceId, DeviceType};

/// Depth of an artifact below the raw root
const ARTIFACT_DEPTH: usize = 4;

/// One raw artifact located by its path in the raw layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    /// Full path to the file or directory
    pub path: PathBuf,
    /// `{date}` component, kept verbatim
    pub date: String,
    pub device_id: DeviceId,
    /// `{device_type}` component, kept verbatim
    pub device_dir: String,
    /// Parsed device type, `None` when the directory name is unknown
    pub device_type: Option<DeviceType>,
    /// Whether the artifact is a directory (SensorLogger recording)
    pub is_dir: bool,
}

impl RawArtifact {
    /// Interpret `path` relative to `root`.
    ///
    /// Fails with [`ClassificationReason::UnexpectedLayout`] when the path is
    /// not exactly four components below the root.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self> {
        let layout_error = || {
            DataCollectError::classification(path, ClassificationReason::UnexpectedLayout)
        };

        let relative = path.strip_prefix(root).map_err(|_| layout_error())?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.len() != ARTIFACT_DEPTH {
            return Err(layout_error());
        }

        Ok(Self {
            path: path.to_path_buf(),
            date: parts[0].clone(),
            device_id: DeviceId::new(parts[1].as_str()),
            device_dir: parts[2].clone(),
            device_type: DeviceType::from_dir_name(&parts[2]),
            is_dir: path.is_dir(),
        })
    }

    /// File name of the artifact
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Extension of a file artifact, without the dot
    pub fn extension(&self) -> Option<String> {
        if self.is_dir {
            return None;
        }
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Outcome of walking the raw root
#[derive(Debug, Default)]
pub struct Discovery {
    /// Artifacts with a well-formed path, sorted by path
    pub artifacts: Vec<RawArtifact>,
    /// Entries that do not follow the layout
    pub failures: Vec<DataCollectError>,
}

fn is_ignored(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return true,
    };
    name.starts_with('.')
        || path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| DataCollectError::io(dir, e))? {
        let entry = entry.map_err(|e| DataCollectError::io(dir, e))?;
        let path = entry.path();
        if !is_ignored(&path) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Walk the raw root and collect every artifact.
///
/// A missing or unreadable root is fatal. Files found above artifact depth
/// are reported as layout failures.
pub fn discover(root: &Path) -> Result<Discovery> {
    if !root.is_dir() {
        return Err(DataCollectError::FatalSetup(format!(
            "Raw data root {} is not a directory",
            root.display()
        )));
    }

    let mut discovery = Discovery::default();
    let mut level = vec![root.to_path_buf()];

    for depth in 1..=ARTIFACT_DEPTH {
        let mut next = Vec::new();
        for dir in &level {
            let entries = match sorted_entries(dir) {
                Ok(entries) => entries,
                Err(e) if depth == 1 => {
                    return Err(DataCollectError::FatalSetup(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    discovery.failures.push(e);
                    continue;
                }
            };
            for path in entries {
                if depth == ARTIFACT_DEPTH {
                    match RawArtifact::from_path(root, &path) {
                        Ok(artifact) => discovery.artifacts.push(artifact),
                        Err(e) => discovery.failures.push(e),
                    }
                } else if path.is_dir() {
                    next.push(path);
                } else {
                    tracing::debug!("Misplaced raw file {}", path.display());
                    discovery.failures.push(DataCollectError::classification(
                        &path,
                        ClassificationReason::UnexpectedLayout,
                    ));
                }
            }
        }
        level = next;
    }

    discovery.artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(
        "Discovered {} raw artifact(s) under {}",
        discovery.artifacts.len(),
        root.display()
    );
    Ok(discovery)
}
