//! Run reports
//!
//! Every discovered artifact ends up in the report exactly once: either as a
//! placed file with its action or as a failure with its reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::DataCollectError;
use crate::session::SessionId;

/// What happened to one target file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// Target did not exist and was written
    Created,
    /// Target already held identical content
    Unchanged,
    /// Target differed and was overwritten
    Replaced,
    /// Target differed and was left alone (skip policy)
    Kept,
    /// Dry run: target would be written
    Planned,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileAction::Created => "created",
            FileAction::Unchanged => "unchanged",
            FileAction::Replaced => "replaced",
            FileAction::Kept => "kept",
            FileAction::Planned => "planned",
        };
        f.write_str(name)
    }
}

/// Category of a per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Could not be attributed to a session, device or data type
    Classification,
    /// Classified but not copied
    Copy,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Classification => f.write_str("classification"),
            FailureKind::Copy => f.write_str("copy"),
        }
    }
}

/// One file that was not placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

impl FileFailure {
    /// Build a failure record from an error
    pub fn from_error(path: impl Into<PathBuf>, error: &DataCollectError) -> Self {
        let kind = if error.is_classification() {
            FailureKind::Classification
        } else {
            FailureKind::Copy
        };
        Self {
            path: path.into(),
            kind,
            message: error.to_string(),
        }
    }
}

/// One placed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    pub action: FileAction,
}

/// Completeness of a session directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Complete,
    Incomplete,
}

/// Result of applying one session plan
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub files: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
}

impl SessionReport {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            files: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.failures.is_empty() {
            SessionStatus::Complete
        } else {
            SessionStatus::Incomplete
        }
    }

    /// Number of files with the given action
    pub fn count(&self, action: FileAction) -> usize {
        self.files.iter().filter(|f| f.action == action).count()
    }
}

/// Result of a whole reorganizer run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Per-session results, sorted by session ID
    pub sessions: Vec<SessionReport>,
    /// Failures not attributable to any session
    pub unclassified: Vec<FileFailure>,
    pub dry_run: bool,
}

impl RunReport {
    /// Number of placed files with the given action
    pub fn count(&self, action: FileAction) -> usize {
        self.sessions.iter().map(|s| s.count(action)).sum()
    }

    /// All failures, unclassified first
    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.unclassified
            .iter()
            .chain(self.sessions.iter().flat_map(|s| s.failures.iter()))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    pub fn incomplete_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.status() == SessionStatus::Incomplete)
            .count()
    }

    pub fn sort(&mut self) {
        self.sessions
            .sort_by(|a, b| a.session_id.cmp(&b.session_id));
        for session in &mut self.sessions {
            session.files.sort_by(|a, b| a.target.cmp(&b.target));
            session.failures.sort_by(|a, b| a.path.cmp(&b.path));
        }
        self.unclassified.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "Dry run, nothing was written")?;
            for session in &self.sessions {
                writeln!(f, "{}", session.session_id)?;
                for file in &session.files {
                    writeln!(f, "  {} -> {}", file.source.display(), file.target.display())?;
                }
            }
        }

        writeln!(
            f,
            "Sessions: {} ({} incomplete)",
            self.sessions.len(),
            self.incomplete_sessions()
        )?;
        if self.dry_run {
            writeln!(f, "Files planned: {}", self.count(FileAction::Planned))?;
        } else {
            writeln!(
                f,
                "Files: {} created, {} unchanged, {} replaced, {} kept",
                self.count(FileAction::Created),
                self.count(FileAction::Unchanged),
                self.count(FileAction::Replaced),
                self.count(FileAction::Kept)
            )?;
        }
        writeln!(f, "Failures: {}", self.failure_count())?;
        for failure in self.failures() {
            writeln!(f, "  [{}] {}", failure.kind, failure.message)?;
        }
        Ok(())
    }
}
