//! Session data types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::TimeRange;

/// Globally unique session identifier.
///
/// Rendered as `{start_ms}_{end_ms}_{subject_id}_{day_index}`, e.g.
/// `1000_5000_S1_1`. Subject IDs may themselves contain underscores; the
/// two leading and the trailing component are split off first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId {
    pub start_ms: i64,
    pub end_ms: i64,
    pub subject_id: String,
    pub day_index: u32,
}

impl SessionId {
    pub fn new(start_ms: i64, end_ms: i64, subject_id: impl Into<String>, day_index: u32) -> Self {
        Self {
            start_ms,
            end_ms,
            subject_id: subject_id.into(),
            day_index,
        }
    }

    /// The session window
    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.start_ms, self.end_ms)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.start_ms, self.end_ms, self.subject_id, self.day_index
        )
    }
}

impl FromStr for SessionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{}' is not a session ID (start_end_subject_day)", s);

        let (start, rest) = s.split_once('_').ok_or_else(invalid)?;
        let (end, rest) = rest.split_once('_').ok_or_else(invalid)?;
        let (subject, day) = rest.rsplit_once('_').ok_or_else(invalid)?;

        if subject.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            start_ms: start.parse().map_err(|_| invalid())?,
            end_ms: end.parse().map_err(|_| invalid())?,
            subject_id: subject.to_string(),
            day_index: day.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for SessionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

/// One row of the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Sequential number from the log
    pub number: u32,
    /// Unique ID (window, subject, day)
    pub id: SessionId,
    /// Data-collection configuration variant
    pub setup_id: String,
}

impl Session {
    pub fn window(&self) -> TimeRange {
        self.id.window()
    }

    pub fn subject_id(&self) -> &str {
        &self.id.subject_id
    }
}
