//! Session log loading
//!
//! The session log is a CSV table with one row per data-collection session:
//!
//! ```text
//! session_no,start_ms,end_ms,subject_id,day_index,setup_id
//! 3,1000,5000,S1,1,A
//! ```
//!
//! Columns are matched by header name. `day_index` may be left blank (or the
//! column omitted entirely): it is then derived per subject as the dense rank
//! of the session's calendar date in the data timezone, so a subject's first
//! collection day is 1, the next distinct day 2, and so on.
//!
//! Any malformed row makes the whole log unusable: the reorganizer cannot
//! attribute files against a log it only partially understood.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use super::types::{Session, SessionId};
use crate::error::{DataCollectError, Result};
use crate::fsutil::is_plain_name;

/// Columns every session log must have
pub const REQUIRED_COLUMNS: &[&str] = &["session_no", "start_ms", "end_ms", "subject_id", "setup_id"];

#[derive(Debug, Deserialize)]
struct LogRow {
    session_no: u32,
    start_ms: i64,
    end_ms: i64,
    subject_id: String,
    #[serde(default)]
    day_index: Option<u32>,
    setup_id: String,
}

/// Parsed and validated session log
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    sessions: Vec<Session>,
}

impl SessionLog {
    /// Load a session log from a CSV file
    pub fn load(path: impl AsRef<Path>, timezone_offset_ms: i64) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            DataCollectError::FatalSetup(format!(
                "Cannot open session log {}: {}",
                path.display(),
                e
            ))
        })?;
        let log = Self::from_reader(file, timezone_offset_ms)?;
        tracing::info!(
            "Read session log {}, number of sessions: {}",
            path.display(),
            log.len()
        );
        Ok(log)
    }

    /// Parse a session log from any reader
    pub fn from_reader<R: Read>(reader: R, timezone_offset_ms: i64) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| DataCollectError::SessionLog {
                line: 1,
                message: format!("unreadable header: {}", e),
            })?
            .clone();
        let present: HashSet<&str> = headers.iter().collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !present.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(DataCollectError::SessionLog {
                line: 1,
                message: format!("missing column(s): {}", missing.join(", ")),
            });
        }

        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<LogRow>() {
            let row = record.map_err(|e| DataCollectError::SessionLog {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                message: e.to_string(),
            })?;
            rows.push(row);
        }

        Self::from_rows(rows, timezone_offset_ms)
    }

    fn from_rows(rows: Vec<LogRow>, timezone_offset_ms: i64) -> Result<Self> {
        // data rows start on line 2
        let line_of = |idx: usize| idx as u64 + 2;

        for (idx, row) in rows.iter().enumerate() {
            if row.start_ms >= row.end_ms {
                return Err(DataCollectError::SessionLog {
                    line: line_of(idx),
                    message: format!(
                        "session {} starts at {} but ends at {}",
                        row.session_no, row.start_ms, row.end_ms
                    ),
                });
            }
            if row.subject_id.is_empty() || row.setup_id.is_empty() {
                return Err(DataCollectError::SessionLog {
                    line: line_of(idx),
                    message: format!("session {} has an empty subject or setup", row.session_no),
                });
            }
            for (column, value) in [("subject", &row.subject_id), ("setup", &row.setup_id)] {
                if !is_plain_name(value) {
                    return Err(DataCollectError::SessionLog {
                        line: line_of(idx),
                        message: format!("{} '{}' is not a plain directory name", column, value),
                    });
                }
            }
        }

        let derived_days = derive_day_indices(&rows, timezone_offset_ms)?;

        let mut numbers = HashSet::new();
        let mut ids = HashSet::new();
        let mut sessions = Vec::with_capacity(rows.len());

        for (idx, row) in rows.into_iter().enumerate() {
            let day_index = match row.day_index {
                Some(day) => day,
                None => derived_days[idx],
            };

            if !numbers.insert(row.session_no) {
                return Err(DataCollectError::SessionLog {
                    line: line_of(idx),
                    message: format!("duplicate session number {}", row.session_no),
                });
            }

            let id = SessionId::new(row.start_ms, row.end_ms, row.subject_id, day_index);
            if !ids.insert(id.clone()) {
                return Err(DataCollectError::SessionLog {
                    line: line_of(idx),
                    message: format!("duplicate session ID {}", id),
                });
            }

            sessions.push(Session {
                number: row.session_no,
                id,
                setup_id: row.setup_id,
            });
        }

        Ok(Self { sessions })
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Find a session by its log number
    pub fn by_number(&self, number: u32) -> Option<&Session> {
        self.sessions.iter().find(|s| s.number == number)
    }

    /// Find a session by its ID
    pub fn by_id(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }
}

/// Calendar date of a timestamp in the data timezone
fn local_date(ms: i64, timezone_offset_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms.checked_add(timezone_offset_ms)?).map(|dt| dt.date_naive())
}

/// Dense rank of each row's start date among its subject's dates (1-based)
fn derive_day_indices(rows: &[LogRow], timezone_offset_ms: i64) -> Result<Vec<u32>> {
    let mut dates = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let date = local_date(row.start_ms, timezone_offset_ms).ok_or_else(|| {
            DataCollectError::SessionLog {
                line: idx as u64 + 2,
                message: format!("start_ms {} is out of range", row.start_ms),
            }
        })?;
        dates.push(date);
    }

    let mut per_subject: HashMap<&str, BTreeSet<NaiveDate>> = HashMap::new();
    for (row, date) in rows.iter().zip(&dates) {
        per_subject
            .entry(row.subject_id.as_str())
            .or_default()
            .insert(*date);
    }

    let ranks: HashMap<&str, BTreeMap<NaiveDate, u32>> = per_subject
        .into_iter()
        .map(|(subject, days)| {
            let ranked = days
                .into_iter()
                .enumerate()
                .map(|(i, d)| (d, i as u32 + 1))
                .collect();
            (subject, ranked)
        })
        .collect();

    Ok(rows
        .iter()
        .zip(&dates)
        .map(|(row, date)| ranks[row.subject_id.as_str()][date])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn parse(text: &str) -> Result<SessionLog> {
        SessionLog::from_reader(text.as_bytes(), 0)
    }

    #[test]
    fn test_parse_basic_log() {
        let log = parse(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n\
             3,1000,5000,S1,1,A\n\
             4,6000,9000,S2,2,B\n",
        )
        .unwrap();

        assert_eq!(log.len(), 2);
        let first = log.by_number(3).unwrap();
        assert_eq!(first.id.to_string(), "1000_5000_S1_1");
        assert_eq!(first.setup_id, "A");
        assert_eq!(log.by_id(&"6000_9000_S2_2".parse().unwrap()).unwrap().number, 4);
    }

    #[test]
    fn test_column_order_and_whitespace() {
        let log = parse(
            "setup_id, subject_id, session_no, end_ms, start_ms, day_index\n\
             A, S1, 1, 5000, 1000, 1\n",
        )
        .unwrap();
        assert_eq!(log.sessions()[0].id.to_string(), "1000_5000_S1_1");
    }

    #[test]
    fn test_day_index_derived_per_subject() {
        let d0 = 10 * DAY_MS;
        let text = format!(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n\
             1,{a},{a2},S1,,A\n\
             2,{b},{b2},S1,,A\n\
             3,{c},{c2},S1,,A\n\
             4,{c},{c2},S2,,A\n",
            a = d0 + 1000,
            a2 = d0 + 2000,
            b = d0 + 5000,
            b2 = d0 + 6000,
            c = d0 + 3 * DAY_MS,
            c2 = d0 + 3 * DAY_MS + 1000,
        );
        let log = parse(&text).unwrap();
        let days: Vec<u32> = log.iter().map(|s| s.id.day_index).collect();
        // same day twice, then a later day; S2 starts its own count
        assert_eq!(days, vec![1, 1, 2, 1]);
    }

    #[test]
    fn test_day_index_column_optional() {
        let log = parse("session_no,start_ms,end_ms,subject_id,setup_id\n1,1000,5000,S1,A\n").unwrap();
        assert_eq!(log.sessions()[0].id.day_index, 1);
    }

    #[test]
    fn test_day_boundary_uses_timezone() {
        // 23:30 UTC on day 10 is already day 11 at UTC+7
        let start = 10 * DAY_MS + 23 * 3_600_000 + 30 * 60_000;
        let next_day = 11 * DAY_MS + 12 * 3_600_000;
        let text = format!(
            "session_no,start_ms,end_ms,subject_id,setup_id\n\
             1,{},{},S1,A\n\
             2,{},{},S1,A\n",
            start,
            start + 1000,
            next_day,
            next_day + 1000
        );
        let utc = SessionLog::from_reader(text.as_bytes(), 0).unwrap();
        let plus7 = SessionLog::from_reader(text.as_bytes(), 7 * 3_600_000).unwrap();
        assert_eq!(utc.sessions()[1].id.day_index, 2);
        assert_eq!(plus7.sessions()[1].id.day_index, 1);
    }

    #[test]
    fn test_missing_columns() {
        let err = parse("session_no,start_ms,subject_id\n1,1000,S1\n").unwrap_err();
        assert!(err.is_fatal());
        let text = err.to_string();
        assert!(text.contains("end_ms"));
        assert!(text.contains("setup_id"));
    }

    #[test]
    fn test_malformed_number_reports_line() {
        let err = parse(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n\
             1,1000,5000,S1,1,A\n\
             2,abc,9000,S1,1,A\n",
        )
        .unwrap_err();
        match err {
            DataCollectError::SessionLog { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err = parse(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n1,5000,1000,S1,1,A\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("starts at 5000"));
    }

    #[test]
    fn test_duplicates_rejected() {
        let dup_number = parse(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n\
             1,1000,5000,S1,1,A\n\
             1,6000,9000,S1,1,A\n",
        )
        .unwrap_err();
        assert!(dup_number.to_string().contains("duplicate session number 1"));

        let dup_id = parse(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n\
             1,1000,5000,S1,1,A\n\
             2,1000,5000,S1,1,B\n",
        )
        .unwrap_err();
        assert!(dup_id.to_string().contains("duplicate session ID 1000_5000_S1_1"));
    }

    #[test]
    fn test_empty_setup_rejected() {
        let err = parse(
            "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n1,1000,5000,S1,1,\n",
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = SessionLog::load("/nonexistent/log.csv", 0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unsafe_directory_names_rejected() {
        for (subject, setup) in [("S/1", "A"), ("S1", "../x"), ("S1", "/tmp/x"), ("S1", ".."), ("..", "A")] {
            let text = format!(
                "session_no,start_ms,end_ms,subject_id,day_index,setup_id\n1,1000,5000,{},1,{}\n",
                subject, setup
            );
            let err = parse(&text).unwrap_err();
            assert!(err.to_string().contains("not a plain directory name"), "{}", err);
        }
    }

    #[test]
    fn test_timestamp_near_limit_is_out_of_range() {
        let err = SessionLog::from_reader(
            "session_no,start_ms,end_ms,subject_id,setup_id\n\
             1,9223372036854775000,9223372036854775800,S1,A\n"
                .as_bytes(),
            7 * 3_600_000,
        )
        .unwrap_err();
        assert!(err.is_fatal());
        match err {
            DataCollectError::SessionLog { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("out of range"), "{}", message);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
