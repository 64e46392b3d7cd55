//! ELAN label import
//!
//! Converts an ELAN annotation export back into offline label files in the
//! processed tree. The export is a headerless CSV:
//!
//! ```text
//! tier,participant,begin_ms,end_ms,label,elan_path
//! ```
//!
//! `elan_path` points at the `.eaf` inside an ELAN project folder
//! (`.../{setup_id}/{session_id}/{session_id}.eaf`), which identifies the
//! session. Offsets are relative to the session start and become absolute
//! timestamps in `{processed}/{session_id}/offline_label/elan_offline_label.csv`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DataCollectError, Result};
use crate::fsutil::write_if_changed;
use crate::session::SessionId;
use crate::types::DataType;

/// File name of imported labels inside `offline_label/`
pub const OFFLINE_LABEL_FILE: &str = "elan_offline_label.csv";

#[derive(Debug, Clone, Deserialize)]
struct ExportRow {
    tier: String,
    #[allow(dead_code)]
    participant: String,
    begin_ms: i64,
    end_ms: i64,
    label: String,
    elan_path: String,
}

/// One absolute label interval
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LabelRow {
    pub label: String,
    pub start: i64,
    pub end: i64,
}

/// Labels of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLabels {
    pub session_id: SessionId,
    pub setup_id: String,
    pub rows: Vec<LabelRow>,
}

/// Outcome of an import run
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub sessions: usize,
    pub rows: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    /// Sessions with labels but no processed session directory
    pub missing: Vec<SessionId>,
}

/// Read the allowed labels, one per line
pub fn read_label_list(path: &Path) -> Result<BTreeSet<String>> {
    let text = fs::read_to_string(path).map_err(|e| DataCollectError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// `(setup_id, session_id)` from the last two directories of an ELAN path
fn ids_from_elan_path(path: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = path.split(['/', '\\']).collect();
    if parts.len() < 3 {
        return None;
    }
    Some((parts[parts.len() - 3], parts[parts.len() - 2]))
}

/// Parse and validate an ELAN export
pub fn parse_export(
    export: &Path,
    labels: &BTreeSet<String>,
) -> Result<Vec<SessionLabels>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(export)
        .map_err(|e| DataCollectError::parse(export, e.to_string()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<ExportRow>() {
        rows.push(record.map_err(|e| DataCollectError::parse(export, e.to_string()))?);
    }

    let tiers: BTreeSet<&str> = rows.iter().map(|r| r.tier.as_str()).collect();
    if tiers.len() > 1 {
        return Err(DataCollectError::parse(
            export,
            format!(
                "only one tier is accepted, found: {}",
                tiers.into_iter().collect::<Vec<_>>().join(", ")
            ),
        ));
    }

    let unknown: BTreeSet<&str> = rows
        .iter()
        .map(|r| r.label.trim())
        .filter(|l| !labels.contains(*l))
        .collect();
    if !unknown.is_empty() {
        return Err(DataCollectError::parse(
            export,
            format!(
                "unexpected label(s): {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            ),
        ));
    }

    let mut sessions: BTreeMap<SessionId, SessionLabels> = BTreeMap::new();
    for (i, row) in rows.into_iter().enumerate() {
        let (setup_id, session) = ids_from_elan_path(&row.elan_path).ok_or_else(|| {
            DataCollectError::parse(
                export,
                format!("row {}: '{}' is not inside a project folder", i + 1, row.elan_path),
            )
        })?;
        let session_id: SessionId = session
            .parse()
            .map_err(|e: String| DataCollectError::parse(export, format!("row {}: {}", i + 1, e)))?;

        let entry = sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionLabels {
                session_id: session_id.clone(),
                setup_id: setup_id.to_string(),
                rows: Vec::new(),
            });
        if entry.setup_id != setup_id {
            return Err(DataCollectError::parse(
                export,
                format!(
                    "session {} appears under setups {} and {}",
                    session_id, entry.setup_id, setup_id
                ),
            ));
        }
        let absolute = |offset: i64| {
            offset.checked_add(session_id.start_ms).ok_or_else(|| {
                DataCollectError::parse(
                    export,
                    format!("row {}: offset {} is out of range", i + 1, offset),
                )
            })
        };
        entry.rows.push(LabelRow {
            label: row.label.trim().to_string(),
            start: absolute(row.begin_ms)?,
            end: absolute(row.end_ms)?,
        });
    }

    let mut result: Vec<SessionLabels> = sessions.into_values().collect();
    for session in &mut result {
        session.rows.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
    }
    Ok(result)
}

/// Output path of a session's imported labels
pub fn label_file(processed_root: &Path, session_id: &SessionId) -> PathBuf {
    processed_root
        .join(session_id.to_string())
        .join(DataType::OfflineLabel.as_str())
        .join(OFFLINE_LABEL_FILE)
}

fn label_csv(rows: &[LabelRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| DataCollectError::Io(e.into_error()))
}

/// Import an ELAN export into the processed tree
pub fn import_labels(export: &Path, label_list: &Path, processed_root: &Path) -> Result<ImportSummary> {
    if !processed_root.is_dir() {
        return Err(DataCollectError::FatalSetup(format!(
            "Processed root {} does not exist",
            processed_root.display()
        )));
    }

    let labels = read_label_list(label_list)?;
    tracing::info!("Label list: {}", labels.iter().cloned().collect::<Vec<_>>().join(", "));
    let sessions = parse_export(export, &labels)?;
    tracing::info!("Found {} ELAN session(s)", sessions.len());

    let mut summary = ImportSummary {
        sessions: sessions.len(),
        ..ImportSummary::default()
    };
    for session in &sessions {
        let session_dir = processed_root.join(session.session_id.to_string());
        if !session_dir.is_dir() {
            tracing::warn!(
                "Skipping {}: no processed session directory",
                session.session_id
            );
            summary.missing.push(session.session_id.clone());
            continue;
        }

        let path = label_file(processed_root, &session.session_id);
        if write_if_changed(&path, &label_csv(&session.rows)?)? {
            tracing::info!("Wrote {} label(s) to {}", session.rows.len(), path.display());
            summary.files_written += 1;
        } else {
            summary.files_unchanged += 1;
        }
        summary.rows += session.rows.len();
    }

    tracing::info!(
        "Found {} sessions; wrote {} files, skipped {}",
        summary.sessions,
        summary.files_written,
        summary.missing.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn export(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("export.csv");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_ids_from_path() {
        assert_eq!(
            ids_from_elan_path("/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf"),
            Some(("A", "1000_5000_S1_1"))
        );
        assert_eq!(
            ids_from_elan_path("C:\\elan\\A\\1_2_S_1\\1_2_S_1.eaf"),
            Some(("A", "1_2_S_1"))
        );
        assert_eq!(ids_from_elan_path("x.eaf"), None);
    }

    #[test]
    fn test_parse_makes_offsets_absolute() {
        let dir = TempDir::new().unwrap();
        let path = export(
            dir.path(),
            "default,,300,900, walk ,/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n\
             default,,0,200,sit,/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n\
             default,,10,20,sit,/elan/B/6000_9000_S2_1/6000_9000_S2_1.eaf\n",
        );

        let sessions = parse_export(&path, &labels(&["walk", "sit"])).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].setup_id, "A");
        assert_eq!(
            sessions[0].rows,
            vec![
                LabelRow { label: "sit".into(), start: 1000, end: 1200 },
                LabelRow { label: "walk".into(), start: 1300, end: 1900 },
            ]
        );
        assert_eq!(sessions[1].rows[0].start, 6010);
    }

    #[test]
    fn test_rejects_several_tiers_and_unknown_labels() {
        let dir = TempDir::new().unwrap();
        let tiers = export(
            dir.path(),
            "t1,,0,1,sit,/e/A/1_2_S_1/x.eaf\nt2,,0,1,sit,/e/A/1_2_S_1/x.eaf\n",
        );
        let err = parse_export(&tiers, &labels(&["sit"])).unwrap_err();
        assert!(err.to_string().contains("only one tier"));

        let unknown = export(dir.path(), "t1,,0,1,dance,/e/A/1_2_S_1/x.eaf\n");
        let err = parse_export(&unknown, &labels(&["sit"])).unwrap_err();
        assert!(err.to_string().contains("dance"));
    }

    #[test]
    fn test_import_writes_label_file_once() {
        let dir = TempDir::new().unwrap();
        let processed = dir.path().join("processed");
        fs::create_dir_all(processed.join("1000_5000_S1_1")).unwrap();
        let list = dir.path().join("labels.txt");
        fs::write(&list, "walk\nsit\n\n").unwrap();
        let path = export(
            dir.path(),
            "default,,0,200,sit,/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n",
        );

        let summary = import_labels(&path, &list, &processed).unwrap();
        assert_eq!(summary.files_written, 1);
        let written = fs::read_to_string(label_file(
            &processed,
            &"1000_5000_S1_1".parse().unwrap(),
        ))
        .unwrap();
        assert_eq!(written, "label,start,end\nsit,1000,1200\n");

        let again = import_labels(&path, &list, &processed).unwrap();
        assert_eq!(again.files_written, 0);
        assert_eq!(again.files_unchanged, 1);
    }

    #[test]
    fn test_sessions_without_directory_are_skipped() {
        let dir = TempDir::new().unwrap();
        let processed = dir.path().join("processed");
        fs::create_dir_all(processed.join("1000_5000_S1_1")).unwrap();
        let list = dir.path().join("labels.txt");
        fs::write(&list, "sit\n").unwrap();
        let path = export(
            dir.path(),
            "default,,0,200,sit,/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n\
             default,,0,200,sit,/elan/A/6000_9000_S2_1/6000_9000_S2_1.eaf\n",
        );

        let summary = import_labels(&path, &list, &processed).unwrap();
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.missing, vec!["6000_9000_S2_1".parse::<SessionId>().unwrap()]);
        assert!(!processed.join("6000_9000_S2_1").exists());
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let dir = TempDir::new().unwrap();
        let path = export(
            dir.path(),
            &format!(
                "default,,0,{},sit,/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n",
                i64::MAX
            ),
        );
        let err = parse_export(&path, &labels(&["sit"])).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{}", err);
    }
}
