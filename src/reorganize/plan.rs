//! Target path planning
//!
//! Turns classified artifacts into per-session placements:
//!
//! ```text
//! {output_root}/{session_id}/{data_type}/{device_id}_{data_type}.{ext}
//! ```
//!
//! Directory artifacts (SensorLogger recordings) keep the name without an
//! extension. Two artifacts resolving to the same target are both rejected.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::classify::Classified;
use crate::error::{ClassificationReason, DataCollectError};
use crate::session::{Session, SessionId};
use crate::types::{DataType, DeviceId, TimeRange};

/// One artifact and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    /// Source relative to the raw root, `/`-separated
    pub source_relative: String,
    pub target: PathBuf,
    pub data_type: DataType,
    pub device_id: DeviceId,
    pub range: TimeRange,
    pub is_dir: bool,
}

/// All placements of one session
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub session: Session,
    pub directory: PathBuf,
    pub placements: Vec<Placement>,
}

/// File or directory name of an artifact in the processed tree
pub fn target_name(device_id: &DeviceId, data_type: DataType, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}_{}.{}", device_id, data_type, ext),
        _ => format!("{}_{}", device_id, data_type),
    }
}

/// Target path relative to the output root
pub fn target_relative(
    session_id: &SessionId,
    data_type: DataType,
    device_id: &DeviceId,
    extension: Option<&str>,
) -> PathBuf {
    PathBuf::from(session_id.to_string())
        .join(data_type.as_str())
        .join(target_name(device_id, data_type, extension))
}

/// Group classified artifacts by session.
///
/// Returns the session plans sorted by session ID and one conflict error per
/// artifact whose target collides with another's.
pub fn plan(
    classified: Vec<Classified>,
    sessions: &[Session],
    raw_root: &Path,
    output_root: &Path,
) -> (Vec<SessionPlan>, Vec<DataCollectError>) {
    let mut by_target: HashMap<PathBuf, Vec<(usize, Placement)>> = HashMap::new();

    for item in classified {
        let session = &sessions[item.session];
        let extension = item.artifact.extension();
        let target = output_root.join(target_relative(
            &session.id,
            item.data_type,
            &item.artifact.device_id,
            extension.as_deref(),
        ));
        let placement = Placement {
            source_relative: crate::fsutil::display_relative(&item.artifact.path, raw_root),
            source: item.artifact.path,
            target: target.clone(),
            data_type: item.data_type,
            device_id: item.artifact.device_id,
            range: item.range,
            is_dir: item.artifact.is_dir,
        };
        by_target
            .entry(target)
            .or_default()
            .push((item.session, placement));
    }

    let mut conflicts = Vec::new();
    let mut grouped: BTreeMap<SessionId, (usize, Vec<Placement>)> = BTreeMap::new();

    for (target, mut entries) in by_target {
        if entries.len() > 1 {
            entries.sort_by(|a, b| a.1.source.cmp(&b.1.source));
            for (_, placement) in entries {
                tracing::warn!(
                    "{} conflicts with another file for {}",
                    placement.source.display(),
                    target.display()
                );
                conflicts.push(DataCollectError::classification(
                    &placement.source,
                    ClassificationReason::ConflictingTarget(target.clone()),
                ));
            }
            continue;
        }
        for (session, placement) in entries {
            grouped
                .entry(sessions[session].id.clone())
                .or_insert_with(|| (session, Vec::new()))
                .1
                .push(placement);
        }
    }

    let plans = grouped
        .into_iter()
        .map(|(id, (session, mut placements))| {
            placements.sort_by(|a, b| a.target.cmp(&b.target));
            SessionPlan {
                session: sessions[session].clone(),
                directory: output_root.join(id.to_string()),
                placements,
            }
        })
        .collect();

    (plans, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawArtifact;

    fn classified(root: &Path, relative: &str, data_type: DataType, session: usize) -> Classified {
        let artifact = RawArtifact::from_path(root, &root.join(relative)).unwrap();
        Classified {
            device_type: artifact.device_type.unwrap(),
            artifact,
            data_type,
            range: TimeRange::new(1200, 4800),
            session,
        }
    }

    fn sessions() -> Vec<Session> {
        vec![
            Session {
                number: 3,
                id: SessionId::new(1000, 5000, "S1", 1),
                setup_id: "A".into(),
            },
            Session {
                number: 4,
                id: SessionId::new(6000, 9000, "S1", 1),
                setup_id: "A".into(),
            },
        ]
    }

    #[test]
    fn test_target_names() {
        let id = SessionId::new(1000, 5000, "S1", 1);
        assert_eq!(
            target_relative(&id, DataType::InertiaWatch, &DeviceId::new("W2"), Some("csv")),
            PathBuf::from("1000_5000_S1_1/inertia_watch/W2_inertia_watch.csv")
        );
        assert_eq!(
            target_name(&DeviceId::new("P1"), DataType::InertiaPhone, None),
            "P1_inertia_phone"
        );
    }

    #[test]
    fn test_plan_groups_by_session() {
        let raw = Path::new("/raw");
        let out = Path::new("/out");
        let items = vec![
            classified(raw, "d/W2/watch/a.csv", DataType::InertiaWatch, 1),
            classified(raw, "d/W2/watch/b.csv", DataType::InertiaWatch, 0),
            classified(raw, "d/T1/timerapp/l.csv", DataType::OnlineLabel, 0),
        ];
        let (plans, conflicts) = plan(items, &sessions(), raw, out);

        assert!(conflicts.is_empty());
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].session.number, 3);
        assert_eq!(plans[0].directory, PathBuf::from("/out/1000_5000_S1_1"));
        assert_eq!(plans[0].placements.len(), 2);
        assert_eq!(plans[0].placements[0].source_relative, "d/W2/watch/b.csv");
        assert_eq!(
            plans[1].placements[0].target,
            PathBuf::from("/out/6000_9000_S1_1/inertia_watch/W2_inertia_watch.csv")
        );
        assert_eq!(plans[0].placements[1].device_id, DeviceId::new("T1"));
    }

    #[test]
    fn test_conflicting_targets_rejected() {
        let raw = Path::new("/raw");
        let items = vec![
            classified(raw, "d1/W2/watch/a.csv", DataType::InertiaWatch, 0),
            classified(raw, "d2/W2/watch/b.csv", DataType::InertiaWatch, 0),
            classified(raw, "d1/T1/timerapp/l.csv", DataType::OnlineLabel, 0),
        ];
        let (plans, conflicts) = plan(items, &sessions(), raw, Path::new("/out"));

        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.iter().all(|c| c.is_classification()));
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].placements.len(), 1);
        assert_eq!(plans[0].placements[0].data_type, DataType::OnlineLabel);
    }
}
