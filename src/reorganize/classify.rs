//! Artifact classification
//!
//! Attributes a raw artifact to a device, a data type and exactly one
//! session. Cheap checks (device type, camera registry) run before
//! timestamps are read, so an unregistered camera never reaches ffprobe.

use crate::config::Config;
use crate::error::{ClassificationReason, DataCollectError, Result};
use crate::raw::{RawArtifact, TimestampReader};
use crate::session::{Lookup, SessionIndex, SessionLog};
use crate::types::{DataType, DeviceType, TimeRange};

/// A raw artifact attributed to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub artifact: RawArtifact,
    pub device_type: DeviceType,
    pub data_type: DataType,
    /// Time range with the device offset applied
    pub range: TimeRange,
    /// Position of the session in the log
    pub session: usize,
}

/// Everything classification needs, borrowed for one run
pub struct Classifier<'a> {
    config: &'a Config,
    reader: TimestampReader<'a>,
    log: &'a SessionLog,
    index: &'a SessionIndex,
}

impl<'a> Classifier<'a> {
    pub fn new(
        config: &'a Config,
        reader: TimestampReader<'a>,
        log: &'a SessionLog,
        index: &'a SessionIndex,
    ) -> Self {
        Self {
            config,
            reader,
            log,
            index,
        }
    }

    /// Device type and data type from the artifact's location
    pub fn data_type(&self, artifact: &RawArtifact) -> Result<(DeviceType, DataType)> {
        let device_type = artifact.device_type.ok_or_else(|| {
            DataCollectError::classification(
                &artifact.path,
                ClassificationReason::UnknownDeviceType(artifact.device_dir.clone()),
            )
        })?;

        let data_type = match device_type.implied_data_type() {
            Some(data_type) => data_type,
            None => self
                .config
                .camera_data_type(&artifact.device_id)
                .ok_or_else(|| {
                    DataCollectError::classification(
                        &artifact.path,
                        ClassificationReason::UnregisteredCamera(
                            artifact.device_id.to_string(),
                        ),
                    )
                })?,
        };
        Ok((device_type, data_type))
    }

    /// Session whose window uniquely overlaps `range`
    pub fn session_for(&self, artifact: &RawArtifact, range: TimeRange) -> Result<usize> {
        match self.index.unique_overlap(range) {
            Lookup::Unique(position) => Ok(position),
            Lookup::None => Err(DataCollectError::classification(
                &artifact.path,
                ClassificationReason::NoMatchingSession(range),
            )),
            Lookup::Ambiguous(positions) => Err(DataCollectError::classification(
                &artifact.path,
                ClassificationReason::AmbiguousSession {
                    range,
                    candidates: positions
                        .iter()
                        .map(|&p| self.log.sessions()[p].id.to_string())
                        .collect(),
                },
            )),
        }
    }

    /// Classify one artifact
    pub fn classify(&self, artifact: &RawArtifact) -> Result<Classified> {
        let (device_type, data_type) = self.data_type(artifact)?;

        let range = self.reader.range(artifact).map_err(|e| {
            DataCollectError::classification(
                &artifact.path,
                ClassificationReason::Timestamps(e.to_string()),
            )
        })?;

        let session = self.session_for(artifact, range)?;
        tracing::debug!(
            "{} {} -> {}",
            artifact.path.display(),
            range,
            self.log.sessions()[session].id
        );

        Ok(Classified {
            artifact: artifact.clone(),
            device_type,
            data_type,
            range,
            session,
        })
    }
}
