//! Raw-to-processed reorganizer
//!
//! The reorganizer copies raw artifacts into a tree keyed by session:
//!
//! ```text
//! {output_root}/{session_id}/{data_type}/{device_id}_{data_type}.{ext}
//! {output_root}/{session_id}/session.json
//! ```
//!
//! # Phases
//!
//! 1. **Setup** - check paths, probe the output root, load the session log.
//!    Any failure here aborts the run.
//! 2. **Discover** - walk the raw layout ([`crate::raw::discover`]).
//! 3. **Classify** - attribute each artifact to a device, data type and a
//!    unique session ([`classify`]).
//! 4. **Plan** - compute target paths and reject collisions ([`plan`]).
//! 5. **Apply** - copy with verification and write manifests ([`apply`]),
//!    optionally on a worker pool ([`pool`]).
//!
//! Per-file problems never abort the run; they end up in the [`RunReport`].

pub mod apply;
pub mod classify;
pub mod plan;
pub mod pool;
pub mod report;

pub use apply::{apply_session, SessionManifest, MANIFEST_FILE};
pub use classify::{Classified, Classifier};
pub use plan::{plan, Placement, SessionPlan};
pub use report::{FileAction, FileFailure, FileOutcome, RunReport, SessionReport, SessionStatus};

use std::path::Path;

use crate::config::{Config, ReorganizeSettings};
use crate::error::{DataCollectError, Result};
use crate::fsutil::{ensure_writable_dir, resolve_path};
use crate::raw::{discover, FfprobeVideoProbe, TimestampReader, VideoProbe};
use crate::session::{SessionIndex, SessionLog};

/// One reorganizer run
pub struct Reorganizer {
    config: Config,
    settings: ReorganizeSettings,
    probe: Box<dyn VideoProbe>,
}

impl Reorganizer {
    /// Create a reorganizer that probes videos with ffprobe
    pub fn new(config: Config, settings: ReorganizeSettings) -> Self {
        Self {
            config,
            settings,
            probe: Box::new(FfprobeVideoProbe::default()),
        }
    }

    /// Replace the video probe
    pub fn with_probe(mut self, probe: Box<dyn VideoProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn settings(&self) -> &ReorganizeSettings {
        &self.settings
    }

    fn check_setup(&self) -> Result<()> {
        let settings = &self.settings;
        if !settings.raw_root.is_dir() {
            return Err(DataCollectError::FatalSetup(format!(
                "Raw data root {} does not exist",
                settings.raw_root.display()
            )));
        }
        if !settings.log_path.is_file() {
            return Err(DataCollectError::FatalSetup(format!(
                "Session log {} does not exist",
                settings.log_path.display()
            )));
        }
        let resolve = |path: &Path| {
            resolve_path(path).map_err(|e| DataCollectError::FatalSetup(e.to_string()))
        };
        let raw_root = resolve(&settings.raw_root)?;
        let output_root = resolve(&settings.output_root)?;
        if output_root.starts_with(&raw_root) {
            return Err(DataCollectError::FatalSetup(format!(
                "Output root {} lies inside the raw root",
                settings.output_root.display()
            )));
        }
        if !settings.dry_run {
            ensure_writable_dir(&settings.output_root).map_err(|e| {
                DataCollectError::FatalSetup(format!(
                    "Output root {} is not writable: {}",
                    settings.output_root.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Execute the run.
    ///
    /// Returns `Err` only for fatal setup problems.
    pub fn run(&self) -> Result<RunReport> {
        let settings = &self.settings;
        self.check_setup()?;

        let log = SessionLog::load(&settings.log_path, self.config.timezone_offset_ms())?;
        let index = SessionIndex::from_sessions(log.sessions());

        let discovery = discover(&settings.raw_root)?;
        let mut report = RunReport {
            dry_run: settings.dry_run,
            ..RunReport::default()
        };
        for failure in &discovery.failures {
            report.unclassified.push(failure_of(failure));
        }

        let reader = TimestampReader::new(&self.config, self.probe.as_ref());
        let classifier = Classifier::new(&self.config, reader, &log, &index);
        let mut classified = Vec::with_capacity(discovery.artifacts.len());
        for artifact in &discovery.artifacts {
            match classifier.classify(artifact) {
                Ok(item) => classified.push(item),
                Err(e) => {
                    tracing::warn!("{}", e);
                    report
                        .unclassified
                        .push(FileFailure::from_error(&artifact.path, &e));
                }
            }
        }
        tracing::info!(
            "Classified {} of {} artifact(s)",
            classified.len(),
            discovery.artifacts.len()
        );

        let (plans, conflicts) = plan(
            classified,
            log.sessions(),
            &settings.raw_root,
            &settings.output_root,
        );
        for conflict in &conflicts {
            report.unclassified.push(failure_of(conflict));
        }

        tracing::info!(
            "Applying {} session(s) with {} worker(s)",
            plans.len(),
            settings.workers
        );
        let overwrite = settings.overwrite;
        let dry_run = settings.dry_run;
        report.sessions = pool::run_pool(plans, settings.workers, |plan| {
            apply_session(&plan, overwrite, dry_run)
        });
        report.sort();

        tracing::info!(
            "Done: {} session(s), {} failure(s)",
            report.sessions.len(),
            report.failure_count()
        );
        Ok(report)
    }
}

/// Failure record for an error that carries its own path
fn failure_of(error: &DataCollectError) -> FileFailure {
    let path = match error {
        DataCollectError::Classification { path, .. }
        | DataCollectError::FileIo { path, .. }
        | DataCollectError::Parse { path, .. } => path.clone(),
        _ => std::path::PathBuf::new(),
    };
    FileFailure::from_error(path, error)
}
