//! Per-run settings of the reorganizer
//!
//! These come from the command line rather than the config file: they
//! describe one invocation (which folders, how to treat existing output,
//! how many workers) rather than the recording setup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What to do when a target file already exists
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Never touch an existing target; a differing one is reported as kept
    Skip,
    /// Skip identical targets, overwrite changed ones
    #[default]
    Replace,
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwritePolicy::Skip => f.write_str("skip"),
            OverwritePolicy::Replace => f.write_str("replace"),
        }
    }
}

/// Settings for one reorganizer run
#[derive(Debug, Clone)]
pub struct ReorganizeSettings {
    /// Root of the raw layout (`{date}/{device_id}/{device_type}/{file}`)
    pub raw_root: PathBuf,

    /// Session log CSV
    pub log_path: PathBuf,

    /// Root of the processed tree
    pub output_root: PathBuf,

    /// Existing-target policy
    pub overwrite: OverwritePolicy,

    /// Number of sessions applied in parallel (1 = sequential)
    pub workers: usize,

    /// Plan only, write nothing
    pub dry_run: bool,
}

impl ReorganizeSettings {
    /// Create settings with the default policy, one worker and no dry run
    pub fn new(
        raw_root: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            raw_root: raw_root.into(),
            log_path: log_path.into(),
            output_root: output_root.into(),
            overwrite: OverwritePolicy::default(),
            workers: 1,
            dry_run: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ReorganizeSettings::new("raw", "log.csv", "out");
        assert_eq!(settings.overwrite, OverwritePolicy::Replace);
        assert_eq!(settings.workers, 1);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_zero_workers_means_sequential() {
        let settings = ReorganizeSettings::new("raw", "log.csv", "out").with_workers(0);
        assert_eq!(settings.workers, 1);
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(OverwritePolicy::Skip.to_string(), "skip");
        assert_eq!(OverwritePolicy::Replace.to_string(), "replace");
    }
}
