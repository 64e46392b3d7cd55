//! Command-line interface
//!
//! Every tool is a subcommand of the `datacollect` binary. Subcommands
//! return an [`Outcome`]; fatal setup errors come back as `Err` and are
//! turned into exit code 2 by the binary.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{Config, OverwritePolicy, ReorganizeSettings, DEFAULT_CONFIG_FILE};
use crate::error::{DataCollectError, Result};
use crate::raw::FfprobeVideoProbe;
use crate::reorganize::Reorganizer;
use crate::tools::{elan::ElanExporter, import_labels, inspect, unzip_all, Inspector};
use crate::viewer::{self, SyncData};

#[derive(Debug, Parser)]
#[command(name = "datacollect")]
#[command(about = "Organize multi-sensor data-collection sessions", version)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to a file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy raw artifacts into the per-session processed tree
    Reorganize {
        /// Raw data root ({date}/{device_id}/{device_type}/{file})
        #[arg(long)]
        raw: PathBuf,
        /// Session log CSV
        #[arg(long)]
        log: PathBuf,
        /// Processed output root
        #[arg(long)]
        out: PathBuf,
        /// What to do with existing targets that differ
        #[arg(long, value_enum, default_value_t = OverwritePolicy::Replace)]
        overwrite: OverwritePolicy,
        /// Sessions applied in parallel
        #[arg(long, default_value_t = 1)]
        workers: usize,
        /// Print the plan without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract SensorLogger zip archives in place
    Unzip {
        /// Raw data root
        #[arg(long)]
        raw: PathBuf,
        /// Delete archives after a successful extraction
        #[arg(long)]
        delete_zip: bool,
    },

    /// Print time ranges and inertial segments of raw artifacts
    Inspect {
        /// Inspect every artifact under a raw root
        #[arg(long, conflicts_with = "paths")]
        raw: Option<PathBuf>,
        /// Artifacts to inspect; the device type is the parent directory
        #[arg(required_unless_present = "raw")]
        paths: Vec<PathBuf>,
        /// Emit JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show phone and watch accelerometers for manual time alignment
    SyncView {
        /// SensorLogger recording directory or Accelerometer.csv
        #[arg(long)]
        phone: Option<PathBuf>,
        /// Watch CSV
        #[arg(long)]
        watch: Option<PathBuf>,
    },

    /// Build ELAN projects from the processed tree
    Elan {
        /// Processed root
        #[arg(long)]
        processed: PathBuf,
        /// Directory holding the per-setup templates
        #[arg(long)]
        templates: PathBuf,
        /// ELAN output root
        #[arg(long)]
        out: PathBuf,
    },

    /// Import an ELAN annotation export as offline labels
    ImportLabels {
        /// Headerless ELAN export CSV
        #[arg(long)]
        export: PathBuf,
        /// Allowed labels, one per line
        #[arg(long)]
        labels: PathBuf,
        /// Processed root
        #[arg(long)]
        processed: PathBuf,
    },

    /// Write a config file with every default value
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

/// How a subcommand ended, short of a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    PartialFailure,
}

impl Outcome {
    fn from_failures(has_failures: bool) -> Self {
        if has_failures {
            Outcome::PartialFailure
        } else {
            Outcome::Success
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::PartialFailure => 1,
        }
    }
}

impl Cli {
    /// Run the selected subcommand
    pub fn execute(self) -> Result<Outcome> {
        if let Command::InitConfig { path } = &self.command {
            return init_config(path);
        }
        let config = Config::resolve(self.config.as_deref())?;

        match self.command {
            Command::Reorganize {
                raw,
                log,
                out,
                overwrite,
                workers,
                dry_run,
            } => {
                let settings = ReorganizeSettings::new(raw, log, out)
                    .with_overwrite(overwrite)
                    .with_workers(workers)
                    .with_dry_run(dry_run);
                let report = Reorganizer::new(config, settings).run()?;
                print!("{}", report);
                Ok(Outcome::from_failures(report.has_failures()))
            }
            Command::Unzip { raw, delete_zip } => {
                let report = unzip_all(&raw, delete_zip)?;
                println!(
                    "{} archive(s) found, {} extracted, {} skipped",
                    report.found,
                    report.extracted.len(),
                    report.skipped.len()
                );
                for (path, error) in &report.failures {
                    println!("  failed {}: {}", path.display(), error);
                }
                Ok(Outcome::from_failures(report.has_failures()))
            }
            Command::Inspect { raw, paths, json } => {
                let probe = FfprobeVideoProbe::default();
                let inspector = Inspector::new(&config, &probe);
                let records = match raw {
                    Some(root) => inspector.inspect_root(&root)?,
                    None => inspector.inspect_paths(&paths),
                };
                let mut out = io::stdout().lock();
                inspect::write_records(&mut out, &records, json)?;
                out.flush()?;
                Ok(Outcome::from_failures(
                    records.iter().any(|r| r.error.is_some()),
                ))
            }
            Command::SyncView { phone, watch } => {
                let mut data = SyncData::new(&config);
                if let Some(path) = phone {
                    data.load_phone(&path)?;
                }
                if let Some(path) = watch {
                    data.load_watch(&path)?;
                }
                viewer::run(data)?;
                Ok(Outcome::Success)
            }
            Command::Elan {
                processed,
                templates,
                out,
            } => {
                let summary =
                    ElanExporter::new(processed, templates, out, config.elan.down_sample_by).run()?;
                print!("{}", summary);
                Ok(Outcome::from_failures(!summary.failures.is_empty()))
            }
            Command::ImportLabels {
                export,
                labels,
                processed,
            } => {
                let summary = import_labels(&export, &labels, &processed)?;
                println!(
                    "{} session(s), {} label(s), {} file(s) written, {} unchanged",
                    summary.sessions, summary.rows, summary.files_written, summary.files_unchanged
                );
                for session in &summary.missing {
                    println!("  skipped {}: no processed session directory", session);
                }
                Ok(Outcome::from_failures(!summary.missing.is_empty()))
            }
            Command::InitConfig { .. } => Ok(Outcome::Success),
        }
    }
}

fn init_config(path: &Path) -> Result<Outcome> {
    if path.exists() {
        return Err(DataCollectError::FatalSetup(format!(
            "{} already exists",
            path.display()
        )));
    }
    let content = Config::default().to_toml_string()?;
    std::fs::write(path, content).map_err(|e| DataCollectError::io(path, e))?;
    println!("Wrote {}", path.display());
    Ok(Outcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_reorganize() {
        let cli = Cli::try_parse_from([
            "datacollect",
            "-vv",
            "reorganize",
            "--raw",
            "/raw",
            "--log",
            "/log.csv",
            "--out",
            "/out",
            "--overwrite",
            "skip",
            "--workers",
            "4",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Reorganize {
                overwrite,
                workers,
                dry_run,
                ..
            } => {
                assert_eq!(overwrite, OverwritePolicy::Skip);
                assert_eq!(workers, 4);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_inspect_needs_a_target() {
        assert!(Cli::try_parse_from(["datacollect", "inspect"]).is_err());
        assert!(Cli::try_parse_from(["datacollect", "inspect", "--raw", "/r", "a.csv"]).is_err());
        assert!(Cli::try_parse_from(["datacollect", "inspect", "a.csv", "b.csv"]).is_ok());
    }

    #[test]
    fn test_init_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("datacollect.toml");
        let cli = Cli::try_parse_from([
            "datacollect",
            "init-config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(cli.execute().unwrap(), Outcome::Success);
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        assert!(init_config(&path).unwrap_err().is_fatal());
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(Outcome::from_failures(false).exit_code(), 0);
        assert_eq!(Outcome::from_failures(true).exit_code(), 1);
    }
}
