//! # datacollect-rs: multi-sensor data-collection session tools
//!
//! Research sessions are recorded by several independent devices (cameras,
//! smartwatches, phones running SensorLogger or a labelling timer app). Each
//! device dumps its files into a raw tree:
//!
//! ```text
//! {raw_root}/{date}/{device_id}/{device_type}/{file}
//! ```
//!
//! A hand-written session log lists the sessions with their time windows.
//! The reorganizer reads every artifact's timestamps, attributes it to the
//! one session window it overlaps, and copies it into a processed tree keyed
//! by session, from which ELAN annotation projects are generated.
//!
//! ## Modules
//!
//! - [`config`]: device offsets, camera registry, thresholds (TOML)
//! - [`session`]: session IDs, the session log and an interval index
//! - [`raw`]: raw layout discovery, timestamp extraction, inertial series
//! - [`reorganize`]: discover, classify, plan and apply
//! - [`tools`]: unzip, inspect, ELAN export and label import
//! - [`viewer`]: egui window for manual clock alignment
//! - [`cli`]: the `datacollect` subcommands
//!
//! ## Example
//!
//! ```ignore
//! use datacollect_rs::{config::{Config, ReorganizeSettings}, reorganize::Reorganizer};
//!
//! let config = Config::resolve(None)?;
//! let settings = ReorganizeSettings::new("raw", "sessions.csv", "processed").with_workers(4);
//! let report = Reorganizer::new(config, settings).run()?;
//! println!("{}", report);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod raw;
pub mod reorganize;
pub mod session;
pub mod tools;
pub mod types;
pub mod viewer;

// Re-export commonly used types
pub use config::{Config, OverwritePolicy, ReorganizeSettings};
pub use error::{DataCollectError, Result};
pub use reorganize::{Reorganizer, RunReport};
pub use session::{Session, SessionId, SessionLog};
pub use types::{DataType, DeviceId, DeviceType, TimeRange};
