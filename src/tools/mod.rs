//! Auxiliary research tools around the reorganizer
//!
//! - [`unzip`] - extract SensorLogger archives in place
//! - [`inspect`] - print artifact time ranges and inertial segments
//! - [`elan`] - build ELAN projects from the processed tree
//! - [`labels`] - import ELAN annotations back as offline labels

pub mod elan;
pub mod inspect;
pub mod labels;
pub mod unzip;

pub use elan::{ElanExporter, ElanSummary};
pub use inspect::{InspectRecord, Inspector};
pub use labels::{import_labels, ImportSummary};
pub use unzip::{unzip_all, UnzipReport};
