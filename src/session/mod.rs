//! Sessions and the session log
//!
//! A session is one bounded data-collection event. The session log lists
//! every session with its window, subject, day and setup; the interval index
//! answers "which session windows overlap this time range".
//!
//! # Example
//!
//! ```no_run
//! use datacollect_rs::session::{Lookup, SessionIndex, SessionLog};
//! use datacollect_rs::types::TimeRange;
//!
//! let log = SessionLog::load("sessions.csv", 7 * 3_600_000).unwrap();
//! let index = SessionIndex::from_sessions(log.sessions());
//! if let Lookup::Unique(i) = index.unique_overlap(TimeRange::new(1200, 4800)) {
//!     println!("{}", log.sessions()[i].id);
//! }
//! ```

pub mod index;
pub mod log;
pub mod types;

pub use index::{Lookup, SessionIndex};
pub use log::SessionLog;
pub use types::{Session, SessionId};
