pub mod archival;
pub mod capture;
pub mod db;
pub mod error;
pub mod schedule;
pub mod scoring;
pub mod types;

pub use archival::{archive_once, restore, search_archive, ArchivalWorker};
pub use capture::CaptureStream;
pub use error::{Result, SurpriseError};
pub use scoring::ScoringWorker;
pub use types::{ArchivalStats, CaptureEntry, ScoringOutcome};
