//! atrium-playtime
//!
//! The Playtime Aggregator (§4.8): minute-bucket rollup of raw playback
//! events into `PlaytimeSummary` (`aggregator`), and monthly per-data-source
//! CSV usage reports (`report`), against the persistence boundary in
//! `store`.

pub mod aggregator;
pub mod entry;
pub mod error;
pub mod report;
pub mod store;
pub mod summary;

pub use aggregator::{processed_retention, run_aggregation, stability_window, AggregationReport};
pub use entry::{PlaytimeEntry, PlaytimeGroupKey};
pub use error::PlaytimeError;
pub use report::{eligible_data_source_names, write_report, REPORT_DATE_FORMAT};
pub use store::{PlaytimeStore, ReportLoanCountRow, ReportSecondsRow};
pub use summary::PlaytimeSummary;
