//! atrium-marc
//!
//! The MARC Export Engine (§4.7): per-(library, collection) MARC record
//! generation (`annotator`, `record`), the per-collection resumable S3
//! multipart upload under the lock-store's upload-session lease
//! (`export`), the object-storage boundary it drives (`s3`), and the
//! catalog-facing persistence boundary it reads/writes through (`store`).

pub mod annotator;
pub mod error;
pub mod export;
pub mod record;
pub mod s3;
pub mod store;

pub use error::MarcError;
pub use export::{files_to_retire, run_retention, MarcExportEngine};
pub use record::{leader, non_filing_characters, Field, Indicators, MarcRecord, Subfield};
pub use s3::{AwsS3MultipartStore, MarcObjectStore, MULTIPART_MIN_PART_SIZE};
pub use store::{LibraryExportConfig, MarcCatalogStore, MarcFileRecord};
