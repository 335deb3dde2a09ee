pub mod cache;
pub mod error;
pub mod escape;
pub mod lease;
pub mod marc_session;

pub use cache::CacheStore;
pub use error::{LockError, MarcFileUploadSessionError};
pub use escape::{escape_path, unescape_path};
pub use lease::{Lease, LockStore};
pub use marc_session::{MarcFileUpload, MarcFileUploadState, MarcUploadSession, MultipartUploadPart};
