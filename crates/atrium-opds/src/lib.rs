pub mod atom;
pub mod bibliographic;
pub mod error;
pub mod extractor;
pub mod importer;
pub mod license_info;
pub mod opds2;
pub mod reconcile;

pub use atom::AtomFeed;
pub use bibliographic::{BibliographicData, CirculationData, FormatData};
pub use error::OpdsError;
pub use extractor::FailedPublication;
pub use importer::{
    import_atom_feed, import_odl_feed, FeedImportResult, PublicationImportResult,
    DEFAULT_LICENSE_FETCH_CONCURRENCY,
};
pub use license_info::LicenseInfo;
pub use opds2::Feed as Opds2Feed;
