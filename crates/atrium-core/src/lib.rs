pub mod catalog;
pub mod error;
pub mod identifier;
pub mod patron;

pub use catalog::*;
pub use error::{AtriumError, ProblemDetail};
pub use identifier::{Identifier, IdentifierType};
pub use patron::{BlockReason, Patron, PatronData};
