//! Error types and result extensions for pdict operations

mod builders;
mod conversions;
mod extensions;
mod recovery;
mod types;

pub use extensions::*;
pub use recovery::RecoveryHint;
pub use types::{BoxError, Error, Result};
