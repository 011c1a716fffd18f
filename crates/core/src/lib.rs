//! Core domain types, errors, and constants for `pdict`.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias shared by every
//!   pdict crate, plus recovery classification.
//! - **`value`**: the dynamic `Value` that flows through serializers and
//!   backends, and the `Record` trait for registered structured objects.
//! - **`registry`**: the `TypeRegistry` mapping record type names to decoders.
//! - **`constants`**: environment variable names, file extensions and codec
//!   defaults.

pub mod constants;
pub mod errors;
pub mod registry;
pub mod value;

pub use self::{
    constants::*,
    errors::{Error, RecoveryHint, Result, ResultExt},
    registry::TypeRegistry,
    value::{Record, TypedRecord, Value},
};
