//! Context helpers for fallible setup steps

use super::types::{Error, Result};

/// Attach a message to any error convertible into [`Error`]
///
/// The result is always [`Error::Configuration`]; use it for loading and
/// validating settings, not for data-path failures whose variant matters.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        let message = message.into();
        self.with_context(|| message)
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::configuration(format!("{}: {}", f(), e.into())))
    }
}
