//! Shared utilities for pdict
//!
//! File locking, atomic file writes, sync-over-async execution, tracing
//! initialisation and XDG directory resolution used by the pdict crates.

pub mod async_runtime;
pub mod atomic_file;
pub mod file_lock;
pub mod tracing;
pub mod xdg;

pub use async_runtime::*;
pub use atomic_file::*;
pub use file_lock::*;
pub use xdg::*;
