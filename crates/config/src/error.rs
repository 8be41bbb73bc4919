//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or merging the configuration sources failed.
    #[display("could not load configuration")]
    Load,
    /// A configuration value was read but can't be used.
    #[display("invalid configuration value: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}
