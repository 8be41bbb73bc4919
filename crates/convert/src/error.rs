//! Conversion Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Storage failures are attached as
//! children, so the paths involved in a failed move stay visible in the
//! error tree.

use derive_more::{Display, Error};

/// A conversion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a conversion failure.
///
/// ### Fatal to the world group's conversion
/// - [`ErrorKind::Startup`]
/// - [`ErrorKind::Listing`]
/// - [`ErrorKind::Convert`]
/// - [`ErrorKind::Cleanup`]
/// - [`ErrorKind::Unresolved`] (only with [`UnresolvedPolicy::Abort`](crate::UnresolvedPolicy::Abort))
///
/// ### Programming errors
/// - [`ErrorKind::InvalidUsage`]
/// - [`ErrorKind::InvalidName`]
/// - [`ErrorKind::AlreadyFailed`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Preparing the new chest directory or moving the special chests failed.
    #[display("conversion startup failed")]
    Startup,
    /// Listing the legacy chest directory failed.
    #[display("listing legacy chests failed")]
    Listing,
    /// Moving a batch of chest files failed part-way.
    #[display("batch conversion failed")]
    Convert,
    /// The final verification of the legacy directory failed.
    #[display("cleanup failed")]
    Cleanup,
    /// A single storage operation failed.
    #[display("storage operation failed")]
    Storage,
    /// No UUID is known for this player name.
    #[display("no UUID found for player: {_0}")]
    Unresolved(#[error(not(source))] String),
    /// The caller broke an API contract.
    #[display("invalid usage: {_0}")]
    InvalidUsage(#[error(not(source))] String),
    /// A world group, reserved chest name or extension is unusable.
    #[display("invalid name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// The conversion already failed; it has to be started again from scratch.
    #[display("conversion already failed")]
    AlreadyFailed,
}

impl ErrorKind {
    /// Returns `true` if running the whole conversion again later might
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Startup | Self::Listing | Self::Convert | Self::Cleanup | Self::Storage)
    }
}
