//! Error and result types for filesystem operations.

use ufmt::derive::uDebug;

pub type Result<T> = core::result::Result<T, Error>;

/// Definition of errors that might be returned by filesystem functionality.
///
/// None of these leaves the on-medium structures inconsistent: an
/// operation that fails either changed nothing, or (for [`Truncated`])
/// committed exactly what it reports through the handle.
///
/// [`Truncated`]: Error::Truncated
#[derive(Clone, Copy, Debug, PartialEq, Eq, uDebug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// The storage driver reported a failure.
    Io,
    /// A block address fell outside the pool.
    OutOfRangeBlock,
    /// Operation through a handle with no backing chain.
    InvalidHandle,
    /// Write attempted through a read-only handle.
    WriteToReadOnly,
    /// No file is allocated under the requested name.
    FileNotFound,
    /// The payload ran past the per-file block cap; the excess was
    /// dropped, everything up to the cap is committed.
    Truncated,
    /// The free chain is exhausted, or the file is already at its cap.
    NoSpace,
}
