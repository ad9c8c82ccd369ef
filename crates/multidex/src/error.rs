use keyindex::{IndexError, Violation};
use rowstore::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::MultiIndex`].
///
/// Lookup misses are not errors; they surface as `None`, `false` or `0`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultiIndexError {
    /// Checked positional access past the end.
    #[error("position {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// A position range that is reversed or extends past the end.
    #[error("range {start}..{end} out of range for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// The row store could not grow.
    #[error("row store: {0}")]
    Store(#[from] StoreError),

    /// A key index could not grow.
    #[error("key index: {0}")]
    Index(#[from] IndexError),

    /// Store and indices disagree; reported by
    /// [`crate::MultiIndex::check_consistency`].
    #[error("index for key slot {slot} is inconsistent: {violation}")]
    Inconsistent { slot: usize, violation: Violation },
}

pub type Result<T> = std::result::Result<T, MultiIndexError>;
