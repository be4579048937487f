//! Registry error types.

use flotilla_types::Rev;

/// Errors from the registry adapter.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A compare-and-set precondition failed: the path was modified after
    /// the revision the caller held. Fast-forward and retry, or interpret
    /// as losing a race.
    #[error("revision mismatch at {path}: held {held}, current {current}")]
    RevMismatch { path: String, held: Rev, current: Rev },

    /// The path did not exist when it was required to.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// A codec failed to decode a leaf value, or refused to encode one.
    #[error("bad value: {reason}")]
    BadValue { reason: String },

    /// A watch glob failed to compile.
    #[error("bad glob {glob:?}: {reason}")]
    BadGlob { glob: String, reason: String },

    /// The connection to the registry was closed; in-flight waits unblock
    /// with this error.
    #[error("registry connection closed")]
    Closed,

    /// Underlying transport I/O error.
    #[error("registry I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// Returns true for [`RegistryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    /// Returns true for [`RegistryError::RevMismatch`].
    pub fn is_rev_mismatch(&self) -> bool {
        matches!(self, RegistryError::RevMismatch { .. })
    }
}
