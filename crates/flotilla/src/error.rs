//! Domain error types.

use flotilla_registry::RegistryError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the coordination library.
///
/// Registry-level failures (`rev-mismatch`, `not-found`, `bad-value`, I/O)
/// arrive through [`Error::Registry`] unchanged; the variants here are the
/// domain's own kinds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A registration collided with an existing entity.
    #[error("key conflict: {path} is already registered")]
    KeyConflict { path: String },

    /// A ticket or instance was already claimed by another host.
    #[error("already claimed")]
    AlreadyClaimed,

    /// An operation was attempted by a host that does not hold the claim.
    #[error("unauthorized: {host} does not hold the claim")]
    Unauthorized { host: String },

    /// A proc type name fell outside `[a-z0-9]+`.
    #[error("bad proc type name: {name:?}")]
    BadProcName { name: String },

    /// A failure from the registry adapter.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl Error {
    /// Returns true when the underlying cause is a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Registry(e) if e.is_not_found())
    }
}

/// A `bad-value` error with the given reason.
pub(crate) fn bad_value(reason: impl Into<String>) -> Error {
    Error::Registry(RegistryError::BadValue {
        reason: reason.into(),
    })
}
