//! Registry backend trait.
//!
//! [`RegistryBackend`] abstracts the coordination store behind the minimum
//! surface the rest of the library composes: revisioned reads, CAS writes,
//! directory listing, and blocking watch. Implementations wrap a transport
//! to a live coordinator or, for tests and embedding, the in-memory store
//! in [`crate::memory`].
//!
//! Everything above this trait is pure composition of these calls; the
//! backend is the only component that performs I/O.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use flotilla_types::Rev;

use crate::RegistryError;

/// Whether an event recorded a write or a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Set,
    Del,
}

/// A change notification from the registry.
///
/// Events carry the revision the mutation landed at; a watcher resuming
/// from an event's revision observes every later mutation exactly once.
#[derive(Debug, Clone)]
pub struct Event {
    /// Path of the mutated leaf.
    pub path: String,
    /// Revision the mutation was assigned.
    pub rev: Rev,
    /// The written body; empty for deletions.
    pub body: Bytes,
    /// Write or deletion.
    pub kind: EventKind,
}

impl Event {
    /// Returns true if the event recorded a write.
    pub fn is_set(&self) -> bool {
        self.kind == EventKind::Set
    }

    /// Returns true if the event recorded a deletion.
    pub fn is_del(&self) -> bool {
        self.kind == EventKind::Del
    }
}

/// Abstraction over the coordination store.
///
/// # Revision discipline
///
/// Reads take an optional revision (`None` reads at the head). Writes take
/// the revision the caller holds and fail with
/// [`RegistryError::RevMismatch`] when the target was modified at a later
/// revision; a successful write returns the strictly greater revision it
/// landed at.
///
/// All methods may block on I/O. [`RegistryBackend::wait`] is the only
/// inherently long-blocking call; it unblocks with
/// [`RegistryError::Closed`] when the connection shuts down.
pub trait RegistryBackend: fmt::Debug + Send + Sync {
    /// Returns the current head revision of the store.
    fn rev(&self) -> Result<Rev, RegistryError>;

    /// Returns whether `path` exists (as a leaf or a directory) at `at`
    /// (`None` = head), along with the revision the check was evaluated at.
    fn exists(&self, path: &str, at: Option<Rev>) -> Result<(bool, Rev), RegistryError>;

    /// Reads the leaf at `path` as of `at` (`None` = head).
    ///
    /// Returns the body and the revision the leaf was last modified at.
    fn get(&self, path: &str, at: Option<Rev>) -> Result<(Bytes, Rev), RegistryError>;

    /// Writes `body` to the leaf at `path`, conditional on the leaf not
    /// having been modified after `old_rev`. Returns the new revision.
    fn set(&self, path: &str, old_rev: Rev, body: Bytes) -> Result<Rev, RegistryError>;

    /// Deletes the leaf at `path`, or the entire subtree rooted there,
    /// conditional on nothing under it having been modified after `rev`.
    fn del(&self, path: &str, rev: Rev) -> Result<(), RegistryError>;

    /// Lists the immediate child names of the directory at `path` as of
    /// `rev`. Fails [`RegistryError::NotFound`] when the directory does not
    /// exist at that revision.
    fn getdir(&self, path: &str, rev: Rev) -> Result<Vec<String>, RegistryError>;

    /// Blocks until the first event matching `glob` whose revision is
    /// strictly greater than `since`, and returns it.
    ///
    /// `*` in a glob matches within a single path segment only.
    fn wait(&self, glob: &str, since: Rev) -> Result<Event, RegistryError>;
}

/// A shared handle to a registry backend.
///
/// Snapshots and entities clone this freely; the backend serializes
/// concurrent operations internally.
pub type Conn = Arc<dyn RegistryBackend>;
