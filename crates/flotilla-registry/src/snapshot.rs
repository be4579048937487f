//! Snapshots and fast-forward.
//!
//! A [`Snapshot`] is an immutable `(revision, connection)` pair: the root
//! from which typed entities are navigated, and the revision all their
//! reads are answered at. Snapshots are never mutated; an operation that
//! advances time hands back a *new* snapshot via
//! [`Snapshot::fast_forward`].

use flotilla_types::Rev;

use crate::{Conn, RegistryError};

/// An immutable view of the registry at a fixed revision.
///
/// Cheap to clone and freely shareable across threads. An entity built on a
/// stale snapshot is still safe to use: its CAS writes fail with
/// [`RegistryError::RevMismatch`] instead of clobbering newer state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    rev: Rev,
    conn: Conn,
}

impl Snapshot {
    /// Pins `conn` at the given revision.
    pub fn new(conn: Conn, rev: Rev) -> Self {
        Self { rev, conn }
    }

    /// Connects at the store's current head revision.
    pub fn dial(conn: Conn) -> Result<Self, RegistryError> {
        let rev = conn.rev()?;
        Ok(Self { rev, conn })
    }

    /// The revision reads through this snapshot are answered at.
    pub fn rev(&self) -> Rev {
        self.rev
    }

    /// The underlying registry connection.
    pub fn conn(&self) -> &Conn {
        &self.conn
    }

    /// Returns a snapshot of the same store at `rev`; [`Rev::HEAD`]
    /// resolves to the store's current head.
    pub fn fast_forward(&self, rev: Rev) -> Result<Self, RegistryError> {
        let rev = if rev.is_head() { self.conn.rev()? } else { rev };
        Ok(Self {
            rev,
            conn: self.conn.clone(),
        })
    }

    /// Whether `path` exists at this snapshot's revision.
    pub fn exists(&self, path: &str) -> Result<bool, RegistryError> {
        let (found, _) = self.conn.exists(path, Some(self.rev))?;
        Ok(found)
    }

    /// Child names of the directory at `path`, at this snapshot's revision.
    pub fn getdir(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        self.conn.getdir(path, self.rev)
    }
}

/// Types that carry a [`Snapshot`] and can be rebuilt at a newer revision.
///
/// `with_snapshot` is the per-type rebuild hook: it must return the same
/// logical entity bound to the supplied snapshot. The provided
/// [`Snapshotable::fast_forward`] is the sole mechanism by which entities
/// advance their view of time, and it preserves the concrete type.
pub trait Snapshotable: Sized {
    /// The snapshot this entity reads through.
    fn snapshot(&self) -> &Snapshot;

    /// Rebuilds this entity bound to `snapshot`.
    fn with_snapshot(&self, snapshot: Snapshot) -> Self;

    /// Returns this entity rebound to `rev` ([`Rev::HEAD`] = store head).
    fn fast_forward(&self, rev: Rev) -> Result<Self, RegistryError> {
        Ok(self.with_snapshot(self.snapshot().fast_forward(rev)?))
    }
}
