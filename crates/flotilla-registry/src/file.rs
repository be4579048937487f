//! Value-at-path and directory-at-path primitives.
//!
//! [`File`] pairs one registry leaf with a typed value and a codec; its
//! writes are CAS-guarded by the revision of the snapshot it holds.
//! [`Dir`] is a path-plus-snapshot handle with string-leaf helpers, the
//! building block entities embed.

use bytes::Bytes;
use flotilla_types::Rev;

use crate::codec::{Codec, StringCodec};
use crate::snapshot::{Snapshot, Snapshotable};
use crate::RegistryError;

/// A typed value at a registry path.
pub struct File<C: Codec> {
    snapshot: Snapshot,
    path: String,
    value: C::Value,
    codec: C,
}

impl<C: Codec> File<C> {
    pub fn new(snapshot: Snapshot, path: impl Into<String>, value: C::Value, codec: C) -> Self {
        Self {
            snapshot,
            path: path.into(),
            value,
            codec,
        }
    }

    /// Writes the value, conditional on the leaf being unmodified since the
    /// held revision. Returns the file fast-forwarded past the write.
    pub fn create(self) -> Result<Self, RegistryError> {
        let body = self.codec.encode(&self.value)?;
        let rev = self
            .snapshot
            .conn()
            .set(&self.path, self.snapshot.rev(), body)?;
        let snapshot = self.snapshot.fast_forward(rev)?;
        Ok(Self { snapshot, ..self })
    }

    /// Replaces the value with the same CAS discipline as [`File::create`].
    pub fn update(self, value: C::Value) -> Result<Self, RegistryError> {
        Self { value, ..self }.create()
    }

    /// Deletes the leaf at the held revision.
    pub fn del(self) -> Result<(), RegistryError> {
        self.snapshot
            .conn()
            .del(&self.path, self.snapshot.rev())
    }

    pub fn value(&self) -> &C::Value {
        &self.value
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The revision this file handle is bound to.
    pub fn rev(&self) -> Rev {
        self.snapshot.rev()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Reads and decodes the leaf at `path`, at the snapshot's revision.
pub fn get_file<C: Codec>(
    snapshot: &Snapshot,
    path: &str,
    codec: C,
) -> Result<File<C>, RegistryError> {
    let (body, _) = snapshot.conn().get(path, Some(snapshot.rev()))?;
    let value = codec.decode(&body)?;
    Ok(File::new(snapshot.clone(), path, value, codec))
}

/// A directory handle: a path bound to a snapshot.
#[derive(Debug, Clone)]
pub struct Dir {
    snapshot: Snapshot,
    name: String,
}

impl Dir {
    pub fn new(snapshot: Snapshot, name: impl Into<String>) -> Self {
        Self {
            snapshot,
            name: name.into(),
        }
    }

    /// The directory's own path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path of `sub` inside this directory; `""` and `"/"` mean the
    /// directory itself.
    pub fn prefix(&self, sub: &str) -> String {
        let sub = sub.trim_matches('/');
        if sub.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{sub}", self.name)
        }
    }

    /// CAS-writes a string leaf inside the directory.
    pub fn set(&self, sub: &str, value: &str) -> Result<Rev, RegistryError> {
        self.snapshot.conn().set(
            &self.prefix(sub),
            self.snapshot.rev(),
            Bytes::copy_from_slice(value.as_bytes()),
        )
    }

    /// Reads a string leaf at the held revision.
    pub fn get_string(&self, sub: &str) -> Result<String, RegistryError> {
        let (body, _) = self
            .snapshot
            .conn()
            .get(&self.prefix(sub), Some(self.snapshot.rev()))?;
        StringCodec.decode(&body)
    }

    /// CAS-deletes `sub` (or, for `""`/`"/"`, the whole directory).
    pub fn del(&self, sub: &str) -> Result<(), RegistryError> {
        self.snapshot
            .conn()
            .del(&self.prefix(sub), self.snapshot.rev())
    }

    /// Child names of `sub` at the held revision.
    pub fn getdir(&self, sub: &str) -> Result<Vec<String>, RegistryError> {
        self.snapshot.getdir(&self.prefix(sub))
    }

    /// Whether `sub` exists at the held revision.
    pub fn exists(&self, sub: &str) -> Result<bool, RegistryError> {
        self.snapshot.exists(&self.prefix(sub))
    }

    /// Whether `sub` exists in the live store, regardless of the held
    /// revision. Registration guards use this so that a collision is
    /// reported as such even through a stale handle.
    pub fn exists_now(&self, sub: &str) -> Result<bool, RegistryError> {
        let (found, _) = self.snapshot.conn().exists(&self.prefix(sub), None)?;
        Ok(found)
    }
}

impl Snapshotable for Dir {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            name: self.name.clone(),
        }
    }
}
