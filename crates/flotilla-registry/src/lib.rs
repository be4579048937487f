//! # flotilla-registry: Registry client primitives for `Flotilla`
//!
//! Everything `Flotilla` knows about its coordination store lives here:
//!
//! - [`backend`]: the [`RegistryBackend`] trait — revisioned reads, CAS
//!   writes, directory listing, blocking watch
//! - [`memory`]: a linearizable in-memory backend for tests and embedding
//! - [`codec`]: leaf value codecs (string, space-separated list, JSON)
//! - [`snapshot`]: immutable [`Snapshot`] handles and the
//!   [`Snapshotable`] fast-forward hook
//! - [`file`]: CAS-guarded [`File`] and [`Dir`] primitives
//!
//! The backend is the only component that performs I/O; the layers above
//! are pure composition of backend calls. Callers navigate from a
//! [`Snapshot`], and every mutation returns a handle bound to the strictly
//! greater revision the write landed at.

pub mod backend;
pub mod codec;
pub mod error;
pub mod file;
pub mod memory;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use backend::{Conn, Event, EventKind, RegistryBackend};
pub use codec::{Codec, JsonCodec, ListCodec, StringCodec};
pub use error::RegistryError;
pub use file::{get_file, Dir, File};
pub use memory::MemoryBackend;
pub use snapshot::{Snapshot, Snapshotable};
