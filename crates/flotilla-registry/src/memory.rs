//! In-memory registry backend.
//!
//! [`MemoryBackend`] is a single-process, linearizable implementation of
//! [`RegistryBackend`]: every mutation is assigned the next global revision,
//! every path keeps its full version history, and reads are answered as of
//! any past revision. It backs the test suites and embedders that do not
//! need an external coordinator.
//!
//! Watch is implemented over a global event log: [`MemoryBackend::wait`]
//! scans the log for the first matching event past the caller's revision
//! and parks on a condvar until one arrives. [`MemoryBackend::close`]
//! releases every parked waiter with [`RegistryError::Closed`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use flotilla_types::Rev;
use globset::{GlobBuilder, GlobMatcher};

use crate::{Event, EventKind, RegistryBackend, RegistryError};

/// One write or deletion of a path.
#[derive(Debug, Clone)]
struct Version {
    /// Revision the mutation landed at.
    rev: Rev,
    /// Written body; `None` marks a deletion.
    body: Option<Bytes>,
}

#[derive(Debug, Default)]
struct State {
    /// Head revision; the next mutation lands at `head.succ()`.
    head: Rev,
    /// Full version history per path, oldest first.
    nodes: BTreeMap<String, Vec<Version>>,
    /// Every mutation ever applied, ordered by revision. Kept whole so a
    /// watcher may resume from any past revision.
    log: Vec<Event>,
    closed: bool,
}

impl State {
    /// Resolves an optional read revision against the head.
    fn resolve(&self, at: Option<Rev>) -> Rev {
        match at {
            Some(rev) if !rev.is_head() => rev,
            _ => self.head,
        }
    }

    /// The body of `path` as of `at`, with its modification revision.
    fn leaf_at(&self, path: &str, at: Rev) -> Option<(&Bytes, Rev)> {
        let versions = self.nodes.get(path)?;
        let version = versions.iter().rev().find(|v| v.rev <= at)?;
        version.body.as_ref().map(|body| (body, version.rev))
    }

    /// The revision `path` was last mutated at (deletions included).
    fn last_touched(&self, path: &str) -> Rev {
        self.nodes
            .get(path)
            .and_then(|versions| versions.last())
            .map_or(Rev::ZERO, |v| v.rev)
    }

    /// Live leaf paths at `at` that are `path` itself or below it.
    fn leaves_under(&self, path: &str, at: Rev) -> Vec<String> {
        let prefix = child_prefix(path);
        self.nodes
            .keys()
            .filter(|key| key.as_str() == path || key.starts_with(&prefix))
            .filter(|key| self.leaf_at(key, at).is_some())
            .cloned()
            .collect()
    }

    fn guard_open(&self) -> Result<(), RegistryError> {
        if self.closed {
            Err(RegistryError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Prefix that child paths of `path` start with.
fn child_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    }
}

/// Strips surrounding slashes; the empty string is the root.
fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn compile_glob(glob: &str) -> Result<GlobMatcher, RegistryError> {
    GlobBuilder::new(normalize(glob))
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| RegistryError::BadGlob {
            glob: glob.to_owned(),
            reason: e.to_string(),
        })
}

/// A linearizable, versioned, in-memory registry.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    watchers: Condvar,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the connection: subsequent operations and in-flight
    /// [`RegistryBackend::wait`] calls fail with [`RegistryError::Closed`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.watchers.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegistryBackend for MemoryBackend {
    fn rev(&self) -> Result<Rev, RegistryError> {
        let state = self.lock();
        state.guard_open()?;
        Ok(state.head)
    }

    fn exists(&self, path: &str, at: Option<Rev>) -> Result<(bool, Rev), RegistryError> {
        let path = normalize(path);
        let state = self.lock();
        state.guard_open()?;
        let at = state.resolve(at);
        let found = !state.leaves_under(path, at).is_empty();
        Ok((found, at))
    }

    fn get(&self, path: &str, at: Option<Rev>) -> Result<(Bytes, Rev), RegistryError> {
        let path = normalize(path);
        let state = self.lock();
        state.guard_open()?;
        let at = state.resolve(at);
        state
            .leaf_at(path, at)
            .map(|(body, rev)| (body.clone(), rev))
            .ok_or_else(|| RegistryError::NotFound {
                path: path.to_owned(),
            })
    }

    fn set(&self, path: &str, old_rev: Rev, body: Bytes) -> Result<Rev, RegistryError> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(RegistryError::BadValue {
                reason: "cannot set the root".to_owned(),
            });
        }
        let mut state = self.lock();
        state.guard_open()?;
        let current = state.last_touched(path);
        if current > old_rev && !old_rev.is_head() {
            return Err(RegistryError::RevMismatch {
                path: path.to_owned(),
                held: old_rev,
                current,
            });
        }
        let rev = state.head.succ();
        state.head = rev;
        state.nodes.entry(path.to_owned()).or_default().push(Version {
            rev,
            body: Some(body.clone()),
        });
        state.log.push(Event {
            path: path.to_owned(),
            rev,
            body,
            kind: EventKind::Set,
        });
        drop(state);
        self.watchers.notify_all();
        tracing::trace!(path, rev = %rev, "set");
        Ok(rev)
    }

    fn del(&self, path: &str, rev: Rev) -> Result<(), RegistryError> {
        let path = normalize(path);
        let mut state = self.lock();
        state.guard_open()?;
        let doomed = state.leaves_under(path, state.head);
        if doomed.is_empty() {
            return Err(RegistryError::NotFound {
                path: path.to_owned(),
            });
        }
        for leaf in &doomed {
            let current = state.last_touched(leaf);
            if current > rev && !rev.is_head() {
                return Err(RegistryError::RevMismatch {
                    path: leaf.clone(),
                    held: rev,
                    current,
                });
            }
        }
        for leaf in doomed {
            let rev = state.head.succ();
            state.head = rev;
            state
                .nodes
                .entry(leaf.clone())
                .or_default()
                .push(Version { rev, body: None });
            tracing::trace!(path = %leaf, rev = %rev, "del");
            state.log.push(Event {
                path: leaf,
                rev,
                body: Bytes::new(),
                kind: EventKind::Del,
            });
        }
        drop(state);
        self.watchers.notify_all();
        Ok(())
    }

    fn getdir(&self, path: &str, rev: Rev) -> Result<Vec<String>, RegistryError> {
        let path = normalize(path);
        let state = self.lock();
        state.guard_open()?;
        let at = state.resolve(Some(rev));
        let prefix = child_prefix(path);
        let mut children = BTreeSet::new();
        for key in state.nodes.keys() {
            if !key.starts_with(&prefix) || state.leaf_at(key, at).is_none() {
                continue;
            }
            if let Some(child) = key[prefix.len()..].split('/').next() {
                children.insert(child.to_owned());
            }
        }
        if children.is_empty() {
            return Err(RegistryError::NotFound {
                path: path.to_owned(),
            });
        }
        Ok(children.into_iter().collect())
    }

    fn wait(&self, glob: &str, since: Rev) -> Result<Event, RegistryError> {
        let matcher = compile_glob(glob)?;
        let mut state = self.lock();
        loop {
            let start = state.log.partition_point(|e| e.rev <= since);
            if let Some(event) = state.log[start..].iter().find(|e| matcher.is_match(&e.path)) {
                return Ok(event.clone());
            }
            if state.closed {
                return Err(RegistryError::Closed);
            }
            state = self
                .watchers
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
