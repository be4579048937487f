//! Application revisions.
//!
//! A [`Revision`] is a named source snapshot of an app, identified by an
//! opaque `ref`, stored at `apps/<app>/revs/<ref>`. Its lifecycle is
//! `propose` (the ref exists) followed by `accept` (a build artifact is
//! available at `archive-url`).

use flotilla_registry::{Dir, RegistryError, Snapshot, Snapshotable};

use crate::app::{apps, App};
use crate::error::{Error, Result};

pub const REVS_PATH: &str = "revs";

/// A revision of an application.
#[derive(Debug, Clone)]
pub struct Revision {
    dir: Dir,
    pub app: App,
    pub ref_name: String,
    /// Present once the revision has been accepted.
    pub archive_url: Option<String>,
}

impl Revision {
    pub fn new(app: &App, ref_name: impl Into<String>, snapshot: Snapshot) -> Self {
        let ref_name = ref_name.into();
        let dir = Dir::new(snapshot, format!("{}/{REVS_PATH}/{ref_name}", app.path()));
        Self {
            dir,
            app: app.clone(),
            ref_name,
            archive_url: None,
        }
    }

    /// The revision's directory path in the registry.
    pub fn path(&self) -> &str {
        self.dir.name()
    }

    /// Makes the ref known to the registry.
    ///
    /// Fails with [`Error::KeyConflict`] when the ref already exists.
    pub fn propose(&self) -> Result<Revision> {
        if self.dir.exists_now("/")? {
            return Err(Error::KeyConflict {
                path: self.path().to_owned(),
            });
        }
        let rev = self.dir.set("registered", &crate::timestamp())?;
        Ok(self.fast_forward(rev)?)
    }

    /// Records the build artifact for a proposed revision.
    pub fn accept(&self, archive_url: &str) -> Result<Revision> {
        let rev = self.dir.set("archive-url", archive_url)?;
        let mut revision = self.fast_forward(rev)?;
        revision.archive_url = Some(archive_url.to_owned());
        tracing::info!(app = %self.app.name, rev = %self.ref_name, "revision accepted");
        Ok(revision)
    }

    /// Removes the revision from the registry.
    pub fn unregister(&self) -> Result<()> {
        self.dir.del("/")?;
        Ok(())
    }
}

impl Snapshotable for Revision {
    fn snapshot(&self) -> &Snapshot {
        self.dir.snapshot()
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            dir: self.dir.with_snapshot(snapshot),
            app: self.app.clone(),
            ref_name: self.ref_name.clone(),
            archive_url: self.archive_url.clone(),
        }
    }
}

/// Fetches the revision `ref_name` of `app`.
pub fn get_revision(snapshot: &Snapshot, app: &App, ref_name: &str) -> Result<Revision> {
    let mut revision = Revision::new(app, ref_name, snapshot.clone());
    if !revision.dir.exists("/")? {
        return Err(Error::Registry(RegistryError::NotFound {
            path: revision.path().to_owned(),
        }));
    }
    revision.archive_url = match revision.dir.get_string("archive-url") {
        Ok(url) => Some(url),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };
    Ok(revision)
}

/// All revisions of the given app.
pub fn app_revisions(snapshot: &Snapshot, app: &App) -> Result<Vec<Revision>> {
    let revs_path = format!("{}/{REVS_PATH}", app.path());
    if !snapshot.exists(&revs_path)? {
        return Ok(Vec::new());
    }
    snapshot
        .getdir(&revs_path)?
        .iter()
        .map(|ref_name| get_revision(snapshot, app, ref_name))
        .collect()
}

/// All revisions of all registered apps.
pub fn revisions(snapshot: &Snapshot) -> Result<Vec<Revision>> {
    let mut all = Vec::new();
    for app in apps(snapshot)? {
        all.extend(app_revisions(snapshot, &app)?);
    }
    Ok(all)
}
