//! Process types.
//!
//! A [`ProcType`] is a named class of processes belonging to an app
//! (`web`, `worker`, ...), stored at `apps/<app>/procs/<proc>`. Names are
//! restricted to `[a-z0-9]+`.

use flotilla_registry::{Dir, Snapshot, Snapshotable};
use flotilla_types::{valid_proc_name, InstanceState};

use crate::app::App;
use crate::error::{Error, Result};
use crate::instance::{get_instance, Instance, INSTANCES_PATH};

pub const PROCS_PATH: &str = "procs";

/// A class of processes of an application.
#[derive(Debug, Clone)]
pub struct ProcType {
    dir: Dir,
    pub app: App,
    pub name: String,
}

impl ProcType {
    pub fn new(app: &App, name: impl Into<String>, snapshot: Snapshot) -> Self {
        let name = name.into();
        let dir = Dir::new(snapshot, format!("{}/{PROCS_PATH}/{name}", app.path()));
        Self {
            dir,
            app: app.clone(),
            name,
        }
    }

    /// The proc type's directory path in the registry.
    pub fn path(&self) -> &str {
        self.dir.name()
    }

    /// Adds the proc type to its app.
    ///
    /// The name is validated first ([`Error::BadProcName`]); an existing
    /// directory is [`Error::KeyConflict`].
    pub fn register(&self) -> Result<ProcType> {
        if !valid_proc_name(&self.name) {
            return Err(Error::BadProcName {
                name: self.name.clone(),
            });
        }
        if self.dir.exists_now("/")? {
            return Err(Error::KeyConflict {
                path: self.path().to_owned(),
            });
        }
        let rev = self.dir.set("registered", &crate::timestamp())?;
        Ok(self.fast_forward(rev)?)
    }

    /// Removes the proc type.
    pub fn unregister(&self) -> Result<()> {
        self.dir.del("/")?;
        Ok(())
    }

    /// Instances of this proc type that have not failed.
    pub fn instances(&self) -> Result<Vec<Instance>> {
        self.select_instances(|state| state != InstanceState::Failed)
    }

    /// Instances of this proc type in the failed state.
    pub fn failed_instances(&self) -> Result<Vec<Instance>> {
        self.select_instances(|state| state == InstanceState::Failed)
    }

    fn select_instances(&self, keep: impl Fn(InstanceState) -> bool) -> Result<Vec<Instance>> {
        let snapshot = self.dir.snapshot();
        if !snapshot.exists(INSTANCES_PATH)? {
            return Ok(Vec::new());
        }

        let mut selected = Vec::new();
        for id in snapshot.getdir(INSTANCES_PATH)? {
            let instance = get_instance(snapshot, crate::parse_id(&id)?)?;
            if instance.app_name == self.app.name
                && instance.proc_name == self.name
                && keep(instance.state)
            {
                selected.push(instance);
            }
        }
        Ok(selected)
    }
}

impl Snapshotable for ProcType {
    fn snapshot(&self) -> &Snapshot {
        self.dir.snapshot()
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            dir: self.dir.with_snapshot(snapshot),
            app: self.app.clone(),
            name: self.name.clone(),
        }
    }
}
