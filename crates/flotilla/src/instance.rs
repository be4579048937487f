//! Process instances.
//!
//! An [`Instance`] is a single process slot at `instances/<id>`, where
//! `<id>` is the store revision the instance was created at. Its state
//! machine is strictly ordered:
//!
//! ```text
//! initial ─register─▶ registered ─claim─▶ claimed ─start─▶ started
//!                                            │                │
//!                                            └────failed──────┴─▶ failed
//! ```
//!
//! Each transition is one CAS write; the returned instance is bound to the
//! revision the write landed at, and a stale handle fails `rev-mismatch`
//! instead of clobbering newer state. The `claimer` leaf is the
//! instance-level lock: it is CAS-created exactly once, and `start`/
//! `failed` require the calling host to match it.

use flotilla_registry::{Dir, Snapshot, Snapshotable};
use flotilla_types::{InstanceState, Rev};

use crate::error::{bad_value, Error, Result};

pub const INSTANCES_PATH: &str = "instances";

/// One running (or runnable) process slot.
#[derive(Debug, Clone)]
pub struct Instance {
    dir: Dir,
    pub id: Rev,
    pub app_name: String,
    pub rev_name: String,
    pub proc_name: String,
    pub state: InstanceState,
    /// `host:port`, present once started.
    pub addr: Option<String>,
}

fn instance_path(id: Rev) -> String {
    format!("{INSTANCES_PATH}/{id}")
}

/// Persists a new instance for `(app, rev, proctype)` in state
/// `registered`. The instance id is the snapshot's revision.
pub fn register_instance(
    snapshot: &Snapshot,
    app_name: &str,
    rev_name: &str,
    proc_name: &str,
) -> Result<Instance> {
    let id = snapshot.rev();
    let instance = Instance {
        dir: Dir::new(snapshot.clone(), instance_path(id)),
        id,
        app_name: app_name.to_owned(),
        rev_name: rev_name.to_owned(),
        proc_name: proc_name.to_owned(),
        state: InstanceState::Initial,
        addr: None,
    };

    if instance.dir.exists_now("/")? {
        return Err(Error::KeyConflict {
            path: instance.path().to_owned(),
        });
    }

    instance.dir.set("app", app_name)?;
    instance.dir.set("rev", rev_name)?;
    instance.dir.set("proctype", proc_name)?;
    let rev = instance
        .dir
        .set("state", InstanceState::Registered.as_str())?;

    let mut instance = instance.fast_forward(rev)?;
    instance.state = InstanceState::Registered;
    tracing::debug!(instance = %instance.id, app = app_name, proc = proc_name, "instance registered");
    Ok(instance)
}

impl Instance {
    /// The instance's directory path in the registry.
    pub fn path(&self) -> &str {
        self.dir.name()
    }

    /// The host currently holding the claim, if any.
    pub fn claimer(&self) -> Result<Option<String>> {
        match self.dir.get_string("claimer") {
            Ok(host) => Ok(Some(host)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The recorded failure reason, once failed.
    pub fn reason(&self) -> Result<Option<String>> {
        match self.dir.get_string("reason") {
            Ok(reason) => Ok(Some(reason)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Locks the instance to `host`.
    ///
    /// The CAS-create of the `claimer` leaf admits exactly one winner;
    /// everyone else gets [`Error::AlreadyClaimed`].
    pub fn claim(&self, host: &str) -> Result<Instance> {
        if self.dir.exists_now("claimer")? {
            return Err(Error::AlreadyClaimed);
        }
        let rev = self.dir.set("claimer", host).map_err(|e| {
            if e.is_rev_mismatch() {
                Error::AlreadyClaimed
            } else {
                Error::Registry(e)
            }
        })?;

        let dir = self.dir.fast_forward(rev)?;
        let rev = dir.set("state", InstanceState::Claimed.as_str())?;

        let mut instance = self.fast_forward(rev)?;
        instance.state = InstanceState::Claimed;
        tracing::debug!(instance = %instance.id, host, "instance claimed");
        Ok(instance)
    }

    /// Records the runtime address and moves the instance to `started`.
    ///
    /// Only the claiming host may start the instance.
    pub fn start(&self, host: &str, port: u16, domain: &str) -> Result<Instance> {
        self.authorize(host)?;

        // The handle may predate the claim; once authorized, mutate at
        // the live revision.
        let dir = self.dir.fast_forward(Rev::HEAD)?;
        let addr = format!("{host}:{port}");
        dir.set("addr", &addr)?;
        dir.set("domain", domain)?;
        let rev = dir.set("state", InstanceState::Started.as_str())?;

        let mut instance = self.fast_forward(rev)?;
        instance.state = InstanceState::Started;
        instance.addr = Some(addr);
        tracing::debug!(instance = %instance.id, host, port, "instance started");
        Ok(instance)
    }

    /// Records a failure reason and moves the instance to `failed`.
    /// Terminal; only the claiming host may fail the instance.
    pub fn failed(&self, host: &str, reason: &str) -> Result<Instance> {
        self.authorize(host)?;

        let dir = self.dir.fast_forward(Rev::HEAD)?;
        dir.set("reason", reason)?;
        let rev = dir.set("state", InstanceState::Failed.as_str())?;

        let mut instance = self.fast_forward(rev)?;
        instance.state = InstanceState::Failed;
        tracing::debug!(instance = %instance.id, host, reason, "instance failed");
        Ok(instance)
    }

    /// Removes the instance and everything under it.
    pub fn unregister(&self) -> Result<()> {
        self.dir.del("/")?;
        Ok(())
    }

    // The claim is checked against the live store, not the held revision:
    // authorization must see the claimer even through a stale handle.
    fn authorize(&self, host: &str) -> Result<()> {
        let path = self.dir.prefix("claimer");
        let (body, _) = self.dir.snapshot().conn().get(&path, None)?;
        if &body[..] != host.as_bytes() {
            return Err(Error::Unauthorized {
                host: host.to_owned(),
            });
        }
        Ok(())
    }
}

impl Snapshotable for Instance {
    fn snapshot(&self) -> &Snapshot {
        self.dir.snapshot()
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            dir: self.dir.with_snapshot(snapshot),
            id: self.id,
            app_name: self.app_name.clone(),
            rev_name: self.rev_name.clone(),
            proc_name: self.proc_name.clone(),
            state: self.state,
            addr: self.addr.clone(),
        }
    }
}

/// Fetches the instance with the given id.
pub fn get_instance(snapshot: &Snapshot, id: Rev) -> Result<Instance> {
    let dir = Dir::new(snapshot.clone(), instance_path(id));

    let app_name = dir.get_string("app")?;
    let rev_name = dir.get_string("rev")?;
    let proc_name = dir.get_string("proctype")?;
    let raw_state = dir.get_string("state")?;
    let state = InstanceState::parse(&raw_state)
        .ok_or_else(|| bad_value(format!("unknown instance state {raw_state:?}")))?;
    let addr = match dir.get_string("addr") {
        Ok(addr) => Some(addr),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Instance {
        dir,
        id,
        app_name,
        rev_name,
        proc_name,
        state,
        addr,
    })
}

/// All instances, at the snapshot's revision.
pub fn instances(snapshot: &Snapshot) -> Result<Vec<Instance>> {
    if !snapshot.exists(INSTANCES_PATH)? {
        return Ok(Vec::new());
    }
    snapshot
        .getdir(INSTANCES_PATH)?
        .iter()
        .map(|id| get_instance(snapshot, crate::parse_id(id)?))
        .collect()
}
