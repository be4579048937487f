//! Applications.
//!
//! An [`App`] lives at `apps/<name>`: a JSON `attrs` leaf (repository URL,
//! stack, deploy type), a `registered` timestamp, an `env/` subtree of
//! plain string variables, and the `revs/` and `procs/` subtrees owned by
//! [`crate::revision`] and [`crate::proctype`].

use std::collections::HashMap;

use flotilla_registry::{get_file, Dir, File, JsonCodec, Snapshot, Snapshotable};
use flotilla_types::Rev;

use crate::error::{bad_value, Error, Result};

pub const APPS_PATH: &str = "apps";

/// Deploy type assigned when the caller leaves it empty.
const DEPLOY_LXC: &str = "lxc";

/// An application known to the orchestrator.
#[derive(Debug, Clone)]
pub struct App {
    dir: Dir,
    pub name: String,
    pub repo_url: String,
    pub stack: String,
    pub deploy_type: String,
}

impl App {
    /// Builds an unregistered handle; nothing is written until
    /// [`App::register`].
    pub fn new(
        name: impl Into<String>,
        repo_url: impl Into<String>,
        stack: impl Into<String>,
        snapshot: Snapshot,
    ) -> Self {
        let name = name.into();
        let dir = Dir::new(snapshot, format!("{APPS_PATH}/{name}"));
        Self {
            dir,
            name,
            repo_url: repo_url.into(),
            stack: stack.into(),
            deploy_type: String::new(),
        }
    }

    /// The app's directory path in the registry.
    pub fn path(&self) -> &str {
        self.dir.name()
    }

    /// Adds the app to the global state.
    ///
    /// Fails with [`Error::KeyConflict`] when the directory already exists.
    /// An empty deploy type defaults to `lxc`.
    pub fn register(&self) -> Result<App> {
        if self.dir.exists_now("/")? {
            return Err(Error::KeyConflict {
                path: self.path().to_owned(),
            });
        }

        self.dir.set("registered", &crate::timestamp())?;

        let deploy_type = if self.deploy_type.is_empty() {
            DEPLOY_LXC.to_owned()
        } else {
            self.deploy_type.clone()
        };
        let attrs = serde_json::json!({
            "repo-url": self.repo_url,
            "stack": self.stack,
            "deploy-type": deploy_type,
        });
        let attrs = File::new(
            self.dir.snapshot().clone(),
            self.dir.prefix("attrs"),
            attrs,
            JsonCodec,
        )
        .create()?;

        let mut app = self.fast_forward(attrs.rev())?;
        app.deploy_type = deploy_type;
        tracing::info!(app = %app.name, "app registered");
        Ok(app)
    }

    /// Removes the app and everything under it.
    pub fn unregister(&self) -> Result<()> {
        self.dir.del("/")?;
        Ok(())
    }

    /// All environment variables of this app.
    pub fn environment_vars(&self) -> Result<HashMap<String, String>> {
        let keys = match self.dir.getdir("env") {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut vars = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = self.get_environment_var(&key)?;
            vars.insert(key, value);
        }
        Ok(vars)
    }

    /// The value stored for the given key.
    pub fn get_environment_var(&self, key: &str) -> Result<String> {
        Ok(self.dir.get_string(&format!("env/{key}"))?)
    }

    /// Stores the value for the given key.
    pub fn set_environment_var(&self, key: &str, value: &str) -> Result<App> {
        let rev = self.dir.set(&format!("env/{key}"), value)?;
        Ok(self.fast_forward(rev)?)
    }

    /// Removes the variable for the given key.
    pub fn del_environment_var(&self, key: &str) -> Result<App> {
        self.dir.del(&format!("env/{key}"))?;
        Ok(self.fast_forward(Rev::HEAD)?)
    }
}

impl Snapshotable for App {
    fn snapshot(&self) -> &Snapshot {
        self.dir.snapshot()
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            dir: self.dir.with_snapshot(snapshot),
            name: self.name.clone(),
            repo_url: self.repo_url.clone(),
            stack: self.stack.clone(),
            deploy_type: self.deploy_type.clone(),
        }
    }
}

fn attr_str(attrs: &serde_json::Value, key: &str) -> Result<String> {
    attrs
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| bad_value(format!("app attrs missing {key:?}")))
}

/// Fetches the app with the given name.
pub fn get_app(snapshot: &Snapshot, name: &str) -> Result<App> {
    let mut app = App::new(name, "", "", snapshot.clone());
    let attrs = get_file(snapshot, &app.dir.prefix("attrs"), JsonCodec)?;

    app.repo_url = attr_str(attrs.value(), "repo-url")?;
    app.stack = attr_str(attrs.value(), "stack")?;
    app.deploy_type = attr_str(attrs.value(), "deploy-type")?;
    Ok(app)
}

/// All registered apps, at the snapshot's revision.
pub fn apps(snapshot: &Snapshot) -> Result<Vec<App>> {
    if !snapshot.exists(APPS_PATH)? {
        return Ok(Vec::new());
    }
    snapshot
        .getdir(APPS_PATH)?
        .iter()
        .map(|name| get_app(snapshot, name))
        .collect()
}
