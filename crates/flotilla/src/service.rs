//! Services and endpoints.
//!
//! A [`Service`] is a named dependency (a database, a broker) at
//! `services/<name>`; its addressable [`Endpoint`]s live as string leaves
//! under `services/<name>/endpoints/`.

use flotilla_registry::{Dir, RegistryError, Snapshot, Snapshotable};

use crate::error::{Error, Result};

pub const SERVICES_PATH: &str = "services";
const ENDPOINTS_PATH: &str = "endpoints";

/// A named service.
#[derive(Debug, Clone)]
pub struct Service {
    dir: Dir,
    pub name: String,
}

impl Service {
    pub fn new(name: impl Into<String>, snapshot: Snapshot) -> Self {
        let name = name.into();
        let dir = Dir::new(snapshot, format!("{SERVICES_PATH}/{name}"));
        Self { dir, name }
    }

    /// The service's directory path in the registry.
    pub fn path(&self) -> &str {
        self.dir.name()
    }

    /// Adds the service to the global state.
    pub fn register(&self) -> Result<Service> {
        if self.dir.exists_now("/")? {
            return Err(Error::KeyConflict {
                path: self.path().to_owned(),
            });
        }
        let rev = self.dir.set("registered", &crate::timestamp())?;
        Ok(self.fast_forward(rev)?)
    }

    /// Removes the service and its endpoints.
    pub fn unregister(&self) -> Result<()> {
        self.dir.del("/")?;
        Ok(())
    }

    /// All endpoints registered under this service.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        if !self.dir.exists(ENDPOINTS_PATH)? {
            return Ok(Vec::new());
        }
        self.dir
            .getdir(ENDPOINTS_PATH)?
            .iter()
            .map(|id| get_endpoint(self.dir.snapshot(), self, id))
            .collect()
    }
}

impl Snapshotable for Service {
    fn snapshot(&self) -> &Snapshot {
        self.dir.snapshot()
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            dir: self.dir.with_snapshot(snapshot),
            name: self.name.clone(),
        }
    }
}

/// Fetches the service with the given name.
pub fn get_service(snapshot: &Snapshot, name: &str) -> Result<Service> {
    let service = Service::new(name, snapshot.clone());
    if !service.dir.exists("/")? {
        return Err(Error::Registry(RegistryError::NotFound {
            path: service.path().to_owned(),
        }));
    }
    Ok(service)
}

/// All registered services, at the snapshot's revision.
pub fn services(snapshot: &Snapshot) -> Result<Vec<Service>> {
    if !snapshot.exists(SERVICES_PATH)? {
        return Ok(Vec::new());
    }
    snapshot
        .getdir(SERVICES_PATH)?
        .iter()
        .map(|name| get_service(snapshot, name))
        .collect()
}

/// An addressable entry of a service.
#[derive(Debug, Clone)]
pub struct Endpoint {
    dir: Dir,
    pub service_name: String,
    pub id: String,
    pub addr: String,
}

impl Endpoint {
    pub fn new(service: &Service, id: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            dir: service.dir.clone(),
            service_name: service.name.clone(),
            id: id.into(),
            addr: addr.into(),
        }
    }

    /// The endpoint's leaf path in the registry.
    pub fn path(&self) -> String {
        self.dir.prefix(&format!("{ENDPOINTS_PATH}/{}", self.id))
    }

    /// Adds the endpoint to its service.
    pub fn register(&self) -> Result<Endpoint> {
        if self.dir.exists_now(&format!("{ENDPOINTS_PATH}/{}", self.id))? {
            return Err(Error::KeyConflict { path: self.path() });
        }
        let rev = self
            .dir
            .set(&format!("{ENDPOINTS_PATH}/{}", self.id), &self.addr)?;
        Ok(self.fast_forward(rev)?)
    }

    /// Removes the endpoint.
    pub fn unregister(&self) -> Result<()> {
        self.dir.del(&format!("{ENDPOINTS_PATH}/{}", self.id))?;
        Ok(())
    }
}

impl Snapshotable for Endpoint {
    fn snapshot(&self) -> &Snapshot {
        self.dir.snapshot()
    }

    fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            dir: self.dir.with_snapshot(snapshot),
            service_name: self.service_name.clone(),
            id: self.id.clone(),
            addr: self.addr.clone(),
        }
    }
}

/// Fetches one endpoint of `service` by id.
pub fn get_endpoint(snapshot: &Snapshot, service: &Service, id: &str) -> Result<Endpoint> {
    let service = service.with_snapshot(snapshot.clone());
    let addr = service.dir.get_string(&format!("{ENDPOINTS_PATH}/{id}"))?;
    Ok(Endpoint::new(&service, id, addr))
}
