//! # flotilla: Client-side coordination for a deployment fleet
//!
//! `Flotilla` models a deployment fleet — applications, source revisions,
//! process types, running instances, services, and work tickets — as a
//! versioned tree in an external linearizable registry. Callers obtain a
//! [`Snapshot`] via [`dial`] and [`init`], navigate to typed entities, and
//! mutate through CAS writes; every successful mutation hands back a new
//! entity bound to the strictly greater revision the write landed at.
//! A worker host runs [`watch_tickets`] against the tickets subtree,
//! claims work atomically, drives the [`Instance`] state machine, and
//! retires the ticket.
//!
//! ## Architecture
//!
//! - [`app`], [`revision`], [`proctype`], [`service`]: typed views over
//!   registry paths with register/unregister and attribute operations
//! - [`instance`]: the per-process-slot state machine
//! - [`ticket`]: work items with an atomic host-bound claim
//! - [`watch`]: change notifications → stream of claimable tickets
//! - [`config`]: TOML deployment descriptor
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use flotilla::{dial, init, App, Conn, MemoryBackend, Snapshotable};
//!
//! let conn: Conn = Arc::new(MemoryBackend::new());
//! let s = init(&dial(conn).unwrap()).unwrap();
//!
//! let app = App::new("cat", "git://cat.git", "my-stack", s.clone());
//! let app = app.register().unwrap();
//! assert!(app.snapshot().rev() > s.rev());
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod instance;
pub mod proctype;
pub mod revision;
pub mod service;
pub mod ticket;
pub mod watch;


use bytes::Bytes;
use flotilla_registry::StringCodec;

// Re-export commonly used items
pub use app::{apps, get_app, App, APPS_PATH};
pub use config::Config;
pub use error::{Error, Result};
pub use instance::{get_instance, instances, register_instance, Instance, INSTANCES_PATH};
pub use proctype::{ProcType, PROCS_PATH};
pub use revision::{app_revisions, get_revision, revisions, Revision, REVS_PATH};
pub use service::{get_endpoint, get_service, services, Endpoint, Service, SERVICES_PATH};
pub use ticket::{create_ticket, get_ticket, host_tickets, tickets, Ticket, TICKETS_PATH};
pub use watch::watch_tickets;

pub use flotilla_registry::{
    Codec, Conn, Event, EventKind, MemoryBackend, RegistryBackend, RegistryError, Snapshot,
    Snapshotable,
};
pub use flotilla_types::{valid_proc_name, InstanceState, OperationType, Rev, TicketStatus};

/// Version of the registry schema this library speaks.
pub const SCHEMA_VERSION: i64 = 1;

/// Leaf holding the schema version marker.
const VERSION_PATH: &str = "version";

/// Connects to the registry at its current head revision.
pub fn dial(conn: Conn) -> Result<Snapshot> {
    Ok(Snapshot::dial(conn)?)
}

/// One-shot schema bootstrap: writes the schema version marker if absent.
///
/// Idempotent at a higher revision — re-running fast-forwards and returns
/// the latest revision. A marker holding a different version is an error.
pub fn init(snapshot: &Snapshot) -> Result<Snapshot> {
    let version = SCHEMA_VERSION.to_string();
    let conn = snapshot.conn();

    if conn.exists(VERSION_PATH, None)?.0 {
        let (body, _) = conn.get(VERSION_PATH, None)?;
        let found = StringCodec.decode(&body)?;
        if found != version {
            return Err(error::bad_value(format!(
                "registry schema version {found} (this library speaks {version})"
            )));
        }
        return Ok(snapshot.fast_forward(Rev::HEAD)?);
    }

    match conn.set(VERSION_PATH, snapshot.rev(), Bytes::from(version)) {
        Ok(rev) => {
            tracing::info!(rev = %rev, "registry initialized");
            Ok(snapshot.fast_forward(rev)?)
        }
        // Someone else initialized concurrently; verify their marker.
        Err(e) if e.is_rev_mismatch() => init(&snapshot.fast_forward(Rev::HEAD)?),
        Err(e) => Err(e.into()),
    }
}

/// RFC 3339 UTC timestamp for `registered` leaves.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Parses a directory entry as an entity id (a store revision).
pub(crate) fn parse_id(raw: &str) -> Result<Rev> {
    raw.parse::<i64>()
        .map(Rev::new)
        .map_err(|_| error::bad_value(format!("entity id {raw:?} is not an integer")))
}
