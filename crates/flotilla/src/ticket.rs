//! Work tickets.
//!
//! A [`Ticket`] carries one instruction — start or stop an instance of
//! `(app, rev, proctype)` — at `tickets/<id>`, where `<id>` is the store
//! revision the ticket was created at and therefore unique. The `op` leaf
//! holds the list-encoded instruction; the `status` leaf drives dispatch
//! (`unclaimed → claimed → done`); the claiming host is recorded under
//! `claims/<host>`.
//!
//! Claiming must admit exactly one of n concurrent hosts. Per-host claim
//! paths cannot conflict with each other under per-path CAS, so the shared
//! `status` leaf is the serialization point: whoever CAS-writes it at the
//! held revision wins, and the loser's `rev-mismatch` is reported as
//! [`Error::AlreadyClaimed`].

use flotilla_registry::{get_file, Dir, File, ListCodec, Snapshot, Snapshotable};
use flotilla_types::{OperationType, Rev, TicketStatus};

use crate::error::{bad_value, Error, Result};

pub const TICKETS_PATH: &str = "tickets";
const CLAIMS_PATH: &str = "claims";

/// An instruction to start or stop an instance.
#[derive(Debug, Clone)]
pub struct Ticket {
    dir: Dir,
    pub id: Rev,
    pub app_name: String,
    pub rev_name: String,
    pub proc_name: String,
    pub op: OperationType,
    pub status: TicketStatus,
}

fn ticket_path(id: Rev) -> String {
    format!("{TICKETS_PATH}/{id}")
}

/// Files a new unclaimed ticket; its id is the snapshot's revision.
pub fn create_ticket(
    app_name: &str,
    rev_name: &str,
    proc_name: &str,
    op: OperationType,
    snapshot: &Snapshot,
) -> Result<Ticket> {
    let id = snapshot.rev();
    let ticket = Ticket {
        dir: Dir::new(snapshot.clone(), ticket_path(id)),
        id,
        app_name: app_name.to_owned(),
        rev_name: rev_name.to_owned(),
        proc_name: proc_name.to_owned(),
        op,
        status: TicketStatus::Unclaimed,
    };

    File::new(
        snapshot.clone(),
        ticket.dir.prefix("op"),
        ticket.to_list(),
        ListCodec,
    )
    .create()?;
    let rev = ticket.dir.set("status", TicketStatus::Unclaimed.as_str())?;

    let ticket = ticket.fast_forward(rev)?;
    tracing::info!(ticket = %ticket.id, app = app_name, op = %op, "ticket created");
    Ok(ticket)
}

impl Ticket {
    /// The ticket's directory path in the registry.
    pub fn path(&self) -> &str {
        self.dir.name()
    }

    /// The claim holder at this handle's revision, if any.
    pub fn claimer(&self) -> Result<Option<String>> {
        self.claimer_at(self.dir.snapshot().rev())
    }

    fn claimer_at(&self, at: Rev) -> Result<Option<String>> {
        let claims = self.dir.prefix(CLAIMS_PATH);
        match self.dir.snapshot().conn().getdir(&claims, at) {
            Ok(hosts) => Ok(hosts.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Locks the ticket to `host`.
    ///
    /// Exactly one of n concurrent claimers succeeds; the rest get
    /// [`Error::AlreadyClaimed`].
    pub fn claim(&self, host: &str) -> Result<Ticket> {
        if self.claimer_at(Rev::HEAD)?.is_some() {
            return Err(Error::AlreadyClaimed);
        }
        let rev = self
            .dir
            .set("status", TicketStatus::Claimed.as_str())
            .map_err(|e| {
                if e.is_rev_mismatch() {
                    Error::AlreadyClaimed
                } else {
                    Error::Registry(e)
                }
            })?;

        let dir = self.dir.fast_forward(rev)?;
        let rev = dir.set(&format!("{CLAIMS_PATH}/{host}"), host)?;

        let mut ticket = self.fast_forward(rev)?;
        ticket.status = TicketStatus::Claimed;
        tracing::info!(ticket = %ticket.id, host, "ticket claimed");
        Ok(ticket)
    }

    /// Releases the claim held by `host` and returns the ticket to the
    /// pool; watchers see it again as `unclaimed`.
    pub fn unclaim(&self, host: &str) -> Result<Ticket> {
        self.authorize(host)?;

        // The handle may predate the claim; once authorized, mutate at
        // the live revision.
        let dir = self.dir.fast_forward(Rev::HEAD)?;
        dir.del(&format!("{CLAIMS_PATH}/{host}"))?;
        let rev = dir.set("status", TicketStatus::Unclaimed.as_str())?;

        let mut ticket = self.fast_forward(rev)?;
        ticket.status = TicketStatus::Unclaimed;
        tracing::info!(ticket = %ticket.id, host, "ticket unclaimed");
        Ok(ticket)
    }

    /// Retires the ticket: the whole directory is deleted. Terminal.
    pub fn done(&self, host: &str) -> Result<()> {
        self.authorize(host)?;
        let dir = self.dir.fast_forward(Rev::HEAD)?;
        dir.del("/")?;
        tracing::info!(ticket = %self.id, host, "ticket done");
        Ok(())
    }

    // Authorization reads the live claim, not the held revision, so a
    // stranger is refused even when the caller's handle predates the claim.
    fn authorize(&self, host: &str) -> Result<()> {
        match self.claimer_at(Rev::HEAD)? {
            Some(claimer) if claimer == host => Ok(()),
            _ => Err(Error::Unauthorized {
                host: host.to_owned(),
            }),
        }
    }

    /// The list-codec form of the `op` leaf.
    fn to_list(&self) -> Vec<String> {
        vec![
            self.app_name.clone(),
            self.rev_name.clone(),
            self.proc_name.clone(),
            self.op.as_str().to_owned(),
        ]
    }
}

impl Snapshotable for Ticket {
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
            op: self.op,
            status: self.status,
        }
    }
}

/// Fetches the ticket with the given id, at the snapshot's revision.
pub fn get_ticket(snapshot: &Snapshot, id: Rev) -> Result<Ticket> {
    let dir = Dir::new(snapshot.clone(), ticket_path(id));

    let op_file = get_file(snapshot, &dir.prefix("op"), ListCodec)?;
    let [app_name, rev_name, proc_name, op]: [String; 4] =
        op_file.value().clone().try_into().map_err(|_| {
            bad_value(format!(
                "ticket {id} op leaf does not hold exactly four elements"
            ))
        })?;

    let raw_status = dir.get_string("status")?;
    let status = TicketStatus::parse(&raw_status)
        .ok_or_else(|| bad_value(format!("unknown ticket status {raw_status:?}")))?;

    Ok(Ticket {
        dir,
        id,
        app_name,
        rev_name,
        proc_name,
        op: OperationType::parse(&op),
        status,
    })
}

/// All outstanding tickets, at the snapshot's revision.
pub fn tickets(snapshot: &Snapshot) -> Result<Vec<Ticket>> {
    if !snapshot.exists(TICKETS_PATH)? {
        return Ok(Vec::new());
    }
    snapshot
        .getdir(TICKETS_PATH)?
        .iter()
        .map(|id| get_ticket(snapshot, crate::parse_id(id)?))
        .collect()
}

/// Tickets currently claimed by `host`.
pub fn host_tickets(snapshot: &Snapshot, host: &str) -> Result<Vec<Ticket>> {
    let mut claimed = Vec::new();
    for ticket in tickets(snapshot)? {
        if ticket.claimer()?.as_deref() == Some(host) {
            claimed.push(ticket);
        }
    }
    Ok(claimed)
}
