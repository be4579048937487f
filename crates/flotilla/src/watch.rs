//! Ticket watch and dispatch.
//!
//! [`watch_tickets`] turns registry change notifications on the tickets
//! subtree into a stream of claimable [`Ticket`]s: newly created tickets
//! and tickets returned to the pool by `unclaim`, in revision order,
//! without polling.

use crossbeam_channel::Sender;
use flotilla_registry::{Event, Snapshot};
use flotilla_types::{Rev, TicketStatus};

use crate::error::{bad_value, Result};
use crate::ticket::{get_ticket, Ticket, TICKETS_PATH};

/// Watches the tickets subtree from the snapshot's revision onward and
/// publishes every ticket that becomes unclaimed on `sink`.
///
/// Runs until the sink disconnects (returns `Ok`) or the registry
/// connection fails — closing the connection is how a watcher is stopped,
/// and surfaces here as the adapter's error. An event whose ticket cannot
/// be decoded is logged and skipped so one malformed ticket cannot stall
/// dispatch.
pub fn watch_tickets(snapshot: &Snapshot, sink: &Sender<Ticket>) -> Result<()> {
    let glob = format!("{TICKETS_PATH}/*/status");
    let mut last = snapshot.rev();

    loop {
        let event = snapshot.conn().wait(&glob, last)?;
        last = event.rev;

        if !event.is_set() || &event.body[..] != TicketStatus::Unclaimed.as_str().as_bytes() {
            continue;
        }

        let ticket = match parse_status_event(snapshot, &event) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(path = %event.path, error = %e, "discarding undecodable ticket event");
                continue;
            }
        };

        if sink.send(ticket).is_err() {
            return Ok(());
        }
    }
}

/// Rebuilds the ticket behind a `tickets/<id>/status` event, read at the
/// event's revision.
fn parse_status_event(snapshot: &Snapshot, event: &Event) -> Result<Ticket> {
    let id = event
        .path
        .split('/')
        .nth(1)
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or_else(|| bad_value(format!("no ticket id in event path {:?}", event.path)))?;

    let at = snapshot.fast_forward(event.rev)?;
    get_ticket(&at, Rev::new(id))
}
