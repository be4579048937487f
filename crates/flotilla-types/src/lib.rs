//! # flotilla-types: Core types for `Flotilla`
//!
//! This crate contains shared types used across the `Flotilla` system:
//! - Store revisions ([`Rev`])
//! - Ticket operations ([`OperationType`]) and status ([`TicketStatus`])
//! - Instance lifecycle states ([`InstanceState`])
//! - Proc type name validation ([`valid_proc_name`])

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Store Revision - Copy (cheap 8-byte value)
// ============================================================================

/// A global revision of the coordination registry.
///
/// The registry assigns a strictly increasing revision to every successful
/// mutation, so two writes have a total order visible to every observer.
/// Reads performed "at" a revision see exactly the writes at or before it.
///
/// [`Rev::HEAD`] (-1) is the sentinel for "whatever the latest revision is";
/// it is resolved against the live connection before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rev(i64);

impl Rev {
    /// The "latest revision" sentinel.
    pub const HEAD: Rev = Rev(-1);

    /// The revision of the empty registry.
    pub const ZERO: Rev = Rev(0);

    pub fn new(rev: i64) -> Self {
        Self(rev)
    }

    /// Returns the revision as a raw `i64`.
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns true if this is the [`Rev::HEAD`] sentinel.
    pub fn is_head(self) -> bool {
        self.0 < 0
    }

    /// The immediately following revision.
    pub fn succ(self) -> Rev {
        Rev(self.0 + 1)
    }
}

impl Default for Rev {
    fn default() -> Self {
        Rev::ZERO
    }
}

impl Display for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Rev {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Rev> for i64 {
    fn from(rev: Rev) -> Self {
        rev.0
    }
}

// ============================================================================
// Ticket Operations
// ============================================================================

/// The operation a ticket instructs a worker host to perform.
///
/// Unknown strings decode to [`OperationType::Invalid`] rather than failing:
/// a ticket with an unrecognized operation must still be representable so it
/// can be listed and retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Start,
    Stop,
    Invalid,
}

impl OperationType {
    /// Parses the wire form; anything unrecognized is [`OperationType::Invalid`].
    pub fn parse(s: &str) -> Self {
        match s {
            "start" => OperationType::Start,
            "stop" => OperationType::Stop,
            _ => OperationType::Invalid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Start => "start",
            OperationType::Stop => "stop",
            OperationType::Invalid => "<invalid>",
        }
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a ticket in its dispatch lifecycle.
///
/// `unclaimed → claimed → done`, with re-entry to `unclaimed` when a host
/// releases a claim it could not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    Unclaimed,
    Claimed,
    Done,
}

impl TicketStatus {
    /// Parses the wire form; returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unclaimed" => Some(TicketStatus::Unclaimed),
            "claimed" => Some(TicketStatus::Claimed),
            "done" => Some(TicketStatus::Done),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Unclaimed => "unclaimed",
            TicketStatus::Claimed => "claimed",
            TicketStatus::Done => "done",
        }
    }
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Instance States
// ============================================================================

/// Lifecycle state of a process instance.
///
/// Transitions are strictly ordered (no skips):
/// `initial → registered → claimed → started → failed`, where `failed` is
/// also reachable directly from `claimed` and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InstanceState {
    #[default]
    Initial,
    Registered,
    Claimed,
    Started,
    Failed,
}

impl InstanceState {
    /// Parses the wire form; returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(InstanceState::Initial),
            "registered" => Some(InstanceState::Registered),
            "claimed" => Some(InstanceState::Claimed),
            "started" => Some(InstanceState::Started),
            "failed" => Some(InstanceState::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::Initial => "initial",
            InstanceState::Registered => "registered",
            InstanceState::Claimed => "claimed",
            InstanceState::Started => "started",
            InstanceState::Failed => "failed",
        }
    }
}

impl Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Proc Type Names
// ============================================================================

/// Returns true if `name` is a legal proc type name.
///
/// The allowed character class is deliberately narrow (`[a-z0-9]+`):
/// widening it to hyphens, underscores, or upper case would be a registry
/// path compatibility break.
pub fn valid_proc_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
