//! Observable session status.
//!
//! DESIGN
//! ======
//! A single `watch` channel holds the latest snapshot. Every operation takes
//! a ticket when it publishes `Loading`; its completion is applied only if
//! the snapshot still carries that ticket. A newer operation or a reset bumps
//! the sequence, so a slow, stale completion can never overwrite a fresher
//! status.
//!
//! Ticket allocation happens inside the channel's write lock, so sequence
//! order and publication order always agree.

use serde::Serialize;
use tokio::sync::watch;

/// Outcome of the most recent authentication operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Loading,
    Success(String),
    Error(String),
}

/// Status plus the sequence number of whoever wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub status: SessionStatus,
    pub seq: u64,
}

/// Proof that an operation published `Loading` at sequence `seq`.
#[derive(Debug)]
#[must_use = "a ticket must be finished to publish the operation's outcome"]
pub struct Ticket(u64);

impl Ticket {
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.0
    }
}

pub struct StatusBoard {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot { status: SessionStatus::Idle, seq: 0 });
        Self { tx }
    }

    /// Publish `Loading` under a fresh sequence number.
    pub fn begin(&self) -> Ticket {
        let mut seq = 0;
        self.tx.send_modify(|snap| {
            snap.seq += 1;
            snap.status = SessionStatus::Loading;
            seq = snap.seq;
        });
        Ticket(seq)
    }

    /// Publish an operation's outcome. Returns `false` if a newer operation
    /// or a reset has superseded the ticket, in which case nothing changes.
    pub fn finish(&self, ticket: Ticket, status: SessionStatus) -> bool {
        self.tx.send_if_modified(|snap| {
            if snap.seq != ticket.0 {
                return false;
            }
            snap.status = status;
            true
        })
    }

    /// Return to `Idle`, superseding any in-flight operation.
    pub fn reset(&self) -> u64 {
        let mut seq = 0;
        self.tx.send_modify(|snap| {
            snap.seq += 1;
            snap.status = SessionStatus::Idle;
            seq = snap.seq;
        });
        seq
    }

    #[must_use]
    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
