//! Render handoff between mutators and a single render consumer.
//!
//! A mutator takes a ticket and blocks until the consumer has drawn that
//! ticket. The consumer serves tickets one at a time, in order. Aborting the
//! rendezvous releases every waiter on both sides with an explicit signal.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::automaton::lock;
use crate::error::{AutomatonError, AutomatonResult};

/// Longest a waiter sleeps before re-checking the slot.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Slot {
    requested: u64,
    completed: u64,
    aborted: bool,
}

/// Single-slot rendezvous with a poisoned ("aborted") terminal state.
#[derive(Debug, Default)]
pub struct RenderRendezvous {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl RenderRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that a render is needed and wait until it has been drawn.
    ///
    /// Returns [`AutomatonError::RenderAborted`] if the rendezvous is or
    /// becomes aborted before the render completes.
    pub fn request(&self) -> AutomatonResult<()> {
        let mut slot = lock(&self.slot);
        if slot.aborted {
            return Err(AutomatonError::RenderAborted);
        }
        slot.requested += 1;
        let ticket = slot.requested;
        self.changed.notify_all();

        while slot.completed < ticket {
            if slot.aborted {
                debug!(ticket, "render_request_aborted");
                return Err(AutomatonError::RenderAborted);
            }
            slot = self
                .changed
                .wait_timeout(slot, LIVENESS_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }

    /// Block until a render is pending and return its ticket.
    ///
    /// Returns `None` once the rendezvous is aborted.
    pub fn next_request(&self) -> Option<u64> {
        let mut slot = lock(&self.slot);
        loop {
            if slot.aborted {
                return None;
            }
            if slot.completed < slot.requested {
                return Some(slot.completed + 1);
            }
            slot = self
                .changed
                .wait_timeout(slot, LIVENESS_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Mark a ticket as drawn and release its requester.
    pub fn acknowledge(&self, ticket: u64) {
        let mut slot = lock(&self.slot);
        slot.completed = slot.completed.max(ticket);
        self.changed.notify_all();
    }

    /// Serve one pending render with `draw`. Returns `false` once aborted.
    pub fn serve(&self, draw: impl FnOnce()) -> bool {
        match self.next_request() {
            Some(ticket) => {
                draw();
                self.acknowledge(ticket);
                true
            }
            None => false,
        }
    }

    /// Permanently disable the rendezvous and wake every waiter.
    pub fn abort(&self) {
        let mut slot = lock(&self.slot);
        slot.aborted = true;
        self.changed.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        lock(&self.slot).aborted
    }
}
