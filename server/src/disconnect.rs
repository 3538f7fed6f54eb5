//! Deduplicated disconnect requests, drained in batches by the relay loop.

use crate::participant::{Participant, ParticipantId};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Participants waiting to be torn down, in request order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingDisconnects {
    pub graceful: Vec<ParticipantId>,
    pub forced: Vec<ParticipantId>,
}

impl PendingDisconnects {
    /// Queue `participant` unless it is already disconnecting or already
    /// queued in either set. Returns true if it was queued.
    pub fn request(&mut self, participant: &Participant, forced: bool) -> bool {
        if participant.is_disconnecting || self.contains(participant.id) {
            return false;
        }

        if forced {
            self.forced.push(participant.id);
        } else {
            self.graceful.push(participant.id);
        }
        true
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.graceful.contains(&id) || self.forced.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.graceful.is_empty() && self.forced.is_empty()
    }

    pub fn len(&self) -> usize {
        self.graceful.len() + self.forced.len()
    }
}

/// Thread-safe front for [`PendingDisconnects`]; requests and drains never interleave.
#[derive(Debug, Default)]
pub struct DisconnectCoordinator {
    pending: Mutex<PendingDisconnects>,
}

impl DisconnectCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redundant requests are absorbed silently.
    pub fn request_disconnect(&self, participant: &Participant, forced: bool) {
        if self.lock().request(participant, forced) {
            tracing::debug!(
                "Queued {} disconnect for participant {}",
                if forced { "forced" } else { "graceful" },
                participant.id
            );
        }
    }

    pub fn is_pending(&self, id: ParticipantId) -> bool {
        self.lock().contains(id)
    }

    /// Take everything queued so far, leaving both sets empty.
    pub fn drain(&self) -> PendingDisconnects {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, PendingDisconnects> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
