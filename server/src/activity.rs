//! Last-activity timestamps, written by socket tasks and read by the liveness monitor.

use crate::liveness::ParticipantSource;
use crate::participant::{Identified, ParticipantId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct ActivityRecord {
    pub id: ParticipantId,
    pub last_activity: Instant,
}

impl ActivityRecord {
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }
}

impl Identified for ActivityRecord {
    fn participant_id(&self) -> ParticipantId {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct ActivityTracker {
    last_seen: Mutex<HashMap<ParticipantId, Instant>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, id: ParticipantId) {
        self.touch_at(id, Instant::now());
    }

    pub fn touch_at(&self, id: ParticipantId, at: Instant) {
        self.lock().insert(id, at);
    }

    pub fn remove(&self, id: ParticipantId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn last_activity(&self, id: ParticipantId) -> Option<Instant> {
        self.lock().get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ParticipantId, Instant>> {
        self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ParticipantSource for ActivityTracker {
    type Entry = ActivityRecord;

    fn snapshot(&self) -> Vec<ActivityRecord> {
        let mut records: Vec<ActivityRecord> = self
            .lock()
            .iter()
            .map(|(&id, &last_activity)| ActivityRecord { id, last_activity })
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }
}
