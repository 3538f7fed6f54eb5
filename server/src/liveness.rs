//! Background detection of participants that stopped talking to the server.
//!
//! Every interval the monitor takes a snapshot of the participant source,
//! asks the liveness probe about each entry and, once the whole pass is done,
//! hands every timed-out entry to the eviction callback. A probe that errors
//! or panics is logged and skipped; it never stops the pass or the loop.

use crate::error::LivenessError;
use crate::participant::{Identified, ParticipantId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where the monitor gets the participants to check from.
pub trait ParticipantSource {
    type Entry: Identified;

    /// Owned copy of the current participants. Implementations must not hand
    /// out anything that keeps their internal lock held.
    fn snapshot(&self) -> Vec<Self::Entry>;
}

impl<T: ParticipantSource + ?Sized> ParticipantSource for Arc<T> {
    type Entry = T::Entry;

    fn snapshot(&self) -> Vec<Self::Entry> {
        (**self).snapshot()
    }
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    interval: Duration,
    local_id: Option<ParticipantId>,
}

impl LivenessMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            local_id: None,
        }
    }

    /// The server's own identity, never checked.
    pub fn with_local_id(mut self, id: ParticipantId) -> Self {
        self.local_id = Some(id);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One monitoring pass. Returns how many participants timed out.
    pub fn sweep<S, P, E>(&self, source: &S, is_timed_out: &mut P, on_timeout: &mut E) -> usize
    where
        S: ParticipantSource,
        P: FnMut(&S::Entry) -> Result<bool, LivenessError>,
        E: FnMut(S::Entry),
    {
        let mut timed_out = Vec::new();

        for entry in source.snapshot() {
            let id = entry.participant_id();
            if self.local_id == Some(id) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| is_timed_out(&entry))) {
                Ok(Ok(true)) => timed_out.push(entry),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Liveness check for participant {} failed: {}", id, e);
                }
                Err(_) => {
                    tracing::error!("Liveness check for participant {} panicked", id);
                }
            }
        }

        let count = timed_out.len();
        for entry in timed_out {
            let id = entry.participant_id();
            tracing::info!("Participant {} timed out", id);
            if catch_unwind(AssertUnwindSafe(|| on_timeout(entry))).is_err() {
                tracing::error!("Timeout handler panicked for participant {}", id);
            }
        }
        count
    }

    /// Run passes every interval until `cancel` fires. Cancellation takes
    /// effect immediately, including in the middle of a wait.
    pub async fn monitor_liveness<S, P, E>(
        self,
        source: S,
        mut is_timed_out: P,
        mut on_timeout: E,
        cancel: CancellationToken,
    ) where
        S: ParticipantSource,
        P: FnMut(&S::Entry) -> Result<bool, LivenessError>,
        E: FnMut(S::Entry),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    self.sweep(&source, &mut is_timed_out, &mut on_timeout);
                }
            }
        }

        tracing::info!("Liveness monitor stopped");
    }
}
