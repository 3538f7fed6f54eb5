//! Call-count throttling for recipients that fall outside a proximity rule.
//!
//! Each (sender, recipient) pair owns a counter. The first throttled check for
//! a pair is let through, then `frequency` checks are suppressed, then one is
//! let through again, so a far-away recipient still hears from the sender once
//! every `frequency + 1` frames.

use crate::participant::ParticipantId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
}

#[derive(Debug, Default)]
pub struct ThrottleLedger {
    counters: Mutex<HashMap<ThrottleKey, u32>>,
}

impl ThrottleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an out-of-range recipient gets this frame.
    pub fn should_throttled_update(
        &self,
        sender: ParticipantId,
        recipient: ParticipantId,
        frequency: u32,
    ) -> bool {
        let key = ThrottleKey { sender, recipient };
        match self.lock().entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(0);
                true
            }
            Entry::Occupied(mut slot) => {
                let counter = slot.get_mut();
                if *counter < frequency {
                    *counter += 1;
                    false
                } else {
                    *counter = 0;
                    true
                }
            }
        }
    }

    /// Drop every counter involving `participant`, as sender or as recipient.
    /// Returns how many entries were removed.
    pub fn evict(&self, participant: ParticipantId) -> usize {
        let mut counters = self.lock();
        let before = counters.len();
        counters.retain(|key, _| key.sender != participant && key.recipient != participant);
        before - counters.len()
    }

    pub fn counter(&self, sender: ParticipantId, recipient: ParticipantId) -> Option<u32> {
        self.lock()
            .get(&ThrottleKey { sender, recipient })
            .copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a counter half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<ThrottleKey, u32>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
