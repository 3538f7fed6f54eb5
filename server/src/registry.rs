use crate::participant::{Participant, ParticipantId};
use proxcast_shared::spatial::Vector;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Every participant the relay knows about, iterated in id order.
#[derive(Debug)]
pub struct Registry {
    participants: BTreeMap<ParticipantId, Participant>,
    next_id: u32,
    grid_cell_size: f64,
}

impl Registry {
    pub fn new(grid_cell_size: f64) -> Self {
        Self {
            participants: BTreeMap::new(),
            next_id: 1,
            grid_cell_size,
        }
    }

    /// Register a freshly connected socket. It starts neither accepted nor pending.
    pub fn register(&mut self, addr: SocketAddr) -> ParticipantId {
        let id = ParticipantId(self.next_id);
        self.next_id += 1;
        self.participants.insert(id, Participant::new(id, addr));
        id
    }

    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        self.participants.remove(&id)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Move to pending acceptance. Returns false if unknown or already past it.
    pub fn begin_handshake(&mut self, id: ParticipantId) -> bool {
        match self.participants.get_mut(&id) {
            Some(p) if !p.accepted && !p.pending_accepted && !p.is_disconnecting => {
                p.pending_accepted = true;
                true
            }
            _ => false,
        }
    }

    /// Complete the handshake. Returns false unless the participant was pending.
    pub fn accept(&mut self, id: ParticipantId) -> bool {
        match self.participants.get_mut(&id) {
            Some(p) if p.pending_accepted && !p.is_disconnecting => {
                p.pending_accepted = false;
                p.accepted = true;
                true
            }
            _ => false,
        }
    }

    pub fn set_position(&mut self, id: ParticipantId, position: Vector) -> bool {
        let cell_size = self.grid_cell_size;
        match self.participants.get_mut(&id) {
            Some(p) => {
                p.move_to(position, cell_size);
                true
            }
            None => false,
        }
    }

    /// Accepted participants other than `except`
    pub fn accepted_ids(&self, except: ParticipantId) -> Vec<ParticipantId> {
        self.participants
            .values()
            .filter(|p| p.accepted && p.id != except)
            .map(|p| p.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::test_support::addr;
    use proxcast_shared::spatial::GridCoordinate;

    #[test]
    fn ids_are_unique_and_not_reused() {
        let mut registry = Registry::new(10.0);
        let a = registry.register(addr(1));
        let b = registry.register(addr(2));
        registry.remove(a);
        let c = registry.register(addr(3));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn handshake_goes_pending_then_accepted() {
        let mut registry = Registry::new(10.0);
        let id = registry.register(addr(1));

        assert!(!registry.accept(id), "cannot accept before hello");
        assert!(registry.begin_handshake(id));
        assert!(!registry.begin_handshake(id), "hello is only valid once");

        let p = registry.get(id).unwrap();
        assert!(p.pending_accepted && !p.accepted);

        assert!(registry.accept(id));
        let p = registry.get(id).unwrap();
        assert!(p.accepted && !p.pending_accepted);
        assert!(!registry.accept(id));
    }

    #[test]
    fn disconnecting_participant_cannot_complete_handshake() {
        let mut registry = Registry::new(10.0);
        let id = registry.register(addr(1));
        registry.begin_handshake(id);
        registry.get_mut(id).unwrap().is_disconnecting = true;
        assert!(!registry.accept(id));
    }

    #[test]
    fn set_position_uses_registry_cell_size() {
        let mut registry = Registry::new(4.0);
        let id = registry.register(addr(1));
        assert!(registry.set_position(id, Vector::planar(9.0, -1.0)));
        assert_eq!(registry.get(id).unwrap().grid_cell, GridCoordinate::new(2, -1, 0));
        assert!(!registry.set_position(ParticipantId(99), Vector::ZERO));
    }

    #[test]
    fn accepted_ids_excludes_self_and_unaccepted() {
        let mut registry = Registry::new(10.0);
        let a = registry.register(addr(1));
        let b = registry.register(addr(2));
        let c = registry.register(addr(3));
        for id in [a, b] {
            registry.begin_handshake(id);
            registry.accept(id);
        }
        registry.begin_handshake(c);

        assert_eq!(registry.accepted_ids(a), vec![b]);
    }
}
