use proxcast_shared::spatial::{GridCoordinate, Vector};
use std::fmt;
use std::net::SocketAddr;

/// Stable network id assigned by the registry. Never reused while the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that can name the participant it belongs to.
pub trait Identified {
    fn participant_id(&self) -> ParticipantId;
}

/// A connected participant as seen by the relay
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub addr: SocketAddr,
    /// Completed the handshake
    pub accepted: bool,
    /// Handshake started but not completed yet
    pub pending_accepted: bool,
    pub position: Vector,
    pub grid_cell: GridCoordinate,
    pub is_disconnecting: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            accepted: false,
            pending_accepted: false,
            position: Vector::ZERO,
            grid_cell: GridCoordinate::default(),
            is_disconnecting: false,
        }
    }

    /// Accepted or pending acceptance
    pub fn can_receive(&self) -> bool {
        self.accepted || self.pending_accepted
    }

    /// Move the participant and recompute its grid cell.
    pub fn move_to(&mut self, position: Vector, grid_cell_size: f64) {
        self.position = position;
        self.grid_cell = GridCoordinate::from_position(position, grid_cell_size);
    }
}

impl Identified for Participant {
    fn participant_id(&self) -> ParticipantId {
        self.id
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Participant {}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn new_participant_cannot_receive() {
        let p = Participant::new(ParticipantId(1), addr(1000));
        assert!(!p.can_receive());
        assert!(!p.is_disconnecting);
    }

    #[test]
    fn pending_participant_can_receive() {
        let mut p = Participant::new(ParticipantId(1), addr(1000));
        p.pending_accepted = true;
        assert!(p.can_receive());
    }

    #[test]
    fn move_to_updates_grid_cell() {
        let mut p = Participant::new(ParticipantId(1), addr(1000));
        p.move_to(Vector::planar(25.0, -5.0), 10.0);
        assert_eq!(p.grid_cell, GridCoordinate::new(2, -1, 0));
    }

    #[test]
    fn equality_is_by_id() {
        let a = accepted_at(1, 0.0, 0.0);
        let mut b = accepted_at(1, 50.0, 50.0);
        b.addr = addr(9999);
        assert_eq!(a, b);
        assert_ne!(a, accepted_at(2, 0.0, 0.0));
    }

    #[test]
    fn display_has_hash_prefix() {
        assert_eq!(ParticipantId(42).to_string(), "#42");
    }
}
