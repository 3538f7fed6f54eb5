//! Per-recipient delivery decision for outbound frames.
//!
//! The dispatch loop asks [`ReceiverPolicy::should_receive`] once for every
//! (frame, candidate) pair and only transmits when it answers true. The only
//! state the policy mutates is its throttle ledger.

use crate::participant::{Participant, ParticipantId};
use crate::proximity;
use crate::throttle::ThrottleLedger;
use proxcast_shared::receivers::ReceiverMode;

/// An outbound frame as far as receiver selection is concerned.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// None for frames the server originates itself
    pub sender: Option<&'a Participant>,
    pub mode: ReceiverMode,
}

impl<'a> Frame<'a> {
    pub fn from_server(mode: ReceiverMode) -> Self {
        Self { sender: None, mode }
    }

    pub fn from_participant(sender: &'a Participant, mode: ReceiverMode) -> Self {
        Self {
            sender: Some(sender),
            mode,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReceiverPolicy {
    ledger: ThrottleLedger,
}

impl ReceiverPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &ThrottleLedger {
        &self.ledger
    }

    pub fn should_receive(
        &self,
        recipient: &Participant,
        frame: &Frame<'_>,
        proximity_distance: f64,
        skip_recipient: Option<ParticipantId>,
        update_frequency: u32,
    ) -> bool {
        if !recipient.can_receive() || skip_recipient == Some(recipient.id) {
            return false;
        }

        match frame.sender {
            Some(sender) => {
                if sender.id == recipient.id && frame.mode.excludes_sender() {
                    return false;
                }
                self.distance_receiver(
                    sender,
                    recipient,
                    frame,
                    proximity_distance,
                    update_frequency,
                )
            }
            None => true,
        }
    }

    pub fn distance_receiver(
        &self,
        sender: &Participant,
        recipient: &Participant,
        frame: &Frame<'_>,
        proximity_distance: f64,
        update_frequency: u32,
    ) -> bool {
        proximity::distance_receiver(
            &self.ledger,
            sender,
            recipient,
            frame,
            proximity_distance,
            update_frequency,
        )
    }

    /// Eviction hook for the disconnect path: drops every throttle counter
    /// the departing participant takes part in.
    pub fn forget(&self, participant: ParticipantId) -> usize {
        self.ledger.evict(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::test_support::{accepted_at, addr};

    const ALL_MODES: [ReceiverMode; 10] = [
        ReceiverMode::All,
        ReceiverMode::Others,
        ReceiverMode::AllBuffered,
        ReceiverMode::OthersBuffered,
        ReceiverMode::AllProximity,
        ReceiverMode::OthersProximity,
        ReceiverMode::AllProximityGrid,
        ReceiverMode::OthersProximityGrid,
        ReceiverMode::Target,
        ReceiverMode::Host,
    ];

    #[test]
    fn unaccepted_recipient_never_receives() {
        let policy = ReceiverPolicy::new();
        let sender = accepted_at(1, 0.0, 0.0);
        let stranger = Participant::new(ParticipantId(2), addr(2000));

        for mode in ALL_MODES {
            assert!(!policy.should_receive(
                &stranger,
                &Frame::from_participant(&sender, mode),
                100.0,
                None,
                3
            ));
            assert!(!policy.should_receive(&stranger, &Frame::from_server(mode), 100.0, None, 3));
        }
        assert!(policy.ledger().is_empty());
    }

    #[test]
    fn pending_recipient_receives_server_frames() {
        let policy = ReceiverPolicy::new();
        let mut pending = Participant::new(ParticipantId(2), addr(2000));
        pending.pending_accepted = true;
        assert!(policy.should_receive(
            &pending,
            &Frame::from_server(ReceiverMode::All),
            1.0,
            None,
            0
        ));
    }

    #[test]
    fn skipped_recipient_never_receives() {
        let policy = ReceiverPolicy::new();
        let recipient = accepted_at(2, 0.0, 0.0);
        assert!(!policy.should_receive(
            &recipient,
            &Frame::from_server(ReceiverMode::All),
            1.0,
            Some(ParticipantId(2)),
            0
        ));
        assert!(policy.should_receive(
            &recipient,
            &Frame::from_server(ReceiverMode::All),
            1.0,
            Some(ParticipantId(3)),
            0
        ));
    }

    #[test]
    fn sender_excluded_only_for_others_modes() {
        let policy = ReceiverPolicy::new();
        let sender = accepted_at(1, 0.0, 0.0);

        for mode in ALL_MODES {
            let received = policy.should_receive(
                &sender,
                &Frame::from_participant(&sender, mode),
                10.0,
                None,
                0,
            );
            assert_eq!(received, !mode.excludes_sender(), "mode {:?}", mode);
        }
    }

    #[test]
    fn proximity_scenario_in_range() {
        let policy = ReceiverPolicy::new();
        let sender = accepted_at(1, 0.0, 0.0);
        let recipient = accepted_at(2, 3.0, 4.0);
        let frame = Frame::from_participant(&sender, ReceiverMode::AllProximity);
        assert!(policy.should_receive(&recipient, &frame, 5.0, None, 0));
    }

    #[test]
    fn proximity_scenario_out_of_range_no_updates() {
        let policy = ReceiverPolicy::new();
        let sender = accepted_at(1, 0.0, 0.0);
        let recipient = accepted_at(2, 3.0, 4.0);
        let frame = Frame::from_participant(&sender, ReceiverMode::AllProximity);
        for _ in 0..20 {
            assert!(!policy.should_receive(&recipient, &frame, 4.0, None, 0));
        }
    }

    #[test]
    fn proximity_scenario_throttled_updates() {
        let policy = ReceiverPolicy::new();
        let sender = accepted_at(1, 0.0, 0.0);
        let recipient = accepted_at(2, 3.0, 4.0);
        let frame = Frame::from_participant(&sender, ReceiverMode::OthersProximity);
        let results: Vec<bool> = (0..7)
            .map(|_| policy.should_receive(&recipient, &frame, 4.0, None, 2))
            .collect();
        assert_eq!(results, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn server_frames_skip_proximity() {
        let policy = ReceiverPolicy::new();
        let far = accepted_at(2, 1.0e6, 1.0e6);
        assert!(policy.should_receive(
            &far,
            &Frame::from_server(ReceiverMode::AllProximity),
            1.0,
            None,
            0
        ));
    }

    #[test]
    fn forget_resets_throttling_for_departed_sender() {
        let policy = ReceiverPolicy::new();
        let sender = accepted_at(1, 0.0, 0.0);
        let recipient = accepted_at(2, 100.0, 0.0);
        let frame = Frame::from_participant(&sender, ReceiverMode::AllProximity);

        assert!(policy.should_receive(&recipient, &frame, 1.0, None, 5));
        assert!(!policy.should_receive(&recipient, &frame, 1.0, None, 5));
        assert_eq!(policy.forget(ParticipantId(1)), 1);
        assert!(policy.ledger().is_empty());
        assert!(policy.should_receive(&recipient, &frame, 1.0, None, 5));
    }
}
