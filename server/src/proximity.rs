//! Spatial visibility rules for proximity receiver modes.

use crate::participant::Participant;
use crate::policy::Frame;
use crate::throttle::ThrottleLedger;
use proxcast_shared::receivers::ProximityKind;
use proxcast_shared::spatial::within_radius;

/// Proximity part of the receiver decision. Non-proximity modes always pass.
pub fn distance_receiver(
    ledger: &ThrottleLedger,
    sender: &Participant,
    recipient: &Participant,
    frame: &Frame<'_>,
    proximity_distance: f64,
    update_frequency: u32,
) -> bool {
    match frame.mode.proximity() {
        Some(ProximityKind::Radius) => radius_check(
            ledger,
            sender,
            recipient,
            proximity_distance,
            update_frequency,
        ),
        Some(ProximityKind::Grid) => grid_check(ledger, sender, recipient, update_frequency),
        None => true,
    }
}

/// In range if no further than `proximity_distance` from the sender.
pub fn radius_check(
    ledger: &ThrottleLedger,
    sender: &Participant,
    recipient: &Participant,
    proximity_distance: f64,
    update_frequency: u32,
) -> bool {
    if within_radius(sender.position, recipient.position, proximity_distance) {
        return true;
    }
    out_of_range(ledger, sender, recipient, update_frequency)
}

/// In range if in the sender's cell or one touching it.
pub fn grid_check(
    ledger: &ThrottleLedger,
    sender: &Participant,
    recipient: &Participant,
    update_frequency: u32,
) -> bool {
    if sender.grid_cell.is_same_or_neighbour(recipient.grid_cell) {
        return true;
    }
    out_of_range(ledger, sender, recipient, update_frequency)
}

fn out_of_range(
    ledger: &ThrottleLedger,
    sender: &Participant,
    recipient: &Participant,
    update_frequency: u32,
) -> bool {
    // 0 means far recipients are never updated
    update_frequency != 0
        && ledger.should_throttled_update(sender.id, recipient.id, update_frequency)
}
