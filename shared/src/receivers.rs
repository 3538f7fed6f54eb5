use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Which class of participants a frame is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ReceiverMode {
    All,
    Others,
    AllBuffered,
    OthersBuffered,
    AllProximity,
    OthersProximity,
    AllProximityGrid,
    OthersProximityGrid,
    /// A single named participant
    Target,
    /// The server itself; no participant receives it
    Host,
}

/// Spatial rule a proximity mode applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityKind {
    Radius,
    Grid,
}

impl ReceiverMode {
    /// Modes whose sender must never get its own frame back.
    pub fn excludes_sender(self) -> bool {
        matches!(
            self,
            ReceiverMode::Others
                | ReceiverMode::OthersBuffered
                | ReceiverMode::OthersProximity
                | ReceiverMode::OthersProximityGrid
        )
    }

    pub fn is_buffered(self) -> bool {
        matches!(self, ReceiverMode::AllBuffered | ReceiverMode::OthersBuffered)
    }

    pub fn proximity(self) -> Option<ProximityKind> {
        match self {
            ReceiverMode::AllProximity | ReceiverMode::OthersProximity => {
                Some(ProximityKind::Radius)
            }
            ReceiverMode::AllProximityGrid | ReceiverMode::OthersProximityGrid => {
                Some(ProximityKind::Grid)
            }
            _ => None,
        }
    }
}
