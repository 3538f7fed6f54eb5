use crate::participant::ParticipantId;

/// A liveness probe that could not reach a verdict for one participant.
#[derive(Debug, thiserror::Error)]
pub enum LivenessError {
    #[error("no activity recorded for participant {0}")]
    NoActivity(ParticipantId),
    #[error("liveness probe failed for participant {id}: {reason}")]
    Probe { id: ParticipantId, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay loop is no longer running")]
    LoopClosed,
    #[error("failed to encode server message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("websocket send failed: {0}")]
    Socket(#[from] axum::Error),
}
