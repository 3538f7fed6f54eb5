use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::ProximityConfig;
use crate::receivers::ReceiverMode;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "accepted")]
    Accepted(AcceptedMsg),
    #[serde(rename = "frame")]
    Frame(FrameMsg),
    #[serde(rename = "participant_joined")]
    ParticipantJoined(ParticipantMsg),
    #[serde(rename = "participant_left")]
    ParticipantLeft(ParticipantMsg),
    #[serde(rename = "kicked")]
    Kicked(KickedMsg),
    #[serde(rename = "pong")]
    Pong,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub self_id: u32,
    pub config: ProximityConfig,
}

/// Sent once the handshake completes; lists every other accepted participant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct AcceptedMsg {
    pub participants: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct FrameMsg {
    /// None for frames originated by the server
    pub sender: Option<u32>,
    pub mode: ReceiverMode,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct ParticipantMsg {
    pub id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct KickedMsg {
    pub reason: String,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "hello")]
    Hello {
        #[serde(rename = "protocolVersion")]
        protocol_version: u32,
    },
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "position")]
    Position { x: f64, y: f64, z: f64 },
    #[serde(rename = "send")]
    Send {
        mode: ReceiverMode,
        payload: String,
        #[serde(default)]
        target: Option<u32>,
    },
    #[serde(rename = "ping")]
    Ping,
}
