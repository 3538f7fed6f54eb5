use crate::activity::ActivityTracker;
use crate::config::ServerConfig;
use crate::disconnect::DisconnectCoordinator;
use crate::participant::ParticipantId;
use crate::policy::{Frame, ReceiverPolicy};
use crate::registry::Registry;
use proxcast_shared::config::ProximityConfig;
use proxcast_shared::protocol::{
    AcceptedMsg, FrameMsg, KickedMsg, ParticipantMsg, ServerMsg, WelcomeMsg, PROTOCOL_VERSION,
};
use proxcast_shared::receivers::ReceiverMode;
use proxcast_shared::spatial::Vector;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A frame kept around for participants that complete the handshake later.
#[derive(Debug, Clone)]
struct BufferedFrame {
    sender: ParticipantId,
    mode: ReceiverMode,
    payload: String,
}

/// Central relay state owned by the relay loop task.
pub struct RelayState {
    pub registry: Registry,
    pub policy: ReceiverPolicy,
    pub disconnects: Arc<DisconnectCoordinator>,
    pub activity: Arc<ActivityTracker>,
    proximity: ProximityConfig,
    outbound: HashMap<ParticipantId, mpsc::Sender<ServerMsg>>,
    buffered: VecDeque<BufferedFrame>,
    buffer_capacity: usize,
    kick_reasons: HashMap<ParticipantId, String>,
}

impl RelayState {
    pub fn new(config: &ServerConfig, activity: Arc<ActivityTracker>) -> Self {
        Self {
            registry: Registry::new(config.proximity.grid_cell_size),
            policy: ReceiverPolicy::new(),
            disconnects: Arc::new(DisconnectCoordinator::new()),
            activity,
            proximity: config.proximity,
            outbound: HashMap::new(),
            buffered: VecDeque::new(),
            buffer_capacity: config.buffer_capacity,
            kick_reasons: HashMap::new(),
        }
    }

    /// Register a new connection and the queue its socket task reads from.
    pub fn join(&mut self, addr: SocketAddr, outbound: mpsc::Sender<ServerMsg>) -> ParticipantId {
        let id = self.registry.register(addr);
        self.outbound.insert(id, outbound);
        self.activity.touch(id);
        id
    }

    /// First handshake step: check the protocol version and go pending.
    pub fn hello(&mut self, id: ParticipantId, protocol_version: u32) {
        if protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                "Participant {} speaks protocol {}, expected {}",
                id,
                protocol_version,
                PROTOCOL_VERSION
            );
            self.kick(
                id,
                format!("unsupported protocol version {}", protocol_version),
            );
            return;
        }

        if !self.registry.begin_handshake(id) {
            tracing::debug!("Ignoring repeated hello from participant {}", id);
            return;
        }

        let welcome = WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            self_id: id.0,
            config: self.proximity,
        };
        send_to(&self.outbound, id, ServerMsg::Welcome(welcome));
    }

    /// Second handshake step: accept, replay buffered frames, announce.
    pub fn ready(&mut self, id: ParticipantId) {
        if !self.registry.accept(id) {
            tracing::debug!("Ignoring ready from participant {} (not pending)", id);
            return;
        }
        tracing::info!("Participant {} accepted", id);

        let participants = self
            .registry
            .accepted_ids(id)
            .into_iter()
            .map(|p| p.0)
            .collect();
        send_to(
            &self.outbound,
            id,
            ServerMsg::Accepted(AcceptedMsg { participants }),
        );

        self.replay_buffered(id);
        self.broadcast_from_server(ServerMsg::ParticipantJoined(ParticipantMsg { id: id.0 }), Some(id));
    }

    pub fn move_participant(&mut self, id: ParticipantId, position: Vector) {
        if !position.is_finite() {
            tracing::warn!("Participant {} sent a non-finite position", id);
            return;
        }
        self.registry.set_position(id, position);
    }

    /// Relay a frame from `sender`. Returns how many participants it was queued for.
    pub fn relay(
        &mut self,
        sender: ParticipantId,
        mode: ReceiverMode,
        payload: String,
        target: Option<ParticipantId>,
    ) -> usize {
        match self.registry.get(sender) {
            Some(p) if p.accepted => {}
            _ => {
                tracing::debug!("Dropping frame from unaccepted participant {}", sender);
                return 0;
            }
        }

        match mode {
            ReceiverMode::Host => {
                tracing::debug!(
                    "Host frame from participant {} ({} bytes)",
                    sender,
                    payload.len()
                );
                0
            }
            ReceiverMode::Target => match target {
                Some(target) => self.dispatch(sender, mode, payload, Some(target)),
                None => {
                    tracing::debug!("Target frame from participant {} without target", sender);
                    0
                }
            },
            _ => {
                if mode.is_buffered() {
                    self.buffer(sender, mode, &payload);
                }
                self.dispatch(sender, mode, payload, None)
            }
        }
    }

    /// Socket closed on the client side.
    pub fn leave(&mut self, id: ParticipantId) {
        if let Some(participant) = self.registry.get(id) {
            self.disconnects.request_disconnect(participant, false);
        }
    }

    pub fn timed_out(&mut self, id: ParticipantId) {
        self.kick(id, "timed out");
    }

    /// Queue a forced disconnect; the reason reaches the client before its socket closes.
    pub fn kick(&mut self, id: ParticipantId, reason: impl Into<String>) {
        if let Some(participant) = self.registry.get(id) {
            self.kick_reasons.entry(id).or_insert_with(|| reason.into());
            self.disconnects.request_disconnect(participant, true);
        }
    }

    /// Tear down everything queued in the coordinator. Returns the removed ids.
    pub fn process_disconnects(&mut self) -> Vec<ParticipantId> {
        let batch = self.disconnects.drain();
        if batch.is_empty() {
            return Vec::new();
        }

        let queued = batch
            .forced
            .iter()
            .map(|&id| (id, true))
            .chain(batch.graceful.iter().map(|&id| (id, false)));

        let mut removed = Vec::with_capacity(batch.len());
        let mut announce = Vec::new();
        for (id, forced) in queued {
            let Some(participant) = self.registry.get_mut(id) else {
                continue;
            };
            participant.is_disconnecting = true;
            if participant.accepted {
                announce.push(id);
            }

            if forced {
                let reason = self
                    .kick_reasons
                    .remove(&id)
                    .unwrap_or_else(|| "disconnected by server".to_string());
                send_to(&self.outbound, id, ServerMsg::Kicked(KickedMsg { reason }));
            }
            removed.push(id);
        }

        for &id in &removed {
            self.teardown(id);
        }
        for id in announce {
            self.broadcast_from_server(ServerMsg::ParticipantLeft(ParticipantMsg { id: id.0 }), None);
        }
        removed
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_connected(&self, id: ParticipantId) -> bool {
        self.outbound.contains_key(&id)
    }

    fn teardown(&mut self, id: ParticipantId) {
        // Dropping the sender ends the socket task's outbound stream
        self.outbound.remove(&id);
        self.registry.remove(id);
        self.kick_reasons.remove(&id);
        self.activity.remove(id);
        self.buffered.retain(|f| f.sender != id);
        let pruned = self.policy.forget(id);
        tracing::info!(
            "Participant {} removed ({} throttle entries pruned)",
            id,
            pruned
        );
    }

    fn buffer(&mut self, sender: ParticipantId, mode: ReceiverMode, payload: &str) {
        if self.buffer_capacity == 0 {
            return;
        }
        if self.buffered.len() == self.buffer_capacity {
            self.buffered.pop_front();
        }
        self.buffered.push_back(BufferedFrame {
            sender,
            mode,
            payload: payload.to_string(),
        });
    }

    fn dispatch(
        &self,
        sender: ParticipantId,
        mode: ReceiverMode,
        payload: String,
        only: Option<ParticipantId>,
    ) -> usize {
        let Some(sender_ref) = self.registry.get(sender) else {
            return 0;
        };
        let frame = Frame::from_participant(sender_ref, mode);
        let msg = ServerMsg::Frame(FrameMsg {
            sender: Some(sender.0),
            mode,
            payload,
        });

        let mut delivered = 0;
        for recipient in self.registry.iter() {
            if only.is_some_and(|target| target != recipient.id) {
                continue;
            }
            if self.policy.should_receive(
                recipient,
                &frame,
                self.proximity.proximity_distance,
                None,
                self.proximity.update_frequency,
            ) && send_to(&self.outbound, recipient.id, msg.clone())
            {
                delivered += 1;
            }
        }
        delivered
    }

    fn broadcast_from_server(&self, msg: ServerMsg, skip: Option<ParticipantId>) -> usize {
        let frame = Frame::from_server(ReceiverMode::All);
        let mut delivered = 0;
        for recipient in self.registry.iter() {
            if self.policy.should_receive(
                recipient,
                &frame,
                self.proximity.proximity_distance,
                skip,
                0,
            ) && send_to(&self.outbound, recipient.id, msg.clone())
            {
                delivered += 1;
            }
        }
        delivered
    }

    fn replay_buffered(&self, id: ParticipantId) {
        let Some(recipient) = self.registry.get(id) else {
            return;
        };
        for buffered in &self.buffered {
            let frame = Frame {
                sender: self.registry.get(buffered.sender),
                mode: buffered.mode,
            };
            if self.policy.should_receive(
                recipient,
                &frame,
                self.proximity.proximity_distance,
                None,
                self.proximity.update_frequency,
            ) {
                send_to(
                    &self.outbound,
                    id,
                    ServerMsg::Frame(FrameMsg {
                        sender: Some(buffered.sender.0),
                        mode: buffered.mode,
                        payload: buffered.payload.clone(),
                    }),
                );
            }
        }
    }
}

/// Queue without waiting. A full queue drops the message; the client is lagging.
fn send_to(
    outbound: &HashMap<ParticipantId, mpsc::Sender<ServerMsg>>,
    id: ParticipantId,
    msg: ServerMsg,
) -> bool {
    let Some(tx) = outbound.get(&id) else {
        return false;
    };
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Participant {} is lagging, dropping message", id);
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
