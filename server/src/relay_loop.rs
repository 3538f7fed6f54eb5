use crate::participant::ParticipantId;
use crate::state::RelayState;
use proxcast_shared::protocol::{ClientMsg, ServerMsg};
use proxcast_shared::receivers::ReceiverMode;
use proxcast_shared::spatial::Vector;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Commands from socket tasks and the liveness monitor to the relay loop
pub enum RelayCommand {
    Join {
        addr: SocketAddr,
        outbound: mpsc::Sender<ServerMsg>,
        response: oneshot::Sender<ParticipantId>,
    },
    Hello {
        id: ParticipantId,
        protocol_version: u32,
    },
    Ready {
        id: ParticipantId,
    },
    Position {
        id: ParticipantId,
        position: Vector,
    },
    Send {
        id: ParticipantId,
        mode: ReceiverMode,
        payload: String,
        target: Option<ParticipantId>,
    },
    Leave {
        id: ParticipantId,
    },
    TimedOut {
        id: ParticipantId,
    },
}

impl RelayCommand {
    /// Command for a parsed client message. `ping` is answered by the socket
    /// task itself and has no command.
    pub fn from_client(id: ParticipantId, msg: ClientMsg) -> Option<Self> {
        match msg {
            ClientMsg::Hello { protocol_version } => Some(RelayCommand::Hello {
                id,
                protocol_version,
            }),
            ClientMsg::Ready => Some(RelayCommand::Ready { id }),
            ClientMsg::Position { x, y, z } => Some(RelayCommand::Position {
                id,
                position: Vector::new(x, y, z),
            }),
            ClientMsg::Send {
                mode,
                payload,
                target,
            } => Some(RelayCommand::Send {
                id,
                mode,
                payload,
                target: target.map(ParticipantId),
            }),
            ClientMsg::Ping => None,
        }
    }
}

impl RelayState {
    pub fn apply(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::Join {
                addr,
                outbound,
                response,
            } => {
                let id = self.join(addr, outbound);
                if response.send(id).is_err() {
                    // Socket task already gone
                    self.leave(id);
                }
            }
            RelayCommand::Hello {
                id,
                protocol_version,
            } => self.hello(id, protocol_version),
            RelayCommand::Ready { id } => self.ready(id),
            RelayCommand::Position { id, position } => self.move_participant(id, position),
            RelayCommand::Send {
                id,
                mode,
                payload,
                target,
            } => {
                self.relay(id, mode, payload, target);
            }
            RelayCommand::Leave { id } => self.leave(id),
            RelayCommand::TimedOut { id } => self.timed_out(id),
        }
    }
}

/// Run the relay loop. Owns all relay state until `cancel` fires.
pub async fn run_relay_loop(
    mut cmd_rx: mpsc::Receiver<RelayCommand>,
    mut state: RelayState,
    tick_rate_hz: u32,
    cancel: CancellationToken,
) {
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate_hz as f64);
    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            Some(cmd) = cmd_rx.recv() => state.apply(cmd),

            _ = tick_interval.tick() => {
                state.process_disconnects();
            }
        }
    }

    tracing::info!("Relay loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityTracker;
    use crate::config::ServerConfig;
    use proxcast_shared::protocol::PROTOCOL_VERSION;
    use std::sync::Arc;

    #[test]
    fn ping_has_no_command() {
        assert!(RelayCommand::from_client(ParticipantId(1), ClientMsg::Ping).is_none());
    }

    #[test]
    fn send_target_is_wrapped() {
        let cmd = RelayCommand::from_client(
            ParticipantId(1),
            ClientMsg::Send {
                mode: ReceiverMode::Target,
                payload: "x".to_string(),
                target: Some(7),
            },
        );
        assert!(matches!(
            cmd,
            Some(RelayCommand::Send {
                target: Some(ParticipantId(7)),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn loop_processes_leave_on_tick_and_stops_on_cancel() {
        let config = ServerConfig::default();
        let state = RelayState::new(&config, Arc::new(ActivityTracker::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_relay_loop(cmd_rx, state, 100, cancel.clone()));

        let (out_tx, mut out_rx) = mpsc::channel(16);
        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(RelayCommand::Join {
                addr: "127.0.0.1:5000".parse().unwrap(),
                outbound: out_tx,
                response: resp_tx,
            })
            .await
            .unwrap();
        let id = resp_rx.await.unwrap();

        cmd_tx
            .send(RelayCommand::Hello {
                id,
                protocol_version: PROTOCOL_VERSION,
            })
            .await
            .unwrap();
        assert!(matches!(out_rx.recv().await, Some(ServerMsg::Welcome(_))));

        cmd_tx.send(RelayCommand::TimedOut { id }).await.unwrap();
        assert!(matches!(out_rx.recv().await, Some(ServerMsg::Kicked(_))));
        // Participant removed: its queue is closed
        assert!(out_rx.recv().await.is_none());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay loop should stop promptly")
            .unwrap();
    }
}
