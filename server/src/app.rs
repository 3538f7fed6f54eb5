//! Wiring shared by the binary and the integration tests.

use crate::activity::{ActivityRecord, ActivityTracker};
use crate::config::ServerConfig;
use crate::error::LivenessError;
use crate::liveness::LivenessMonitor;
use crate::relay_loop::{run_relay_loop, RelayCommand};
use crate::state::RelayState;
use crate::ws::{ws_handler, AppState};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

/// Spawn the relay loop and the liveness monitor. Both stop when `cancel` fires.
pub fn start_services(config: &ServerConfig, cancel: CancellationToken) -> AppState {
    let activity = Arc::new(ActivityTracker::new());
    let (relay_tx, relay_rx) = mpsc::channel::<RelayCommand>(1024);

    let state = RelayState::new(config, activity.clone());
    tokio::spawn(run_relay_loop(
        relay_rx,
        state,
        config.tick_rate_hz,
        cancel.child_token(),
    ));

    let timeout = config.client_timeout;
    let probe_activity = activity.clone();
    let timeout_tx = relay_tx.clone();
    let monitor = LivenessMonitor::new(config.liveness_interval);
    tokio::spawn(monitor.monitor_liveness(
        activity.clone(),
        move |record: &ActivityRecord| -> Result<bool, LivenessError> {
            // Re-read so activity after the snapshot still counts
            let last_activity = probe_activity
                .last_activity(record.id)
                .ok_or(LivenessError::NoActivity(record.id))?;
            let current = ActivityRecord {
                id: record.id,
                last_activity,
            };
            Ok(current.is_timed_out(Instant::now(), timeout))
        },
        move |record: ActivityRecord| {
            if let Err(e) = timeout_tx.try_send(RelayCommand::TimedOut { id: record.id }) {
                tracing::warn!("Could not queue timeout for participant {}: {}", record.id, e);
            }
        },
        cancel.child_token(),
    ));

    AppState {
        relay_tx,
        activity,
        connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        max_message_bytes: config.max_message_bytes,
        max_parse_errors: config.max_parse_errors,
        outbound_capacity: config.outbound_capacity,
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
