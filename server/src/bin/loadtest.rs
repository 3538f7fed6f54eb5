//! Load test for the proxcast server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Complete the hello/ready handshake
//! - Wander around a square world and report their position
//! - Send `others_proximity` frames at a fixed rate
//! - Count the frames relayed back to them
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 100)
//!   --duration S     Test duration in seconds (default: 30)
//!   --send-rate R    Frames per second per client (default: 5)
//!   --world W        Side length of the world (default: 500)
//!   --url URL        Server URL (default: ws://127.0.0.1:9002/ws)

use futures_util::{SinkExt, StreamExt};
use proxcast_shared::protocol::{ClientMsg, ServerMsg, PROTOCOL_VERSION};
use proxcast_shared::receivers::ReceiverMode;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    accepted: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    kicked: AtomicU64,
    errors: AtomicU64,
}

// === Client task ===

async fn send(ws: &mut Ws, msg: &ClientMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => false,
    }
}

/// Read until a message matching `pred` arrives, or give up after `timeout`.
async fn wait_for(ws: &mut Ws, timeout: Duration, pred: impl Fn(&ServerMsg) -> bool) -> bool {
    let result = tokio::time::timeout(timeout, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                        if pred(&server_msg) {
                            return true;
                        }
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return false,
                _ => {}
            }
        }
        false
    })
    .await;
    matches!(result, Ok(true))
}

async fn handshake(ws: &mut Ws) -> bool {
    if !send(
        ws,
        &ClientMsg::Hello {
            protocol_version: PROTOCOL_VERSION,
        },
    )
    .await
    {
        return false;
    }
    if !wait_for(ws, Duration::from_secs(5), |m| {
        matches!(m, ServerMsg::Welcome(_))
    })
    .await
    {
        return false;
    }
    if !send(ws, &ClientMsg::Ready).await {
        return false;
    }
    wait_for(ws, Duration::from_secs(5), |m| {
        matches!(m, ServerMsg::Accepted(_))
    })
    .await
}

async fn run_client(
    client_id: u32,
    url: String,
    send_rate: f64,
    world: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    if !handshake(&mut ws).await {
        if client_id < 5 {
            eprintln!("Client {} failed the handshake", client_id);
        }
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }
    metrics.accepted.fetch_add(1, Ordering::Relaxed);

    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64);
    let mut x = rng.gen_range(0.0..world);
    let mut y = rng.gen_range(0.0..world);

    let send_interval = if send_rate > 0.0 {
        Duration::from_secs_f64(1.0 / send_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut send_timer = tokio::time::interval(send_interval);
    send_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut ping_timer = tokio::time::interval(Duration::from_secs(2));

    let test_end = Instant::now() + duration;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = send_timer.tick() => {
                x = (x + rng.gen_range(-5.0..5.0)).clamp(0.0, world);
                y = (y + rng.gen_range(-5.0..5.0)).clamp(0.0, world);

                let position = ClientMsg::Position { x, y, z: 0.0 };
                let frame = ClientMsg::Send {
                    mode: ReceiverMode::OthersProximity,
                    payload: format!("{}:{:.1},{:.1}", client_id, x, y),
                    target: None,
                };
                if send(&mut ws, &position).await && send(&mut ws, &frame).await {
                    metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            _ = ping_timer.tick() => {
                if !send(&mut ws, &ClientMsg::Ping).await {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMsg>(&text) {
                            Ok(ServerMsg::Frame(_)) => {
                                metrics.frames_received.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::Kicked(k)) => {
                                if client_id < 5 {
                                    eprintln!("Client {} kicked: {}", client_id, k.reason);
                                }
                                metrics.kicked.fetch_add(1, Ordering::Relaxed);
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 5 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 100;
    let mut duration_secs: u64 = 30;
    let mut send_rate: f64 = 5.0;
    let mut world: f64 = 500.0;
    let mut url = "ws://127.0.0.1:9002/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(100);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--send-rate" => {
                i += 1;
                send_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(5.0);
            }
            "--world" => {
                i += 1;
                world = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .filter(|w: &f64| *w > 0.0)
                    .unwrap_or(500.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Proxcast Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Send rate: {}/s per client", send_rate);
    println!("World: {}x{}", world, world);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, send_rate, world, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            println!(
                "[{:3}s] connected={}, accepted={}, sent={}, received={}, kicked={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.accepted.load(Ordering::Relaxed),
                metrics_clone.frames_sent.load(Ordering::Relaxed),
                metrics_clone.frames_received.load(Ordering::Relaxed),
                metrics_clone.kicked.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    let sent = metrics.frames_sent.load(Ordering::Relaxed);
    let received = metrics.frames_received.load(Ordering::Relaxed);

    println!();
    println!("=== Final Results ===");
    println!("Accepted clients: {}", metrics.accepted.load(Ordering::Relaxed));
    println!("Frames sent: {}", sent);
    println!("Frames received: {}", received);
    println!("Kicked: {}", metrics.kicked.load(Ordering::Relaxed));
    println!("Errors: {}", metrics.errors.load(Ordering::Relaxed));
    if sent > 0 {
        // Average fan-out after proximity filtering and throttling
        println!("Recipients per frame: {:.2}", received as f64 / sent as f64);
    }
}
