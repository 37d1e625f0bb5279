use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use confetti_db::Database;
use confetti_types::api::Principal;
use confetti_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a WebSocket whose token was already validated at the HTTP upgrade.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    principal: Principal,
    name: String,
) {
    let (mut sender, receiver) = socket.split();
    let principal_id = principal.id();

    info!("{} ({}) connected to gateway", name, principal_id);

    let ready = GatewayEvent::Ready {
        principal,
        name: name.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let (conn_id, user_rx) = dispatcher.register(principal_id).await;
    run_connection_loop(sender, receiver, &dispatcher, db, principal, user_rx).await;
    dispatcher.unregister(principal_id, conn_id).await;

    info!("{} ({}) disconnected from gateway", name, principal_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &Dispatcher,
    db: Arc<Database>,
    principal: Principal,
    mut user_rx: mpsc::UnboundedReceiver<GatewayEvent>,
) {
    let mut broadcast_rx = dispatcher.subscribe();

    // The one event whose feed this connection follows.
    let subscription: Arc<RwLock<Option<Uuid>>> = Arc::new(RwLock::new(None));
    let send_subscription = subscription.clone();

    // Replies to this connection's own commands.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let wanted = send_subscription
                        .read()
                        .map(|sub| *sub == Some(msg.event_id))
                        .unwrap_or(false);
                    if !wanted {
                        continue;
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Some(event) = user_rx.recv() => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Some(event) = reply_rx.recv() => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        let reply = handle_command(&db, principal, cmd, &subscription).await;
                        if let Some(reply) = reply {
                            if reply_tx.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            principal.id(),
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn handle_command(
    db: &Arc<Database>,
    principal: Principal,
    cmd: GatewayCommand,
    subscription: &Arc<RwLock<Option<Uuid>>>,
) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Subscribe { event_id } => {
            let lookup = db.clone();
            let access = tokio::task::spawn_blocking(move || lookup.access(&principal, event_id)).await;

            let denied = |reason: &str| GatewayEvent::SubscribeDenied {
                event_id,
                reason: reason.to_string(),
            };
            let access = match access {
                Ok(Ok(access)) => access,
                Ok(Err(e)) => {
                    warn!("Access lookup for {} failed: {}", principal.id(), e);
                    return Some(denied("internal error"));
                }
                Err(e) => {
                    warn!("spawn_blocking join error: {}", e);
                    return Some(denied("internal error"));
                }
            };

            if !access.can_read_event() {
                return Some(denied("not a member of this event"));
            }
            if !access.can_view_feed() {
                return Some(denied("feed is locked until your first upload"));
            }

            if let Ok(mut sub) = subscription.write() {
                *sub = Some(event_id);
            }
            debug!("{} subscribed to event {}", principal.id(), event_id);
            Some(GatewayEvent::Subscribed { event_id })
        }

        GatewayCommand::Unsubscribe => {
            if let Ok(mut sub) = subscription.write() {
                *sub = None;
            }
            None
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| {
        warn!("Failed to serialize gateway event: {}", e);
    })?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
