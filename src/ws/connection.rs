//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, parse_ids};
use crate::api::dto::StatusResponse;
use crate::domain::{ListingEvent, ListingId};
use crate::service::ListingService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<ListingEvent>,
    listing_service: Arc<ListingService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &listing_service).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !subs.matches(event.listing_id()) {
                            continue;
                        }
                        let Ok(payload) = serde_json::to_value(&event) else {
                            continue;
                        };
                        if let Some(json) = encode(&WsMessage::event(payload))
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    listing_service: &ListingService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command");
    }
    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(e) => return WsMessage::error(msg.id, 404, &format!("unknown command: {e}")),
    };

    match command {
        WsCommand::Subscribe { listing_ids } => {
            let (ids, wildcard, rejected) = parse_ids(&listing_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::response(
                msg.id,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "rejected": rejected,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { listing_ids } => {
            let (ids, wildcard, rejected) = parse_ids(&listing_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::response(
                msg.id,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "rejected": rejected,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetStatus { listing_id } => {
            let Ok(uuid) = listing_id.trim().parse::<uuid::Uuid>() else {
                return WsMessage::error(msg.id, 400, "listing_id is not a UUID");
            };
            match listing_service
                .status(None, ListingId::from_uuid(uuid))
                .await
            {
                Ok((listing, display)) => {
                    let status = StatusResponse::new(&listing, &display);
                    match serde_json::to_value(&status) {
                        Ok(payload) => WsMessage::response(msg.id, payload),
                        Err(_) => WsMessage::error(msg.id, 500, "status not serializable"),
                    }
                }
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    }
}
