//! Run event WebSocket handler
//!
//! Replays everything already published for the run, then forwards live
//! events until the terminal one, then closes.

use std::sync::Arc;

use agentable_core::{ExecutionDriver, RunEvent, RunId, Subscription};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Path,
    response::IntoResponse,
    Extension,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tracing::{debug, info, warn};

/// WebSocket upgrade handler
pub async fn run_events_handler(
    ws: WebSocketUpgrade,
    Path(run_id): Path<String>,
    Extension(driver): Extension<Arc<ExecutionDriver>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, driver, run_id))
}

fn subscribe(driver: &ExecutionDriver, raw_id: &str) -> Result<Subscription, String> {
    let run_id: RunId = raw_id
        .parse()
        .map_err(|_| format!("run not found: {}", raw_id))?;
    driver
        .broadcaster()
        .subscribe(&run_id)
        .map_err(|e| e.to_string())
}

/// JSON text frame for an event
pub(crate) fn encode(event: &RunEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, kind = event.kind(), "Failed to encode event");
            None
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &RunEvent) -> bool {
    match encode(event) {
        Some(json) => sender.send(Message::Text(json)).await.is_ok(),
        None => true,
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, driver: Arc<ExecutionDriver>, raw_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match subscribe(&driver, &raw_id) {
        Ok(subscription) => subscription,
        Err(message) => {
            debug!(run_id = %raw_id, "Rejecting subscription: {}", message);
            let _ = send_event(&mut sender, &RunEvent::Error { message }).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let run_id = subscription.run_id();
    info!(run_id = %run_id, "WebSocket subscriber connected");

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    // Run finished or was removed before anything else arrived.
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if !send_event(&mut sender, &event).await {
                    debug!(run_id = %run_id, "Subscriber went away");
                    break;
                }
                if event.is_terminal() {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(run_id = %run_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    // Client frames carry no meaning here.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(run_id = %run_id, "WebSocket subscriber disconnected");
}
