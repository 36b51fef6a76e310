// src/server/live.rs

//! `/process_output`: one websocket per live subscriber.
//!
//! The registry writes into a bounded queue ([`ChannelSink`]); this task
//! drains the queue onto the socket. The registry dropping the sink (run
//! finished, write failed, slow consumer) ends the queue, which ends the
//! connection. A peer going away unregisters the subscriber right away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;
use crate::broadcast::{ChannelSink, Frame, OutputRegistry, Subscription};

pub async fn process_output(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_output(socket, state))
}

async fn stream_output(socket: WebSocket, state: AppState) {
    let (tx, rx) = mpsc::channel(state.subscriber_queue);
    let subscription = state
        .supervisor
        .subscribe(Box::new(ChannelSink::new(tx)));
    info!(subscriber = %subscription.id(), "live output subscriber connected");

    let (sender, receiver) = socket.split();
    forward(
        subscription,
        rx,
        Arc::clone(state.supervisor.registry()),
        sender,
        receiver,
    )
    .await;
}

/// Pump frames from `frames` to `sender` until the registry ends the
/// stream or the peer disconnects, then unregister and wait for release.
pub async fn forward<S, R, E>(
    subscription: Subscription,
    mut frames: mpsc::Receiver<Frame>,
    registry: Arc<OutputRegistry>,
    mut sender: S,
    mut receiver: R,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let id = subscription.id().clone();

    loop {
        tokio::select! {
            biased;

            frame = frames.recv() => match frame {
                Some(frame) => {
                    let text = match frame.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(subscriber = %id, error = %e, "failed to encode frame");
                            continue;
                        }
                    };
                    if let Err(e) = sender.send(Message::Text(text.into())).await {
                        debug!(subscriber = %id, error = %e, "live output write failed");
                        break;
                    }
                }
                None => {
                    debug!(subscriber = %id, "output stream ended");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },

            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => {
                    debug!(subscriber = %id, "peer closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    debug!(subscriber = %id, error = %e, "peer connection error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    registry.unsubscribe(&id);
    let _ = sender.close().await;
    let id = subscription.closed().await;
    info!(subscriber = %id, "live output subscriber disconnected");
}
