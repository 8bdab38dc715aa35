//! One realtime WebSocket session.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use roomctl_state::{DeviceService, RealtimeMessage};
use warp::ws::{Message, WebSocket};

use crate::broadcaster::Broadcaster;

/// Drive a connected socket until either side goes away.
///
/// The subscriber is registered before the snapshot is taken so no update
/// can fall between the two. Inbound frames are read only to notice the
/// close.
pub async fn session(socket: WebSocket, service: Arc<DeviceService>, broadcaster: Arc<Broadcaster>) {
    let (id, mut outgoing) = broadcaster.subscribe();
    let (mut sink, mut incoming) = socket.split();

    let initial = match service.snapshot().await {
        Ok(devices) => RealtimeMessage::InitialState { devices },
        Err(e) => {
            tracing::warn!(subscriber = %id, error = %e, "could not build initial state");
            broadcaster.unsubscribe(&id);
            return;
        }
    };

    let sent = match initial.to_json() {
        Ok(text) => sink.send(Message::text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize initial state");
            false
        }
    };

    if sent {
        tracing::info!(subscriber = %id, "realtime subscriber connected");
        loop {
            tokio::select! {
                next = outgoing.recv() => match next {
                    Some(text) => {
                        if sink.send(Message::text(&*text)).await.is_err() {
                            break;
                        }
                    }
                    // dropped by the broadcaster
                    None => break,
                },
                frame = incoming.next() => match frame {
                    Some(Ok(msg)) if msg.is_close() => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(subscriber = %id, error = %e, "socket error");
                        break;
                    }
                    None => break,
                },
            }
        }
    }

    broadcaster.unsubscribe(&id);
    let _ = sink.close().await;
    tracing::info!(subscriber = %id, "realtime subscriber disconnected");
}
