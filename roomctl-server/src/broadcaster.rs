//! Fan-out of realtime messages to WebSocket subscribers.

use std::sync::Arc;

use dashmap::DashMap;
use roomctl_state::{DeviceService, RealtimeMessage};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Default depth of each subscriber's outgoing queue.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Registry of connected subscribers.
///
/// Each subscriber owns a bounded queue. Delivery never waits: a subscriber
/// whose queue is full or closed is dropped and the rest still receive the
/// message.
pub struct Broadcaster {
    subscribers: DashMap<Uuid, mpsc::Sender<Arc<str>>>,
    buffer: usize,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber and hand back its queue.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.subscribers.insert(id, tx);
        tracing::debug!(subscriber = %id, total = self.subscribers.len(), "subscriber added");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: &Uuid) {
        if self.subscribers.remove(id).is_some() {
            tracing::debug!(subscriber = %id, "subscriber removed");
        }
    }

    /// Drop every subscriber; their sessions end once their queues drain.
    pub fn close_all(&self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Serialize `message` once and queue it for every subscriber.
    ///
    /// Returns how many subscribers accepted it.
    pub fn broadcast(&self, message: &RealtimeMessage) -> usize {
        let text: Arc<str> = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize realtime message");
                return 0;
            }
        };

        let mut delivered = 0;
        self.subscribers.retain(|id, tx| match tx.try_send(text.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, "subscriber too slow, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Forward every service event to the broadcaster until the task is aborted.
///
/// If the bridge falls behind the event channel, subscribers get a fresh
/// `INITIAL_STATE` instead of the missed updates.
pub fn spawn_event_bridge(
    service: Arc<DeviceService>,
    broadcaster: Arc<Broadcaster>,
) -> JoinHandle<()> {
    let mut events = service.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(message) = RealtimeMessage::from_event(&event) {
                        broadcaster.broadcast(&message);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event bridge lagged, resending snapshot");
                    match service.snapshot().await {
                        Ok(devices) => {
                            broadcaster.broadcast(&RealtimeMessage::InitialState { devices });
                        }
                        Err(e) => tracing::warn!(error = %e, "snapshot for resync failed"),
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
