//! Reconnecting realtime subscriber
//!
//! The server sends a full `INITIAL_STATE` on every connect, so nothing is
//! tracked across disconnects: the loop reconnects after a fixed delay and
//! the first message replaces whatever the cache held.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use roomctl_state::RealtimeMessage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::cache::ClientCache;
use crate::error::{ClientError, Result};

/// Wait between a dropped connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Background task feeding a [`ClientCache`] from a server's `/ws` channel.
///
/// Dropping the client without calling [`shutdown`](Self::shutdown) also
/// ends the loop.
///
/// # Example
///
/// ```rust,ignore
/// let cache = Arc::new(ClientCache::new());
/// let client = RealtimeClient::connect("ws://127.0.0.1:5050/ws", cache.clone());
///
/// let mut changes = cache.watch();
/// while changes.changed().await.is_ok() {
///     println!("{} devices", changes.borrow().len());
/// }
///
/// client.shutdown().await;
/// ```
pub struct RealtimeClient {
    url: String,
    cache: Arc<ClientCache>,
    shutdown_tx: watch::Sender<bool>,
    task_handle: JoinHandle<()>,
}

impl RealtimeClient {
    /// Start the connect/read/reconnect loop. Returns immediately.
    pub fn connect(ws_url: impl Into<String>, cache: Arc<ClientCache>) -> Self {
        Self::connect_with_delay(ws_url, cache, RECONNECT_DELAY)
    }

    /// Like [`connect`](Self::connect) with a custom reconnect delay.
    pub fn connect_with_delay(
        ws_url: impl Into<String>,
        cache: Arc<ClientCache>,
        reconnect_delay: Duration,
    ) -> Self {
        let url = ws_url.into();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task_handle = tokio::spawn(run(
            url.clone(),
            Arc::clone(&cache),
            reconnect_delay,
            shutdown_rx,
        ));

        Self {
            url,
            cache,
            shutdown_tx,
            task_handle,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache(&self) -> &Arc<ClientCache> {
        &self.cache
    }

    /// Close the socket and stop reconnecting.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task_handle.await;
    }
}

async fn run(
    url: String,
    cache: Arc<ClientCache>,
    reconnect_delay: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            result = connect_and_read(&url, &cache) => match result {
                Ok(()) => tracing::info!(%url, "realtime channel closed"),
                Err(e) => tracing::warn!(%url, error = %e, "realtime channel failed"),
            },
        }
        cache.set_connected(false);

        tracing::debug!(delay_ms = reconnect_delay.as_millis() as u64, "waiting before reconnect");
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    cache.set_connected(false);
    tracing::debug!(%url, "realtime client stopped");
}

/// One connection, read until it ends.
async fn connect_and_read(url: &str, cache: &ClientCache) -> Result<()> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;

    tracing::info!(%url, "realtime channel connected");
    cache.set_connected(true);

    let (_write, mut read) = stream.split();
    while let Some(frame) = read.next().await {
        match frame? {
            Message::Text(text) => match RealtimeMessage::parse(text.as_str()) {
                Ok(message) => {
                    cache.apply(message);
                }
                Err(e) => tracing::warn!(error = %e, "unparseable realtime message"),
            },
            Message::Close(_) => return Ok(()),
            // pings are answered by tungstenite
            _ => {}
        }
    }
    Ok(())
}
