//! Assembling and running the server.

use std::net::SocketAddr;
use std::sync::Arc;

use roomctl_discovery::{NetworkLocator, TcpProbe};
use roomctl_drivers::BridgeBackend;
use roomctl_state::{
    DefaultDriverFactory, DeviceRegistry, DeviceService, MemoryRegistry, RefreshSchedule,
    StatePoller,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcaster::{spawn_event_bridge, Broadcaster};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::routes::{routes, AppState};

/// A running HTTP + realtime server with its background tasks.
///
/// # Example
///
/// ```no_run
/// # use roomctl_server::{RoomServer, ServerConfig};
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let server = RoomServer::start(ServerConfig::default()).await?;
/// println!("listening on {}", server.local_addr());
/// tokio::signal::ctrl_c().await?;
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct RoomServer {
    local_addr: SocketAddr,
    service: Arc<DeviceService>,
    broadcaster: Arc<Broadcaster>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
    bridge_handle: JoinHandle<()>,
    refresh: Option<RefreshSchedule>,
    poller: Option<StatePoller>,
}

impl RoomServer {
    /// Build every component from `config`, bind, and start the schedules.
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let registry: Arc<dyn DeviceRegistry> = match &config.data_file {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading device registry");
                Arc::new(MemoryRegistry::open(path).await?)
            }
            None => Arc::new(MemoryRegistry::new()),
        };

        let locator = NetworkLocator::new(config.locator_config()).with_service_probe(Arc::new(
            TcpProbe::new(config.mdc_port, config.locator_config().probe_timeout),
        ));

        let mut drivers =
            DefaultDriverFactory::new(config.mdc_settings()).with_wol_target(config.wol_broadcast);
        if let Some(url) = &config.lighting_bridge_url {
            let backend = BridgeBackend::new(url.as_str())?;
            drivers = drivers.with_lighting(Arc::new(backend), config.light_credentials());
        } else {
            tracing::info!("no lighting bridge configured, light commands will fail");
        }

        let service = Arc::new(DeviceService::new(
            registry,
            Arc::new(locator),
            Arc::new(drivers),
            config.service_config(),
        ));

        let mut server = Self::bind(config.bind_addr(), service.clone(), config.subscriber_buffer)?;
        server.refresh = RefreshSchedule::start(service.clone(), config.refresh_interval());
        server.poller = StatePoller::start(service, config.state_poll_interval());
        Ok(server)
    }

    /// Serve `service` on `addr` without any schedules.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        service: Arc<DeviceService>,
        subscriber_buffer: usize,
    ) -> Result<Self, ServerError> {
        let broadcaster = Arc::new(Broadcaster::new(subscriber_buffer));
        let bridge_handle = spawn_event_bridge(service.clone(), broadcaster.clone());
        let state = AppState::new(service.clone(), broadcaster.clone());

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (local_addr, server) = warp::serve(routes(state))
            .try_bind_with_graceful_shutdown(addr, async move {
                shutdown_rx.recv().await;
            })
            .map_err(|source| {
                bridge_handle.abort();
                ServerError::Bind { addr, source }
            })?;

        tracing::info!(%local_addr, "roomctl server listening");
        let server_handle = tokio::spawn(server);

        Ok(Self {
            local_addr,
            service,
            broadcaster,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
            bridge_handle,
            refresh: None,
            poller: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service(&self) -> &Arc<DeviceService> {
        &self.service
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Stop the schedules, then the HTTP server.
    ///
    /// In-flight requests finish; open WebSocket sessions are closed.
    pub async fn shutdown(mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.stop().await;
        }
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        self.bridge_handle.abort();
        self.broadcaster.close_all();
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        tracing::info!("roomctl server stopped");
    }
}
