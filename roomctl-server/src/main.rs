use anyhow::Context;
use clap::Parser;
use roomctl_server::{RoomServer, ServerConfig};
use roomctl_state::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    logging::init_logging_from_env().context("failed to initialize logging")?;

    let server = RoomServer::start(config)
        .await
        .context("failed to start roomctl server")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");

    server.shutdown().await;
    Ok(())
}
