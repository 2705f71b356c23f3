//! CLI `serve` command: run the control server until Ctrl-C.

use anyhow::{Context, Result};

use notegate::config::NotegateConfig;
use notegate::server::ControlServer;

pub async fn serve(config: NotegateConfig) -> Result<()> {
    let server = ControlServer::from_config(config)?;
    let addr = server.start().await?;
    println!("notegate listening on http://{addr}");
    println!("Fetch the session token from http://{addr}/auth/token");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("ctrl-c received, shutting down");

    server.stop().await?;
    Ok(())
}
