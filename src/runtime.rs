// Process wiring: config -> driver -> coordinator -> HTTP listener

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::motor::{ProtocolDriver, SerialPortOpener};
use crate::server;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the coordinator described by `config`
pub fn build_coordinator(config: &Config) -> Coordinator {
    let opener = SerialPortOpener::new(config.device.clone(), config.baud);
    let driver = ProtocolDriver::with_timing(Arc::new(opener), config.protocol_timing())
        .with_turn_step(config.turn_step);
    Coordinator::new(driver, config.owner_timeout()).with_heading_offset(config.heading_offset)
}

pub async fn run(config: Config) -> Result<(), RuntimeError> {
    let coordinator = build_coordinator(&config);
    let app = server::router(coordinator);

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| RuntimeError::Bind {
            addr: config.bind,
            source,
        })?;

    info!("Runtime started on {}", config.bind);
    info!("Motor controller: {} @ {}", config.device, config.baud);
    info!(
        "Owner timeout {:?}, heading offset {}°, turn step {}°",
        config.owner_timeout(),
        config.heading_offset,
        config.turn_step
    );

    axum::serve(listener, app).await.map_err(RuntimeError::Serve)
}
