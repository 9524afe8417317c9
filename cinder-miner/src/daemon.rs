//! Daemon lifecycle management for cinder-miner.
//!
//! Wires the pool connection manager to its collaborators, serves the HTTP
//! control surface, and handles signals and graceful shutdown.
//!
//! The daemon currently runs against the simulated pool client and farm;
//! real protocol clients and GPU backends plug in through the `PoolClient`
//! and `Farm` traits without touching the manager.

use std::sync::Arc;

use anyhow::bail;
use tokio::signal::unix::{self, SignalKind};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::api::{self, ApiConfig};
use crate::client::sim::{SimClient, SimClientConfig};
use crate::config::Config;
use crate::farm::sim::{SimFarm, SimFarmConfig};
use crate::manager::PoolManager;
use crate::tracing::prelude::*;

/// The main daemon.
pub struct Daemon {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Run the daemon until shutdown is requested.
    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        if config.pools.is_empty() {
            bail!("no pools configured; set CINDER_POOLS to a comma-separated URI list");
        }

        // Channels carrying client and farm events into the manager.
        let (client_event_tx, client_event_rx) = mpsc::channel(100);
        let (farm_event_tx, farm_event_rx) = mpsc::channel(100);

        let client = Arc::new(SimClient::new(SimClientConfig::default(), client_event_tx));
        let farm = Arc::new(SimFarm::new(SimFarmConfig::default(), farm_event_tx));
        info!("Using simulated pool client and farm");

        let manager = Arc::new(PoolManager::new(
            client,
            farm,
            config.manager_config(),
            client_event_rx,
            farm_event_rx,
        ));
        for endpoint in &config.pools {
            manager.add_connection(endpoint.clone());
        }
        info!(
            pools = config.pools.len(),
            miner_type = %config.miner_type,
            "Connection manager configured"
        );
        manager.start();

        // Serve the control surface until shutdown.
        self.tracker.spawn({
            let shutdown = self.shutdown.clone();
            let manager = Arc::clone(&manager);
            let api_config = ApiConfig {
                listen: config.api_listen.clone(),
            };
            async move {
                if let Err(e) = api::serve(api_config, manager, shutdown).await {
                    error!("API server error: {}", e);
                }
            }
        });
        self.tracker.close();

        info!("Started.");

        // Install signal handlers
        let mut sigint = unix::signal(SignalKind::interrupt())?;
        let mut sigterm = unix::signal(SignalKind::terminate())?;

        // Wait for shutdown signal
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            },
        }

        // Initiate shutdown
        self.shutdown.cancel();
        manager.stop().await;

        // Wait for all tasks to complete
        self.tracker.wait().await;
        info!("Exiting.");

        Ok(())
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}
