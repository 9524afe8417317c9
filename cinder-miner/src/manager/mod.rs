//! The pool connection manager.
//!
//! Maintains exactly one active upstream session on behalf of the farm:
//! keeps the farm supplied with fresh work from a healthy pool, rotates
//! across the configured endpoints when connections fail or stall, routes
//! solutions back to the connected pool, and exposes the control surface
//! the operator API consumes.
//!
//! Internally a single supervisor task owns every state-changing decision.
//! It multiplexes a one-second tick with the pool-client and farm event
//! channels, so session fields have one writer and the registry mutex is
//! only ever held for short, non-blocking sections.

mod registry;
mod supervisor;

pub use registry::{ConnectionEntry, Registry, SetActive};

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientEvent, PoolClient};
use crate::endpoint::Endpoint;
use crate::farm::{Farm, FarmEvent};
use crate::tracing::prelude::*;
use crate::types::{HashRate, MinerType, WorkPackage};
use crate::u256::U256;

/// Returned when a control-surface call names a connection index that does
/// not exist.
#[derive(Debug, Error, PartialEq)]
#[error("connection index {0} out of range")]
pub struct IndexOutOfRange(pub usize);

/// Manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Which backends to spin up once connected
    pub miner_type: MinerType,

    /// Connect attempts against one endpoint before rotating to the next
    pub max_attempts: u32,

    /// How long to stay on a fallback before forcing a return to the
    /// primary endpoint; `None` disables the failover timer
    pub failover_timeout: Option<Duration>,

    /// Interval between hashrate submissions upstream
    pub hashrate_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            miner_type: MinerType::Cl,
            max_attempts: 3,
            failover_timeout: None,
            hashrate_interval: Duration::from_secs(60),
        }
    }
}

/// Session metrics written by the supervisor task, read by the control
/// surface. Stable across transient disconnects.
#[derive(Default)]
struct Session {
    last_connected_host: String,
    last_boundary: U256,
    last_difficulty: f64,
    last_epoch: Option<u32>,
}

/// Event streams handed to the supervisor task on start.
struct EventStreams {
    client_rx: mpsc::Receiver<ClientEvent>,
    farm_rx: mpsc::Receiver<FarmEvent>,
}

/// The connection manager. Single-use: create, `start`, `stop`, discard.
pub struct PoolManager {
    client: Arc<dyn PoolClient>,
    farm: Arc<dyn Farm>,
    config: ManagerConfig,

    registry: Mutex<Registry>,
    session: Mutex<Session>,

    running: AtomicBool,
    launched: AtomicBool,
    connection_switches: AtomicU32,
    epoch_changes: AtomicU32,

    shutdown: CancellationToken,
    events: Mutex<Option<EventStreams>>,
}

impl PoolManager {
    /// Create a manager bound to a client and a farm.
    ///
    /// `client_rx` and `farm_rx` are the receive sides of the channels the
    /// client and farm were constructed with; the supervisor task takes
    /// ownership of them on `start`.
    pub fn new(
        client: Arc<dyn PoolClient>,
        farm: Arc<dyn Farm>,
        config: ManagerConfig,
        client_rx: mpsc::Receiver<ClientEvent>,
        farm_rx: mpsc::Receiver<FarmEvent>,
    ) -> Self {
        Self {
            client,
            farm,
            config,
            registry: Mutex::new(Registry::new()),
            session: Mutex::new(Session::default()),
            running: AtomicBool::new(false),
            launched: AtomicBool::new(false),
            connection_switches: AtomicU32::new(0),
            epoch_changes: AtomicU32::new(0),
            shutdown: CancellationToken::new(),
            events: Mutex::new(Some(EventStreams {
                client_rx,
                farm_rx,
            })),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("registry mutex poisoned")
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().expect("session mutex poisoned")
    }

    /// Launch the supervisor task.
    ///
    /// A warning and no-op when the registry is empty, and when this
    /// manager already ran once: restart semantics are deliberately
    /// single-use, create a fresh manager instead.
    pub fn start(self: &Arc<Self>) {
        if self.registry().is_empty() {
            warn!("Manager has no connections defined!");
            return;
        }
        if self.launched.swap(true, Ordering::Relaxed) {
            warn!("Manager is single-use; create a new one to restart");
            return;
        }
        let streams = self
            .events
            .lock()
            .expect("event streams mutex poisoned")
            .take()
            .expect("event streams present on first start");

        self.running.store(true, Ordering::Relaxed);
        tokio::spawn(supervisor::run(Arc::clone(self), streams));
    }

    /// Stop the manager: ends the supervisor loop, cancels the failover
    /// timer, disconnects the client and stops the farm. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        info!("Shutting down...");
        self.shutdown.cancel();

        if self.client.is_connected() {
            self.client.disconnect().await;
        }
        if self.farm.is_mining() {
            info!("Shutting down miners...");
            self.farm.stop().await;
        }
    }

    /// Whether the supervisor loop is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Append an endpoint to the rotation order.
    pub fn add_connection(&self, endpoint: Endpoint) {
        debug!(uri = %endpoint, "Connection added");
        self.registry().add(endpoint);
    }

    /// Remove the endpoint at `index`.
    pub fn remove_connection(&self, index: usize) -> Result<(), IndexOutOfRange> {
        self.registry()
            .remove(index)
            .map(|removed| debug!(uri = %removed, "Connection removed"))
            .map_err(IndexOutOfRange)
    }

    /// Drop every configured endpoint; disconnects if a session is live.
    pub async fn clear_connections(&self) {
        self.registry().clear();
        if self.client.is_connected() {
            self.client.disconnect().await;
        }
    }

    /// Switch the active connection to `index`.
    ///
    /// No-op when `index` is already active. Otherwise the session is
    /// dropped and mining suspended; the supervisor reconnects to the new
    /// endpoint on its next tick.
    pub async fn set_active_connection(&self, index: usize) -> Result<(), IndexOutOfRange> {
        let outcome = self.registry().set_active(index);
        match outcome {
            SetActive::OutOfRange => return Err(IndexOutOfRange(index)),
            SetActive::Unchanged => return Ok(()),
            SetActive::Switched => {}
        }
        self.connection_switches.fetch_add(1, Ordering::Relaxed);
        self.client.disconnect().await;
        self.suspend_mining();
        Ok(())
    }

    /// Copy of the active endpoint, or the `":0"` sentinel when none.
    pub fn get_active_connection_copy(&self) -> Endpoint {
        self.registry().snapshot_active()
    }

    /// Ordered snapshot of the configured connections.
    pub fn get_connections_snapshot(&self) -> Vec<ConnectionEntry> {
        self.registry().list()
    }

    /// Pool difficulty of the current session; 0 unless running and
    /// connected.
    pub fn get_current_difficulty(&self) -> f64 {
        if !self.is_running() || !self.client.is_connected() {
            return 0.0;
        }
        self.session().last_difficulty
    }

    /// Total rotations since start.
    pub fn get_connection_switches(&self) -> u32 {
        self.connection_switches.load(Ordering::Relaxed)
    }

    /// Total distinct epochs observed since start.
    pub fn get_epoch_changes(&self) -> u32 {
        self.epoch_changes.load(Ordering::Relaxed)
    }

    /// Host of the most recent established session.
    pub fn connected_host(&self) -> String {
        self.session().last_connected_host.clone()
    }

    /// Farm hashrate as currently reported.
    pub fn current_hashrate(&self) -> HashRate {
        self.farm.progress().hashrate
    }

    /// Halt kernel dispatch without tearing the farm down. Idempotent: a
    /// farm that is not mining, or whose work is already empty, is left
    /// alone.
    fn suspend_mining(&self) {
        if !self.farm.is_mining() {
            return;
        }
        if self.farm.current_work().is_empty() {
            return;
        }
        self.farm.set_work(WorkPackage::default());
        info!("Suspend mining due connection change...");
    }
}
