//! The supervisor task: connection decisions, event handling, failover.
//!
//! One loop multiplexes four sources: the one-second tick (reconnect
//! decisions and hashrate reporting), the pool-client event channel, the
//! farm event channel, and the shutdown token. Because every handler runs
//! on this task, session state has a single writer; the registry mutex
//! exists only for the control surface and is never held across I/O.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::client::ClientEvent;
use crate::endpoint::Endpoint;
use crate::farm::FarmEvent;
use crate::tracing::prelude::*;
use crate::types::{difficulty_from_boundary, DisplayDifficulty, Solution, WorkPackage};

use super::{EventStreams, PoolManager, SetActive};

/// What a reconnect decision resolved to.
enum TickAction {
    /// Try the copied endpoint
    Connect(Endpoint),
    /// Registry exhausted or the "exit" sentinel reached
    Shutdown,
}

struct Supervisor {
    mgr: Arc<PoolManager>,

    /// Failover-return deadline; armed only while connected to a
    /// non-primary endpoint with a configured timeout
    failover_deadline: Option<Instant>,

    /// Ticks elapsed since the last hashrate submission
    hashrate_ticks: u64,
    hashrate_interval_ticks: u64,
}

/// Drive the manager until stopped or out of endpoints.
pub(super) async fn run(mgr: Arc<PoolManager>, streams: EventStreams) {
    let EventStreams {
        mut client_rx,
        mut farm_rx,
    } = streams;

    let mut supervisor = Supervisor {
        hashrate_interval_ticks: mgr.config.hashrate_interval.as_secs().max(1),
        mgr,
        failover_deadline: None,
        hashrate_ticks: 0,
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Supervisor loop started");
    while supervisor.mgr.running.load(Ordering::Relaxed) {
        tokio::select! {
            _ = ticker.tick() => supervisor.on_tick().await,
            Some(event) = client_rx.recv() => supervisor.on_client_event(event).await,
            Some(event) = farm_rx.recv() => supervisor.on_farm_event(event).await,
            _ = supervisor.mgr.shutdown.cancelled() => break,
        }
    }
    trace!("Supervisor task stopped.");
}

impl Supervisor {
    async fn on_tick(&mut self) {
        self.check_failover_deadline().await;

        // Take action only when the client is settled; a pending connect or
        // disconnect resolves on its own time.
        if !self.mgr.client.is_pending() && !self.mgr.client.is_connected() {
            self.mgr.suspend_mining();

            match self.reconnect_decision() {
                TickAction::Connect(endpoint) => {
                    info!("Selected pool {}:{}", endpoint.host(), endpoint.port());
                    self.mgr.client.set_endpoint(endpoint);
                    self.mgr.client.connect().await;
                }
                TickAction::Shutdown => {
                    info!("No more connections to try. Exiting...");
                    if self.mgr.farm.is_mining() {
                        info!("Shutting down miners...");
                        self.mgr.farm.stop().await;
                    }
                    self.mgr.running.store(false, Ordering::Relaxed);
                    return;
                }
            }
        }

        self.hashrate_ticks += 1;
        if self.hashrate_ticks >= self.hashrate_interval_ticks {
            self.hashrate_ticks = 0;
            let progress = self.mgr.farm.progress();
            if let Err(e) = self
                .mgr
                .client
                .submit_hashrate(progress.hashrate.to_submit_hex())
                .await
            {
                debug!(error = %e, "Hashrate submission failed");
            }
        }
    }

    /// Pick the endpoint to try next, applying unrecoverable-erasure and
    /// the rotation threshold. Holds the registry lock for the decision
    /// only; the connect itself happens after release.
    fn reconnect_decision(&self) -> TickAction {
        let mut reg = self.mgr.registry();

        if reg.active().is_some_and(|ep| ep.is_unrecoverable()) {
            self.mgr.client.clear_endpoint();
            if let Some(removed) = reg.remove_active() {
                info!(uri = %removed, "Discarded unrecoverable connection");
            }
            self.mgr
                .connection_switches
                .fetch_add(1, Ordering::Relaxed);
        } else if reg.attempts() >= self.mgr.config.max_attempts {
            reg.rotate();
            self.mgr
                .connection_switches
                .fetch_add(1, Ordering::Relaxed);
        }

        let candidate = reg.active().filter(|ep| !ep.is_exit()).cloned();
        match candidate {
            Some(endpoint) => {
                reg.begin_attempt();
                TickAction::Connect(endpoint)
            }
            None => TickAction::Shutdown,
        }
    }

    /// Fire the failover-return deadline if it elapsed: back to the
    /// primary endpoint, dropping the fallback session. A cleared deadline
    /// (re-armed or cancelled meanwhile) is a no-op.
    async fn check_failover_deadline(&mut self) {
        let Some(deadline) = self.failover_deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        self.failover_deadline = None;

        if !self.mgr.running.load(Ordering::Relaxed) {
            return;
        }
        let switched = matches!(self.mgr.registry().set_active(0), SetActive::Switched);
        if switched {
            self.mgr
                .connection_switches
                .fetch_add(1, Ordering::Relaxed);
            info!("Failover timeout reached, retrying connection to primary pool");
            self.mgr.client.disconnect().await;
        }
    }

    async fn on_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected => self.on_connected().await,
            ClientEvent::Disconnected => {
                let host = self.mgr.connected_host();
                info!(
                    remote = %self.mgr.client.active_endpoint(),
                    "Disconnected from {}",
                    host
                );
                // Do not stop the farm here: the next tick decides between
                // a fast reconnect to the same pool and a rotation.
            }
            ClientEvent::WorkReceived(work) => self.on_work_received(work),
            ClientEvent::SolutionAccepted {
                stale,
                elapsed,
                miner_index,
            } => {
                info!(
                    remote = %self.mgr.client.active_endpoint(),
                    "**Accepted{} {:>4} ms. {}",
                    if stale { " (stale)" } else { "" },
                    elapsed.as_millis(),
                    self.mgr.connected_host()
                );
                self.mgr.farm.accepted_solution(stale, miner_index);
            }
            ClientEvent::SolutionRejected {
                stale,
                elapsed,
                miner_index,
            } => {
                warn!(
                    remote = %self.mgr.client.active_endpoint(),
                    "**Rejected{} {:>4} ms. {}",
                    if stale { " (stale)" } else { "" },
                    elapsed.as_millis(),
                    self.mgr.connected_host()
                );
                self.mgr.farm.rejected_solution(miner_index);
            }
        }
    }

    async fn on_connected(&mut self) {
        let (endpoint, non_primary) = {
            let mut reg = self.mgr.registry();
            reg.reset_attempts();
            (reg.snapshot_active(), reg.active_index() != 0)
        };
        self.mgr.session().last_connected_host = endpoint.host().to_string();

        // Return-to-primary timer: armed on every fallback session, cleared
        // whenever the primary itself connects.
        self.failover_deadline = match self.mgr.config.failover_timeout {
            Some(timeout) if non_primary => Some(Instant::now() + timeout),
            _ => None,
        };

        info!(
            remote = %self.mgr.client.active_endpoint(),
            "Established connection with {}:{}",
            endpoint.host(),
            endpoint.port()
        );

        if !self.mgr.farm.is_mining() {
            info!("Spinning up miners...");
            self.spin_up_miners().await;
        }
    }

    fn on_work_received(&mut self, work: WorkPackage) {
        info!(
            remote = %self.mgr.client.active_endpoint(),
            "Job: #{} {}",
            work.header.abridged(),
            self.mgr.connected_host()
        );

        {
            let mut session = self.mgr.session();
            if work.boundary != session.last_boundary {
                session.last_boundary = work.boundary;
                session.last_difficulty = difficulty_from_boundary(work.boundary);
                info!(
                    "Pool difficulty: {}",
                    DisplayDifficulty(session.last_difficulty)
                );
            }
            if session.last_epoch != Some(work.epoch) {
                info!("New epoch {}", work.epoch);
                session.last_epoch = Some(work.epoch);
                self.mgr.epoch_changes.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.mgr.farm.set_work(work);
    }

    async fn on_farm_event(&mut self, event: FarmEvent) {
        match event {
            FarmEvent::SolutionFound {
                solution,
                miner_index,
            } => self.on_solution_found(solution, miner_index).await,
            FarmEvent::Restart => {
                info!("Restart miners...");
                if self.mgr.farm.is_mining() {
                    info!("Shutting down miners...");
                    self.mgr.farm.stop().await;
                }
                info!("Spinning up miners...");
                self.spin_up_miners().await;
            }
        }
    }

    /// Solutions pass through only while connected; submitting into a dead
    /// session would log the nonce and never see a response.
    async fn on_solution_found(&mut self, solution: Solution, miner_index: usize) {
        if !self.mgr.client.is_connected() {
            warn!(
                "Solution 0x{:x} wasted. Waiting for connection...",
                solution.nonce
            );
            return;
        }

        if solution.stale {
            warn!("Stale solution: 0x{:x}", solution.nonce);
        } else {
            info!("Solution: 0x{:x}", solution.nonce);
        }
        if let Err(e) = self.mgr.client.submit_solution(solution, miner_index).await {
            warn!(error = %e, "Solution 0x{:x} dropped by client", solution.nonce);
        }
    }

    async fn spin_up_miners(&self) {
        for &(backend, secondary) in self.mgr.config.miner_type.backends() {
            if let Err(e) = self.mgr.farm.start(backend, secondary).await {
                error!(error = %e, "Failed to start {} backend", backend);
            }
        }
    }
}
