//! Simulated pool client.
//!
//! Stands in for a real protocol client during development and bring-up:
//! every `connect` succeeds, synthetic work packages arrive on a fixed
//! cadence, and submitted solutions are accepted after a short delay. This
//! exercises the whole manager path (connection lifecycle, work delivery,
//! solution accounting) without a pool in reach.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::endpoint::Endpoint;
use crate::tracing::prelude::*;
use crate::types::{Hash256, Solution, WorkPackage};
use crate::u256::U256;

use super::{ClientError, ClientEvent, PoolClient};

/// Tuning knobs for the simulator.
#[derive(Debug, Clone)]
pub struct SimClientConfig {
    /// Delay between synthetic work packages
    pub work_interval: Duration,

    /// Delay between solution submission and the accepted response
    pub accept_delay: Duration,

    /// Share boundary carried by every synthetic package
    pub boundary: U256,

    /// Epoch carried by every synthetic package
    pub epoch: u32,
}

impl Default for SimClientConfig {
    fn default() -> Self {
        Self {
            work_interval: Duration::from_secs(10),
            accept_delay: Duration::from_millis(50),
            boundary: difficulty_one_boundary(),
            epoch: 0,
        }
    }
}

/// The classic difficulty-1 share boundary: 0x00000000ffff0000...0.
fn difficulty_one_boundary() -> U256 {
    let mut bytes = [0u8; 32];
    bytes[4] = 0xff;
    bytes[5] = 0xff;
    U256::from_be_bytes(bytes)
}

struct State {
    endpoint: Option<Endpoint>,
    connected: bool,
    work_task: Option<JoinHandle<()>>,
}

/// A pool client whose upstream is make-believe.
pub struct SimClient {
    config: SimClientConfig,
    event_tx: mpsc::Sender<ClientEvent>,
    state: Mutex<State>,
}

impl SimClient {
    /// Create a simulator that reports events on `event_tx`.
    pub fn new(config: SimClientConfig, event_tx: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            config,
            event_tx,
            state: Mutex::new(State {
                endpoint: None,
                connected: false,
                work_task: None,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("sim client state poisoned")
    }
}

#[async_trait]
impl PoolClient for SimClient {
    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn is_pending(&self) -> bool {
        // Simulated transitions are instantaneous
        false
    }

    fn set_endpoint(&self, endpoint: Endpoint) {
        self.state().endpoint = Some(endpoint);
    }

    fn clear_endpoint(&self) {
        self.state().endpoint = None;
    }

    fn active_endpoint(&self) -> String {
        let state = self.state();
        match (&state.endpoint, state.connected) {
            (Some(ep), true) => format!("{}:{}", ep.host(), ep.port()),
            _ => String::new(),
        }
    }

    async fn connect(&self) {
        let work_task = {
            let mut state = self.state();
            let Some(endpoint) = state.endpoint.clone() else {
                warn!("Connect requested without an endpoint binding");
                return;
            };
            if state.connected {
                return;
            }
            state.connected = true;
            debug!(
                scheme = endpoint.scheme(),
                stratum = endpoint.is_stratum(),
                "Simulating session with {}:{}",
                endpoint.host(),
                endpoint.port()
            );

            // Emit synthetic work on a fixed cadence until disconnected.
            let event_tx = self.event_tx.clone();
            let interval = self.config.work_interval;
            let boundary = self.config.boundary;
            let epoch = self.config.epoch;
            tokio::spawn(async move {
                let mut job: u64 = 0;
                loop {
                    job += 1;
                    let mut header = [0u8; 32];
                    header[24..].copy_from_slice(&job.to_be_bytes());
                    let work = WorkPackage {
                        header: Hash256::from_bytes(header),
                        boundary,
                        epoch,
                    };
                    if event_tx
                        .send(ClientEvent::WorkReceived(work))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    tokio::time::sleep(interval).await;
                }
            })
        };

        if let Some(old) = self.state().work_task.replace(work_task) {
            old.abort();
        }
        let _ = self.event_tx.send(ClientEvent::Connected).await;
    }

    async fn disconnect(&self) {
        let task = {
            let mut state = self.state();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.work_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        let _ = self.event_tx.send(ClientEvent::Disconnected).await;
    }

    async fn submit_solution(
        &self,
        solution: Solution,
        miner_index: usize,
    ) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        // Accept after the configured round-trip delay.
        let event_tx = self.event_tx.clone();
        let delay = self.config.accept_delay;
        let submitted = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = event_tx
                .send(ClientEvent::SolutionAccepted {
                    stale: solution.stale,
                    elapsed: submitted.elapsed(),
                    miner_index,
                })
                .await;
        });
        Ok(())
    }

    async fn submit_hashrate(&self, rate_hex: String) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        debug!(rate = %rate_hex, "Hashrate reported to simulated pool");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_with_endpoint(config: SimClientConfig) -> (SimClient, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let client = SimClient::new(config, event_tx);
        client.set_endpoint("stratum+tcp://sim.pool:4444".parse().unwrap());
        (client, event_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_emits_connected_then_work() {
        let (client, mut event_rx) = sim_with_endpoint(SimClientConfig::default());

        client.connect().await;
        assert!(client.is_connected());
        assert_eq!(client.active_endpoint(), "sim.pool:4444");

        // First event is the work generator's initial package or Connected,
        // depending on task scheduling; both must arrive.
        let mut saw_connected = false;
        let mut saw_work = false;
        for _ in 0..2 {
            match event_rx.recv().await.unwrap() {
                ClientEvent::Connected => saw_connected = true,
                ClientEvent::WorkReceived(work) => {
                    assert!(!work.is_empty());
                    saw_work = true;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(saw_connected && saw_work);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_work_emission() {
        let (client, mut event_rx) = sim_with_endpoint(SimClientConfig {
            work_interval: Duration::from_secs(1),
            ..Default::default()
        });

        client.connect().await;
        client.disconnect().await;
        assert!(!client.is_connected());
        assert_eq!(client.active_endpoint(), "");

        // Drain everything emitted so far; after Disconnected nothing follows.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let mut last = None;
        while let Ok(event) = event_rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(ClientEvent::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_accepted_after_delay() {
        let (client, mut event_rx) = sim_with_endpoint(SimClientConfig::default());
        client.connect().await;

        let solution = Solution {
            nonce: 0xdeadbeef,
            stale: true,
        };
        client.submit_solution(solution, 3).await.unwrap();

        loop {
            match event_rx.recv().await.unwrap() {
                ClientEvent::SolutionAccepted {
                    stale, miner_index, ..
                } => {
                    assert!(stale);
                    assert_eq!(miner_index, 3);
                    break;
                }
                ClientEvent::Connected | ClientEvent::WorkReceived(_) => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_submission_rejected_when_disconnected() {
        let (client, _event_rx) = sim_with_endpoint(SimClientConfig::default());
        let solution = Solution {
            nonce: 1,
            stale: false,
        };
        assert!(matches!(
            client.submit_solution(solution, 0).await,
            Err(ClientError::NotConnected)
        ));
    }
}
