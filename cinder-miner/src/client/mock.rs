//! Scriptable pool client for manager tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::types::{Solution, WorkPackage};

use super::{ClientError, ClientEvent, PoolClient};

#[derive(Default)]
struct State {
    endpoint: Option<Endpoint>,
    connected: bool,
    pending: bool,
    /// Remaining connect failures per host; absent or zero means success
    fail_remaining: HashMap<String, u32>,
    connect_calls: u32,
    disconnect_calls: u32,
    clear_calls: u32,
    submitted: Vec<(Solution, usize)>,
    hashrates: Vec<String>,
}

/// A client whose connect outcomes are scripted per host.
///
/// A failing connect leaves the client disconnected without emitting any
/// event, matching a dial that never completes; the supervisor notices on
/// its next tick. A successful connect emits `Connected`.
pub(crate) struct MockClient {
    event_tx: mpsc::Sender<ClientEvent>,
    state: Mutex<State>,
}

impl MockClient {
    pub fn new(event_tx: mpsc::Sender<ClientEvent>) -> Arc<Self> {
        Arc::new(Self {
            event_tx,
            state: Mutex::new(State::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mock client state poisoned")
    }

    /// Script the next `times` connects to `host` to fail.
    pub fn fail_host(&self, host: &str, times: u32) {
        self.state().fail_remaining.insert(host.to_string(), times);
    }

    pub fn set_pending(&self, pending: bool) {
        self.state().pending = pending;
    }

    pub fn connect_calls(&self) -> u32 {
        self.state().connect_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.state().disconnect_calls
    }

    pub fn clear_calls(&self) -> u32 {
        self.state().clear_calls
    }

    pub fn submitted(&self) -> Vec<(Solution, usize)> {
        self.state().submitted.clone()
    }

    pub fn hashrates(&self) -> Vec<String> {
        self.state().hashrates.clone()
    }

    /// Inject a work package as if the pool had distributed it.
    pub async fn push_work(&self, work: WorkPackage) {
        let _ = self
            .event_tx
            .send(ClientEvent::WorkReceived(work))
            .await;
    }

    /// Inject a share response as if the pool had answered a submission.
    pub async fn push_accepted(&self, stale: bool, miner_index: usize) {
        let _ = self
            .event_tx
            .send(ClientEvent::SolutionAccepted {
                stale,
                elapsed: Duration::from_millis(42),
                miner_index,
            })
            .await;
    }

    pub async fn push_rejected(&self, miner_index: usize) {
        let _ = self
            .event_tx
            .send(ClientEvent::SolutionRejected {
                stale: false,
                elapsed: Duration::from_millis(42),
                miner_index,
            })
            .await;
    }
}

#[async_trait]
impl PoolClient for MockClient {
    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn is_pending(&self) -> bool {
        self.state().pending
    }

    fn set_endpoint(&self, endpoint: Endpoint) {
        self.state().endpoint = Some(endpoint);
    }

    fn clear_endpoint(&self) {
        let mut state = self.state();
        state.endpoint = None;
        state.clear_calls += 1;
    }

    fn active_endpoint(&self) -> String {
        let state = self.state();
        match (&state.endpoint, state.connected) {
            (Some(ep), true) => format!("{}:{}", ep.host(), ep.port()),
            _ => String::new(),
        }
    }

    async fn connect(&self) {
        let success = {
            let mut state = self.state();
            state.connect_calls += 1;
            let Some(host) = state.endpoint.as_ref().map(|ep| ep.host().to_string()) else {
                return;
            };
            match state.fail_remaining.get_mut(&host) {
                Some(remaining) if *remaining > 0 => {
                    *remaining = remaining.saturating_sub(1);
                    false
                }
                _ => {
                    state.connected = true;
                    true
                }
            }
        };
        if success {
            let _ = self.event_tx.send(ClientEvent::Connected).await;
        }
    }

    async fn disconnect(&self) {
        {
            let mut state = self.state();
            state.disconnect_calls += 1;
            if !state.connected {
                return;
            }
            state.connected = false;
        }
        let _ = self.event_tx.send(ClientEvent::Disconnected).await;
    }

    async fn submit_solution(
        &self,
        solution: Solution,
        miner_index: usize,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        if !state.connected {
            return Err(ClientError::NotConnected);
        }
        state.submitted.push((solution, miner_index));
        Ok(())
    }

    async fn submit_hashrate(&self, rate_hex: String) -> Result<(), ClientError> {
        self.state().hashrates.push(rate_hex);
        Ok(())
    }
}
