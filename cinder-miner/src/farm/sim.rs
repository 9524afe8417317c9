//! Simulated farm.
//!
//! Pretends to mine: reports a fixed hashrate and "finds" a solution on a
//! fixed cadence whenever non-empty work is assigned. Pairs with the
//! simulated pool client to run the daemon end-to-end on a machine with no
//! GPUs.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::tracing::prelude::*;
use crate::types::{Backend, HashRate, Solution, WorkPackage};

use super::{Farm, FarmError, FarmEvent, MiningProgress};

/// Tuning knobs for the simulated farm.
#[derive(Debug, Clone)]
pub struct SimFarmConfig {
    /// Reported aggregate hashrate
    pub hashrate: HashRate,

    /// Delay between simulated solution finds (while work is assigned)
    pub solution_interval: Duration,
}

impl Default for SimFarmConfig {
    fn default() -> Self {
        Self {
            hashrate: HashRate::from_megahashes(30.0),
            solution_interval: Duration::from_secs(15),
        }
    }
}

struct State {
    mining: bool,
    work: WorkPackage,
    accepted: u64,
    rejected: u64,
    search_task: Option<JoinHandle<()>>,
}

/// A farm whose kernels are make-believe.
pub struct SimFarm {
    config: SimFarmConfig,
    event_tx: mpsc::Sender<FarmEvent>,
    state: Arc<Mutex<State>>,
}

impl SimFarm {
    /// Create a simulator that reports events on `event_tx`.
    pub fn new(config: SimFarmConfig, event_tx: mpsc::Sender<FarmEvent>) -> Self {
        Self {
            config,
            event_tx,
            state: Arc::new(Mutex::new(State {
                mining: false,
                work: WorkPackage::default(),
                accepted: 0,
                rejected: 0,
                search_task: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("sim farm state poisoned")
    }
}

#[async_trait]
impl Farm for SimFarm {
    fn is_mining(&self) -> bool {
        self.state().mining
    }

    async fn start(&self, backend: Backend, secondary: bool) -> Result<(), FarmError> {
        let mut state = self.state();
        info!(secondary, "Simulated {} backend online", backend);

        if state.mining {
            return Ok(());
        }
        state.mining = true;

        // One search task regardless of backend count; it emits a solution
        // per interval whenever the assigned work is non-empty.
        let event_tx = self.event_tx.clone();
        let interval = self.config.solution_interval;
        let shared = Arc::clone(&self.state);
        state.search_task = Some(tokio::spawn(async move {
            let mut nonce: u64 = 0x1000;
            loop {
                tokio::time::sleep(interval).await;
                let idle = shared
                    .lock()
                    .map(|state| state.work.is_empty())
                    .unwrap_or(true);
                if idle {
                    continue;
                }
                nonce = nonce.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(1);
                let solution = Solution {
                    nonce,
                    stale: false,
                };
                if event_tx
                    .send(FarmEvent::SolutionFound {
                        solution,
                        miner_index: 0,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn stop(&self) {
        let task = {
            let mut state = self.state();
            if !state.mining {
                return;
            }
            state.mining = false;
            state.work = WorkPackage::default();
            state.search_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        info!("Simulated farm offline");
    }

    fn set_work(&self, work: WorkPackage) {
        self.state().work = work;
    }

    fn current_work(&self) -> WorkPackage {
        self.state().work.clone()
    }

    fn accepted_solution(&self, stale: bool, miner_index: usize) {
        let mut state = self.state();
        state.accepted += 1;
        debug!(
            stale,
            miner_index,
            total = state.accepted,
            "Accepted solution accounted"
        );
    }

    fn rejected_solution(&self, miner_index: usize) {
        let mut state = self.state();
        state.rejected += 1;
        debug!(
            miner_index,
            total = state.rejected,
            "Rejected solution accounted"
        );
    }

    fn progress(&self) -> MiningProgress {
        if self.state().mining {
            MiningProgress {
                hashrate: self.config.hashrate,
            }
        } else {
            MiningProgress::default()
        }
    }
}
