//! Recording farm for manager tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::types::{Backend, HashRate, WorkPackage};

use super::{Farm, FarmError, MiningProgress};

#[derive(Default)]
struct State {
    mining: bool,
    work: WorkPackage,
    starts: Vec<(Backend, bool)>,
    stop_calls: u32,
    set_work_calls: u32,
    accepted: Vec<(bool, usize)>,
    rejected: Vec<usize>,
}

/// A farm that records every call for later inspection.
pub(crate) struct MockFarm {
    hashrate: HashRate,
    state: Mutex<State>,
}

impl MockFarm {
    pub fn new(hashrate: HashRate) -> Arc<Self> {
        Arc::new(Self {
            hashrate,
            state: Mutex::new(State::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mock farm state poisoned")
    }

    pub fn starts(&self) -> Vec<(Backend, bool)> {
        self.state().starts.clone()
    }

    pub fn stop_calls(&self) -> u32 {
        self.state().stop_calls
    }

    pub fn set_work_calls(&self) -> u32 {
        self.state().set_work_calls
    }

    pub fn accepted(&self) -> Vec<(bool, usize)> {
        self.state().accepted.clone()
    }

    pub fn rejected(&self) -> Vec<usize> {
        self.state().rejected.clone()
    }

    pub fn work(&self) -> WorkPackage {
        self.state().work.clone()
    }
}

#[async_trait]
impl Farm for MockFarm {
    fn is_mining(&self) -> bool {
        self.state().mining
    }

    async fn start(&self, backend: Backend, secondary: bool) -> Result<(), FarmError> {
        let mut state = self.state();
        state.mining = true;
        state.starts.push((backend, secondary));
        Ok(())
    }

    async fn stop(&self) {
        let mut state = self.state();
        state.mining = false;
        state.work = WorkPackage::default();
        state.stop_calls += 1;
    }

    fn set_work(&self, work: WorkPackage) {
        let mut state = self.state();
        state.set_work_calls += 1;
        state.work = work;
    }

    fn current_work(&self) -> WorkPackage {
        self.state().work.clone()
    }

    fn accepted_solution(&self, stale: bool, miner_index: usize) {
        self.state().accepted.push((stale, miner_index));
    }

    fn rejected_solution(&self, miner_index: usize) {
        self.state().rejected.push(miner_index);
    }

    fn progress(&self) -> MiningProgress {
        if self.state().mining {
            MiningProgress {
                hashrate: self.hashrate,
            }
        } else {
            MiningProgress::default()
        }
    }
}
