//! The local compute engine ("farm").
//!
//! The farm owns the kernel-dispatch backends and searches work packages for
//! solutions. The manager consumes it through the [`Farm`] capability:
//! lifecycle and work assignment flow down through trait methods, while
//! found solutions and restart requests flow up as [`FarmEvent`]s over a
//! channel into the manager's supervisor task.

pub mod sim;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Backend, HashRate, Solution, WorkPackage};

/// Events emitted by the farm.
#[derive(Debug, Clone)]
pub enum FarmEvent {
    /// A miner produced a candidate solution for the current work
    SolutionFound {
        solution: Solution,
        miner_index: usize,
    },

    /// The farm wants its miners torn down and started again (device
    /// reconfiguration, kernel fault recovery)
    Restart,
}

/// Aggregate progress across all running miners.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiningProgress {
    pub hashrate: HashRate,
}

/// Errors from farm lifecycle operations.
#[derive(Debug, Error)]
pub enum FarmError {
    #[error("backend {0} failed to start: {1}")]
    StartFailed(Backend, String),
}

/// The compute capability the manager consumes.
#[async_trait]
pub trait Farm: Send + Sync {
    /// True while at least one backend is dispatching kernels.
    fn is_mining(&self) -> bool;

    /// Spin up a backend. `secondary` marks a backend started alongside the
    /// primary in mixed configurations.
    async fn start(&self, backend: Backend, secondary: bool) -> Result<(), FarmError>;

    /// Tear down all backends.
    async fn stop(&self);

    /// Assign the current work package. The empty package suspends kernel
    /// dispatch while keeping the backends initialised, so a later
    /// `set_work` resumes without setup cost.
    fn set_work(&self, work: WorkPackage);

    /// The work package currently assigned.
    fn current_work(&self) -> WorkPackage;

    /// Account a pool-accepted solution.
    fn accepted_solution(&self, stale: bool, miner_index: usize);

    /// Account a pool-rejected solution.
    fn rejected_solution(&self, miner_index: usize);

    /// Current aggregate progress.
    fn progress(&self) -> MiningProgress;
}
