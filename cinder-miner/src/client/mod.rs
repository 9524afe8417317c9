//! Upstream pool connectivity.
//!
//! The connection manager drives exactly one pool session at a time through
//! the [`PoolClient`] capability. Concrete clients (stratum, getwork, the
//! simulator) implement the trait and report everything that happens on the
//! wire as [`ClientEvent`]s over a channel, so the manager's supervisor task
//! is the only writer of session state.
//!
//! Clients never call back into the manager. A terminal protocol error for
//! the bound endpoint is signalled by marking the endpoint itself
//! (`Endpoint::mark_unrecoverable`); the supervisor erases the entry on its
//! next reconnect decision.

pub mod sim;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::endpoint::Endpoint;
use crate::types::{Solution, WorkPackage};

/// Events emitted by a pool client.
///
/// Sent over a channel to the manager's supervisor task, which multiplexes
/// them with farm events and its own tick cadence.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A session with the bound endpoint was established
    Connected,

    /// The session dropped (or a connect attempt failed after dialing)
    Disconnected,

    /// The pool distributed a new work package
    WorkReceived(WorkPackage),

    /// The pool accepted a submitted solution
    SolutionAccepted {
        /// The pool considered the work already superseded
        stale: bool,
        /// Round-trip time from submission to response
        elapsed: Duration,
        /// Which miner produced the solution
        miner_index: usize,
    },

    /// The pool rejected a submitted solution
    SolutionRejected {
        stale: bool,
        elapsed: Duration,
        miner_index: usize,
    },
}

/// Errors from pool client actions.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected to a pool")]
    NotConnected,

    #[error("client event channel closed")]
    ChannelClosed,
}

/// The pool-session capability the manager consumes.
///
/// State predicates are cheap and callable from any task. Actions that touch
/// the network are async; `connect` and `disconnect` initiate transitions
/// and report their outcome as [`ClientEvent`]s rather than through return
/// values, so a failed dial looks the same as a dropped session.
#[async_trait]
pub trait PoolClient: Send + Sync {
    /// True while a session is established.
    fn is_connected(&self) -> bool;

    /// True while connecting or disconnecting.
    fn is_pending(&self) -> bool;

    /// Bind the client to an endpoint for subsequent `connect` calls.
    fn set_endpoint(&self, endpoint: Endpoint);

    /// Drop the endpoint binding.
    fn clear_endpoint(&self);

    /// Printable remote address of the live session, or "" when none.
    fn active_endpoint(&self) -> String;

    /// Initiate a connection to the bound endpoint.
    async fn connect(&self);

    /// Tear down the session, cancelling in-flight operations.
    async fn disconnect(&self);

    /// Submit a solution for the current work.
    async fn submit_solution(
        &self,
        solution: Solution,
        miner_index: usize,
    ) -> Result<(), ClientError>;

    /// Report the farm's hashrate upstream. The argument is the 0x-prefixed
    /// 64-digit hex rendering produced by `HashRate::to_submit_hex`.
    async fn submit_hashrate(&self, rate_hex: String) -> Result<(), ClientError>;
}
