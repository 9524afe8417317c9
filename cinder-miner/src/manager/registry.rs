//! The ordered list of configured upstream endpoints.
//!
//! Pure data structure; the manager serialises access with one mutex and
//! never holds it across I/O. Index 0 is the primary endpoint, the one the
//! failover policy biases toward.

use serde::Serialize;

use crate::endpoint::Endpoint;

/// One row of the connections snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConnectionEntry {
    pub index: usize,
    pub active: bool,
    pub uri: String,
}

/// Outcome of a `set_active` request.
#[derive(Debug, PartialEq)]
pub enum SetActive {
    /// Requested index already active; nothing changed
    Unchanged,
    /// Active index moved; the caller owes a disconnect
    Switched,
    /// Requested index does not name an endpoint
    OutOfRange,
}

/// Ordered endpoint sequence plus the active cursor and its attempt count.
///
/// Invariant: `active < endpoints.len()` whenever the list is non-empty;
/// every mutation wraps the cursor back to 0 rather than leave it dangling.
#[derive(Default)]
pub struct Registry {
    endpoints: Vec<Endpoint>,
    active: usize,
    attempts: u32,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Consecutive failed connect attempts against the active endpoint.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one more connect attempt against the active endpoint.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }

    /// Append an endpoint to the rotation order.
    pub fn add(&mut self, endpoint: Endpoint) {
        self.endpoints.push(endpoint);
    }

    /// Erase the endpoint at `index`.
    ///
    /// The active cursor tracks its endpoint when a lower index is removed,
    /// and wraps to 0 when its own entry (or the tail it pointed into)
    /// disappears.
    pub fn remove(&mut self, index: usize) -> Result<Endpoint, usize> {
        if index >= self.endpoints.len() {
            return Err(index);
        }
        let removed = self.endpoints.remove(index);
        if self.active > index {
            self.active -= 1;
        } else if self.active == index {
            self.attempts = 0;
            if self.active >= self.endpoints.len() {
                self.active = 0;
            }
        }
        Ok(removed)
    }

    /// Erase the active endpoint, wrapping the cursor if needed.
    pub fn remove_active(&mut self) -> Option<Endpoint> {
        if self.endpoints.is_empty() {
            return None;
        }
        let removed = self.endpoints.remove(self.active);
        self.attempts = 0;
        if self.active >= self.endpoints.len() {
            self.active = 0;
        }
        Some(removed)
    }

    /// Drop every endpoint.
    pub fn clear(&mut self) {
        self.endpoints.clear();
        self.active = 0;
        self.attempts = 0;
    }

    /// Advance the cursor round-robin by insertion order.
    pub fn rotate(&mut self) {
        self.attempts = 0;
        if !self.endpoints.is_empty() {
            self.active = (self.active + 1) % self.endpoints.len();
        }
    }

    /// Move the cursor to `index`.
    pub fn set_active(&mut self, index: usize) -> SetActive {
        if index >= self.endpoints.len() {
            return SetActive::OutOfRange;
        }
        if index == self.active {
            return SetActive::Unchanged;
        }
        self.active = index;
        self.attempts = 0;
        SetActive::Switched
    }

    /// The active endpoint, if any.
    pub fn active(&self) -> Option<&Endpoint> {
        self.endpoints.get(self.active)
    }

    /// Copy of the active endpoint, or the `":0"` sentinel when empty.
    pub fn snapshot_active(&self) -> Endpoint {
        self.active().cloned().unwrap_or_else(Endpoint::null)
    }

    /// Ordered snapshot of every endpoint for the control surface.
    pub fn list(&self) -> Vec<ConnectionEntry> {
        self.endpoints
            .iter()
            .enumerate()
            .map(|(index, ep)| ConnectionEntry {
                index,
                active: index == self.active,
                uri: ep.to_string(),
            })
            .collect()
    }
}
