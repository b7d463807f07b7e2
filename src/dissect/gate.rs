//! Single-slot lock around the dissection client.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

use super::DissectionClient;
use crate::error::{DissectError, Result};

/// How long [`DissectionGate::acquire`] waits before giving up.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutual exclusion around a non-reentrant [`DissectionClient`].
///
/// Holding a [`GateGuard`] is the only way to reach the client. The guard
/// releases the gate when dropped, including during unwinding, and the lock
/// does not poison.
pub struct DissectionGate<C> {
    client: Mutex<C>,
    timeout: Option<Duration>,
    timeouts: AtomicU64,
}

impl<C: DissectionClient> DissectionGate<C> {
    /// Wrap a client with the default acquisition timeout.
    pub fn new(client: C) -> Self {
        Self::with_timeout(client, Some(DEFAULT_GATE_TIMEOUT))
    }

    /// Wrap a client; `None` waits indefinitely.
    pub fn with_timeout(client: C, timeout: Option<Duration>) -> Self {
        Self {
            client: Mutex::new(client),
            timeout,
            timeouts: AtomicU64::new(0),
        }
    }

    /// Configured acquisition timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Acquire the gate, failing with `GateTimeout` after the configured wait.
    pub fn acquire(&self) -> Result<GateGuard<'_, C>> {
        let guard = match self.timeout {
            Some(timeout) => self.client.try_lock_for(timeout).ok_or_else(|| {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(?timeout, "dissection gate acquisition timed out");
                DissectError::GateTimeout { waited: timeout }
            })?,
            None => self.client.lock(),
        };
        Ok(GateGuard { guard })
    }

    /// Acquire the gate only if it is free right now.
    pub fn try_acquire(&self) -> Option<GateGuard<'_, C>> {
        self.client.try_lock().map(|guard| GateGuard { guard })
    }

    /// Whether some thread currently holds the gate.
    pub fn is_held(&self) -> bool {
        self.client.is_locked()
    }

    /// Number of acquisitions that timed out.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Consume the gate and return the client.
    pub fn into_inner(self) -> C {
        self.client.into_inner()
    }
}

/// Proof of holding the dissection gate; derefs to the client.
pub struct GateGuard<'a, C> {
    guard: MutexGuard<'a, C>,
}

impl<C> Deref for GateGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}

impl<C> DerefMut for GateGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.guard
    }
}
