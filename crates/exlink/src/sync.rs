//! Connection lifecycle synchronizer.
//!
//! The engine drives all streaming I/O on its own threads; the consuming
//! process has nothing to poll and parks on [`DisconnectGate`] instead.
//! The gate is a manual-reset latch: the engine's `on_disconnect` callback
//! signals it, and once signalled it stays signalled — late waiters return
//! immediately.
//!
//! Note the coupling this encodes: `ExchangeClient::disconnect` only
//! issues the native teardown call and does *not* signal the gate itself.
//! Waiters are released when the engine confirms by invoking the
//! disconnect callback.

use std::sync::{Condvar, Mutex, PoisonError};

/// Manual-reset wait latch released by the engine's disconnect callback.
pub(crate) struct DisconnectGate {
    signalled: Mutex<bool>,
    cond: Condvar,
}

impl DisconnectGate {
    pub(crate) fn new() -> Self {
        Self {
            signalled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Release every current and future waiter.
    pub(crate) fn signal(&self) {
        let mut signalled = self
            .signalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *signalled = true;
        self.cond.notify_all();
    }

    /// Block until the gate is signalled. No timeout: a caller relying on
    /// this to return depends on the engine delivering the disconnect
    /// callback.
    pub(crate) fn wait(&self) {
        let mut signalled = self
            .signalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*signalled {
            signalled = self
                .cond
                .wait(signalled)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_signalled(&self) -> bool {
        *self
            .signalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arm the latch between test cases.
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        *self
            .signalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
    }
}
