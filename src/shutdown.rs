use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

/// Cancellation token shared between a running [`crate::Pinger`] and whoever
/// wants to stop it.
///
/// Stopping is single-shot: once requested it stays requested, and requesting
/// it again has no further effect.
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle {
    condition: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Returns `true` for the first request only.
    pub fn shutdown(&self) -> bool {
        let (lock, cvar) = &*self.condition;
        let mut should_stop = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let first = !*should_stop;
        *should_stop = true;
        cvar.notify_all();
        first
    }

    pub fn is_shutdown(&self) -> bool {
        let (lock, _) = &*self.condition;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps until `deadline` unless shutdown is requested first.
    /// Returns whether shutdown was requested.
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        let (lock, cvar) = &*self.condition;
        let mut should_stop = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *should_stop {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            should_stop = cvar.wait_timeout(should_stop, deadline - now).unwrap_or_else(PoisonError::into_inner).0;
        }
    }
}
