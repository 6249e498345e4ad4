//! Counting wake signal and the crate's lock helper

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

/// How long a debug build waits on a lock before treating it as a bug
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Acquire a short-lived lock.
///
/// Critical sections in this crate never do real work, so a lock that stays
/// unavailable for `LOCK_TIMEOUT` means a logic error. Debug builds panic
/// there; release builds just block.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    #[cfg(debug_assertions)]
    {
        match mutex.try_lock_for(LOCK_TIMEOUT) {
            Some(guard) => guard,
            None => panic!("lock not acquired within {:?}", LOCK_TIMEOUT),
        }
    }
    #[cfg(not(debug_assertions))]
    {
        mutex.lock()
    }
}

/// Counting semaphore: each `post` releases one `wait`
#[derive(Debug, Default)]
pub struct WakeSignal {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` permits and wake up to `n` waiters
    pub fn post(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = lock(&self.permits);
        *permits += n;
        drop(permits);
        if n == 1 {
            self.cond.notify_one();
        } else {
            self.cond.notify_all();
        }
    }

    /// Block until a permit is available, then take it
    pub fn wait(&self) {
        let mut permits = lock(&self.permits);
        while *permits == 0 {
            self.cond.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Permits posted but not yet taken
    pub fn permits(&self) -> usize {
        *lock(&self.permits)
    }
}
