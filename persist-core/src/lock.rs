//! Process-wide persistence lock.
//!
//! Every save, load and delete performed by any [`FileEngine`](crate::FileEngine)
//! in the process runs while holding this one lock. Operations on unrelated
//! files, engines and codecs therefore never overlap.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

static PERSIST_LOCK: Lazy<PersistLock> = Lazy::new(|| PersistLock {
    mutex: Mutex::new(()),
});

/// The shared lock guarding all persistence I/O.
#[derive(Debug)]
pub struct PersistLock {
    mutex: Mutex<()>,
}

/// Held for the duration of one persistence operation; released on drop.
#[derive(Debug)]
pub struct PersistGuard {
    _guard: MutexGuard<'static, ()>,
    waited: Duration,
}

impl PersistGuard {
    /// Time spent waiting for the lock.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl PersistLock {
    pub fn global() -> &'static PersistLock {
        &PERSIST_LOCK
    }

    /// Block until the process-wide lock is free and take it.
    ///
    /// A lock poisoned by a panic in another thread is taken over; the
    /// guarded data is `()` so there is no state to repair.
    pub fn acquire() -> PersistGuard {
        let started = Instant::now();
        let guard = Self::global()
            .mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        PersistGuard {
            _guard: guard,
            waited: started.elapsed(),
        }
    }
}
