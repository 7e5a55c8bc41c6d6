use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// A bare test-and-set spin lock without associated data.
///
/// Waiters are not queued: whichever context wins the next atomic swap after
/// [`release`](Self::release) takes the lock. Critical sections guarded by a
/// `RawSpinLock` must be short and must not block.
pub struct RawSpinLock {
    /// * `false`: free
    /// * `true`: held
    locked: AtomicBool,
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpinLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Spin until the lock was observed free by our own swap.
    #[inline]
    pub fn acquire(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            // Wait on a plain load so contended waiters don't bounce the line.
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Take the lock if it is free; never spins.
    #[inline]
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }

    /// Clear the lock and publish the critical section to the next holder.
    ///
    /// # Safety
    /// The caller must be the current holder.
    #[inline]
    pub unsafe fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Snapshot of the lock state; stale as soon as it returns.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let l = RawSpinLock::new();
        assert!(!l.is_locked());
        l.acquire();
        assert!(l.is_locked());
        assert!(!l.try_acquire());
        unsafe { l.release() };
        assert!(!l.is_locked());
        assert!(l.try_acquire());
        unsafe { l.release() };
    }
}
