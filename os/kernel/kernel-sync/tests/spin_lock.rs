use kernel_sync::{RawSpinLock, SpinMutex};
use std::{panic, thread};

#[test]
fn basic_lock_and_raii() {
    let l = SpinMutex::new(0_u32);

    {
        let mut g = l.lock();
        *g = 41;
        assert!(l.is_locked());
    }

    // previous guard drop must have released
    assert!(!l.is_locked());
    {
        let mut g = l.lock();
        *g += 1;
        assert_eq!(*g, 42);
    }
}

#[test]
fn try_lock_semantics() {
    let l = SpinMutex::new(1u8);

    let g1 = l.try_lock();
    assert!(g1.is_some());
    assert_eq!(**g1.as_ref().unwrap(), 1);

    assert!(l.try_lock().is_none());

    drop(g1);
    assert!(l.try_lock().is_some());
}

#[test]
fn with_lock_returns_value_and_unlocks() {
    let l = SpinMutex::new(vec![1u64]);
    let len = l.with_lock(|v| {
        v.push(2);
        v.len()
    });
    assert_eq!(len, 2);
    assert!(!l.is_locked());
    assert_eq!(l.into_inner(), vec![1, 2]);
}

#[test]
fn get_mut_bypasses_the_lock() {
    let mut l = SpinMutex::new(7u16);
    *l.get_mut() += 1;
    assert_eq!(*l.lock(), 8);
}

#[test]
fn raw_lock_excludes_concurrent_holders() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    let threads = 8;
    let iters = 2_000;

    let lock = Arc::new(RawSpinLock::new());
    let in_cs = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let in_cs = Arc::clone(&in_cs);
            let entered = Arc::clone(&entered);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    lock.acquire();
                    let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(prev, 0, "mutual exclusion violated");
                    entered.fetch_add(1, Ordering::Relaxed);
                    in_cs.fetch_sub(1, Ordering::SeqCst);
                    unsafe { lock.release() };
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(entered.load(Ordering::SeqCst), threads * iters);
    assert!(!lock.is_locked());
}

#[test]
fn contended_increments_are_exact() {
    use std::sync::{Arc, Barrier};

    let threads = 8;
    let iters = 5_000;

    let counter = Arc::new(SpinMutex::new(0usize));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let counter = Arc::clone(&counter);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..iters {
                counter.with_lock(|v| *v += 1);
                // yield outside the critical section
                thread::yield_now();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(counter.with_lock(|v| *v), threads * iters);
}

#[test]
fn lock_is_released_on_panic() {
    let l = SpinMutex::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");

    assert_eq!(l.with_lock(|v| *v), 123);
}

#[test]
fn spin_mutex_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let l = SpinMutex::new(0u8);
    takes_sync(&l);
}
