//! # Kernel synchronization primitives
//!
//! A test-and-set spin lock ([`RawSpinLock`]) and a data-carrying wrapper
//! ([`SpinMutex`]) for the short critical sections of the memory core, such as
//! the physical page pool's push and pop.
//!
//! Neither primitive is fair, and neither masks interrupts. A lock taken from
//! an interrupt handler must never be held by the code it interrupts.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod mutex;
mod raw_spin;

pub use mutex::{SpinMutex, SpinMutexGuard};
pub use raw_spin::RawSpinLock;
