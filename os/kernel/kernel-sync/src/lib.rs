//! # Kernel synchronization primitives
//!
//! Busy-waiting locks for short, non-blocking critical sections. Nothing here
//! ever suspends the caller.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod raw_spin;
mod spin_lock;

pub use raw_spin::RawSpin;
pub use spin_lock::{SpinLock, SpinLockGuard};
