//! [`FgMutex`], the one lock the graph and daemon share.
//!
//! With `threading` it wraps parking_lot's mutex. Without it a cell flag
//! stands in, and taking the lock twice panics instead of blocking.

use lock_api::{Mutex, MutexGuard};

cfg_if::cfg_if! {
    if #[cfg(feature = "threading")] {
        pub use parking_lot::RawMutex;
    } else {
        mod cell_lock;
        pub use cell_lock::RawCellMutex as RawMutex;
    }
}

pub type FgMutex<T> = Mutex<RawMutex, T>;
pub type FgMutexGuard<'a, T> = MutexGuard<'a, RawMutex, T>;
