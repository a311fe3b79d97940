use lock_api::{GuardNoSend, RawMutex};
use std::cell::Cell;

/// Single-threaded stand-in for a raw mutex. Locking twice is a bug in the
/// caller, never a wait.
pub struct RawCellMutex {
    locked: Cell<bool>,
}

unsafe impl RawMutex for RawCellMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawCellMutex {
        locked: Cell::new(false),
    };

    type GuardMarker = GuardNoSend;

    #[inline]
    fn lock(&self) {
        if self.is_locked() {
            deadlock("", "Mutex")
        }
        self.locked.set(true)
    }

    #[inline]
    fn try_lock(&self) -> bool {
        if self.is_locked() {
            false
        } else {
            self.locked.set(true);
            true
        }
    }

    unsafe fn unlock(&self) {
        self.locked.set(false)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.get()
    }
}

#[cold]
#[inline(never)]
fn deadlock(lock_kind: &str, ty: &str) -> ! {
    panic!("deadlock: tried to {lock_kind}lock a Cell{ty} twice")
}
