//! Locks for the short critical sections around one-time initialization.

mod mutex;
mod spin;

pub use mutex::{Mutex, MutexGuard};
pub use spin::{SpinGuard, SpinLock};
