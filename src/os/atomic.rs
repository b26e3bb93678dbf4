//! Interlocked-style atomic helpers.
//!
//! Every operation is sequentially consistent and returns the value that was
//! stored before the operation, which is what the Windows `Interlocked*`
//! family does. With the `portable-atomic` feature the atomic types come from
//! `portable-atomic`, for targets without native 8 or 64-bit compare-exchange.

use core::sync::atomic::Ordering::SeqCst;

#[cfg(not(feature = "portable-atomic"))]
pub use core::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, AtomicUsize};
#[cfg(feature = "portable-atomic")]
pub use portable_atomic::{AtomicU8, AtomicU32, AtomicU64, AtomicUsize};

macro_rules! interlocked {
    ($exchange:ident, $compare_exchange:ident, $atomic:ty, $int:ty) => {
        /// Stores `value` and returns the previous value.
        #[inline]
        pub fn $exchange(target: &$atomic, value: $int) -> $int {
            target.swap(value, SeqCst)
        }

        /// Stores `new` if the current value is `current`. Returns the value
        /// observed before the operation, so the exchange happened iff the
        /// result equals `current`.
        #[inline]
        pub fn $compare_exchange(target: &$atomic, current: $int, new: $int) -> $int {
            match target.compare_exchange(current, new, SeqCst, SeqCst) {
                Ok(prev) | Err(prev) => prev,
            }
        }
    };
}

interlocked!(exchange8, compare_exchange8, AtomicU8, u8);
interlocked!(exchange32, compare_exchange32, AtomicU32, u32);
interlocked!(exchange64, compare_exchange64, AtomicU64, u64);
interlocked!(exchange_usize, compare_exchange_usize, AtomicUsize, usize);
