use crate::os::{AtomicU8, exchange8, yield_thread};
use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::Ordering,
};

const FREE: u8 = 0;
const HELD: u8 = 1;

/// Failed attempts spent busy-waiting before every further attempt yields
/// the thread.
const SPIN_LIMIT: u32 = 16;

/// A busy-wait lock over a single byte of state.
///
/// Meant for critical sections a few instructions long. Neither fair nor
/// reentrant. The thread is never parked: after 16 failed attempts it yields
/// the processor between attempts.
pub struct SpinLock<T: ?Sized = ()> {
    state: AtomicU8,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

/// Scoped ownership of a [`SpinLock`].
///
/// Sharing the guard shares `&T`, so it is only `Sync` when `T` is:
///
/// ```compile_fail
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<host_reloc::sync::SpinGuard<'static, core::cell::Cell<u8>>>();
/// ```
#[must_use = "if unused the SpinLock will immediately unlock"]
pub struct SpinGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
    _marker: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinGuard<'_, T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU8::new(FREE),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Swaps the state to held. Succeeds iff the lock was free before.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        (exchange8(&self.state, HELD) == FREE).then(|| SpinGuard {
            lock: self,
            _marker: PhantomData,
        })
    }

    pub fn lock(&self) -> SpinGuard<'_, T> {
        self.lock_with(yield_thread)
    }

    fn lock_with(&self, mut yield_now: impl FnMut()) -> SpinGuard<'_, T> {
        let mut attempts = 0u32;
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            if attempts >= SPIN_LIMIT {
                yield_now();
            } else {
                attempts += 1;
                core::hint::spin_loop();
            }
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) == HELD
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> Deref for SpinGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        exchange8(&self.lock.state, FREE);
    }
}
