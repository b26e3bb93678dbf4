use super::addr_to_fn;
use crate::{
    Context, Error, GLOBAL_CONTEXT, ResolvePolicy, Result,
    error::unknown_hash_error,
    os::{AtomicUsize, DefaultPlatform, Platform, compare_exchange_usize},
};
use core::{marker::PhantomData, ptr::NonNull, sync::atomic::Ordering};

// Stored until the resolver has been asked. A resolver answer of 0 is cached
// like any other address, so an unknown hash is only looked up once.
const UNRESOLVED: usize = usize::MAX;

/// The state shared by every hash relocator: unresolved, or resolved to an
/// address (0 when the resolver did not know the hash).
///
/// The transition happens through one compare-exchange. Threads racing on
/// first access may all call the resolver. They compute the same value, and
/// the losers adopt the value stored by the winner.
struct HashSlot<P: Platform> {
    ctx: &'static Context<P>,
    hash: u32,
    address: AtomicUsize,
}

impl<P: Platform> HashSlot<P> {
    const fn deferred(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            ctx,
            hash,
            address: AtomicUsize::new(UNRESOLVED),
        }
    }

    fn resolved(ctx: &'static Context<P>, hash: u32, address: usize) -> Self {
        Self {
            ctx,
            hash,
            address: AtomicUsize::new(address),
        }
    }

    /// Applies the context's policy, terminating the process if an eager
    /// resolution fails.
    fn new(ctx: &'static Context<P>, hash: u32) -> Self {
        Self::try_new(ctx, hash).unwrap_or_else(|err| ctx.fail_with(&err))
    }

    fn try_new(ctx: &'static Context<P>, hash: u32) -> Result<Self> {
        match ctx.config().policy() {
            ResolvePolicy::Eager => Ok(Self::resolved(ctx, hash, ctx.resolve(hash)?)),
            ResolvePolicy::Deferred => Ok(Self::deferred(ctx, hash)),
        }
    }

    /// Returns the cached address, asking the resolver the first time.
    fn try_address(&self) -> Result<usize> {
        let mut address = self.address.load(Ordering::Acquire);
        if address == UNRESOLVED {
            let resolve = self.ctx.resolver()?;
            let found = unsafe { resolve(self.hash) };
            #[cfg(feature = "log")]
            {
                if found == 0 {
                    log::warn!("Resolver does not know hash {:#010x}", self.hash);
                } else {
                    log::trace!("Resolved hash {:#010x} to {:#x}", self.hash, found);
                }
            }
            address = match compare_exchange_usize(&self.address, UNRESOLVED, found) {
                UNRESOLVED => found,
                winner => winner,
            };
        }
        if address == 0 {
            return Err(unknown_hash_error(self.hash));
        }
        Ok(address)
    }

    /// Returns the address, or 0 for an unknown hash before the context is
    /// ready. Every other failure is fatal.
    fn address(&self) -> usize {
        match self.try_address() {
            Ok(address) => address,
            Err(Error::UnknownHash { .. }) if !self.ctx.is_ready() => 0,
            Err(err) => self.ctx.fail_with(&err),
        }
    }

    /// Like [`HashSlot::address`] but never fatal for an unknown hash.
    fn is_valid(&self) -> bool {
        match self.try_address() {
            Ok(_) => true,
            Err(Error::UnknownHash { .. }) => false,
            Err(err) => self.ctx.fail_with(&err),
        }
    }
}

/// Represent a native function of the host, use this to relocate its address
/// at runtime through the resolver.
///
/// `F` is the function pointer type, e.g. `unsafe extern "C" fn(i32) -> i32`.
pub struct HashFunc<F, P: Platform = DefaultPlatform> {
    slot: HashSlot<P>,
    _marker: PhantomData<F>,
}

impl<F: Copy> HashFunc<F> {
    /// Declares a function resolved through the global context.
    ///
    /// # Safety
    /// The function the resolver returns for `hash` must have type `F`.
    pub unsafe fn new(hash: u32) -> Self {
        unsafe { Self::with_context(&GLOBAL_CONTEXT, hash) }
    }
}

impl<F: Copy, P: Platform> HashFunc<F, P> {
    /// Declares a function resolved through `ctx`, following its policy.
    ///
    /// With [`ResolvePolicy::Eager`] any failure terminates the process.
    ///
    /// # Safety
    /// The function the resolver returns for `hash` must have type `F`.
    pub unsafe fn with_context(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            slot: HashSlot::new(ctx, hash),
            _marker: PhantomData,
        }
    }

    /// Like [`HashFunc::with_context`], returning the eager failure instead
    /// of terminating.
    ///
    /// # Safety
    /// See [`HashFunc::with_context`].
    pub unsafe fn try_with_context(ctx: &'static Context<P>, hash: u32) -> Result<Self> {
        Ok(Self {
            slot: HashSlot::try_new(ctx, hash)?,
            _marker: PhantomData,
        })
    }

    /// Declares a function resolved on first use whatever the policy.
    /// Usable in `static` items.
    ///
    /// # Safety
    /// See [`HashFunc::with_context`].
    pub const unsafe fn deferred(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            slot: HashSlot::deferred(ctx, hash),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.slot.hash
    }

    /// Returns the function, `None` if the resolver does not know the hash.
    #[inline]
    pub fn get(&self) -> Option<F> {
        match self.slot.address() {
            0 => None,
            address => Some(unsafe { addr_to_fn(address) }),
        }
    }

    pub fn try_get(&self) -> Result<F> {
        self.slot
            .try_address()
            .map(|address| unsafe { addr_to_fn(address) })
    }

    /// Resolves if needed and reports whether the resolver knew the hash.
    pub fn is_valid(&self) -> bool {
        self.slot.is_valid()
    }
}

/// Represent a native pointer into the host, use this to relocate its
/// address at runtime through the resolver.
pub struct HashPtr<T, P: Platform = DefaultPlatform> {
    slot: HashSlot<P>,
    _marker: PhantomData<fn() -> *mut T>,
}

impl<T> HashPtr<T> {
    /// Declares a pointer resolved through the global context.
    pub fn new(hash: u32) -> Self {
        Self::with_context(&GLOBAL_CONTEXT, hash)
    }
}

impl<T, P: Platform> HashPtr<T, P> {
    pub fn with_context(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            slot: HashSlot::new(ctx, hash),
            _marker: PhantomData,
        }
    }

    pub fn try_with_context(ctx: &'static Context<P>, hash: u32) -> Result<Self> {
        Ok(Self {
            slot: HashSlot::try_new(ctx, hash)?,
            _marker: PhantomData,
        })
    }

    pub const fn deferred(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            slot: HashSlot::deferred(ctx, hash),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.slot.hash
    }

    /// Returns the address, null if the resolver does not know the hash.
    #[inline]
    pub fn addr(&self) -> *mut T {
        self.slot.address() as *mut T
    }

    pub fn try_addr(&self) -> Result<NonNull<T>> {
        self.slot
            .try_address()
            .map(|address| unsafe { NonNull::new_unchecked(address as *mut T) })
    }

    /// Reads the pointed-to value, or returns `T::default()` if the resolver
    /// does not know the hash.
    ///
    /// # Safety
    /// A non-null address must point to a live, initialized `T`.
    pub unsafe fn read(&self) -> T
    where
        T: Copy + Default,
    {
        let ptr = self.addr();
        if ptr.is_null() {
            return T::default();
        }
        unsafe { ptr.read() }
    }

    pub fn is_valid(&self) -> bool {
        self.slot.is_valid()
    }
}

/// Represent a native virtual table of the host, use this to relocate its
/// address at runtime through the resolver.
pub struct HashVtbl<P: Platform = DefaultPlatform> {
    slot: HashSlot<P>,
}

impl HashVtbl {
    /// Declares a virtual table resolved through the global context.
    pub fn new(hash: u32) -> Self {
        Self::with_context(&GLOBAL_CONTEXT, hash)
    }
}

impl<P: Platform> HashVtbl<P> {
    pub fn with_context(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            slot: HashSlot::new(ctx, hash),
        }
    }

    pub fn try_with_context(ctx: &'static Context<P>, hash: u32) -> Result<Self> {
        Ok(Self {
            slot: HashSlot::try_new(ctx, hash)?,
        })
    }

    pub const fn deferred(ctx: &'static Context<P>, hash: u32) -> Self {
        Self {
            slot: HashSlot::deferred(ctx, hash),
        }
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.slot.hash
    }

    /// Returns the base of the table, null if the resolver does not know the
    /// hash.
    #[inline]
    pub fn as_ptr(&self) -> *const usize {
        self.slot.address() as *const usize
    }

    pub fn try_as_ptr(&self) -> Result<NonNull<usize>> {
        self.slot
            .try_address()
            .map(|address| unsafe { NonNull::new_unchecked(address as *mut usize) })
    }

    /// Reads the `index`-th slot of the table, `None` if the resolver does
    /// not know the hash.
    ///
    /// # Safety
    /// The table must have more than `index` slots.
    pub unsafe fn entry(&self, index: usize) -> Option<usize> {
        let base = self.as_ptr();
        (!base.is_null()).then(|| unsafe { base.add(index).read() })
    }

    pub fn is_valid(&self) -> bool {
        self.slot.is_valid()
    }
}
