use super::addr_to_fn;
use crate::{Context, os::Platform};
use core::marker::PhantomData;

/// Represent a native function of the host, use this to relocate its address
/// at runtime from its offset to the image base.
///
/// `F` is the function pointer type, e.g. `unsafe extern "C" fn(i32) -> i32`.
pub struct OffsetFunc<F> {
    address: usize,
    _marker: PhantomData<F>,
}

impl<F: Copy> OffsetFunc<F> {
    /// Relocates `offset` against the global context.
    ///
    /// # Safety
    /// `image_base + offset` must be the entry of a function of type `F`.
    /// The offset is not validated.
    pub unsafe fn new(offset: usize) -> Self {
        unsafe { Self::with_context(Context::global(), offset) }
    }

    /// # Safety
    /// See [`OffsetFunc::new`].
    pub unsafe fn with_context<P: Platform>(ctx: &Context<P>, offset: usize) -> Self {
        Self {
            address: ctx.image_base().wrapping_add(offset),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self) -> F {
        unsafe { addr_to_fn(self.address) }
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.address
    }
}

/// Represent a native pointer into the host, use this to relocate its
/// address at runtime from its offset to the image base.
pub struct OffsetPtr<T> {
    address: usize,
    _marker: PhantomData<fn() -> *mut T>,
}

impl<T> OffsetPtr<T> {
    /// Relocates `offset` against the global context.
    pub fn new(offset: usize) -> Self {
        Self::with_context(Context::global(), offset)
    }

    pub fn with_context<P: Platform>(ctx: &Context<P>, offset: usize) -> Self {
        Self {
            address: ctx.image_base().wrapping_add(offset),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn addr(&self) -> *mut T {
        self.address as *mut T
    }

    /// Reads the pointed-to value.
    ///
    /// # Safety
    /// The address must point to a live, initialized `T`.
    #[inline]
    pub unsafe fn read(&self) -> T
    where
        T: Copy,
    {
        unsafe { self.addr().read() }
    }

    /// # Safety
    /// The address must point to a live, initialized `T` that is not mutated
    /// for the lifetime of the reference.
    #[inline]
    pub unsafe fn as_ref(&self) -> &T {
        unsafe { &*self.addr() }
    }
}

/// Represent a native virtual table of the host, use this to relocate its
/// address at runtime from its offset to the image base.
pub struct OffsetVtbl {
    address: usize,
}

impl OffsetVtbl {
    /// Relocates `offset` against the global context.
    pub fn new(offset: usize) -> Self {
        Self::with_context(Context::global(), offset)
    }

    pub fn with_context<P: Platform>(ctx: &Context<P>, offset: usize) -> Self {
        Self {
            address: ctx.image_base().wrapping_add(offset),
        }
    }

    /// Returns the base of the table.
    #[inline]
    pub fn as_ptr(&self) -> *const usize {
        self.address as *const usize
    }

    /// Reads the `index`-th slot of the table.
    ///
    /// # Safety
    /// The table must have more than `index` slots.
    #[inline]
    pub unsafe fn entry(&self, index: usize) -> usize {
        unsafe { self.as_ptr().add(index).read() }
    }
}
