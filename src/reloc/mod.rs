//! Relocated addresses of the host process.
//!
//! Two families share the same three shapes, a function, a data pointer and
//! a virtual table:
//! * `Offset*` add a fixed offset to the image base, eagerly.
//! * `Hash*` ask the external resolver for a stable 32-bit hash, eagerly or
//!   on first use depending on the context's [`ResolvePolicy`](crate::ResolvePolicy).

mod hash;
mod offset;

pub use hash::{HashFunc, HashPtr, HashVtbl};
pub use offset::{OffsetFunc, OffsetPtr, OffsetVtbl};

/// Reinterprets an address as the function pointer type `F`.
///
/// # Safety
/// `F` must be a function pointer type and `addr` must be non-zero.
#[inline(always)]
pub(crate) unsafe fn addr_to_fn<F: Copy>(addr: usize) -> F {
    const {
        assert!(
            core::mem::size_of::<F>() == core::mem::size_of::<usize>(),
            "relocated functions must be plain function pointers"
        )
    };
    unsafe { core::mem::transmute_copy::<usize, F>(&addr) }
}
