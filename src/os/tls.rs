//! The host's per-thread block, as registered by the plugin.

use core::{cell::Cell, ffi::c_void, ptr::NonNull};

std::thread_local! {
    static REGISTERED: Cell<Option<NonNull<c_void>>> = const { Cell::new(None) };
}

/// Returns the block registered for the calling thread. `None` once the
/// thread's locals have been torn down.
pub(crate) fn registered() -> Option<NonNull<c_void>> {
    REGISTERED.try_with(Cell::get).ok().flatten()
}

pub(crate) fn register(block: Option<NonNull<c_void>>) {
    let _ = REGISTERED.try_with(|cell| cell.set(block));
}
