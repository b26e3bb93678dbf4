#![crate_type = "cdylib"]
#![crate_name = "resolver_stub"]
#![allow(non_snake_case)]

use std::sync::atomic::{AtomicUsize, Ordering};

static CALLS: AtomicUsize = AtomicUsize::new(0);

#[unsafe(no_mangle)]
pub extern "C" fn RED4ext_ResolveAddress(hash: u32) -> usize {
    CALLS.fetch_add(1, Ordering::SeqCst);
    match hash {
        0xDEAD_BEEF => 0x1000,
        _ => 0,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn resolver_stub_calls() -> usize {
    CALLS.load(Ordering::SeqCst)
}
