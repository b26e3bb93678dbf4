//! Platform shim
//!
//! Module and symbol lookup, the host's per-thread block, aligned
//! allocation, native locks, thread yield and the atomic helpers every other module is written against. This is the
//! only place in the crate that contains OS-conditional code.

mod atomic;
mod tls;
mod traits;

pub use atomic::*;
pub use traits::{ModuleHandle, Platform};

cfg_if::cfg_if! {
    if #[cfg(windows)]{
        pub(crate) mod windows;
        pub use windows::{DefaultPlatform, aligned_alloc, aligned_free, yield_thread};
        pub(crate) use windows::{RawMutex, RESOLVER_MODULE_NAME, RESOLVE_POLICY};
    }else if #[cfg(unix)]{
        pub(crate) mod unix;
        pub use unix::{DefaultPlatform, aligned_alloc, aligned_free, yield_thread};
        pub(crate) use unix::{RawMutex, RESOLVER_MODULE_NAME, RESOLVE_POLICY};
    }else {
        compile_error!("unsupported os: host_reloc needs windows or a unix with dlfcn");
    }
}
