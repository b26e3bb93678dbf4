use crate::{
    config::ResolvePolicy,
    os::{ModuleHandle, Platform},
};
use core::{
    cell::UnsafeCell,
    ffi::{CStr, c_int, c_void},
    mem::MaybeUninit,
    ptr::{self, NonNull},
};
use std::{
    ffi::{CString, OsStr},
    io::Write,
    os::unix::ffi::OsStrExt,
    path::PathBuf,
};

cfg_if::cfg_if! {
    if #[cfg(target_vendor = "apple")] {
        pub(crate) const RESOLVER_MODULE_NAME: &str = "RED4ext.dylib";
    } else {
        pub(crate) const RESOLVER_MODULE_NAME: &str = "libRED4ext.so";
    }
}

// The resolver module may still be running its own initializers when a
// plugin's statics are built, so hashes are resolved on first use.
pub(crate) const RESOLVE_POLICY: ResolvePolicy = ResolvePolicy::Deferred;

/// An implementation of Platform trait on top of `dlfcn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPlatform;

/// `dlopen` with `RTLD_NOLOAD`: returns the handle of an already loaded
/// module and never loads one. `None` as the name means the main program.
///
/// Each successful call bumps the module's reference count.
fn dlopen_noload(name: Option<&CStr>) -> Option<ModuleHandle> {
    let name = name.map_or(ptr::null(), CStr::as_ptr);
    ModuleHandle::from_raw(unsafe { libc::dlopen(name, libc::RTLD_LAZY | libc::RTLD_NOLOAD) })
}

fn path_from(name: &CStr) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(name.to_bytes()))
}

cfg_if::cfg_if! {
    if #[cfg(target_vendor = "apple")] {
        fn main_image_base() -> usize {
            unsafe { libc::_dyld_get_image_header(0) as usize }
        }

        /// Names of every loaded image, the main program first.
        fn loaded_images() -> Vec<Option<CString>> {
            let count = unsafe { libc::_dyld_image_count() };
            (0..count)
                .map(|idx| {
                    let name = unsafe { libc::_dyld_get_image_name(idx) };
                    (!name.is_null()).then(|| unsafe { CStr::from_ptr(name) }.to_owned())
                })
                .collect()
        }
    } else {
        unsafe extern "C" fn first_image_base(
            info: *mut libc::dl_phdr_info,
            _size: usize,
            data: *mut c_void,
        ) -> c_int {
            let info = unsafe { &*info };
            let lowest = if info.dlpi_phdr.is_null() {
                0
            } else {
                let phdrs =
                    unsafe { core::slice::from_raw_parts(info.dlpi_phdr, info.dlpi_phnum as usize) };
                phdrs
                    .iter()
                    .filter(|phdr| phdr.p_type == elf::abi::PT_LOAD)
                    .map(|phdr| phdr.p_vaddr as usize)
                    .min()
                    .unwrap_or(0)
            };
            unsafe { *data.cast::<usize>() = info.dlpi_addr as usize + lowest };
            // The main program is always reported first.
            1
        }

        fn main_image_base() -> usize {
            let mut base = 0usize;
            unsafe {
                libc::dl_iterate_phdr(Some(first_image_base), (&raw mut base).cast());
            }
            base
        }

        unsafe extern "C" fn collect_image_name(
            info: *mut libc::dl_phdr_info,
            _size: usize,
            data: *mut c_void,
        ) -> c_int {
            let info = unsafe { &*info };
            let names = unsafe { &mut *data.cast::<Vec<Option<CString>>>() };
            // The main program is reported with an empty name.
            let name = (!info.dlpi_name.is_null())
                .then(|| unsafe { CStr::from_ptr(info.dlpi_name) })
                .filter(|name| !name.is_empty())
                .map(CStr::to_owned);
            names.push(name);
            0
        }

        /// Names of every loaded image, `None` for the main program.
        fn loaded_images() -> Vec<Option<CString>> {
            let mut names: Vec<Option<CString>> = Vec::new();
            unsafe {
                libc::dl_iterate_phdr(Some(collect_image_name), (&raw mut names).cast());
            }
            names
        }
    }
}

impl Platform for DefaultPlatform {
    fn image_base(&self) -> usize {
        main_image_base()
    }

    fn find_module_by_name(&self, name: &str) -> Option<ModuleHandle> {
        let name = CString::new(name).ok()?;
        dlopen_noload(Some(&name))
    }

    fn find_module_owning_address(&self, addr: *const c_void) -> Option<(ModuleHandle, PathBuf)> {
        let mut info = MaybeUninit::<libc::Dl_info>::zeroed();
        if unsafe { libc::dladdr(addr, info.as_mut_ptr()) } == 0 {
            return None;
        }
        let info = unsafe { info.assume_init() };
        if info.dli_fname.is_null() {
            return None;
        }
        let fname = unsafe { CStr::from_ptr(info.dli_fname) };
        // The main program is not registered under its path, only under NULL.
        let handle = dlopen_noload(Some(fname)).or_else(|| {
            (info.dli_fbase as usize == main_image_base())
                .then(|| dlopen_noload(None))
                .flatten()
        })?;
        Some((handle, path_from(fname)))
    }

    fn lookup_export(&self, module: ModuleHandle, symbol: &str) -> Option<NonNull<c_void>> {
        let symbol = CString::new(symbol).ok()?;
        NonNull::new(unsafe { libc::dlsym(module.as_ptr(), symbol.as_ptr()) })
    }

    fn module_path(&self, module: ModuleHandle) -> Option<PathBuf> {
        loaded_images().into_iter().find_map(|name| {
            let opened = dlopen_noload(name.as_deref())?;
            unsafe { libc::dlclose(opened.as_ptr()) };
            if opened != module {
                return None;
            }
            match name {
                Some(name) => Some(path_from(&name)),
                None => std::env::current_exe().ok(),
            }
        })
    }

    fn last_error(&self) -> u32 {
        std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(0) as u32
    }

    fn present_fatal(&self, title: &str, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[{title}] {message}");
        let _ = stderr.flush();
    }

    fn terminate(&self, code: u32) -> ! {
        unsafe { libc::_exit(code as c_int) }
    }
}

/// Allocates `size` bytes aligned to `align`, which must be a power of two.
///
/// Alignments smaller than a pointer are rounded up to a pointer.
pub fn aligned_alloc(size: usize, align: usize) -> Option<NonNull<u8>> {
    let align = align.max(core::mem::size_of::<usize>());
    if !align.is_power_of_two() {
        return None;
    }
    let mut ptr = ptr::null_mut();
    if unsafe { libc::posix_memalign(&mut ptr, align, size.max(1)) } != 0 {
        return None;
    }
    NonNull::new(ptr.cast())
}

/// Frees memory returned by [`aligned_alloc`].
///
/// # Safety
/// `ptr` must come from [`aligned_alloc`] and must not be used afterwards.
pub unsafe fn aligned_free(ptr: NonNull<u8>) {
    unsafe { libc::free(ptr.as_ptr().cast()) }
}

#[inline]
pub fn yield_thread() {
    unsafe { libc::sched_yield() };
}

/// A `pthread_mutex_t`, boxed so it never moves after first use.
pub(crate) struct RawMutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

unsafe impl Send for RawMutex {}
unsafe impl Sync for RawMutex {}

impl RawMutex {
    pub(crate) fn new() -> Self {
        Self {
            inner: Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER)),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) {
        let res = unsafe { libc::pthread_mutex_lock(self.inner.get()) };
        debug_assert_eq!(res, 0, "pthread_mutex_lock failed");
    }

    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        unsafe { libc::pthread_mutex_trylock(self.inner.get()) == 0 }
    }

    /// # Safety
    /// The calling thread must hold the lock.
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        unsafe { libc::pthread_mutex_unlock(self.inner.get()) };
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        unsafe { libc::pthread_mutex_destroy(self.inner.get()) };
    }
}
