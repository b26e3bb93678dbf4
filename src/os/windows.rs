use crate::{
    config::ResolvePolicy,
    os::{ModuleHandle, Platform, tls},
};
use core::{
    cell::UnsafeCell,
    ffi::c_void,
    mem::MaybeUninit,
    ptr::{NonNull, null, null_mut},
};
use std::{
    ffi::{CString, OsString},
    os::windows::ffi::OsStringExt,
    path::PathBuf,
};
use windows_sys::Win32::{
    Foundation::{GetLastError, HMODULE, MAX_PATH},
    System::{
        LibraryLoader::{
            GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
            GetModuleFileNameW, GetModuleHandleExW, GetModuleHandleW, GetProcAddress,
        },
        Threading::{
            CRITICAL_SECTION, DeleteCriticalSection, EnterCriticalSection, GetCurrentProcess,
            InitializeCriticalSection, LeaveCriticalSection, SwitchToThread, TerminateProcess,
            TryEnterCriticalSection,
        },
    },
    UI::WindowsAndMessaging::{MB_ICONERROR, MB_OK, MessageBoxW},
};

pub(crate) const RESOLVER_MODULE_NAME: &str = "RED4ext.dll";

pub(crate) const RESOLVE_POLICY: ResolvePolicy = ResolvePolicy::Eager;

/// An implementation of Platform trait on top of the Win32 loader API.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPlatform;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(core::iter::once(0)).collect()
}

fn file_name(module: HMODULE) -> Option<PathBuf> {
    let mut buf = Vec::<u16>::new();
    loop {
        buf.resize(buf.len() + MAX_PATH as usize, 0);
        let len = unsafe { GetModuleFileNameW(module, buf.as_mut_ptr(), buf.len() as u32) };
        if len == 0 {
            return None;
        }
        // A truncated name fills the whole buffer.
        if (len as usize) < buf.len() {
            buf.truncate(len as usize);
            return Some(PathBuf::from(OsString::from_wide(&buf)));
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// Slot 0 of the thread's static TLS array, which belongs to the main
        /// image. `gs:[0x58]` is `ThreadLocalStoragePointer` in the TEB.
        fn main_image_tls_slot() -> Option<NonNull<c_void>> {
            let slots: *const *mut c_void;
            unsafe {
                core::arch::asm!(
                    "mov {}, gs:[0x58]",
                    out(reg) slots,
                    options(nostack, readonly, preserves_flags)
                );
            }
            if slots.is_null() {
                return None;
            }
            NonNull::new(unsafe { *slots })
        }
    } else {
        fn main_image_tls_slot() -> Option<NonNull<c_void>> {
            None
        }
    }
}

impl Platform for DefaultPlatform {
    fn image_base(&self) -> usize {
        unsafe { GetModuleHandleW(null()) as usize }
    }

    fn find_module_by_name(&self, name: &str) -> Option<ModuleHandle> {
        let name = wide(name);
        ModuleHandle::from_raw(unsafe { GetModuleHandleW(name.as_ptr()) })
    }

    fn find_module_owning_address(&self, addr: *const c_void) -> Option<(ModuleHandle, PathBuf)> {
        let mut module: HMODULE = null_mut();
        let ok = unsafe {
            GetModuleHandleExW(
                GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
                addr.cast(),
                &mut module,
            )
        };
        if ok == 0 {
            return None;
        }
        let handle = ModuleHandle::from_raw(module)?;
        Some((handle, file_name(module).unwrap_or_default()))
    }

    fn lookup_export(&self, module: ModuleHandle, symbol: &str) -> Option<NonNull<c_void>> {
        let symbol = CString::new(symbol).ok()?;
        let func = unsafe { GetProcAddress(module.as_ptr(), symbol.as_ptr().cast()) }?;
        NonNull::new(func as *mut c_void)
    }

    fn module_path(&self, module: ModuleHandle) -> Option<PathBuf> {
        file_name(module.as_ptr())
    }

    fn last_error(&self) -> u32 {
        unsafe { GetLastError() }
    }

    fn present_fatal(&self, title: &str, message: &str) {
        let title = wide(title);
        let message = wide(message);
        unsafe {
            MessageBoxW(null_mut(), message.as_ptr(), title.as_ptr(), MB_ICONERROR | MB_OK);
        }
    }

    fn thread_block(&self) -> Option<NonNull<c_void>> {
        tls::registered().or_else(main_image_tls_slot)
    }

    fn terminate(&self, code: u32) -> ! {
        unsafe {
            TerminateProcess(GetCurrentProcess(), code);
        }
        // TerminateProcess on the current process does not return.
        std::process::abort()
    }
}

unsafe extern "C" {
    fn _aligned_malloc(size: usize, alignment: usize) -> *mut c_void;
    fn _aligned_free(block: *mut c_void);
}

/// Allocates `size` bytes aligned to `align`, which must be a power of two.
pub fn aligned_alloc(size: usize, align: usize) -> Option<NonNull<u8>> {
    if !align.is_power_of_two() {
        return None;
    }
    NonNull::new(unsafe { _aligned_malloc(size.max(1), align) }.cast())
}

/// Frees memory returned by [`aligned_alloc`].
///
/// # Safety
/// `ptr` must come from [`aligned_alloc`] and must not be used afterwards.
pub unsafe fn aligned_free(ptr: NonNull<u8>) {
    unsafe { _aligned_free(ptr.as_ptr().cast()) }
}

#[inline]
pub fn yield_thread() {
    unsafe { SwitchToThread() };
}

/// A `CRITICAL_SECTION`, boxed so it never moves after initialization.
pub(crate) struct RawMutex {
    inner: Box<UnsafeCell<CRITICAL_SECTION>>,
}

unsafe impl Send for RawMutex {}
unsafe impl Sync for RawMutex {}

impl RawMutex {
    pub(crate) fn new() -> Self {
        let inner = Box::new(UnsafeCell::new(unsafe {
            MaybeUninit::<CRITICAL_SECTION>::zeroed().assume_init()
        }));
        unsafe { InitializeCriticalSection(inner.get()) };
        Self { inner }
    }

    #[inline]
    pub(crate) fn lock(&self) {
        unsafe { EnterCriticalSection(self.inner.get()) };
    }

    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        unsafe { TryEnterCriticalSection(self.inner.get()) != 0 }
    }

    /// # Safety
    /// The calling thread must hold the lock.
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        unsafe { LeaveCriticalSection(self.inner.get()) };
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        unsafe { DeleteCriticalSection(self.inner.get()) };
    }
}
