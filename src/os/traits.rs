use super::tls;
use core::{ffi::c_void, ptr::NonNull};
use std::path::PathBuf;

/// An opaque handle to a module (executable or shared library) loaded in the
/// current process.
///
/// On Windows this is an `HMODULE`, on unix the handle returned by `dlopen`.
/// The handle is only a token: it does not keep the module loaded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ModuleHandle(NonNull<c_void>);

// SAFETY: module handles are process-wide values that are never dereferenced
// by this crate.
unsafe impl Send for ModuleHandle {}
unsafe impl Sync for ModuleHandle {}

impl ModuleHandle {
    /// Wraps a raw module handle, returning `None` for null.
    #[inline]
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(ModuleHandle)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// The per-OS primitives the relocation subsystem is written against.
///
/// Everything above this trait is platform independent. One implementation
/// exists per target OS family ([`DefaultPlatform`](crate::os::DefaultPlatform));
/// tests provide their own to observe and script lookups.
///
/// Lookups report failure with `None`. Apart from [`Platform::terminate`], an
/// implementation must never end the process on its own.
///
/// # Example
/// ```rust,ignore
/// struct MyPlatform;
///
/// impl Platform for MyPlatform {
///     fn image_base(&self) -> usize {
///         // Platform-specific implementation
///         todo!()
///     }
///
///     // Implement other required methods...
/// }
/// ```
pub trait Platform: Send + Sync + 'static {
    /// Returns the load address of the main process image.
    fn image_base(&self) -> usize;

    /// Finds a module that is already loaded, by its file name.
    ///
    /// # Arguments
    /// * `name` - The module's file name, e.g. `foo.dll` or `libfoo.so`.
    ///
    /// # Returns
    /// * `Some(handle)` - The module is loaded.
    /// * `None` - No loaded module has that name. It is never loaded as a side effect.
    fn find_module_by_name(&self, name: &str) -> Option<ModuleHandle>;

    /// Finds the loaded module whose image contains `addr`.
    ///
    /// # Returns
    /// The module's handle together with its path on disk.
    fn find_module_owning_address(&self, addr: *const c_void) -> Option<(ModuleHandle, PathBuf)>;

    /// Looks up an exported symbol of a loaded module.
    ///
    /// # Arguments
    /// * `module` - The module to search.
    /// * `symbol` - The export name.
    fn lookup_export(&self, module: ModuleHandle, symbol: &str) -> Option<NonNull<c_void>>;

    /// Returns the path on disk of a loaded module.
    fn module_path(&self, module: ModuleHandle) -> Option<PathBuf>;

    /// Returns the last platform error code of the calling thread
    /// (`GetLastError` or `errno`).
    fn last_error(&self) -> u32;

    /// Shows a fatal diagnostic to the operator: a modal dialog where a
    /// display is available, a line on the standard error stream otherwise.
    fn present_fatal(&self, title: &str, message: &str);

    /// Ends the process immediately with `code`, without running exit
    /// handlers.
    fn terminate(&self, code: u32) -> !;

    /// Returns the host's per-thread block for the calling thread, `None`
    /// when it cannot be found.
    ///
    /// The default returns the block registered with
    /// [`Platform::set_thread_block`] on this thread.
    fn thread_block(&self) -> Option<NonNull<c_void>> {
        tls::registered()
    }

    /// Registers the host's per-thread block for the calling thread, usually
    /// from a hook on the host's thread setup. A registered block takes
    /// precedence over any platform discovery.
    fn set_thread_block(&self, block: Option<NonNull<c_void>>) {
        tls::register(block)
    }
}
