//! Introspection of the module this crate is linked into.
//!
//! The plugin does not know its own file name, so the module is found by
//! asking the loader which image contains a function of this crate.

use crate::{
    error::MetadataUnavailable,
    os::{ModuleHandle, Platform},
};
use core::{
    ffi::{CStr, c_char, c_void},
    panic::AssertUnwindSafe,
    ptr::null,
};
use std::path::PathBuf;

/// The layout the metadata export fills in.
#[repr(C)]
#[derive(Debug)]
pub struct RawPluginInfo {
    /// NUL-terminated UTF-8 name, may be null.
    pub name: *const c_char,
    pub version: u32,
}

/// Signature of the optional metadata export of the current module.
///
/// The `C-unwind` ABI lets a panicking implementation unwind back into
/// [`query_plugin_info`], where it is caught.
pub type QueryFn = unsafe extern "C-unwind" fn(info: *mut RawPluginInfo);

/// Metadata reported by the current module about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: Option<String>,
    pub version: u32,
}

#[inline(never)]
fn anchor() -> usize {
    core::hint::black_box(0)
}

/// Returns the handle and path of the module containing this crate's code.
pub fn current_module<P: Platform + ?Sized>(platform: &P) -> Option<(ModuleHandle, PathBuf)> {
    let addr = anchor as fn() -> usize as *const c_void;
    platform.find_module_owning_address(addr)
}

pub fn current_module_handle<P: Platform + ?Sized>(platform: &P) -> Option<ModuleHandle> {
    current_module(platform).map(|(handle, _)| handle)
}

/// Returns the path on disk of the module containing this crate's code.
pub fn current_module_path<P: Platform + ?Sized>(platform: &P) -> Option<PathBuf> {
    let (handle, path) = current_module(platform)?;
    if path.as_os_str().is_empty() {
        platform.module_path(handle)
    } else {
        Some(path)
    }
}

/// Calls the current module's metadata export, if it has one.
///
/// This runs while a fatal diagnostic is being composed, so nothing here
/// may fail loudly: a missing export and a panicking export are both turned
/// into a [`MetadataUnavailable`] reason.
///
/// # Arguments
/// * `platform` - The platform used for the module and export lookups.
/// * `symbol` - The export name of the metadata function.
pub fn query_plugin_info<P: Platform + ?Sized>(
    platform: &P,
    symbol: &str,
) -> Result<PluginInfo, MetadataUnavailable> {
    let module = current_module_handle(platform).ok_or(MetadataUnavailable::Missing)?;
    let query = platform
        .lookup_export(module, symbol)
        .ok_or(MetadataUnavailable::Missing)?;
    // SAFETY: the metadata contract declares the export with this signature.
    let query = unsafe { core::mem::transmute::<*mut c_void, QueryFn>(query.as_ptr()) };

    let mut raw = RawPluginInfo {
        name: null(),
        version: 0,
    };
    std::panic::catch_unwind(AssertUnwindSafe(|| unsafe { query(&mut raw) }))
        .map_err(|_| MetadataUnavailable::QueryFailed)?;

    let name = (!raw.name.is_null())
        .then(|| unsafe { CStr::from_ptr(raw.name) }.to_string_lossy().into_owned());
    Ok(PluginInfo {
        name,
        version: raw.version,
    })
}
