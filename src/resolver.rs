//! Locating the external address resolver.

use crate::{
    Result,
    config::Config,
    error::{missing_module_error, missing_symbol_error},
    os::Platform,
};

/// The resolver contract: maps a stable hash to a live address in the
/// current process, or returns 0 when the hash is not known.
pub type ResolveFn = unsafe extern "C" fn(hash: u32) -> usize;

/// Finds the resolver function described by `config`.
///
/// The steps run in order and stop at the first failure:
/// 1. A configured override is returned as is, no module is looked up.
/// 2. The resolver module must already be loaded.
/// 3. It must export the resolver symbol.
///
/// The platform error code is captured right after the failing lookup.
pub(crate) fn locate<P: Platform + ?Sized>(platform: &P, config: &Config) -> Result<ResolveFn> {
    if let Some(resolve) = config.resolver_override {
        #[cfg(feature = "log")]
        log::debug!("Using the configured resolver override");
        return Ok(resolve);
    }

    let module = platform
        .find_module_by_name(config.resolver_module)
        .ok_or_else(|| missing_module_error(config.resolver_module, platform.last_error()))?;

    let func = platform
        .lookup_export(module, config.resolver_symbol)
        .ok_or_else(|| missing_symbol_error(config.resolver_symbol, platform.last_error()))?;

    #[cfg(feature = "log")]
    log::debug!(
        "Found resolver [{}] in [{}] at {:p}",
        config.resolver_symbol,
        config.resolver_module,
        func
    );

    // SAFETY: the export is declared by the resolver contract to have the
    // `ResolveFn` signature.
    Ok(unsafe { core::mem::transmute::<*mut core::ffi::c_void, ResolveFn>(func.as_ptr()) })
}
