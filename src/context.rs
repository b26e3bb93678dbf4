use crate::{
    Error, Result,
    config::Config,
    error::{MetadataUnavailable, unknown_hash_error},
    fatal::{self, ReportGuard},
    module::{self, PluginInfo},
    os::{DefaultPlatform, Platform},
    resolver::{self, ResolveFn},
};
use core::{
    ffi::c_void,
    ptr::NonNull,
    sync::atomic::{AtomicBool, Ordering},
};
use std::{path::PathBuf, sync::OnceLock};

/// The process-wide context used by relocators that are not given one.
pub static GLOBAL_CONTEXT: Context = Context::new(DefaultPlatform, Config::DEFAULT);

/// Process-wide relocation state: the cached image base, the cached
/// resolver, and the platform they are looked up through.
///
/// Both caches are filled at most once. Concurrent first callers block until
/// the one doing the lookup is done and then all observe the same value.
/// Nothing is ever invalidated.
///
/// A context is meant to live in a `static`. Tests and alternative resolver
/// backends declare their own with a custom [`Platform`] or [`Config`].
pub struct Context<P: Platform = DefaultPlatform> {
    platform: P,
    config: Config,
    image_base: OnceLock<usize>,
    resolver: OnceLock<Result<ResolveFn>>,
    ready: AtomicBool,
    report_guard: ReportGuard,
}

impl Context<DefaultPlatform> {
    #[inline]
    pub fn global() -> &'static Self {
        &GLOBAL_CONTEXT
    }
}

impl<P: Platform> Context<P> {
    pub const fn new(platform: P, config: Config) -> Self {
        Self {
            platform,
            config,
            image_base: OnceLock::new(),
            resolver: OnceLock::new(),
            ready: AtomicBool::new(false),
            report_guard: ReportGuard::new(),
        }
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the load address of the main process image.
    ///
    /// The platform lookup runs exactly once per context.
    pub fn image_base(&self) -> usize {
        *self.image_base.get_or_init(|| {
            let base = self.platform.image_base();
            #[cfg(feature = "log")]
            log::debug!("Image base: {:#x}", base);
            base
        })
    }

    /// Returns the resolver function, locating it on first use.
    ///
    /// The outcome of the first lookup is cached, failure included: a
    /// missing module or symbol is never looked up a second time.
    pub fn resolver(&self) -> Result<ResolveFn> {
        self.resolver
            .get_or_init(|| resolver::locate(&self.platform, &self.config))
            .clone()
    }

    /// Resolves `hash` to an address.
    ///
    /// # Returns
    /// * `Ok(address)` - The resolver knows the hash.
    /// * `Err(Error::UnknownHash)` - The resolver returned 0.
    /// * Any error from [`Context::resolver`].
    pub fn resolve(&self, hash: u32) -> Result<usize> {
        let resolve = self.resolver()?;
        match unsafe { resolve(hash) } {
            0 => Err(unknown_hash_error(hash)),
            address => {
                #[cfg(feature = "log")]
                log::trace!("Resolved hash {:#010x} to {:#x}", hash, address);
                Ok(address)
            }
        }
    }

    /// Marks the point after which the host is fully initialized.
    ///
    /// From then on a deferred relocator whose hash is unknown terminates the
    /// process on access instead of yielding a default value.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns the host's per-thread block for the calling thread.
    ///
    /// On Windows x64 it is read from the main image's static TLS slot unless
    /// a block was registered. Elsewhere only a registered block is known.
    #[inline]
    pub fn thread_block(&self) -> Option<NonNull<c_void>> {
        self.platform.thread_block()
    }

    /// Registers the host's per-thread block for the calling thread.
    pub fn set_thread_block(&self, block: Option<NonNull<c_void>>) {
        self.platform.set_thread_block(block)
    }

    pub fn current_module_path(&self) -> Option<PathBuf> {
        module::current_module_path(&self.platform)
    }

    /// Runs the current module's metadata export, see
    /// [`query_plugin_info`](crate::module::query_plugin_info).
    pub fn query_plugin_info(&self) -> core::result::Result<PluginInfo, MetadataUnavailable> {
        module::query_plugin_info(&self.platform, self.config.metadata_symbol)
    }

    /// Shows a fatal diagnostic and terminates the process.
    ///
    /// # Arguments
    /// * `message` - The operator-facing description of the failure.
    /// * `code` - The platform error code, 0 if none applies.
    /// * `query_metadata` - Whether to ask the current module for its name and version.
    #[cold]
    pub fn fail(&self, message: &str, code: u32, query_metadata: bool) -> ! {
        fatal::report(
            &self.platform,
            &self.config,
            &self.report_guard,
            message,
            code,
            query_metadata,
        )
    }

    /// [`Context::fail`] for a relocation [`Error`].
    #[cold]
    pub fn fail_with(&self, err: &Error) -> ! {
        self.fail(&err.guidance(), err.code(), true)
    }
}
