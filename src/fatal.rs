//! Fatal diagnostics.
//!
//! Composing the diagnostic is kept apart from presenting it and ending the
//! process, so the text can be checked without terminating anything.

use crate::{
    config::Config,
    error::MetadataUnavailable,
    module::{current_module_path, query_plugin_info},
    os::{AtomicU8, AtomicUsize, Platform, compare_exchange_usize, exchange8, yield_thread},
};
use core::{fmt::Display, sync::atomic::Ordering};
use std::path::PathBuf;

const SEPARATOR: &str = "-----------------------------";

/// Version line of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Known(u32),
    Unavailable(MetadataUnavailable),
}

impl Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Version::Known(version) => write!(f, "{version}"),
            Version::Unavailable(reason) => write!(f, "{reason}"),
        }
    }
}

/// Everything shown to the operator before the process is terminated.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    /// Platform error code (`GetLastError` or `errno`), 0 if none applies.
    pub code: u32,
    pub plugin: String,
    pub version: Version,
    pub path: PathBuf,
}

impl Diagnostic {
    /// Gathers the diagnostic for `message`.
    ///
    /// The plugin name is the stem of the current module's file name, or the
    /// name reported by the metadata export when that query is enabled and
    /// succeeds. Nothing in here resolves addresses.
    pub fn collect<P: Platform + ?Sized>(
        platform: &P,
        config: &Config,
        message: &str,
        code: u32,
        query_metadata: bool,
    ) -> Self {
        let path = current_module_path(platform).unwrap_or_default();
        let mut plugin = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".into());

        let version = if query_metadata {
            match query_plugin_info(platform, config.metadata_symbol) {
                Ok(info) => {
                    if let Some(name) = info.name {
                        plugin = name;
                    }
                    Version::Known(info.version)
                }
                Err(reason) => Version::Unavailable(reason),
            }
        } else {
            Version::Unavailable(MetadataUnavailable::Disabled)
        };

        Self {
            message: message.into(),
            code,
            plugin,
            version,
            path,
        }
    }

    pub fn title(&self) -> String {
        format!("{}: Address Resolver", self.plugin)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(
            f,
            "The mod has encountered a critical error while trying to resolve an address hash and \
             needs to terminate the game's process to prevent unexpected behavior in the game."
        )?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(
            f,
            "Here is some debug information that may help resolve or report the issue:"
        )?;
        writeln!(f, "    - Error Code (Platform): {}", self.code)?;
        writeln!(f, "    - Plugin: {}", self.plugin)?;
        writeln!(f, "    - Version: {}", self.version)?;
        write!(f, "    - Path: {}", self.path.display())
    }
}

const NO_OWNER: usize = 0;

std::thread_local! {
    static THREAD_TOKEN: u8 = const { 0 };
}

/// A nonzero value unique to the calling thread among live threads.
fn thread_token() -> usize {
    THREAD_TOKEN.with(|token| token as *const u8 as usize)
}

/// Panic payload used to leave a failure raised from inside a running
/// report on the same thread.
struct NestedFailure;

enum Entry {
    /// This thread owns the report.
    First,
    /// This thread already owns the report and failed again while building it.
    Reentered,
    /// Another thread owns the report.
    Busy,
}

/// Records which thread is reporting, and whether its diagnostic is out.
pub(crate) struct ReportGuard {
    owner: AtomicUsize,
    presented: AtomicU8,
}

impl ReportGuard {
    pub(crate) const fn new() -> Self {
        Self {
            owner: AtomicUsize::new(NO_OWNER),
            presented: AtomicU8::new(0),
        }
    }

    fn enter(&self) -> Entry {
        let me = thread_token();
        match compare_exchange_usize(&self.owner, NO_OWNER, me) {
            NO_OWNER => Entry::First,
            owner if owner == me => Entry::Reentered,
            _ => Entry::Busy,
        }
    }

    fn mark_presented(&self) {
        exchange8(&self.presented, 1);
    }

    fn wait_presented(&self) {
        while self.presented.load(Ordering::Acquire) == 0 {
            yield_thread();
        }
    }
}

/// Presents a diagnostic for `message` and terminates the process with
/// status 1.
///
/// Only one diagnostic is ever presented per context. Other threads failing
/// meanwhile wait until it is out and then terminate. A failure raised on the
/// reporting thread itself can only come from the metadata export; it unwinds
/// back into [`query_plugin_info`], which records the query as failed, and
/// the outer report carries on.
pub(crate) fn report<P: Platform + ?Sized>(
    platform: &P,
    config: &Config,
    guard: &ReportGuard,
    message: &str,
    code: u32,
    query_metadata: bool,
) -> ! {
    match guard.enter() {
        Entry::First => {}
        Entry::Reentered => std::panic::resume_unwind(Box::new(NestedFailure)),
        Entry::Busy => {
            guard.wait_presented();
            platform.terminate(1)
        }
    }

    let diagnostic = Diagnostic::collect(platform, config, message, code, query_metadata);

    #[cfg(feature = "log")]
    log::error!(
        "[{}] {} (code {})",
        diagnostic.title(),
        diagnostic.message,
        diagnostic.code
    );

    platform.present_fatal(&diagnostic.title(), &diagnostic.to_string());
    guard.mark_presented();
    platform.terminate(1)
}
