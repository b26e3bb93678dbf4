use std::borrow::Cow;
use core::fmt::{Debug, Display};

/// Error types used throughout the `host_reloc` library.
/// These errors represent the conditions under which an address cannot be
/// relocated. None of them can be recovered from inside the host process,
/// which is why the non-fallible relocator constructors hand them to the
/// fatal reporter instead of returning them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The module that provides the address resolver is not loaded in the
    /// current process.
    ///
    /// This error typically indicates that:
    /// * The companion module is not installed
    /// * The plugin was loaded by something other than the companion module
    MissingHostModule {
        /// Name the module was looked up by.
        module: Cow<'static, str>,
        /// Platform error code observed right after the failed lookup.
        code: u32,
    },

    /// The companion module is loaded, but it does not export the resolver.
    ///
    /// This usually means the plugin and the companion module disagree on
    /// the version of the resolver contract.
    MissingResolverSymbol {
        /// Name of the export that was looked up.
        symbol: Cow<'static, str>,
        /// Platform error code observed right after the failed lookup.
        code: u32,
    },

    /// The resolver ran and returned 0 for the hash.
    UnknownHash {
        /// The hash the resolver did not recognize.
        hash: u32,
    },
}

impl Error {
    /// The platform error code attached to this error, `0` when the failure
    /// did not come from a platform call.
    pub fn code(&self) -> u32 {
        match self {
            Error::MissingHostModule { code, .. } | Error::MissingResolverSymbol { code, .. } => {
                *code
            }
            Error::UnknownHash { .. } => 0,
        }
    }

    /// Operator-facing explanation of the failure, used as the message of
    /// the fatal diagnostic.
    pub fn guidance(&self) -> String {
        match self {
            Error::MissingHostModule { module, .. } => format!(
                "The mod you are using could not locate the necessary module (i.e. {module}) in the \
                 loaded modules, which is required by the mod to resolve addresses correctly.\n\
                 This may occur if the module is not properly loaded into the current process.\n\
                 \n\
                 Please ensure that {module} is correctly installed.\n\
                 \n\
                 If you are the mod's developer, verify that your mod was loaded by {module}. \
                 Alternatively, you may need to provide your own address resolver."
            ),
            Error::MissingResolverSymbol { symbol, .. } => format!(
                "The mod you are using is unable to find the required address resolver function \
                 ({symbol}).\n\
                 This may occur if the resolver module is not properly loaded, OR if the mod is \
                 incompatible with the installed version of it.\n\
                 \n\
                 Please ensure that the resolver module is correctly installed AND that both it \
                 and the mod are up-to-date."
            ),
            Error::UnknownHash { hash } => format!(
                "Failed to find the address for the hash ({hash}) provided by the plugin.\n\
                 This issue is likely caused by the mod using an incorrect or outdated hash."
            ),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::MissingHostModule { module, code } => {
                write!(f, "resolver module {module} is not loaded (code {code})")
            }
            Error::MissingResolverSymbol { symbol, code } => {
                write!(f, "resolver symbol {symbol} is missing (code {code})")
            }
            Error::UnknownHash { hash } => {
                write!(f, "no address found for hash {hash:#010x}")
            }
        }
    }
}

impl core::error::Error for Error {}

/// Why the best-effort plugin metadata query produced nothing.
///
/// This is not an [`Error`]: it only lowers the quality of a diagnostic and
/// never causes a failure by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataUnavailable {
    /// The caller asked not to query the metadata export.
    Disabled,
    /// The current module does not export the metadata function.
    Missing,
    /// The metadata export was found but panicked while filling the info.
    QueryFailed,
}

impl Display for MetadataUnavailable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let reason = match self {
            MetadataUnavailable::Disabled => "Query was intentionally disabled",
            MetadataUnavailable::Missing => "Query export not found",
            MetadataUnavailable::QueryFailed => "Query failed",
        };
        write!(f, "Not available ({reason})")
    }
}

/// Creates a missing host module error.
///
/// # Arguments
/// * `module` - The name the module was looked up by.
/// * `code` - The platform error code.
#[cold]
#[inline(never)]
pub(crate) fn missing_module_error(module: impl Into<Cow<'static, str>>, code: u32) -> Error {
    Error::MissingHostModule {
        module: module.into(),
        code,
    }
}

/// Creates a missing resolver symbol error.
///
/// # Arguments
/// * `symbol` - The export name.
/// * `code` - The platform error code.
#[cold]
#[inline(never)]
pub(crate) fn missing_symbol_error(symbol: impl Into<Cow<'static, str>>, code: u32) -> Error {
    Error::MissingResolverSymbol {
        symbol: symbol.into(),
        code,
    }
}

#[cold]
#[inline(never)]
pub(crate) fn unknown_hash_error(hash: u32) -> Error {
    Error::UnknownHash { hash }
}
