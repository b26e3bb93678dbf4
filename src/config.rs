//! Compile-time configuration of a [`Context`](crate::Context).
//!
//! A `Config` is built in `const` context and baked into a `static` context,
//! so every choice here, including the resolver override, is fixed when the
//! plugin is compiled.

use crate::{os, resolver::ResolveFn};

/// When hash relocators call the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePolicy {
    /// Resolve in the constructor. Any failure is fatal.
    Eager,
    /// Resolve on first access. An unknown hash yields a default value
    /// until the context is marked ready.
    Deferred,
}

impl ResolvePolicy {
    /// The policy used on the current target: eager on Windows, deferred
    /// everywhere else.
    pub const fn platform_default() -> Self {
        os::RESOLVE_POLICY
    }
}

/// Names and policies used to find and call the resolver.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub(crate) resolver_module: &'static str,
    pub(crate) resolver_symbol: &'static str,
    pub(crate) metadata_symbol: &'static str,
    pub(crate) policy: ResolvePolicy,
    pub(crate) resolver_override: Option<ResolveFn>,
}

impl Config {
    /// Default export name of the resolver function.
    pub const RESOLVER_SYMBOL: &'static str = "RED4ext_ResolveAddress";
    /// Default export name of the plugin metadata function.
    pub const METADATA_SYMBOL: &'static str = "Query";

    /// The platform defaults.
    pub const DEFAULT: Config = Config {
        resolver_module: os::RESOLVER_MODULE_NAME,
        resolver_symbol: Self::RESOLVER_SYMBOL,
        metadata_symbol: Self::METADATA_SYMBOL,
        policy: ResolvePolicy::platform_default(),
        resolver_override: None,
    };

    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Sets the file name of the module that exports the resolver.
    pub const fn with_resolver_module(mut self, name: &'static str) -> Self {
        self.resolver_module = name;
        self
    }

    /// Sets the export name of the resolver function.
    pub const fn with_resolver_symbol(mut self, symbol: &'static str) -> Self {
        self.resolver_symbol = symbol;
        self
    }

    /// Sets the export name of the current module's metadata function.
    pub const fn with_metadata_symbol(mut self, symbol: &'static str) -> Self {
        self.metadata_symbol = symbol;
        self
    }

    pub const fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the whole module lookup with `resolve`.
    ///
    /// Hashes are passed straight to this function: the resolver module is
    /// never searched for. Use it for tests or for alternative resolver
    /// backends.
    pub const fn with_resolver_override(mut self, resolve: ResolveFn) -> Self {
        self.resolver_override = Some(resolve);
        self
    }

    #[inline]
    pub fn resolver_module(&self) -> &'static str {
        self.resolver_module
    }

    #[inline]
    pub fn resolver_symbol(&self) -> &'static str {
        self.resolver_symbol
    }

    #[inline]
    pub fn metadata_symbol(&self) -> &'static str {
        self.metadata_symbol
    }

    #[inline]
    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    #[inline]
    pub fn resolver_override(&self) -> Option<ResolveFn> {
        self.resolver_override
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
