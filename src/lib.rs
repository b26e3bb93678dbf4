//! # host_reloc
//! Locate private functions, data and virtual tables of the host process a
//! plugin is loaded into, without the host exporting them and without
//! rebuilding the plugin for every host binary.
//! ## Usage
//! Two relocation strategies are available:
//! * by offset from the image base of the main executable, see [`OffsetFunc`],
//!   [`OffsetPtr`] and [`OffsetVtbl`];
//! * by a stable 32-bit hash, looked up through a resolver function exported
//!   by a companion module that is already loaded in the process, see
//!   [`HashFunc`], [`HashPtr`] and [`HashVtbl`].
//!
//! Resolution failures are unrecoverable for the host: the non-fallible
//! constructors and accessors show a diagnostic and terminate the process.
//! Every relocator also has a `try_` form that returns the [`Error`] instead.
//! ## Example
//! ```no_run
//! use host_reloc::{GLOBAL_CONTEXT, HashFunc, OffsetPtr};
//!
//! static PLAYER_SPAWN: HashFunc<unsafe extern "C" fn(u32) -> bool> =
//!     unsafe { HashFunc::deferred(&GLOBAL_CONTEXT, 0xDEAD_BEEF) };
//!
//! let tick_count = OffsetPtr::<u64>::new(0x4A_1C30);
//! if let Some(spawn) = PLAYER_SPAWN.get() {
//!     unsafe { spawn(tick_count.read() as u32) };
//! }
//! ```

mod config;
mod context;
mod error;
pub mod fatal;
pub mod module;
pub mod os;
pub mod reloc;
mod resolver;
pub mod sync;

pub use config::{Config, ResolvePolicy};
pub use context::{Context, GLOBAL_CONTEXT};
pub use error::{Error, MetadataUnavailable};
pub use module::PluginInfo;
pub use reloc::{HashFunc, HashPtr, HashVtbl, OffsetFunc, OffsetPtr, OffsetVtbl};
pub use resolver::ResolveFn;

/// A type alias for `Result`s returned by `host_reloc` functions.
///
/// This is a convenience alias that eliminates the need to repeatedly specify
/// the `Error` type in function signatures.
pub type Result<T> = core::result::Result<T, Error>;
