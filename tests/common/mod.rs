#![allow(dead_code)]

use host_reloc::{
    Config, Context, ResolveFn,
    module::QueryFn,
    os::{ModuleHandle, Platform},
};
use std::{
    any::Any,
    ffi::c_void,
    panic::AssertUnwindSafe,
    path::PathBuf,
    ptr::NonNull,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const IMAGE_BASE: usize = 0x1_4000_0000;
pub const RESOLVER_MODULE: usize = 0x7000_0000;
pub const CURRENT_MODULE: usize = 0x6000_0000;
pub const PLUGIN_PATH: &str = "/opt/host/plugins/my_plugin.so";

/// Panic payload used by [`FakePlatform::terminate`].
#[derive(Debug)]
pub struct Terminated(pub u32);

/// A scripted platform that records what the relocation code asks of it.
pub struct FakePlatform {
    pub base: usize,
    pub resolver_loaded: bool,
    pub resolver: Option<ResolveFn>,
    pub query: Option<QueryFn>,
    pub error_code: u32,
    pub slow_lookups: bool,
    pub base_lookups: AtomicUsize,
    pub module_lookups: AtomicUsize,
    pub export_lookups: Mutex<Vec<String>>,
    pub presented: Mutex<Vec<(String, String)>>,
    /// Number of diagnostics presented when each `terminate` call was made.
    pub terminations: Mutex<Vec<usize>>,
}

impl FakePlatform {
    pub const fn new() -> Self {
        Self {
            base: IMAGE_BASE,
            resolver_loaded: true,
            resolver: None,
            query: None,
            error_code: 0,
            slow_lookups: false,
            base_lookups: AtomicUsize::new(0),
            module_lookups: AtomicUsize::new(0),
            export_lookups: Mutex::new(Vec::new()),
            presented: Mutex::new(Vec::new()),
            terminations: Mutex::new(Vec::new()),
        }
    }

    pub const fn with_base(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    /// Makes the resolver module export `resolve`.
    pub const fn with_resolver(mut self, resolve: ResolveFn) -> Self {
        self.resolver = Some(resolve);
        self
    }

    pub const fn without_resolver_module(mut self, error_code: u32) -> Self {
        self.resolver_loaded = false;
        self.error_code = error_code;
        self
    }

    pub const fn with_error_code(mut self, error_code: u32) -> Self {
        self.error_code = error_code;
        self
    }

    /// Makes the current module export `query` as its metadata function.
    pub const fn with_query(mut self, query: QueryFn) -> Self {
        self.query = Some(query);
        self
    }

    /// Slows down the image base and module lookups to widen races.
    pub const fn with_slow_lookups(mut self) -> Self {
        self.slow_lookups = true;
        self
    }

    pub fn leak(self, config: Config) -> &'static Context<FakePlatform> {
        Box::leak(Box::new(Context::new(self, config)))
    }

    pub fn exports_looked_up(&self, symbol: &str) -> usize {
        self.export_lookups
            .lock()
            .unwrap()
            .iter()
            .filter(|name| *name == symbol)
            .count()
    }

    pub fn presented(&self) -> Vec<(String, String)> {
        self.presented.lock().unwrap().clone()
    }

    pub fn terminations(&self) -> Vec<usize> {
        self.terminations.lock().unwrap().clone()
    }

    fn pause(&self) {
        if self.slow_lookups {
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

fn handle(addr: usize) -> ModuleHandle {
    ModuleHandle::from_raw(addr as *mut c_void).unwrap()
}

impl Platform for FakePlatform {
    fn image_base(&self) -> usize {
        self.base_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause();
        self.base
    }

    fn find_module_by_name(&self, _name: &str) -> Option<ModuleHandle> {
        self.module_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause();
        self.resolver_loaded.then(|| handle(RESOLVER_MODULE))
    }

    fn find_module_owning_address(&self, addr: *const c_void) -> Option<(ModuleHandle, PathBuf)> {
        assert!(!addr.is_null());
        Some((handle(CURRENT_MODULE), PathBuf::from(PLUGIN_PATH)))
    }

    fn lookup_export(&self, module: ModuleHandle, symbol: &str) -> Option<NonNull<c_void>> {
        self.export_lookups.lock().unwrap().push(symbol.to_owned());
        let func = match module.as_ptr() as usize {
            RESOLVER_MODULE if symbol == Config::RESOLVER_SYMBOL => {
                self.resolver.map(|f| f as *mut c_void)
            }
            CURRENT_MODULE if symbol == Config::METADATA_SYMBOL => {
                self.query.map(|f| f as *mut c_void)
            }
            _ => None,
        };
        func.and_then(NonNull::new)
    }

    fn module_path(&self, module: ModuleHandle) -> Option<PathBuf> {
        (module.as_ptr() as usize == CURRENT_MODULE).then(|| PathBuf::from(PLUGIN_PATH))
    }

    fn last_error(&self) -> u32 {
        self.error_code
    }

    fn present_fatal(&self, title: &str, message: &str) {
        self.presented
            .lock()
            .unwrap()
            .push((title.to_owned(), message.to_owned()));
    }

    fn terminate(&self, code: u32) -> ! {
        let presented = self.presented.lock().unwrap().len();
        self.terminations.lock().unwrap().push(presented);
        std::panic::panic_any(Terminated(code))
    }
}

/// Runs `f`, which must end in [`FakePlatform::terminate`], and returns the
/// exit code it asked for.
pub fn expect_termination<R>(f: impl FnOnce() -> R) -> u32 {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("expected the process to be terminated"),
        Err(payload) => match payload.downcast::<Terminated>() {
            Ok(terminated) => terminated.0,
            Err(other) => std::panic::resume_unwind(other as Box<dyn Any + Send>),
        },
    }
}

/// Declares a resolver function backed by a fixed table, together with a
/// counter of how many times it was called.
#[macro_export]
macro_rules! stub_resolver {
    ($name:ident, $calls:ident, { $($hash:pat => $addr:expr),* $(,)? }) => {
        static $calls: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

        unsafe extern "C" fn $name(hash: u32) -> usize {
            $calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            match hash {
                $($hash => $addr,)*
                _ => 0,
            }
        }
    };
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
