#[macro_use]
mod common;

use common::{FakePlatform, IMAGE_BASE};
use host_reloc::{Config, Error, ResolvePolicy};
use std::{
    borrow::Cow,
    ffi::c_void,
    ptr::NonNull,
    sync::{Barrier, atomic::Ordering},
    thread,
};

const THREADS: usize = 16;

#[test]
fn concurrent_image_base_lookups_run_once() {
    let ctx = FakePlatform::new().with_slow_lookups().leak(Config::DEFAULT);
    let barrier = Barrier::new(THREADS);

    let bases: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    ctx.image_base()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(bases.iter().all(|&base| base == IMAGE_BASE));
    assert_eq!(ctx.platform().base_lookups.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_resolver_lookups_run_once() {
    stub_resolver!(resolve, CALLS, { 1 => 0x1000 });
    let ctx = FakePlatform::new()
        .with_slow_lookups()
        .with_resolver(resolve)
        .leak(Config::DEFAULT);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                assert_eq!(ctx.resolve(1), Ok(0x1000));
            });
        }
    });

    let platform = ctx.platform();
    assert_eq!(platform.module_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(platform.exports_looked_up(Config::RESOLVER_SYMBOL), 1);
    assert_eq!(CALLS.load(Ordering::SeqCst), THREADS);
}

#[test]
fn missing_module_failure_is_cached() {
    let ctx = FakePlatform::new()
        .without_resolver_module(126)
        .leak(Config::DEFAULT);

    let expected = Error::MissingHostModule {
        module: Cow::Borrowed(Config::DEFAULT.resolver_module()),
        code: 126,
    };
    assert_eq!(ctx.resolver().err(), Some(expected.clone()));
    assert_eq!(ctx.resolve(0xDEAD_BEEF), Err(expected));
    assert_eq!(ctx.platform().module_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.platform().exports_looked_up(Config::RESOLVER_SYMBOL), 0);
}

#[test]
fn missing_symbol_reports_symbol_name() {
    // Module present, export absent.
    let ctx = FakePlatform::new().with_error_code(127).leak(Config::DEFAULT);

    match ctx.resolver() {
        Err(Error::MissingResolverSymbol { symbol, code }) => {
            assert_eq!(symbol, Config::RESOLVER_SYMBOL);
            assert_eq!(code, 127);
        }
        other => panic!("unexpected lookup outcome: {:?}", other.map(|f| f as usize)),
    }
    assert!(ctx.resolver().is_err());
    assert_eq!(ctx.platform().exports_looked_up(Config::RESOLVER_SYMBOL), 1);
}

#[test]
fn custom_symbol_name_is_looked_up() {
    stub_resolver!(resolve, CALLS, { _ => 0x2000 });
    let config = Config::new().with_resolver_symbol("Custom_Resolve");
    let ctx = FakePlatform::new().with_resolver(resolve).leak(config);

    // The fake only exports the default name.
    assert!(matches!(
        ctx.resolver(),
        Err(Error::MissingResolverSymbol { ref symbol, .. }) if symbol == "Custom_Resolve"
    ));
    assert_eq!(ctx.platform().exports_looked_up("Custom_Resolve"), 1);
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
}

#[test]
fn override_skips_module_lookup() {
    stub_resolver!(resolve, CALLS, { 0xDEAD_BEEF => 0x1000 });
    let config = Config::new()
        .with_policy(ResolvePolicy::Deferred)
        .with_resolver_override(resolve);
    let ctx = FakePlatform::new().without_resolver_module(2).leak(config);

    assert_eq!(ctx.resolve(0xDEAD_BEEF), Ok(0x1000));
    assert_eq!(ctx.platform().module_lookups.load(Ordering::SeqCst), 0);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn zero_from_resolver_is_unknown_hash() {
    stub_resolver!(resolve, CALLS, { 1 => 0x1000 });
    let ctx = FakePlatform::new().with_resolver(resolve).leak(Config::DEFAULT);

    assert_eq!(ctx.resolve(2), Err(Error::UnknownHash { hash: 2 }));
    assert_eq!(Error::UnknownHash { hash: 2 }.code(), 0);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn readiness_is_explicit() {
    let ctx = FakePlatform::new().leak(Config::DEFAULT);
    assert!(!ctx.is_ready());
    ctx.mark_ready();
    assert!(ctx.is_ready());
}

#[test]
fn platform_default_policy() {
    let expected = if cfg!(windows) {
        ResolvePolicy::Eager
    } else {
        ResolvePolicy::Deferred
    };
    assert_eq!(ResolvePolicy::platform_default(), expected);
    assert_eq!(Config::default().policy(), expected);
    assert!(Config::DEFAULT.resolver_override().is_none());
}

#[test]
fn thread_block_is_registered_per_thread() {
    let ctx = FakePlatform::new().leak(Config::DEFAULT);
    let mut block = [0u64; 4];
    let ptr = NonNull::new(block.as_mut_ptr().cast::<c_void>());

    assert_eq!(ctx.thread_block(), None);
    ctx.set_thread_block(ptr);
    assert_eq!(ctx.thread_block(), ptr);
    let elsewhere = thread::spawn(move || ctx.thread_block().map(|block| block.as_ptr() as usize));
    assert_eq!(elsewhere.join().unwrap(), None);

    ctx.set_thread_block(None);
    assert_eq!(ctx.thread_block(), None);
}
