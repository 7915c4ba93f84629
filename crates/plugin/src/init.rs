//! Load-time entry point
//!
//! The dynamic loader runs [`eglhud_init`] through `.init_array` as soon as
//! the library is mapped. Everything that touches the host happens on a
//! separate thread after a configurable delay, so the loader lock is never
//! held while hooks are installed.

use std::panic::catch_unwind;
use std::sync::Once;
use std::thread;
use std::time::Duration;

use eglhud_core::hooks::inline_hook_count;
use eglhud_core::{attach, CoreConfig, InlineInterceptor};
use eglhud_engine::DynamicLinker;

use crate::{ffi, logging};

static STARTED: Once = Once::new();

#[cfg(all(any(target_os = "linux", target_os = "android"), not(test)))]
#[link_section = ".init_array"]
#[used]
static INIT: extern "C" fn() = {
    extern "C" fn init() {
        eglhud_init();
    }
    init
};

/// Start the attach thread. Safe to call more than once.
#[no_mangle]
pub extern "C" fn eglhud_init() {
    STARTED.call_once(|| {
        let spawned = thread::Builder::new()
            .name("eglhud-attach".to_string())
            .spawn(|| {
                if catch_unwind(run).is_err() {
                    tracing::error!("Attach thread panicked");
                }
            });

        if let Err(e) = spawned {
            eprintln!("eglhud: failed to spawn attach thread: {}", e);
        }
    });
}

fn run() {
    let loaded = CoreConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();
    logging::init(&config);

    if let Err(e) = &loaded {
        tracing::warn!("Ignoring unreadable config: {}", e);
    }

    tracing::info!(
        "eglhud {} loaded, attaching in {} ms",
        env!("CARGO_PKG_VERSION"),
        config.attach_delay_ms
    );
    thread::sleep(Duration::from_millis(config.attach_delay_ms));

    match attach(config, &DynamicLinker, &InlineInterceptor, &ffi::replacements()) {
        Ok((_, report)) => {
            tracing::info!(
                "Overlay attached, present trampoline at {:#x}, {} hooks installed",
                report.present.trampoline,
                inline_hook_count()
            );
            if let Ok((shape, _)) = report.input {
                tracing::info!("Click tracking active ({:?})", shape);
            }
        }
        Err(e) => tracing::error!("Attach aborted: {}", e),
    }
}
