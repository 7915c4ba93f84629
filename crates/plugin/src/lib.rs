//! eglhud injected library
//!
//! Compiles to `libeglhud.so`. Once mapped into a GLES host process the
//! library attaches itself: it hooks the EGL present call and the input
//! consumer, then draws the overlay on the host's own frames.

mod ffi;
mod init;
pub mod logging;

pub use init::eglhud_init;
