//! eglhud SDK - EGL and Android Input ABI Definitions
//!
//! This crate contains opaque handle types, constants and function pointer
//! signatures for the native entry points eglhud resolves and intercepts.
//! It has no dependencies and compiles quickly, allowing parallel compilation
//! of dependent crates.
//!
//! # Modules
//!
//! - [`egl`] - EGL handles, attributes and the present-call signature
//! - [`input`] - Android input event handles and consume signatures
//! - [`log`] - Android log priorities and the logcat write signature
//! - [`symbols`] - Library and symbol names looked up in the host process

pub mod egl;
pub mod input;
pub mod log;
pub mod symbols;

pub use egl::*;
pub use input::*;
pub use log::*;
