//! eglhud Engine - Library Loading and Symbol Resolution
//!
//! This crate handles:
//! - Opening shared libraries already mapped into the host process
//! - Resolving exported and mangled symbols to addresses
//! - Building typed function tables ([`EglApi`], [`AndroidInputApi`], [`LogApi`])
//!
//! # Architecture
//!
//! Everything goes through the [`SymbolSource`] trait. [`DynamicLinker`]
//! implements it with `dlopen`/`dlsym`; tests substitute their own source.
//!
//! # Lifetime
//!
//! Handles are never closed. Resolved addresses stay valid for the lifetime
//! of the host process.

pub mod android;
pub mod egl;
pub mod error;
pub mod loader;

pub use android::{AndroidInputApi, LogApi};
pub use egl::EglApi;
pub use error::ResolveError;
pub use loader::{DynamicLinker, LibraryHandle, ResolvedSymbol, SymbolSource};
