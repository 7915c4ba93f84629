//! Shared library loading and symbol lookup via the dynamic linker
//!
//! Libraries opened here are never closed. Opening bumps the library's
//! reference count, which keeps every resolved address (and every hook placed
//! on it) valid until the host process exits.

use std::ffi::{c_void, CStr, CString};
use std::fmt;

use crate::error::ResolveError;

/// Handle to an opened shared library
#[derive(Clone)]
pub struct LibraryHandle {
    name: String,
    raw: *mut c_void,
}

// SAFETY: dlopen handles are process-global tokens; the dynamic linker
// synchronizes access to them internally.
unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl LibraryHandle {
    /// Wrap a raw handle returned by the dynamic linker (or a test double)
    pub fn from_raw(name: impl Into<String>, raw: *mut c_void) -> Self {
        Self {
            name: name.into(),
            raw,
        }
    }

    /// Library name as it was requested
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw dlopen handle
    pub fn as_ptr(&self) -> *mut c_void {
        self.raw
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LibraryHandle({} @ {:p})", self.name, self.raw)
    }
}

/// A symbol resolved to an address. Immutable once created.
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub library: LibraryHandle,
    pub name: String,
    pub address: usize,
}

impl ResolvedSymbol {
    /// Address as an untyped code pointer
    pub fn as_ptr(&self) -> *const () {
        self.address as *const ()
    }

    /// Reinterpret the address as a typed function pointer
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the symbol's real ABI.
    pub unsafe fn cast<F: Copy>(&self) -> F {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
        std::mem::transmute_copy(&self.address)
    }
}

/// Something that can open libraries and resolve symbols by name
///
/// Implemented by [`DynamicLinker`] for the live process.
pub trait SymbolSource: Send + Sync {
    /// Open a shared library by name
    fn open(&self, library: &str) -> Result<LibraryHandle, ResolveError>;

    /// Resolve an exported or mangled symbol inside an opened library
    fn resolve(&self, library: &LibraryHandle, symbol: &str)
        -> Result<ResolvedSymbol, ResolveError>;

    /// Open `library` and resolve `symbol` in one step
    fn lookup(&self, library: &str, symbol: &str) -> Result<ResolvedSymbol, ResolveError> {
        let handle = self.open(library)?;
        self.resolve(&handle, symbol)
    }
}

/// [`SymbolSource`] backed by `dlopen` / `dlsym`
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLinker;

impl SymbolSource for DynamicLinker {
    fn open(&self, library: &str) -> Result<LibraryHandle, ResolveError> {
        let c_name =
            CString::new(library).map_err(|_| ResolveError::InvalidName(library.to_string()))?;

        let raw = unsafe { libc::dlopen(c_name.as_ptr(), libc::RTLD_NOW) };
        if raw.is_null() {
            let reason = last_dl_error().unwrap_or_else(|| "unknown error".to_string());
            tracing::debug!("dlopen({}) failed: {}", library, reason);
            return Err(ResolveError::LibraryNotFound {
                library: library.to_string(),
                reason,
            });
        }

        tracing::debug!("Opened {} at {:p}", library, raw);
        Ok(LibraryHandle::from_raw(library, raw))
    }

    fn resolve(
        &self,
        library: &LibraryHandle,
        symbol: &str,
    ) -> Result<ResolvedSymbol, ResolveError> {
        let c_symbol =
            CString::new(symbol).map_err(|_| ResolveError::InvalidName(symbol.to_string()))?;

        let address = unsafe { libc::dlsym(library.as_ptr(), c_symbol.as_ptr()) };
        if address.is_null() {
            return Err(ResolveError::SymbolMissing {
                library: library.name().to_string(),
                symbol: symbol.to_string(),
            });
        }

        tracing::debug!("Resolved {}!{} -> {:p}", library.name(), symbol, address);

        Ok(ResolvedSymbol {
            library: library.clone(),
            name: symbol.to_string(),
            address: address as usize,
        })
    }
}

fn last_dl_error() -> Option<String> {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned())
    }
}
