//! EGL function table resolved from the host's `libEGL.so`

use std::ffi::{c_void, CString};

use eglhud_sdk::symbols;
use eglhud_sdk::{
    EGLContext, EGLDisplay, EGLSurface, EGLint, EglGetCurrentContextFn, EglGetProcAddressFn,
    EglQuerySurfaceFn, EGL_FALSE,
};

use crate::error::ResolveError;
use crate::loader::{LibraryHandle, SymbolSource};

/// EGL entry points the present hook needs besides the present call itself
#[derive(Debug, Clone)]
pub struct EglApi {
    get_current_context: EglGetCurrentContextFn,
    query_surface: EglQuerySurfaceFn,
    get_proc_address: Option<EglGetProcAddressFn>,
    gles: Option<LibraryHandle>,
}

impl EglApi {
    /// Resolve the table from an already-opened `libEGL.so`
    #[tracing::instrument(skip_all, fields(library = egl.name()))]
    pub fn resolve<S: SymbolSource + ?Sized>(
        source: &S,
        egl: &LibraryHandle,
    ) -> Result<Self, ResolveError> {
        let get_current_context = source.resolve(egl, symbols::EGL_GET_CURRENT_CONTEXT)?;
        let query_surface = source.resolve(egl, symbols::EGL_QUERY_SURFACE)?;

        let get_proc_address = match source.resolve(egl, symbols::EGL_GET_PROC_ADDRESS) {
            Ok(sym) => Some(sym),
            Err(e) => {
                tracing::debug!("{}", e);
                None
            }
        };

        let gles = match source.open(symbols::LIB_GLES) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::debug!("GL fallback loader unavailable: {}", e);
                None
            }
        };

        // SAFETY: the SDK signatures mirror the Khronos EGL 1.4 headers.
        unsafe {
            Ok(Self {
                get_current_context: get_current_context.cast(),
                query_surface: query_surface.cast(),
                get_proc_address: get_proc_address.as_ref().map(|s| s.cast()),
                gles,
            })
        }
    }

    /// `eglGetCurrentContext` on the calling thread
    pub fn current_context(&self) -> EGLContext {
        unsafe { (self.get_current_context)() }
    }

    /// `eglQuerySurface` for a single integer attribute
    pub fn query_surface(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        attribute: EGLint,
    ) -> Option<EGLint> {
        let mut value: EGLint = 0;
        let ok = unsafe { (self.query_surface)(display, surface, attribute, &mut value) };
        if ok == EGL_FALSE {
            None
        } else {
            Some(value)
        }
    }

    /// Look up a GL entry point for the overlay's GL loader
    ///
    /// Tries `eglGetProcAddress` first and falls back to `dlsym` in `libGLESv2.so`,
    /// since EGL 1.4 implementations may not return core GLES functions.
    pub fn gl_proc_address(&self, name: &str) -> *const c_void {
        let Ok(c_name) = CString::new(name) else {
            return std::ptr::null();
        };

        if let Some(get_proc_address) = self.get_proc_address {
            let ptr = unsafe { get_proc_address(c_name.as_ptr()) };
            if !ptr.is_null() {
                return ptr;
            }
        }

        match &self.gles {
            Some(gles) => unsafe { libc::dlsym(gles.as_ptr(), c_name.as_ptr()) as *const c_void },
            None => std::ptr::null(),
        }
    }
}
