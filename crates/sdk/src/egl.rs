//! EGL type definitions
//!
//! Handles are opaque pointers owned by the host's graphics driver. We only
//! compare them for identity and pass them back into EGL.

use std::ffi::{c_char, c_void};

pub type EGLDisplay = *mut c_void;
pub type EGLSurface = *mut c_void;
pub type EGLContext = *mut c_void;
pub type EGLBoolean = u32;
pub type EGLint = i32;

pub const EGL_FALSE: EGLBoolean = 0;
pub const EGL_TRUE: EGLBoolean = 1;

pub const EGL_NO_CONTEXT: EGLContext = std::ptr::null_mut();
pub const EGL_NO_SURFACE: EGLSurface = std::ptr::null_mut();

/// Surface attributes for `eglQuerySurface`
pub const EGL_HEIGHT: EGLint = 0x3056;
pub const EGL_WIDTH: EGLint = 0x3057;
pub const EGL_RENDER_BUFFER: EGLint = 0x3086;

/// Values reported for `EGL_RENDER_BUFFER`
pub const EGL_BACK_BUFFER: EGLint = 0x3084;
pub const EGL_SINGLE_BUFFER: EGLint = 0x3085;

/// `eglSwapBuffers` - the per-frame present call
pub type EglSwapBuffersFn =
    unsafe extern "C" fn(display: EGLDisplay, surface: EGLSurface) -> EGLBoolean;

/// `eglGetCurrentContext`
pub type EglGetCurrentContextFn = unsafe extern "C" fn() -> EGLContext;

/// `eglQuerySurface`
pub type EglQuerySurfaceFn = unsafe extern "C" fn(
    display: EGLDisplay,
    surface: EGLSurface,
    attribute: EGLint,
    value: *mut EGLint,
) -> EGLBoolean;

/// `eglGetProcAddress`
pub type EglGetProcAddressFn = unsafe extern "C" fn(name: *const c_char) -> *const c_void;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_values_match_khronos_headers() {
        assert_eq!(EGL_WIDTH, 0x3057);
        assert_eq!(EGL_HEIGHT, 0x3056);
        assert_ne!(EGL_BACK_BUFFER, EGL_SINGLE_BUFFER);
    }
}
