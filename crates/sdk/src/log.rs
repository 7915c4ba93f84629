//! Android logging definitions

use std::ffi::c_char;

/// `__android_log_write`
pub type AndroidLogWriteFn = unsafe extern "C" fn(
    priority: i32,
    tag: *const c_char,
    text: *const c_char,
) -> i32;

/// Log priorities for `__android_log_write`
pub const ANDROID_LOG_VERBOSE: i32 = 2;
pub const ANDROID_LOG_DEBUG: i32 = 3;
pub const ANDROID_LOG_INFO: i32 = 4;
pub const ANDROID_LOG_WARN: i32 = 5;
pub const ANDROID_LOG_ERROR: i32 = 6;
