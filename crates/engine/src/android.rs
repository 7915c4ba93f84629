//! NDK function tables resolved at attach time
//!
//! Resolving these dynamically keeps the crate linkable on hosts without the
//! NDK and lets the input hook degrade when `libandroid.so` is absent.

use std::ffi::CString;

use eglhud_sdk::symbols;
use eglhud_sdk::{
    AInputEvent, AInputEventGetTypeFn, AMotionEventGetActionFn, AMotionEventGetAxisFn,
    AMotionEventGetPointerCountFn, AndroidLogWriteFn,
};

use crate::error::ResolveError;
use crate::loader::SymbolSource;

/// `AInputEvent` / `AMotionEvent` accessors from `libandroid.so`
#[derive(Debug, Clone, Copy)]
pub struct AndroidInputApi {
    get_type: AInputEventGetTypeFn,
    get_action: AMotionEventGetActionFn,
    get_pointer_count: AMotionEventGetPointerCountFn,
    get_x: AMotionEventGetAxisFn,
    get_y: AMotionEventGetAxisFn,
}

impl AndroidInputApi {
    #[tracing::instrument(skip_all)]
    pub fn resolve<S: SymbolSource + ?Sized>(source: &S) -> Result<Self, ResolveError> {
        let lib = source.open(symbols::LIB_ANDROID)?;

        let get_type = source.resolve(&lib, symbols::AINPUT_EVENT_GET_TYPE)?;
        let get_action = source.resolve(&lib, symbols::AMOTION_EVENT_GET_ACTION)?;
        let get_pointer_count = source.resolve(&lib, symbols::AMOTION_EVENT_GET_POINTER_COUNT)?;
        let get_x = source.resolve(&lib, symbols::AMOTION_EVENT_GET_X)?;
        let get_y = source.resolve(&lib, symbols::AMOTION_EVENT_GET_Y)?;

        // SAFETY: the SDK signatures mirror <android/input.h>.
        unsafe {
            Ok(Self {
                get_type: get_type.cast(),
                get_action: get_action.cast(),
                get_pointer_count: get_pointer_count.cast(),
                get_x: get_x.cast(),
                get_y: get_y.cast(),
            })
        }
    }

    /// # Safety
    /// `event` must point to a live input event.
    pub unsafe fn event_type(&self, event: *const AInputEvent) -> i32 {
        (self.get_type)(event)
    }

    /// # Safety
    /// `event` must point to a live motion event.
    pub unsafe fn action(&self, event: *const AInputEvent) -> i32 {
        (self.get_action)(event)
    }

    /// # Safety
    /// `event` must point to a live motion event.
    pub unsafe fn pointer_count(&self, event: *const AInputEvent) -> usize {
        (self.get_pointer_count)(event)
    }

    /// # Safety
    /// `event` must point to a live motion event and `index` must be in range.
    pub unsafe fn position(&self, event: *const AInputEvent, index: usize) -> (f32, f32) {
        ((self.get_x)(event, index), (self.get_y)(event, index))
    }
}

/// `__android_log_write` from `liblog.so`
#[derive(Debug, Clone, Copy)]
pub struct LogApi {
    write: AndroidLogWriteFn,
}

impl LogApi {
    pub fn resolve<S: SymbolSource + ?Sized>(source: &S) -> Result<Self, ResolveError> {
        let sym = source.lookup(symbols::LIB_LOG, symbols::ANDROID_LOG_WRITE)?;
        // SAFETY: matches <android/log.h>.
        Ok(Self {
            write: unsafe { sym.cast() },
        })
    }

    /// Write one line to logcat
    pub fn write(&self, priority: i32, tag: &str, text: &str) {
        let (Ok(tag), Ok(text)) = (CString::new(tag), CString::new(text.replace('\0', " "))) else {
            return;
        };
        unsafe {
            (self.write)(priority, tag.as_ptr(), text.as_ptr());
        }
    }
}
