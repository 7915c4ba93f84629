use std::ffi::c_void;

use eglhud_core::{Replacements, Session};
use eglhud_sdk::{
    AInputEvent, EGLBoolean, EGLDisplay, EGLSurface, EglSwapBuffersFn, InitializeMotionEventFn,
    InputConsumeFn, EGL_FALSE, UNKNOWN_ERROR,
};

/// Addresses handed to the attach sequence
pub fn replacements() -> Replacements {
    Replacements {
        present: present_detour as *const (),
        input_per_event: initialize_motion_event_detour as *const (),
        input_batch: input_consume_detour as *const (),
    }
}

/// Stand-in for `eglSwapBuffers`
unsafe extern "C" fn present_detour(display: EGLDisplay, surface: EGLSurface) -> EGLBoolean {
    let Some(session) = Session::get() else {
        return EGL_FALSE;
    };
    let Some(original) = session.present_original().get_as::<EglSwapBuffersFn>() else {
        return EGL_FALSE;
    };

    session.present_through(display, surface, || original(display, surface))
}

/// Stand-in for `InputConsumer::initializeMotionEvent`
unsafe extern "C" fn initialize_motion_event_detour(event: *mut c_void, message: *mut c_void) {
    let Some(session) = Session::get() else {
        return;
    };
    let Some(original) = session
        .input_hook()
        .and_then(|hook| hook.original().get_as::<InitializeMotionEventFn>())
    else {
        return;
    };

    session.motion_event_through(event as *const AInputEvent, || original(event, message));
}

/// Stand-in for `InputConsumer::consume`
unsafe extern "C" fn input_consume_detour(
    consumer: *mut c_void,
    factory: *mut c_void,
    consume_batches: bool,
    frame_time: i64,
    out_seq: *mut u32,
    out_event: *mut *mut AInputEvent,
) -> i32 {
    let Some(session) = Session::get() else {
        return UNKNOWN_ERROR;
    };
    let Some(original) = session
        .input_hook()
        .and_then(|hook| hook.original().get_as::<InputConsumeFn>())
    else {
        return UNKNOWN_ERROR;
    };

    session.consume_through(out_event, || {
        original(consumer, factory, consume_batches, frame_time, out_seq, out_event)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacements_are_distinct() {
        let r = replacements();
        assert!(!r.present.is_null());
        assert_ne!(r.present, r.input_per_event);
        assert_ne!(r.input_per_event, r.input_batch);
    }
}
