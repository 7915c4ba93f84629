//! Library and symbol names looked up in the host process
//!
//! These strings must match exactly what the host's libraries export.
//! Internal C++ functions have no stable exported name, so they are given in
//! their fully mangled form. No demangling is performed.

/// Host graphics driver front-end
pub const LIB_EGL: &str = "libEGL.so";

/// Host GLES implementation, used as a fallback GL loader
pub const LIB_GLES: &str = "libGLESv2.so";

/// Host input stack
pub const LIB_INPUT: &str = "libinput.so";

/// NDK library exporting the `AInputEvent` accessors
pub const LIB_ANDROID: &str = "libandroid.so";

/// Android logging
pub const LIB_LOG: &str = "liblog.so";

/// The present call
pub const EGL_SWAP_BUFFERS: &str = "eglSwapBuffers";
pub const EGL_GET_CURRENT_CONTEXT: &str = "eglGetCurrentContext";
pub const EGL_QUERY_SURFACE: &str = "eglQuerySurface";
pub const EGL_GET_PROC_ADDRESS: &str = "eglGetProcAddress";

/// `android::InputConsumer::initializeMotionEvent(MotionEvent*, const InputMessage*)`
pub const INPUT_INITIALIZE_MOTION_EVENT: &str =
    "_ZN7android13InputConsumer21initializeMotionEventEPNS_11MotionEventEPKNS_12InputMessageE";

/// `android::InputConsumer::consume(InputEventFactoryInterface*, bool, long, uint32_t*, InputEvent**)`
pub const INPUT_CONSUME: &str =
    "_ZN7android13InputConsumer7consumeEPNS_26InputEventFactoryInterfaceEblPjPPNS_10InputEventE";

pub const AINPUT_EVENT_GET_TYPE: &str = "AInputEvent_getType";
pub const AMOTION_EVENT_GET_ACTION: &str = "AMotionEvent_getAction";
pub const AMOTION_EVENT_GET_POINTER_COUNT: &str = "AMotionEvent_getPointerCount";
pub const AMOTION_EVENT_GET_X: &str = "AMotionEvent_getX";
pub const AMOTION_EVENT_GET_Y: &str = "AMotionEvent_getY";

pub const ANDROID_LOG_WRITE: &str = "__android_log_write";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangled_names_are_itanium() {
        assert!(INPUT_CONSUME.starts_with("_ZN7android13InputConsumer"));
        assert!(INPUT_INITIALIZE_MOTION_EVENT.starts_with("_ZN7android13InputConsumer"));
    }
}
