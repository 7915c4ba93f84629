//! Android input type definitions
//!
//! `AInputEvent` is the NDK view of `android::InputEvent`; the two are
//! pointer-compatible, which is what lets the consume hooks hand the host's
//! internal events to NDK accessors.

use std::ffi::c_void;

/// Opaque type for AInputEvent / android::InputEvent
#[repr(C)]
pub struct AInputEvent {
    _opaque: [u8; 0],
}

/// Event type returned by `AInputEvent_getType`
pub const AINPUT_EVENT_TYPE_KEY: i32 = 1;
pub const AINPUT_EVENT_TYPE_MOTION: i32 = 2;

/// Motion action masks
pub const AMOTION_EVENT_ACTION_MASK: i32 = 0xff;
pub const AMOTION_EVENT_ACTION_POINTER_INDEX_MASK: i32 = 0xff00;
pub const AMOTION_EVENT_ACTION_POINTER_INDEX_SHIFT: i32 = 8;

/// Motion actions (after masking)
pub const AMOTION_EVENT_ACTION_DOWN: i32 = 0;
pub const AMOTION_EVENT_ACTION_UP: i32 = 1;
pub const AMOTION_EVENT_ACTION_MOVE: i32 = 2;
pub const AMOTION_EVENT_ACTION_CANCEL: i32 = 3;
pub const AMOTION_EVENT_ACTION_OUTSIDE: i32 = 4;
pub const AMOTION_EVENT_ACTION_POINTER_DOWN: i32 = 5;
pub const AMOTION_EVENT_ACTION_POINTER_UP: i32 = 6;
pub const AMOTION_EVENT_ACTION_HOVER_MOVE: i32 = 7;
pub const AMOTION_EVENT_ACTION_SCROLL: i32 = 8;

/// `status_t` value for success
pub const STATUS_OK: i32 = 0;

/// `status_t` catch-all failure
pub const UNKNOWN_ERROR: i32 = i32::MIN;

/// Per-event form: `InputConsumer::initializeMotionEvent`
///
/// The first argument is the freshly initialized event.
pub type InitializeMotionEventFn = unsafe extern "C" fn(event: *mut c_void, message: *mut c_void);

/// Batch form: `InputConsumer::consume`
///
/// Returns `STATUS_OK` and writes the consumed event to `out_event` on success.
pub type InputConsumeFn = unsafe extern "C" fn(
    consumer: *mut c_void,
    factory: *mut c_void,
    consume_batches: bool,
    frame_time: i64,
    out_seq: *mut u32,
    out_event: *mut *mut AInputEvent,
) -> i32;

/// `AInputEvent_getType`
pub type AInputEventGetTypeFn = unsafe extern "C" fn(event: *const AInputEvent) -> i32;

/// `AMotionEvent_getAction`
pub type AMotionEventGetActionFn = unsafe extern "C" fn(event: *const AInputEvent) -> i32;

/// `AMotionEvent_getPointerCount`
pub type AMotionEventGetPointerCountFn = unsafe extern "C" fn(event: *const AInputEvent) -> usize;

/// `AMotionEvent_getX` / `AMotionEvent_getY`
pub type AMotionEventGetAxisFn =
    unsafe extern "C" fn(event: *const AInputEvent, pointer_index: usize) -> f32;
