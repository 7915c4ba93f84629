//! Input interception
//!
//! Host input events are decoded on the input-delivery thread into
//! [`PointerEvent`]s and queued for the render thread, which feeds them to
//! the overlay at the start of its next frame.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use eglhud_engine::AndroidInputApi;
use eglhud_sdk::{
    AInputEvent, AINPUT_EVENT_TYPE_MOTION, AMOTION_EVENT_ACTION_CANCEL, AMOTION_EVENT_ACTION_DOWN,
    AMOTION_EVENT_ACTION_HOVER_MOVE, AMOTION_EVENT_ACTION_MASK, AMOTION_EVENT_ACTION_MOVE,
    AMOTION_EVENT_ACTION_POINTER_DOWN, AMOTION_EVENT_ACTION_UP,
};

use crate::hooks::OriginalFn;

/// Capacity of the input queue between frames
const QUEUE_CAPACITY: usize = 256;

/// Which host input function was hooked
///
/// Chosen once at attach time from whichever symbol resolved first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHookShape {
    /// `InputConsumer::initializeMotionEvent`, called once per event
    PerEvent,
    /// `InputConsumer::consume`, reporting its event through an out-parameter
    Batch,
}

/// The installed input hook and its trampoline
#[derive(Debug)]
pub struct InputHook {
    shape: InputHookShape,
    original: OriginalFn,
}

impl InputHook {
    pub fn new(shape: InputHookShape) -> Self {
        Self {
            shape,
            original: OriginalFn::empty(),
        }
    }

    pub fn shape(&self) -> InputHookShape {
        self.shape
    }

    pub fn original(&self) -> &OriginalFn {
        &self.original
    }
}

/// Reads the fields of a native motion event
pub trait MotionReader: Send + Sync {
    /// Decode `event`, or `None` for non-motion events
    ///
    /// # Safety
    /// `event` must point to a live input event.
    unsafe fn read(&self, event: *const AInputEvent) -> Option<MotionSample>;
}

impl MotionReader for AndroidInputApi {
    unsafe fn read(&self, event: *const AInputEvent) -> Option<MotionSample> {
        if event.is_null() || self.event_type(event) != AINPUT_EVENT_TYPE_MOTION {
            return None;
        }
        let action = self.action(event);
        let (x, y) = if self.pointer_count(event) > 0 {
            self.position(event, 0)
        } else {
            (0.0, 0.0)
        };
        Some(MotionSample { action, x, y })
    }
}

/// A decoded motion event, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Raw action including the pointer index bits
    pub action: i32,
    /// Primary pointer position
    pub x: f32,
    pub y: f32,
}

impl MotionSample {
    pub fn masked_action(&self) -> i32 {
        self.action & AMOTION_EVENT_ACTION_MASK
    }

    /// Primary or secondary pointer going down
    pub fn is_click(&self) -> bool {
        matches!(
            self.masked_action(),
            AMOTION_EVENT_ACTION_DOWN | AMOTION_EVENT_ACTION_POINTER_DOWN
        )
    }

    /// Overlay pointer events for this sample
    ///
    /// The overlay tracks a single pointer, the primary one; secondary
    /// pointers only count as clicks.
    pub fn pointer_events(&self) -> Vec<PointerEvent> {
        let (x, y) = (self.x, self.y);
        match self.masked_action() {
            AMOTION_EVENT_ACTION_DOWN => vec![
                PointerEvent::Moved { x, y },
                PointerEvent::Pressed { x, y },
            ],
            AMOTION_EVENT_ACTION_UP => vec![
                PointerEvent::Moved { x, y },
                PointerEvent::Released { x, y },
                PointerEvent::Gone,
            ],
            AMOTION_EVENT_ACTION_MOVE | AMOTION_EVENT_ACTION_HOVER_MOVE => {
                vec![PointerEvent::Moved { x, y }]
            }
            AMOTION_EVENT_ACTION_CANCEL => vec![PointerEvent::Released { x, y }, PointerEvent::Gone],
            _ => Vec::new(),
        }
    }
}

/// Pointer activity for the overlay, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved { x: f32, y: f32 },
    Pressed { x: f32, y: f32 },
    Released { x: f32, y: f32 },
    Gone,
}

/// Bounded queue from the input thread to the render thread
#[derive(Debug)]
pub struct PointerQueue {
    sender: Sender<PointerEvent>,
    receiver: Receiver<PointerEvent>,
}

impl Default for PointerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Queue an event; dropped when the render thread has fallen behind
    pub fn push(&self, event: PointerEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Pointer queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("Pointer queue disconnected");
            }
        }
    }

    /// Take everything queued so far
    pub fn drain(&self) -> Vec<PointerEvent> {
        self.receiver.try_iter().collect()
    }
}
