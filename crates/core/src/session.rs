//! The instrumentation session
//!
//! One [`Session`] exists per process. The attach sequence builds and
//! publishes it before any hook is installed; the native replacement
//! functions reach it through [`Session::get`] and find everything they
//! share there: trampolines, surface lock, click history, pointer queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use eglhud_sdk::{AInputEvent, EGLDisplay, EGLSurface, STATUS_OK};

use crate::clicks::{ClickCounter, Clock};
use crate::config::CoreConfig;
use crate::contain::contained;
use crate::hooks::OriginalFn;
use crate::input::{InputHook, InputHookShape, MotionReader, MotionSample, PointerQueue};
use crate::present::{FrameInput, FrameRenderer, PresentRouter};
use crate::surface::{PresentRoute, SurfaceQuery, SurfaceTracker};

static SESSION: OnceLock<Session> = OnceLock::new();

/// Process-wide instrumentation state
pub struct Session {
    config: CoreConfig,
    router: PresentRouter,
    renderer: Box<dyn FrameRenderer>,
    clicks: ClickCounter,
    pointer: PointerQueue,
    /// Set by the render thread once a frame has been drawn
    overlay_ready: AtomicBool,
    motion: OnceLock<Box<dyn MotionReader>>,
    present_original: OriginalFn,
    input_hook: OnceLock<InputHook>,
}

impl Session {
    pub fn new(
        config: CoreConfig,
        query: Box<dyn SurfaceQuery>,
        renderer: Box<dyn FrameRenderer>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            router: PresentRouter::new(query, SurfaceTracker::new(config.surface)),
            config,
            renderer,
            clicks: ClickCounter::new(clock),
            pointer: PointerQueue::new(),
            overlay_ready: AtomicBool::new(false),
            motion: OnceLock::new(),
            present_original: OriginalFn::empty(),
            input_hook: OnceLock::new(),
        }
    }

    /// Publish the process session
    ///
    /// Returns `None`, dropping `session`, if one was already published.
    pub fn install(session: Session) -> Option<&'static Session> {
        SESSION.set(session).ok()?;
        SESSION.get()
    }

    /// The published session, if attach has got that far
    pub fn get() -> Option<&'static Session> {
        SESSION.get()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn router(&self) -> &PresentRouter {
        &self.router
    }

    pub fn present_original(&self) -> &OriginalFn {
        &self.present_original
    }

    /// Fix the input hook shape; later calls return the first choice
    pub fn select_input_hook(&self, shape: InputHookShape) -> &InputHook {
        self.input_hook.get_or_init(|| InputHook::new(shape))
    }

    pub fn input_hook(&self) -> Option<&InputHook> {
        self.input_hook.get()
    }

    /// Provide the decoder for native input events
    pub fn set_motion_reader(&self, reader: Box<dyn MotionReader>) {
        if self.motion.set(reader).is_err() {
            tracing::warn!("Motion reader already set");
        }
    }

    pub fn overlay_ready(&self) -> bool {
        self.overlay_ready.load(Ordering::Acquire)
    }

    pub fn clicks(&self) -> &ClickCounter {
        &self.clicks
    }

    /// Handle one intercepted present before the original runs
    pub fn on_present(&self, display: EGLDisplay, surface: EGLSurface) -> PresentRoute {
        let route = self.router.route(display, surface);

        if let PresentRoute::Target { width, height } = route {
            let frame = FrameInput {
                width,
                height,
                pointer: self.pointer.drain(),
                clicks_per_second: self.clicks.clicks_per_second(),
            };
            if self.renderer.render(&frame) {
                self.overlay_ready.store(true, Ordering::Release);
                self.router.stats().record_rendered();
            }
        }
        route
    }

    /// Intercepted present: overlay work first, then the host's present
    ///
    /// A panic in overlay work is logged and `original` still runs.
    pub fn present_through<R>(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        original: impl FnOnce() -> R,
    ) -> R {
        contained("Overlay frame", || {
            self.on_present(display, surface);
        });
        original()
    }

    /// Per-event input hook: `original` initializes `event`, then it is forwarded
    ///
    /// # Safety
    /// `event` must be null or point to a live input event once `original` returns.
    pub unsafe fn motion_event_through(&self, event: *const AInputEvent, original: impl FnOnce()) {
        original();
        contained("Input forwarding", || self.on_input_event(event));
    }

    /// Batch input hook: forwards the consumed event only when `original` succeeds
    ///
    /// Returns the status of `original`, whatever forwarding does.
    ///
    /// # Safety
    /// `out_event` must be null or valid for reads once `original` returns.
    pub unsafe fn consume_through(
        &self,
        out_event: *mut *mut AInputEvent,
        original: impl FnOnce() -> i32,
    ) -> i32 {
        let status = original();
        if status == STATUS_OK && !out_event.is_null() {
            let event = *out_event;
            contained("Input forwarding", || self.on_input_event(event));
        }
        status
    }

    /// Handle one native input event after the original consumed it
    ///
    /// # Safety
    /// `event` must be null or point to a live input event.
    pub unsafe fn on_input_event(&self, event: *const AInputEvent) {
        if event.is_null() || !self.overlay_ready() {
            return;
        }
        let Some(reader) = self.motion.get() else {
            return;
        };
        if let Some(sample) = reader.read(event) {
            self.on_motion(sample);
        }
    }

    /// Forward a decoded motion to the overlay and the click counter
    pub fn on_motion(&self, sample: MotionSample) {
        for event in sample.pointer_events() {
            self.pointer.push(event);
        }
        if sample.is_click() {
            self.clicks.register();
            tracing::trace!("Click registered");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tracker", &self.router.tracker().state())
            .field("overlay_ready", &self.overlay_ready())
            .field("input_hook", &self.input_hook.get().map(InputHook::shape))
            .field("frames", &self.router.stats().snapshot())
            .finish()
    }
}
