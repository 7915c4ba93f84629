//! eglhud Core - Interception, Surface Tracking and Overlay
//!
//! This crate holds everything that runs inside the host once attached:
//!
//! - [`hooks`] - inline function interception with trampolines
//! - [`surface`] / [`present`] - picking the one render target worth drawing on
//! - [`gl_state`] - leaving the host's GL pipeline exactly as found
//! - [`overlay`] - the egui UI drawn each target frame
//! - [`input`] / [`clicks`] - pointer forwarding and click-rate counting
//! - [`session`] / [`attach`] - the process-wide state and how it is set up
//!
//! # Re-exports
//!
//! - [`sdk`] - native ABI definitions
//! - [`engine`] - library loading and symbol resolution

pub use eglhud_engine as engine;
pub use eglhud_sdk as sdk;

pub mod attach;
pub mod clicks;
pub mod config;
mod contain;
pub mod gl_state;
pub mod hooks;
pub mod input;
pub mod overlay;
pub mod present;
pub mod session;
pub mod surface;

pub use attach::{attach, host_session, AttachError, AttachReport, AttachSequencer, Replacements};
pub use clicks::{ClickCounter, Clock, MonotonicClock};
pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use gl_state::{CapturedGlState, GlCapabilities, GlStateAccess, GlStateGuard};
pub use hooks::{HookError, InlineInterceptor, InstalledHook, Interceptor, OriginalFn};
pub use input::{InputHook, InputHookShape, MotionReader, MotionSample, PointerEvent};
pub use overlay::{OverlayError, OverlayPipeline, OverlayRenderer};
pub use present::{FrameInput, FrameRenderer, PresentRouter};
pub use session::Session;
pub use surface::{PresentRoute, SurfaceIdentity, SurfaceQuery, SurfaceTracker, TrackerState};
