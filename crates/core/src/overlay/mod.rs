//! Overlay render pipeline
//!
//! [`OverlayPipeline`] owns the egui context: built once on the first frame
//! with a positive size, then advanced one frame per target present.
//! [`OverlayRenderer`] adds the GL binding and brackets every pass with a
//! [`GlStateGuard`].

mod glow_backend;
pub mod ui;

use std::time::Instant;

use egui::{
    ClippedPrimitive, Event, Modifiers, PointerButton, Pos2, RawInput, Rect, TexturesDelta, Vec2,
    ViewportId, ViewportInfo,
};
use parking_lot::Mutex;

pub use glow_backend::{GlowBackend, GlowBinding};
pub use ui::OverlayUi;

use crate::config::{CrosshairConfig, OverlaySettings};
use crate::gl_state::{GlStateAccess, GlStateGuard};
use crate::input::PointerEvent;
use crate::present::{FrameInput, FrameRenderer};

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay backend construction failed: {0}")]
    Backend(String),

    #[error("GL binding unavailable: {0}")]
    Binding(String),
}

/// Submits tessellated UI to the native graphics API
pub trait OverlayBackend {
    fn paint(
        &mut self,
        size_px: [u32; 2],
        pixels_per_point: f32,
        primitives: &[ClippedPrimitive],
        textures: &TexturesDelta,
    );
}

/// A live GL context plus the ability to build a backend on it
pub trait GraphicsBinding {
    type Gl: GlStateAccess;
    type Backend: OverlayBackend;

    fn gl(&self) -> &Self::Gl;

    fn create_backend(&self, settings: &OverlaySettings) -> Result<Self::Backend, OverlayError>;
}

/// UI state that exists once the overlay is initialized
struct OverlayContext<B> {
    ctx: egui::Context,
    backend: B,
    size: [i32; 2],
    pixels_per_point: f32,
    started: Instant,
}

impl<B> OverlayContext<B> {
    fn to_points(&self, x: f32, y: f32) -> Pos2 {
        Pos2::new(x / self.pixels_per_point, y / self.pixels_per_point)
    }

    fn translate(&self, event: PointerEvent) -> Event {
        let button = |x, y, pressed| Event::PointerButton {
            pos: self.to_points(x, y),
            button: PointerButton::Primary,
            pressed,
            modifiers: Modifiers::NONE,
        };
        match event {
            PointerEvent::Moved { x, y } => Event::PointerMoved(self.to_points(x, y)),
            PointerEvent::Pressed { x, y } => button(x, y, true),
            PointerEvent::Released { x, y } => button(x, y, false),
            PointerEvent::Gone => Event::PointerGone,
        }
    }

    fn raw_input(&self, pointer: &[PointerEvent]) -> RawInput {
        let size_points = Vec2::new(self.size[0] as f32, self.size[1] as f32) / self.pixels_per_point;

        let mut raw_input = RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, size_points)),
            time: Some(self.started.elapsed().as_secs_f64()),
            events: pointer.iter().map(|&e| self.translate(e)).collect(),
            ..Default::default()
        };
        raw_input.viewports.insert(
            ViewportId::ROOT,
            ViewportInfo {
                native_pixels_per_point: Some(self.pixels_per_point),
                ..Default::default()
            },
        );
        raw_input
    }
}

/// The immediate-mode UI lifecycle
pub struct OverlayPipeline<B> {
    settings: OverlaySettings,
    ui: OverlayUi,
    context: Option<OverlayContext<B>>,
}

impl<B: OverlayBackend> OverlayPipeline<B> {
    pub fn new(settings: OverlaySettings, crosshair: CrosshairConfig) -> Self {
        Self {
            ui: OverlayUi::new(crosshair, settings.show_click_rate),
            settings,
            context: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    pub fn ui(&self) -> &OverlayUi {
        &self.ui
    }

    pub fn pixels_per_point(&self) -> Option<f32> {
        self.context.as_ref().map(|c| c.pixels_per_point)
    }

    /// Build the UI context on the first call with a positive size
    ///
    /// Returns `Ok(true)` only for the call that constructed it. egui is built
    /// without its `persistence` feature, so no UI state reaches disk.
    pub fn ensure_initialized<F>(
        &mut self,
        width: i32,
        height: i32,
        create_backend: F,
    ) -> Result<bool, OverlayError>
    where
        F: FnOnce(&OverlaySettings) -> Result<B, OverlayError>,
    {
        if self.context.is_some() || width <= 0 || height <= 0 {
            return Ok(false);
        }

        let backend = create_backend(&self.settings)?;
        let pixels_per_point = self.settings.font_scale.scale_for_height(height);

        self.context = Some(OverlayContext {
            ctx: egui::Context::default(),
            backend,
            size: [width, height],
            pixels_per_point,
            started: Instant::now(),
        });

        tracing::info!(
            "Overlay initialized at {}x{} (scale {:.2})",
            width,
            height,
            pixels_per_point
        );
        Ok(true)
    }

    /// Advance and paint one UI frame
    ///
    /// Returns `false` without doing anything when not yet initialized.
    pub fn render_frame(&mut self, frame: &FrameInput) -> bool {
        let Some(context) = self.context.as_mut() else {
            return false;
        };
        let ui = &mut self.ui;

        context.size = [frame.width, frame.height];
        let raw_input = context.raw_input(&frame.pointer);

        let output = context
            .ctx
            .run(raw_input, |ctx| ui.show(ctx, frame.clicks_per_second));
        let primitives = context.ctx.tessellate(output.shapes, output.pixels_per_point);

        let size_px = [frame.width.max(0) as u32, frame.height.max(0) as u32];
        context
            .backend
            .paint(size_px, output.pixels_per_point, &primitives, &output.textures_delta);

        tracing::trace!("Overlay frame painted ({} primitives)", primitives.len());
        true
    }
}

/// Render-thread-only wrapper
///
/// GL objects are only valid on the thread that has the context current.
struct RenderThreadOnly<T>(T);

// SAFETY: the wrapped value is only touched from the present hook while the
// locked context is current, and EGL allows a context to be current on one
// thread at a time.
unsafe impl<T> Send for RenderThreadOnly<T> {}

struct Connected<G: GraphicsBinding> {
    binding: G,
    pipeline: OverlayPipeline<G::Backend>,
}

enum RendererState<G: GraphicsBinding> {
    Disconnected,
    Connected(Box<Connected<G>>),
    Failed,
}

type Connect<G> = Box<dyn Fn() -> Result<G, OverlayError> + Send + Sync>;

/// Draws the overlay on the locked surface, guarding host GL state
pub struct OverlayRenderer<G: GraphicsBinding> {
    connect: Connect<G>,
    settings: OverlaySettings,
    crosshair: CrosshairConfig,
    state: Mutex<RenderThreadOnly<RendererState<G>>>,
}

impl<G: GraphicsBinding> OverlayRenderer<G> {
    /// `connect` runs on the render thread at the first target frame
    pub fn new(
        settings: OverlaySettings,
        crosshair: CrosshairConfig,
        connect: impl Fn() -> Result<G, OverlayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            connect: Box::new(connect),
            settings,
            crosshair,
            state: Mutex::new(RenderThreadOnly(RendererState::Disconnected)),
        }
    }
}

impl<G: GraphicsBinding> FrameRenderer for OverlayRenderer<G> {
    fn render(&self, frame: &FrameInput) -> bool {
        let mut state = self.state.lock();
        let state = &mut state.0;

        if let RendererState::Disconnected = state {
            *state = match (self.connect)() {
                Ok(binding) => RendererState::Connected(Box::new(Connected {
                    binding,
                    pipeline: OverlayPipeline::new(self.settings, self.crosshair),
                })),
                Err(e) => {
                    tracing::error!("Overlay disabled: {}", e);
                    RendererState::Failed
                }
            };
        }

        let RendererState::Connected(connected) = state else {
            return false;
        };
        let Connected { binding, pipeline } = connected.as_mut();

        let rendered = {
            let _guard = GlStateGuard::new(binding.gl());
            pipeline
                .ensure_initialized(frame.width, frame.height, |settings| {
                    binding.create_backend(settings)
                })
                .map(|_| pipeline.render_frame(frame))
        };

        rendered.unwrap_or_else(|e| {
            tracing::error!("Overlay disabled: {}", e);
            *state = RendererState::Failed;
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl_state::tests::FakeGl;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingBackend {
        paints: Vec<([u32; 2], f32, usize)>,
    }

    impl OverlayBackend for RecordingBackend {
        fn paint(
            &mut self,
            size_px: [u32; 2],
            pixels_per_point: f32,
            primitives: &[ClippedPrimitive],
            _textures: &TexturesDelta,
        ) {
            self.paints.push((size_px, pixels_per_point, primitives.len()));
        }
    }

    fn frame(width: i32, height: i32) -> FrameInput {
        FrameInput {
            width,
            height,
            pointer: Vec::new(),
            clicks_per_second: 0,
        }
    }

    fn pipeline() -> OverlayPipeline<RecordingBackend> {
        OverlayPipeline::new(OverlaySettings::default(), CrosshairConfig::default())
    }

    #[test]
    fn test_initialization_is_idempotent() {
        let mut pipeline = pipeline();
        let mut constructed = 0;

        for (w, h) in [(1920, 1080), (1920, 1080), (1280, 720)] {
            pipeline
                .ensure_initialized(w, h, |_| {
                    constructed += 1;
                    Ok(RecordingBackend::default())
                })
                .unwrap();
        }

        assert_eq!(constructed, 1);
        assert!(pipeline.is_initialized());
    }

    #[test]
    fn test_non_positive_size_does_not_initialize() {
        let mut pipeline = pipeline();
        for (w, h) in [(0, 1080), (1920, 0), (-1, -1)] {
            let built = pipeline
                .ensure_initialized(w, h, |_| Ok(RecordingBackend::default()))
                .unwrap();
            assert!(!built);
        }
        assert!(!pipeline.is_initialized());
    }

    #[test]
    fn test_failed_backend_leaves_uninitialized() {
        let mut pipeline = pipeline();
        let result =
            pipeline.ensure_initialized(1920, 1080, |_| Err(OverlayError::Backend("no shaders".into())));
        assert!(result.is_err());
        assert!(!pipeline.is_initialized());
    }

    #[test]
    fn test_render_before_init_is_noop() {
        let mut pipeline = pipeline();
        assert!(!pipeline.render_frame(&frame(1920, 1080)));
    }

    #[test]
    fn test_scale_follows_height() {
        let mut pipeline = pipeline();
        pipeline
            .ensure_initialized(4000, 2160, |_| Ok(RecordingBackend::default()))
            .unwrap();
        assert_eq!(pipeline.pixels_per_point(), Some(2.0));
    }

    #[test]
    fn test_render_paints_at_surface_size() {
        let mut pipeline = OverlayPipeline::new(
            OverlaySettings::default(),
            CrosshairConfig {
                enabled: true,
                ..Default::default()
            },
        );
        pipeline
            .ensure_initialized(1920, 1080, |_| Ok(RecordingBackend::default()))
            .unwrap();

        let mut input = frame(1920, 1080);
        input.pointer = vec![
            PointerEvent::Moved { x: 50.0, y: 150.0 },
            PointerEvent::Pressed { x: 50.0, y: 150.0 },
        ];
        assert!(pipeline.render_frame(&input));
        assert!(pipeline.render_frame(&frame(1920, 1080)));

        let backend = &pipeline.context.as_ref().unwrap().backend;
        assert_eq!(backend.paints.len(), 2);
        let (size, ppp, primitives) = backend.paints[1];
        assert_eq!(size, [1920, 1080]);
        assert_eq!(ppp, 1.0);
        assert!(primitives > 0);
    }

    struct FakeBinding {
        gl: FakeGl,
        backends: Arc<AtomicUsize>,
    }

    impl GraphicsBinding for FakeBinding {
        type Gl = FakeGl;
        type Backend = RecordingBackend;

        fn gl(&self) -> &FakeGl {
            &self.gl
        }

        fn create_backend(&self, _: &OverlaySettings) -> Result<RecordingBackend, OverlayError> {
            self.backends.fetch_add(1, Ordering::SeqCst);
            // Backend construction binds its own objects
            self.gl.scribble();
            Ok(RecordingBackend::default())
        }
    }

    #[test]
    fn test_renderer_connects_once_and_restores_gl() {
        let connects = Arc::new(AtomicUsize::new(0));
        let backends = Arc::new(AtomicUsize::new(0));
        let (c, b) = (Arc::clone(&connects), Arc::clone(&backends));

        let renderer = OverlayRenderer::new(
            OverlaySettings::default(),
            CrosshairConfig::default(),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(FakeBinding {
                    gl: FakeGl::with_host_state(),
                    backends: Arc::clone(&b),
                })
            },
        );

        assert!(renderer.render(&frame(1920, 1080)));
        assert!(renderer.render(&frame(1920, 1080)));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(backends.load(Ordering::SeqCst), 1);

        let state = renderer.state.lock();
        let RendererState::Connected(connected) = &state.0 else {
            panic!("renderer should be connected");
        };
        assert_eq!(connected.binding.gl.snapshot(), FakeGl::with_host_state().snapshot());
    }

    #[test]
    fn test_renderer_stops_after_connect_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&attempts);
        let renderer: OverlayRenderer<FakeBinding> = OverlayRenderer::new(
            OverlaySettings::default(),
            CrosshairConfig::default(),
            move || {
                a.fetch_add(1, Ordering::SeqCst);
                Err(OverlayError::Binding("no GL".into()))
            },
        );

        assert!(!renderer.render(&frame(1920, 1080)));
        assert!(!renderer.render(&frame(1920, 1080)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
