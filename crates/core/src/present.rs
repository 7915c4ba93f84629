//! Present-call routing
//!
//! Every intercepted present is classified by the [`SurfaceTracker`]. Only
//! the locked target reaches a [`FrameRenderer`]; foreign presents touch
//! nothing beyond the EGL queries needed to classify them.

use std::sync::atomic::{AtomicU64, Ordering};

use eglhud_sdk::{EGLDisplay, EGLSurface};

use crate::input::PointerEvent;
use crate::surface::{PresentRoute, SurfaceIdentity, SurfaceQuery, SurfaceTracker};

/// Per-frame input to the overlay
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub width: i32,
    pub height: i32,
    /// Pointer activity since the previous target frame
    pub pointer: Vec<PointerEvent>,
    pub clicks_per_second: u32,
}

/// Draws the overlay onto the current render target
pub trait FrameRenderer: Send + Sync {
    /// Returns whether a frame was drawn, i.e. the overlay is initialized
    fn render(&self, frame: &FrameInput) -> bool;
}

/// Diagnostic counters
#[derive(Debug, Default)]
pub struct FrameStats {
    presented: AtomicU64,
    foreign: AtomicU64,
    rendered: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounts {
    pub presented: u64,
    pub foreign: u64,
    pub rendered: u64,
}

impl FrameStats {
    pub fn snapshot(&self) -> FrameCounts {
        FrameCounts {
            presented: self.presented.load(Ordering::Relaxed),
            foreign: self.foreign.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_rendered(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }
}

/// Classifies presents against the tracked render target
pub struct PresentRouter {
    query: Box<dyn SurfaceQuery>,
    tracker: SurfaceTracker,
    stats: FrameStats,
}

impl PresentRouter {
    pub fn new(query: Box<dyn SurfaceQuery>, tracker: SurfaceTracker) -> Self {
        Self {
            query,
            tracker,
            stats: FrameStats::default(),
        }
    }

    pub fn tracker(&self) -> &SurfaceTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Classify the present of `surface` on the calling thread
    pub fn route(&self, display: EGLDisplay, surface: EGLSurface) -> PresentRoute {
        let presented = self.stats.presented.fetch_add(1, Ordering::Relaxed) + 1;

        let route = match SurfaceIdentity::observe(self.query.as_ref(), display, surface) {
            Some(identity) => self.tracker.classify(&identity),
            None => PresentRoute::Foreign,
        };

        if route == PresentRoute::Foreign {
            self.stats.foreign.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!("Present #{} on {:#x}: {:?}", presented, surface as usize, route);
        route
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SurfaceConfig;
    use eglhud_sdk::{EGLContext, EGLint, EGL_BACK_BUFFER, EGL_HEIGHT, EGL_RENDER_BUFFER, EGL_WIDTH};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted EGL: per-surface sizes and a settable current context
    #[derive(Default, Clone)]
    pub(crate) struct FakeEgl {
        pub context: Arc<Mutex<usize>>,
        pub sizes: Arc<Mutex<HashMap<usize, (EGLint, EGLint)>>>,
    }

    impl FakeEgl {
        pub(crate) fn with_surface(context: usize, surface: usize, size: (EGLint, EGLint)) -> Self {
            let egl = Self::default();
            *egl.context.lock() = context;
            egl.sizes.lock().insert(surface, size);
            egl
        }
    }

    impl SurfaceQuery for FakeEgl {
        fn current_context(&self) -> EGLContext {
            *self.context.lock() as EGLContext
        }

        fn query(&self, _: EGLDisplay, surface: EGLSurface, attribute: EGLint) -> Option<EGLint> {
            let (w, h) = *self.sizes.lock().get(&(surface as usize))?;
            match attribute {
                EGL_WIDTH => Some(w),
                EGL_HEIGHT => Some(h),
                EGL_RENDER_BUFFER => Some(EGL_BACK_BUFFER),
                _ => None,
            }
        }
    }

    fn router(egl: &FakeEgl) -> PresentRouter {
        PresentRouter::new(
            Box::new(egl.clone()),
            SurfaceTracker::new(SurfaceConfig::default()),
        )
    }

    #[test]
    fn test_no_current_context_is_foreign() {
        let egl = FakeEgl::with_surface(0, 0x20, (1920, 1080));
        let router = router(&egl);
        assert_eq!(
            router.route(std::ptr::null_mut(), 0x20 as EGLSurface),
            PresentRoute::Foreign
        );
        assert_eq!(
            router.tracker().state(),
            crate::surface::TrackerState::Unlocked
        );
    }

    #[test]
    fn test_routes_and_counts() {
        let egl = FakeEgl::with_surface(0x10, 0x20, (1920, 1080));
        egl.sizes.lock().insert(0x30, (256, 256));
        let router = router(&egl);

        let target = router.route(std::ptr::null_mut(), 0x20 as EGLSurface);
        let small = router.route(std::ptr::null_mut(), 0x30 as EGLSurface);

        assert_eq!(target, PresentRoute::Target { width: 1920, height: 1080 });
        assert_eq!(small, PresentRoute::Foreign);
        assert_eq!(
            router.stats().snapshot(),
            FrameCounts {
                presented: 2,
                foreign: 1,
                rendered: 0
            }
        );
    }
}
