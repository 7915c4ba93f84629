//! Surface identity tracking
//!
//! A host may present from several (context, surface) pairs: splash screens,
//! offscreen passes, secondary windows. The tracker locks onto the first pair
//! that looks like the real game frame and ignores every other pair for the
//! rest of the process.
//!
//! Eligibility is a size and buffer-kind heuristic. It usually picks the main
//! frame but can mis-lock on a large auxiliary surface; there is no recovery
//! from a wrong lock.

use std::sync::OnceLock;

use eglhud_engine::EglApi;
use eglhud_sdk::{
    EGLContext, EGLDisplay, EGLSurface, EGLint, EGL_BACK_BUFFER, EGL_HEIGHT, EGL_NO_CONTEXT,
    EGL_RENDER_BUFFER, EGL_WIDTH,
};

use crate::config::SurfaceConfig;

/// EGL queries needed to identify a presented surface
pub trait SurfaceQuery: Send + Sync {
    fn current_context(&self) -> EGLContext;

    fn query(&self, display: EGLDisplay, surface: EGLSurface, attribute: EGLint)
        -> Option<EGLint>;
}

impl SurfaceQuery for EglApi {
    fn current_context(&self) -> EGLContext {
        EglApi::current_context(self)
    }

    fn query(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        attribute: EGLint,
    ) -> Option<EGLint> {
        self.query_surface(display, surface, attribute)
    }
}

/// A (context, surface) pair, compared by handle value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfacePair {
    pub context: usize,
    pub surface: usize,
}

/// Everything observed about one presented surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceIdentity {
    pub display: usize,
    pub pair: SurfacePair,
    pub width: EGLint,
    pub height: EGLint,
    /// `EGL_RENDER_BUFFER`, when the query succeeded
    pub render_buffer: Option<EGLint>,
}

impl SurfaceIdentity {
    /// Describe the surface being presented on the calling thread
    ///
    /// Returns `None` when no context is current; such a present is foreign.
    pub fn observe<Q: SurfaceQuery + ?Sized>(
        query: &Q,
        display: EGLDisplay,
        surface: EGLSurface,
    ) -> Option<Self> {
        let context = query.current_context();
        if context == EGL_NO_CONTEXT {
            return None;
        }

        Some(Self {
            display: display as usize,
            pair: SurfacePair {
                context: context as usize,
                surface: surface as usize,
            },
            width: query.query(display, surface, EGL_WIDTH).unwrap_or(0),
            height: query.query(display, surface, EGL_HEIGHT).unwrap_or(0),
            render_buffer: query.query(display, surface, EGL_RENDER_BUFFER),
        })
    }

    pub fn is_back_buffer(&self) -> bool {
        self.render_buffer == Some(EGL_BACK_BUFFER)
    }
}

/// Tracker state; `Locked` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Unlocked,
    Locked(SurfacePair),
}

/// Verdict for one present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentRoute {
    /// The locked render target; the overlay draws at this size
    Target { width: EGLint, height: EGLint },
    /// Anything else; passed straight through
    Foreign,
}

/// Locks onto the authoritative render target
#[derive(Debug)]
pub struct SurfaceTracker {
    config: SurfaceConfig,
    locked: OnceLock<SurfacePair>,
}

impl SurfaceTracker {
    pub fn new(config: SurfaceConfig) -> Self {
        Self {
            config,
            locked: OnceLock::new(),
        }
    }

    pub fn state(&self) -> TrackerState {
        match self.locked.get() {
            Some(pair) => TrackerState::Locked(*pair),
            None => TrackerState::Unlocked,
        }
    }

    /// Whether this surface may become the render target
    pub fn is_eligible(&self, identity: &SurfaceIdentity) -> bool {
        identity.width >= self.config.min_width
            && identity.height >= self.config.min_height
            && (!self.config.require_back_buffer || identity.is_back_buffer())
    }

    /// Route one observed present, locking if this is the first eligible pair
    ///
    /// Once locked, the locked pair is the target whatever its current size.
    pub fn classify(&self, identity: &SurfaceIdentity) -> PresentRoute {
        let locked = match self.locked.get() {
            Some(pair) => *pair,
            None if self.is_eligible(identity) => {
                let winner = *self.locked.get_or_init(|| identity.pair);
                if winner == identity.pair {
                    tracing::info!(
                        "Locked render target: context {:#x} surface {:#x} ({}x{})",
                        identity.pair.context,
                        identity.pair.surface,
                        identity.width,
                        identity.height
                    );
                }
                winner
            }
            None => {
                tracing::trace!(
                    "Ineligible surface {:#x} ({}x{})",
                    identity.pair.surface,
                    identity.width,
                    identity.height
                );
                return PresentRoute::Foreign;
            }
        };

        if locked == identity.pair {
            PresentRoute::Target {
                width: identity.width,
                height: identity.height,
            }
        } else {
            PresentRoute::Foreign
        }
    }
}
