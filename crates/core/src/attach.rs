//! Attach sequence
//!
//! Runs once per process: build and publish the [`Session`], redirect the
//! present call, then redirect one of the two input functions. A missing or
//! unhookable present call aborts the attach; input failures only cost
//! pointer and click tracking.

use eglhud_engine::{AndroidInputApi, EglApi, ResolveError, ResolvedSymbol, SymbolSource};

use crate::clicks::MonotonicClock;
use crate::config::{CoreConfig, SymbolConfig};
use crate::hooks::{HookError, InstalledHook, Interceptor};
use crate::input::InputHookShape;
use crate::overlay::{GlowBinding, OverlayRenderer};
use crate::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("Present call unavailable: {0}")]
    PresentSymbol(#[source] ResolveError),

    #[error("Failed to hook present call: {0}")]
    PresentHook(#[source] HookError),

    #[error("No input function to hook: {0}")]
    InputSymbol(#[source] ResolveError),

    #[error("Failed to hook input function: {0}")]
    InputHook(#[source] HookError),

    #[error("An instrumentation session is already attached")]
    AlreadyAttached,
}

impl AttachError {
    /// Whether the overlay cannot run at all
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InputSymbol(_) | Self::InputHook(_))
    }
}

/// Addresses of the native replacement functions
#[derive(Debug, Clone, Copy)]
pub struct Replacements {
    pub present: *const (),
    pub input_per_event: *const (),
    pub input_batch: *const (),
}

/// Outcome of a successful attach
#[derive(Debug)]
pub struct AttachReport {
    pub present: InstalledHook,
    /// Input tracking degrades instead of failing the attach
    pub input: Result<(InputHookShape, InstalledHook), AttachError>,
}

/// Resolves hook targets and installs the redirections
pub struct AttachSequencer<'a> {
    source: &'a dyn SymbolSource,
    interceptor: &'a dyn Interceptor,
    symbols: &'a SymbolConfig,
}

impl<'a> AttachSequencer<'a> {
    pub fn new(
        source: &'a dyn SymbolSource,
        interceptor: &'a dyn Interceptor,
        symbols: &'a SymbolConfig,
    ) -> Self {
        Self {
            source,
            interceptor,
            symbols,
        }
    }

    /// Install both hooks into `session`
    #[tracing::instrument(skip_all)]
    pub fn run(
        &self,
        session: &Session,
        replacements: &Replacements,
    ) -> Result<AttachReport, AttachError> {
        let present = self.install_present(session, replacements.present)?;

        let input = self.install_input(session, replacements);
        if let Err(e) = &input {
            tracing::warn!("Input tracking disabled: {}", e);
        }

        Ok(AttachReport { present, input })
    }

    fn install_present(
        &self,
        session: &Session,
        replacement: *const (),
    ) -> Result<InstalledHook, AttachError> {
        let symbol = self
            .source
            .lookup(&self.symbols.egl_library, &self.symbols.present)
            .map_err(AttachError::PresentSymbol)?;

        let installed = unsafe {
            self.interceptor.intercept(
                &symbol.name,
                symbol.as_ptr(),
                replacement,
                session.present_original(),
            )
        }
        .map_err(AttachError::PresentHook)?;

        tracing::info!("Present call {} hooked", symbol.name);
        Ok(installed)
    }

    /// Per-event form first, batch form when its symbol is missing
    fn resolve_input(&self) -> Result<(InputHookShape, ResolvedSymbol), AttachError> {
        let library = self
            .source
            .open(&self.symbols.input_library)
            .map_err(AttachError::InputSymbol)?;

        match self.source.resolve(&library, &self.symbols.input_per_event) {
            Ok(symbol) => Ok((InputHookShape::PerEvent, symbol)),
            Err(e) => {
                tracing::debug!("{}; falling back to batch consume", e);
                self.source
                    .resolve(&library, &self.symbols.input_batch)
                    .map(|symbol| (InputHookShape::Batch, symbol))
                    .map_err(AttachError::InputSymbol)
            }
        }
    }

    fn install_input(
        &self,
        session: &Session,
        replacements: &Replacements,
    ) -> Result<(InputHookShape, InstalledHook), AttachError> {
        let (shape, symbol) = self.resolve_input()?;

        let hook = session.select_input_hook(shape);
        if hook.shape() != shape {
            return Err(AttachError::AlreadyAttached);
        }

        let replacement = match shape {
            InputHookShape::PerEvent => replacements.input_per_event,
            InputHookShape::Batch => replacements.input_batch,
        };

        let installed = unsafe {
            self.interceptor
                .intercept(&symbol.name, symbol.as_ptr(), replacement, hook.original())
        }
        .map_err(AttachError::InputHook)?;

        tracing::info!("Input hooked ({:?})", shape);
        Ok((shape, installed))
    }
}

/// Build a session wired to the host's EGL and NDK input libraries
#[tracing::instrument(skip_all)]
pub fn host_session(source: &dyn SymbolSource, config: CoreConfig) -> Result<Session, AttachError> {
    let egl_library = source
        .open(&config.symbols.egl_library)
        .map_err(AttachError::PresentSymbol)?;
    let egl = EglApi::resolve(source, &egl_library).map_err(AttachError::PresentSymbol)?;

    let loader = egl.clone();
    // SAFETY: the renderer connects from the present hook of the locked
    // surface, where the host's GLES context is current.
    let renderer = OverlayRenderer::new(config.overlay, config.crosshair, move || {
        Ok(unsafe { GlowBinding::from_egl(&loader) })
    });

    let session = Session::new(
        config,
        Box::new(egl),
        Box::new(renderer),
        Box::new(MonotonicClock::new()),
    );

    match AndroidInputApi::resolve(source) {
        Ok(api) => session.set_motion_reader(Box::new(api)),
        Err(e) => tracing::warn!("Input events cannot be decoded: {}", e),
    }

    Ok(session)
}

/// Full attach: build and publish the session, then install the hooks
pub fn attach(
    config: CoreConfig,
    source: &dyn SymbolSource,
    interceptor: &dyn Interceptor,
    replacements: &Replacements,
) -> Result<(&'static Session, AttachReport), AttachError> {
    let session = host_session(source, config)?;
    let session = Session::install(session).ok_or(AttachError::AlreadyAttached)?;

    let symbols = session.config().symbols.clone();
    let report = AttachSequencer::new(source, interceptor, &symbols).run(session, replacements)?;
    Ok((session, report))
}
