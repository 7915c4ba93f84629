//! OpenGL ES backend built on `egui_glow`

use std::ffi::c_void;
use std::sync::Arc;

use egui::{ClippedPrimitive, TexturesDelta};
use egui_glow::ShaderVersion;

use eglhud_engine::EglApi;

use super::{GraphicsBinding, OverlayBackend, OverlayError};
use crate::config::{OverlaySettings, ShaderDialect};

/// The host's GL context, loaded through EGL
pub struct GlowBinding {
    gl: Arc<glow::Context>,
}

impl GlowBinding {
    /// Load GL entry points with `loader`
    ///
    /// # Safety
    /// A GLES context must be current on the calling thread and `loader`
    /// must return valid entry points for it.
    pub unsafe fn load(loader: impl FnMut(&str) -> *const c_void) -> Self {
        Self {
            gl: Arc::new(glow::Context::from_loader_function(loader)),
        }
    }

    /// Load through `eglGetProcAddress`, falling back to `libGLESv2.so`
    ///
    /// # Safety
    /// See [`GlowBinding::load`].
    pub unsafe fn from_egl(egl: &EglApi) -> Self {
        Self::load(|name| egl.gl_proc_address(name))
    }
}

impl GraphicsBinding for GlowBinding {
    type Gl = glow::Context;
    type Backend = GlowBackend;

    fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn create_backend(&self, settings: &OverlaySettings) -> Result<GlowBackend, OverlayError> {
        let version = match settings.shader_version {
            ShaderDialect::Es300 => ShaderVersion::Es300,
            ShaderDialect::Es100 => ShaderVersion::Es100,
        };
        let painter = egui_glow::Painter::new(Arc::clone(&self.gl), "", Some(version))
            .map_err(|e| OverlayError::Backend(e.to_string()))?;
        tracing::info!("Overlay GL backend ready ({:?})", version);
        Ok(GlowBackend { painter })
    }
}

/// Paints tessellated egui output with `egui_glow`
pub struct GlowBackend {
    painter: egui_glow::Painter,
}

impl OverlayBackend for GlowBackend {
    fn paint(
        &mut self,
        size_px: [u32; 2],
        pixels_per_point: f32,
        primitives: &[ClippedPrimitive],
        textures: &TexturesDelta,
    ) {
        self.painter
            .paint_and_update_textures(size_px, pixels_per_point, primitives, textures);
    }
}
