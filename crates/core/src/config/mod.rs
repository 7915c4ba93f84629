//! Configuration for eglhud
//!
//! A single TOML file tunes the attach delay, logging, surface heuristics,
//! overlay backend and the initial crosshair. The file is optional and is
//! never written; widget edits made at runtime live in memory only.
//!
//! # Example
//!
//! ```toml
//! attach_delay_ms = 5000
//! log_level = "debug"
//!
//! [surface]
//! min_width = 720
//! require_back_buffer = true
//!
//! [crosshair]
//! enabled = true
//! color = [0, 255, 0, 255]
//! ```

mod loader;

use serde::{Deserialize, Serialize};

use eglhud_sdk::symbols;

pub use loader::{config_path, module_dir, CONFIG_ENV, CONFIG_FILE_NAME};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Delay before hooks are installed, letting the host map its GL and input libraries
    pub attach_delay_ms: u64,

    /// `EnvFilter` directive used when `EGLHUD_LOG` is unset
    pub log_level: String,

    pub surface: SurfaceConfig,
    pub overlay: OverlaySettings,
    pub symbols: SymbolConfig,
    pub crosshair: CrosshairConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            attach_delay_ms: 3000,
            log_level: "info".to_string(),
            surface: SurfaceConfig::default(),
            overlay: OverlaySettings::default(),
            symbols: SymbolConfig::default(),
            crosshair: CrosshairConfig::default(),
        }
    }
}

/// Eligibility thresholds for locking onto a render target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub min_width: i32,
    pub min_height: i32,
    /// Also require `EGL_RENDER_BUFFER == EGL_BACK_BUFFER`
    pub require_back_buffer: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            min_width: 500,
            min_height: 500,
            require_back_buffer: false,
        }
    }
}

/// GLSL dialect handed to the overlay's GL backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderDialect {
    /// `#version 300 es`
    Es300,
    /// `#version 100`
    Es100,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub shader_version: ShaderDialect,
    pub font_scale: FontScaleConfig,
    pub show_click_rate: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            shader_version: ShaderDialect::Es300,
            font_scale: FontScaleConfig::default(),
            show_click_rate: true,
        }
    }
}

/// Font scale derived from the surface height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontScaleConfig {
    pub enabled: bool,
    /// Height at which the scale is 1.0 before clamping
    pub reference_height: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for FontScaleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reference_height: 1080.0,
            min: 1.0,
            max: 3.0,
        }
    }
}

impl FontScaleConfig {
    /// Whether `min..=max` is a usable finite, positive range
    pub fn has_valid_bounds(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }

    /// `[min, max]`, or the default bounds when the configured ones are unusable
    pub fn bounds(&self) -> (f32, f32) {
        if self.has_valid_bounds() {
            (self.min, self.max)
        } else {
            let fallback = Self::default();
            (fallback.min, fallback.max)
        }
    }

    /// Scale for a surface of `height` pixels, clamped to [`Self::bounds`]
    pub fn scale_for_height(&self, height: i32) -> f32 {
        if !self.enabled || !self.reference_height.is_finite() || self.reference_height <= 0.0 {
            return 1.0;
        }
        let (min, max) = self.bounds();
        (height as f32 / self.reference_height).max(min).min(max)
    }
}

/// Names resolved at attach time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    pub egl_library: String,
    pub present: String,
    pub input_library: String,
    /// Lower-level per-event hook, tried first
    pub input_per_event: String,
    /// Batch consume hook, used when the per-event symbol is missing
    pub input_batch: String,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            egl_library: symbols::LIB_EGL.to_string(),
            present: symbols::EGL_SWAP_BUFFERS.to_string(),
            input_library: symbols::LIB_INPUT.to_string(),
            input_per_event: symbols::INPUT_INITIALIZE_MOTION_EVENT.to_string(),
            input_batch: symbols::INPUT_CONSUME.to_string(),
        }
    }
}

/// Initial crosshair state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosshairConfig {
    pub enabled: bool,
    /// Horizontal half-length in pixels
    pub half_length_x: f32,
    /// Vertical half-length in pixels
    pub half_length_y: f32,
    /// Line thickness in pixels
    pub thickness: f32,
    /// Unmultiplied RGBA
    pub color: [u8; 4],
}

impl Default for CrosshairConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            half_length_x: 20.0,
            half_length_y: 20.0,
            thickness: 2.0,
            color: [255, 0, 0, 255],
        }
    }
}

impl CoreConfig {
    /// Load the config, falling back to defaults when no file exists
    pub fn load() -> ConfigResult<Self> {
        let Some(path) = config_path() else {
            tracing::debug!("No config location available, using defaults");
            return Ok(Self::default());
        };

        if path.exists() {
            let config = Self::from_toml(&std::fs::read_to_string(&path)?)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    /// Replace values that would break rendering with their defaults
    fn normalize(&mut self) {
        let font = &mut self.overlay.font_scale;
        if !font.has_valid_bounds() {
            tracing::warn!(
                "Invalid font scale bounds [{}, {}], using defaults",
                font.min,
                font.max
            );
            (font.min, font.max) = font.bounds();
        }
    }
}
