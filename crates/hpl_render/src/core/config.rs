//! # Renderer Configuration
//!
//! Serializable settings for the 3D renderer. Loaded through the [`Config`]
//! trait from `.toml` or `.ron` files; every field has a default so partial
//! files are accepted.

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};
use crate::foundation::math::Color;
use crate::render::graphics::GpuProgramId;
use crate::render::render_list::MAX_NUM_OF_LIGHTS;
use crate::render::render_settings::{DebugFlags, ShowShadows};

/// Distance fog settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    /// Whether the fog pass runs
    pub active: bool,
    /// Distance where fog starts
    pub start: f32,
    /// Distance of full fog
    pub end: f32,
    /// Fog colour
    pub color: Color,
    /// Pull the visibility far plane in to `end`
    pub culling: bool,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            active: false,
            start: 5.0,
            end: 30.0,
            color: Color::rgb(0.5, 0.5, 0.5),
            culling: false,
        }
    }
}

/// # Renderer Configuration
///
/// Controls which passes [`Renderer3D`](crate::render::Renderer3D) runs and
/// how shadows, occlusion queries and debug output behave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Which shadow casters are drawn into the stencil buffer
    pub show_shadows: ShowShadows,
    /// Run hardware occlusion queries after the Z pass
    pub use_occlusion_queries: bool,
    /// Restrict each light pass to the light's screen rectangle
    pub use_light_scissor: bool,
    /// Track previous-frame matrices for motion blur
    pub motion_blur: bool,
    /// Fog settings
    pub fog: FogConfig,
    /// Debug overlays
    pub debug_flags: DebugFlags,
    /// Log every state change while walking the render tree
    pub log_rendering: bool,
    /// Screen size in pixels used for light clip rectangles
    pub screen_size: (i32, i32),
    /// Upper bound on lights per frame (capped at [`MAX_NUM_OF_LIGHTS`])
    pub max_lights: usize,
    /// GPU program used by the fog pass
    pub fog_program: Option<GpuProgramId>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            show_shadows: ShowShadows::All,
            use_occlusion_queries: false,
            use_light_scissor: true,
            motion_blur: false,
            fog: FogConfig::default(),
            debug_flags: DebugFlags::empty(),
            log_rendering: false,
            screen_size: (800, 600),
            max_lights: MAX_NUM_OF_LIGHTS,
            fog_program: None,
        }
    }
}

impl RendererConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shadow mode
    #[must_use]
    pub const fn with_shadows(mut self, show_shadows: ShowShadows) -> Self {
        self.show_shadows = show_shadows;
        self
    }

    /// Enable or disable occlusion queries
    #[must_use]
    pub const fn with_occlusion_queries(mut self, enabled: bool) -> Self {
        self.use_occlusion_queries = enabled;
        self
    }

    /// Enable or disable motion blur tracking
    #[must_use]
    pub const fn with_motion_blur(mut self, enabled: bool) -> Self {
        self.motion_blur = enabled;
        self
    }

    /// Set fog settings
    #[must_use]
    pub const fn with_fog(mut self, fog: FogConfig) -> Self {
        self.fog = fog;
        self
    }

    /// Set the fog program
    #[must_use]
    pub const fn with_fog_program(mut self, program: GpuProgramId) -> Self {
        self.fog_program = Some(program);
        self
    }

    /// Set debug flags
    #[must_use]
    pub const fn with_debug_flags(mut self, flags: DebugFlags) -> Self {
        self.debug_flags = flags;
        self
    }

    /// Set the screen size
    #[must_use]
    pub const fn with_screen_size(mut self, width: i32, height: i32) -> Self {
        self.screen_size = (width, height);
        self
    }

    /// Effective light cap
    pub fn light_limit(&self) -> usize {
        self.max_lights.min(MAX_NUM_OF_LIGHTS)
    }
}

impl Config for RendererConfig {}
