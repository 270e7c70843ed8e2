//! # Materials
//!
//! A material describes, per pass type and pass index, which render states an
//! object needs: depth testing, alpha test mode, blend mode, colour channels,
//! GPU programs and textures. The render list asks these questions while
//! building the state tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::collections::LightId;
use crate::render::graphics::{GpuProgramId, TextureId, MAX_TEXTURE_UNITS};

/// Pass categories an opaque or transparent object can take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaterialRenderType {
    /// Depth-only pre-pass
    Z,
    /// Per-light additive pass
    Light,
    /// Diffuse / ambient pass
    Diffuse,
}

/// Alpha test modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlphaMode {
    /// No alpha test
    Solid,
    /// Alpha tested against a fixed reference
    Trans,
}

/// Blend modes, mapped onto blend factors by the blend render state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// Blending off
    Replace,
    /// `One, One`
    Add,
    /// `Zero, SrcColor`
    Mul,
    /// `DestColor, SrcColor`
    MulX2,
    /// `SrcAlpha, OneMinusSrcAlpha`
    Alpha,
    /// `DestAlpha, One`
    DestAlphaAdd,
}

/// Colour channels written by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChannelMode {
    /// All channels
    Rgba,
    /// Colour only
    Rgb,
    /// Alpha only
    A,
    /// No colour channels (depth only)
    Z,
}

/// Material queried by the render list and render states
pub trait Material: fmt::Debug + Send + Sync {
    /// Material name
    fn name(&self) -> &str;

    /// True if the object goes through the transparent path
    fn is_transparent(&self) -> bool;

    /// True if the material uses alpha testing
    fn has_alpha(&self) -> bool;

    /// Whether the depth test is on
    fn uses_depth_test(&self) -> bool;

    /// True if the material takes part in a pass type
    fn uses_type(&self, ty: MaterialRenderType) -> bool;

    /// Number of passes of a pass type
    fn num_passes(&self, ty: MaterialRenderType, light: Option<LightId>) -> usize;

    /// Alpha mode of a pass
    fn alpha_mode(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> AlphaMode;

    /// Blend mode of a pass
    fn blend_mode(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> BlendMode;

    /// Written channels of a pass
    fn channel_mode(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> ChannelMode;

    /// Vertex program of a pass
    fn vertex_program(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> Option<GpuProgramId>;

    /// Fragment program of a pass
    fn fragment_program(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> Option<GpuProgramId>;

    /// True if the vertex program reads light parameters
    fn vertex_program_uses_light(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> bool;

    /// True if the vertex program reads the eye position
    fn vertex_program_uses_eye(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> bool;

    /// Texture bound on a unit
    fn texture(&self, unit: usize, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> Option<TextureId>;

    /// All texture units of a pass
    fn textures(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> [Option<TextureId>; MAX_TEXTURE_UNITS] {
        let mut units = [None; MAX_TEXTURE_UNITS];
        for (unit, slot) in units.iter_mut().enumerate() {
            *slot = self.texture(unit, ty, pass, light);
        }
        units
    }
}

/// Single-pass material with an optional per-light program pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardMaterial {
    /// Material name
    pub name: String,
    /// Drawn in the transparent pass
    pub transparent: bool,
    /// Alpha tested
    pub has_alpha: bool,
    /// Depth tested
    pub depth_test: bool,
    /// Blend mode used when transparent
    pub trans_blend: BlendMode,
    /// Diffuse texture
    pub diffuse_texture: Option<TextureId>,
    /// Normal map used by the light pass
    pub normal_texture: Option<TextureId>,
    /// Vertex program of the light pass
    pub light_vertex_program: Option<GpuProgramId>,
    /// Fragment program of the light pass
    pub light_fragment_program: Option<GpuProgramId>,
}

impl StandardMaterial {
    /// Opaque material
    pub fn solid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transparent: false,
            has_alpha: false,
            depth_test: true,
            trans_blend: BlendMode::Alpha,
            diffuse_texture: None,
            normal_texture: None,
            light_vertex_program: None,
            light_fragment_program: None,
        }
    }

    /// Transparent material blended with `blend`
    pub fn transparent(name: impl Into<String>, blend: BlendMode) -> Self {
        Self {
            transparent: true,
            trans_blend: blend,
            ..Self::solid(name)
        }
    }

    /// Set the diffuse texture
    #[must_use]
    pub const fn with_diffuse(mut self, texture: TextureId) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    /// Set the light pass programs
    #[must_use]
    pub const fn with_light_programs(mut self, vertex: GpuProgramId, fragment: GpuProgramId) -> Self {
        self.light_vertex_program = Some(vertex);
        self.light_fragment_program = Some(fragment);
        self
    }

    /// Enable alpha testing
    #[must_use]
    pub const fn with_alpha_test(mut self) -> Self {
        self.has_alpha = true;
        self
    }
}

impl Material for StandardMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    fn uses_depth_test(&self) -> bool {
        self.depth_test
    }

    fn uses_type(&self, ty: MaterialRenderType) -> bool {
        match ty {
            MaterialRenderType::Z | MaterialRenderType::Light => !self.transparent,
            MaterialRenderType::Diffuse => true,
        }
    }

    fn num_passes(&self, ty: MaterialRenderType, _light: Option<LightId>) -> usize {
        usize::from(self.uses_type(ty))
    }

    fn alpha_mode(&self, _ty: MaterialRenderType, _pass: usize, _light: Option<LightId>) -> AlphaMode {
        if self.has_alpha { AlphaMode::Trans } else { AlphaMode::Solid }
    }

    fn blend_mode(&self, ty: MaterialRenderType, _pass: usize, _light: Option<LightId>) -> BlendMode {
        match ty {
            MaterialRenderType::Z => BlendMode::Replace,
            MaterialRenderType::Light => BlendMode::Add,
            MaterialRenderType::Diffuse if self.transparent => self.trans_blend,
            MaterialRenderType::Diffuse => BlendMode::Mul,
        }
    }

    fn channel_mode(&self, ty: MaterialRenderType, _pass: usize, _light: Option<LightId>) -> ChannelMode {
        match ty {
            MaterialRenderType::Z => ChannelMode::Z,
            MaterialRenderType::Light => ChannelMode::Rgb,
            MaterialRenderType::Diffuse => ChannelMode::Rgba,
        }
    }

    fn vertex_program(&self, ty: MaterialRenderType, _pass: usize, _light: Option<LightId>) -> Option<GpuProgramId> {
        (ty == MaterialRenderType::Light).then_some(self.light_vertex_program).flatten()
    }

    fn fragment_program(&self, ty: MaterialRenderType, _pass: usize, _light: Option<LightId>) -> Option<GpuProgramId> {
        (ty == MaterialRenderType::Light).then_some(self.light_fragment_program).flatten()
    }

    fn vertex_program_uses_light(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> bool {
        self.vertex_program(ty, pass, light).is_some()
    }

    fn vertex_program_uses_eye(&self, ty: MaterialRenderType, pass: usize, light: Option<LightId>) -> bool {
        self.vertex_program(ty, pass, light).is_some()
    }

    fn texture(&self, unit: usize, ty: MaterialRenderType, _pass: usize, _light: Option<LightId>) -> Option<TextureId> {
        match (ty, unit) {
            (MaterialRenderType::Z, 0) if self.has_alpha => self.diffuse_texture,
            (MaterialRenderType::Light, 0) => self.normal_texture,
            (MaterialRenderType::Diffuse, 0) => self.diffuse_texture,
            _ => None,
        }
    }
}
