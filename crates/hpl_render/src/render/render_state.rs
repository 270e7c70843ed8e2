//! # Render States
//!
//! One node of the render tree carries one [`RenderState`]. States of
//! different kinds never compete at the same tree depth; within a kind the
//! ordering below groups objects so that walking the tree depth-first issues
//! each device change once per run of equal states.
//!
//! Applying a state diffs it against the state of the same kind that is
//! currently bound and issues only the calls that differ.

use std::cmp::Ordering;

use crate::foundation::collections::{EntityId, LightId, SectorId};
use crate::foundation::logging::debug;
use crate::foundation::math::{Mat4, Mat4Ext};
use crate::render::graphics::{
    AlphaTestFunc, BlendFunc, GpuProgramId, LowLevelGraphics, MatrixType, ProgramParam, TextureId, VertexBufferId,
    MAX_TEXTURE_UNITS,
};
use crate::render::light::LightMap;
use crate::render::material::{AlphaMode, BlendMode, ChannelMode};
use crate::render::render_settings::RenderSettings;
use crate::scene::entity::EntityStore;
use crate::spatial::frustum::Frustum;

/// Alpha test reference used by alpha-tested materials
pub const ALPHA_TEST_REFERENCE: f32 = 0.6;

/// Kind of a render state, in tree order from root to leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderStateKind {
    /// Tree root
    Root = 0,
    /// Sector the object is in
    Sector,
    /// Material pass index
    Pass,
    /// Depth test toggle
    DepthTest,
    /// View depth, for transparent ordering
    Depth,
    /// Alpha test
    Alpha,
    /// Blend and colour mask
    Blend,
    /// GPU programs
    GpuProgram,
    /// Texture units
    Texture,
    /// Vertex buffer
    VertexBuffer,
    /// Model matrix
    Matrix,
    /// Draw leaf
    Render,
}

impl RenderStateKind {
    /// Number of kinds
    pub const COUNT: usize = 12;
}

/// GPU program binding of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramBinding {
    /// Vertex program
    pub vertex: Option<GpuProgramId>,
    /// Fragment program
    pub fragment: Option<GpuProgramId>,
    /// The vertex program reads light parameters
    pub uses_light: bool,
    /// The vertex program reads the eye position
    pub uses_eye: bool,
    /// Light the parameters come from
    pub light: Option<LightId>,
}

/// Single render state stored in a tree node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderState {
    /// Tree root, applies nothing
    Root,
    /// Sector grouping
    Sector(Option<SectorId>),
    /// Pass index
    Pass(usize),
    /// Depth test on or off
    DepthTest(bool),
    /// View depth of a transparent object, sorted ascending
    Depth(f32),
    /// Alpha test mode
    Alpha(AlphaMode),
    /// Blend mode and written channels
    Blend {
        /// Blend mode
        mode: BlendMode,
        /// Colour channels written
        channel: ChannelMode,
    },
    /// Vertex and fragment programs
    GpuProgram(ProgramBinding),
    /// Bound textures per unit
    Texture([Option<TextureId>; MAX_TEXTURE_UNITS]),
    /// Bound vertex buffer
    VertexBuffer(Option<VertexBufferId>),
    /// Model matrix of an entity, identity for `None`
    Matrix(Option<EntityId>),
    /// Draw the entity's vertex buffer
    Render(EntityId),
}

/// Everything a state needs while it is applied
pub struct RenderContext<'a> {
    /// Device
    pub gfx: &'a mut dyn LowLevelGraphics,
    /// Bound-state cache and statistics
    pub settings: &'a mut RenderSettings,
    /// Scene entities
    pub store: &'a EntityStore,
    /// Lights
    pub lights: &'a LightMap,
    /// Camera frustum
    pub frustum: &'a Frustum,
}

impl RenderState {
    /// Kind of the state
    pub const fn kind(&self) -> RenderStateKind {
        match self {
            Self::Root => RenderStateKind::Root,
            Self::Sector(_) => RenderStateKind::Sector,
            Self::Pass(_) => RenderStateKind::Pass,
            Self::DepthTest(_) => RenderStateKind::DepthTest,
            Self::Depth(_) => RenderStateKind::Depth,
            Self::Alpha(_) => RenderStateKind::Alpha,
            Self::Blend { .. } => RenderStateKind::Blend,
            Self::GpuProgram(_) => RenderStateKind::GpuProgram,
            Self::Texture(_) => RenderStateKind::Texture,
            Self::VertexBuffer(_) => RenderStateKind::VertexBuffer,
            Self::Matrix(_) => RenderStateKind::Matrix,
            Self::Render(_) => RenderStateKind::Render,
        }
    }

    /// Total order used to place states among their siblings
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Root, Self::Root) => Ordering::Equal,
            (Self::Sector(a), Self::Sector(b)) => a.cmp(b),
            (Self::Pass(a), Self::Pass(b)) => a.cmp(b),
            (Self::DepthTest(a), Self::DepthTest(b)) => a.cmp(b),
            (Self::Depth(a), Self::Depth(b)) => a.total_cmp(b),
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
            (Self::Blend { mode: ma, channel: ca }, Self::Blend { mode: mb, channel: cb }) => {
                ma.cmp(mb).then(ca.cmp(cb))
            }
            (Self::GpuProgram(a), Self::GpuProgram(b)) => a.cmp(b),
            (Self::Texture(a), Self::Texture(b)) => a.cmp(b),
            (Self::VertexBuffer(a), Self::VertexBuffer(b)) => a.cmp(b),
            (Self::Matrix(a), Self::Matrix(b)) => a.cmp(b),
            (Self::Render(a), Self::Render(b)) => a.cmp(b),
            _ => self.kind().cmp(&other.kind()),
        }
    }

    /// Apply the state, issuing only the device calls that differ from the
    /// currently bound state of the same kind
    pub fn set_mode(&self, ctx: &mut RenderContext<'_>) {
        if let Self::Render(id) = self {
            render_object(*id, ctx);
            return;
        }
        if let Some(bound) = ctx.settings.bound(self.kind()) {
            if bound.compare(self) == Ordering::Equal {
                return;
            }
        }
        let previous = ctx.settings.bind(*self);
        if matches!(self, Self::Root | Self::Sector(_) | Self::Pass(_) | Self::Depth(_)) {
            return;
        }
        ctx.settings.stats.state_changes += 1;
        if ctx.settings.config.log_rendering {
            debug!("Render state {:?}", self);
        }

        match *self {
            Self::DepthTest(active) => ctx.gfx.set_depth_test_active(active),
            Self::Alpha(mode) => set_alpha_mode(ctx.gfx, mode),
            Self::Blend { mode, channel } => {
                set_blend_mode(ctx.gfx, mode);
                set_channel_mode(ctx.gfx, channel);
            }
            Self::GpuProgram(binding) => {
                let previous = match previous {
                    Some(Self::GpuProgram(previous)) => Some(previous),
                    _ => None,
                };
                set_programs(ctx, binding, previous);
                // the new programs still need the object matrix
                ctx.settings.forget(RenderStateKind::Matrix);
            }
            Self::Texture(units) => {
                let previous = match previous {
                    Some(Self::Texture(previous)) => Some(previous),
                    _ => None,
                };
                for (unit, texture) in units.iter().enumerate() {
                    if previous.map_or(true, |p| p[unit] != *texture) {
                        ctx.gfx.set_texture(unit, *texture);
                    }
                }
            }
            Self::VertexBuffer(buffer) => ctx.gfx.bind_vertex_buffer(buffer),
            Self::Matrix(entity) => set_model_matrix(ctx, entity),
            Self::Root | Self::Sector(_) | Self::Pass(_) | Self::Depth(_) | Self::Render(_) => {}
        }
    }
}

fn set_alpha_mode(gfx: &mut dyn LowLevelGraphics, mode: AlphaMode) {
    match mode {
        AlphaMode::Solid => gfx.set_alpha_test_active(false),
        AlphaMode::Trans => {
            gfx.set_alpha_test_active(true);
            gfx.set_alpha_test_func(AlphaTestFunc::GreaterOrEqual, ALPHA_TEST_REFERENCE);
        }
    }
}

fn set_blend_mode(gfx: &mut dyn LowLevelGraphics, mode: BlendMode) {
    let factors = match mode {
        BlendMode::Replace => None,
        BlendMode::Add => Some((BlendFunc::One, BlendFunc::One)),
        BlendMode::Mul => Some((BlendFunc::Zero, BlendFunc::SrcColor)),
        BlendMode::MulX2 => Some((BlendFunc::DestColor, BlendFunc::SrcColor)),
        BlendMode::Alpha => Some((BlendFunc::SrcAlpha, BlendFunc::OneMinusSrcAlpha)),
        BlendMode::DestAlphaAdd => Some((BlendFunc::DestAlpha, BlendFunc::One)),
    };
    match factors {
        Some((src, dest)) => {
            gfx.set_blend_active(true);
            gfx.set_blend_func(src, dest);
        }
        None => gfx.set_blend_active(false),
    }
}

fn set_channel_mode(gfx: &mut dyn LowLevelGraphics, channel: ChannelMode) {
    match channel {
        ChannelMode::Rgba => gfx.set_color_write_active(true, true, true, true),
        ChannelMode::Rgb => gfx.set_color_write_active(true, true, true, false),
        ChannelMode::A => gfx.set_color_write_active(false, false, false, true),
        ChannelMode::Z => gfx.set_color_write_active(false, false, false, false),
    }
}

fn set_programs(ctx: &mut RenderContext<'_>, binding: ProgramBinding, previous: Option<ProgramBinding>) {
    let previous = previous.unwrap_or(ProgramBinding {
        vertex: None,
        fragment: None,
        uses_light: false,
        uses_eye: false,
        light: None,
    });

    for (old, new) in [(previous.vertex, binding.vertex), (previous.fragment, binding.fragment)] {
        if old != new {
            if let Some(old) = old {
                ctx.gfx.unbind_gpu_program(old);
            }
            if let Some(new) = new {
                ctx.gfx.bind_gpu_program(new);
            }
        }
    }

    let Some(vertex) = binding.vertex else {
        return;
    };
    if binding.uses_light {
        if let Some(light) = binding.light.and_then(|id| ctx.lights.get(id)) {
            let position = ctx.store.world_position(light.entity());
            ctx.gfx.set_gpu_program_param(vertex, "LightPos", ProgramParam::Vec3(position));
            ctx.gfx.set_gpu_program_param(vertex, "LightColor", ProgramParam::Color(light.diffuse_color()));
            ctx.gfx.set_gpu_program_param(vertex, "LightRadius", ProgramParam::Float(light.far_attenuation()));
        }
    }
    if binding.uses_eye {
        ctx.gfx.set_gpu_program_param(vertex, "EyePos", ProgramParam::Vec3(ctx.frustum.origin()));
    }
}

fn set_model_matrix(ctx: &mut RenderContext<'_>, entity: Option<EntityId>) {
    let model = entity.map_or_else(Mat4::identity, |id| ctx.store.world_matrix(id));
    let model_view = ctx.frustum.view_matrix() * model;
    ctx.gfx.set_matrix(MatrixType::ModelView, &model_view);

    // Programs bound for this pass need the matrix and the light in object space.
    let Some(RenderState::GpuProgram(binding)) = ctx.settings.bound(RenderStateKind::GpuProgram).copied() else {
        return;
    };
    let Some(vertex) = binding.vertex else {
        return;
    };
    let world_view_proj = ctx.frustum.projection_matrix() * model_view;
    ctx.gfx.set_gpu_program_param(vertex, "WorldViewProj", ProgramParam::Matrix(world_view_proj));
    if binding.uses_light {
        if let Some(light) = binding.light.and_then(|id| ctx.lights.get(id)) {
            let inverse = model.try_inverse().unwrap_or_else(Mat4::identity);
            let local = inverse.transform_position(&ctx.store.world_position(light.entity()));
            ctx.gfx.set_gpu_program_param(vertex, "LightPosObj", ProgramParam::Vec3(local));
        }
    }
}

fn render_object(id: EntityId, ctx: &mut RenderContext<'_>) {
    if ctx.settings.occluded.contains(&id) {
        return;
    }
    let Some(buffer) = ctx.store.get(id).and_then(|e| e.renderable()).and_then(|r| r.vertex_buffer()) else {
        return;
    };
    if ctx.settings.config.log_rendering {
        debug!("Drawing {:?}", id);
    }
    buffer.draw(ctx.gfx);
    ctx.settings.stats.draw_calls += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::recording::{GraphicsCommand, RecordingGraphics};

    fn frustum() -> Frustum {
        Frustum::from_look_at(Vec3::zeros(), -Vec3::z(), Vec3::y(), 1.0, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_cross_kind_order_follows_tree_depth() {
        assert_eq!(RenderState::Pass(9).compare(&RenderState::DepthTest(false)), Ordering::Less);
        assert_eq!(RenderState::Depth(1.0).compare(&RenderState::Depth(-3.0)), Ordering::Greater);
        assert_eq!(
            RenderState::Blend { mode: BlendMode::Add, channel: ChannelMode::Rgb }
                .compare(&RenderState::Blend { mode: BlendMode::Add, channel: ChannelMode::Rgb }),
            Ordering::Equal
        );
    }

    #[test]
    fn test_equal_state_is_not_reissued() {
        let mut gfx = RecordingGraphics::new();
        let mut settings = RenderSettings::default();
        let store = EntityStore::new();
        let lights = LightMap::with_key();
        let frustum = frustum();
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };

        let blend = RenderState::Blend { mode: BlendMode::Add, channel: ChannelMode::Rgb };
        blend.set_mode(&mut ctx);
        blend.set_mode(&mut ctx);
        RenderState::Alpha(AlphaMode::Trans).set_mode(&mut ctx);

        assert_eq!(settings.stats.state_changes, 2);
        assert_eq!(
            gfx.commands(),
            &[
                GraphicsCommand::BlendActive(true),
                GraphicsCommand::BlendFunc(BlendFunc::One, BlendFunc::One),
                GraphicsCommand::ColorWrite(true, true, true, false),
                GraphicsCommand::AlphaTestActive(true),
                GraphicsCommand::AlphaTestFunc(AlphaTestFunc::GreaterOrEqual, ALPHA_TEST_REFERENCE),
            ]
        );
    }

    #[test]
    fn test_texture_state_only_sets_changed_units() {
        let mut gfx = RecordingGraphics::new();
        let mut settings = RenderSettings::default();
        let store = EntityStore::new();
        let lights = LightMap::with_key();
        let frustum = frustum();
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };

        RenderState::Texture([Some(TextureId(1)), None, None, None]).set_mode(&mut ctx);
        RenderState::Texture([Some(TextureId(1)), Some(TextureId(2)), None, None]).set_mode(&mut ctx);

        let textures: Vec<_> = gfx
            .commands()
            .iter()
            .filter(|c| matches!(c, GraphicsCommand::SetTexture(..)))
            .cloned()
            .collect();
        assert_eq!(textures.len(), MAX_TEXTURE_UNITS + 1);
        assert_eq!(textures.last(), Some(&GraphicsCommand::SetTexture(1, Some(TextureId(2)))));
    }

    #[test]
    fn test_replace_blend_and_depth_channel() {
        let mut gfx = RecordingGraphics::new();
        let mut settings = RenderSettings::default();
        let store = EntityStore::new();
        let lights = LightMap::with_key();
        let frustum = frustum();
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };

        RenderState::Blend { mode: BlendMode::Replace, channel: ChannelMode::Z }.set_mode(&mut ctx);
        assert_eq!(
            gfx.commands(),
            &[GraphicsCommand::BlendActive(false), GraphicsCommand::ColorWrite(false, false, false, false)]
        );
    }
}
