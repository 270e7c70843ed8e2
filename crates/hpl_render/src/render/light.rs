//! # Lights and Stencil Shadows
//!
//! A [`Light3D`] is attached to an entity whose position and bounds it
//! follows. Besides lighting parameters it keeps two shadow caster lists:
//! static casters are gathered once and only refreshed after the light moves,
//! dynamic casters are gathered every frame.
//!
//! Shadows are drawn into the stencil buffer before the light pass. Each
//! caster's silhouette is extruded away from the light; depth-pass counting
//! is used unless the camera's near plane may be inside the volume, in which
//! case the capped depth-fail variant is drawn instead.

use std::f32::consts::SQRT_2;

use crate::foundation::collections::{EntityId, LightId, SlotMap};
use crate::foundation::logging::trace;
use crate::foundation::math::{utils, Color, Mat4, Mat4Ext, Rect2l, Vec3};
use crate::portal::visibility::SectorVisibilityContainer;
use crate::render::graphics::{
    CullMode, DepthTestFunc, GraphicCaps, MatrixType, StencilFace, StencilOp, StencilState,
};
use crate::render::render_settings::ShadowAlgorithm;
use crate::render::render_state::{RenderContext, RenderStateKind};
use crate::scene::entity::EntityStore;
use crate::scene::renderable::RenderableType;
use crate::spatial::bounding_volume::BoundingVolume;
use crate::spatial::frustum::{Frustum, FrustumCollision};

/// Lights of a world
pub type LightMap = SlotMap<LightId, Light3D>;

/// Light shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Omnidirectional light
    Point,
    /// Cone light along the entity's forward axis
    Spot {
        /// Vertical field of view in radians
        fov: f32,
        /// Width / height of the cone
        aspect: f32,
        /// Near clip distance of the cone frustum
        near_clip: f32,
    },
}

/// Outcome of drawing one shadow volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowDrawInfo {
    /// Counting method used
    pub algorithm: ShadowAlgorithm,
    /// Silhouette quads extruded
    pub silhouette_quads: usize,
    /// Cap triangles drawn (front plus back)
    pub cap_triangles: usize,
    /// Draw calls issued for the volume
    pub passes: usize,
}

/// Light source
#[derive(Debug, Clone)]
pub struct Light3D {
    entity: EntityId,
    kind: LightKind,
    diffuse_color: Color,
    far_attenuation: f32,
    casts_shadows: bool,
    static_casters: Vec<EntityId>,
    dynamic_casters: Vec<EntityId>,
    static_version: Option<u32>,
    sector_visibility: Option<SectorVisibilityContainer>,
}

impl Light3D {
    /// Point light following `entity`
    pub fn point(entity: EntityId, diffuse_color: Color, far_attenuation: f32) -> Self {
        Self {
            entity,
            kind: LightKind::Point,
            diffuse_color,
            far_attenuation,
            casts_shadows: true,
            static_casters: Vec::new(),
            dynamic_casters: Vec::new(),
            static_version: None,
            sector_visibility: None,
        }
    }

    /// Spot light following `entity`, shining down its forward axis
    pub fn spot(entity: EntityId, diffuse_color: Color, far_attenuation: f32, fov: f32, aspect: f32, near_clip: f32) -> Self {
        Self {
            kind: LightKind::Spot { fov, aspect, near_clip },
            ..Self::point(entity, diffuse_color, far_attenuation)
        }
    }

    /// Entity the light follows
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Light shape
    pub const fn kind(&self) -> LightKind {
        self.kind
    }

    /// Diffuse colour
    pub const fn diffuse_color(&self) -> Color {
        self.diffuse_color
    }

    /// Range of the light
    pub const fn far_attenuation(&self) -> f32 {
        self.far_attenuation
    }

    pub(crate) fn set_far_attenuation(&mut self, range: f32) {
        self.far_attenuation = range;
        self.static_version = None;
    }

    /// Shadow casting flag
    pub const fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Enable or disable shadows
    pub fn set_casts_shadows(&mut self, casts: bool) {
        self.casts_shadows = casts;
    }

    /// World position
    pub fn position(&self, store: &EntityStore) -> Vec3 {
        store.world_position(self.entity)
    }

    /// Cone frustum of a spot light
    pub fn spot_frustum(&self, store: &EntityStore) -> Option<Frustum> {
        let LightKind::Spot { fov, aspect, near_clip } = self.kind else {
            return None;
        };
        let world = store.world_matrix(self.entity);
        let view = world.try_inverse()?;
        let projection = Mat4::new_perspective(aspect, fov, near_clip, self.far_attenuation);
        Some(Frustum::new(projection, view, near_clip, self.far_attenuation, fov, aspect))
    }

    /// Static shadow casters
    pub fn static_casters(&self) -> &[EntityId] {
        &self.static_casters
    }

    /// Dynamic shadow casters of the current frame
    pub fn dynamic_casters(&self) -> &[EntityId] {
        &self.dynamic_casters
    }

    /// Drop the dynamic casters
    pub fn clear_dynamic_casters(&mut self) {
        self.dynamic_casters.clear();
    }

    /// Drop the static casters
    pub fn clear_static_casters(&mut self) {
        self.static_casters.clear();
        self.static_version = None;
    }

    /// True if static casters were never gathered or were gathered at a
    /// different transform count of the light entity
    pub fn static_casters_stale(&self, transform_count: u32) -> bool {
        self.static_version != Some(transform_count)
    }

    /// Record that static casters were gathered at `transform_count`
    pub fn mark_static_casters(&mut self, transform_count: u32) {
        self.static_version = Some(transform_count);
    }

    /// Sector visibility from the last caster gathering
    pub const fn sector_visibility(&self) -> Option<&SectorVisibilityContainer> {
        self.sector_visibility.as_ref()
    }

    /// Store the sector visibility computed for this light
    pub fn set_sector_visibility(&mut self, visibility: SectorVisibilityContainer) {
        self.sector_visibility = Some(visibility);
    }

    /// True if the light reaches the given bounds
    pub fn check_bounds_intersection(&self, store: &EntityStore, bv: &BoundingVolume) -> bool {
        let position = self.position(store);
        let extents = bv.world();
        let closest = position.sup(&extents.min).inf(&extents.max);
        if (closest - position).norm_squared() > self.far_attenuation * self.far_attenuation {
            return false;
        }
        match self.spot_frustum(store) {
            Some(frustum) => frustum.collide_bounding_volume(bv) != FrustumCollision::Outside,
            None => true,
        }
    }

    /// True if the light reaches the entity
    pub fn check_object_intersection(&self, store: &EntityStore, id: EntityId) -> bool {
        store.get(id).is_some_and(|e| self.check_bounds_intersection(store, e.bounding_volume()))
    }

    /// Add an object as a shadow caster. Meshes add their sub-meshes.
    ///
    /// `frustum` is given for dynamic casters, which are dropped when neither
    /// they nor their shadow can be seen.
    pub fn add_shadow_caster(
        &mut self,
        store: &EntityStore,
        id: EntityId,
        frustum: Option<&Frustum>,
        is_static: bool,
    ) -> bool {
        let Some(entity) = store.get(id) else {
            return false;
        };
        let Some(renderable) = entity.renderable() else {
            return false;
        };
        if !renderable.is_visible() {
            return false;
        }
        if renderable.kind() == RenderableType::Mesh {
            let mut added = false;
            for &sub_mesh in renderable.sub_meshes() {
                added |= self.add_shadow_caster(store, sub_mesh, frustum, is_static);
            }
            return added;
        }
        if !renderable.casts_shadows() || renderable.shadow_mesh().is_none() || renderable.is_transparent() {
            return false;
        }
        let bv = entity.bounding_volume();
        if !self.check_bounds_intersection(store, bv) {
            return false;
        }
        // a light inside the caster's box casts no shadow from it
        let Some(volume) = bv.get_shadow_volume(&self.position(store), self.far_attenuation, false) else {
            return false;
        };
        if let Some(frustum) = frustum {
            if frustum.collide_bounding_volume(bv) == FrustumCollision::Outside
                && !frustum.check_volume_intersection(&volume)
            {
                return false;
            }
        }

        let list = if is_static { &mut self.static_casters } else { &mut self.dynamic_casters };
        if !list.contains(&id) {
            list.push(id);
        }
        true
    }

    /// Screen rectangle covered by the light's bounds
    pub fn create_clip_rect(&self, store: &EntityStore, frustum: &Frustum, screen_size: (i32, i32)) -> Option<Rect2l> {
        let bv = store.get(self.entity)?.bounding_volume();
        utils::clip_rect_from_bv(
            &bv.min(),
            &bv.max(),
            frustum.view_matrix(),
            frustum.projection_matrix(),
            frustum.near(),
            screen_size,
        )
    }

    /// Prepare the device for this light's pass, drawing its shadows into
    /// the stencil buffer first
    pub fn begin_draw(&self, ctx: &mut RenderContext<'_>) {
        if ctx.settings.config.use_light_scissor {
            if let Some(rect) = self.create_clip_rect(ctx.store, ctx.frustum, ctx.settings.config.screen_size) {
                ctx.gfx.set_scissor_active(true);
                ctx.gfx.set_scissor_rect(&rect);
            }
        }

        let show = ctx.settings.config.show_shadows;
        let draw_static = show.static_casters() && !self.static_casters.is_empty();
        let draw_dynamic = show.dynamic_casters() && !self.dynamic_casters.is_empty();
        if !self.casts_shadows || !(draw_static || draw_dynamic) {
            ctx.gfx.set_stencil_active(false);
            ctx.gfx.set_depth_test_func(DepthTestFunc::Equal);
            return;
        }

        ctx.gfx.set_clear_stencil(0);
        ctx.gfx.clear_screen(false, false, true);
        ctx.gfx.set_color_write_active(false, false, false, false);
        ctx.gfx.set_depth_write_active(false);
        ctx.gfx.set_depth_test_func(DepthTestFunc::Less);
        ctx.gfx.set_stencil_active(true);
        ctx.settings.two_sided_stencil = ctx.gfx.capability(GraphicCaps::TwoSideStencil) != 0;
        if ctx.settings.two_sided_stencil {
            ctx.gfx.set_cull_active(false);
            ctx.gfx.set_stencil_two_side_active(true);
        } else {
            ctx.gfx.set_cull_active(true);
        }

        if draw_static {
            for &caster in &self.static_casters {
                self.render_shadow(caster, ctx);
            }
        }
        if draw_dynamic {
            for &caster in &self.dynamic_casters {
                self.render_shadow(caster, ctx);
            }
        }

        if ctx.settings.two_sided_stencil {
            ctx.gfx.set_stencil_two_side_active(false);
        }
        ctx.gfx.set_cull_active(true);
        ctx.gfx.set_cull_mode(CullMode::Clockwise);
        ctx.gfx.set_color_write_active(true, true, true, true);
        ctx.gfx.set_stencil(&StencilState::test(DepthTestFunc::Equal, 0));
        ctx.gfx.set_depth_test_func(DepthTestFunc::Equal);
        // shadow drawing bypassed the state cache
        ctx.settings.forget(RenderStateKind::Blend);
        ctx.settings.forget(RenderStateKind::Matrix);
    }

    /// Draw one caster's shadow volume into the stencil buffer.
    ///
    /// Returns `None` when the caster has no silhouette data, the light is
    /// inside its bounds, or neither it nor its shadow can be seen.
    pub fn render_shadow(&self, caster: EntityId, ctx: &mut RenderContext<'_>) -> Option<ShadowDrawInfo> {
        let entity = ctx.store.get(caster)?;
        let mesh = entity.renderable()?.shadow_mesh()?;
        let light_position = self.position(ctx.store);
        let bv = entity.bounding_volume();
        let volume = bv.get_shadow_volume(&light_position, self.far_attenuation, false)?;
        ctx.settings.stats.shadow_casters += 1;

        if !ctx.frustum.check_volume_intersection(&volume)
            && ctx.frustum.collide_bounding_volume(bv) == FrustumCollision::Outside
        {
            return None;
        }

        let origin_bv = ctx.frustum.origin_bv();
        let z_fail = volume.collide_bounding_volume(origin_bv) || bv.intersects(origin_bv);
        let algorithm = if z_fail { ShadowAlgorithm::ZFail } else { ShadowAlgorithm::ZPass };

        let world = ctx.store.world_matrix(caster);
        let local_light = world
            .try_inverse()
            .unwrap_or_else(Mat4::identity)
            .transform_position(&light_position);
        let geometry = mesh.build_shadow_volume(&local_light, self.far_attenuation * SQRT_2, z_fail);
        if geometry.is_empty() {
            return None;
        }

        ctx.gfx.set_matrix(MatrixType::ModelView, &(ctx.frustum.view_matrix() * world));
        let vertices = geometry.vertex_floats();
        let passes = if ctx.settings.two_sided_stencil {
            let (front, back) = if z_fail {
                (
                    StencilState::always(StencilOp::Keep, StencilOp::DecrementWrap, StencilOp::Keep),
                    StencilState::always(StencilOp::Keep, StencilOp::IncrementWrap, StencilOp::Keep),
                )
            } else {
                (
                    StencilState::always(StencilOp::Keep, StencilOp::Keep, StencilOp::IncrementWrap),
                    StencilState::always(StencilOp::Keep, StencilOp::Keep, StencilOp::DecrementWrap),
                )
            };
            ctx.gfx.set_stencil_two_side(StencilFace::Front, &front);
            ctx.gfx.set_stencil_two_side(StencilFace::Back, &back);
            ctx.gfx.draw_user_indexed(vertices, 4, &geometry.indices);
            1
        } else {
            // back faces first, then front faces
            let (first, second) = if z_fail {
                (
                    StencilState::always(StencilOp::Keep, StencilOp::Increment, StencilOp::Keep),
                    StencilState::always(StencilOp::Keep, StencilOp::Decrement, StencilOp::Keep),
                )
            } else {
                (
                    StencilState::always(StencilOp::Keep, StencilOp::Keep, StencilOp::Decrement),
                    StencilState::always(StencilOp::Keep, StencilOp::Keep, StencilOp::Increment),
                )
            };
            ctx.gfx.set_cull_mode(CullMode::CounterClockwise);
            ctx.gfx.set_stencil(&first);
            ctx.gfx.draw_user_indexed(vertices, 4, &geometry.indices);
            ctx.gfx.set_cull_mode(CullMode::Clockwise);
            ctx.gfx.set_stencil(&second);
            ctx.gfx.draw_user_indexed(vertices, 4, &geometry.indices);
            2
        };

        ctx.settings.stats.shadow_volumes += 1;
        if z_fail {
            ctx.settings.stats.z_fail_volumes += 1;
        }
        ctx.settings.last_shadow_algo = Some(algorithm);
        trace!("Shadow volume for {:?}: {:?}, {} quads", caster, algorithm, geometry.silhouette_quads);

        Some(ShadowDrawInfo {
            algorithm,
            silhouette_quads: geometry.silhouette_quads,
            cap_triangles: geometry.front_cap_triangles + geometry.back_cap_triangles,
            passes,
        })
    }

    /// Restore the device after the light pass
    pub fn end_draw(&self, ctx: &mut RenderContext<'_>) {
        ctx.gfx.set_scissor_active(false);
        ctx.gfx.set_stencil_active(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::render::graphics::VertexBufferId;
    use crate::render::material::StandardMaterial;
    use crate::render::recording::{GraphicsCommand, RecordingGraphics};
    use crate::render::render_settings::RenderSettings;
    use crate::render::vertex_buffer::MeshBuffer;
    use crate::scene::entity::Entity3D;
    use crate::scene::renderable::Renderable;

    fn caster(store: &mut EntityStore, position: Vec3) -> EntityId {
        let mesh = MeshBuffer::cuboid(VertexBufferId(1), Vec3::repeat(0.5));
        let shadow = Arc::new(mesh.shadow_mesh().unwrap());
        let renderable = Renderable::normal(Arc::new(StandardMaterial::solid("crate")), Arc::new(mesh))
            .with_shadow_mesh(shadow);
        store.insert(
            Entity3D::new("crate")
                .with_renderable(renderable)
                .with_bounds(Vec3::repeat(-0.5), Vec3::repeat(0.5))
                .with_matrix(Mat4::new_translation(&position)),
        )
    }

    fn light_at(store: &mut EntityStore, position: Vec3, radius: f32) -> Light3D {
        let entity = store.insert(
            Entity3D::new("light")
                .with_bounds(Vec3::repeat(-radius), Vec3::repeat(radius))
                .with_matrix(Mat4::new_translation(&position)),
        );
        Light3D::point(entity, Color::WHITE, radius)
    }

    fn camera() -> Frustum {
        Frustum::from_look_at(Vec3::zeros(), -Vec3::z(), Vec3::y(), 1.2, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_static_casters_refresh_on_transform_count() {
        let mut store = EntityStore::new();
        let mut light = light_at(&mut store, Vec3::new(0.0, 3.0, -5.0), 10.0);
        assert!(light.static_casters_stale(0));
        light.mark_static_casters(0);
        assert!(!light.static_casters_stale(0));
        assert!(light.static_casters_stale(1));
    }

    #[test]
    fn test_add_shadow_caster_filters() {
        let mut store = EntityStore::new();
        let near = caster(&mut store, Vec3::new(0.0, 0.0, -5.0));
        let far = caster(&mut store, Vec3::new(0.0, 0.0, -50.0));
        let glass = store.insert(
            Entity3D::new("glass")
                .with_renderable(Renderable::normal(
                    Arc::new(StandardMaterial::transparent("glass", crate::render::material::BlendMode::Alpha)),
                    Arc::new(MeshBuffer::quad(VertexBufferId(2), 1.0, 1.0)),
                ))
                .with_bounds(Vec3::repeat(-1.0), Vec3::repeat(1.0)),
        );
        let mut light = light_at(&mut store, Vec3::new(0.0, 3.0, -5.0), 10.0);

        assert!(light.add_shadow_caster(&store, near, None, true));
        assert!(light.add_shadow_caster(&store, near, None, true));
        assert!(!light.add_shadow_caster(&store, far, None, true));
        assert!(!light.add_shadow_caster(&store, glass, None, false));
        assert_eq!(light.static_casters(), &[near]);
        assert!(light.dynamic_casters().is_empty());
    }

    #[test]
    fn test_mesh_adds_sub_meshes() {
        let mut store = EntityStore::new();
        let part = caster(&mut store, Vec3::new(0.0, 0.0, -5.0));
        let mesh = store.insert(Entity3D::new("mesh").with_renderable(Renderable::mesh(vec![part])));
        let mut light = light_at(&mut store, Vec3::new(0.0, 3.0, -5.0), 10.0);
        assert!(light.add_shadow_caster(&store, mesh, None, false));
        assert_eq!(light.dynamic_casters(), &[part]);
    }

    fn draw_shadow(two_sided: bool, caster_at: Vec3, light_at_pos: Vec3) -> (Option<ShadowDrawInfo>, Vec<GraphicsCommand>) {
        let mut store = EntityStore::new();
        let id = caster(&mut store, caster_at);
        let light = light_at(&mut store, light_at_pos, 10.0);
        let frustum = camera();
        let lights = LightMap::with_key();
        let mut gfx = RecordingGraphics::new().with_two_side_stencil(two_sided);
        let mut settings = RenderSettings::default();
        settings.two_sided_stencil = two_sided;
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };
        let info = light.render_shadow(id, &mut ctx);
        (info, gfx.take_commands())
    }

    #[test]
    fn test_two_sided_z_pass_is_one_draw() {
        let (info, commands) = draw_shadow(true, Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 3.0, -5.0));
        let info = info.unwrap();
        assert_eq!(info.algorithm, ShadowAlgorithm::ZPass);
        assert_eq!(info.passes, 1);
        assert_eq!(info.cap_triangles, 0);
        assert!(commands.contains(&GraphicsCommand::StencilTwoSide(
            StencilFace::Front,
            StencilState::always(StencilOp::Keep, StencilOp::Keep, StencilOp::IncrementWrap),
        )));
        assert!(commands.contains(&GraphicsCommand::StencilTwoSide(
            StencilFace::Back,
            StencilState::always(StencilOp::Keep, StencilOp::Keep, StencilOp::DecrementWrap),
        )));
        let draws = commands.iter().filter(|c| matches!(c, GraphicsCommand::DrawUserIndexed { .. })).count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn test_single_sided_uses_two_culled_passes() {
        let (info, commands) = draw_shadow(false, Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 3.0, -5.0));
        assert_eq!(info.unwrap().passes, 2);
        let culls: Vec<_> = commands.iter().filter(|c| matches!(c, GraphicsCommand::CullMode(_))).collect();
        assert_eq!(
            culls,
            [&GraphicsCommand::CullMode(CullMode::CounterClockwise), &GraphicsCommand::CullMode(CullMode::Clockwise)]
        );
        assert!(commands.contains(&GraphicsCommand::Stencil(StencilState::always(
            StencilOp::Keep,
            StencilOp::Keep,
            StencilOp::Increment
        ))));
    }

    #[test]
    fn test_camera_inside_shadow_uses_z_fail() {
        // light directly in front of the camera, box between: the camera sits in the shadow
        let (info, commands) = draw_shadow(true, Vec3::new(0.0, 0.0, -2.0), Vec3::new(0.0, 0.0, -4.0));
        let info = info.unwrap();
        assert_eq!(info.algorithm, ShadowAlgorithm::ZFail);
        assert!(info.cap_triangles > 0);
        assert!(commands.contains(&GraphicsCommand::StencilTwoSide(
            StencilFace::Front,
            StencilState::always(StencilOp::Keep, StencilOp::DecrementWrap, StencilOp::Keep),
        )));
    }

    #[test]
    fn test_camera_inside_caster_box_uses_z_fail() {
        // lit from straight above: only the two top triangles face the light
        let (info, _) = draw_shadow(true, Vec3::zeros(), Vec3::new(0.0, 3.0, 0.0));
        let info = info.unwrap();
        assert_eq!(info.algorithm, ShadowAlgorithm::ZFail);
        assert_eq!(info.cap_triangles, 2 * 2);
    }

    #[test]
    fn test_hidden_caster_is_rejected() {
        // box and its shadow both behind the camera
        let (info, commands) = draw_shadow(true, Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, 8.0));
        assert!(info.is_none());
        assert!(commands.is_empty());
    }

    #[test]
    fn test_light_inside_caster_bounds_casts_no_shadow() {
        // loose bounds: the light is outside the mesh but inside its box
        let mut store = EntityStore::new();
        let mesh = MeshBuffer::cuboid(VertexBufferId(1), Vec3::repeat(0.5));
        let shadow = Arc::new(mesh.shadow_mesh().unwrap());
        let renderable = Renderable::normal(Arc::new(StandardMaterial::solid("statue")), Arc::new(mesh))
            .with_shadow_mesh(shadow);
        let id = store.insert(
            Entity3D::new("statue")
                .with_renderable(renderable)
                .with_bounds(Vec3::repeat(-2.0), Vec3::repeat(2.0))
                .with_matrix(Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0))),
        );
        let mut light = light_at(&mut store, Vec3::new(1.5, 0.0, -5.0), 10.0);
        let frustum = camera();

        assert!(!light.add_shadow_caster(&store, id, None, true));
        assert!(!light.add_shadow_caster(&store, id, Some(&frustum), false));
        assert!(light.static_casters().is_empty());
        assert!(light.dynamic_casters().is_empty());

        let lights = LightMap::with_key();
        let mut gfx = RecordingGraphics::new().with_two_side_stencil(true);
        let mut settings = RenderSettings::default();
        settings.two_sided_stencil = true;
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };
        assert!(light.render_shadow(id, &mut ctx).is_none());
        assert_eq!(settings.stats.shadow_volumes, 0);
        assert!(gfx.take_commands().is_empty());
    }
}
