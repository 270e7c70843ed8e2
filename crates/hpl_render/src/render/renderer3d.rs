//! # 3D Renderer
//!
//! Drives one frame through the pass sequence:
//!
//! 1. begin: projection, depth state, clear
//! 2. visibility: portal walk into the render list, shadow casters per light
//! 3. depth pre-pass
//! 4. occlusion queries (optional)
//! 5. one additive pass per light, stencil shadows first
//! 6. diffuse pass
//! 7. fog (optional)
//! 8. sky box (optional)
//! 9. transparent objects, back to front
//! 10. debug overlays
//! 11. end: motion blur bookkeeping, query pool cleanup, flush

use std::collections::{HashMap, HashSet};

use crate::core::config::RendererConfig;
use crate::foundation::collections::EntityId;
use crate::foundation::logging::{debug, info, warn};
use crate::foundation::math::{Color, Mat4};
use crate::portal::container::PortalContainer;
use crate::render::camera::Camera3D;
use crate::render::graphics::{
    BlendFunc, DepthTestFunc, GpuProgramId, LowLevelGraphics, MatrixType, OcclusionQueryId, ProgramParam,
    TextureId,
};
use crate::render::light::LightMap;
use crate::render::render_list::RenderList;
use crate::render::render_settings::{DebugFlags, RenderSettings, RenderStats};
use crate::render::render_state::RenderContext;
use crate::scene::entity::EntityStore;
use crate::scene::world::World3D;
use crate::spatial::frustum::Frustum;

/// Sky box drawn around the camera after the opaque passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyBox {
    /// Half extent of the cube
    pub half_size: f32,
    /// Tint
    pub color: Color,
    /// Cube map bound to unit 0, untextured when `None`
    pub texture: Option<TextureId>,
}

/// Frame driver
#[derive(Debug)]
pub struct Renderer3D {
    settings: RenderSettings,
    render_list: RenderList,
    occlusion_queries: HashMap<EntityId, OcclusionQueryId>,
    sky_box: Option<SkyBox>,
    fog_warning_issued: bool,
    frame: u64,
}

impl Renderer3D {
    /// Create a renderer with a configuration
    pub fn new(config: RendererConfig) -> Self {
        info!(
            "Renderer3D created: shadows {:?}, occlusion queries {}, motion blur {}",
            config.show_shadows, config.use_occlusion_queries, config.motion_blur
        );
        Self {
            settings: RenderSettings::new(config),
            render_list: RenderList::new(),
            occlusion_queries: HashMap::new(),
            sky_box: None,
            fog_warning_issued: false,
            frame: 0,
        }
    }

    /// Configuration
    pub const fn config(&self) -> &RendererConfig {
        &self.settings.config
    }

    /// Mutable configuration, applied from the next frame
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.settings.config
    }

    /// Settings, including the last frame's statistics
    pub const fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render list of the last frame
    pub const fn render_list(&self) -> &RenderList {
        &self.render_list
    }

    /// Enable or disable the sky box
    pub fn set_sky_box(&mut self, sky_box: Option<SkyBox>) {
        self.sky_box = sky_box;
    }

    /// Frames rendered so far
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Live occlusion queries
    pub fn occlusion_query_count(&self) -> usize {
        self.occlusion_queries.len()
    }

    /// Render one frame of `world` as seen by `camera`
    pub fn render_world(&mut self, world: &mut World3D, camera: &Camera3D, gfx: &mut dyn LowLevelGraphics) -> RenderStats {
        let World3D { entities, lights, portals } = world;

        self.begin_frame(camera, gfx);
        let frustum = self.update_render_list(entities, lights, portals, camera);

        let settings = &mut self.settings;
        let list = &self.render_list;
        let mut ctx = RenderContext {
            gfx,
            settings,
            store: entities,
            lights,
            frustum: &frustum,
        };

        render_z(list, &mut ctx);
        if ctx.settings.config.use_occlusion_queries {
            render_occlusion_queries(list, &mut self.occlusion_queries, &mut ctx);
        }
        if !ctx.settings.config.debug_flags.contains(DebugFlags::DISABLE_LIGHTING) {
            render_lights(list, &mut ctx);
        }
        render_diffuse(list, &mut ctx);
        if ctx.settings.config.fog.active {
            render_fog(list, &mut self.fog_warning_issued, &mut ctx);
        }
        if let Some(sky_box) = self.sky_box {
            render_sky_box(sky_box, &mut ctx);
        }
        render_trans(list, &mut ctx);
        render_debug(list, portals, &mut ctx);
        end_frame(list, &mut self.occlusion_queries, &mut ctx);

        self.frame += 1;
        self.settings.stats
    }

    fn begin_frame(&mut self, camera: &Camera3D, gfx: &mut dyn LowLevelGraphics) {
        self.settings.begin_frame();
        gfx.set_matrix(MatrixType::Projection, &camera.projection_matrix());
        gfx.set_depth_test_active(true);
        gfx.set_depth_write_active(true);
        gfx.set_depth_test_func(DepthTestFunc::LessOrEqual);
        gfx.set_stencil_active(false);
        gfx.set_scissor_active(false);
        gfx.set_cull_active(true);
        gfx.clear_screen(true, true, true);
    }

    fn update_render_list(
        &mut self,
        entities: &EntityStore,
        lights: &mut LightMap,
        portals: &mut PortalContainer,
        camera: &Camera3D,
    ) -> Frustum {
        let config = &self.settings.config;
        let mut frustum = camera.frustum();
        if config.fog.active && config.fog.culling && config.fog.end < frustum.far() {
            frustum = frustum.with_far_plane(config.fog.end);
        }

        self.render_list.clear();
        self.render_list.set_frustum(&frustum);
        self.render_list.set_motion_blur(config.motion_blur);
        portals.get_visible(entities, &frustum, &mut self.render_list);

        for &light_id in self.render_list.lights() {
            if let Some(light) = lights.get_mut(light_id) {
                portals.add_light_shadow_casters(entities, light, &frustum);
            }
        }
        self.render_list.compile(entities, lights, config.light_limit());

        let stats = &mut self.settings.stats;
        stats.objects = self.render_list.object_count();
        stats.visible_sectors = portals.visible_sectors_list().len();
        frustum
    }
}

fn render_z(list: &RenderList, ctx: &mut RenderContext<'_>) {
    ctx.gfx.set_depth_write_active(true);
    ctx.gfx.set_depth_test_func(DepthTestFunc::LessOrEqual);
    list.render_z(ctx);
}

fn render_occlusion_queries(
    list: &RenderList,
    pool: &mut HashMap<EntityId, OcclusionQueryId>,
    ctx: &mut RenderContext<'_>,
) {
    let objects = list.occlusion_objects();
    if objects.is_empty() {
        return;
    }

    ctx.gfx.set_depth_write_active(false);
    ctx.gfx.set_color_write_active(false, false, false, false);
    ctx.gfx.set_matrix(MatrixType::ModelView, ctx.frustum.view_matrix());
    let mut issued = Vec::with_capacity(objects.len());
    for &id in objects {
        let Some(entity) = ctx.store.get(id) else {
            continue;
        };
        let query = *pool.entry(id).or_insert_with(|| ctx.gfx.create_occlusion_query());
        let bv = entity.bounding_volume();
        ctx.gfx.begin_occlusion_query(query);
        ctx.gfx.draw_solid_box(&bv.min(), &bv.max());
        ctx.gfx.end_occlusion_query(query);
        issued.push((id, query));
    }
    ctx.settings.stats.occlusion_queries += issued.len();

    for (id, query) in issued {
        while !ctx.gfx.fetch_occlusion_query_results(query) {
            std::hint::spin_loop();
        }
        if ctx.gfx.occlusion_query_sample_count(query) == 0 {
            ctx.settings.occluded.insert(id);
            ctx.settings.stats.occluded_objects += 1;
        }
    }
    debug!("Occlusion queries: {} objects hidden", ctx.settings.occluded.len());

    ctx.gfx.set_depth_write_active(true);
    ctx.settings.reset_bound_states();
}

fn render_lights(list: &RenderList, ctx: &mut RenderContext<'_>) {
    ctx.gfx.set_depth_write_active(false);
    ctx.gfx.set_depth_test_func(DepthTestFunc::Equal);
    let lights = ctx.lights;
    for (index, &light_id) in list.lights().iter().enumerate() {
        if list.objects_for_light(index).is_empty() {
            continue;
        }
        let Some(light) = lights.get(light_id) else {
            continue;
        };
        light.begin_draw(ctx);
        list.render_light(index, ctx);
        light.end_draw(ctx);
        ctx.settings.stats.lights += 1;
    }
}

fn render_diffuse(list: &RenderList, ctx: &mut RenderContext<'_>) {
    ctx.gfx.set_depth_write_active(false);
    ctx.gfx.set_depth_test_func(DepthTestFunc::Equal);
    list.render_diffuse(ctx);
}

fn render_fog(list: &RenderList, warning_issued: &mut bool, ctx: &mut RenderContext<'_>) {
    let Some(program) = ctx.settings.config.fog_program else {
        if !*warning_issued {
            warn!("Fog is active but no fog program is set, skipping fog");
            *warning_issued = true;
        }
        return;
    };
    let fog = ctx.settings.config.fog;

    ctx.gfx.bind_gpu_program(program);
    ctx.gfx.set_gpu_program_param(program, "FogStart", ProgramParam::Float(fog.start));
    ctx.gfx.set_gpu_program_param(program, "FogEnd", ProgramParam::Float(fog.end));
    ctx.gfx.set_gpu_program_param(program, "FogColor", ProgramParam::Color(fog.color));
    ctx.gfx.set_blend_active(true);
    ctx.gfx.set_blend_func(BlendFunc::SrcAlpha, BlendFunc::OneMinusSrcAlpha);
    ctx.gfx.set_color_write_active(true, true, true, false);
    for &id in list.objects() {
        if ctx.settings.occluded.contains(&id) {
            continue;
        }
        draw_with_program(id, program, ctx);
    }
    ctx.gfx.unbind_gpu_program(program);
    ctx.settings.reset_bound_states();
}

fn draw_with_program(id: EntityId, program: GpuProgramId, ctx: &mut RenderContext<'_>) {
    let Some(buffer) = ctx.store.get(id).and_then(|e| e.renderable()).and_then(|r| r.vertex_buffer()) else {
        return;
    };
    let model_view = model_view(ctx, id);
    ctx.gfx.set_matrix(MatrixType::ModelView, &model_view);
    ctx.gfx.set_gpu_program_param(
        program,
        "WorldViewProj",
        ProgramParam::Matrix(ctx.frustum.projection_matrix() * model_view),
    );
    buffer.bind(ctx.gfx);
    buffer.draw(ctx.gfx);
    ctx.settings.stats.draw_calls += 1;
}

fn model_view(ctx: &RenderContext<'_>, id: EntityId) -> Mat4 {
    ctx.frustum.view_matrix() * ctx.store.world_matrix(id)
}

fn render_sky_box(sky_box: SkyBox, ctx: &mut RenderContext<'_>) {
    let mut view = *ctx.frustum.view_matrix();
    view.m14 = 0.0;
    view.m24 = 0.0;
    view.m34 = 0.0;
    ctx.gfx.set_matrix(MatrixType::ModelView, &view);
    ctx.gfx.set_depth_write_active(false);
    ctx.gfx.set_depth_test_func(DepthTestFunc::LessOrEqual);
    ctx.gfx.set_blend_active(false);
    ctx.gfx.set_color_write_active(true, true, true, true);
    ctx.gfx.set_texture(0, sky_box.texture);
    ctx.gfx.draw_sky_cube(sky_box.half_size, sky_box.color);
    ctx.settings.reset_bound_states();
}

fn render_trans(list: &RenderList, ctx: &mut RenderContext<'_>) {
    ctx.gfx.set_depth_write_active(false);
    ctx.gfx.set_depth_test_func(DepthTestFunc::LessOrEqual);
    list.render_trans(ctx);
}

fn render_debug(list: &RenderList, portals: &PortalContainer, ctx: &mut RenderContext<'_>) {
    let flags = ctx.settings.config.debug_flags;
    let stats = ctx.settings.stats;
    if flags.contains(DebugFlags::SHADOW_STATS) {
        info!(
            "Shadows: {} casters, {} volumes, {} depth-fail",
            stats.shadow_casters, stats.shadow_volumes, stats.z_fail_volumes
        );
    }
    if !flags.intersects(DebugFlags::BOUNDING_BOX | DebugFlags::LIGHT_BOUNDS | DebugFlags::SECTORS | DebugFlags::PORTALS) {
        return;
    }

    ctx.gfx.set_matrix(MatrixType::ModelView, ctx.frustum.view_matrix());
    if flags.contains(DebugFlags::BOUNDING_BOX) {
        for &id in list.objects().iter().chain(list.transparent_objects()) {
            if let Some(entity) = ctx.store.get(id) {
                let bv = entity.bounding_volume();
                ctx.gfx.draw_box_min_max(&bv.min(), &bv.max(), Color::WHITE);
            }
        }
    }
    if flags.contains(DebugFlags::LIGHT_BOUNDS) {
        for &light_id in list.lights() {
            if let Some(light) = ctx.lights.get(light_id) {
                let position = light.position(ctx.store);
                ctx.gfx.draw_sphere(&position, light.far_attenuation(), light.diffuse_color());
            }
        }
    }
    for &sector_id in portals.visible_sectors_list() {
        let Some(sector) = portals.sector(sector_id) else {
            continue;
        };
        if flags.contains(DebugFlags::SECTORS) {
            let bv = sector.bounding_volume();
            ctx.gfx.draw_box_min_max(&bv.min(), &bv.max(), Color::rgb(0.0, 1.0, 0.0));
        }
        if flags.contains(DebugFlags::PORTALS) {
            for portal in sector.portals() {
                let bv = portal.bounding_volume();
                let color = if portal.is_active() { Color::rgb(0.0, 0.0, 1.0) } else { Color::rgb(1.0, 0.0, 0.0) };
                ctx.gfx.draw_box_min_max(&bv.min(), &bv.max(), color);
            }
        }
    }
    ctx.settings.reset_bound_states();
}

fn end_frame(list: &RenderList, pool: &mut HashMap<EntityId, OcclusionQueryId>, ctx: &mut RenderContext<'_>) {
    if ctx.settings.config.motion_blur {
        for &id in list.objects().iter().chain(list.transparent_objects()) {
            if let Some(renderable) = ctx.store.get(id).and_then(|e| e.renderable()) {
                renderable.set_prev_matrix(ctx.store.world_matrix(id));
            }
        }
    }

    let requested: HashSet<EntityId> = list.occlusion_objects().iter().copied().collect();
    let stale: Vec<EntityId> = pool.keys().filter(|id| !requested.contains(id)).copied().collect();
    for id in stale {
        if let Some(query) = pool.remove(&id) {
            ctx.gfx.destroy_occlusion_query(query);
        }
    }

    ctx.gfx.set_identity_matrix(MatrixType::ModelView);
    ctx.gfx.flush_rendering();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::config::FogConfig;
    use crate::foundation::math::Vec3;
    use crate::render::graphics::VertexBufferId;
    use crate::render::material::StandardMaterial;
    use crate::render::recording::{GraphicsCommand, RecordingGraphics};
    use crate::render::vertex_buffer::MeshBuffer;
    use crate::scene::entity::Entity3D;
    use crate::scene::renderable::Renderable;
    use crate::scene::world::World3D;

    fn block(position: Vec3, occlusion_query: bool) -> Entity3D {
        let mesh = MeshBuffer::cuboid(VertexBufferId(3), Vec3::repeat(0.5));
        let shadow = Arc::new(mesh.shadow_mesh().unwrap());
        let mut renderable =
            Renderable::normal(Arc::new(StandardMaterial::solid("stone")), Arc::new(mesh)).with_shadow_mesh(shadow);
        if occlusion_query {
            renderable = renderable.with_occlusion_query();
        }
        Entity3D::new("block")
            .with_renderable(renderable)
            .with_bounds(Vec3::repeat(-0.5), Vec3::repeat(0.5))
            .with_matrix(Mat4::new_translation(&position))
    }

    /// One large room with a block under a lamp
    fn scene(occlusion_query: bool) -> (World3D, EntityId) {
        let mut world = World3D::new();
        world.portals.add_sector("room");
        world
            .portals
            .add_sector_bounds("room", &Vec3::new(-10.0, 0.0, -50.0), &Vec3::new(10.0, 5.0, 10.0))
            .unwrap();
        world.compile();
        let id = world.create_renderable(block(Vec3::new(0.0, 0.5, -3.0), occlusion_query), true);
        world.create_point_light("lamp", Vec3::new(0.0, 3.0, -3.0), Color::WHITE, 6.0);
        (world, id)
    }

    fn camera() -> Camera3D {
        let mut camera = Camera3D::perspective(Vec3::new(0.0, 2.0, 4.0), 60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 1.0, -10.0), Vec3::y());
        camera
    }

    fn draws(gfx: &RecordingGraphics) -> usize {
        gfx.count(|c| matches!(c, GraphicsCommand::DrawVertexBuffer(..)))
    }

    fn position(gfx: &RecordingGraphics, nth: usize, predicate: impl Fn(&GraphicsCommand) -> bool) -> usize {
        gfx.commands()
            .iter()
            .enumerate()
            .filter(|(_, c)| predicate(c))
            .nth(nth)
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_frame_runs_depth_light_and_diffuse_passes() {
        let (mut world, _) = scene(false);
        let mut renderer = Renderer3D::new(RendererConfig::default());
        let mut gfx = RecordingGraphics::new();

        let stats = renderer.render_world(&mut world, &camera(), &mut gfx);

        assert_eq!(stats.objects, 1);
        assert_eq!(stats.lights, 1);
        assert_eq!(stats.visible_sectors, 1);
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.shadow_casters, 1);
        assert_eq!(draws(&gfx), 3);
        assert_eq!(renderer.frame(), 1);

        assert!(matches!(gfx.commands()[0], GraphicsCommand::SetMatrix(MatrixType::Projection, _)));
        assert_eq!(gfx.commands().last(), Some(&GraphicsCommand::Flush));

        let is_draw = |c: &GraphicsCommand| matches!(c, GraphicsCommand::DrawVertexBuffer(..));
        let stencil_on = position(&gfx, 0, |c| *c == GraphicsCommand::StencilActive(true));
        assert!(position(&gfx, 0, is_draw) < stencil_on);
        assert!(stencil_on < position(&gfx, 1, is_draw));
    }

    #[test]
    fn test_disabled_lighting_skips_light_pass() {
        let (mut world, _) = scene(false);
        let config = RendererConfig::default().with_debug_flags(DebugFlags::DISABLE_LIGHTING);
        let mut renderer = Renderer3D::new(config);
        let mut gfx = RecordingGraphics::new();

        let stats = renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(stats.lights, 0);
        assert_eq!(draws(&gfx), 2);
        assert_eq!(gfx.count(|c| *c == GraphicsCommand::StencilActive(true)), 0);
    }

    #[test]
    fn test_occluded_objects_are_skipped_after_depth_pass() {
        let (mut world, _) = scene(true);
        let mut renderer = Renderer3D::new(RendererConfig::default().with_occlusion_queries(true));
        let mut gfx = RecordingGraphics::new().with_default_samples(0).with_query_latency(2);

        let stats = renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(stats.occlusion_queries, 1);
        assert_eq!(stats.occluded_objects, 1);
        assert_eq!(draws(&gfx), 1);
        assert_eq!(gfx.query_polls(), 3);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::SolidBox(..))), 1);
    }

    #[test]
    fn test_visible_query_keeps_object() {
        let (mut world, _) = scene(true);
        let mut renderer = Renderer3D::new(RendererConfig::default().with_occlusion_queries(true));
        let mut gfx = RecordingGraphics::new();

        let stats = renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(stats.occluded_objects, 0);
        assert_eq!(draws(&gfx), 3);
    }

    #[test]
    fn test_query_pool_is_reused_then_released() {
        let (mut world, id) = scene(true);
        let mut renderer = Renderer3D::new(RendererConfig::default().with_occlusion_queries(true));
        let mut gfx = RecordingGraphics::new();

        renderer.render_world(&mut world, &camera(), &mut gfx);
        renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(renderer.occlusion_query_count(), 1);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::CreateQuery(_))), 1);

        world.remove_entity(id).unwrap();
        renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(renderer.occlusion_query_count(), 0);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::DestroyQuery(_))), 1);
    }

    #[test]
    fn test_fog_without_program_is_skipped() {
        let (mut world, _) = scene(false);
        let fog = FogConfig { active: true, ..FogConfig::default() };
        let mut renderer = Renderer3D::new(RendererConfig::default().with_fog(fog));
        let mut gfx = RecordingGraphics::new();

        renderer.render_world(&mut world, &camera(), &mut gfx);
        renderer.render_world(&mut world, &camera(), &mut gfx);
        assert!(renderer.fog_warning_issued);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::BindProgram(_))), 0);
        assert_eq!(draws(&gfx), 6);
    }

    #[test]
    fn test_fog_program_redraws_opaque_objects() {
        let (mut world, _) = scene(false);
        let fog = FogConfig { active: true, ..FogConfig::default() };
        let program = GpuProgramId(9);
        let config = RendererConfig::default().with_fog(fog).with_fog_program(program);
        let mut renderer = Renderer3D::new(config);
        let mut gfx = RecordingGraphics::new();

        let stats = renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(gfx.count(|c| *c == GraphicsCommand::BindProgram(program)), 1);
        assert_eq!(
            gfx.count(|c| matches!(c, GraphicsCommand::ProgramParam(p, name, _) if *p == program && name == "FogEnd")),
            1
        );
        assert_eq!(draws(&gfx), 4);
        assert_eq!(stats.draw_calls, 4);
    }

    #[test]
    fn test_fog_culling_pulls_in_far_plane() {
        let (mut world, _) = scene(false);
        world.create_renderable(block(Vec3::new(0.0, 0.5, -40.0), false), true);

        let mut renderer = Renderer3D::new(RendererConfig::default());
        let mut gfx = RecordingGraphics::new();
        assert_eq!(renderer.render_world(&mut world, &camera(), &mut gfx).objects, 2);

        let fog = FogConfig { active: true, culling: true, end: 20.0, ..FogConfig::default() };
        renderer.config_mut().fog = fog;
        assert_eq!(renderer.render_world(&mut world, &camera(), &mut gfx).objects, 1);
    }

    #[test]
    fn test_motion_blur_records_previous_matrix() {
        let (mut world, id) = scene(false);
        let mut renderer = Renderer3D::new(RendererConfig::default().with_motion_blur(true));
        let mut gfx = RecordingGraphics::new();

        renderer.render_world(&mut world, &camera(), &mut gfx);
        let before = world.entities.world_matrix(id);
        world.set_position(id, Vec3::new(1.0, 0.5, -3.0));
        renderer.render_world(&mut world, &camera(), &mut gfx);

        let renderable = world.entities.get(id).and_then(Entity3D::renderable).unwrap();
        assert_ne!(renderable.prev_matrix(), Some(before));
        assert_eq!(renderable.prev_matrix(), Some(world.entities.world_matrix(id)));
    }

    #[test]
    fn test_debug_overlays_and_sky_box() {
        let (mut world, _) = scene(false);
        let flags = DebugFlags::BOUNDING_BOX | DebugFlags::SECTORS | DebugFlags::LIGHT_BOUNDS;
        let mut renderer = Renderer3D::new(RendererConfig::default().with_debug_flags(flags));
        renderer.set_sky_box(Some(SkyBox {
            half_size: 50.0,
            color: Color::WHITE,
            texture: Some(TextureId(4)),
        }));
        let mut gfx = RecordingGraphics::new();

        renderer.render_world(&mut world, &camera(), &mut gfx);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::DebugBox(..))), 2);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::DebugSphere(..))), 1);

        let sky = position(&gfx, 0, |c| matches!(c, GraphicsCommand::SkyCube(_)));
        let last_draw = position(&gfx, 2, |c| matches!(c, GraphicsCommand::DrawVertexBuffer(..)));
        assert!(last_draw < sky);
        assert_eq!(gfx.commands()[sky - 1], GraphicsCommand::SetTexture(0, Some(TextureId(4))));
    }
}
