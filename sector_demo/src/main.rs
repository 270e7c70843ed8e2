//! Sector demo
//!
//! Loads a three-room level, furnishes it, and renders a short walk-through
//! against the recording backend. Each frame logs which rooms were reached
//! through the portals and what the passes cost.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hpl_render::prelude::*;
use hpl_render::render::{GraphicsCommand, VertexBufferId};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scene: {0}")]
    Scene(#[from] SceneError),

    #[error("mesh: {0}")]
    Mesh(#[from] hpl_render::render::MeshError),
}

const FRAMES: usize = 12;

struct DemoApp {
    world: World3D,
    renderer: Renderer3D,
    camera: Camera3D,
    gfx: RecordingGraphics,
    cart: EntityId,
    vault_door: Option<PortalKey>,
}

impl DemoApp {
    fn new(assets: &Path) -> Result<Self, DemoError> {
        let level_path = assets.join("three_rooms.ron");
        log::info!("Loading level from {}", level_path.display());
        let level = LevelDescription::load_from_file(&level_path)?;

        let config_path = assets.join("renderer.toml");
        let config = match RendererConfig::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default renderer config: {}", e);
                RendererConfig::default()
            }
        };

        let mut world = World3D::new();
        world.load_level(&level)?;

        let stone = Arc::new(StandardMaterial::solid("stone"));
        let glass = Arc::new(StandardMaterial::transparent("glass", hpl_render::render::BlendMode::Alpha));

        for (i, position) in [
            Vec3::new(-3.0, 0.5, 2.0),
            Vec3::new(3.0, 0.5, -10.0),
            Vec3::new(0.0, 0.5, -20.0),
            Vec3::new(4.0, 0.5, -23.0),
        ]
        .into_iter()
        .enumerate()
        {
            let id = world.create_renderable(Self::block(i as u32, position, Arc::clone(&stone), true)?, true);
            log::debug!("Pillar {:?} at {:?}", id, position);
        }
        let pane = Self::block(10, Vec3::new(0.0, 1.5, -12.0), glass, false)?;
        world.create_renderable(pane, true);

        let cart = Self::block(20, Vec3::new(0.0, 0.5, 0.0), stone, true)?;
        let cart = world.create_renderable(cart, false);

        world.create_point_light("entrance lamp", Vec3::new(0.0, 3.5, 0.0), Color::rgb(1.0, 0.9, 0.7), 7.0);
        world.create_point_light("vault lamp", Vec3::new(0.0, 3.5, -20.0), Color::rgb(0.6, 0.7, 1.0), 9.0);

        let vault_door = world.portals.sector_by_name("gallery").and_then(|gallery| {
            let sector = world.portals.sector(gallery)?;
            let index = sector.portal_index_by_id(2)?;
            Some(PortalKey { sector: gallery, index })
        });

        let (width, height) = config.screen_size;
        let mut camera = Camera3D::perspective(Vec3::new(0.0, 2.0, 4.0), 60.0, width as f32 / height as f32, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 1.5, -20.0), Vec3::y());

        Ok(Self {
            world,
            renderer: Renderer3D::new(config),
            camera,
            gfx: RecordingGraphics::new(),
            cart,
            vault_door,
        })
    }

    fn block(
        buffer: u32,
        position: Vec3,
        material: Arc<StandardMaterial>,
        casts_shadows: bool,
    ) -> Result<Entity3D, DemoError> {
        let mesh = MeshBuffer::cuboid(VertexBufferId(buffer), Vec3::repeat(0.5));
        let (min, max) = mesh.bounds();
        let mut renderable = Renderable::normal(material, Arc::new(mesh.clone())).with_occlusion_query();
        if casts_shadows {
            renderable = renderable.with_shadow_mesh(Arc::new(mesh.shadow_mesh()?));
        }
        Ok(Entity3D::new(format!("block {buffer}"))
            .with_renderable(renderable)
            .with_bounds(min, max)
            .with_matrix(Mat4::new_translation(&position)))
    }

    fn run(&mut self) {
        for frame in 0..FRAMES {
            self.update(frame);
            let stats = self.renderer.render_world(&mut self.world, &self.camera, &mut self.gfx);
            let commands = self.gfx.take_commands();
            let shadow_draws = commands
                .iter()
                .filter(|c| matches!(c, GraphicsCommand::DrawUserIndexed { .. }))
                .count();

            let rooms: Vec<&str> = self
                .world
                .portals
                .visible_sectors_list()
                .iter()
                .filter_map(|&id| self.world.portals.sector(id).map(Sector::name))
                .collect();
            log::info!(
                "Frame {:2}: rooms {:?}, {} objects, {} lights, {} draws, {} state changes, {} shadow draws, {} occluded",
                frame,
                rooms,
                stats.objects,
                stats.lights,
                stats.draw_calls,
                stats.state_changes,
                shadow_draws,
                stats.occluded_objects
            );
        }
    }

    fn update(&mut self, frame: usize) {
        // The cart rolls from the entrance into the vault
        let z = -(frame as f32) * 2.0;
        self.world.set_position(self.cart, Vec3::new(0.0, 0.5, z));

        if frame == FRAMES / 2 {
            if let Some(door) = self.vault_door {
                log::info!("Closing the vault door");
                self.world.portals.set_portal_active(door, false);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    hpl_render::foundation::logging::init_with_level(log::LevelFilter::Info);

    let assets = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"), PathBuf::from);

    log::info!("Starting sector demo");
    let mut app = DemoApp::new(&assets)?;
    app.run();
    log::info!("Sector demo finished after {} frames", app.renderer.frame());
    Ok(())
}
