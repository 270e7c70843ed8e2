//! # HPL Render
//!
//! Portal/sector visibility and a stencil-shadowed forward render pipeline.
//!
//! ## Features
//!
//! - **Sectors and portals**: objects are filed into convex sectors, and each
//!   frame walks the portal graph outward from the camera
//! - **State-sorted render lists**: visible objects are merged into render
//!   state trees so shared state is applied once per pass
//! - **Stencil shadows**: silhouette extrusion with z-pass or z-fail per caster
//! - **Device independent**: every pass talks to [`render::LowLevelGraphics`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hpl_render::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let level = LevelDescription::load_from_file("three_rooms.ron")?;
//!     let mut world = World3D::new();
//!     world.load_level(&level)?;
//!     world.create_point_light("lamp", Vec3::new(0.0, 2.0, 0.0), Color::WHITE, 8.0);
//!
//!     let mut camera = Camera3D::perspective(Vec3::new(0.0, 2.0, 4.0), 60.0, 16.0 / 9.0, 0.1, 100.0);
//!     camera.look_at(Vec3::new(0.0, 2.0, -10.0), Vec3::y());
//!
//!     let mut renderer = Renderer3D::new(RendererConfig::default());
//!     let mut gfx = RecordingGraphics::new();
//!     let stats = renderer.render_world(&mut world, &camera, &mut gfx);
//!     println!("{} objects in {} sectors", stats.objects, stats.visible_sectors);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod portal;
pub mod render;
pub mod scene;
pub mod spatial;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{FogConfig, RendererConfig},
        foundation::{
            collections::{EntityId, LightId, SectorId},
            math::{Color, Mat4, Vec3},
        },
        portal::{Portal, PortalContainer, PortalKey, Sector, SectorVisibilityContainer},
        render::{
            Camera3D, DebugFlags, Light3D, LowLevelGraphics, Material, MeshBuffer, RecordingGraphics, RenderStats,
            Renderer3D, ShadowMesh, ShowShadows, StandardMaterial, VertexBuffer,
        },
        scene::{Entity3D, LevelDescription, Renderable, SceneError, SceneResult, World3D},
        spatial::{BoundingVolume, Frustum},
    };
}
