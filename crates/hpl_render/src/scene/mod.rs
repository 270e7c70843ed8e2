//! Scene graph: entities, renderables and the world that owns them
//!
//! ```text
//! World3D
//!   ├─ EntityStore   (transforms, bounds, renderables)
//!   ├─ LightMap      (lights following entities)
//!   └─ PortalContainer (sector filing)
//! ```

pub mod entity;
pub mod error;
pub mod renderable;
pub mod world;

pub use entity::{ContainerClass, ContainerData, Entity3D, EntityStore};
pub use error::{SceneError, SceneResult};
pub use renderable::{Renderable, RenderableType};
pub use world::{LevelDescription, PortalDescription, SectorDescription, World3D};
