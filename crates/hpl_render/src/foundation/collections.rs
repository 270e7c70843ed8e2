//! Handle types for the renderer's arenas
//!
//! Every cross-reference between scene objects, sectors, lights and render
//! nodes goes through one of these generation-tagged keys instead of a
//! pointer. A key whose slot has been reused no longer resolves.

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to an [`Entity3D`](crate::scene::Entity3D) in an [`EntityStore`](crate::scene::EntityStore)
    pub struct EntityId;

    /// Handle to a [`Sector`](crate::portal::Sector) inside a [`PortalContainer`](crate::portal::PortalContainer)
    pub struct SectorId;

    /// Handle to a [`Light3D`](crate::render::Light3D)
    pub struct LightId;

    /// Handle to a node of the render tree
    pub struct RenderNodeId;

    /// Handle to a render state stored in the render tree arena
    pub struct RenderStateId;
}
