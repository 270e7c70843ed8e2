//! Scene construction errors

use crate::foundation::collections::{EntityId, LightId};

/// Result alias for scene construction
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors raised while building or editing a scene
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// A sector name did not resolve
    #[error("unknown sector '{0}'")]
    UnknownSector(String),

    /// An entity handle is stale or was never issued
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),

    /// A light handle is stale or was never issued
    #[error("unknown light {0:?}")]
    UnknownLight(LightId),

    /// Two portals of one sector share an id
    #[error("sector '{sector}' already has a portal with id {id}")]
    DuplicatePortal {
        /// Owning sector
        sector: String,
        /// Portal id
        id: i32,
    },

    /// Attaching or detaching would break the parent chain
    #[error("cannot change parent of {child:?} under {parent:?}")]
    InvalidHierarchy {
        /// Requested parent
        parent: EntityId,
        /// Entity being moved
        child: EntityId,
    },

    /// A level description is malformed
    #[error("invalid level: {0}")]
    InvalidLevel(String),
}
