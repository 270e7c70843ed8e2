//! # Render Settings
//!
//! Per-renderer mutable state shared by every pass: the configuration, the
//! cache of currently bound render states, the set of objects rejected by
//! occlusion queries and the frame statistics.

use std::collections::HashSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::config::RendererConfig;
use crate::foundation::collections::EntityId;
use crate::render::render_state::{RenderState, RenderStateKind};

/// Which shadow casters are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShowShadows {
    /// Static and dynamic casters
    #[default]
    All,
    /// Static casters only
    StaticOnly,
    /// No stencil shadows
    None,
}

impl ShowShadows {
    /// True if static casters are drawn
    pub const fn static_casters(self) -> bool {
        matches!(self, Self::All | Self::StaticOnly)
    }

    /// True if dynamic casters are drawn
    pub const fn dynamic_casters(self) -> bool {
        matches!(self, Self::All)
    }
}

bitflags! {
    /// Debug overlays drawn after the transparent pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DebugFlags: u32 {
        /// Bounding boxes of rendered objects
        const BOUNDING_BOX = 1 << 0;
        /// Light ranges
        const LIGHT_BOUNDS = 1 << 1;
        /// Bounds of visible sectors
        const SECTORS = 1 << 2;
        /// Portal bounds of visible sectors
        const PORTALS = 1 << 3;
        /// Log shadow statistics every frame
        const SHADOW_STATS = 1 << 4;
        /// Skip the light passes
        const DISABLE_LIGHTING = 1 << 5;
    }
}

/// Stencil shadow technique used for one volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowAlgorithm {
    /// Depth pass counting, valid while the eye is outside the volume
    ZPass,
    /// Depth fail counting with capped volumes
    ZFail,
}

/// Counters collected during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Objects added to the render list
    pub objects: usize,
    /// Lights rendered
    pub lights: usize,
    /// Vertex buffer draws
    pub draw_calls: usize,
    /// Render state changes actually issued
    pub state_changes: usize,
    /// Shadow casters considered
    pub shadow_casters: usize,
    /// Shadow volumes drawn
    pub shadow_volumes: usize,
    /// Volumes drawn with depth fail
    pub z_fail_volumes: usize,
    /// Occlusion queries issued
    pub occlusion_queries: usize,
    /// Objects skipped after a query returned no samples
    pub occluded_objects: usize,
    /// Sectors reached from the camera
    pub visible_sectors: usize,
}

/// Mutable state threaded through the render passes
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Renderer configuration
    pub config: RendererConfig,
    /// Frame statistics
    pub stats: RenderStats,
    /// Objects skipped by the render leaf this frame
    pub occluded: HashSet<EntityId>,
    /// Two-sided stencil is used for shadow volumes
    pub two_sided_stencil: bool,
    /// Algorithm of the most recent shadow volume
    pub last_shadow_algo: Option<ShadowAlgorithm>,
    bound: [Option<RenderState>; RenderStateKind::COUNT],
}

impl RenderSettings {
    /// Settings for a configuration
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            stats: RenderStats::default(),
            occluded: HashSet::new(),
            two_sided_stencil: false,
            last_shadow_algo: None,
            bound: Default::default(),
        }
    }

    /// Currently bound state of a kind
    pub fn bound(&self, kind: RenderStateKind) -> Option<&RenderState> {
        self.bound[kind as usize].as_ref()
    }

    /// Record `state` as bound, returning the state it replaces
    pub fn bind(&mut self, state: RenderState) -> Option<RenderState> {
        let kind = state.kind() as usize;
        self.bound[kind].replace(state)
    }

    /// Forget the bound state of one kind
    pub fn forget(&mut self, kind: RenderStateKind) {
        self.bound[kind as usize] = None;
    }

    /// Forget every bound state, forcing the next pass to reissue all changes
    pub fn reset_bound_states(&mut self) {
        self.bound = Default::default();
    }

    /// Clear per-frame data
    pub fn begin_frame(&mut self) {
        self.stats = RenderStats::default();
        self.occluded.clear();
        self.last_shadow_algo = None;
        self.reset_bound_states();
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}
