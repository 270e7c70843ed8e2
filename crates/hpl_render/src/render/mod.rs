//! # Rendering
//!
//! Device-independent render pipeline: state-sorted render lists, stencil
//! shadow volumes and the pass sequence of [`Renderer3D`].
//!
//! ## Architecture
//!
//! - **Renderer3D**: frame driver, owns the render list and settings
//! - **RenderList**: visible objects sorted into state trees per pass
//! - **Light3D**: per-light caster sets and the stencil shadow pass
//! - **LowLevelGraphics**: the device every pass talks to
//!
//! [`RecordingGraphics`] implements the device by recording each call, which
//! is what the tests and the demo render against.

pub mod camera;
pub mod graphics;
pub mod light;
pub mod material;
pub mod recording;
pub mod render_list;
pub mod render_node;
pub mod render_settings;
pub mod render_state;
pub mod renderer3d;
pub mod shadow_mesh;
pub mod vertex_buffer;

pub use camera::Camera3D;
pub use graphics::{
    BlendFunc, CullMode, DepthTestFunc, GpuProgramId, GraphicCaps, LowLevelGraphics, MatrixType, OcclusionQueryId,
    ProgramParam, StencilFace, StencilFunc, StencilOp, StencilState, TextureId, VertexBufferId,
};
pub use light::{Light3D, LightKind, LightMap, ShadowDrawInfo};
pub use material::{AlphaMode, BlendMode, ChannelMode, Material, MaterialRenderType, StandardMaterial};
pub use recording::{GraphicsCommand, RecordingGraphics};
pub use render_list::{RenderList, MAX_NUM_OF_LIGHTS};
pub use render_node::{RenderArena, RenderNode};
pub use render_settings::{DebugFlags, RenderSettings, RenderStats, ShadowAlgorithm, ShowShadows};
pub use render_state::{ProgramBinding, RenderContext, RenderState, RenderStateKind};
pub use renderer3d::{Renderer3D, SkyBox};
pub use shadow_mesh::{MeshError, ShadowMesh, ShadowVolumeGeometry, TriEdge};
pub use vertex_buffer::{MeshBuffer, VertexBuffer};
