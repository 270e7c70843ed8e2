//! # Low-Level Graphics Interface
//!
//! Backend-agnostic surface the renderer issues state changes and draws
//! through. It mirrors a fixed-function OpenGL style device: matrices, depth,
//! alpha test, blending, colour mask, culling, scissor, one and two sided
//! stencil, GPU programs, vertex buffers and occlusion queries.
//!
//! Resources are referred to by small integer ids owned by the backend.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Color, Mat4, Rect2l, Vec3};

/// Number of texture units tracked by render states
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Backend texture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// Backend GPU program handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GpuProgramId(pub u32);

/// Backend vertex buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexBufferId(pub u32);

/// Backend occlusion query handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OcclusionQueryId(pub u32);

/// Queryable device capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicCaps {
    /// Two-sided stencil operations in a single pass (non-zero if supported)
    TwoSideStencil,
}

/// Matrix slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixType {
    /// Model-view matrix
    ModelView,
    /// Projection matrix
    Projection,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthTestFunc {
    /// Never passes
    Never,
    /// Passes if less
    Less,
    /// Passes if less or equal
    LessOrEqual,
    /// Passes if greater
    Greater,
    /// Passes if greater or equal
    GreaterOrEqual,
    /// Passes if equal
    Equal,
    /// Passes if not equal
    NotEqual,
    /// Always passes
    Always,
}

/// Alpha test comparison
pub type AlphaTestFunc = DepthTestFunc;

/// Stencil comparison
pub type StencilFunc = DepthTestFunc;

/// Blend factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFunc {
    /// 0
    Zero,
    /// 1
    One,
    /// Source colour
    SrcColor,
    /// 1 - source colour
    OneMinusSrcColor,
    /// Destination colour
    DestColor,
    /// 1 - destination colour
    OneMinusDestColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination alpha
    DestAlpha,
    /// 1 - destination alpha
    OneMinusDestAlpha,
    /// Saturated source alpha
    SrcAlphaSaturate,
}

/// Stencil operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    /// Keep the current value
    Keep,
    /// Set to zero
    Zero,
    /// Replace with the reference value
    Replace,
    /// Increment, clamping
    Increment,
    /// Decrement, clamping
    Decrement,
    /// Bitwise invert
    Invert,
    /// Increment, wrapping
    IncrementWrap,
    /// Decrement, wrapping
    DecrementWrap,
}

/// Stencil face selector for two-sided stencil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilFace {
    /// Front-facing polygons
    Front,
    /// Back-facing polygons
    Back,
}

/// Winding treated as front facing when culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Cull clockwise polygons
    Clockwise,
    /// Cull counter-clockwise polygons
    CounterClockwise,
}

/// Full stencil configuration for one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Comparison
    pub func: StencilFunc,
    /// Reference value
    pub reference: i32,
    /// Comparison mask
    pub mask: u32,
    /// Operation when the stencil test fails
    pub fail: StencilOp,
    /// Operation when the depth test fails
    pub z_fail: StencilOp,
    /// Operation when both tests pass
    pub z_pass: StencilOp,
}

impl StencilState {
    /// Stencil state that always passes and applies the given operations
    pub const fn always(fail: StencilOp, z_fail: StencilOp, z_pass: StencilOp) -> Self {
        Self {
            func: DepthTestFunc::Always,
            reference: 0,
            mask: 0xFF,
            fail,
            z_fail,
            z_pass,
        }
    }

    /// Stencil state testing `func` against `reference` without modifying the buffer
    pub const fn test(func: StencilFunc, reference: i32) -> Self {
        Self {
            func,
            reference,
            mask: 0xFF,
            fail: StencilOp::Keep,
            z_fail: StencilOp::Keep,
            z_pass: StencilOp::Keep,
        }
    }
}

/// Named parameter value passed to a GPU program
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgramParam {
    /// Scalar
    Float(f32),
    /// 3 component vector
    Vec3(Vec3),
    /// Colour
    Color(Color),
    /// Matrix
    Matrix(Mat4),
}

/// Device interface used by every render pass
pub trait LowLevelGraphics {
    /// Capability value; booleans report 0 or 1
    fn capability(&self, cap: GraphicCaps) -> i32;

    /// Set a matrix slot
    fn set_matrix(&mut self, ty: MatrixType, matrix: &Mat4);

    /// Reset a matrix slot to identity
    fn set_identity_matrix(&mut self, ty: MatrixType);

    /// Bind (or unbind with `None`) a texture on a unit
    fn set_texture(&mut self, unit: usize, texture: Option<TextureId>);

    /// Enable or disable depth testing
    fn set_depth_test_active(&mut self, active: bool);

    /// Enable or disable depth writes
    fn set_depth_write_active(&mut self, active: bool);

    /// Set the depth comparison
    fn set_depth_test_func(&mut self, func: DepthTestFunc);

    /// Enable or disable alpha testing
    fn set_alpha_test_active(&mut self, active: bool);

    /// Set the alpha comparison and reference
    fn set_alpha_test_func(&mut self, func: AlphaTestFunc, reference: f32);

    /// Enable or disable blending
    fn set_blend_active(&mut self, active: bool);

    /// Set the blend factors
    fn set_blend_func(&mut self, src: BlendFunc, dest: BlendFunc);

    /// Set the colour write mask
    fn set_color_write_active(&mut self, r: bool, g: bool, b: bool, a: bool);

    /// Enable or disable face culling
    fn set_cull_active(&mut self, active: bool);

    /// Set the culled winding
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Enable or disable the scissor test
    fn set_scissor_active(&mut self, active: bool);

    /// Set the scissor rectangle
    fn set_scissor_rect(&mut self, rect: &Rect2l);

    /// Enable or disable the stencil test
    fn set_stencil_active(&mut self, active: bool);

    /// Set the one-sided stencil state
    fn set_stencil(&mut self, state: &StencilState);

    /// Enable or disable two-sided stencil
    fn set_stencil_two_side_active(&mut self, active: bool);

    /// Set the stencil state of one face in two-sided mode
    fn set_stencil_two_side(&mut self, face: StencilFace, state: &StencilState);

    /// Value written by stencil clears
    fn set_clear_stencil(&mut self, value: i32);

    /// Clear the selected buffers
    fn clear_screen(&mut self, color: bool, depth: bool, stencil: bool);

    /// Bind a GPU program
    fn bind_gpu_program(&mut self, program: GpuProgramId);

    /// Unbind a GPU program
    fn unbind_gpu_program(&mut self, program: GpuProgramId);

    /// Set a GPU program parameter
    fn set_gpu_program_param(&mut self, program: GpuProgramId, name: &str, value: ProgramParam);

    /// Bind (or unbind with `None`) a vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: Option<VertexBufferId>);

    /// Draw `index_count` indices of a vertex buffer
    fn draw_vertex_buffer(&mut self, buffer: VertexBufferId, index_count: usize);

    /// Draw indexed triangles from client memory.
    ///
    /// `vertices` holds `vertex_stride` floats per vertex.
    fn draw_user_indexed(&mut self, vertices: &[f32], vertex_stride: usize, indices: &[u32]);

    /// Create an occlusion query
    fn create_occlusion_query(&mut self) -> OcclusionQueryId;

    /// Destroy an occlusion query
    fn destroy_occlusion_query(&mut self, query: OcclusionQueryId);

    /// Start counting samples
    fn begin_occlusion_query(&mut self, query: OcclusionQueryId);

    /// Stop counting samples
    fn end_occlusion_query(&mut self, query: OcclusionQueryId);

    /// True once the query result is available
    fn fetch_occlusion_query_results(&mut self, query: OcclusionQueryId) -> bool;

    /// Samples that passed during the query
    fn occlusion_query_sample_count(&self, query: OcclusionQueryId) -> u32;

    /// Solid box, used for occlusion query proxies
    fn draw_solid_box(&mut self, min: &Vec3, max: &Vec3);

    /// Debug line box
    fn draw_box_min_max(&mut self, min: &Vec3, max: &Vec3, color: Color);

    /// Debug wire sphere
    fn draw_sphere(&mut self, center: &Vec3, radius: f32, color: Color);

    /// Sky cube centred on the current model-view origin
    fn draw_sky_cube(&mut self, half_size: f32, color: Color);

    /// Submit pending work
    fn flush_rendering(&mut self);
}
