//! Command-recording graphics backend
//!
//! [`RecordingGraphics`] implements [`LowLevelGraphics`] by appending every
//! call to a command list. It backs the demo application and lets tests
//! assert on exactly which state changes and draws a pass issued.

use std::collections::HashMap;

use crate::foundation::math::{Color, Mat4, Rect2l, Vec3};
use crate::render::graphics::{
    AlphaTestFunc, BlendFunc, CullMode, DepthTestFunc, GpuProgramId, GraphicCaps, LowLevelGraphics, MatrixType,
    OcclusionQueryId, ProgramParam, StencilFace, StencilState, TextureId, VertexBufferId,
};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsCommand {
    /// `set_matrix`
    SetMatrix(MatrixType, Mat4),
    /// `set_identity_matrix`
    SetIdentityMatrix(MatrixType),
    /// `set_texture`
    SetTexture(usize, Option<TextureId>),
    /// `set_depth_test_active`
    DepthTestActive(bool),
    /// `set_depth_write_active`
    DepthWriteActive(bool),
    /// `set_depth_test_func`
    DepthTestFunc(DepthTestFunc),
    /// `set_alpha_test_active`
    AlphaTestActive(bool),
    /// `set_alpha_test_func`
    AlphaTestFunc(AlphaTestFunc, f32),
    /// `set_blend_active`
    BlendActive(bool),
    /// `set_blend_func`
    BlendFunc(BlendFunc, BlendFunc),
    /// `set_color_write_active`
    ColorWrite(bool, bool, bool, bool),
    /// `set_cull_active`
    CullActive(bool),
    /// `set_cull_mode`
    CullMode(CullMode),
    /// `set_scissor_active`
    ScissorActive(bool),
    /// `set_scissor_rect`
    ScissorRect(Rect2l),
    /// `set_stencil_active`
    StencilActive(bool),
    /// `set_stencil`
    Stencil(StencilState),
    /// `set_stencil_two_side_active`
    StencilTwoSideActive(bool),
    /// `set_stencil_two_side`
    StencilTwoSide(StencilFace, StencilState),
    /// `set_clear_stencil`
    ClearStencilValue(i32),
    /// `clear_screen`
    Clear {
        /// Colour buffer cleared
        color: bool,
        /// Depth buffer cleared
        depth: bool,
        /// Stencil buffer cleared
        stencil: bool,
    },
    /// `bind_gpu_program`
    BindProgram(GpuProgramId),
    /// `unbind_gpu_program`
    UnbindProgram(GpuProgramId),
    /// `set_gpu_program_param`
    ProgramParam(GpuProgramId, String, ProgramParam),
    /// `bind_vertex_buffer`
    BindVertexBuffer(Option<VertexBufferId>),
    /// `draw_vertex_buffer`
    DrawVertexBuffer(VertexBufferId, usize),
    /// `draw_user_indexed`
    DrawUserIndexed {
        /// Vertices submitted
        vertex_count: usize,
        /// Indices submitted
        index_count: usize,
    },
    /// `create_occlusion_query`
    CreateQuery(OcclusionQueryId),
    /// `destroy_occlusion_query`
    DestroyQuery(OcclusionQueryId),
    /// `begin_occlusion_query`
    BeginQuery(OcclusionQueryId),
    /// `end_occlusion_query`
    EndQuery(OcclusionQueryId),
    /// `draw_solid_box`
    SolidBox(Vec3, Vec3),
    /// `draw_box_min_max`
    DebugBox(Vec3, Vec3),
    /// `draw_sphere`
    DebugSphere(Vec3, f32),
    /// `draw_sky_cube`
    SkyCube(f32),
    /// `flush_rendering`
    Flush,
}

/// Backend that records commands instead of drawing
#[derive(Debug, Default)]
pub struct RecordingGraphics {
    commands: Vec<GraphicsCommand>,
    two_side_stencil: bool,
    query_latency: u32,
    next_query: u32,
    pending_polls: HashMap<OcclusionQueryId, u32>,
    sample_counts: HashMap<OcclusionQueryId, u32>,
    default_samples: u32,
    query_polls: u64,
}

impl RecordingGraphics {
    /// Backend reporting two-sided stencil support
    pub fn new() -> Self {
        Self {
            two_side_stencil: true,
            default_samples: 64,
            ..Self::default()
        }
    }

    /// Toggle the reported two-sided stencil capability
    #[must_use]
    pub const fn with_two_side_stencil(mut self, supported: bool) -> Self {
        self.two_side_stencil = supported;
        self
    }

    /// Number of `fetch_occlusion_query_results` calls that report "not ready"
    #[must_use]
    pub const fn with_query_latency(mut self, polls: u32) -> Self {
        self.query_latency = polls;
        self
    }

    /// Sample count reported by queries without an explicit override
    #[must_use]
    pub const fn with_default_samples(mut self, samples: u32) -> Self {
        self.default_samples = samples;
        self
    }

    /// Override the sample count of one query
    pub fn set_query_samples(&mut self, query: OcclusionQueryId, samples: u32) {
        self.sample_counts.insert(query, samples);
    }

    /// Recorded commands
    pub fn commands(&self) -> &[GraphicsCommand] {
        &self.commands
    }

    /// Drain the recorded commands
    pub fn take_commands(&mut self) -> Vec<GraphicsCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Total result polls across all queries
    pub const fn query_polls(&self) -> u64 {
        self.query_polls
    }

    /// Number of recorded commands matching a predicate
    pub fn count(&self, predicate: impl Fn(&GraphicsCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    fn push(&mut self, command: GraphicsCommand) {
        self.commands.push(command);
    }
}

impl LowLevelGraphics for RecordingGraphics {
    fn capability(&self, cap: GraphicCaps) -> i32 {
        match cap {
            GraphicCaps::TwoSideStencil => i32::from(self.two_side_stencil),
        }
    }

    fn set_matrix(&mut self, ty: MatrixType, matrix: &Mat4) {
        self.push(GraphicsCommand::SetMatrix(ty, *matrix));
    }

    fn set_identity_matrix(&mut self, ty: MatrixType) {
        self.push(GraphicsCommand::SetIdentityMatrix(ty));
    }

    fn set_texture(&mut self, unit: usize, texture: Option<TextureId>) {
        self.push(GraphicsCommand::SetTexture(unit, texture));
    }

    fn set_depth_test_active(&mut self, active: bool) {
        self.push(GraphicsCommand::DepthTestActive(active));
    }

    fn set_depth_write_active(&mut self, active: bool) {
        self.push(GraphicsCommand::DepthWriteActive(active));
    }

    fn set_depth_test_func(&mut self, func: DepthTestFunc) {
        self.push(GraphicsCommand::DepthTestFunc(func));
    }

    fn set_alpha_test_active(&mut self, active: bool) {
        self.push(GraphicsCommand::AlphaTestActive(active));
    }

    fn set_alpha_test_func(&mut self, func: AlphaTestFunc, reference: f32) {
        self.push(GraphicsCommand::AlphaTestFunc(func, reference));
    }

    fn set_blend_active(&mut self, active: bool) {
        self.push(GraphicsCommand::BlendActive(active));
    }

    fn set_blend_func(&mut self, src: BlendFunc, dest: BlendFunc) {
        self.push(GraphicsCommand::BlendFunc(src, dest));
    }

    fn set_color_write_active(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.push(GraphicsCommand::ColorWrite(r, g, b, a));
    }

    fn set_cull_active(&mut self, active: bool) {
        self.push(GraphicsCommand::CullActive(active));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.push(GraphicsCommand::CullMode(mode));
    }

    fn set_scissor_active(&mut self, active: bool) {
        self.push(GraphicsCommand::ScissorActive(active));
    }

    fn set_scissor_rect(&mut self, rect: &Rect2l) {
        self.push(GraphicsCommand::ScissorRect(*rect));
    }

    fn set_stencil_active(&mut self, active: bool) {
        self.push(GraphicsCommand::StencilActive(active));
    }

    fn set_stencil(&mut self, state: &StencilState) {
        self.push(GraphicsCommand::Stencil(*state));
    }

    fn set_stencil_two_side_active(&mut self, active: bool) {
        self.push(GraphicsCommand::StencilTwoSideActive(active));
    }

    fn set_stencil_two_side(&mut self, face: StencilFace, state: &StencilState) {
        self.push(GraphicsCommand::StencilTwoSide(face, *state));
    }

    fn set_clear_stencil(&mut self, value: i32) {
        self.push(GraphicsCommand::ClearStencilValue(value));
    }

    fn clear_screen(&mut self, color: bool, depth: bool, stencil: bool) {
        self.push(GraphicsCommand::Clear { color, depth, stencil });
    }

    fn bind_gpu_program(&mut self, program: GpuProgramId) {
        self.push(GraphicsCommand::BindProgram(program));
    }

    fn unbind_gpu_program(&mut self, program: GpuProgramId) {
        self.push(GraphicsCommand::UnbindProgram(program));
    }

    fn set_gpu_program_param(&mut self, program: GpuProgramId, name: &str, value: ProgramParam) {
        self.push(GraphicsCommand::ProgramParam(program, name.to_string(), value));
    }

    fn bind_vertex_buffer(&mut self, buffer: Option<VertexBufferId>) {
        self.push(GraphicsCommand::BindVertexBuffer(buffer));
    }

    fn draw_vertex_buffer(&mut self, buffer: VertexBufferId, index_count: usize) {
        self.push(GraphicsCommand::DrawVertexBuffer(buffer, index_count));
    }

    fn draw_user_indexed(&mut self, vertices: &[f32], vertex_stride: usize, indices: &[u32]) {
        let vertex_count = if vertex_stride == 0 { 0 } else { vertices.len() / vertex_stride };
        self.push(GraphicsCommand::DrawUserIndexed {
            vertex_count,
            index_count: indices.len(),
        });
    }

    fn create_occlusion_query(&mut self) -> OcclusionQueryId {
        let id = OcclusionQueryId(self.next_query);
        self.next_query += 1;
        self.push(GraphicsCommand::CreateQuery(id));
        id
    }

    fn destroy_occlusion_query(&mut self, query: OcclusionQueryId) {
        self.pending_polls.remove(&query);
        self.sample_counts.remove(&query);
        self.push(GraphicsCommand::DestroyQuery(query));
    }

    fn begin_occlusion_query(&mut self, query: OcclusionQueryId) {
        self.pending_polls.insert(query, self.query_latency);
        self.push(GraphicsCommand::BeginQuery(query));
    }

    fn end_occlusion_query(&mut self, query: OcclusionQueryId) {
        self.push(GraphicsCommand::EndQuery(query));
    }

    fn fetch_occlusion_query_results(&mut self, query: OcclusionQueryId) -> bool {
        self.query_polls += 1;
        match self.pending_polls.get_mut(&query) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        }
    }

    fn occlusion_query_sample_count(&self, query: OcclusionQueryId) -> u32 {
        self.sample_counts.get(&query).copied().unwrap_or(self.default_samples)
    }

    fn draw_solid_box(&mut self, min: &Vec3, max: &Vec3) {
        self.push(GraphicsCommand::SolidBox(*min, *max));
    }

    fn draw_box_min_max(&mut self, min: &Vec3, max: &Vec3, _color: Color) {
        self.push(GraphicsCommand::DebugBox(*min, *max));
    }

    fn draw_sphere(&mut self, center: &Vec3, radius: f32, _color: Color) {
        self.push(GraphicsCommand::DebugSphere(*center, radius));
    }

    fn draw_sky_cube(&mut self, half_size: f32, _color: Color) {
        self.push(GraphicsCommand::SkyCube(half_size));
    }

    fn flush_rendering(&mut self) {
        self.push(GraphicsCommand::Flush);
    }
}
