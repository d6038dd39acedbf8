use anyhow::Result;

use crate::camera::Mat4;

/// Texture handle issued by the graphics backend.
///
/// The batcher only borrows these; the owner frees the GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    /// Never issued by a backend.
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// Linked shader program handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

/// GPU buffer handle (vertex or index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// How often a buffer's contents are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once.
    #[default]
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten for every draw.
    Stream,
}

/// Vertex and fragment source pair in the backend's shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Abstraction over the GPU calls the batcher needs.
/// Implementations: `WgpuBackend` (production), `CommandRecorder` (testing).
///
/// All calls happen on the thread that owns the graphics context.
pub trait GraphicsBackend {
    /// Default batch shader for this backend.
    ///
    /// Vertex input follows `QuadVertex::ATTRIBUTES`, the view-projection
    /// matrix is a uniform, and the fragment stage samples the texture unit
    /// named by the vertex slot and multiplies it by the vertex color.
    fn batch_shader(&self) -> ShaderSource<'static>;

    /// Compile and link a program. The error message is the diagnostic log.
    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle>;

    /// Upload a tightly packed RGBA8 image.
    fn create_texture_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle>;

    fn create_vertex_buffer(
        &mut self,
        size_bytes: usize,
        usage: BufferUsage,
    ) -> Result<BufferHandle>;

    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<BufferHandle>;

    /// Make `program` current and set its view-projection uniform.
    fn bind_program(&mut self, program: ProgramHandle, view_projection: &Mat4) -> Result<()>;

    /// Bind `texture` to texture unit `unit`.
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<()>;

    /// Replace the contents of a vertex buffer from offset 0.
    fn upload_vertices(
        &mut self,
        buffer: BufferHandle,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<()>;

    /// Draw `index_count` indices as triangles with the bound program and textures.
    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Result<()>;

    fn delete_program(&mut self, program: ProgramHandle);
    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn delete_texture(&mut self, texture: TextureHandle);
}
