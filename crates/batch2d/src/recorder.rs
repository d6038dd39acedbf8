use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Result, anyhow, bail};

use crate::backend::{
    BufferHandle, BufferUsage, GraphicsBackend, ProgramHandle, ShaderSource, TextureHandle,
};
use crate::camera::Mat4;
use crate::slots::MAX_TEXTURE_SLOTS;
use crate::vertex::{INDICES_PER_QUAD, QuadVertex, VERTICES_PER_QUAD};

const RECORDER_VERTEX_SHADER: &str = "recorder: quad vertex stage";
const RECORDER_FRAGMENT_SHADER: &str = "recorder: slot sampling fragment stage";

/// Recorded backend call for testing.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    CompileProgram {
        program: Option<ProgramHandle>,
    },
    CreateTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
    CreateVertexBuffer {
        buffer: BufferHandle,
        size_bytes: usize,
        usage: BufferUsage,
    },
    CreateIndexBuffer {
        buffer: BufferHandle,
        index_count: usize,
    },
    BindProgram {
        program: ProgramHandle,
        view_projection: Mat4,
    },
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    UploadVertices {
        buffer: BufferHandle,
        vertex_count: usize,
        usage: BufferUsage,
    },
    DrawIndexed {
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    },
    DeleteProgram(ProgramHandle),
    DeleteBuffer(BufferHandle),
    DeleteTexture(TextureHandle),
}

/// Snapshot of one draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: ProgramHandle,
    pub view_projection: Mat4,
    /// Units bound since the previous draw, sorted by unit.
    pub units: Vec<(u32, TextureHandle)>,
    /// Vertices the draw actually consumed.
    pub vertices: Vec<QuadVertex>,
    pub index_count: u32,
}

impl RecordedDraw {
    pub fn quad_count(&self) -> usize {
        self.index_count as usize / INDICES_PER_QUAD
    }

    /// Texture the fragment stage samples for quad `quad`.
    pub fn texture_of_quad(&self, quad: usize) -> Option<TextureHandle> {
        let slot = self.vertices.get(quad * VERTICES_PER_QUAD)?.slot();
        self.units
            .iter()
            .find(|(unit, _)| *unit == slot)
            .map(|&(_, texture)| texture)
    }
}

/// Mock texture data for the command recorder.
struct MockTexture {
    width: u32,
    height: u32,
}

/// A mock GraphicsBackend that records calls for snapshot testing.
/// Does not require a GPU.
pub struct CommandRecorder {
    commands: Vec<BackendCommand>,
    draws: Vec<RecordedDraw>,
    textures: HashMap<TextureHandle, MockTexture>,
    programs: HashSet<ProgramHandle>,
    vertex_buffers: HashMap<BufferHandle, Vec<QuadVertex>>,
    index_buffers: HashMap<BufferHandle, usize>,
    bound_program: Option<(ProgramHandle, Mat4)>,
    pending_units: BTreeMap<u32, TextureHandle>,
    compile_failure: Option<String>,
    fail_draws: bool,
    next_id: u64,
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            draws: Vec::new(),
            textures: HashMap::new(),
            programs: HashSet::new(),
            vertex_buffers: HashMap::new(),
            index_buffers: HashMap::new(),
            bound_program: None,
            pending_units: BTreeMap::new(),
            compile_failure: None,
            fail_draws: false,
            next_id: 1,
        }
    }

    /// Get all recorded commands.
    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    /// Get every draw issued so far.
    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Clear recorded commands and draws. Live resources are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Register a mock texture with specified dimensions.
    pub fn register_texture(&mut self, width: u32, height: u32) -> TextureHandle {
        let texture = TextureHandle(self.alloc_id());
        self.textures.insert(texture, MockTexture { width, height });
        texture
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .map(|t| (t.width, t.height))
    }

    /// Make every compile fail with `diagnostic` until cleared.
    pub fn fail_compiles(&mut self, diagnostic: &str) {
        self.compile_failure = Some(diagnostic.to_string());
    }

    pub fn clear_compile_failure(&mut self) {
        self.compile_failure = None;
    }

    /// Make `draw_indexed` return an error.
    pub fn fail_draws(&mut self, fail: bool) {
        self.fail_draws = fail;
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.vertex_buffers.len() + self.index_buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsBackend for CommandRecorder {
    fn batch_shader(&self) -> ShaderSource<'static> {
        ShaderSource {
            vertex: RECORDER_VERTEX_SHADER,
            fragment: RECORDER_FRAGMENT_SHADER,
        }
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle> {
        if let Some(diagnostic) = &self.compile_failure {
            self.commands
                .push(BackendCommand::CompileProgram { program: None });
            bail!("{diagnostic}");
        }
        if vertex.is_empty() || fragment.is_empty() {
            self.commands
                .push(BackendCommand::CompileProgram { program: None });
            bail!("empty shader source");
        }
        let program = ProgramHandle(self.alloc_id());
        self.programs.insert(program);
        self.commands.push(BackendCommand::CompileProgram {
            program: Some(program),
        });
        Ok(program)
    }

    fn create_texture_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle> {
        let expected = (width * height * 4) as usize;
        if pixels.len() != expected {
            bail!("expected {expected} bytes of RGBA, got {}", pixels.len());
        }
        let texture = self.register_texture(width, height);
        self.commands.push(BackendCommand::CreateTexture {
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn create_vertex_buffer(
        &mut self,
        size_bytes: usize,
        usage: BufferUsage,
    ) -> Result<BufferHandle> {
        let buffer = BufferHandle(self.alloc_id());
        self.vertex_buffers.insert(buffer, Vec::new());
        self.commands.push(BackendCommand::CreateVertexBuffer {
            buffer,
            size_bytes,
            usage,
        });
        Ok(buffer)
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<BufferHandle> {
        let buffer = BufferHandle(self.alloc_id());
        self.index_buffers.insert(buffer, indices.len());
        self.commands.push(BackendCommand::CreateIndexBuffer {
            buffer,
            index_count: indices.len(),
        });
        Ok(buffer)
    }

    fn bind_program(&mut self, program: ProgramHandle, view_projection: &Mat4) -> Result<()> {
        if !self.programs.contains(&program) {
            return Err(anyhow!("unknown program: {:?}", program));
        }
        self.bound_program = Some((program, *view_projection));
        self.commands.push(BackendCommand::BindProgram {
            program,
            view_projection: *view_projection,
        });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<()> {
        if unit as usize >= MAX_TEXTURE_SLOTS {
            return Err(anyhow!("texture unit {unit} out of range"));
        }
        if !self.textures.contains_key(&texture) {
            return Err(anyhow!("unknown texture: {:?}", texture));
        }
        self.pending_units.insert(unit, texture);
        self.commands
            .push(BackendCommand::BindTexture { unit, texture });
        Ok(())
    }

    fn upload_vertices(
        &mut self,
        buffer: BufferHandle,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<()> {
        if data.len() % QuadVertex::STRIDE as usize != 0 {
            bail!("vertex upload of {} bytes is not whole vertices", data.len());
        }
        let contents = self
            .vertex_buffers
            .get_mut(&buffer)
            .ok_or_else(|| anyhow!("unknown vertex buffer: {:?}", buffer))?;
        *contents = data
            .chunks_exact(QuadVertex::STRIDE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        self.commands.push(BackendCommand::UploadVertices {
            buffer,
            vertex_count: contents.len(),
            usage,
        });
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Result<()> {
        if self.fail_draws {
            bail!("device lost");
        }
        let (program, view_projection) = self
            .bound_program
            .ok_or_else(|| anyhow!("draw without a bound program"))?;
        let capacity = *self
            .index_buffers
            .get(&index_buffer)
            .ok_or_else(|| anyhow!("unknown index buffer: {:?}", index_buffer))?;
        if index_count as usize > capacity {
            bail!("draw of {index_count} indices exceeds index buffer of {capacity}");
        }
        let uploaded = self
            .vertex_buffers
            .get(&vertex_buffer)
            .ok_or_else(|| anyhow!("unknown vertex buffer: {:?}", vertex_buffer))?;
        let vertex_count = index_count as usize / INDICES_PER_QUAD * VERTICES_PER_QUAD;
        if vertex_count > uploaded.len() {
            bail!("draw reads {vertex_count} vertices, only {} uploaded", uploaded.len());
        }

        self.draws.push(RecordedDraw {
            program,
            view_projection,
            units: std::mem::take(&mut self.pending_units).into_iter().collect(),
            vertices: uploaded[..vertex_count].to_vec(),
            index_count,
        });
        self.commands.push(BackendCommand::DrawIndexed {
            vertex_buffer,
            index_buffer,
            index_count,
        });
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.commands.push(BackendCommand::DeleteProgram(program));
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.vertex_buffers.remove(&buffer);
        self.index_buffers.remove(&buffer);
        self.commands.push(BackendCommand::DeleteBuffer(buffer));
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.commands.push(BackendCommand::DeleteTexture(texture));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::IDENTITY;
    use crate::vertex::build_quad_indices;

    fn vertex(slot: f32) -> QuadVertex {
        QuadVertex {
            position: [0.0, 0.0],
            tex_coord: [0.0, 0.0],
            color: [1.0; 4],
            texture_slot: slot,
        }
    }

    #[test]
    fn test_compile_program() {
        let mut recorder = CommandRecorder::new();
        let shader = recorder.batch_shader();
        let program = recorder
            .compile_program(shader.vertex, shader.fragment)
            .unwrap();
        assert_eq!(recorder.live_programs(), 1);
        assert_eq!(
            recorder.commands(),
            &[BackendCommand::CompileProgram {
                program: Some(program)
            }]
        );
    }

    #[test]
    fn test_compile_failure_reports_diagnostic() {
        let mut recorder = CommandRecorder::new();
        recorder.fail_compiles("0:12: undeclared identifier");
        let err = recorder.compile_program("v", "f").unwrap_err();
        assert_eq!(err.to_string(), "0:12: undeclared identifier");
        assert_eq!(recorder.live_programs(), 0);
    }

    #[test]
    fn test_create_texture_checks_size() {
        let mut recorder = CommandRecorder::new();
        assert!(recorder.create_texture_rgba(2, 2, &[0; 8]).is_err());
        let tex = recorder.create_texture_rgba(2, 2, &[0; 16]).unwrap();
        assert_eq!(recorder.texture_size(tex), Some((2, 2)));
    }

    #[test]
    fn test_bind_unknown_texture() {
        let mut recorder = CommandRecorder::new();
        assert!(recorder.bind_texture(0, TextureHandle(999)).is_err());
    }

    #[test]
    fn test_bind_unit_out_of_range() {
        let mut recorder = CommandRecorder::new();
        let tex = recorder.register_texture(1, 1);
        assert!(recorder.bind_texture(32, tex).is_err());
        assert!(recorder.bind_texture(31, tex).is_ok());
    }

    #[test]
    fn test_draw_snapshot() {
        let mut recorder = CommandRecorder::new();
        let white = recorder.register_texture(1, 1);
        let sprite = recorder.register_texture(64, 64);
        let program = recorder.compile_program("v", "f").unwrap();
        let vb = recorder
            .create_vertex_buffer(1024, BufferUsage::Stream)
            .unwrap();
        let ib = recorder.create_index_buffer(&build_quad_indices(4)).unwrap();

        let vertices = [vertex(1.0); 4];
        recorder.bind_program(program, &IDENTITY).unwrap();
        recorder.bind_texture(0, white).unwrap();
        recorder.bind_texture(1, sprite).unwrap();
        recorder
            .upload_vertices(vb, bytemuck::cast_slice(&vertices), BufferUsage::Stream)
            .unwrap();
        recorder.draw_indexed(vb, ib, 6).unwrap();

        let draw = &recorder.draws()[0];
        assert_eq!(draw.quad_count(), 1);
        assert_eq!(draw.units, vec![(0, white), (1, sprite)]);
        assert_eq!(draw.texture_of_quad(0), Some(sprite));
        assert_eq!(draw.vertices.len(), 4);
    }

    #[test]
    fn test_draw_past_index_buffer() {
        let mut recorder = CommandRecorder::new();
        let program = recorder.compile_program("v", "f").unwrap();
        let vb = recorder
            .create_vertex_buffer(1024, BufferUsage::Stream)
            .unwrap();
        let ib = recorder.create_index_buffer(&build_quad_indices(1)).unwrap();
        let vertices = [vertex(0.0); 8];
        recorder.bind_program(program, &IDENTITY).unwrap();
        recorder
            .upload_vertices(vb, bytemuck::cast_slice(&vertices), BufferUsage::Stream)
            .unwrap();
        assert!(recorder.draw_indexed(vb, ib, 12).is_err());
    }

    #[test]
    fn test_draw_without_program() {
        let mut recorder = CommandRecorder::new();
        let vb = recorder
            .create_vertex_buffer(1024, BufferUsage::Stream)
            .unwrap();
        let ib = recorder.create_index_buffer(&build_quad_indices(1)).unwrap();
        assert!(recorder.draw_indexed(vb, ib, 0).is_err());
    }

    #[test]
    fn test_upload_rejects_partial_vertex() {
        let mut recorder = CommandRecorder::new();
        let vb = recorder
            .create_vertex_buffer(1024, BufferUsage::Stream)
            .unwrap();
        assert!(recorder.upload_vertices(vb, &[0; 10], BufferUsage::Stream).is_err());
    }

    #[test]
    fn test_upload_decodes_unaligned_bytes() {
        let mut recorder = CommandRecorder::new();
        let vb = recorder
            .create_vertex_buffer(1024, BufferUsage::Stream)
            .unwrap();
        let vertices = [vertex(3.0), vertex(5.0)];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::cast_slice(&vertices));
        recorder
            .upload_vertices(vb, &bytes[1..], BufferUsage::Stream)
            .unwrap();
        assert_eq!(
            recorder.commands().last(),
            Some(&BackendCommand::UploadVertices {
                buffer: vb,
                vertex_count: 2,
                usage: BufferUsage::Stream,
            })
        );
        assert_eq!(recorder.vertex_buffers[&vb], vertices.to_vec());
    }

    #[test]
    fn test_delete_releases() {
        let mut recorder = CommandRecorder::new();
        let tex = recorder.register_texture(1, 1);
        let vb = recorder
            .create_vertex_buffer(16, BufferUsage::Dynamic)
            .unwrap();
        recorder.delete_texture(tex);
        recorder.delete_buffer(vb);
        assert_eq!(recorder.live_textures(), 0);
        assert_eq!(recorder.live_buffers(), 0);
    }
}
