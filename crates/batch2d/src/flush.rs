use log::{debug, error, trace};

use crate::accumulator::BatchAccumulator;
use crate::backend::{BufferHandle, BufferUsage, GraphicsBackend, ProgramHandle, TextureHandle};
use crate::camera::Mat4;
use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult, error_chain};
use crate::slots::WHITE_SLOT;
use crate::stats::{FlushCause, FrameStats};
use crate::vertex::{INDICES_PER_QUAD, QuadVertex, VERTICES_PER_QUAD, build_quad_indices};

/// What a call to [`FlushEngine::flush`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Empty,
    /// One draw call was issued and the accumulator was reset.
    Drawn { quads: usize },
    /// No valid shader; the accumulator was left untouched.
    Skipped,
    /// A backend call failed; the queued quads were discarded.
    Failed,
}

impl FlushOutcome {
    /// True when the accumulator is empty afterwards.
    pub fn cleared(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// GPU resources owned by the batcher plus the per-frame counters.
///
/// Created once by [`FlushEngine::initialize`]; the index buffer is never
/// rebuilt afterwards.
#[derive(Debug)]
pub struct FlushEngine {
    program: Option<ProgramHandle>,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    white_texture: TextureHandle,
    max_quads: usize,
    stats: FrameStats,
}

impl FlushEngine {
    /// Create the white fallback texture, the buffers and the batch shader.
    ///
    /// A shader that fails to compile is logged and leaves the engine inert;
    /// buffer or texture failures are returned.
    pub fn initialize<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        config: &BatchConfig,
    ) -> BatchResult<Self> {
        config.validate()?;

        let size = config.white_texture_size;
        let pixels = vec![0xFF_u8; size as usize * size as usize * 4];
        let white_texture = backend
            .create_texture_rgba(size, size, &pixels)
            .map_err(|source| BatchError::ResourceCreation {
                resource: "white texture",
                source,
            })?;

        let vertex_bytes = config.max_quads * VERTICES_PER_QUAD * QuadVertex::STRIDE as usize;
        let vertex_buffer = match backend.create_vertex_buffer(vertex_bytes, BufferUsage::Stream)
        {
            Ok(buffer) => buffer,
            Err(source) => {
                backend.delete_texture(white_texture);
                return Err(BatchError::ResourceCreation {
                    resource: "vertex buffer",
                    source,
                });
            }
        };

        let indices = build_quad_indices(config.max_quads);
        let index_buffer = match backend.create_index_buffer(&indices) {
            Ok(buffer) => buffer,
            Err(source) => {
                backend.delete_buffer(vertex_buffer);
                backend.delete_texture(white_texture);
                return Err(BatchError::ResourceCreation {
                    resource: "index buffer",
                    source,
                });
            }
        };

        let mut engine = Self {
            program: None,
            vertex_buffer,
            index_buffer,
            white_texture,
            max_quads: config.max_quads,
            stats: FrameStats::default(),
        };

        let shader = backend.batch_shader();
        if let Err(e) = engine.install_program(backend, shader.vertex, shader.fragment) {
            error!(
                "{}; sprite batches will not be drawn until the shader is reloaded",
                error_chain(&e)
            );
        }

        debug!(
            "sprite batch ready: {} quads, {} texture slots",
            config.max_quads, config.max_texture_slots
        );
        Ok(engine)
    }

    /// Compile a batch program and make it current.
    ///
    /// On failure the previous program, if any, is deleted and the engine
    /// becomes inert.
    pub fn install_program<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        vertex: &str,
        fragment: &str,
    ) -> BatchResult<()> {
        let compiled = backend.compile_program(vertex, fragment);
        if let Some(old) = self.program.take() {
            backend.delete_program(old);
        }
        let program = compiled.map_err(|e| BatchError::ShaderCompile {
            diagnostic: format!("{e:#}"),
        })?;
        self.program = Some(program);
        Ok(())
    }

    /// Draw everything queued in `acc` with one indexed draw call.
    pub fn flush<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        view_projection: &Mat4,
        acc: &mut BatchAccumulator,
        cause: FlushCause,
    ) -> FlushOutcome {
        if acc.is_empty() {
            return FlushOutcome::Empty;
        }
        let Some(program) = self.program else {
            trace!("flush skipped: no batch shader ({} quads kept)", acc.quad_count());
            return FlushOutcome::Skipped;
        };

        let quads = acc.quad_count();
        debug_assert!(quads <= self.max_quads, "batch exceeds index buffer");

        if let Err(e) = self.submit(backend, program, view_projection, acc) {
            error!("{}; dropping {quads} quads", error_chain(&e));
            acc.reset();
            return FlushOutcome::Failed;
        }

        self.stats.draw_calls += 1;
        self.stats.quads_drawn += quads as u32;
        self.stats.flushes_by_cause.record(cause);
        trace!("flushed {quads} quads ({cause:?})");

        acc.reset();
        FlushOutcome::Drawn { quads }
    }

    fn submit<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        program: ProgramHandle,
        view_projection: &Mat4,
        acc: &BatchAccumulator,
    ) -> BatchResult<()> {
        backend
            .bind_program(program, view_projection)
            .map_err(backend_error("bind program"))?;
        backend
            .bind_texture(WHITE_SLOT, self.white_texture)
            .map_err(backend_error("bind white texture"))?;
        for (unit, texture) in acc.slots().iter().skip(1) {
            backend
                .bind_texture(unit, texture)
                .map_err(backend_error("bind texture"))?;
        }

        let bytes: &[u8] = bytemuck::cast_slice(acc.vertices());
        backend
            .upload_vertices(self.vertex_buffer, bytes, BufferUsage::Stream)
            .map_err(backend_error("upload vertices"))?;

        let index_count = (acc.quad_count() * INDICES_PER_QUAD) as u32;
        backend
            .draw_indexed(self.vertex_buffer, self.index_buffer, index_count)
            .map_err(backend_error("draw"))?;
        Ok(())
    }

    /// Release every resource this engine created.
    pub fn release<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        if let Some(program) = self.program {
            backend.delete_program(program);
        }
        backend.delete_buffer(self.vertex_buffer);
        backend.delete_buffer(self.index_buffer);
        backend.delete_texture(self.white_texture);
    }

    pub fn is_inert(&self) -> bool {
        self.program.is_none()
    }

    pub fn white_texture(&self) -> TextureHandle {
        self.white_texture
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = FrameStats::default();
    }
}

fn backend_error(stage: &'static str) -> impl FnOnce(anyhow::Error) -> BatchError {
    move |source| BatchError::Backend { stage, source }
}
