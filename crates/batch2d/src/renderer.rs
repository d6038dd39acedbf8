use log::{debug, error, info, warn};

use crate::accumulator::BatchAccumulator;
use crate::backend::{GraphicsBackend, TextureHandle};
use crate::camera::{Camera, IDENTITY, Mat4};
use crate::color::Color;
use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult, error_chain};
use crate::flush::{FlushEngine, FlushOutcome};
use crate::quad::{UvRect, colored_quad, textured_quad};
use crate::slots::TextureSlotTable;
use crate::stats::{FlushCause, FrameStats};

/// Lifecycle of one frame's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
        }
    }
}

/// Batched 2D quad renderer.
///
/// Call [`begin_batch`](Self::begin_batch) once per frame, emit quads in
/// painter's order, then [`end_batch`](Self::end_batch). Geometry and
/// texture-slot exhaustion flush implicitly.
pub struct SpriteRenderer<B: GraphicsBackend> {
    backend: B,
    config: BatchConfig,
    engine: FlushEngine,
    acc: BatchAccumulator,
    state: SessionState,
    view_projection: Mat4,
}

impl<B: GraphicsBackend> SpriteRenderer<B> {
    /// Create the batch resources on `backend`.
    ///
    /// A batch shader that fails to compile does not fail initialization;
    /// the renderer starts inert until [`reload_shader`](Self::reload_shader)
    /// succeeds.
    pub fn initialize(mut backend: B, config: BatchConfig) -> BatchResult<Self> {
        let engine = FlushEngine::initialize(&mut backend, &config)?;
        let acc = BatchAccumulator::new(
            engine.white_texture(),
            config.max_quads,
            config.max_texture_slots,
        );
        Ok(Self {
            backend,
            config,
            engine,
            acc,
            state: SessionState::Idle,
            view_projection: IDENTITY,
        })
    }

    /// Start recording a frame seen through `camera`.
    pub fn begin_batch(&mut self, camera: &dyn Camera) {
        if self.state == SessionState::Recording {
            misuse(BatchError::Lifecycle {
                operation: "begin_batch",
                state: self.state.name(),
            });
            self.finish_batch();
        }
        self.view_projection = camera.view_projection();
        self.acc.begin();
        self.state = SessionState::Recording;
    }

    /// Flush whatever is still queued and return to idle.
    pub fn end_batch(&mut self) {
        if self.state == SessionState::Idle {
            misuse(BatchError::Lifecycle {
                operation: "end_batch",
                state: self.state.name(),
            });
            return;
        }
        self.finish_batch();
        self.state = SessionState::Idle;
    }

    /// Queue a flat colored quad. `rotation` is in degrees.
    pub fn draw_quad(&mut self, center: [f32; 2], size: [f32; 2], rotation: f32, color: Color) {
        if !self.expect_recording("draw_quad") || !self.make_room() {
            return;
        }
        self.acc
            .push_quad(colored_quad(center, size, rotation, color));
    }

    /// Queue a textured quad sampling `uv` of `texture`, tinted by `tint`.
    pub fn draw_textured_quad(
        &mut self,
        center: [f32; 2],
        size: [f32; 2],
        rotation: f32,
        texture: TextureHandle,
        uv: UvRect,
        tint: Color,
    ) {
        if !self.expect_recording("draw_textured_quad") || !self.expect_texture(texture) {
            return;
        }
        if !self.make_room() {
            return;
        }
        let Some(slot) = self.resolve_slot(texture) else {
            return;
        };
        self.acc
            .push_quad(textured_quad(center, size, rotation, uv, tint, slot));
    }

    /// Draw everything queued so far. A no-op when nothing is queued.
    pub fn flush(&mut self) {
        self.flush_with(FlushCause::Explicit);
    }

    /// Draw one colored quad right away through `camera`.
    ///
    /// Anything already queued is drawn first. Works in both states and
    /// leaves the state unchanged.
    pub fn draw_quad_immediate(
        &mut self,
        camera: &dyn Camera,
        center: [f32; 2],
        size: [f32; 2],
        rotation: f32,
        color: Color,
    ) {
        if !self.prepare_immediate() {
            return;
        }
        let saved = std::mem::replace(&mut self.view_projection, camera.view_projection());
        self.acc
            .push_quad(colored_quad(center, size, rotation, color));
        self.flush_with(FlushCause::Immediate);
        self.view_projection = saved;
    }

    /// Draw one textured quad right away through `camera`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_textured_quad_immediate(
        &mut self,
        camera: &dyn Camera,
        center: [f32; 2],
        size: [f32; 2],
        rotation: f32,
        texture: TextureHandle,
        uv: UvRect,
        tint: Color,
    ) {
        if !self.expect_texture(texture) || !self.prepare_immediate() {
            return;
        }
        let Some(slot) = self.resolve_slot(texture) else {
            return;
        };
        let saved = std::mem::replace(&mut self.view_projection, camera.view_projection());
        self.acc
            .push_quad(textured_quad(center, size, rotation, uv, tint, slot));
        self.flush_with(FlushCause::Immediate);
        self.view_projection = saved;
    }

    /// Replace the batch shader.
    ///
    /// On success quads kept by skipped flushes are drawn by the next flush.
    /// On failure the renderer is inert until a later reload succeeds.
    pub fn reload_shader(&mut self, vertex: &str, fragment: &str) -> BatchResult<()> {
        match self
            .engine
            .install_program(&mut self.backend, vertex, fragment)
        {
            Ok(()) => {
                info!("batch shader reloaded");
                Ok(())
            }
            Err(e) => {
                error!("{}", error_chain(&e));
                Err(e)
            }
        }
    }

    /// Counters since the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> FrameStats {
        self.engine.stats()
    }

    /// Zero the counters. Called by the owner once per frame.
    pub fn reset_stats(&mut self) {
        self.engine.reset_stats();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// True while no valid batch shader is installed.
    pub fn is_inert(&self) -> bool {
        self.engine.is_inert()
    }

    pub fn queued_quads(&self) -> usize {
        self.acc.quad_count()
    }

    pub fn slots(&self) -> &TextureSlotTable {
        self.acc.slots()
    }

    pub fn white_texture(&self) -> TextureHandle {
        self.engine.white_texture()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Delete the resources this renderer created and return the backend.
    ///
    /// Caller textures are left alone. Queued quads are discarded.
    pub fn shutdown(mut self) -> B {
        if self.state == SessionState::Recording {
            warn!(
                "shutdown while recording; discarding {} queued quads",
                self.acc.quad_count()
            );
        }
        self.acc.reset();
        self.engine.release(&mut self.backend);
        self.backend
    }

    fn flush_with(&mut self, cause: FlushCause) -> FlushOutcome {
        let outcome = self
            .engine
            .flush(&mut self.backend, &self.view_projection, &mut self.acc, cause);
        if let FlushOutcome::Drawn { quads } = outcome {
            debug!("{cause:?} flush drew {quads} quads");
        }
        outcome
    }

    /// Final flush of a batch. Leftovers from a skipped flush are dropped so
    /// every frame ends with an empty accumulator.
    fn finish_batch(&mut self) {
        if self.flush_with(FlushCause::EndOfBatch).cleared() {
            return;
        }
        let leftover = self.acc.quad_count();
        debug!("batch ended without a shader; discarding {leftover} quads");
        self.drop_quads(leftover);
        self.acc.reset();
    }

    /// Flush when the next quad would overflow the vertex buffer.
    fn make_room(&mut self) -> bool {
        if !self.acc.is_full() {
            return true;
        }
        if self.flush_with(FlushCause::GeometryFull).cleared() {
            return true;
        }
        self.drop_quads(1);
        false
    }

    fn resolve_slot(&mut self, texture: TextureHandle) -> Option<u32> {
        if let Ok(slot) = self.acc.slots_mut().try_assign(texture) {
            return Some(slot);
        }
        if !self.flush_with(FlushCause::SlotsFull).cleared() {
            self.drop_quads(1);
            return None;
        }
        match self.acc.slots_mut().try_assign(texture) {
            Ok(slot) => Some(slot),
            Err(_) => {
                let err = BatchError::SlotsExhaustedAfterReset {
                    slots: self.acc.slots().len(),
                };
                error!("{err}");
                if cfg!(debug_assertions) {
                    panic!("{err}");
                }
                self.drop_quads(1);
                None
            }
        }
    }

    fn prepare_immediate(&mut self) -> bool {
        if self.engine.is_inert() {
            self.drop_quads(1);
            return false;
        }
        self.flush_with(FlushCause::Immediate);
        true
    }

    fn expect_recording(&self, operation: &'static str) -> bool {
        if self.state == SessionState::Recording {
            return true;
        }
        misuse(BatchError::Lifecycle {
            operation,
            state: self.state.name(),
        });
        false
    }

    fn expect_texture(&self, texture: TextureHandle) -> bool {
        if !texture.is_null() {
            return true;
        }
        misuse(BatchError::InvalidTexture(texture));
        false
    }

    fn drop_quads(&mut self, count: usize) {
        let stats = self.engine.stats_mut();
        if stats.quads_dropped == 0 && count > 0 {
            warn!("dropping quads that could not be flushed");
        }
        stats.quads_dropped += count as u32;
    }
}

/// Caller bugs panic in debug builds and are skipped in release builds.
#[track_caller]
fn misuse(err: BatchError) {
    if cfg!(debug_assertions) {
        panic!("{err}");
    }
    warn!("{err}; ignored");
}
