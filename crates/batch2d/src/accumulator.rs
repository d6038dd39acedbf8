use crate::backend::TextureHandle;
use crate::slots::TextureSlotTable;
use crate::vertex::{QuadVertex, VERTICES_PER_QUAD};

/// Vertices and texture slots of the batch currently being recorded.
#[derive(Debug)]
pub struct BatchAccumulator {
    vertices: Vec<QuadVertex>,
    slots: TextureSlotTable,
    max_quads: usize,
}

impl BatchAccumulator {
    pub fn new(white: TextureHandle, max_quads: usize, max_texture_slots: usize) -> Self {
        Self {
            vertices: Vec::new(),
            slots: TextureSlotTable::new(white, max_texture_slots),
            max_quads,
        }
    }

    /// Clear and pre-reserve storage for a full batch.
    pub fn begin(&mut self) {
        self.reset();
        let wanted = self.max_quads * VERTICES_PER_QUAD;
        self.vertices.reserve(wanted.saturating_sub(self.vertices.len()));
    }

    /// Drop all queued quads and reset the slot table to slot 0.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.slots.reset();
    }

    pub fn push_quad(&mut self, quad: [QuadVertex; VERTICES_PER_QUAD]) {
        self.vertices.extend_from_slice(&quad);
    }

    /// True when 4 more vertices would exceed the geometry capacity.
    pub fn is_full(&self) -> bool {
        self.vertices.len() + VERTICES_PER_QUAD > self.max_quads * VERTICES_PER_QUAD
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    pub fn max_quads(&self) -> usize {
        self.max_quads
    }

    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    /// Reserved vertex capacity.
    pub fn reserved(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn slots(&self) -> &TextureSlotTable {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut TextureSlotTable {
        &mut self.slots
    }
}
