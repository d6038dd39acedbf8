/// One corner of a quad, already in world space.
///
/// Every 4 consecutive vertices form one quad in the order bottom-left,
/// bottom-right, top-right, top-left.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
    /// Texture unit to sample. Stored as float for a plain vertex attribute.
    pub texture_slot: f32,
}

/// Location and shape of one vertex attribute inside [`QuadVertex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: u32,
    pub components: u32,
}

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

/// Index pattern of a single quad relative to its first vertex.
pub const QUAD_INDEX_PATTERN: [u32; INDICES_PER_QUAD] = [0, 1, 2, 2, 3, 0];

impl QuadVertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: u32 = std::mem::size_of::<QuadVertex>() as u32;

    /// Vertex input layout: position, tex_coord, color, texture_slot.
    pub const ATTRIBUTES: [VertexAttribute; 4] = [
        VertexAttribute {
            location: 0,
            offset: 0,
            components: 2,
        },
        VertexAttribute {
            location: 1,
            offset: 8,
            components: 2,
        },
        VertexAttribute {
            location: 2,
            offset: 16,
            components: 4,
        },
        VertexAttribute {
            location: 3,
            offset: 32,
            components: 1,
        },
    ];

    /// Slot index as an integer unit number.
    pub fn slot(&self) -> u32 {
        self.texture_slot as u32
    }
}

/// Build the shared index buffer contents for `max_quads` quads.
///
/// Quad `n` uses `QUAD_INDEX_PATTERN` offset by `4 * n`.
pub fn build_quad_indices(max_quads: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(max_quads * INDICES_PER_QUAD);
    for quad in 0..max_quads {
        let base = (quad * VERTICES_PER_QUAD) as u32;
        indices.extend(QUAD_INDEX_PATTERN.iter().map(|i| base + i));
    }
    indices
}
