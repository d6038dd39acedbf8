//! Corner math for batched quads.
//!
//! Corners are rotated with the quad's sine and cosine directly instead of
//! building a transform matrix per sprite.

use crate::color::Color;
use crate::slots::WHITE_SLOT;
use crate::vertex::QuadVertex;

/// Sub-rectangle of a texture in normalized [0, 1] coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub u: f32,
    pub v: f32,
    pub width: f32,
    pub height: f32,
}

impl UvRect {
    /// The whole texture.
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(u: f32, v: f32, width: f32, height: f32) -> Self {
        Self {
            u,
            v,
            width,
            height,
        }
    }

    /// Cell `index` of a sprite sheet laid out as `columns` x `rows`, row-major.
    pub fn grid_cell(columns: u32, rows: u32, index: u32) -> Self {
        let w = 1.0 / columns as f32;
        let h = 1.0 / rows as f32;
        let col = index % columns;
        let row = (index / columns) % rows;
        Self::new(col as f32 * w, row as f32 * h, w, h)
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Compute the 4 world-space corners of a quad rotated around its center.
///
/// Returns corners in order: bottom-left, bottom-right, top-right, top-left
/// (offsets (-hw,-hh), (hw,-hh), (hw,hh), (-hw,hh) before rotation).
pub fn rotated_corners(center: [f32; 2], size: [f32; 2], rotation_degrees: f32) -> [[f32; 2]; 4] {
    let hw = size[0] * 0.5;
    let hh = size[1] * 0.5;
    let [cx, cy] = center;

    if rotation_degrees == 0.0 {
        return [
            [cx - hw, cy - hh],
            [cx + hw, cy - hh],
            [cx + hw, cy + hh],
            [cx - hw, cy + hh],
        ];
    }

    let (sin, cos) = rotation_degrees.to_radians().sin_cos();
    let corners = [[-hw, -hh], [hw, -hh], [hw, hh], [-hw, hh]];

    corners.map(|[x, y]| [x * cos - y * sin + cx, x * sin + y * cos + cy])
}

/// Texture coordinates per corner, matching [`rotated_corners`] order.
///
/// Corners 0 and 3 take the left edge, 1 and 2 the right edge; corners 0 and
/// 1 take `v`, 2 and 3 take `v + height`.
pub fn uv_corners(uv: UvRect) -> [[f32; 2]; 4] {
    let u0 = uv.u;
    let v0 = uv.v;
    let u1 = uv.u + uv.width;
    let v1 = uv.v + uv.height;
    [[u0, v0], [u1, v0], [u1, v1], [u0, v1]]
}

/// Vertices of a textured quad sampling `slot`.
pub fn textured_quad(
    center: [f32; 2],
    size: [f32; 2],
    rotation_degrees: f32,
    uv: UvRect,
    tint: Color,
    slot: u32,
) -> [QuadVertex; 4] {
    let positions = rotated_corners(center, size, rotation_degrees);
    let tex_coords = uv_corners(uv);
    let color = tint.to_array();
    let texture_slot = slot as f32;

    std::array::from_fn(|i| QuadVertex {
        position: positions[i],
        tex_coord: tex_coords[i],
        color,
        texture_slot,
    })
}

/// Vertices of a flat colored quad. Always samples the white slot.
pub fn colored_quad(
    center: [f32; 2],
    size: [f32; 2],
    rotation_degrees: f32,
    color: Color,
) -> [QuadVertex; 4] {
    let positions = rotated_corners(center, size, rotation_degrees);
    let color = color.to_array();

    positions.map(|position| QuadVertex {
        position,
        tex_coord: [0.0, 0.0],
        color,
        texture_slot: WHITE_SLOT as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: [f32; 2], expected: [f32; 2]) {
        assert!(
            (actual[0] - expected[0]).abs() < 1e-4 && (actual[1] - expected[1]).abs() < 1e-4,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_rotated_corners_no_rotation() {
        let corners = rotated_corners([60.0, 45.0], [100.0, 50.0], 0.0);
        assert_eq!(corners[0], [10.0, 20.0]);
        assert_eq!(corners[1], [110.0, 20.0]);
        assert_eq!(corners[2], [110.0, 70.0]);
        assert_eq!(corners[3], [10.0, 70.0]);
    }

    #[test]
    fn test_rotated_corners_90_degrees() {
        let corners = rotated_corners([100.0, 100.0], [10.0, 10.0], 90.0);
        assert_close(corners[0], [105.0, 95.0]);
        assert_close(corners[1], [105.0, 105.0]);
        assert_close(corners[2], [95.0, 105.0]);
        assert_close(corners[3], [95.0, 95.0]);
    }

    #[test]
    fn test_rotated_corners_preserve_distance() {
        let corners = rotated_corners([50.0, 50.0], [100.0, 100.0], 33.0);
        for [x, y] in corners {
            let dist = ((x - 50.0).powi(2) + (y - 50.0).powi(2)).sqrt();
            assert!((dist - 70.710_678).abs() < 0.01);
        }
    }

    #[test]
    fn test_full_turn_matches_unrotated() {
        let a = rotated_corners([3.0, 4.0], [8.0, 2.0], 360.0);
        let b = rotated_corners([3.0, 4.0], [8.0, 2.0], 0.0);
        for i in 0..4 {
            assert_close(a[i], b[i]);
        }
    }

    #[test]
    fn test_uv_corner_mapping() {
        let uvs = uv_corners(UvRect::new(0.25, 0.5, 0.5, 0.25));
        assert_eq!(uvs, [[0.25, 0.5], [0.75, 0.5], [0.75, 0.75], [0.25, 0.75]]);
    }

    #[test]
    fn test_grid_cell() {
        let uv = UvRect::grid_cell(4, 2, 5);
        assert_eq!(uv, UvRect::new(0.25, 0.5, 0.25, 0.5));
    }

    #[test]
    fn test_textured_quad_fields() {
        let tint = Color::new(0.5, 0.5, 1.0, 1.0);
        let quad = textured_quad([0.0, 0.0], [2.0, 2.0], 0.0, UvRect::FULL, tint, 3);
        assert_eq!(quad[0].position, [-1.0, -1.0]);
        assert_eq!(quad[2].tex_coord, [1.0, 1.0]);
        assert!(quad.iter().all(|v| v.texture_slot == 3.0));
        assert!(quad.iter().all(|v| v.color == tint.to_array()));
    }

    #[test]
    fn test_colored_quad_uses_white_slot() {
        let quad = colored_quad([5.0, 5.0], [2.0, 4.0], 45.0, Color::BLACK);
        assert!(quad.iter().all(|v| v.texture_slot == 0.0));
        assert!(quad.iter().all(|v| v.tex_coord == [0.0, 0.0]));
        assert!(quad.iter().all(|v| v.color == [0.0, 0.0, 0.0, 1.0]));
    }
}
