/// Column-major 4x4 matrix, laid out the way the GPU uniform expects it.
pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Supplies the view-projection matrix used for every flush of a batch.
pub trait Camera {
    fn view_projection(&self) -> Mat4;
}

impl Camera for Mat4 {
    fn view_projection(&self) -> Mat4 {
        *self
    }
}

/// Create orthographic projection matrix for 2D rendering.
/// Top-left origin, Y-down coordinate system.
pub fn ortho_projection(width: f32, height: f32) -> Mat4 {
    [
        [2.0 / width, 0.0, 0.0, 0.0],
        [0.0, -2.0 / height, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0, 1.0],
    ]
}

/// Screen-space camera with pan and zoom.
///
/// `position` is the world point shown at the top-left corner of the viewport.
/// A zoom above 1.0 magnifies the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoCamera {
    pub viewport: [f32; 2],
    pub position: [f32; 2],
    pub zoom: f32,
}

impl OrthoCamera {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            viewport: [width, height],
            position: [0.0, 0.0],
            zoom: 1.0,
        }
    }

    /// Update the viewport after a surface resize.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport = [width, height];
    }

    /// Map a world point to normalized device coordinates.
    pub fn world_to_ndc(&self, point: [f32; 2]) -> [f32; 2] {
        let m = self.view_projection();
        [
            point[0] * m[0][0] + point[1] * m[1][0] + m[3][0],
            point[0] * m[0][1] + point[1] * m[1][1] + m[3][1],
        ]
    }
}

impl Camera for OrthoCamera {
    fn view_projection(&self) -> Mat4 {
        let mut m = ortho_projection(self.viewport[0], self.viewport[1]);
        // Scale then translate: ndc = P * (zoom * (p - position)).
        m[0][0] *= self.zoom;
        m[1][1] *= self.zoom;
        m[3][0] -= self.position[0] * m[0][0];
        m[3][1] -= self.position[1] * m[1][1];
        m
    }
}
