use batch2d::{Color, UvRect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One bouncing, spinning sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub size: [f32; 2],
    /// Degrees.
    pub rotation: f32,
    /// Degrees per second.
    pub spin: f32,
    /// Index into the demo's texture list; `None` draws a flat quad.
    pub texture: Option<usize>,
    pub uv: UvRect,
    pub tint: Color,
}

/// Sprites bouncing inside a rectangle.
pub struct SpriteField {
    sprites: Vec<Sprite>,
    bounds: [f32; 2],
}

impl SpriteField {
    /// Scatter `count` sprites. About one in five is untextured.
    ///
    /// Textured sprites sample one cell of a 2x2 atlas grid.
    pub fn new(count: usize, texture_count: usize, bounds: [f32; 2], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sprites = (0..count)
            .map(|_| {
                let edge = rng.gen_range(8.0..32.0);
                let texture = if texture_count == 0 || rng.gen_ratio(1, 5) {
                    None
                } else {
                    Some(rng.gen_range(0..texture_count))
                };
                Sprite {
                    position: [
                        rng.gen_range(0.0..bounds[0].max(1.0)),
                        rng.gen_range(0.0..bounds[1].max(1.0)),
                    ],
                    velocity: [rng.gen_range(-120.0..120.0), rng.gen_range(-120.0..120.0)],
                    size: [edge, edge],
                    rotation: rng.gen_range(0.0..360.0),
                    spin: rng.gen_range(-180.0..180.0),
                    texture,
                    uv: UvRect::grid_cell(2, 2, rng.gen_range(0..4)),
                    tint: Color::new(
                        rng.gen_range(0.4..1.0),
                        rng.gen_range(0.4..1.0),
                        rng.gen_range(0.4..1.0),
                        1.0,
                    ),
                }
            })
            .collect();
        Self { sprites, bounds }
    }

    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn resize(&mut self, bounds: [f32; 2]) {
        self.bounds = bounds;
    }

    /// Advance by `dt` seconds, reflecting off the bounds.
    pub fn update(&mut self, dt: f32) {
        for sprite in &mut self.sprites {
            for axis in 0..2 {
                sprite.position[axis] += sprite.velocity[axis] * dt;
                if sprite.position[axis] < 0.0 {
                    sprite.position[axis] = -sprite.position[axis];
                    sprite.velocity[axis] = sprite.velocity[axis].abs();
                } else if sprite.position[axis] > self.bounds[axis] {
                    sprite.position[axis] = 2.0 * self.bounds[axis] - sprite.position[axis];
                    sprite.velocity[axis] = -sprite.velocity[axis].abs();
                }
                sprite.position[axis] = sprite.position[axis].clamp(0.0, self.bounds[axis]);
            }
            sprite.rotation = (sprite.rotation + sprite.spin * dt).rem_euclid(360.0);
        }
    }
}

/// RGBA checkerboard in a hue derived from `index`, split into 2x2 cells.
pub fn checker_texture(index: usize, size: u32) -> Vec<u8> {
    let hue = (index as f32 * 0.618_034).fract();
    let [r, g, b] = hue_to_rgb(hue);
    let cell = (size / 4).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let scale = if light { 1.0 } else { 0.55 };
            pixels.extend_from_slice(&[
                (r * scale * 255.0) as u8,
                (g * scale * 255.0) as u8,
                (b * scale * 255.0) as u8,
                255,
            ]);
        }
    }
    pixels
}

fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}
