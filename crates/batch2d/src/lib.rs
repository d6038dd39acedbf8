//! Dynamic 2D sprite batching.
//!
//! [`SpriteRenderer`] accumulates colored and textured quads into one vertex
//! stream and issues the fewest indexed draw calls the texture-unit limit
//! allows. GPU work goes through the [`GraphicsBackend`] trait.

pub mod accumulator;
pub mod backend;
pub mod camera;
pub mod color;
pub mod config;
pub mod error;
pub mod flush;
pub mod quad;
pub mod recorder;
pub mod renderer;
pub mod slots;
pub mod stats;
pub mod vertex;

pub use backend::{
    BufferHandle, BufferUsage, GraphicsBackend, ProgramHandle, ShaderSource, TextureHandle,
};
pub use camera::{Camera, Mat4, OrthoCamera};
pub use color::Color;
pub use config::BatchConfig;
pub use error::{BatchError, BatchResult};
pub use quad::UvRect;
pub use recorder::CommandRecorder;
pub use renderer::{SessionState, SpriteRenderer};
pub use stats::{FlushCause, FrameStats};
pub use vertex::QuadVertex;
