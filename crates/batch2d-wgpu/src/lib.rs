//! wgpu implementation of the batch2d graphics backend.

pub mod backend;
pub mod device;
pub mod shader;

pub use backend::WgpuBackend;
pub use device::request_batch_device;
