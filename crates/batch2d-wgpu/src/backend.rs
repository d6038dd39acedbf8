use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use batch2d::camera::{IDENTITY, Mat4};
use batch2d::slots::MAX_TEXTURE_SLOTS;
use batch2d::{
    BufferHandle, BufferUsage, GraphicsBackend, ProgramHandle, ShaderSource, TextureHandle,
};
use log::{debug, trace};
use wgpu::util::DeviceExt;

use crate::shader;

/// A GPU texture owned by the backend.
struct TextureEntry {
    // Keeps the texture alive for as long as its view is bound.
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// [`GraphicsBackend`] on wgpu.
///
/// Every `draw_indexed` records one render pass onto the current target and
/// submits it. The caller owns the surface and sets the target view each
/// frame with [`set_target`](Self::set_target).
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,

    pipeline_layout: wgpu::PipelineLayout,
    texture_array_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,

    programs: HashMap<ProgramHandle, wgpu::RenderPipeline>,
    textures: HashMap<TextureHandle, TextureEntry>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    units: [Option<TextureHandle>; MAX_TEXTURE_SLOTS],
    bound_program: Option<ProgramHandle>,

    target: Option<wgpu::TextureView>,
    next_id: u64,
}

impl WgpuBackend {
    /// Wrap a device created with [`shader::required_features`].
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target_format: wgpu::TextureFormat) -> Self {
        let uniform_layout = shader::create_uniform_bind_group_layout(&device);
        let texture_array_layout = shader::create_texture_array_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("batch_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_array_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("batch_uniform_buffer"),
            contents: bytemuck::cast_slice(&IDENTITY),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("batch_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("batch_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            queue,
            target_format,
            pipeline_layout,
            texture_array_layout,
            uniform_buffer,
            uniform_bind_group,
            sampler,
            programs: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            units: [None; MAX_TEXTURE_SLOTS],
            bound_program: None,
            target: None,
            next_id: 1,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Set the view draws render into. `None` makes draws fail until a new
    /// target is set.
    pub fn set_target(&mut self, view: Option<wgpu::TextureView>) {
        self.target = view;
    }

    /// Clear the current target.
    pub fn clear(&mut self, color: wgpu::Color) -> Result<()> {
        let view = self
            .target
            .as_ref()
            .ok_or_else(|| anyhow!("no render target available"))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("batch_clear_encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("batch_clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .map(|e| (e.width, e.height))
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `f` inside a validation error scope.
    fn validated<T>(&self, what: &str, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            bail!("{what}: {err}");
        }
        Ok(value)
    }
}

/// Resolve the texture for every unit; empty units show unit 0.
fn resolve_units(
    units: &[Option<TextureHandle>; MAX_TEXTURE_SLOTS],
) -> Result<[TextureHandle; MAX_TEXTURE_SLOTS]> {
    let fallback = units[0].ok_or_else(|| anyhow!("texture unit 0 is not bound"))?;
    Ok((*units).map(|unit| unit.unwrap_or(fallback)))
}

impl GraphicsBackend for WgpuBackend {
    fn batch_shader(&self) -> ShaderSource<'static> {
        ShaderSource {
            vertex: shader::BATCH_VERTEX_SHADER,
            fragment: shader::BATCH_FRAGMENT_SHADER,
        }
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle> {
        let vertex_module = self.validated("vertex shader", |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("batch_vertex_shader"),
                source: wgpu::ShaderSource::Wgsl(vertex.into()),
            })
        })?;
        let fragment_module = self.validated("fragment shader", |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("batch_fragment_shader"),
                source: wgpu::ShaderSource::Wgsl(fragment.into()),
            })
        })?;
        let pipeline = self.validated("batch pipeline", |device| {
            shader::create_batch_pipeline(
                device,
                &self.pipeline_layout,
                &vertex_module,
                &fragment_module,
                self.target_format,
            )
        })?;

        let program = ProgramHandle(self.alloc_id());
        self.programs.insert(program, pipeline);
        debug!("compiled batch program {:?}", program);
        Ok(program)
    }

    fn create_texture_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle> {
        if width == 0 || height == 0 {
            bail!("texture size must be non-zero, got {width}x{height}");
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            bail!("expected {expected} bytes of RGBA, got {}", pixels.len());
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("batch_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = TextureHandle(self.alloc_id());
        self.textures.insert(
            handle,
            TextureEntry {
                _texture: texture,
                view,
                width,
                height,
            },
        );
        Ok(handle)
    }

    fn create_vertex_buffer(
        &mut self,
        size_bytes: usize,
        usage: BufferUsage,
    ) -> Result<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("batch_vertex_buffer"),
            size: size_bytes as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = BufferHandle(self.alloc_id());
        self.buffers.insert(handle, buffer);
        trace!("vertex buffer {:?}: {size_bytes} bytes ({usage:?})", handle);
        Ok(handle)
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<BufferHandle> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("batch_index_buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let handle = BufferHandle(self.alloc_id());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn bind_program(&mut self, program: ProgramHandle, view_projection: &Mat4) -> Result<()> {
        if !self.programs.contains_key(&program) {
            bail!("unknown program: {:?}", program);
        }
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(view_projection),
        );
        self.bound_program = Some(program);
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<()> {
        let slot = self
            .units
            .get_mut(unit as usize)
            .ok_or_else(|| anyhow!("texture unit {unit} out of range"))?;
        if !self.textures.contains_key(&texture) {
            bail!("unknown texture: {:?}", texture);
        }
        *slot = Some(texture);
        Ok(())
    }

    fn upload_vertices(
        &mut self,
        buffer: BufferHandle,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<()> {
        let current = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| anyhow!("unknown vertex buffer: {:?}", buffer))?;
        if data.len() as wgpu::BufferAddress > current.size() {
            debug!("growing vertex buffer {:?} to {} bytes", buffer, data.len());
            let grown = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("batch_vertex_buffer"),
                size: data.len() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.buffers.insert(buffer, grown);
        }
        let target = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| anyhow!("unknown vertex buffer: {:?}", buffer))?;
        self.queue.write_buffer(target, 0, data);
        trace!("uploaded {} bytes ({usage:?})", data.len());
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_count: u32,
    ) -> Result<()> {
        let view = self
            .target
            .as_ref()
            .ok_or_else(|| anyhow!("no render target available"))?;
        let program = self
            .bound_program
            .ok_or_else(|| anyhow!("draw without a bound program"))?;
        let pipeline = self
            .programs
            .get(&program)
            .ok_or_else(|| anyhow!("unknown program: {:?}", program))?;
        let vertices = self
            .buffers
            .get(&vertex_buffer)
            .ok_or_else(|| anyhow!("unknown vertex buffer: {:?}", vertex_buffer))?;
        let indices = self
            .buffers
            .get(&index_buffer)
            .ok_or_else(|| anyhow!("unknown index buffer: {:?}", index_buffer))?;

        let units = resolve_units(&self.units)?;
        let views = units
            .iter()
            .map(|texture| {
                self.textures
                    .get(texture)
                    .map(|e| &e.view)
                    .ok_or_else(|| anyhow!("texture {:?} was deleted while bound", texture))
            })
            .collect::<Result<Vec<_>>>()?;
        let texture_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("batch_texture_array_bind_group"),
            layout: &self.texture_array_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("batch_encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("batch_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &texture_bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertices.slice(..));
            render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        // Units are rebound before every draw.
        self.units = [None; MAX_TEXTURE_SLOTS];
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }
}
