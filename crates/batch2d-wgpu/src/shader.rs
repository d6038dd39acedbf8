use std::num::NonZeroU32;

use batch2d::slots::MAX_TEXTURE_SLOTS;
use batch2d::vertex::QuadVertex;

/// Vertex stage: applies the camera matrix and passes the slot through flat.
pub const BATCH_VERTEX_SHADER: &str = r#"
struct Camera {
    view_projection: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coord: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) texture_slot: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) @interpolate(flat) texture_slot: u32,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_projection * vec4<f32>(in.position, 0.0, 1.0);
    out.tex_coord = in.tex_coord;
    out.color = in.color;
    out.texture_slot = u32(in.texture_slot + 0.5);
    return out;
}
"#;

/// Fragment stage: slot 0 is the white texture, so colored quads need no branch.
pub const BATCH_FRAGMENT_SHADER: &str = r#"
@group(1) @binding(0)
var textures: binding_array<texture_2d<f32>, 32>;

@group(1) @binding(1)
var sprite_sampler: sampler;

struct FragmentInput {
    @location(0) tex_coord: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) @interpolate(flat) texture_slot: u32,
};

@fragment
fn fs_main(in: FragmentInput) -> @location(0) vec4<f32> {
    let texel = textureSample(textures[in.texture_slot], sprite_sampler, in.tex_coord);
    return texel * in.color;
}
"#;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Features a device needs to index the texture array per fragment.
pub fn required_features() -> wgpu::Features {
    wgpu::Features::TEXTURE_BINDING_ARRAY
        | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// wgpu attributes for [`QuadVertex`].
pub fn vertex_attributes() -> [wgpu::VertexAttribute; 4] {
    QuadVertex::ATTRIBUTES.map(|attr| wgpu::VertexAttribute {
        offset: attr.offset as wgpu::BufferAddress,
        shader_location: attr.location,
        format: vertex_format(attr.components),
    })
}

pub fn create_uniform_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("batch_uniform_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Texture array plus sampler, one array entry per texture slot.
pub fn create_texture_array_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("batch_texture_array_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: NonZeroU32::new(MAX_TEXTURE_SLOTS as u32),
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Build the batch pipeline from compiled vertex and fragment modules.
pub fn create_batch_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let attributes = vertex_attributes();
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("batch_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: QuadVertex::STRIDE as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_attributes_match_layout() {
        let attrs = vertex_attributes();
        assert_eq!(attrs[0].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attrs[1].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attrs[2].format, wgpu::VertexFormat::Float32x4);
        assert_eq!(attrs[3].format, wgpu::VertexFormat::Float32);
        assert_eq!(attrs[3].offset, 32);
        let end = attrs[3].offset + attrs[3].format.size();
        assert_eq!(end, QuadVertex::STRIDE as u64);
    }

    #[test]
    fn test_shader_locations_are_unique() {
        let attrs = vertex_attributes();
        for (i, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.shader_location, i as u32);
        }
    }

    #[test]
    fn test_fragment_array_matches_slot_count() {
        let decl = format!("binding_array<texture_2d<f32>, {MAX_TEXTURE_SLOTS}>");
        assert!(BATCH_FRAGMENT_SHADER.contains(&decl));
    }

    #[test]
    fn test_entry_points_present() {
        assert!(BATCH_VERTEX_SHADER.contains(&format!("fn {VERTEX_ENTRY}(")));
        assert!(BATCH_FRAGMENT_SHADER.contains(&format!("fn {FRAGMENT_ENTRY}(")));
    }

    #[test]
    fn test_required_features() {
        let features = required_features();
        assert!(features.contains(wgpu::Features::TEXTURE_BINDING_ARRAY));
    }
}
