// Ground plane under the character: flat base color, a fixed reference
// grid, and fog toward the scene background.

use crate::camera::Camera;
use glam::Vec3;
use wgpu::util::DeviceExt;

/// Half-extent of the 2000x2000 ground plane.
const PLANE_EXTENT: f32 = 1_000.0;

/// Must match `GroundUniforms` in the embedded WGSL.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GroundUniforms {
    /// Transform from world space to clip space.
    pub view_proj: [[f32; 4]; 4], // 64 B
    /// Camera position, for the fog distance.
    pub camera_pos: [f32; 3], // +12
    /// Half-extent from center to edge.
    pub plane_extent: f32, // +4 -> 80
}

// Compile-time safety check: buffer size must match the WGSL-reflected size.
const _: [(); 80] = [(); core::mem::size_of::<GroundUniforms>()];

pub struct GroundPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    quad_vb: wgpu::Buffer,
}

impl GroundPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ground Uniform Buffer"),
            size: std::mem::size_of::<GroundUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Ground BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ground Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Unit quad (two triangles), scaled to the plane extent in the shader.
        let corners: [[f32; 2]; 6] = [
            [-1.0, -1.0], [1.0, -1.0], [1.0, 1.0],
            [-1.0, -1.0], [1.0, 1.0],  [-1.0, 1.0],
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Quad VB"),
            contents: bytemuck::cast_slice(&corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Ground WGSL"),
            source: wgpu::ShaderSource::Wgsl(GROUND_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ground Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Ground Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                    }],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: false, // Do not occlude the character
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            uniform_buffer,
            quad_vb,
        }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        queue: &wgpu::Queue,
        camera: &Camera,
    ) {
        let eye: Vec3 = camera.position();

        let uniforms = GroundUniforms {
            view_proj: camera.view_proj().to_cols_array_2d(),
            camera_pos: eye.to_array(),
            plane_extent: PLANE_EXTENT,
        };

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.draw(0..6, 0..1);
    }
}

pub const GROUND_WGSL: &str = r#"
struct GroundUniforms {
    view_proj: mat4x4<f32>,
    camera_pos: vec3<f32>,
    plane_extent: f32,
};
@group(0) @binding(0) var<uniform> U: GroundUniforms;

struct VSOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
}

@vertex
fn vs_main(@location(0) corner: vec2<f32>) -> VSOut {
    var out: VSOut;
    let world = vec3<f32>(corner.x * U.plane_extent, 0.0, corner.y * U.plane_extent);
    out.clip = U.view_proj * vec4<f32>(world, 1.0);
    out.world_pos = world;
    return out;
}

// 2000-unit plane with 20 grid divisions.
const CELL: f32 = 100.0;
const BASE_COLOR: vec3<f32> = vec3<f32>(0.318, 0.318, 0.318); // 0x999999
const LINE_COLOR: vec3<f32> = vec3<f32>(0.0, 0.0, 0.0);
const LINE_OPACITY: f32 = 0.2;
const FOG_COLOR: vec3<f32> = vec3<f32>(0.351, 0.351, 0.351);  // 0xa0a0a0
const FOG_NEAR: f32 = 200.0;
const FOG_FAR: f32 = 1000.0;

// Anti-aliased line mask
fn line_mask(coord: f32, step: f32) -> f32 {
    let t   = coord / step;
    // Cap AA width so grazing angles can't smear into a solid fill.
    let aaw = min(fwidth(t) * 1.5, 0.5);
    let f   = fract(t);
    let d   = min(f, 1.0 - f);
    return 1.0 - smoothstep(0.0, aaw, d);
}

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    let p = in.world_pos.xz;
    let grid = max(line_mask(p.x, CELL), line_mask(p.y, CELL));

    var color = mix(BASE_COLOR, LINE_COLOR, grid * LINE_OPACITY);

    let fog = smoothstep(FOG_NEAR, FOG_FAR, distance(in.world_pos, U.camera_pos));
    color = mix(color, FOG_COLOR, fog);

    return vec4<f32>(color, 1.0);
}
"#;
