use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::character::{CharacterData, Vertex};

/// Must match the layout of `PrimitiveUniform` in `character.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PrimitiveUniform {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub skinned: u32,
    pub _pad: [u32; 3],
}

/// GPU residency for one mesh primitive.
pub struct PrimitiveGpu {
    pub node: usize,
    pub skinned: bool,
    index_count: u32,
    vtx: wgpu::Buffer,
    idx: wgpu::Buffer,
    ubo: wgpu::Buffer,
    bind: wgpu::BindGroup,
}

/// GPU residency for one character: per-primitive buffers plus the shared
/// joint-matrix storage buffer.
pub struct CharacterGpu {
    pub primitives: Vec<PrimitiveGpu>,
    joints: wgpu::Buffer,
}

pub struct CharacterPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl CharacterPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Character BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<PrimitiveUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/character.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/character.wgsl").into()),
        });

        let vbuf_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    shader_location: 1,
                    offset: 12,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Joint indices
                wgpu::VertexAttribute {
                    shader_location: 2,
                    offset: 24,
                    format: wgpu::VertexFormat::Uint16x4,
                },
                // Joint weights
                wgpu::VertexAttribute {
                    shader_location: 3,
                    offset: 32,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        };

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Character PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Character Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vbuf_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
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
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline, layout }
    }

    /// Uploads a character's primitives and joint matrices.
    pub fn upload(&self, device: &wgpu::Device, data: &CharacterData) -> CharacterGpu {
        let joint_mats = data.joint_matrices();
        let joints = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Character Joint Matrices"),
            contents: bytemuck::cast_slice(&joint_mats),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let primitives = data
            .primitives
            .iter()
            .map(|prim| {
                let vtx = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Character Vertices"),
                    contents: bytemuck::cast_slice(&prim.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });

                let idx = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Character Indices"),
                    contents: bytemuck::cast_slice(&prim.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });

                let ubo = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Character Primitive UBO"),
                    size: std::mem::size_of::<PrimitiveUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Character Primitive BindGroup"),
                    layout: &self.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: ubo.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: joints.as_entire_binding(),
                        },
                    ],
                });

                PrimitiveGpu {
                    node: prim.node,
                    skinned: prim.skinned,
                    index_count: prim.indices.len() as u32,
                    vtx,
                    idx,
                    ubo,
                    bind,
                }
            })
            .collect();

        CharacterGpu { primitives, joints }
    }

    /// Writes this frame's matrices: one uniform per primitive plus the
    /// shared joint palette.
    pub fn write_frame(
        &self,
        queue: &wgpu::Queue,
        gpu: &CharacterGpu,
        data: &CharacterData,
        view_proj: Mat4,
    ) {
        for prim in &gpu.primitives {
            // Skinned vertices are already in world space via the joint
            // palette; the node transform only applies to rigid primitives.
            let model = if prim.skinned {
                Mat4::IDENTITY
            } else {
                data.nodes[prim.node].global
            };

            let uniform = PrimitiveUniform {
                view_proj: view_proj.to_cols_array_2d(),
                model: model.to_cols_array_2d(),
                skinned: prim.skinned as u32,
                _pad: [0; 3],
            };

            queue.write_buffer(&prim.ubo, 0, bytemuck::bytes_of(&uniform));
        }

        let joint_mats = data.joint_matrices();
        queue.write_buffer(&gpu.joints, 0, bytemuck::cast_slice(&joint_mats));
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, gpu: &'a CharacterGpu) {
        rpass.set_pipeline(&self.pipeline);

        for prim in &gpu.primitives {
            rpass.set_bind_group(0, &prim.bind, &[]);
            rpass.set_vertex_buffer(0, prim.vtx.slice(..));
            rpass.set_index_buffer(prim.idx.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..prim.index_count, 0, 0..1);
        }
    }
}
