//! The main rendering orchestrator. Owns the GPU context, render targets,
//! and the individual render pass pipelines.

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::{
        character::{CharacterGpu, CharacterPipeline},
        ground::GroundPipeline,
        slices::{SlicePipeline, SliceStackGpu},
    },
    targets::Targets,
};
use crate::camera::Camera;
use std::sync::Arc;
use winit::window::Window;

/// What the scene pass draws this frame. Content is absent until the
/// loader thread delivers it.
pub enum SceneDraw<'a> {
    Empty,
    Slices(&'a SliceStackGpu),
    Character(&'a CharacterGpu),
}

/// Owns all rendering-related state.
pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub slices: SlicePipeline,
    pub character: CharacterPipeline,
    pub ground: GroundPipeline,
    pub egui_renderer: egui_wgpu::Renderer,
    clear_color: wgpu::Color,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, clear_color: wgpu::Color) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let size = gfx.size;

        let targets = Targets::new(&gfx.device, size);
        let slices = SlicePipeline::new(&gfx.device, gfx.config.format, targets.depth_fmt);
        let character = CharacterPipeline::new(&gfx.device, gfx.config.format, targets.depth_fmt);
        let ground = GroundPipeline::new(&gfx.device, gfx.config.format, targets.depth_fmt);

        let egui_renderer =
            egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1, false);

        Ok(Self {
            gfx,
            targets,
            slices,
            character,
            ground,
            egui_renderer,
            clear_color,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Records and submits the scene pass (the egui overlay runs in its
    /// own pass afterwards).
    pub fn render(&mut self, swap_view: &wgpu::TextureView, scene: SceneDraw<'_>, camera: &Camera) {
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            match scene {
                SceneDraw::Empty => {}
                SceneDraw::Slices(stack) => {
                    self.slices.draw(&mut pass, stack);
                }
                SceneDraw::Character(gpu) => {
                    // Ground first; it never writes depth.
                    self.ground.draw(&mut pass, &self.gfx.queue, camera);
                    self.character.draw(&mut pass, gpu);
                }
            }
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}
