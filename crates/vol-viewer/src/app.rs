use crate::{
    animation::AnimationMixer,
    camera::{Camera, CameraController},
    character::CharacterData,
    config::Flow,
    loader::{self, LoadRequest, LoadResult, LoadedAsset},
    renderer::{
        context::ensure_layer_capacity,
        pipelines::{character::CharacterGpu, slices::SliceStackGpu},
        Renderer, SceneDraw,
    },
    sweep::DepthSweep,
    ui::{self, FpsCounter, HudStatus},
};
use anyhow::Result;
use crossbeam_channel::{Receiver, TryRecvError};
use glam::Vec3;
use std::{sync::Arc, time::Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

/// Scene content for the running flow. Starts empty; the loader thread
/// fills it in (or records why it couldn't).
enum Content {
    Loading,
    Failed(String),
    Slices {
        gpu: SliceStackGpu,
        sweep: DepthSweep,
    },
    Character {
        data: Box<CharacterData>,
        gpu: CharacterGpu,
        mixer: Option<AnimationMixer>,
    },
}

/// Per-viewer context: everything one run owns, with no module state.
pub struct App {
    pub renderer: Renderer,
    pub camera: Camera,
    pub camera_controller: CameraController,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,

    flow: Flow,
    content: Content,
    load_rx: Receiver<LoadResult>,

    last_frame: Instant,
    fps: FpsCounter,
    exit_requested: bool,
}

impl App {
    pub async fn new(window: Arc<Window>, flow: Flow) -> Result<Self> {
        let clear_color = match flow {
            // The slice stack floats in an empty black scene.
            Flow::Slices { .. } => wgpu::Color::BLACK,
            // 0xa0a0a0, matching the ground fog.
            Flow::Character { .. } => wgpu::Color {
                r: 0.351,
                g: 0.351,
                b: 0.351,
                a: 1.0,
            },
        };

        let renderer = Renderer::new(window.clone(), clear_color).await?;
        let size = renderer.gfx.size;
        let aspect = size.width as f32 / size.height.max(1) as f32;

        let camera = match flow {
            Flow::Slices { .. } => Camera::new(
                Vec3::new(0.0, 0.0, 70.0),
                Vec3::ZERO,
                45.0,
                aspect,
                0.1,
                2000.0,
            ),
            Flow::Character { .. } => Camera::new(
                Vec3::new(100.0, 200.0, 300.0),
                Vec3::new(0.0, 100.0, 0.0),
                45.0,
                aspect,
                1.0,
                2000.0,
            ),
        };

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        // Kick off the asset load; the frame loop polls for the result.
        let (tx, load_rx) = loader::channel();
        let request = match &flow {
            Flow::Slices { archive, .. } => LoadRequest::Volume(archive.clone()),
            Flow::Character { model } => LoadRequest::Character(model.clone()),
        };
        loader::spawn(request, tx);

        Ok(Self {
            renderer,
            camera,
            camera_controller: CameraController::new(),
            egui_ctx,
            egui_state,
            flow,
            content: Content::Loading,
            load_rx,
            last_frame: Instant::now(),
            fps: FpsCounter::new(),
            exit_requested: false,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.camera
                .set_aspect(new_size.width as f32 / new_size.height as f32);
        }
    }

    /// Asks the frame loop to stop after the current event; the event
    /// loop exit tears down the window and every per-viewer resource.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Forwards an event to egui and the camera controller. Returns true
    /// when egui consumed it.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.camera_controller.handle_event(event, &mut self.camera);
        false
    }

    /// One frame: attach any newly loaded content, advance the animation
    /// state, render, and present.
    pub fn tick(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.fps.update(dt);

        self.poll_loader();
        self.advance(dt);
        self.render(window)
    }

    /// Drains the loader channel and attaches arrived content.
    fn poll_loader(&mut self) {
        if !matches!(self.content, Content::Loading) {
            return;
        }

        match self.load_rx.try_recv() {
            Ok(Ok(LoadedAsset::Volume(volume))) => self.attach_volume(volume),
            Ok(Ok(LoadedAsset::Character(data))) => self.attach_character(data),
            Ok(Err(err)) => {
                self.content = Content::Failed(err.to_string());
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // The loader thread died without sending; make it visible.
                self.content = Content::Failed("loader exited without a result".to_owned());
            }
        }
    }

    fn attach_volume(&mut self, volume: volarc::Volume) {
        if let Err(err) = ensure_layer_capacity(&self.renderer.gfx.limits, volume.dims.depth) {
            log::error!("cannot display volume: {err}");
            self.content = Content::Failed(err.to_string());
            return;
        }

        let gpu = self
            .renderer
            .slices
            .upload(&self.renderer.gfx.device, &self.renderer.gfx.queue, &volume);

        let (depth_step, depth_start) = match &self.flow {
            Flow::Slices {
                depth_step,
                depth_start,
                ..
            } => (*depth_step, *depth_start),
            Flow::Character { .. } => (0.4, None),
        };

        let layers = volume.dims.depth as f32;
        let start = depth_start.unwrap_or((layers / 2.0).round());
        let sweep = DepthSweep::new(start, depth_step, layers);

        self.content = Content::Slices { gpu, sweep };
    }

    fn attach_character(&mut self, mut data: Box<CharacterData>) {
        data.update_global_transforms();
        let gpu = self.renderer.character.upload(&self.renderer.gfx.device, &data);

        let mixer = data.clips.first().cloned().map(AnimationMixer::new);
        if let Some(m) = &mixer {
            log::info!("playing clip '{}' on loop", m.clip_name());
        }

        self.content = Content::Character { data, gpu, mixer };
    }

    /// Advances the one piece of per-frame animation state.
    fn advance(&mut self, dt: f32) {
        match &mut self.content {
            Content::Slices { sweep, .. } => sweep.advance(),
            Content::Character { data, mixer, .. } => {
                if let Some(mixer) = mixer {
                    mixer.update(dt, &mut data.nodes);
                    data.update_global_transforms();
                }
            }
            Content::Loading | Content::Failed(_) => {}
        }
    }

    fn hud_status(&self) -> HudStatus<'_> {
        match &self.content {
            Content::Loading => HudStatus::Loading,
            Content::Failed(message) => HudStatus::Failed(message),
            Content::Slices { gpu, sweep } => HudStatus::Slices {
                depth: sweep.current(),
                layers: gpu.layer_count,
            },
            Content::Character { mixer, .. } => HudStatus::Character {
                clip: mixer.as_ref().map(|m| m.clip_name()),
                time: mixer.as_ref().map(|m| m.time()).unwrap_or(0.0),
            },
        }
    }

    fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Frame uniforms, then the scene pass.
        let view_proj = self.camera.view_proj();
        match &self.content {
            Content::Slices { gpu, sweep } => {
                self.renderer.slices.write_uniform(
                    &self.renderer.gfx.queue,
                    view_proj,
                    sweep.current(),
                    gpu.layer_count,
                );
            }
            Content::Character { data, gpu, .. } => {
                self.renderer
                    .character
                    .write_frame(&self.renderer.gfx.queue, gpu, data, view_proj);
            }
            Content::Loading | Content::Failed(_) => {}
        }

        let scene = match &self.content {
            Content::Slices { gpu, .. } => SceneDraw::Slices(gpu),
            Content::Character { gpu, .. } => SceneDraw::Character(gpu),
            Content::Loading | Content::Failed(_) => SceneDraw::Empty,
        };
        self.renderer.render(&swap_view, scene, &self.camera);

        // HUD overlay pass.
        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::draw_hud(&self.egui_ctx, self.fps.fps(), &self.hud_status());

        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);

        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder =
            self.renderer
                .gfx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("UI Encoder"),
                });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        let user_cmds = self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("EGUI Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &swap_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(user_cmds.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();

        Ok(())
    }
}

/// The winit application shell. `resumed` bootstraps at most once; a
/// failed bootstrap stores its error for `main` to report.
pub struct Viewer {
    flow: Flow,
    window: Option<Arc<Window>>,
    app: Option<App>,
    error: Option<anyhow::Error>,
}

impl Viewer {
    pub fn new(flow: Flow) -> Self {
        Self {
            flow,
            window: None,
            app: None,
            error: None,
        }
    }

    /// The bootstrap error, if the viewer shut down because of one.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Volumetric Scan Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.error = Some(err.into());
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        log::info!("starting {} flow", match self.flow {
            Flow::Slices { .. } => "slice",
            Flow::Character { .. } => "character",
        });

        // Initialise the application (async → sync).
        match pollster::block_on(App::new(window, self.flow.clone())) {
            Ok(app) => self.app = Some(app),
            Err(err) => {
                log::error!("failed to initialise the viewer: {err:#}");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(window), Some(app)) = (&self.window, &mut self.app) else {
            return;
        };
        if window_id != window.id() {
            return;
        }

        // Forward events to the app; handle unconsumed window events.
        if !app.handle_event(window, &event) {
            match event {
                WindowEvent::CloseRequested => app.request_exit(),
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                        app.request_exit();
                    }
                }
                WindowEvent::Resized(physical_size) => {
                    app.resize(physical_size);
                }
                WindowEvent::RedrawRequested => match app.tick(window) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                        app.resize(window.inner_size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("WGPU out of memory – exiting.");
                        app.request_exit();
                    }
                    Err(err) => log::error!("Render error: {err:?}"),
                },
                _ => {}
            }
        }

        if app.exit_requested() {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Request a redraw each frame.
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
