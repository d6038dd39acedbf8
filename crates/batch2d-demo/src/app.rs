use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use batch2d::{BatchConfig, Color, GraphicsBackend, OrthoCamera, SpriteRenderer, TextureHandle};
use batch2d_wgpu::{WgpuBackend, request_batch_device};
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::scene::{SpriteField, checker_texture};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.04,
    a: 1.0,
};
const PROCEDURAL_TEXTURE_SIZE: u32 = 32;

/// Settings the app needs once the window exists.
pub struct DemoSettings {
    pub width: u32,
    pub height: u32,
    pub quads: usize,
    pub textures: usize,
    pub seed: u64,
    pub batch: BatchConfig,
    /// Decoded RGBA image used instead of the first procedural texture.
    pub sprite_image: Option<(u32, u32, Vec<u8>)>,
}

/// Window, surface and renderer, created on `resumed`.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: SpriteRenderer<WgpuBackend>,
    camera: OrthoCamera,
    hud_camera: OrthoCamera,
    textures: Vec<TextureHandle>,
}

impl Gpu {
    async fn new(window: Arc<Window>, settings: &DemoSettings) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| anyhow!("failed to create surface: {e}"))?;
        let (adapter, device, queue) = request_batch_device(&instance, Some(&surface)).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        let backend = WgpuBackend::new(device, queue, format);
        let mut renderer = SpriteRenderer::initialize(backend, settings.batch.clone())?;
        if renderer.is_inert() {
            warn!("batch shader did not compile; nothing will be drawn");
        }

        let mut textures = Vec::with_capacity(settings.textures);
        for i in 0..settings.textures {
            let backend = renderer.backend_mut();
            let texture = match (&settings.sprite_image, i) {
                (Some((w, h, pixels)), 0) => backend.create_texture_rgba(*w, *h, pixels)?,
                _ => backend.create_texture_rgba(
                    PROCEDURAL_TEXTURE_SIZE,
                    PROCEDURAL_TEXTURE_SIZE,
                    &checker_texture(i, PROCEDURAL_TEXTURE_SIZE),
                )?,
            };
            textures.push(texture);
        }

        let camera = OrthoCamera::new(surface_config.width as f32, surface_config.height as f32);
        Ok(Self {
            window,
            surface,
            surface_config,
            renderer,
            camera,
            hud_camera: camera,
            textures,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface
            .configure(self.renderer.backend().device(), &self.surface_config);
        self.camera.resize(width as f32, height as f32);
        self.hud_camera.resize(width as f32, height as f32);
    }

    fn render(&mut self, field: &SpriteField) -> Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                self.surface
                    .configure(self.renderer.backend().device(), &self.surface_config);
                return Ok(());
            }
            Err(e) => bail!("failed to get surface texture: {e}"),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let backend = self.renderer.backend_mut();
        backend.set_target(Some(view));
        backend.clear(CLEAR_COLOR)?;

        self.renderer.reset_stats();
        self.renderer.begin_batch(&self.camera);
        for sprite in field.sprites() {
            match sprite.texture.and_then(|i| self.textures.get(i)) {
                Some(&texture) => self.renderer.draw_textured_quad(
                    sprite.position,
                    sprite.size,
                    sprite.rotation,
                    texture,
                    sprite.uv,
                    sprite.tint,
                ),
                None => self.renderer.draw_quad(
                    sprite.position,
                    sprite.size,
                    sprite.rotation,
                    sprite.tint,
                ),
            }
        }
        self.renderer.end_batch();

        // Draw-call meter in screen space, one segment per draw call.
        let stats = self.renderer.stats();
        for i in 0..stats.draw_calls.min(64) {
            self.renderer.draw_quad_immediate(
                &self.hud_camera,
                [12.0 + i as f32 * 10.0, 12.0],
                [8.0, 8.0],
                0.0,
                Color::from_rgba8(255, 200, 40, 220),
            );
        }

        self.renderer.backend_mut().set_target(None);
        frame.present();

        self.window.set_title(&format!(
            "batch2d demo - {} quads, {} draw calls, {} dropped",
            stats.quads_drawn, stats.draw_calls, stats.quads_dropped
        ));
        Ok(())
    }
}

/// winit application driving the sprite field.
pub struct DemoApp {
    settings: DemoSettings,
    field: SpriteField,
    gpu: Option<Gpu>,
    last_frame: Instant,
    frames: u64,
    failure: Option<anyhow::Error>,
}

impl DemoApp {
    pub fn new(settings: DemoSettings) -> Self {
        let field = SpriteField::new(
            settings.quads,
            settings.textures,
            [settings.width as f32, settings.height as f32],
            settings.seed,
        );
        Self {
            settings,
            field,
            gpu: None,
            last_frame: Instant::now(),
            frames: 0,
            failure: None,
        }
    }

    /// Error that stopped the event loop, if any.
    pub fn take_failure(&mut self) -> Option<anyhow::Error> {
        self.failure.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("batch2d demo")
            .with_inner_size(PhysicalSize::new(self.settings.width, self.settings.height));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, anyhow!("failed to create window: {e}"));
                return;
            }
        };

        match pollster::block_on(Gpu::new(window.clone(), &self.settings)) {
            Ok(gpu) => {
                info!(
                    "{} sprites over {} textures",
                    self.field.sprites().len(),
                    gpu.textures.len()
                );
                self.gpu = Some(gpu);
                self.last_frame = Instant::now();
                window.request_redraw();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size.width, size.height);
                }
                self.field
                    .resize([size.width as f32, size.height as f32]);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.1);
                self.last_frame = now;
                self.field.update(dt);

                let Some(gpu) = &mut self.gpu else {
                    return;
                };
                if let Err(e) = gpu.render(&self.field) {
                    error!("render error: {e:#}");
                }
                gpu.window.request_redraw();
                self.frames += 1;
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = self.gpu.take() {
            let stats = gpu.renderer.stats();
            info!(
                "exiting after {} frames (last frame: {} draw calls, {:.1} quads per draw)",
                self.frames,
                stats.draw_calls,
                stats.quads_per_draw()
            );
            drop(gpu.renderer.shutdown());
        }
    }
}
