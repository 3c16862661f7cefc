use anyhow::{anyhow, Result};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};
use log::{error, info, warn, LevelFilter};

pub mod blocks;
pub mod buffer_structs;
pub mod camera;
pub mod config;
pub mod engine;
pub mod frame;
pub mod geometry;
pub mod render;
pub mod scene;
pub mod transform;

use buffer_structs::CameraUniform;
use camera::OrbitCamera;
use config::{RunConfig, Variant};
use engine::{DepthDongle, RenderEngine};
use frame::FrameDriver;
use render::{RenderContext, RenderTarget};
use scene::Scene;

const PAUSE_KEY: KeyCode = KeyCode::Space;

#[derive(Debug)]
struct AppState {
    driver: FrameDriver,
    pause_key_down: bool,
    start: Instant,
    view: cgmath::Matrix4<f32>,
}

impl AppState {
    fn new(config: &RunConfig) -> Self {
        let orbit = config.variant.orbits().then(OrbitCamera::default);
        Self {
            driver: FrameDriver::new(orbit),
            pause_key_down: false,
            start: Instant::now(),
            view: match orbit {
                Some(c) => c.view(0.0),
                None => camera::identity_view(),
            },
        }
    }

    fn handle_input(&mut self, event: WindowEvent) {
        if let WindowEvent::KeyboardInput {
            event: KeyEvent {
                physical_key: PhysicalKey::Code(PAUSE_KEY),
                state,
                ..
            },
            ..
        } = event
        {
            self.pause_key_down = state == ElementState::Pressed;
        }
    }
}

#[derive(Debug)]
pub struct App<'s> {
    // engine must be dropped before the target it renders to
    engine: Option<RenderEngine>,
    target: Option<RenderTarget<'s, DepthDongle>>,
    context: RenderContext,
    state: AppState,
    config: RunConfig,
    scene: Option<Scene>,
    failure: Option<anyhow::Error>,
}

impl App<'_> {
    pub fn new(config: RunConfig) -> Self {
        Self {
            engine: None,
            target: None,
            context: RenderContext::new(),
            state: AppState::new(&config),
            config,
            scene: None,
            failure: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.config.window_size;
        let attributes = Window::default_attributes()
            .with_title(self.config.variant.title())
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));
        let window = event_loop.create_window(attributes)?;
        let target = pollster::block_on(self.context.create_target(Arc::new(window), DepthDongle::new()))?;
        let device = self.context.get_target_device(&target);
        let scene = Scene::build(&self.config, &device.device.limits())?;
        info!(
            "Number of objects: {} ({} cluster(s), {} triangles)",
            self.config.num_objects,
            self.config.variant.clusters(),
            scene.total_objects(),
        );
        let engine = RenderEngine::new(device, target.surface_format(), &scene, self.config.clear_color)?;
        engine.write_camera(device, &self.camera_uniform(target.aspect()));
        self.engine = Some(engine);
        self.scene = Some(scene);
        self.target = Some(target);
        Ok(())
    }

    fn camera_uniform(&self, aspect: f32) -> CameraUniform {
        CameraUniform::new(
            camera::projection(self.config.variant.projection(), aspect),
            self.state.view,
        )
    }

    fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        if let Some(target) = self.target.as_mut() {
            self.context.resize_surface(target, size);
        }
        if let (Some(target), Some(engine)) = (self.target.as_ref(), self.engine.as_ref()) {
            if target.is_live() {
                engine.write_camera(self.context.get_target_device(target), &self.camera_uniform(target.aspect()));
            }
        }
    }

    fn render(&mut self) -> Result<()> {
        if let Some(view) = self
            .state
            .driver
            .advance(self.state.pause_key_down, self.state.start.elapsed())
        {
            self.state.view = view;
        }
        if let Some(target) = self.target.as_ref() {
            target.window().request_redraw();
            if !target.is_live() { return Ok(()); }
            let device = self.context.get_target_device(target);
            let engine = self.engine.as_ref().ok_or(anyhow!("Cannot render: engine missing."))?;

            if self.config.variant.orbits() {
                engine.write_camera(device, &self.camera_uniform(target.aspect()));
            }
            if self.config.variant.uploads_every_frame() {
                let scene = self.scene.as_ref().ok_or(anyhow!("Cannot upload: scene missing."))?;
                engine.write_models(device, &scene.blocks)?;
            }

            let output = target.surface().get_current_texture()?;
            let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
            engine.render(device, &view, &target.texture_views())?;
            output.present();
        }
        Ok(())
    }
}

impl ApplicationHandler for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        info!("Window resumed/created, creating window");
        if self.target.is_some() {
            warn!("Suspending and resuming are not supported.");
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Initialization failed: {e:#}");
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down.");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.render().err().map(|e| warn!("{e}"));
            }
            WindowEvent::Resized(size) => {
                self.resize(size);
            }
            _ => {self.state.handle_input(event);}
        }
    }
}

/// Opens the window and renders until it is closed. Errors are initialization
/// failures; per-frame problems are only logged.
pub fn run(config: RunConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Entry point shared by the demo binaries: `<program> <num_objects>`.
/// Exits with 1 on a usage error, before any window exists, and with 255 when
/// the window or graphics device cannot be set up.
pub fn launch(variant: Variant) -> ExitCode {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .filter(Some("wgpu_hal"), LevelFilter::Warn)
        .filter(Some("wgpu_core"), LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = match RunConfig::from_args(variant, std::env::args()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(255)
        }
    }
}
