use std::ops::Deref;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::info;
use winit::window::Window;

#[derive(Debug)]
pub struct RenderContext {
    instance: wgpu::Instance,
    devices: Vec<DeviceHandle>,
}

impl RenderContext {
    pub fn new() -> Self {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        Self {
            instance,
            devices: Vec::new(),
        }
    }

    pub async fn create_target<'b, D: TargetTextureDongle>(
        &mut self,
        window: Arc<Window>,
        dongle: D,
    ) -> Result<RenderTarget<'b, D>> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("Cannot create zero size window."));
        }
        let surface_target: wgpu::SurfaceTarget<'b> = window.clone().into();
        let surface: wgpu::Surface<'b> = self.instance.create_surface(surface_target)?;
        let device_id = self.device(Some(&surface)).await.ok_or(anyhow!("No compatible device."))?;

        let surface_caps = surface.get_capabilities(&self.get_device_by_id(device_id).adapter);

        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .ok_or(anyhow!("Surface and adapter are not compatible."))?;

        // no vsync where the surface allows it
        let present_mode = if surface_caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
            wgpu::PresentMode::Immediate
        } else {
            surface_caps.present_modes.first().copied().unwrap_or(wgpu::PresentMode::Fifo)
        };
        info!("Surface format {format:?}, present mode {present_mode:?}");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let mut target = RenderTarget {
            surface,
            config,
            format,
            device_id,
            window,
            minimized: false,
            textures: Vec::new(),
            dongle,
        };
        self.configure_surface(&mut target);
        Ok(target)
    }

    fn get_device_by_id(&self, id: DeviceId) -> &DeviceHandle {
        &self.devices[*id]
    }

    pub fn get_target_device<D>(&self, target: &RenderTarget<'_, D>) -> &DeviceHandle {
        self.get_device_by_id(target.device_id)
    }

    async fn device(&mut self, compatible_surface: Option<&wgpu::Surface<'_>>) -> Option<DeviceId> {
        let mut compatible_device = match compatible_surface {
            Some(s) => self
                .devices
                .iter()
                .enumerate()
                .find(|(_, d)| d.adapter.is_surface_supported(s))
                .map(|(index, _)| DeviceId(index)),
            None => (!self.devices.is_empty()).then_some(DeviceId(0)),
        };
        if compatible_device.is_none() {
            compatible_device = self.new_device(compatible_surface).await;
        }
        compatible_device
    }

    async fn new_device(&mut self, compatible_surface: Option<&wgpu::Surface<'_>>) -> Option<DeviceId> {
        let adapter = self
            .instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await?;
        info!("Using adapter {:?}", adapter.get_info().name);

        // larger uniform bindings mean more objects per block
        let required_limits = wgpu::Limits {
            max_uniform_buffer_binding_size: adapter.limits().max_uniform_buffer_binding_size,
            ..wgpu::Limits::default()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    label: None,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .ok()?;
        let id = DeviceId(self.devices.len());
        self.devices.push(DeviceHandle {
            adapter,
            device,
            queue,
        });
        Some(id)
    }

    pub fn resize_surface<D: TargetTextureDongle>(
        &self,
        target: &mut RenderTarget<'_, D>,
        size: winit::dpi::PhysicalSize<u32>,
    ) {
        if size.width > 0 && size.height > 0 {
            target.config.width = size.width;
            target.config.height = size.height;
            target.minimized = false;
            self.configure_surface(target);
        } else {
            target.minimized = true;
        }
    }

    fn configure_surface<D: TargetTextureDongle>(&self, target: &mut RenderTarget<'_, D>) {
        let device = self.get_device_by_id(target.device_id);
        target.surface.configure(&device.device, &target.config);
        target.textures = (0..target.dongle.num_textures())
            .map(|i| {
                let texture = device.device.create_texture(&target.dongle.texture_desc(
                    i,
                    target.config.width,
                    target.config.height,
                ));
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                (texture, view)
            })
            .collect();
    }
}

/// Describes the extra per-target textures (depth buffers and the like) that
/// have to follow the surface size.
pub trait TargetTextureDongle {
    fn num_textures(&self) -> usize;
    fn texture_desc(&self, index: usize, width: u32, height: u32) -> wgpu::TextureDescriptor<'_>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId(usize);

impl Deref for DeviceId {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct DeviceHandle {
    adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

#[derive(Debug)]
pub struct RenderTarget<'s, D> {
    // window must be dropped after surface
    surface: wgpu::Surface<'s>,
    config: wgpu::SurfaceConfiguration,
    format: wgpu::TextureFormat,

    minimized: bool,
    device_id: DeviceId,

    textures: Vec<(wgpu::Texture, wgpu::TextureView)>,
    dongle: D,

    window: Arc<Window>,
}

impl<'s, D> RenderTarget<'s, D> {
    pub fn is_live(&self) -> bool {
        !self.minimized
    }

    pub fn surface(&self) -> &wgpu::Surface<'s> {
        &self.surface
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    pub fn texture_views(&self) -> Vec<&wgpu::TextureView> {
        self.textures.iter().map(|(_, view)| view).collect()
    }

    pub fn window(&self) -> &Window {
        self.window.as_ref()
    }
}
