use anyhow::{anyhow, Result};
use log::{debug, error, info};
use wgpu::util::DeviceExt;

use crate::blocks::BlockLayout;
use crate::buffer_structs::{self, CameraUniform, ModelMatrix, Vertex};
use crate::render::{DeviceHandle, TargetTextureDongle};
use crate::scene::Scene;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

#[derive(Debug)]
pub struct RenderEngine {
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    model_buffers: Vec<wgpu::Buffer>,
    model_bind_group: wgpu::BindGroup,

    clear_color: wgpu::Color,
}

impl RenderEngine {
    pub fn new(
        device: &DeviceHandle,
        format: wgpu::TextureFormat,
        scene: &Scene,
        clear_color: wgpu::Color,
    ) -> Result<RenderEngine> {
        let camera_bind_group_layout = device
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[buffer_structs::uniform_layout_entry(
                    0,
                    size_of::<CameraUniform>() as wgpu::BufferAddress,
                )],
                label: Some("Camera bind group layout"),
            });
        let model_entries: Vec<wgpu::BindGroupLayoutEntry> = scene
            .layout
            .blocks()
            .iter()
            .map(|b| buffer_structs::uniform_layout_entry(b.binding, b.byte_size()))
            .collect();
        let model_bind_group_layout = device
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &model_entries,
                label: Some("Model matrices bind group layout"),
            });

        let render_pipeline = create_pipeline(
            device,
            &scene.layout,
            format,
            &[&camera_bind_group_layout, &model_bind_group_layout],
        )?;

        let camera_buffer = device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera uniform buffer"),
            size: buffer_structs::pad_to_copy_buffer_alignment(size_of::<CameraUniform>() as u64),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("Camera bind group"),
        });

        let model_buffers: Vec<wgpu::Buffer> = scene
            .layout
            .blocks()
            .iter()
            .zip(&scene.blocks)
            .map(|(block, matrices)| {
                device.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(block.name.as_str()),
                    contents: bytemuck::cast_slice(matrices),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();
        let model_bind_group_entries: Vec<wgpu::BindGroupEntry> = scene
            .layout
            .blocks()
            .iter()
            .zip(&model_buffers)
            .map(|(block, buffer)| wgpu::BindGroupEntry {
                binding: block.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let model_bind_group = device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &model_bind_group_layout,
            entries: &model_bind_group_entries,
            label: Some("Model matrices bind group"),
        });
        info!(
            "Uploaded {} model matrices in {} block(s) of {}",
            scene.total_objects(),
            model_buffers.len(),
            scene.layout.capacity(),
        );

        let vertex_buffer = device.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice::<Vertex, u8>(&scene.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(RenderEngine {
            render_pipeline,
            vertex_buffer,
            vertex_count: scene.vertex_count(),

            camera_buffer,
            camera_bind_group,

            model_buffers,
            model_bind_group,

            clear_color,
        })
    }

    pub fn write_camera(&self, device: &DeviceHandle, camera: &CameraUniform) {
        device
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[*camera]));
    }

    /// Rewrites every block from `blocks`, one slice per model buffer.
    pub fn write_models(&self, device: &DeviceHandle, blocks: &[Vec<ModelMatrix>]) -> Result<()> {
        if blocks.len() != self.model_buffers.len() {
            return Err(anyhow!(
                "Got {} model blocks for {} buffers",
                blocks.len(),
                self.model_buffers.len()
            ));
        }
        for (buffer, matrices) in self.model_buffers.iter().zip(blocks) {
            device.queue.write_buffer(buffer, 0, bytemuck::cast_slice(matrices));
        }
        Ok(())
    }

    pub fn render(
        &self,
        device: &DeviceHandle,
        target_surface_view: &wgpu::TextureView,
        target_texture_views: &[&wgpu::TextureView],
    ) -> Result<()> {
        let depth_view = target_texture_views
            .first()
            .ok_or(anyhow!("Cannot render: depth buffer missing."))?;

        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.render_pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.model_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..self.vertex_count, 0..1);
        drop(render_pass);

        device.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

/// Builds the shader and pipeline inside a validation error scope so a bad
/// generated shader stops startup instead of rendering garbage.
fn create_pipeline(
    device: &DeviceHandle,
    layout: &BlockLayout,
    format: wgpu::TextureFormat,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> Result<wgpu::RenderPipeline> {
    let source = layout.shader_source();
    debug!("Generated shader:\n{source}");

    device.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let shader = device
        .device
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
    let render_pipeline_layout = device
        .device
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });
    let render_pipeline = device
        .device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main", // name of the main function of the vertex shader
                buffers: &[Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // orbiting camera sees the triangles from both sides
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

    if let Some(e) = pollster::block_on(device.device.pop_error_scope()) {
        error!("Shader compilation or pipeline creation failed:\n{e}");
        return Err(anyhow!("Invalid render pipeline: {e}"));
    }
    Ok(render_pipeline)
}

#[derive(Debug)]
pub struct DepthDongle();

impl DepthDongle {
    pub fn new() -> Self {
        Self()
    }
}

impl TargetTextureDongle for DepthDongle {
    fn num_textures(&self) -> usize {
        1
    }

    fn texture_desc(&self, _index: usize, width: u32, height: u32) -> wgpu::TextureDescriptor<'_> {
        let depth_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        wgpu::TextureDescriptor {
            label: Some("Depth buffer"),
            size: depth_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        }
    }
}
