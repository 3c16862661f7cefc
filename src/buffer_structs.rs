use std::num::NonZeroU64;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    const ATTRIBS: &'static [wgpu::VertexAttribute; 1] = &[
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

/// One entry of a model matrix block, laid out the way std140/WGSL uniform
/// arrays of `mat4x4<f32>` expect (64 byte stride, no padding).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelMatrix {
    pub model: [[f32; 4]; 4],
}

impl From<cgmath::Matrix4<f32>> for ModelMatrix {
    fn from(m: cgmath::Matrix4<f32>) -> Self {
        Self { model: m.into() }
    }
}

pub const MODEL_MATRIX_SIZE: wgpu::BufferAddress = size_of::<ModelMatrix>() as wgpu::BufferAddress;

pub fn pad_to_copy_buffer_alignment(size: wgpu::BufferAddress) -> wgpu::BufferAddress {
    let align_mask = wgpu::COPY_BUFFER_ALIGNMENT - 1; // 0b11 since copy buffer alignment is 4
    ((size + align_mask) & !align_mask) // round up to nearest aligned
        .max(wgpu::COPY_BUFFER_ALIGNMENT) // make sure it's non-empty
}

pub fn uniform_layout_entry(binding: u32, size: wgpu::BufferAddress) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_struct_sizes() {
        assert_eq!(size_of::<Vertex>(), 12);
        assert_eq!(MODEL_MATRIX_SIZE, 64);
        assert_eq!(size_of::<CameraUniform>(), 128);
    }

    #[test]
    fn padding_rounds_up_to_four() {
        assert_eq!(pad_to_copy_buffer_alignment(0), 4);
        assert_eq!(pad_to_copy_buffer_alignment(5), 8);
        assert_eq!(pad_to_copy_buffer_alignment(64), 64);
    }

    #[test]
    fn model_matrix_keeps_column_major_order() {
        let m = cgmath::Matrix4::from_translation(cgmath::vec3(1.0f32, 2.0, 3.0));
        let raw = ModelMatrix::from(m);
        assert_eq!(raw.model[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
