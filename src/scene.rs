use anyhow::Result;

use crate::blocks::BlockLayout;
use crate::buffer_structs::{ModelMatrix, Vertex};
use crate::config::{RunConfig, Variant};
use crate::geometry::{self, VERTICES_PER_TRIANGLE};
use crate::transform::Layout;

/// Everything computed once at startup: the replicated triangles, the block
/// partition and the per-block matrix data ready for upload.
#[derive(Debug)]
pub struct Scene {
    pub vertices: Vec<Vertex>,
    pub layout: BlockLayout,
    pub blocks: Vec<Vec<ModelMatrix>>,
}

impl Scene {
    /// Fails before any vertex or matrix is generated when the blocks do not
    /// fit the device `limits`.
    pub fn build(config: &RunConfig, limits: &wgpu::Limits) -> Result<Self> {
        let variant = config.variant;
        let layout = BlockLayout::new(variant.clusters(), config.num_objects)?;
        layout.check_limits(limits)?;
        let vertices = geometry::build_triangles(layout.total_capacity(), variant.triangle_scale());
        let clusters = layout_policy(variant).generate(config.num_objects);
        let blocks = layout.partition(&clusters)?;
        Ok(Self {
            vertices,
            layout,
            blocks,
        })
    }

    pub fn total_objects(&self) -> u32 {
        self.layout.total_capacity()
    }

    pub fn vertex_count(&self) -> u32 {
        self.total_objects() * VERTICES_PER_TRIANGLE
    }
}

fn layout_policy(variant: Variant) -> Layout {
    match variant {
        Variant::UniformArray => Layout::Ring,
        Variant::Grid2d => Layout::Grid2d,
        Variant::Cube3d => Layout::Cube3d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn build(variant: Variant, n: u32) -> Result<Scene> {
        Scene::build(&RunConfig::new(variant, n), &wgpu::Limits::default())
    }

    #[test]
    fn vertex_count_covers_every_cluster() {
        let scene = build(Variant::Cube3d, 5).unwrap();
        assert_eq!(scene.total_objects(), 20);
        assert_eq!(scene.vertex_count(), 60);
        assert_eq!(scene.vertices.len(), 60);
        assert_eq!(scene.blocks.len(), 4);
        assert!(scene.blocks.iter().all(|b| b.len() == 5));
    }

    #[test]
    fn single_block_program() {
        let scene = build(Variant::UniformArray, 100).unwrap();
        assert_eq!(scene.blocks.len(), 1);
        assert_eq!(scene.vertex_count(), 300);
    }

    #[test]
    fn oversized_blocks_fail_before_generating() {
        // 2M objects per block would need gigabytes of vertices and matrices
        let start = Instant::now();
        let err = build(Variant::Cube3d, 2_000_000).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(err.to_string().contains("1024 objects"), "{err}");
    }

    #[test]
    fn largest_supported_count_builds() {
        let max = wgpu::Limits::default().max_uniform_buffer_binding_size / 64;
        assert!(build(Variant::Grid2d, max).is_ok());
        assert!(build(Variant::Grid2d, max + 1).is_err());
    }
}
