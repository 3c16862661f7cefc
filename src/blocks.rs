use std::fmt::Write;

use anyhow::{bail, Result};

use crate::buffer_structs::{ModelMatrix, MODEL_MATRIX_SIZE};
use crate::transform::Cluster;

/// Bind group the model matrix blocks live in. Group 0 holds the camera.
pub const MODEL_GROUP: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub name: String,
    pub binding: u32,
    pub capacity: u32,
}

impl BlockDescriptor {
    pub fn byte_size(&self) -> wgpu::BufferAddress {
        self.capacity as wgpu::BufferAddress * MODEL_MATRIX_SIZE
    }
}

/// The partition of `clusters * capacity` objects over uniform blocks. Block
/// `i` is bound at binding `i` and holds objects `[i * capacity, (i + 1) * capacity)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    capacity: u32,
    blocks: Vec<BlockDescriptor>,
}

impl BlockLayout {
    pub fn new(clusters: u32, capacity: u32) -> Result<Self> {
        if clusters == 0 || capacity == 0 {
            bail!("A block layout needs at least one block of at least one matrix.");
        }
        // every object is drawn as three vertices addressed by a u32 vertex index
        if clusters.checked_mul(capacity).and_then(|t| t.checked_mul(3)).is_none() {
            bail!("{clusters} blocks of {capacity} objects exceed the drawable vertex range.");
        }
        // no device binds a uniform block larger than u32::MAX bytes
        let max_capacity = u32::MAX as wgpu::BufferAddress / MODEL_MATRIX_SIZE;
        if capacity as wgpu::BufferAddress > max_capacity {
            bail!("{capacity} objects per block exceed the largest possible uniform block ({max_capacity} objects).");
        }
        let blocks = (0..clusters)
            .map(|i| BlockDescriptor {
                name: format!("model_matrices_{i}"),
                binding: i,
                capacity,
            })
            .collect();
        Ok(Self { capacity, blocks })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn blocks(&self) -> &[BlockDescriptor] {
        &self.blocks
    }

    pub fn total_capacity(&self) -> u32 {
        self.capacity * self.blocks.len() as u32
    }

    /// Block index and index within the block for an object, `None` past the end.
    pub fn locate(&self, object: u32) -> Option<(u32, u32)> {
        (object < self.total_capacity()).then(|| (object / self.capacity, object % self.capacity))
    }

    /// Fails when a single block would not fit in one uniform binding.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> Result<()> {
        let max = limits.max_uniform_buffer_binding_size as wgpu::BufferAddress;
        let needed = self.capacity as wgpu::BufferAddress * MODEL_MATRIX_SIZE;
        if needed > max {
            bail!(
                "{} objects per block need {needed} bytes but a uniform binding holds at most {max} ({} objects).",
                self.capacity,
                max / MODEL_MATRIX_SIZE,
            );
        }
        // +1 for the camera block
        let stage_max = limits.max_uniform_buffers_per_shader_stage;
        if self.blocks.len() as u32 + 1 > stage_max {
            bail!("{} model blocks exceed the {stage_max} uniform buffers a vertex stage may use.", self.blocks.len());
        }
        Ok(())
    }

    /// Flattens the clusters into per-block upload data, one entry per block.
    pub fn partition(&self, clusters: &[Cluster]) -> Result<Vec<Vec<ModelMatrix>>> {
        let objects: Vec<ModelMatrix> = clusters
            .iter()
            .flatten()
            .map(|m| ModelMatrix::from(*m))
            .collect();
        if objects.len() != self.total_capacity() as usize {
            bail!(
                "Got {} model matrices for {} block slots.",
                objects.len(),
                self.total_capacity()
            );
        }
        Ok(objects
            .chunks(self.capacity as usize)
            .map(|chunk| chunk.to_vec())
            .collect())
    }

    /// WGSL for both stages, with the block count, capacity, and the index
    /// ranges that pick a block written in as literals.
    pub fn shader_source(&self) -> String {
        let Some((last, rest)) = self.blocks.split_last() else {
            return String::new();
        };
        let mut src = String::new();
        src.push_str(
            "struct Camera {\n    projection: mat4x4<f32>,\n    view: mat4x4<f32>,\n};\n\n\
             @group(0) @binding(0)\nvar<uniform> camera: Camera;\n\n",
        );
        for block in &self.blocks {
            let _ = writeln!(
                src,
                "@group({MODEL_GROUP}) @binding({})\nvar<uniform> {}: array<mat4x4<f32>, {}>;\n",
                block.binding, block.name, block.capacity,
            );
        }

        src.push_str("fn model_matrix(object_index: u32) -> mat4x4<f32> {\n");
        for (i, block) in rest.iter().enumerate() {
            let start = i as u32 * self.capacity;
            let _ = writeln!(
                src,
                "    if (object_index < {end}u) {{\n        return {name}[object_index - {start}u];\n    }}",
                end = start + self.capacity,
                name = block.name,
            );
        }
        let _ = writeln!(
            src,
            "    return {}[object_index - {}u];\n}}\n",
            last.name,
            rest.len() as u32 * self.capacity,
        );

        src.push_str(
            "@vertex\n\
             fn vs_main(@builtin(vertex_index) vertex_index: u32, @location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {\n    \
                 let model = model_matrix(vertex_index / 3u);\n    \
                 return camera.projection * camera.view * model * vec4<f32>(position, 1.0);\n\
             }\n\n\
             @fragment\n\
             fn fs_main() -> @location(0) vec4<f32> {\n    \
                 return vec4<f32>(0.0, 1.0, 0.0, 1.0);\n\
             }\n",
        );
        src
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{vec3, Matrix4};

    fn clusters(k: u32, n: u32) -> Vec<Cluster> {
        (0..k)
            .map(|b| {
                (0..n)
                    .map(|i| Matrix4::from_translation(vec3(b as f32, i as f32, 0.0)))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn locate_splits_by_capacity() {
        let layout = BlockLayout::new(4, 8).unwrap();
        assert_eq!(layout.total_capacity(), 32);
        for i in 0..32 {
            assert_eq!(layout.locate(i), Some((i / 8, i % 8)));
        }
        assert_eq!(layout.locate(32), None);
    }

    #[test]
    fn bindings_follow_block_index() {
        let layout = BlockLayout::new(4, 3).unwrap();
        for (i, block) in layout.blocks().iter().enumerate() {
            assert_eq!(block.binding, i as u32);
            assert_eq!(block.name, format!("model_matrices_{i}"));
            assert_eq!(block.byte_size(), 3 * 64);
        }
    }

    #[test]
    fn partition_matches_locate() {
        let layout = BlockLayout::new(2, 5).unwrap();
        let blocks = layout.partition(&clusters(2, 5)).unwrap();
        assert_eq!(blocks.len(), 2);
        for object in 0..10 {
            let (b, j) = layout.locate(object).unwrap();
            let m = blocks[b as usize][j as usize].model;
            assert_eq!(m[3][0], b as f32);
            assert_eq!(m[3][1], j as f32);
        }
    }

    #[test]
    fn partition_rejects_wrong_object_count() {
        let layout = BlockLayout::new(4, 5).unwrap();
        assert!(layout.partition(&clusters(2, 5)).is_err());
    }

    #[test]
    fn empty_layouts_are_rejected() {
        assert!(BlockLayout::new(0, 4).is_err());
        assert!(BlockLayout::new(2, 0).is_err());
        assert!(BlockLayout::new(4, u32::MAX / 4).is_err());
        assert!(BlockLayout::new(1, 70_000_000).is_err());
    }

    #[test]
    fn shader_splices_counts_and_bounds() {
        let src = BlockLayout::new(4, 100).unwrap().shader_source();
        for i in 0..4 {
            assert!(src.contains(&format!("@group(1) @binding({i})\nvar<uniform> model_matrices_{i}: array<mat4x4<f32>, 100>;")));
        }
        assert!(src.contains("if (object_index < 100u) {\n        return model_matrices_0[object_index - 0u];"));
        assert!(src.contains("if (object_index < 200u) {\n        return model_matrices_1[object_index - 100u];"));
        assert!(src.contains("if (object_index < 300u) {\n        return model_matrices_2[object_index - 200u];"));
        assert!(src.contains("    return model_matrices_3[object_index - 300u];\n}"));
        assert!(!src.contains("object_index < 400u"));
    }

    #[test]
    fn single_block_shader_has_no_branches() {
        let src = BlockLayout::new(1, 100).unwrap().shader_source();
        assert!(!src.contains("if ("));
        assert!(src.contains("return model_matrices_0[object_index - 0u];"));
        assert!(src.contains("fn vs_main"));
        assert!(src.contains("fn fs_main"));
    }

    #[test]
    fn shader_selection_agrees_with_locate() {
        // walk the generated range chain and compare with locate()
        let layout = BlockLayout::new(3, 7).unwrap();
        let src = layout.shader_source();
        let bounds: Vec<u32> = src
            .lines()
            .filter_map(|l| l.trim().strip_prefix("if (object_index < "))
            .map(|rest| rest.trim_end_matches("u) {").parse().unwrap())
            .collect();
        assert_eq!(bounds, vec![7, 14]);
        for object in 0..layout.total_capacity() {
            let block = bounds.iter().position(|&b| object < b).unwrap_or(bounds.len()) as u32;
            assert_eq!(layout.locate(object).unwrap().0, block);
        }
    }

    #[test]
    fn generated_shader_validates() {
        for (k, n) in [(1, 100), (2, 100), (4, 8), (4, 1024)] {
            let src = BlockLayout::new(k, n).unwrap().shader_source();
            let module = naga::front::wgsl::parse_str(&src)
                .unwrap_or_else(|e| panic!("k={k} n={n}: {}", e.emit_to_string(&src)));
            let mut validator = naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::empty(),
            );
            if let Err(e) = validator.validate(&module) {
                panic!("k={k} n={n}: {e:?}");
            }
            for entry in ["vs_main", "fs_main"] {
                assert!(module.entry_points.iter().any(|ep| ep.name == entry));
            }
        }
    }

    #[test]
    fn limits_bound_the_block_capacity() {
        let limits = wgpu::Limits::default();
        let max = limits.max_uniform_buffer_binding_size / 64;
        assert!(BlockLayout::new(4, max).unwrap().check_limits(&limits).is_ok());
        assert!(BlockLayout::new(4, max + 1).unwrap().check_limits(&limits).is_err());
    }
}
