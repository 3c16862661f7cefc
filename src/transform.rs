use cgmath::{vec3, Matrix4, Vector3};

/// Model matrices of every object sharing one uniform block.
pub type Cluster = Vec<Matrix4<f32>>;

const RING_SCALE: f32 = 0.3;
const GRID_SCALE: f32 = 0.3;
const GRID_OFFSET_SCALE: f32 = 0.8;
const CUBE_SCALE: f32 = 0.5;
const MIN_GRID_DIM: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Objects evenly spaced on the unit circle.
    Ring,
    /// A square-ish NDC grid and a second layer shifted by half a cell.
    Grid2d,
    /// Four cube lattices at symmetric, margin-separated origins.
    Cube3d,
}

impl Layout {
    /// Produces one cluster per uniform block, each holding exactly `n` matrices.
    pub fn generate(&self, n: u32) -> Vec<Cluster> {
        match self {
            Self::Ring => vec![ring(n)],
            Self::Grid2d => grid_2d(n).into(),
            Self::Cube3d => cube_grid(n).into(),
        }
    }
}

pub fn model_matrix(position: Vector3<f32>, scale: f32) -> Matrix4<f32> {
    Matrix4::from_translation(position) * Matrix4::from_scale(scale)
}

/// Distance between neighbouring cells when `dim` cells span `[-1, 1]`.
pub fn spacing(dim: u32) -> f32 {
    2.0 / (dim.max(MIN_GRID_DIM) - 1) as f32
}

/// Columns and rows for `n` objects: `ceil(sqrt(n))` columns, as many rows as
/// needed, neither below two.
pub fn grid_dims_2d(n: u32) -> (u32, u32) {
    let cols = ((n as f64).sqrt().ceil() as u32).max(MIN_GRID_DIM);
    let rows = n.div_ceil(cols).max(MIN_GRID_DIM);
    (cols, rows)
}

/// Edge length of the smallest cube lattice holding `n` objects, never below two.
pub fn cube_dim(n: u32) -> u32 {
    let mut dim = (n as f64).cbrt().ceil() as u32;
    // cbrt of an exact cube can land a hair above the integer
    while dim > 1 && (dim - 1).pow(3) >= n {
        dim -= 1;
    }
    dim.max(MIN_GRID_DIM)
}

/// Offset of each cube cluster's centre from the world origin along x and z.
pub fn cube_margin(dim: u32) -> f32 {
    1.0 + spacing(dim)
}

pub fn cube_origins(dim: u32) -> [Vector3<f32>; 4] {
    let m = cube_margin(dim);
    [
        vec3(-m, 0.0, -m),
        vec3(m, 0.0, -m),
        vec3(-m, 0.0, m),
        vec3(m, 0.0, m),
    ]
}

fn ring(n: u32) -> Cluster {
    (0..n)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / n as f32;
            model_matrix(vec3(angle.cos(), angle.sin(), 0.0), RING_SCALE)
        })
        .collect()
}

fn grid_2d(n: u32) -> [Cluster; 2] {
    let (cols, rows) = grid_dims_2d(n);
    let x_spacing = spacing(cols);
    let y_spacing = spacing(rows);

    let mut primary = Vec::with_capacity(n as usize);
    let mut offset = Vec::with_capacity(n as usize);
    for i in 0..n {
        let x = -1.0 + (i % cols) as f32 * x_spacing;
        let y = -1.0 + (i / cols) as f32 * y_spacing;
        primary.push(model_matrix(vec3(x, y, 0.0), GRID_SCALE));
        offset.push(model_matrix(
            vec3(x + x_spacing * 0.5, y + y_spacing * 0.5, 0.0),
            GRID_OFFSET_SCALE,
        ));
    }
    [primary, offset]
}

fn cube_grid(n: u32) -> [Cluster; 4] {
    let dim = cube_dim(n);
    let step = spacing(dim);
    cube_origins(dim).map(|origin| {
        (0..n)
            .map(|i| {
                let cell = vec3(
                    (i % dim) as f32,
                    (i / dim % dim) as f32,
                    (i / (dim * dim)) as f32,
                );
                model_matrix(origin + vec3(-1.0, -1.0, -1.0) + cell * step, CUBE_SCALE)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn translation(m: &Matrix4<f32>) -> Vector3<f32> {
        m.w.truncate()
    }

    fn cell_key(v: Vector3<f32>) -> (i64, i64, i64) {
        let q = |f: f32| (f * 1e4).round() as i64;
        (q(v.x), q(v.y), q(v.z))
    }

    #[test]
    fn every_cluster_holds_n_matrices() {
        for n in [1, 2, 7, 8, 27, 100, 1000] {
            for layout in [Layout::Ring, Layout::Grid2d, Layout::Cube3d] {
                let clusters = layout.generate(n);
                assert!(clusters.iter().all(|c| c.len() == n as usize), "{layout:?} n={n}");
            }
        }
    }

    #[test]
    fn cells_within_a_cluster_are_distinct() {
        for n in [1, 5, 64, 100, 343] {
            for layout in [Layout::Ring, Layout::Grid2d, Layout::Cube3d] {
                for cluster in layout.generate(n) {
                    let cells: HashSet<_> = cluster.iter().map(|m| cell_key(translation(m))).collect();
                    assert_eq!(cells.len(), n as usize, "{layout:?} n={n}");
                }
            }
        }
    }

    #[test]
    fn grid_extremes_hit_the_ndc_bounds() {
        // 100 objects fill a 10x10 grid exactly
        assert_eq!(grid_dims_2d(100), (10, 10));
        let primary = &Layout::Grid2d.generate(100)[0];
        let first = translation(&primary[0]);
        let last = translation(&primary[99]);
        assert!((first.x + 1.0).abs() < 1e-6 && (first.y + 1.0).abs() < 1e-6);
        assert!((last.x - 1.0).abs() < 1e-5 && (last.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn adjacent_cells_are_two_over_dim_minus_one_apart() {
        let (cols, _) = grid_dims_2d(16);
        let primary = &Layout::Grid2d.generate(16)[0];
        let dx = translation(&primary[1]).x - translation(&primary[0]).x;
        assert!((dx - 2.0 / (cols - 1) as f32).abs() < 1e-6);
    }

    #[test]
    fn degenerate_dimensions_are_clamped_to_two() {
        assert_eq!(grid_dims_2d(1), (2, 2));
        assert_eq!(cube_dim(1), 2);
        assert_eq!(spacing(1), 2.0);
        assert!(Layout::Grid2d.generate(1)[0][0].w.x.is_finite());
    }

    #[test]
    fn offset_layer_sits_half_a_cell_away() {
        let clusters = Layout::Grid2d.generate(9);
        let step = spacing(3);
        for (a, b) in clusters[0].iter().zip(&clusters[1]) {
            let d = translation(b) - translation(a);
            assert!((d.x - step * 0.5).abs() < 1e-6);
            assert!((d.y - step * 0.5).abs() < 1e-6);
        }
        // offset layer uses its own scale
        assert!((clusters[1][0].x.x - 0.8).abs() < 1e-6);
        assert!((clusters[0][0].x.x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn cube_dimension_is_ceil_cbrt() {
        assert_eq!(cube_dim(8), 2);
        assert_eq!(cube_dim(9), 3);
        assert_eq!(cube_dim(27), 3);
        assert_eq!(cube_dim(28), 4);
        assert_eq!(cube_dim(1000), 10);
    }

    #[test]
    fn eight_objects_form_four_separate_two_cubes() {
        let clusters = Layout::Cube3d.generate(8);
        assert_eq!(clusters.len(), 4);
        let origins = cube_origins(2);
        for (cluster, origin) in clusters.iter().zip(origins) {
            let cells: HashSet<_> = cluster.iter().map(|m| cell_key(translation(m) - origin)).collect();
            let expected: HashSet<_> = (0..8)
                .map(|i| {
                    let s = |bit: u32| if i & bit == 0 { -1.0 } else { 1.0 };
                    cell_key(vec3(s(1), s(2), s(4)))
                })
                .collect();
            assert_eq!(cells, expected);
        }
        // clusters do not overlap along x or z
        let m = cube_margin(2);
        assert!(m - 1.0 > 0.0);
    }

    #[test]
    fn ring_lies_on_the_unit_circle() {
        for m in &Layout::Ring.generate(12)[0] {
            let t = translation(m);
            assert!(((t.x * t.x + t.y * t.y).sqrt() - 1.0).abs() < 1e-5);
        }
    }
}
