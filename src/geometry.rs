use crate::buffer_structs::Vertex;

pub const VERTICES_PER_TRIANGLE: u32 = 3;

/// Upward pointing triangle centred on the origin, `scale` units from centre to tip.
pub fn triangle(scale: f32) -> [Vertex; 3] {
    [
        Vertex { position: [0.0, scale, 0.0] },
        Vertex { position: [-scale, -scale, 0.0] },
        Vertex { position: [scale, -scale, 0.0] },
    ]
}

/// The same triangle repeated once per object. Placement comes entirely from
/// the model matrix the shader picks for each triangle.
pub fn build_triangles(total_objects: u32, scale: f32) -> Vec<Vertex> {
    let shape = triangle(scale);
    let mut vertices = Vec::with_capacity((total_objects * VERTICES_PER_TRIANGLE) as usize);
    for _ in 0..total_objects {
        vertices.extend_from_slice(&shape);
    }
    vertices
}
