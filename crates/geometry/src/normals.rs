use foundation::index_type::IndexBuffer;
use foundation::math::Vec3;

/// Per-vertex normals as the normalized sum of adjacent face normals.
///
/// On unique-vertex geometry every vertex belongs to one triangle, so this
/// yields flat shading. Vertices of degenerate triangles get a zero normal.
pub fn build_normals(vertices: &[f32], indices: &IndexBuffer) -> Vec<f32> {
    let count = vertices.len() / 3;
    let position = |i: usize| Vec3::from_f32([vertices[3 * i], vertices[3 * i + 1], vertices[3 * i + 2]]);

    let mut sums = vec![Vec3::ZERO; count];
    let indices = indices.to_vec();
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= count || b >= count || c >= count {
            continue;
        }
        let face = (position(b) - position(a)).cross(position(c) - position(a));
        for v in [a, b, c] {
            sums[v] += face;
        }
    }

    sums.into_iter()
        .flat_map(|n| n.normalize().to_f32())
        .collect()
}
