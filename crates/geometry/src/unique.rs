//! Expansion of indexed geometry into one vertex per triangle corner.
//!
//! Each corner gets its own copy of every attribute so later passes can
//! assign per-face normals without smoothing across hard edges.

use foundation::index_type::{IndexBuffer, IndexType};

use crate::faces::Faces;

/// `stride` values per vertex; vertex `i` of the result is vertex `order[i]` of `data`.
pub fn unique_vertex_attribute<T: Copy>(data: &[T], stride: usize, order: &[u32]) -> Vec<T> {
    let mut out = Vec::with_capacity(order.len() * stride);
    for &i in order {
        let start = i as usize * stride;
        out.extend_from_slice(&data[start..start + stride]);
    }
    out
}

/// Rewrites `faces` so that `indices` becomes `0, 1, …, n - 1`.
///
/// The index buffer is re-typed when the expanded vertex count no longer
/// matches its element width. Running the pass twice changes nothing.
pub fn build_unique_vertex(faces: &mut Faces) {
    let order = faces.indices.to_vec();

    faces.vertices = unique_vertex_attribute(&faces.vertices, 3, &order);
    if let Some(uvs) = faces.uvs.as_mut() {
        *uvs = unique_vertex_attribute(uvs, 2, &order);
    }
    if let Some(normals) = faces.normals.as_mut() {
        *normals = unique_vertex_attribute(normals, 3, &order);
    }
    faces.indexes = faces.indexes.gather(&order);

    let needed = IndexType::for_vertex_count(order.len());
    if faces.indices.index_type() == needed {
        rewrite_sequential(&mut faces.indices);
    } else {
        faces.indices = IndexBuffer::sequential(order.len());
    }
}

fn rewrite_sequential(indices: &mut IndexBuffer) {
    match indices {
        IndexBuffer::U8(v) => v.iter_mut().enumerate().for_each(|(i, x)| *x = i as u8),
        IndexBuffer::U16(v) => v.iter_mut().enumerate().for_each(|(i, x)| *x = i as u16),
        IndexBuffer::U32(v) => v.iter_mut().enumerate().for_each(|(i, x)| *x = i as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_unique_vertex, unique_vertex_attribute};
    use crate::faces::Faces;
    use foundation::index_type::{IndexBuffer, IndexType};

    fn quad() -> Faces {
        Faces {
            vertices: vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 1.0, 0.0, //
                0.0, 1.0, 0.0,
            ],
            indices: IndexBuffer::U8(vec![0, 1, 2, 0, 2, 3]),
            indexes: IndexBuffer::U8(vec![7, 7, 7, 7]),
            uvs: Some(vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
            ..Faces::default()
        }
    }

    #[test]
    fn gathers_attributes_by_corner() {
        let data = [10, 11, 20, 21, 30, 31];
        assert_eq!(unique_vertex_attribute(&data, 2, &[2, 0, 2]), vec![30, 31, 10, 11, 30, 31]);
    }

    #[test]
    fn quad_expands_to_six_vertices() {
        let mut faces = quad();
        build_unique_vertex(&mut faces);

        assert_eq!(faces.vertex_count(), 6);
        assert_eq!(faces.indices, IndexBuffer::U8(vec![0, 1, 2, 3, 4, 5]));
        assert_eq!(&faces.vertices[9..18], &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(faces.uvs.as_ref().map(Vec::len), Some(12));
        assert_eq!(faces.indexes.len(), 6);
        assert!(faces.is_well_formed());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut once = quad();
        build_unique_vertex(&mut once);
        let mut twice = once.clone();
        build_unique_vertex(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn index_type_widens_past_256_corners() {
        // 100 triangles over 3 shared vertices: 300 corners after expansion.
        let mut faces = Faces {
            vertices: vec![0.0; 9],
            indices: IndexBuffer::U8([0, 1, 2].repeat(100)),
            indexes: IndexBuffer::U8(vec![0, 0, 0]),
            ..Faces::default()
        };
        build_unique_vertex(&mut faces);
        assert_eq!(faces.indices.index_type(), IndexType::U16);
        assert_eq!(faces.indices.max_value(), Some(299));
        assert_eq!(faces.indexes.len(), 300);
    }
}
