//! Procedural test meshes

use crate::core::types::Vec3;
use crate::math::Aabb;
use super::buffer::{MeshBuffer, VertexAttrs};
use super::meshlet::Meshlet;

/// Append an axis-aligned unit cube (corner at the origin, 8 vertices,
/// 12 triangles) to the buffer.
pub fn unit_cube(buf: &mut MeshBuffer) -> Meshlet {
    const POSITIONS: [[f32; 3]; 8] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];
    const INDICES: [u32; 36] = [
        0, 2, 1, 0, 3, 2, // -z
        4, 5, 6, 4, 6, 7, // +z
        0, 1, 5, 0, 5, 4, // -y
        3, 7, 6, 3, 6, 2, // +y
        0, 4, 7, 0, 7, 3, // -x
        1, 2, 6, 1, 6, 5, // +x
    ];

    let vertex_offset = buf.alloc_vertices(8);
    let index_offset = buf.alloc_indices(36);
    let mut aabb = Aabb::empty();
    for (i, p) in POSITIONS.iter().enumerate() {
        let p = Vec3::from_array(*p);
        buf.positions[vertex_offset as usize + i] = p;
        aabb.expand(p);
    }
    buf.indices[index_offset as usize..index_offset as usize + 36].copy_from_slice(&INDICES);

    Meshlet {
        index_offset,
        index_count: 36,
        vertex_offset,
        vertex_count: 8,
        local_aabb: aabb,
    }
}

/// Append a UV sphere to the buffer. `rings >= 2` latitude bands and
/// `segments >= 3` longitude steps; the seam column is duplicated.
pub fn uv_sphere(
    buf: &mut MeshBuffer,
    center: Vec3,
    radius: f32,
    rings: u32,
    segments: u32,
) -> Meshlet {
    assert!(rings >= 2 && segments >= 3);
    let cols = segments + 1;
    let vertex_count = (rings + 1) * cols;
    let triangle_count = segments * (2 * rings - 2);

    let vertex_offset = buf.alloc_vertices(vertex_count);
    let index_offset = buf.alloc_indices(triangle_count * 3);

    let mut aabb = Aabb::empty();
    for lat in 0..=rings {
        let theta = std::f32::consts::PI * lat as f32 / rings as f32;
        for lon in 0..cols {
            let phi = std::f32::consts::TAU * lon as f32 / segments as f32;
            let dir = Vec3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            );
            let p = center + radius * dir;
            let v = (vertex_offset + lat * cols + lon) as usize;
            buf.positions[v] = p;
            if buf.attrs.has(VertexAttrs::NORMAL) {
                buf.normals[v] = dir;
            }
            aabb.expand(p);
        }
    }

    let mut w = index_offset as usize;
    for lat in 0..rings {
        for lon in 0..segments {
            let i0 = lat * cols + lon;
            let i1 = i0 + 1;
            let i2 = i0 + cols;
            let i3 = i2 + 1;
            // Quads collapse to single triangles at the poles
            if lat != rings - 1 {
                buf.indices[w] = i0;
                buf.indices[w + 1] = i2;
                buf.indices[w + 2] = i3;
                w += 3;
            }
            if lat != 0 {
                buf.indices[w] = i0;
                buf.indices[w + 1] = i3;
                buf.indices[w + 2] = i1;
                w += 3;
            }
        }
    }
    debug_assert_eq!(w, (index_offset + triangle_count * 3) as usize);

    Meshlet {
        index_offset,
        index_count: triangle_count * 3,
        vertex_offset,
        vertex_count,
        local_aabb: aabb,
    }
}
