//! Mesh utilities: normals and bounds

use crate::core::types::Vec3;
use crate::math::Aabb;
use super::buffer::{MeshBuffer, VertexAttrs};
use super::meshlet::Meshlet;

/// Compute area-weighted vertex normals for a meshlet, enabling the normal
/// attribute on the buffer if needed.
pub fn compute_mesh_normals(buf: &mut MeshBuffer, mesh: &Meshlet) {
    if !buf.attrs.has(VertexAttrs::NORMAL) {
        buf.attrs = buf.attrs.with(VertexAttrs::NORMAL);
    }
    let vtx_end = (mesh.vertex_offset + mesh.vertex_count) as usize;
    if buf.normals.len() < vtx_end {
        buf.normals.resize(vtx_end, Vec3::ZERO);
    }

    let base = mesh.vertex_offset as usize;
    for v in base..vtx_end {
        buf.normals[v] = Vec3::ZERO;
    }

    let idx_start = mesh.index_offset as usize;
    let idx_end = (mesh.index_offset + mesh.index_count) as usize;
    for tri in buf.indices[idx_start..idx_end].chunks_exact(3) {
        let i0 = base + tri[0] as usize;
        let i1 = base + tri[1] as usize;
        let i2 = base + tri[2] as usize;
        let p0 = buf.positions[i0];
        let p1 = buf.positions[i1];
        let p2 = buf.positions[i2];
        // Cross product length is twice the triangle area, which gives the
        // area weighting for free
        let n = (p1 - p0).cross(p2 - p0);
        buf.normals[i0] += n;
        buf.normals[i1] += n;
        buf.normals[i2] += n;
    }

    for v in base..vtx_end {
        buf.normals[v] = buf.normals[v].normalize_or_zero();
    }
}

/// Bounds of the vertices referenced by a meshlet's triangles.
/// Non-finite positions are skipped; returns `Aabb::empty()` if none remain.
pub fn compute_mesh_bounds(buf: &MeshBuffer, mesh: &Meshlet) -> Aabb {
    let mut aabb = Aabb::empty();
    let base = mesh.vertex_offset as usize;
    let idx_start = mesh.index_offset as usize;
    let idx_end = (mesh.index_offset + mesh.index_count) as usize;
    for &i in &buf.indices[idx_start..idx_end] {
        let p = buf.positions[base + i as usize];
        if p.is_finite() {
            aabb.expand(p);
        }
    }
    aabb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives;

    #[test]
    fn test_cube_normals_are_unit() {
        let mut buf = MeshBuffer::new(VertexAttrs::default());
        let mesh = primitives::unit_cube(&mut buf);
        compute_mesh_normals(&mut buf, &mesh);
        assert!(buf.attrs.has(VertexAttrs::NORMAL));
        for v in 0..mesh.vertex_count {
            let n = buf.normals[(mesh.vertex_offset + v) as usize];
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cube_bounds() {
        let mut buf = MeshBuffer::new(VertexAttrs::default());
        let mesh = primitives::unit_cube(&mut buf);
        let aabb = compute_mesh_bounds(&buf, &mesh);
        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::ONE);
    }

    #[test]
    fn test_bounds_skip_non_finite() {
        let mut buf = MeshBuffer::new(VertexAttrs::default());
        let mesh = primitives::unit_cube(&mut buf);
        let mut bad = buf;
        bad.positions[0] = Vec3::new(f32::NAN, 0.0, 0.0);
        let aabb = compute_mesh_bounds(&bad, &mesh);
        assert!(aabb.max.is_finite());
        assert!(aabb.min.is_finite());
    }
}
