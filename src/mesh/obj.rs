//! Wavefront OBJ loading

use std::path::Path;

use tobj::LoadOptions;

use crate::core::types::{Result, Vec3};
use crate::math::Aabb;
use super::buffer::{MeshBuffer, VertexAttrs};
use super::meshlet::Meshlet;
use super::utils::compute_mesh_bounds;

/// Load an OBJ file into a fresh buffer, flattening all models into a
/// single meshlet. Normals are kept only when every model carries them;
/// callers recompute them otherwise.
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<(MeshBuffer, Meshlet)> {
    let options = LoadOptions {
        // Faces may be arbitrary polygons; split them into triangles
        triangulate: true,
        // Collapse separate position/normal/uv index streams into one
        single_index: true,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj(path.as_ref(), &options)?;

    let has_normals = !models.is_empty() && models.iter().all(|m| !m.mesh.normals.is_empty());
    let mut attrs = VertexAttrs::default();
    if has_normals {
        attrs = attrs.with(VertexAttrs::NORMAL);
    }

    let mut buf = MeshBuffer::new(attrs);
    for model in &models {
        let base = buf.vertex_count();
        let m = &model.mesh;
        for p in m.positions.chunks_exact(3) {
            buf.positions.push(Vec3::new(p[0], p[1], p[2]));
        }
        if has_normals {
            for n in m.normals.chunks_exact(3) {
                buf.normals.push(Vec3::new(n[0], n[1], n[2]));
            }
        }
        for &i in &m.indices {
            buf.indices.push(base + i);
        }
    }

    let mut mesh = Meshlet {
        index_offset: 0,
        index_count: buf.index_count(),
        vertex_offset: 0,
        vertex_count: buf.vertex_count(),
        local_aabb: Aabb::default(),
    };
    mesh.local_aabb = compute_mesh_bounds(&buf, &mesh);
    log::debug!(
        "loaded OBJ: {} triangles, {} vertices, normals: {}",
        mesh.triangle_count(),
        mesh.vertex_count,
        has_normals
    );
    Ok((buf, mesh))
}
