//! Source-mesh optimization through meshopt

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use super::buffer::MeshBuffer;
use super::meshlet::Meshlet;

/// Adapter exposing a position slice to meshopt as raw interleaved bytes
pub(crate) fn position_adapter(positions: &[Vec3]) -> Result<meshopt::VertexDataAdapter<'_>> {
    meshopt::VertexDataAdapter::new(
        bytemuck::cast_slice(positions),
        std::mem::size_of::<Vec3>(),
        0,
    )
    .map_err(|e| Error::Simplify(e.to_string()))
}

/// Reorder a meshlet's triangles in place for vertex cache locality and
/// reduced overdraw. Vertex data is left untouched.
pub fn optimize_mesh(buf: &mut MeshBuffer, mesh: &Meshlet) -> Result<()> {
    let idx = mesh.index_offset as usize..(mesh.index_offset + mesh.index_count) as usize;
    let vtx = mesh.vertex_offset as usize..(mesh.vertex_offset + mesh.vertex_count) as usize;
    let indices = &mut buf.indices[idx];
    let positions = &buf.positions[vtx];

    meshopt::optimize_vertex_cache_in_place(indices, positions.len());
    let adapter = position_adapter(positions)?;
    meshopt::optimize_overdraw_in_place(indices, &adapter, 1.05);
    Ok(())
}

/// Log vertex cache statistics for a meshlet
pub fn log_statistics(label: &str, buf: &MeshBuffer, mesh: &Meshlet) {
    let idx = mesh.index_offset as usize..(mesh.index_offset + mesh.index_count) as usize;
    let stats = meshopt::analyze_vertex_cache(
        &buf.indices[idx],
        mesh.vertex_count as usize,
        16,
        0,
        0,
    );
    log::info!("{}: ACMR {:.3} ATVR {:.3}", label, stats.acmr, stats.atvr);
}
