//! Level-0 build: bucket source triangles into leaf cells
//!
//! Each source triangle is assigned by centroid to the leaf cell containing
//! it; triangles spanning several cells are not split. Classification runs
//! in parallel over triangle ranges; per-worker buckets are merged in chunk
//! order so per-cell contents do not depend on the worker count.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::core::types::{Result, Vec3};
use crate::math::Aabb;
use crate::mesh::{MeshBuffer, Meshlet, VertexAttrs};
use super::coord::CellCoord;
use super::MeshGrid;

/// Triangles per parallel classification chunk
const CHUNK: u32 = 4096;

struct LocalMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    aabb: Aabb,
}

pub(super) fn build_leaf_level(
    grid: &mut MeshGrid,
    src: &MeshBuffer,
    mesh: &Meshlet,
) -> Result<()> {
    grid.cell_offsets[0] = 0;

    let (buckets, order, dropped) = {
        let g: &MeshGrid = grid;
        classify(g, src, mesh)
    };
    if dropped > 0 {
        log::warn!("dropped {dropped} triangles with non-finite coordinates");
    }

    let has_normals = grid.data.attrs.has(VertexAttrs::NORMAL);
    let built: Vec<LocalMesh> = order
        .par_iter()
        .map(|coord| extract_cell(src, mesh, &buckets[coord], has_normals))
        .collect();

    for (coord, local) in order.into_iter().zip(built) {
        append_cell(grid, coord, local);
    }
    grid.cell_counts[0] = grid.cells.len() as u32;
    log::debug!("leaf build: {} occupied cells", grid.cell_counts[0]);
    Ok(())
}

/// Group triangle indices by target leaf cell. Returns the bucket map, the
/// occupied coordinates sorted by key, and the count of dropped triangles.
fn classify(
    grid: &MeshGrid,
    src: &MeshBuffer,
    mesh: &Meshlet,
) -> (HashMap<CellCoord, Vec<u32>>, Vec<CellCoord>, u32) {
    let tri_count = mesh.triangle_count();
    let chunks: Vec<(u32, u32)> = (0..tri_count)
        .step_by(CHUNK as usize)
        .map(|start| (start, (start + CHUNK).min(tri_count)))
        .collect();

    let results: Vec<(HashMap<CellCoord, Vec<u32>>, u32)> = chunks
        .into_par_iter()
        .map(|(start, end)| {
            let mut buckets: HashMap<CellCoord, Vec<u32>> = HashMap::new();
            let mut dropped = 0;
            for tri in start..end {
                match triangle_centroid(src, mesh, tri) {
                    Some(c) => buckets.entry(grid.leaf_coord(c)).or_default().push(tri),
                    None => dropped += 1,
                }
            }
            (buckets, dropped)
        })
        .collect();

    // Merging in chunk order keeps every cell's triangle list in ascending
    // source order regardless of worker interleaving
    let mut merged: HashMap<CellCoord, Vec<u32>> = HashMap::new();
    let mut dropped = 0;
    for (map, d) in results {
        dropped += d;
        for (coord, mut tris) in map {
            merged.entry(coord).or_default().append(&mut tris);
        }
    }

    let mut order: Vec<CellCoord> = merged.keys().copied().collect();
    order.sort_unstable_by_key(|c| c.key());
    (merged, order, dropped)
}

fn triangle_centroid(src: &MeshBuffer, mesh: &Meshlet, tri: u32) -> Option<Vec3> {
    let base = mesh.vertex_offset as usize;
    let idx = (mesh.index_offset + 3 * tri) as usize;
    let p0 = src.positions[base + src.indices[idx] as usize];
    let p1 = src.positions[base + src.indices[idx + 1] as usize];
    let p2 = src.positions[base + src.indices[idx + 2] as usize];
    (p0.is_finite() && p1.is_finite() && p2.is_finite())
        .then(|| (p0 + p1 + p2) / 3.0)
}

/// Emit one cell's compact meshlet: only the vertices its triangles
/// reference, in first-reference order, with indices rebased to the slice
fn extract_cell(
    src: &MeshBuffer,
    mesh: &Meshlet,
    tris: &[u32],
    has_normals: bool,
) -> LocalMesh {
    let base = mesh.vertex_offset as usize;
    let mut vmap: HashMap<u32, u32> = HashMap::new();
    let mut out = LocalMesh {
        positions: Vec::new(),
        normals: Vec::new(),
        indices: Vec::with_capacity(tris.len() * 3),
        aabb: Aabb::empty(),
    };
    for &tri in tris {
        let idx = (mesh.index_offset + 3 * tri) as usize;
        for k in 0..3 {
            let v = src.indices[idx + k];
            let local = *vmap.entry(v).or_insert_with(|| {
                let p = src.positions[base + v as usize];
                out.positions.push(p);
                if has_normals {
                    out.normals.push(src.normals[base + v as usize]);
                }
                out.aabb.expand(p);
                (out.positions.len() - 1) as u32
            });
            out.indices.push(local);
        }
    }
    out
}

fn append_cell(grid: &mut MeshGrid, coord: CellCoord, local: LocalMesh) {
    let vertex_count = local.positions.len() as u32;
    let index_count = local.indices.len() as u32;
    let vertex_offset = grid.data.alloc_vertices(vertex_count);
    let index_offset = grid.data.alloc_indices(index_count);

    let v = vertex_offset as usize;
    grid.data.positions[v..v + local.positions.len()].copy_from_slice(&local.positions);
    if !local.normals.is_empty() {
        grid.data.normals[v..v + local.normals.len()].copy_from_slice(&local.normals);
    }
    let i = index_offset as usize;
    grid.data.indices[i..i + local.indices.len()].copy_from_slice(&local.indices);

    let cell = grid.cells.len() as u32;
    grid.cell_coords.push(coord);
    grid.cells.push(Meshlet {
        index_offset,
        index_count,
        vertex_offset,
        vertex_count,
        local_aabb: local.aabb,
    });
    grid.cell_errors.push(0.0);
    grid.cell_table.insert(coord, cell);
}
