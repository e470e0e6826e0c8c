//! Coarse-level build: stitch, simplify and remap sibling meshlets
//!
//! Every coarse cell with at least one present child is built by welding
//! the child meshlets into one temporary mesh, decimating it toward a
//! quarter of the stitched index count, then recording for each child
//! vertex the closest surviving parent vertex. Locked borders keep the
//! seams shared with sibling parents watertight.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::core::types::{Result, Vec3};
use crate::math::Aabb;
use crate::mesh::optimize::position_adapter;
use crate::mesh::{Meshlet, VertexAttrs};
use super::coord::CellCoord;
use super::MeshGrid;

/// Fraction of the parent cell edge within which seam vertices weld
const WELD_RATIO: f32 = 1e-5;

struct ParentCell {
    coord: CellCoord,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    aabb: Aabb,
    error: f32,
    /// Parent-local remap for each child cell's vertex slice
    child_remaps: Vec<(u32, Vec<u32>)>,
}

pub(super) fn build_level(grid: &mut MeshGrid, level: u32) -> Result<()> {
    grid.cell_offsets[level as usize] = grid.cells.len() as u32;

    let prev = grid.level_range(level - 1);
    let mut coords: Vec<CellCoord> = grid.cell_coords[prev].iter().map(|c| c.parent()).collect();
    coords.sort_unstable_by_key(|c| c.key());
    coords.dedup();

    let built: Vec<Result<ParentCell>> = {
        let g: &MeshGrid = grid;
        coords
            .into_par_iter()
            .map(|coord| build_parent_cell(g, coord))
            .collect()
    };

    for cell in built {
        append_cell(grid, cell?);
    }
    grid.cell_counts[level as usize] = grid.cells.len() as u32 - grid.cell_offsets[level as usize];
    log::debug!(
        "level {level} build: {} cells, {} triangles",
        grid.cell_counts[level as usize],
        grid.triangle_count_at(level)
    );
    Ok(())
}

fn quantize(p: Vec3, inv_tol: f32) -> (i64, i64, i64) {
    (
        (p.x * inv_tol).round() as i64,
        (p.y * inv_tol).round() as i64,
        (p.z * inv_tol).round() as i64,
    )
}

fn build_parent_cell(grid: &MeshGrid, coord: CellCoord) -> Result<ParentCell> {
    let weld_tol = WELD_RATIO * grid.step_at(coord.lod);
    let inv_tol = 1.0 / weld_tol;
    let has_normals = grid.data.attrs.has(VertexAttrs::NORMAL);

    // Stitch the children into one index space, welding seam duplicates
    let mut weld: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut children: Vec<u32> = Vec::new();
    let mut max_child_error = 0.0f32;

    for child in grid.get_children(coord).into_iter().flatten() {
        let m = grid.cells[child as usize];
        max_child_error = max_child_error.max(grid.cell_errors[child as usize]);
        let base = m.vertex_offset as usize;
        let vmap: Vec<u32> = (0..m.vertex_count as usize)
            .map(|v| {
                let p = grid.data.positions[base + v];
                *weld.entry(quantize(p, inv_tol)).or_insert_with(|| {
                    positions.push(p);
                    if has_normals {
                        normals.push(grid.data.normals[base + v]);
                    }
                    (positions.len() - 1) as u32
                })
            })
            .collect();
        let i0 = m.index_offset as usize;
        for &i in &grid.data.indices[i0..i0 + m.index_count as usize] {
            indices.push(vmap[i as usize]);
        }
        children.push(child);
    }

    // Decimate toward a quarter of the stitched index count. Border
    // vertices (the open seams shared with sibling parents) are locked so
    // adjacent parent cells keep matching edges.
    let adapter = position_adapter(&positions)?;
    let target_index_count = ((indices.len() / 12) * 3).max(3);
    let mut relative_error = 0.0f32;
    let simplified = meshopt::simplify(
        &indices,
        &adapter,
        target_index_count,
        grid.err_tol,
        meshopt::SimplifyOptions::LockBorder,
        Some(&mut relative_error),
    );
    let simplified = if simplified.is_empty() { indices } else { simplified };
    let error = (relative_error * meshopt::simplify_scale(&adapter)).max(max_child_error);

    // Compact to the surviving vertices, first-reference order
    let mut used: HashMap<u32, u32> = HashMap::new();
    let mut out_positions: Vec<Vec3> = Vec::new();
    let mut out_normals: Vec<Vec3> = Vec::new();
    let mut out_indices: Vec<u32> = Vec::with_capacity(simplified.len());
    let mut aabb = Aabb::empty();
    for &i in &simplified {
        let local = *used.entry(i).or_insert_with(|| {
            let p = positions[i as usize];
            out_positions.push(p);
            if has_normals {
                out_normals.push(normals[i as usize]);
            }
            aabb.expand(p);
            (out_positions.len() - 1) as u32
        });
        out_indices.push(local);
    }

    // Remap every child vertex to its closest parent vertex; vertices that
    // survived match exactly through the weld quantization
    let mut exact: HashMap<(i64, i64, i64), u32> = HashMap::new();
    for (i, &p) in out_positions.iter().enumerate() {
        exact.entry(quantize(p, inv_tol)).or_insert(i as u32);
    }
    let bins = VertexBins::new(&out_positions);
    let child_remaps = children
        .iter()
        .map(|&child| {
            let m = grid.cells[child as usize];
            let base = m.vertex_offset as usize;
            let remap = (0..m.vertex_count as usize)
                .map(|v| {
                    let p = grid.data.positions[base + v];
                    match exact.get(&quantize(p, inv_tol)) {
                        Some(&parent_vertex) => parent_vertex,
                        None => bins.nearest(p),
                    }
                })
                .collect();
            (child, remap)
        })
        .collect();

    Ok(ParentCell {
        coord,
        positions: out_positions,
        normals: out_normals,
        indices: out_indices,
        aabb,
        error,
        child_remaps,
    })
}

fn append_cell(grid: &mut MeshGrid, cell: ParentCell) {
    let vertex_count = cell.positions.len() as u32;
    let index_count = cell.indices.len() as u32;
    let vertex_offset = grid.data.alloc_vertices(vertex_count);
    let index_offset = grid.data.alloc_indices(index_count);

    let v = vertex_offset as usize;
    grid.data.positions[v..v + cell.positions.len()].copy_from_slice(&cell.positions);
    if !cell.normals.is_empty() {
        grid.data.normals[v..v + cell.normals.len()].copy_from_slice(&cell.normals);
    }
    let i = index_offset as usize;
    grid.data.indices[i..i + cell.indices.len()].copy_from_slice(&cell.indices);

    let idx = grid.cells.len() as u32;
    grid.cell_coords.push(cell.coord);
    grid.cells.push(Meshlet {
        index_offset,
        index_count,
        vertex_offset,
        vertex_count,
        local_aabb: cell.aabb,
    });
    grid.cell_errors.push(cell.error);
    grid.cell_table.insert(cell.coord, idx);

    for (child, remap) in cell.child_remaps {
        let m = grid.cells[child as usize];
        let base = m.vertex_offset as usize;
        grid.data.remap[base..base + remap.len()].copy_from_slice(&remap);
    }
}

/// Uniform bins over a vertex set for nearest-vertex queries
struct VertexBins<'a> {
    verts: &'a [Vec3],
    origin: Vec3,
    cell: f32,
    inv_cell: f32,
    dims: [i32; 3],
    bins: Vec<Vec<u32>>,
}

impl<'a> VertexBins<'a> {
    fn new(verts: &'a [Vec3]) -> Self {
        let mut aabb = Aabb::empty();
        for &p in verts {
            aabb.expand(p);
        }
        let res = ((verts.len() as f32).cbrt().ceil() as i32).clamp(1, 16);
        let cell = (aabb.size().max_element() / res as f32).max(1e-12);
        let inv_cell = 1.0 / cell;
        let dims = [
            ((aabb.size().x * inv_cell).floor() as i32 + 1).max(1),
            ((aabb.size().y * inv_cell).floor() as i32 + 1).max(1),
            ((aabb.size().z * inv_cell).floor() as i32 + 1).max(1),
        ];
        let mut bins = vec![Vec::new(); (dims[0] * dims[1] * dims[2]) as usize];
        let origin = aabb.min;
        for (i, &p) in verts.iter().enumerate() {
            let b = Self::bin_of(origin, inv_cell, dims, p);
            bins[Self::flat(dims, b)].push(i as u32);
        }
        Self {
            verts,
            origin,
            cell,
            inv_cell,
            dims,
            bins,
        }
    }

    fn bin_of(origin: Vec3, inv_cell: f32, dims: [i32; 3], p: Vec3) -> [i32; 3] {
        let g = (p - origin) * inv_cell;
        [
            (g.x.floor() as i32).clamp(0, dims[0] - 1),
            (g.y.floor() as i32).clamp(0, dims[1] - 1),
            (g.z.floor() as i32).clamp(0, dims[2] - 1),
        ]
    }

    fn flat(dims: [i32; 3], b: [i32; 3]) -> usize {
        ((b[2] * dims[1] + b[1]) * dims[0] + b[0]) as usize
    }

    /// Index of the vertex closest to `p`; ties resolve to the lowest index
    fn nearest(&self, p: Vec3) -> u32 {
        let center = Self::bin_of(self.origin, self.inv_cell, self.dims, p);
        let max_ring = self.dims.iter().max().copied().unwrap_or(1);
        let mut best_d2 = f32::MAX;
        let mut best = u32::MAX;

        for ring in 0..=max_ring {
            // Any vertex in a farther ring is at least (ring - 1) cells away
            if best != u32::MAX && best_d2.sqrt() <= (ring - 1).max(0) as f32 * self.cell {
                break;
            }
            for bz in (center[2] - ring).max(0)..=(center[2] + ring).min(self.dims[2] - 1) {
                for by in (center[1] - ring).max(0)..=(center[1] + ring).min(self.dims[1] - 1) {
                    for bx in (center[0] - ring).max(0)..=(center[0] + ring).min(self.dims[0] - 1)
                    {
                        let on_ring = (bx - center[0]).abs() == ring
                            || (by - center[1]).abs() == ring
                            || (bz - center[2]).abs() == ring;
                        if !on_ring && ring > 0 {
                            continue;
                        }
                        for &v in &self.bins[Self::flat(self.dims, [bx, by, bz])] {
                            let d2 = (self.verts[v as usize] - p).length_squared();
                            if d2 < best_d2 || (d2 == best_d2 && v < best) {
                                best_d2 = d2;
                                best = v;
                            }
                        }
                    }
                }
            }
        }
        best
    }
}
