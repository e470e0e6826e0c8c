//! Sparse multi-resolution meshlet grid
//!
//! The grid partitions space into an octree of cells; each occupied cell
//! stores a meshlet approximating the surface inside it. Level 0 holds the
//! exact source triangles bucketed by centroid; every coarser level merges
//! and simplifies its 2x2x2 children. All meshlet geometry lives in one
//! shared arena so the whole hierarchy uploads as four flat buffers.

pub mod coord;
pub mod table;
mod leaf;
mod parent;
pub mod select;

pub use coord::CellCoord;
pub use select::{DistanceMetric, SelectParams, Selection};
pub use table::CellTable;

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::Aabb;
use crate::mesh::utils::compute_mesh_bounds;
use crate::mesh::{MeshBuffer, Meshlet, VertexAttrs};

/// Per-cell record for issuing one indexed draw call with a base vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawRecord {
    pub index_offset: u32,
    pub index_count: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub lod: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Sparse cell table plus shared meshlet arena.
///
/// Built once by `build_from_mesh`, then immutable: selection and upload
/// only read. Cells live in parallel arrays (`cell_coords`, `cells`,
/// `cell_errors`) grouped by level via `cell_offsets` / `cell_counts`.
pub struct MeshGrid {
    /* Grid frame */
    pub base: Vec3,
    pub step: f32,
    pub levels: u32,
    pub err_tol: f32,
    /* Meshlet storage */
    pub data: MeshBuffer,
    /* Parallel arrays, one entry per cell */
    pub cell_coords: Vec<CellCoord>,
    pub cells: Vec<Meshlet>,
    pub cell_errors: Vec<f32>,
    /* Level index */
    pub cell_offsets: Vec<u32>,
    pub cell_counts: Vec<u32>,
    pub cell_table: CellTable,
    pub mean_relative_error: f32,
}

impl MeshGrid {
    /// Create an empty grid over the given frame.
    ///
    /// `base` is the world position of the corner of leaf cell (0,0,0),
    /// `step` the leaf cell edge length, `levels` the number of LOD levels
    /// and `err_tol` the relative simplification error target per level.
    pub fn new(base: Vec3, step: f32, levels: u32, err_tol: f32) -> Result<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(Error::Config(format!(
                "step must be positive and finite, got {step}"
            )));
        }
        if !(1..=15).contains(&levels) {
            return Err(Error::Config(format!(
                "levels must be in 1..=15, got {levels}"
            )));
        }
        if !err_tol.is_finite() || err_tol < 0.0 {
            return Err(Error::Config(format!(
                "err_tol must be finite and non-negative, got {err_tol}"
            )));
        }
        if !base.is_finite() {
            return Err(Error::Config(format!("base must be finite, got {base}")));
        }
        Ok(Self {
            base,
            step,
            levels,
            err_tol,
            data: MeshBuffer::new(VertexAttrs::default().with(VertexAttrs::REMAP)),
            cell_coords: Vec::new(),
            cells: Vec::new(),
            cell_errors: Vec::new(),
            cell_offsets: vec![0; levels as usize],
            cell_counts: vec![0; levels as usize],
            cell_table: CellTable::new(),
            mean_relative_error: 0.0,
        })
    }

    /// Edge length of cells at the given level
    pub fn step_at(&self, lod: i16) -> f32 {
        self.step * (1u32 << lod) as f32
    }

    /// World extent of a cell
    pub fn cell_aabb(&self, coord: CellCoord) -> Aabb {
        let edge = self.step_at(coord.lod);
        let min =
            self.base + edge * Vec3::new(coord.x as f32, coord.y as f32, coord.z as f32);
        Aabb::new(min, min + Vec3::splat(edge))
    }

    /// Leaf cell containing a point
    pub(crate) fn leaf_coord(&self, p: Vec3) -> CellCoord {
        let g = ((p - self.base) / self.step).floor();
        CellCoord::new(0, g.x as i16, g.y as i16, g.z as i16)
    }

    pub fn get_cell_index(&self, coord: CellCoord) -> Option<u32> {
        self.cell_table.lookup(coord)
    }

    pub fn get_cell(&self, coord: CellCoord) -> Option<&Meshlet> {
        self.get_cell_index(coord).map(|i| &self.cells[i as usize])
    }

    /// Present children of a coarse cell, in octant order
    pub fn get_children(&self, pcoord: CellCoord) -> [Option<u32>; 8] {
        std::array::from_fn(|o| self.get_cell_index(pcoord.child(o as u8)))
    }

    /// Range of the parallel arrays holding one level's cells
    pub fn level_range(&self, level: u32) -> std::ops::Range<usize> {
        let offset = self.cell_offsets[level as usize] as usize;
        offset..offset + self.cell_counts[level as usize] as usize
    }

    pub fn triangle_count_at(&self, level: u32) -> u32 {
        self.cells[self.level_range(level)]
            .iter()
            .map(|m| m.triangle_count())
            .sum()
    }

    pub fn vertex_count_at(&self, level: u32) -> u32 {
        self.cells[self.level_range(level)]
            .iter()
            .map(|m| m.vertex_count)
            .sum()
    }

    /// Per-cell data needed to issue one indexed draw call
    pub fn draw_record(&self, cell: u32) -> DrawRecord {
        let m = &self.cells[cell as usize];
        let c = self.cell_coords[cell as usize];
        DrawRecord {
            index_offset: m.index_offset,
            index_count: m.index_count,
            vertex_offset: m.vertex_offset,
            vertex_count: m.vertex_count,
            lod: c.lod as i32,
            x: c.x as i32,
            y: c.y as i32,
            z: c.z as i32,
        }
    }

    /// Build the full hierarchy from a source mesh: bucket triangles into
    /// leaf cells, then merge and simplify level by level.
    ///
    /// `worker_count` sizes the thread pool used for both phases; 0 uses
    /// one thread per core. Cell contents are identical for every worker
    /// count.
    pub fn build_from_mesh(
        &mut self,
        src: &MeshBuffer,
        mesh: &Meshlet,
        worker_count: usize,
    ) -> Result<()> {
        if src.attrs.has(VertexAttrs::NORMAL) {
            self.data.attrs = self.data.attrs.with(VertexAttrs::NORMAL);
        }

        let bounds = compute_mesh_bounds(src, mesh);
        if !bounds.is_empty() {
            self.check_coord_range(&bounds)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;
        pool.install(|| -> Result<()> {
            leaf::build_leaf_level(self, src, mesh)?;
            for level in 1..self.levels {
                parent::build_level(self, level)?;
            }
            Ok(())
        })?;

        self.compute_mean_relative_error();
        log::info!(
            "grid built: {} cells over {} levels, mean relative error {:.6}",
            self.cells.len(),
            self.levels,
            self.mean_relative_error
        );
        Ok(())
    }

    fn check_coord_range(&self, bounds: &Aabb) -> Result<()> {
        let lo = ((bounds.min - self.base) / self.step).floor();
        let hi = ((bounds.max - self.base) / self.step).floor();
        let min_c = lo.min_element();
        let max_c = hi.max_element();
        if min_c < i16::MIN as f32 || max_c > i16::MAX as f32 {
            return Err(Error::CoordOverflow(format!(
                "mesh extent maps to leaf coordinates [{min_c}, {max_c}], \
                 outside the 16-bit range"
            )));
        }
        Ok(())
    }

    /// Arithmetic mean over non-leaf cells of their error relative to
    /// their level's cell edge
    fn compute_mean_relative_error(&mut self) {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for level in 1..self.levels {
            let inv_step = 1.0 / self.step_at(level as i16);
            for i in self.level_range(level) {
                sum += (self.cell_errors[i] * inv_step) as f64;
                count += 1;
            }
        }
        self.mean_relative_error = if count > 0 {
            (sum / count as f64) as f32
        } else {
            0.0
        };
    }
}
