//! View-dependent cell selection
//!
//! Each frame, a depth-first traversal from the top level picks the cut of
//! cells whose projected simplification error stays below the caller's
//! tolerance, optionally pruning subtrees outside the view frustum. The
//! traversal is stateless and reads only immutable grid data.

use crate::core::types::{Mat4, Vec3};
use crate::math::{Frustum, Visibility};
use super::coord::CellCoord;
use super::MeshGrid;

/// Distance metric used by the view-ratio estimate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Chebyshev distance to the cell box (the default)
    #[default]
    Linf,
    /// Euclidean distance to the cell box
    L2,
}

/// Per-frame selection inputs
#[derive(Clone, Copy, Debug)]
pub struct SelectParams {
    /// View position in world coordinates
    pub view_pos: Vec3,
    /// Error multiplier: a cell is drawn without refinement when
    /// `error * view_ratio * kappa < 1`
    pub kappa: f32,
    /// Record each drawn cell's parent for seam blending
    pub continuous_lod: bool,
    /// Prune subtrees whose cells fall outside the frustum of `pvm`
    pub frustum_cull: bool,
    pub pvm: Option<Mat4>,
    pub metric: DistanceMetric,
}

impl Default for SelectParams {
    fn default() -> Self {
        Self {
            view_pos: Vec3::ZERO,
            kappa: 1.0,
            continuous_lod: false,
            frustum_cull: false,
            pvm: None,
            metric: DistanceMetric::Linf,
        }
    }
}

/// Output cut: parallel arrays of drawn cell indices and the cells whose
/// vertex streams supply the blend parents. Buffers are reused across
/// frames; `parents[i] == to_draw[i]` when no parent is involved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub to_draw: Vec<u32>,
    pub parents: Vec<u32>,
}

impl Selection {
    pub fn clear(&mut self) {
        self.to_draw.clear();
        self.parents.clear();
    }

    pub fn len(&self) -> usize {
        self.to_draw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_draw.is_empty()
    }
}

/// Selection multiplier matching a pixel-space error tolerance: a screen
/// `screen_width` pixels wide with vertical fov `fov_y` (radians) keeps the
/// projected error of every drawn cell under `pixel_error` pixels.
pub fn screen_kappa(
    screen_width: f32,
    mean_relative_error: f32,
    pixel_error: f32,
    fov_y: f32,
) -> f32 {
    screen_width * mean_relative_error / (pixel_error * (fov_y * 0.5).tan())
}

/// View-ratio variants, monomorphized into the traversal
trait ViewRatio {
    fn ratio(grid: &MeshGrid, vp: Vec3, coord: CellCoord) -> f32;
}

struct RatioDinf;

impl ViewRatio for RatioDinf {
    fn ratio(grid: &MeshGrid, vp: Vec3, coord: CellCoord) -> f32 {
        let d = grid.cell_aabb(coord).distance_linf(vp);
        1.0 / d.max(grid.step_at(coord.lod))
    }
}

struct RatioD2;

impl ViewRatio for RatioD2 {
    fn ratio(grid: &MeshGrid, vp: Vec3, coord: CellCoord) -> f32 {
        let d = grid.cell_aabb(coord).distance_sq(vp).sqrt();
        1.0 / d.max(grid.step_at(coord.lod))
    }
}

impl MeshGrid {
    /// Select the cut of cells to draw for the given view.
    ///
    /// Degenerate inputs are clamped rather than rejected: a non-finite
    /// view position falls back to the origin, a NaN multiplier to 0, and
    /// a non-finite PVM disables culling. The call always produces a cut
    /// (possibly empty).
    pub fn select_cells(&self, params: &SelectParams, out: &mut Selection) {
        out.clear();
        if self.cells.is_empty() {
            return;
        }
        let vp = if params.view_pos.is_finite() {
            params.view_pos
        } else {
            Vec3::ZERO
        };
        let kappa = if params.kappa.is_nan() {
            0.0
        } else {
            params.kappa.max(0.0)
        };
        let frustum = if params.frustum_cull {
            params
                .pvm
                .filter(|m| m.is_finite())
                .map(|m| Frustum::from_matrix(&m))
        } else {
            None
        };

        match params.metric {
            DistanceMetric::Linf => {
                self.traverse::<RatioDinf>(vp, kappa, params.continuous_lod, frustum.as_ref(), out)
            }
            DistanceMetric::L2 => {
                self.traverse::<RatioD2>(vp, kappa, params.continuous_lod, frustum.as_ref(), out)
            }
        }
    }

    fn traverse<R: ViewRatio>(
        &self,
        vp: Vec3,
        kappa: f32,
        continuous_lod: bool,
        frustum: Option<&Frustum>,
        out: &mut Selection,
    ) {
        for i in self.level_range(self.levels - 1) {
            self.visit::<R>(i as u32, vp, kappa, continuous_lod, frustum, out);
        }
    }

    fn visit<R: ViewRatio>(
        &self,
        cell: u32,
        vp: Vec3,
        kappa: f32,
        continuous_lod: bool,
        frustum: Option<&Frustum>,
        out: &mut Selection,
    ) {
        let coord = self.cell_coords[cell as usize];
        if let Some(f) = frustum {
            if f.visibility(&self.cell_aabb(coord)) == Visibility::Outside {
                return;
            }
        }
        if !self.cell_is_acceptable::<R>(cell, vp, kappa) {
            let children = self.get_children(coord);
            if children.iter().any(|c| c.is_some()) {
                for child in children.into_iter().flatten() {
                    self.visit::<R>(child, vp, kappa, continuous_lod, frustum, out);
                }
                return;
            }
        }
        out.to_draw.push(cell);
        let parent = if continuous_lod {
            self.get_cell_index(coord.parent()).unwrap_or(cell)
        } else {
            cell
        };
        out.parents.push(parent);
    }

    fn cell_is_acceptable<R: ViewRatio>(&self, cell: u32, vp: Vec3, kappa: f32) -> bool {
        let coord = self.cell_coords[cell as usize];
        if coord.lod == 0 {
            return true;
        }
        self.cell_errors[cell as usize] * R::ratio(self, vp, coord) * kappa < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec4;
    use crate::mesh::{primitives, MeshBuffer, VertexAttrs};

    fn build_sphere_grid(levels: u32) -> MeshGrid {
        let mut buf = MeshBuffer::new(VertexAttrs::default());
        let mesh = primitives::uv_sphere(&mut buf, Vec3::splat(0.5), 0.45, 24, 32);
        let mut grid =
            MeshGrid::new(Vec3::ZERO, 1.0 / (1 << (levels - 1)) as f32, levels, 0.01).unwrap();
        grid.build_from_mesh(&buf, &mesh, 1).unwrap();
        grid
    }

    #[test]
    fn test_zero_kappa_selects_top_level() {
        let grid = build_sphere_grid(3);
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::new(0.0, 0.0, 10.0),
                kappa: 0.0,
                ..Default::default()
            },
            &mut sel,
        );
        assert_eq!(sel.len() as u32, grid.cell_counts[2]);
        for &i in &sel.to_draw {
            assert_eq!(grid.cell_coords[i as usize].lod, 2);
        }
    }

    #[test]
    fn test_infinite_kappa_selects_leaves() {
        let grid = build_sphere_grid(3);
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::new(0.0, 0.0, 10.0),
                kappa: f32::INFINITY,
                ..Default::default()
            },
            &mut sel,
        );
        assert_eq!(sel.len() as u32, grid.cell_counts[0]);
        for &i in &sel.to_draw {
            assert_eq!(grid.cell_coords[i as usize].lod, 0);
        }
    }

    #[test]
    fn test_selection_bound_holds() {
        let grid = build_sphere_grid(3);
        let vp = Vec3::new(2.0, 1.0, 3.0);
        let kappa = 50.0;
        for metric in [DistanceMetric::Linf, DistanceMetric::L2] {
            let mut sel = Selection::default();
            grid.select_cells(
                &SelectParams {
                    view_pos: vp,
                    kappa,
                    metric,
                    ..Default::default()
                },
                &mut sel,
            );
            assert!(!sel.is_empty());
            for &i in &sel.to_draw {
                let coord = grid.cell_coords[i as usize];
                if coord.lod > 0 {
                    let aabb = grid.cell_aabb(coord);
                    let d = match metric {
                        DistanceMetric::Linf => aabb.distance_linf(vp),
                        DistanceMetric::L2 => aabb.distance_sq(vp).sqrt(),
                    };
                    let ratio = 1.0 / d.max(grid.step_at(coord.lod));
                    assert!(grid.cell_errors[i as usize] * ratio * kappa < 1.0);
                }
            }
        }
    }

    #[test]
    fn test_cut_is_an_antichain() {
        let grid = build_sphere_grid(3);
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::new(0.6, 0.5, 0.5),
                kappa: 100.0,
                ..Default::default()
            },
            &mut sel,
        );
        let drawn: std::collections::HashSet<u32> = sel.to_draw.iter().copied().collect();
        assert_eq!(drawn.len(), sel.len());
        for &i in &sel.to_draw {
            let mut coord = grid.cell_coords[i as usize];
            while (coord.lod as u32) < grid.levels - 1 {
                coord = coord.parent();
                if let Some(a) = grid.get_cell_index(coord) {
                    assert!(!drawn.contains(&a), "ancestor drawn alongside descendant");
                }
            }
        }
    }

    #[test]
    fn test_selection_is_idempotent() {
        let grid = build_sphere_grid(3);
        let params = SelectParams {
            view_pos: Vec3::new(1.0, 0.5, 0.5),
            kappa: 20.0,
            continuous_lod: true,
            ..Default::default()
        };
        let mut a = Selection::default();
        let mut b = Selection::default();
        grid.select_cells(&params, &mut a);
        grid.select_cells(&params, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_continuous_lod_records_parents() {
        let grid = build_sphere_grid(3);
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::new(0.5, 0.5, 2.0),
                kappa: 30.0,
                continuous_lod: true,
                ..Default::default()
            },
            &mut sel,
        );
        for (&cell, &parent) in sel.to_draw.iter().zip(&sel.parents) {
            let coord = grid.cell_coords[cell as usize];
            if parent == cell {
                assert_eq!(grid.get_cell_index(coord.parent()), None);
            } else {
                assert_eq!(grid.cell_coords[parent as usize], coord.parent());
            }
        }

        let mut flat = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::new(0.5, 0.5, 2.0),
                kappa: 30.0,
                continuous_lod: false,
                ..Default::default()
            },
            &mut flat,
        );
        assert_eq!(flat.to_draw, flat.parents);
    }

    #[test]
    fn test_distant_view_stays_coarse() {
        // From far away with a unit multiplier the top level is enough
        let grid = build_sphere_grid(2);
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::new(0.0, 0.0, 10.0),
                kappa: 1.0,
                ..Default::default()
            },
            &mut sel,
        );
        assert!(!sel.is_empty());
        for &i in &sel.to_draw {
            assert_eq!(grid.cell_coords[i as usize].lod as u32, grid.levels - 1);
        }
    }

    #[test]
    fn test_camera_looking_away_yields_empty_cut() {
        use crate::core::camera::{Camera, FovAxis};

        let grid = build_sphere_grid(3);
        // Model sits around (0.5, 0.5, 0.5); the camera faces -Z with the
        // model behind it
        let mut camera = Camera::new(1.0, 60.0, FovAxis::Vertical);
        camera.set_position(Vec3::new(0.5, 0.5, -5.0));
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: camera.position(),
                kappa: 1.0,
                frustum_cull: true,
                pvm: Some(camera.world_to_clip()),
                ..Default::default()
            },
            &mut sel,
        );
        assert!(sel.is_empty());
    }

    #[test]
    fn test_frustum_soundness() {
        use crate::core::camera::{Camera, FovAxis};
        use crate::math::{Frustum, Visibility};

        let grid = build_sphere_grid(3);
        let mut camera = Camera::new(1.0, 60.0, FovAxis::Vertical);
        camera.set_position(Vec3::new(0.5, 0.5, 4.0));
        let pvm = camera.world_to_clip();
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: camera.position(),
                kappa: 50.0,
                frustum_cull: true,
                pvm: Some(pvm),
                ..Default::default()
            },
            &mut sel,
        );
        assert!(!sel.is_empty());
        let frustum = Frustum::from_matrix(&pvm);
        for &i in &sel.to_draw {
            let aabb = grid.cell_aabb(grid.cell_coords[i as usize]);
            assert_ne!(frustum.visibility(&aabb), Visibility::Outside);
        }
    }

    #[test]
    fn test_degenerate_inputs_do_not_panic() {
        let grid = build_sphere_grid(2);
        let mut sel = Selection::default();
        grid.select_cells(
            &SelectParams {
                view_pos: Vec3::splat(f32::NAN),
                kappa: f32::NAN,
                frustum_cull: true,
                pvm: Some(Mat4::from_cols(
                    Vec4::splat(f32::NAN),
                    Vec4::splat(f32::NAN),
                    Vec4::splat(f32::NAN),
                    Vec4::splat(f32::NAN),
                )),
                ..Default::default()
            },
            &mut sel,
        );
        // NaN inputs clamp to a coarse full cut rather than faulting
        assert_eq!(sel.len() as u32, grid.cell_counts[grid.levels as usize - 1]);
    }

    #[test]
    fn test_screen_kappa_formula() {
        let k = screen_kappa(1920.0, 0.002, 1.0, 60.0_f32.to_radians());
        assert!((k - 1920.0 * 0.002 / (60.0_f32.to_radians() * 0.5).tan()).abs() < 1e-3);
        // Tighter pixel tolerance demands a larger multiplier
        assert!(screen_kappa(1920.0, 0.002, 0.5, 1.0) > k);
    }
}
