//! Headless LOD grid builder
//!
//! Usage: lodgrid <mesh.obj> [max_level] [err_tol] [optimize]
//!
//! Loads a Wavefront OBJ, builds the multi-resolution meshlet grid and runs
//! one sample selection, logging per-level statistics along the way. When
//! `max_level` is omitted it is derived from the mesh index count.

use std::time::Instant;

use lodgrid::core::camera::{Camera, FovAxis};
use lodgrid::core::logging;
use lodgrid::core::types::{Result, Vec3};
use lodgrid::core::Error;
use lodgrid::grid::select::screen_kappa;
use lodgrid::grid::{MeshGrid, SelectParams, Selection};
use lodgrid::mesh::obj::load_obj;
use lodgrid::mesh::optimize::{log_statistics, optimize_mesh};
use lodgrid::mesh::utils::{compute_mesh_bounds, compute_mesh_normals};
use lodgrid::mesh::VertexAttrs;

/// Index count one cell should stay under, steering the auto level pick
const TARGET_CELL_INDEX_COUNT: u64 = 1 << 16;
const DEFAULT_ERR_TOL: f32 = 0.01;

fn main() {
    logging::init();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <mesh.obj> [max_level] [err_tol] [optimize]", args[0]);
        std::process::exit(1);
    }
    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let path = &args[1];
    match path.rsplit('.').next() {
        Some("obj") => {}
        Some(ext) => return Err(Error::UnsupportedFormat(ext.to_string())),
        None => return Err(Error::UnsupportedFormat(path.clone())),
    }

    let t = Instant::now();
    let (mut data, mesh) = load_obj(path)?;
    log::info!(
        "loaded {} triangles, {} vertices in {:.1?}",
        mesh.triangle_count(),
        mesh.vertex_count,
        t.elapsed()
    );

    if args.get(4).map(String::as_str) == Some("1") {
        log_statistics("raw", &data, &mesh);
        let t = Instant::now();
        optimize_mesh(&mut data, &mesh)?;
        log::info!("optimized mesh in {:.1?}", t.elapsed());
        log_statistics("optimized", &data, &mesh);
    }

    if !data.attrs.has(VertexAttrs::NORMAL) {
        log::info!("computing normals");
        compute_mesh_normals(&mut data, &mesh);
    }

    let bounds = compute_mesh_bounds(&data, &mesh);
    if bounds.is_empty() {
        return Err(Error::Build("mesh has no finite geometry".to_string()));
    }
    let model_center = bounds.center();
    let model_size = bounds.size().max_element();
    log::info!("model size {model_size}");

    let max_level = match args.get(2) {
        Some(arg) => arg
            .parse::<u32>()
            .map_err(|e| Error::Config(format!("max_level: {e}")))?,
        None => {
            let mut level = 0;
            while (1u64 << (2 * level + 2)) * TARGET_CELL_INDEX_COUNT
                < mesh.index_count as u64
            {
                level += 1;
                if level == 14 {
                    break;
                }
            }
            log::info!("max_level unspecified, using {level} from the index count");
            level
        }
    };
    let err_tol = match args.get(3) {
        Some(arg) => arg
            .parse::<f32>()
            .map_err(|e| Error::Config(format!("err_tol: {e}")))?,
        None => DEFAULT_ERR_TOL,
    };

    let step = model_size / (1u32 << max_level) as f32;
    let workers = std::thread::available_parallelism().map_or(8, |n| n.get());

    let t = Instant::now();
    let mut grid = MeshGrid::new(bounds.min, step, max_level + 1, err_tol)?;
    grid.build_from_mesh(&data, &mesh, workers)?;
    log::info!("built grid in {:.1?} with {workers} workers", t.elapsed());
    data.clear();

    for level in 0..grid.levels {
        log::info!(
            "level {level}: {} cells, {} triangles, {} vertices",
            grid.cell_counts[level as usize],
            grid.triangle_count_at(level),
            grid.vertex_count_at(level)
        );
    }

    // One sample selection from a camera backed off along +Z
    let mut camera = Camera::new(16.0 / 9.0, 60.0, FovAxis::Vertical);
    camera
        .set_position(model_center + 2.0 * model_size * Vec3::Z)
        .set_near(1e-4 * model_size)
        .set_far(1e3 * model_size);
    let kappa = screen_kappa(1920.0, grid.mean_relative_error, 1.0, camera.lens().fov_y);

    let t = Instant::now();
    let mut cut = Selection::default();
    grid.select_cells(
        &SelectParams {
            view_pos: camera.position(),
            kappa,
            continuous_lod: true,
            frustum_cull: true,
            pvm: Some(camera.world_to_clip()),
            ..Default::default()
        },
        &mut cut,
    );
    let drawn_triangles: u32 = cut
        .to_draw
        .iter()
        .map(|&c| grid.draw_record(c).index_count / 3)
        .sum();
    log::info!(
        "selected {} cells, {} triangles (kappa {kappa:.2}) in {:.1?}",
        cut.len(),
        drawn_triangles,
        t.elapsed()
    );
    Ok(())
}
