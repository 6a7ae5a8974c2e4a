use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tinobj::ObjWriter;

mod config;
mod crs;
mod error;
mod extrude;
mod features;
mod raster;
mod simplify;
mod snap;
mod terrain;

use config::ProjectConfig;
use crs::Projection;
use error::Error;
use features::{Feature, FeatureCollection, Geometry, Position};
use raster::RasterGrid;
use snap::{elevation_range, SurfaceIndex};

/// Roads sit this far above the terrain surface (meters).
const ROAD_SURFACE_LIFT: f64 = 1.0;

#[derive(Parser, Debug)]
#[command(name = "geo2obj", version)]
#[command(about = "Convert an elevation raster and vector features into 3D meshes")]
struct Args {
    /// Project configuration file (JSON).
    #[arg(long, default_value = "project.json")]
    config: PathBuf,

    /// Directory holding the project's input and output files.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the triangulated terrain surface from the elevation raster.
    Terrain {
        /// Override the configured decimation factor.
        #[arg(long)]
        skip: Option<u32>,

        /// Keep every k-th raster sample instead of bilinear resampling.
        #[arg(long, default_value_t = false)]
        nearest: bool,
    },
    /// Attach min/max surface elevations to building footprints.
    SnapBuildings,
    /// Drape road centerlines onto the terrain surface.
    SnapRoads,
    /// Extrude placed building footprints into wall and roof solids.
    Buildings,
    /// Extrude placed road centerlines into ribbon quads.
    Roads,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = ProjectConfig::load(&args.config)?;

    match args.command {
        Command::Terrain { skip, nearest } => build_terrain(&args, &config, skip, nearest),
        Command::SnapBuildings => snap_buildings(&args, &config),
        Command::SnapRoads => snap_roads(&args, &config),
        Command::Buildings => extrude_buildings(&args, &config),
        Command::Roads => extrude_roads(&args, &config),
    }
}

fn project_path(args: &Args, config: &ProjectConfig, suffix: &str, ext: &str) -> PathBuf {
    args.data_dir.join(config.file_name(suffix, ext))
}

// ---------- terrain ----------

fn build_terrain(args: &Args, config: &ProjectConfig, skip: Option<u32>, nearest: bool) -> Result<()> {
    let raster_path = project_path(args, config, "terrain", "asc");
    let grid = RasterGrid::from_ascii_grid(&raster_path)?;
    info!("Source height map: {}x{}", grid.width, grid.height);

    let k = skip.unwrap_or(config.decimation).max(1) as usize;
    let decimated = if nearest {
        grid.decimate(k)
    } else {
        // Rescale while keeping the full geographic extent of the source.
        grid.resample_bilinear(grid.width.div_ceil(k) + 1, grid.height.div_ceil(k) + 1)
    };
    info!("Rescaled to: {}x{}", decimated.width, decimated.height);

    let mesh = terrain::build_surface(&decimated, k as f64 * grid.cell_size)?;

    let out_path = project_path(args, config, "terrain", "obj");
    let mut writer = ObjWriter::create(&out_path).map_err(|e| Error::io(&out_path, e))?;
    writer
        .write_surface(&mesh)
        .map_err(|e| Error::io(&out_path, e))?;
    writer.finish().map_err(|e| Error::io(&out_path, e))?;

    info!(
        "Wrote {} vertices, {} triangles to {}",
        mesh.vertex_count(),
        mesh.triangle_count(),
        out_path.display()
    );
    Ok(())
}

fn load_surface_index(args: &Args, config: &ProjectConfig) -> Result<SurfaceIndex> {
    let mesh_path = project_path(args, config, "terrain", "obj");
    let mesh = tinobj::read_file(&mesh_path).map_err(|e| Error::io(&mesh_path, e))?;
    info!(
        "Loaded surface: {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(SurfaceIndex::new(&mesh))
}

/// Reproject a geographic ring/path into the mesh's bbox-local frame.
fn to_local(
    path: &[Position],
    projection: &Projection,
    origin: [f64; 2],
) -> Vec<[f64; 2]> {
    path.iter()
        .map(|p| {
            let [east, north] = projection.forward(p.xy());
            [east - origin[0], north - origin[1]]
        })
        .collect()
}

#[inline]
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// ---------- snapping ----------

fn snap_buildings(args: &Args, config: &ProjectConfig) -> Result<()> {
    let index = load_surface_index(args, config)?;
    let projection = crs::lookup(config.project_srid)?;
    let origin = config.origin();

    let in_path = project_path(args, config, "buildings", "geojson");
    let mut collection = FeatureCollection::load(&in_path)?;

    let mut skipped = 0usize;
    for feature in &mut collection.features {
        match snap_building(feature, &index, projection, origin) {
            Ok(()) => {}
            Err(err @ Error::Geometry(_)) => {
                warn!("Skipping building: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let out_path = project_path(args, config, "buildings-placed", "geojson");
    collection.save(&out_path)?;
    info!(
        "Placed {} buildings ({} skipped) -> {}",
        collection.features.len() - skipped,
        skipped,
        out_path.display()
    );
    Ok(())
}

fn snap_building(
    feature: &mut Feature,
    index: &SurfaceIndex,
    projection: &Projection,
    origin: [f64; 2],
) -> error::Result<()> {
    let ring = feature.geometry.outer_ring()?;
    let local = to_local(ring, projection, origin);

    // The ring is snapped as a line so elevation is also interpolated where
    // a wall segment crosses a valley between two surface triangles; using
    // only the corner elevations would leave gaps under those walls.
    let snapped = index.snap_path(&local)?;
    let (lo, hi) =
        elevation_range(&snapped).ok_or_else(|| Error::Geometry("empty footprint ring".into()))?;

    // Only the two elevation properties change; the geographic ring the
    // feature came with stays untouched.
    feature.properties.min_surface_elevation = Some(round_to(lo, 2));
    feature.properties.max_surface_elevation = Some(round_to(hi, 2));
    Ok(())
}

fn snap_roads(args: &Args, config: &ProjectConfig) -> Result<()> {
    let index = load_surface_index(args, config)?;
    let projection = crs::lookup(config.project_srid)?;
    let origin = config.origin();

    let in_path = project_path(args, config, "roads", "geojson");
    let mut collection = FeatureCollection::load(&in_path)?;

    let mut skipped = 0usize;
    for feature in &mut collection.features {
        match snap_road(feature, &index, projection, origin) {
            Ok(()) => {}
            Err(err @ Error::Geometry(_)) => {
                warn!("Skipping road: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let out_path = project_path(args, config, "roads-placed", "geojson");
    collection.save(&out_path)?;
    info!(
        "Placed {} roads ({} skipped) -> {}",
        collection.features.len() - skipped,
        skipped,
        out_path.display()
    );
    Ok(())
}

fn snap_road(
    feature: &mut Feature,
    index: &SurfaceIndex,
    projection: &Projection,
    origin: [f64; 2],
) -> error::Result<()> {
    let line = feature.geometry.line()?;
    let local = to_local(line, projection, origin);
    let snapped = index.snap_path(&local)?;

    // Back to geographic coordinates to stay interchange-compliant. Five
    // decimals is roughly one meter, which matches the mesh resolution.
    let coordinates: Vec<Position> = snapped
        .iter()
        .map(|&[x, y, z]| {
            let [lon, lat] = projection.inverse([origin[0] + x, origin[1] + y]);
            let elevation = round_to(z, 2) + ROAD_SURFACE_LIFT;
            Position::with_z(round_to(lon, 5), round_to(lat, 5), elevation)
        })
        .collect();

    // The quantization above can fold neighboring points together.
    feature.geometry = Geometry::LineString(drop_repeated(coordinates));
    Ok(())
}

/// Remove consecutive points that collapsed onto the same x/y position.
fn drop_repeated(points: Vec<Position>) -> Vec<Position> {
    let mut unique: Vec<Position> = Vec::with_capacity(points.len());
    for p in points {
        if unique
            .last()
            .is_some_and(|q| p.x == q.x && p.y == q.y)
        {
            continue;
        }
        unique.push(p);
    }
    unique
}

// ---------- extrusion ----------

fn extrude_buildings(args: &Args, config: &ProjectConfig) -> Result<()> {
    let projection = crs::lookup(config.project_srid)?;
    let origin = config.origin();

    let in_path = project_path(args, config, "buildings-placed", "geojson");
    let collection = FeatureCollection::load(&in_path)?;

    // Compute every solid first; writing happens as a single step below.
    let mut solids = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;
    for feature in &collection.features {
        match building_solid_for(feature, config, projection, origin) {
            Ok(solid) => solids.push(solid),
            Err(err @ Error::Geometry(_)) => {
                warn!("Skipping building: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let out_path = project_path(args, config, "buildings", "obj");
    write_solids(&out_path, &solids)?;
    info!(
        "Wrote {} buildings ({} skipped) to {}",
        solids.len(),
        skipped,
        out_path.display()
    );
    Ok(())
}

fn building_solid_for(
    feature: &Feature,
    config: &ProjectConfig,
    projection: &Projection,
    origin: [f64; 2],
) -> error::Result<Vec<[f64; 3]>> {
    let ring = feature.geometry.outer_ring()?;
    let local = to_local(ring, projection, origin);

    let ground = feature.properties.min_surface_elevation.ok_or_else(|| {
        Error::Geometry("missing minSurfaceElevation (run snap-buildings first)".into())
    })?;
    let surface_top = feature.properties.max_surface_elevation.ok_or_else(|| {
        Error::Geometry("missing maxSurfaceElevation (run snap-buildings first)".into())
    })?;
    let height = feature.properties.height.unwrap_or(config.building_height);

    extrude::building_solid(&local, ground, surface_top + height)
}

fn extrude_roads(args: &Args, config: &ProjectConfig) -> Result<()> {
    let projection = crs::lookup(config.project_srid)?;
    let origin = config.origin();

    let in_path = project_path(args, config, "roads-placed", "geojson");
    let collection = FeatureCollection::load(&in_path)?;

    let mut ribbons = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;
    for feature in &collection.features {
        match road_ribbon_for(feature, config, projection, origin) {
            Ok(ribbon) => ribbons.push(ribbon),
            Err(err @ Error::Geometry(_)) => {
                warn!("Skipping road: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let out_path = project_path(args, config, "roads", "obj");
    write_solids(&out_path, &ribbons)?;
    info!(
        "Wrote {} roads ({} skipped) to {}",
        ribbons.len(),
        skipped,
        out_path.display()
    );
    Ok(())
}

fn road_ribbon_for(
    feature: &Feature,
    config: &ProjectConfig,
    projection: &Projection,
    origin: [f64; 2],
) -> error::Result<Vec<[f64; 3]>> {
    let line = feature.geometry.line()?;

    let mut local = Vec::with_capacity(line.len());
    for p in line {
        let z = p
            .z
            .ok_or_else(|| Error::Geometry("road without elevations (run snap-roads first)".into()))?;
        let [east, north] = projection.forward(p.xy());
        local.push([east - origin[0], north - origin[1], z]);
    }

    let simplified = simplify::collapse_runs(&local, config.simplify_threshold);
    let width = road_width(feature, config)?;
    extrude::road_ribbon(&simplified, width)
}

/// A road's ribbon width: its own property, else the configured width for
/// its category.
fn road_width(feature: &Feature, config: &ProjectConfig) -> error::Result<f64> {
    if let Some(width) = feature.properties.width {
        return Ok(width);
    }
    feature
        .properties
        .road_type
        .as_ref()
        .and_then(|kind| config.road_widths.get(kind).copied())
        .ok_or_else(|| {
            Error::Geometry(format!(
                "no width for road type {:?}",
                feature.properties.road_type
            ))
        })
}

/// Write all solids through one running-offset writer in a single step.
fn write_solids(out_path: &Path, solids: &[Vec<[f64; 3]>]) -> Result<()> {
    let mut writer = ObjWriter::create(out_path).map_err(|e| Error::io(out_path, e))?;
    for solid in solids {
        writer
            .append_solid(solid)
            .map_err(|e| Error::io(out_path, e))?;
    }
    writer.finish().map_err(|e| Error::io(out_path, e))?;
    Ok(())
}
