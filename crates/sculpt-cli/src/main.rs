//! sculpt CLI - edit Bezier surface files from the terminal
//!
//! A surface file is a JSON-serialized host object: its attribute
//! dictionaries hold the persisted surface and its mesh holds the last
//! committed tessellation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::path::{Path, PathBuf};

use sculpt::{
    BezierSurface, EdgeId, EditSession, InMemoryObject, PolygonMesh, Selection, SurfaceConfig,
};
use sculpt_math::{Point3, Transform};

#[derive(Parser)]
#[command(name = "sculpt")]
#[command(about = "Command-line editor for Bezier patch surfaces", long_about = None)]
struct Cli {
    /// Surface settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a surface file holding a single patch
    New {
        /// Output surface file
        file: PathBuf,
        /// Lift the interior control points into a bump
        #[arg(long)]
        wave: bool,
    },
    /// Display information about a surface file
    Info {
        /// Surface file
        file: PathBuf,
    },
    /// Extrude boundary edges, numbered as listed by `info`
    Extrude {
        /// Surface file
        file: PathBuf,
        /// Boundary edge numbers
        #[arg(required = true)]
        edges: Vec<usize>,
        /// Fuse side edges that leave a shared corner in the same direction
        #[arg(long)]
        merge: bool,
    },
    /// Set the committed mesh resolution
    Subdivs {
        /// Surface file
        file: PathBuf,
        /// Subdivisions per patch side
        subdivs: usize,
    },
    /// Export the committed mesh (format determined by extension: .obj, .stl)
    Export {
        /// Surface file
        file: PathBuf,
        /// Output mesh file
        output: PathBuf,
    },
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::New { file, wave } => new_surface(&file, config, wave)?,
        Commands::Info { file } => show_info(&file, config)?,
        Commands::Extrude { file, edges, merge } => extrude(&file, config, &edges, merge)?,
        Commands::Subdivs { file, subdivs } => set_subdivs(&file, config, subdivs)?,
        Commands::Export { file, output } => export_file(&file, &output)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SurfaceConfig> {
    let Some(path) = path else {
        return Ok(SurfaceConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(SurfaceConfig::from_toml(&text)?)
}

fn read_object(path: &Path) -> Result<InMemoryObject> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

fn write_object(path: &Path, object: &InMemoryObject) -> Result<()> {
    let json = serde_json::to_string_pretty(object)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn open_session(path: &Path, config: SurfaceConfig) -> Result<EditSession<InMemoryObject>> {
    let object = read_object(path)?;
    Ok(EditSession::open(object, config, Transform::identity())?)
}

/// Boundary edges in patch order, the numbering `info` prints.
fn boundary_edges(surface: &BezierSurface) -> Vec<EdgeId> {
    let mut all = Selection::new();
    for &patch in surface.patches() {
        all.insert(patch);
    }
    all.boundary_edges(surface.topology())
}

fn new_surface(path: &Path, config: SurfaceConfig, wave: bool) -> Result<()> {
    let points: Vec<Point3> = (0..16)
        .map(|i| {
            let (col, row) = (i % 4, i / 4);
            let interior = (1..3).contains(&col) && (1..3).contains(&row);
            let z = if wave && interior { 1.0 } else { 0.0 };
            Point3::new(col as f64, row as f64, z)
        })
        .collect();

    let mut surface = BezierSurface::new(config)?;
    surface.add_patch(&points)?;
    let session = EditSession::create(InMemoryObject::new(), surface, Transform::identity())?;
    write_object(path, session.object())?;
    println!("Created surface {}", path.display());
    Ok(())
}

fn show_info(path: &Path, config: SurfaceConfig) -> Result<()> {
    let session = open_session(path, config)?;
    let surface = session.surface();
    let topo = surface.topology();
    let object = session.object();

    println!("sculpt surface: {}", path.display());
    println!("  Patches: {}", surface.patches().len());
    println!("  Edges: {}", topo.edge_count());
    println!("  Control points: {}", topo.point_count());
    println!("  Subdivisions: {}", surface.subdivs());
    println!(
        "  Mesh: {} points, {} polygons",
        object.mesh.points.len(),
        object.mesh.polygons.len()
    );
    if !object.history.is_empty() {
        println!("  History: {}", object.history.join(", "));
    }

    println!("\nBoundary edges:");
    for (i, edge) in boundary_edges(surface).into_iter().enumerate() {
        let [a, _, _, b] = topo.edge_positions(edge, false)?;
        println!(
            "  {}: ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
            i, a.x, a.y, a.z, b.x, b.y, b.z
        );
    }
    Ok(())
}

fn extrude(path: &Path, config: SurfaceConfig, numbers: &[usize], merge: bool) -> Result<()> {
    let mut session = open_session(path, config)?;
    let boundary = boundary_edges(session.surface());
    let edges = numbers
        .iter()
        .map(|&n| match boundary.get(n) {
            Some(edge) => Ok(*edge),
            None => bail!(
                "no boundary edge {} (surface has {})",
                n,
                boundary.len()
            ),
        })
        .collect::<Result<Vec<_>>>()?;

    let created = session.extrude(&edges, merge)?;
    write_object(path, session.object())?;
    println!(
        "Extruded {} edge(s), surface now has {} patches",
        created.len(),
        session.surface().patches().len()
    );
    Ok(())
}

fn set_subdivs(path: &Path, config: SurfaceConfig, subdivs: usize) -> Result<()> {
    let mut session = open_session(path, config)?;
    session.set_subdivs(subdivs)?;
    write_object(path, session.object())?;
    println!("Set subdivisions to {}", subdivs);
    Ok(())
}

fn export_file(path: &Path, output: &Path) -> Result<()> {
    let object = read_object(path)?;
    let mesh = stored_mesh(&object)?;
    if mesh.polygon_count() == 0 {
        bail!("{} has no mesh to export", path.display());
    }

    let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_lowercase().as_str() {
        "obj" => {
            fs::write(output, export_obj(&mesh))?;
            println!("Exported OBJ to {}", output.display());
        }
        "stl" => {
            fs::write(output, export_stl_bytes(&mesh))?;
            println!("Exported STL to {}", output.display());
        }
        _ => bail!("Unknown output format: {}", ext),
    }
    Ok(())
}

/// Rebuild a polygon mesh from the object's stored copy.
fn stored_mesh(object: &InMemoryObject) -> Result<PolygonMesh> {
    let points = object
        .mesh
        .points
        .iter()
        .map(|p| Point3::new(p[0], p[1], p[2]))
        .collect();
    let mut mesh = PolygonMesh::from_points(points);
    for poly in &object.mesh.polygons {
        let polygon = match poly.as_slice() {
            [a, b, c] => sculpt::Polygon::Tri([*a, *b, *c]),
            [a, b, c, d] => sculpt::Polygon::Quad([*a, *b, *c, *d]),
            other => bail!("unsupported polygon with {} points", other.len()),
        };
        if polygon
            .indices()
            .iter()
            .any(|&i| i as usize >= mesh.point_count())
        {
            bail!("polygon refers to missing mesh point");
        }
        mesh.add_polygon(polygon);
    }
    Ok(mesh)
}

fn export_obj(mesh: &PolygonMesh) -> String {
    let mut out = String::from("# sculpt OBJ export\n");
    for p in mesh.points() {
        out.push_str(&format!("v {} {} {}\n", p.x, p.y, p.z));
    }
    for poly in mesh.polygons() {
        out.push('f');
        for i in poly.indices() {
            out.push_str(&format!(" {}", i + 1));
        }
        out.push('\n');
    }
    out
}

fn export_stl_bytes(mesh: &PolygonMesh) -> Vec<u8> {
    let triangles = mesh.triangles();
    let mut data = Vec::with_capacity(84 + triangles.len() * 50);

    // 80-byte header
    let mut header = [b' '; 80];
    let title = b"sculpt STL export";
    header[..title.len()].copy_from_slice(title);
    data.extend_from_slice(&header);
    data.extend_from_slice(&(triangles.len() as u32).to_le_bytes());

    let points = mesh.points();
    for tri in triangles {
        let [v0, v1, v2] = tri.map(|i| points[i as usize]);
        let n = (v1 - v0).cross(&(v2 - v0));
        let len = n.norm();
        let n = if len > 1e-10 {
            n / len
        } else {
            sculpt_math::Vec3::z()
        };

        for c in [n.x, n.y, n.z] {
            data.extend_from_slice(&(c as f32).to_le_bytes());
        }
        for v in [v0, v1, v2] {
            for c in [v.x, v.y, v.z] {
                data.extend_from_slice(&(c as f32).to_le_bytes());
            }
        }
        // Attribute byte count
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use sculpt::Polygon;

    fn quad_mesh() -> PolygonMesh {
        let mut mesh = PolygonMesh::new();
        for p in [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]] {
            mesh.add_point(Point3::new(p[0], p[1], 0.0));
        }
        mesh.add_polygon(Polygon::Quad([0, 1, 2, 3]));
        mesh
    }

    #[test]
    fn test_stl_layout() {
        let bytes = export_stl_bytes(&quad_mesh());
        assert_eq!(bytes.len(), 84 + 2 * 50);
        assert_eq!(u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]), 2);
        // First normal points along +z.
        let nz = f32::from_le_bytes([bytes[92], bytes[93], bytes[94], bytes[95]]);
        assert_eq!(nz, 1.0);
    }

    #[test]
    fn test_obj_is_one_based() {
        let obj = export_obj(&quad_mesh());
        assert!(obj.contains("v 1 1 0\n"));
        assert!(obj.ends_with("f 1 2 3 4\n"));
    }

    #[test]
    fn test_boundary_edge_numbering() {
        let points: Vec<Point3> = (0..16)
            .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 0.0))
            .collect();
        let mut surface = BezierSurface::new(SurfaceConfig::default()).unwrap();
        let patch = surface.add_patch(&points).unwrap();
        let edges = surface.topology().patch_edges(patch).unwrap();
        assert_eq!(boundary_edges(&surface), edges.to_vec());

        surface.extrude_edge(edges[1]).unwrap();
        let boundary = boundary_edges(&surface);
        assert_eq!(boundary.len(), 6);
        assert!(!boundary.contains(&edges[1]));
    }

    #[test]
    fn test_stored_mesh_rejects_bad_index() {
        let mut object = InMemoryObject::new();
        object.mesh.points = vec![[0.0; 3]; 3];
        object.mesh.polygons = vec![vec![0, 1, 5]];
        assert!(stored_mesh(&object).is_err());
    }
}
