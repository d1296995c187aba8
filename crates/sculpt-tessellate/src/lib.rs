#![warn(missing_docs)]

//! Polygon mesh generation for Bezier patch surfaces.
//!
//! Converts patches into a host polygon mesh by:
//! 1. Transforming the patch's 16 control points into target space
//! 2. Subdividing the bicubic patch into an `(s + 1) x (s + 1)` point grid
//! 3. Emitting one quad per planar grid cell, or two triangles otherwise
//!
//! Mesh points are shared between patches by entity, not by position: grid
//! corners are keyed by their vertex and boundary samples by their edge, so
//! patches meet in the mesh only where they share a vertex or an edge in
//! the graph. A [`MeshBinding`] remembers which
//! mesh index each grid point landed on so interactive drags can push new
//! positions without rebuilding the mesh.

use std::collections::{HashMap, HashSet};

use sculpt_bezier::{BezierError, BicubicPatch, PointGrid};
use sculpt_math::{Point3, Tolerance, Transform};
use sculpt_topo::{EdgeId, PatchId, PointId, TopoError, Topology};
use thiserror::Error;

/// Errors from mesh generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TessellateError {
    /// A patch, edge or control point could not be read.
    #[error(transparent)]
    Topo(#[from] TopoError),

    /// Bezier evaluation failed (subdivision count below 1).
    #[error(transparent)]
    Bezier(#[from] BezierError),
}

/// Result alias for mesh generation.
pub type Result<T> = std::result::Result<T, TessellateError>;

/// One mesh face, as indices into [`PolygonMesh::points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polygon {
    /// Triangle.
    Tri([u32; 3]),
    /// Planar quad.
    Quad([u32; 4]),
}

impl Polygon {
    /// Point indices in winding order.
    pub fn indices(&self) -> &[u32] {
        match self {
            Polygon::Tri(i) => i,
            Polygon::Quad(i) => i,
        }
    }

    /// True for quads.
    pub fn is_quad(&self) -> bool {
        matches!(self, Polygon::Quad(_))
    }
}

/// Graph entity a shared mesh point stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKey {
    /// Grid corner sitting on a vertex.
    Vertex(PointId),
    /// Boundary sample `i` of an edge at the mesh's subdivision level,
    /// counted from the edge's first vertex. Only `1..s` occur.
    EdgeSample(EdgeId, usize),
}

/// Output polygon mesh, handed to the host for display.
#[derive(Debug, Clone, Default)]
pub struct PolygonMesh {
    points: Vec<Point3>,
    polygons: Vec<Polygon>,
    keys: HashMap<MeshKey, u32>,
}

impl PolygonMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing points, kept at their given indices.
    pub fn from_points(points: Vec<Point3>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// Append an unshared point.
    pub fn add_point(&mut self, p: Point3) -> u32 {
        self.points.push(p);
        (self.points.len() - 1) as u32
    }

    /// Add the point standing for `key`, or reuse the index it already has.
    pub fn add_keyed_point(&mut self, key: MeshKey, p: Point3) -> u32 {
        let points = &mut self.points;
        *self.keys.entry(key).or_insert_with(|| {
            points.push(p);
            (points.len() - 1) as u32
        })
    }

    /// Append a polygon.
    pub fn add_polygon(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
    }

    /// Point positions.
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Polygons.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Number of distinct points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of polygons.
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Move an existing point. Out-of-range indices are ignored.
    pub fn set_point(&mut self, index: u32, p: Point3) {
        if let Some(slot) = self.points.get_mut(index as usize) {
            *slot = p;
        }
    }

    /// Fan every polygon into triangles, for formats that need them.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let mut out = Vec::with_capacity(self.polygons.len() * 2);
        for polygon in &self.polygons {
            match *polygon {
                Polygon::Tri(t) => out.push(t),
                Polygon::Quad([a, b, c, d]) => {
                    out.push([a, b, c]);
                    out.push([a, c, d]);
                }
            }
        }
        out
    }
}

/// Evaluate a patch into its `(subdivs + 1)^2` mesh point grid.
///
/// The 16 control points are transformed before subdividing.
pub fn mesh_points(
    topo: &Topology,
    patch: PatchId,
    subdivs: usize,
    transform: &Transform,
) -> Result<PointGrid> {
    let controls = topo.control_positions(patch)?;
    Ok(BicubicPatch::new(controls)
        .transformed(transform)
        .subdivide(subdivs)?)
}

/// Share key of every boundary grid point of a patch, row-major.
///
/// Interior grid points get `None` and are never shared.
fn boundary_keys(topo: &Topology, patch: PatchId, s: usize) -> Result<Vec<Option<MeshKey>>> {
    let n = s + 1;
    let mut keys = vec![None; n * n];
    for u in topo.edge_uses(patch)? {
        let [first, _, _, last] = u.oriented_points(topo)?;
        for k in 0..=s {
            let (r, c) = match u.slot {
                0 => (0, k),
                1 => (k, s),
                2 => (s, s - k),
                _ => (s - k, 0),
            };
            keys[r * n + c] = Some(if k == 0 {
                MeshKey::Vertex(first)
            } else if k == s {
                MeshKey::Vertex(last)
            } else if u.reversed {
                MeshKey::EdgeSample(u.edge, s - k)
            } else {
                MeshKey::EdgeSample(u.edge, k)
            });
        }
    }
    Ok(keys)
}

/// Append a patch's polygons to `mesh`.
///
/// Grid points on a vertex or edge reuse the mesh index that vertex or edge
/// already has. Returns the mesh index of every grid point, row-major. Cells are walked
/// as `a (r, c)`, `b (r, c + 1)`, `c (r + 1, c + 1)`, `d (r + 1, c)`;
/// reversed patches emit the opposite winding. Non-planar cells split along
/// the `a`-`c` diagonal.
pub fn add_patch_to_mesh(
    mesh: &mut PolygonMesh,
    topo: &Topology,
    patch: PatchId,
    subdivs: usize,
    transform: &Transform,
    tolerance: &Tolerance,
) -> Result<Vec<u32>> {
    let reversed = topo.patch(patch)?.reversed();
    let grid = mesh_points(topo, patch, subdivs, transform)?;
    let keys = boundary_keys(topo, patch, subdivs)?;
    let indices: Vec<u32> = grid
        .points()
        .iter()
        .zip(keys)
        .map(|(p, key)| match key {
            Some(key) => mesh.add_keyed_point(key, *p),
            None => mesh.add_point(*p),
        })
        .collect();

    let before = mesh.polygon_count();
    for r in 0..grid.rows() - 1 {
        for c in 0..grid.cols() - 1 {
            let ia = grid.index(r, c);
            let ib = grid.index(r, c + 1);
            let ic = grid.index(r + 1, c + 1);
            let id = grid.index(r + 1, c);
            let [pa, pb, pc, pd] = [ia, ib, ic, id].map(|i| grid.points()[i]);
            let [a, b, c, d] = [ia, ib, ic, id].map(|i| indices[i]);

            if tolerance.coplanar(&pa, &pb, &pc, &pd) {
                mesh.add_polygon(if reversed {
                    Polygon::Quad([a, d, c, b])
                } else {
                    Polygon::Quad([a, b, c, d])
                });
            } else if reversed {
                mesh.add_polygon(Polygon::Tri([a, c, b]));
                mesh.add_polygon(Polygon::Tri([a, d, c]));
            } else {
                mesh.add_polygon(Polygon::Tri([a, b, c]));
                mesh.add_polygon(Polygon::Tri([a, c, d]));
            }
        }
    }
    log::trace!(
        "meshed patch {patch:?} at {subdivs} subdivs: {} polygons",
        mesh.polygon_count() - before
    );
    Ok(indices)
}

/// Grid-point-to-mesh-index map for one generated mesh.
///
/// Built alongside the mesh; lets a drag push new point positions to the
/// host as long as the mesh topology stays the same.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBinding {
    subdivs: usize,
    transform: Transform,
    by_patch: HashMap<PatchId, Vec<u32>>,
}

impl MeshBinding {
    /// Subdivision level the bound mesh was built at.
    pub fn subdivs(&self) -> usize {
        self.subdivs
    }

    /// Mesh indices of a patch's grid points, row-major.
    pub fn indices(&self, patch: PatchId) -> Option<&[u32]> {
        self.by_patch.get(&patch).map(Vec::as_slice)
    }

    /// Whether the patch is part of the bound mesh.
    pub fn contains(&self, patch: PatchId) -> bool {
        self.by_patch.contains_key(&patch)
    }

    /// New positions of every mesh point of `patches`.
    ///
    /// Patches not in the binding are skipped. A point shared by several
    /// patches is reported once.
    pub fn point_updates(&self, topo: &Topology, patches: &[PatchId]) -> Result<Vec<(u32, Point3)>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &patch in patches {
            let Some(indices) = self.by_patch.get(&patch) else {
                continue;
            };
            let grid = mesh_points(topo, patch, self.subdivs, &self.transform)?;
            for (&index, p) in indices.iter().zip(grid.points()) {
                if seen.insert(index) {
                    out.push((index, *p));
                }
            }
        }
        Ok(out)
    }
}

/// Mesh a list of patches at one subdivision level.
pub fn tessellate(
    topo: &Topology,
    patches: &[PatchId],
    subdivs: usize,
    transform: &Transform,
    tolerance: &Tolerance,
) -> Result<(PolygonMesh, MeshBinding)> {
    let mut mesh = PolygonMesh::new();
    let mut binding = MeshBinding {
        subdivs,
        transform: transform.clone(),
        by_patch: HashMap::with_capacity(patches.len()),
    };
    for &patch in patches {
        let indices = add_patch_to_mesh(&mut mesh, topo, patch, subdivs, transform, tolerance)?;
        binding.by_patch.insert(patch, indices);
    }
    Ok((mesh, binding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sculpt_math::Vec3;
    use sculpt_topo::EdgeRef;

    fn flat_points() -> Vec<Point3> {
        (0..16)
            .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 0.0))
            .collect()
    }

    fn curved_points() -> Vec<Point3> {
        let mut pts = flat_points();
        pts[5].z = 2.0;
        pts[6].z = -1.0;
        pts[10].z = 1.5;
        pts[13].z = 0.75;
        pts
    }

    #[test]
    fn test_flat_patch_meshes_to_quads() {
        let pts = flat_points();
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&pts).unwrap();

        let grid = mesh_points(&topo, patch, 4, &Transform::identity()).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (5, 5));
        assert!(grid.points().iter().all(|p| p.z == 0.0));
        assert_eq!(grid.get(0, 0), pts[0]);
        assert_eq!(grid.get(0, 4), pts[3]);
        assert_eq!(grid.get(4, 0), pts[12]);
        assert_eq!(grid.get(4, 4), pts[15]);

        let mut mesh = PolygonMesh::new();
        add_patch_to_mesh(&mut mesh, &topo, patch, 4, &Transform::identity(), &Tolerance::DEFAULT)
            .unwrap();
        assert_eq!(mesh.point_count(), 25);
        assert_eq!(mesh.polygon_count(), 16);
        assert!(mesh.polygons().iter().all(Polygon::is_quad));
    }

    #[test]
    fn test_curved_patch_polygon_bounds() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&curved_points()).unwrap();
        for s in [1, 3, 6] {
            let mut mesh = PolygonMesh::new();
            add_patch_to_mesh(&mut mesh, &topo, patch, s, &Transform::identity(), &Tolerance::DEFAULT)
                .unwrap();
            assert_eq!(mesh.point_count(), (s + 1) * (s + 1));
            assert!(mesh.polygon_count() >= s * s);
            assert!(mesh.polygon_count() <= 2 * s * s);
        }
        let mut mesh = PolygonMesh::new();
        add_patch_to_mesh(&mut mesh, &topo, patch, 6, &Transform::identity(), &Tolerance::DEFAULT)
            .unwrap();
        assert!(mesh.polygons().iter().any(|p| !p.is_quad()));
    }

    #[test]
    fn test_reversed_patch_flips_winding() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&flat_points()).unwrap();
        let (forward, _) =
            tessellate(&topo, &[patch], 1, &Transform::identity(), &Tolerance::DEFAULT).unwrap();
        topo.patch_mut(patch).unwrap().set_reversed(true);
        let (backward, _) =
            tessellate(&topo, &[patch], 1, &Transform::identity(), &Tolerance::DEFAULT).unwrap();
        assert_eq!(forward.polygons(), &[Polygon::Quad([0, 1, 3, 2])]);
        assert_eq!(backward.polygons(), &[Polygon::Quad([0, 2, 3, 1])]);
    }

    #[test]
    fn test_mesh_points_applies_transform() {
        let pts = flat_points();
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&pts).unwrap();
        let t = Transform::translation(10.0, 0.0, -2.0);
        let grid = mesh_points(&topo, patch, 3, &t).unwrap();
        assert_relative_eq!(grid.get(0, 0), Point3::new(10.0, 0.0, -2.0), epsilon = 1e-12);
        assert_relative_eq!(grid.get(3, 3), Point3::new(13.0, 3.0, -2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_subdivs_rejected() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&flat_points()).unwrap();
        let err = mesh_points(&topo, patch, 0, &Transform::identity()).unwrap_err();
        assert_eq!(err, TessellateError::Bezier(BezierError::InvalidSubdivision(0)));
    }

    #[test]
    fn test_touching_patches_without_shared_edge_stay_apart() {
        let mut topo = Topology::new();
        let left = topo.add_quad_patch(&flat_points()).unwrap();
        let shifted: Vec<Point3> = flat_points()
            .into_iter()
            .map(|p| p + Vec3::new(3.0, 0.0, 0.0))
            .collect();
        let right = topo.add_quad_patch(&shifted).unwrap();
        let (mesh, binding) = tessellate(
            &topo,
            &[left, right],
            2,
            &Transform::identity(),
            &Tolerance::DEFAULT,
        )
        .unwrap();
        assert_eq!(mesh.point_count(), 9 + 9);
        assert_eq!(mesh.polygon_count(), 8);
        assert_ne!(
            binding.indices(left).unwrap()[2],
            binding.indices(right).unwrap()[0]
        );

        // Dragging the right patch must not report the left one's points.
        let updates = binding.point_updates(&topo, &[right]).unwrap();
        let left_indices = binding.indices(left).unwrap();
        assert!(updates.iter().all(|(i, _)| !left_indices.contains(i)));
    }

    #[test]
    fn test_shared_edge_shares_points() {
        let mut topo = Topology::new();
        let left = topo.add_quad_patch(&flat_points()).unwrap();
        let uses = topo.patch(left).unwrap().as_quad().edge_refs();
        // A second patch over the same ring, walked the other way round.
        let flipped = [
            EdgeRef { edge: uses[3].edge, reversed: false },
            EdgeRef { edge: uses[2].edge, reversed: false },
            EdgeRef { edge: uses[1].edge, reversed: true },
            EdgeRef { edge: uses[0].edge, reversed: true },
        ];
        let interior = [0, 1, 2, 3].map(|_| topo.add_interior(Point3::new(1.5, 1.5, 1.0)));
        let right = topo.add_quad_patch_from(flipped, interior, false, false).unwrap();

        let s = 3;
        let (mesh, binding) =
            tessellate(&topo, &[left, right], s, &Transform::identity(), &Tolerance::DEFAULT)
                .unwrap();
        // Only the (s - 1)^2 inner grid points of the second patch are new.
        assert_eq!(mesh.point_count(), 16 + 4);
        let a = binding.indices(left).unwrap();
        let b = binding.indices(right).unwrap();
        // The second patch's grid is the first one's, transposed.
        for r in 0..=s {
            assert_eq!(b[r * (s + 1)], a[r]);
            assert_eq!(b[r], a[r * (s + 1)]);
        }
    }

    #[test]
    fn test_collapsed_side_keeps_full_grid() {
        let mut pts = flat_points();
        let first = pts[0];
        pts[1..4].fill(first);
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&pts).unwrap();
        let (mesh, _) =
            tessellate(&topo, &[patch], 4, &Transform::identity(), &Tolerance::DEFAULT).unwrap();
        assert_eq!(mesh.point_count(), 25);
    }

    #[test]
    fn test_binding_point_updates_follow_control_points() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&flat_points()).unwrap();
        let (mut mesh, binding) =
            tessellate(&topo, &[patch], 3, &Transform::identity(), &Tolerance::DEFAULT).unwrap();
        assert_eq!(binding.subdivs(), 3);

        let corner = topo.control_points(patch).unwrap().get(3, 3);
        topo.move_point(corner, Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let updates = binding.point_updates(&topo, &[patch]).unwrap();
        assert_eq!(updates.len(), 16);
        for (index, p) in &updates {
            mesh.set_point(*index, *p);
        }
        let last = binding.indices(patch).unwrap()[15];
        assert_relative_eq!(mesh.points()[last as usize].z, 1.0, epsilon = 1e-12);
        assert_eq!(mesh.polygon_count(), 9);
    }

    #[test]
    fn test_triangles_fan_quads() {
        let mut mesh = PolygonMesh::new();
        let ids = [
            mesh.add_point(Point3::new(0.0, 0.0, 0.0)),
            mesh.add_point(Point3::new(1.0, 0.0, 0.0)),
            mesh.add_point(Point3::new(1.0, 1.0, 0.0)),
            mesh.add_point(Point3::new(0.0, 1.0, 0.0)),
        ];
        mesh.add_polygon(Polygon::Quad(ids));
        mesh.add_polygon(Polygon::Tri([ids[0], ids[1], ids[2]]));
        assert_eq!(mesh.triangles(), vec![[0, 1, 2], [0, 2, 3], [0, 1, 2]]);
    }

    #[test]
    fn test_from_points_keeps_indices() {
        let p = Point3::new(2.0, 0.0, 0.0);
        let mut mesh = PolygonMesh::from_points(vec![Point3::origin(), p, p]);
        assert_eq!(mesh.point_count(), 3);
        assert_eq!(mesh.add_point(p), 3);
    }

    #[test]
    fn test_keyed_points_are_shared() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&flat_points()).unwrap();
        let corner = topo.control_points(patch).unwrap().get(0, 0);
        let edge = topo.patch_edges(patch).unwrap()[0];

        let mut mesh = PolygonMesh::new();
        let a = mesh.add_keyed_point(MeshKey::Vertex(corner), Point3::origin());
        let b = mesh.add_keyed_point(MeshKey::EdgeSample(edge, 1), Point3::origin());
        assert_ne!(a, b);
        assert_eq!(mesh.add_keyed_point(MeshKey::Vertex(corner), Point3::new(9.0, 0.0, 0.0)), a);
        assert_relative_eq!(mesh.points()[a as usize], Point3::origin());
        assert_eq!(mesh.point_count(), 2);
    }
}
