//! The editable surface: patch list, mesh regeneration and persistence.

use sculpt_ir::SurfaceDocument;
use sculpt_math::{Point3, Transform, Vec3};
use sculpt_tessellate::{tessellate, MeshBinding, PolygonMesh};
use sculpt_topo::{PatchId, PointId, Topology};

use crate::config::SurfaceConfig;
use crate::error::{PersistError, Result, SurfaceError};
use crate::host::{AttributeStore, MeshTarget};
use crate::persist;

/// Smallest accepted subdivision count.
pub const MIN_SUBDIVS: usize = 1;
/// Largest accepted subdivision count.
pub const MAX_SUBDIVS: usize = 48;

fn check_subdivs(value: usize) -> Result<()> {
    if !(MIN_SUBDIVS..=MAX_SUBDIVS).contains(&value) {
        return Err(SurfaceError::SubdivsOutOfRange {
            value,
            min: MIN_SUBDIVS,
            max: MAX_SUBDIVS,
        });
    }
    Ok(())
}

/// Where the host's view of the surface stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Graph built; no mesh produced yet.
    Loaded,
    /// Full-resolution mesh pushed and graph persisted.
    Updated,
    /// Low-resolution mesh pushed; graph not persisted.
    PreviewUpdated,
}

/// A surface of bicubic Bezier patches.
///
/// Owns the entity arena and the ordered patch list. Meshes are produced
/// on demand; the graph is written to the host object only by
/// [`BezierSurface::update`] and [`BezierSurface::persist`].
#[derive(Debug, Clone)]
pub struct BezierSurface {
    pub(crate) topo: Topology,
    pub(crate) patches: Vec<PatchId>,
    subdivs: usize,
    preview_subdivs: usize,
    pub(crate) config: SurfaceConfig,
    state: SurfaceState,
}

impl BezierSurface {
    /// Create an empty surface.
    pub fn new(config: SurfaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            topo: Topology::new(),
            patches: Vec::new(),
            subdivs: config.subdivs,
            preview_subdivs: config.preview_subdivs,
            config,
            state: SurfaceState::Loaded,
        })
    }

    /// Rebuild a surface from the attributes of `object`.
    ///
    /// Fails with [`crate::PersistError`] when the object is not a surface,
    /// its data version is unsupported, or the data is corrupt.
    pub fn load<S: AttributeStore + ?Sized>(object: &S, config: SurfaceConfig) -> Result<Self> {
        config.validate()?;
        let doc = persist::read(object).inspect_err(|e| log::warn!("surface load rejected: {e}"))?;
        let (topo, patches) =
            persist::from_document(&doc).inspect_err(|e| log::warn!("surface load rejected: {e}"))?;
        if check_subdivs(doc.subdivs).is_err() {
            let e = PersistError::Corrupt(format!("stored subdivs {} out of range", doc.subdivs));
            log::warn!("surface load rejected: {e}");
            return Err(e.into());
        }
        let subdivs = doc.subdivs;
        log::debug!(
            "loaded surface: {} patches, {} edges, {} points",
            patches.len(),
            topo.edge_count(),
            topo.point_count()
        );
        Ok(Self {
            topo,
            patches,
            subdivs,
            preview_subdivs: config.preview_subdivs,
            config,
            state: SurfaceState::Loaded,
        })
    }

    /// Replace the in-memory graph with what `object` has persisted.
    ///
    /// On failure the surface is left untouched. Every handle obtained
    /// before the reload is stale afterwards.
    pub fn reload<S: AttributeStore + ?Sized>(&mut self, object: &S) -> Result<()> {
        *self = Self::load(object, self.config.clone())?;
        Ok(())
    }

    /// The entity arena.
    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    /// Patches in surface order.
    pub fn patches(&self) -> &[PatchId] {
        &self.patches
    }

    /// Whether `patch` belongs to this surface.
    pub fn contains_patch(&self, patch: PatchId) -> bool {
        self.patches.contains(&patch)
    }

    /// Settings in use.
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// Committed mesh subdivisions.
    pub fn subdivs(&self) -> usize {
        self.subdivs
    }

    /// Set committed mesh subdivisions. Out-of-range values are rejected
    /// and the previous value kept.
    pub fn set_subdivs(&mut self, subdivs: usize) -> Result<()> {
        check_subdivs(subdivs)?;
        self.subdivs = subdivs;
        Ok(())
    }

    /// Drag preview subdivisions.
    pub fn preview_subdivs(&self) -> usize {
        self.preview_subdivs
    }

    /// Set drag preview subdivisions, same range as [`Self::set_subdivs`].
    pub fn set_preview_subdivs(&mut self, subdivs: usize) -> Result<()> {
        check_subdivs(subdivs)?;
        self.preview_subdivs = subdivs;
        Ok(())
    }

    /// Add a patch from 16 row-major control positions.
    pub fn add_patch(&mut self, positions: &[Point3]) -> Result<PatchId> {
        let patch = self.topo.add_quad_patch(positions)?;
        self.patches.push(patch);
        Ok(patch)
    }

    /// Move control points by `delta` and re-derive automatic interiors.
    pub fn move_points(&mut self, points: &[PointId], delta: Vec3) -> Result<()> {
        for &p in points {
            self.topo.move_point(p, delta)?;
        }
        self.refresh_automatic(points)
    }

    /// Set one control point's position and re-derive automatic interiors.
    pub fn set_point_position(&mut self, point: PointId, position: Point3) -> Result<()> {
        self.topo.set_position(point, position)?;
        self.refresh_automatic(&[point])
    }

    /// Patches touching any of `points`, in surface order.
    pub fn patches_at(&self, points: &[PointId]) -> Result<Vec<PatchId>> {
        let mut touched = Vec::new();
        for &p in points {
            for patch in self.topo.links(p)?.patches() {
                if !touched.contains(&patch) {
                    touched.push(patch);
                }
            }
        }
        Ok(self
            .patches
            .iter()
            .copied()
            .filter(|p| touched.contains(p))
            .collect())
    }

    pub(crate) fn refresh_automatic(&mut self, points: &[PointId]) -> Result<()> {
        for patch in self.patches_at(points)? {
            self.topo.refresh_interior(patch)?;
        }
        Ok(())
    }

    /// Mesh every patch at `subdivs`.
    pub fn mesh(&self, transform: &Transform, subdivs: usize) -> Result<(PolygonMesh, MeshBinding)> {
        check_subdivs(subdivs)?;
        Ok(tessellate(
            &self.topo,
            &self.patches,
            subdivs,
            transform,
            &self.config.mesh_tolerance(),
        )?)
    }

    /// Flatten the graph into a document.
    pub fn to_document(&self) -> Result<SurfaceDocument> {
        Ok(persist::to_document(&self.topo, &self.patches, self.subdivs)?)
    }

    /// Write the graph to `object`'s attributes.
    pub fn persist<S: AttributeStore + ?Sized>(&self, object: &mut S) -> Result<()> {
        let doc = self.to_document()?;
        persist::write(object, &doc)?;
        Ok(())
    }

    /// Rebuild the mesh at full resolution and persist the graph.
    pub fn update<O>(&mut self, object: &mut O, transform: &Transform) -> Result<MeshBinding>
    where
        O: AttributeStore + MeshTarget + ?Sized,
    {
        let (mesh, binding) = self.mesh(transform, self.subdivs)?;
        let doc = self.to_document()?;
        object.replace_mesh(&mesh);
        persist::write(object, &doc)?;
        self.state = SurfaceState::Updated;
        log::debug!(
            "updated surface: {} patches at {} subdivs, {} polygons",
            self.patches.len(),
            self.subdivs,
            mesh.polygon_count()
        );
        Ok(binding)
    }

    /// Rebuild the mesh at `subdivs` without persisting.
    pub fn preview<O>(
        &mut self,
        object: &mut O,
        transform: &Transform,
        subdivs: usize,
    ) -> Result<MeshBinding>
    where
        O: MeshTarget + ?Sized,
    {
        let (mesh, binding) = self.mesh(transform, subdivs)?;
        object.replace_mesh(&mesh);
        self.state = SurfaceState::PreviewUpdated;
        log::debug!(
            "preview mesh: {} patches at {subdivs} subdivs",
            self.patches.len()
        );
        Ok(binding)
    }
}
