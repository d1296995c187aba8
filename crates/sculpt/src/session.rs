//! One editing session on one host object.
//!
//! [`EditSession`] ties a [`BezierSurface`] to the object it is stored on
//! and brackets each edit in a host operation. Drags mesh at preview
//! resolution and only push moved mesh points; everything else rebuilds
//! the full mesh and persists.

use sculpt_math::{Point3, Transform, Vec3};
use sculpt_tessellate::MeshBinding;
use sculpt_topo::{EdgeId, PatchId, PointId};

use crate::config::SurfaceConfig;
use crate::error::{Result, SurfaceError};
use crate::host::ModelObject;
use crate::selection::Selection;
use crate::surface::BezierSurface;

const OP_CREATE: &str = "Create Surface";
const OP_ADD_PATCH: &str = "Add Patch";
const OP_MOVE: &str = "Move Control Points";
const OP_EXTRUDE: &str = "Extrude Edges";
const OP_SUBDIVS: &str = "Set Subdivisions";

#[derive(Debug)]
struct DragState {
    points: Vec<PointId>,
    start: Vec<Point3>,
    patches: Vec<PatchId>,
    binding: MeshBinding,
}

/// A surface being edited on a host object.
#[derive(Debug)]
pub struct EditSession<O: ModelObject> {
    object: O,
    surface: BezierSurface,
    transform: Transform,
    selection: Selection,
    drag: Option<DragState>,
}

impl<O: ModelObject> EditSession<O> {
    /// Open the surface already stored on `object`.
    pub fn open(object: O, config: SurfaceConfig, transform: Transform) -> Result<Self> {
        let surface = BezierSurface::load(&object, config)?;
        Ok(Self {
            object,
            surface,
            transform,
            selection: Selection::new(),
            drag: None,
        })
    }

    /// Store `surface` on `object` and start editing it.
    pub fn create(object: O, surface: BezierSurface, transform: Transform) -> Result<Self> {
        let mut session = Self {
            object,
            surface,
            transform,
            selection: Selection::new(),
            drag: None,
        };
        session.commit(OP_CREATE, |_| Ok(()))?;
        Ok(session)
    }

    /// The host object.
    pub fn object(&self) -> &O {
        &self.object
    }

    /// End the session, handing back the object.
    pub fn into_object(self) -> O {
        self.object
    }

    /// The surface being edited.
    pub fn surface(&self) -> &BezierSurface {
        &self.surface
    }

    /// Object-to-world transform applied to generated meshes.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Current selection, for editing.
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// Whether a drag is active.
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.drag.is_some() {
            return Err(SurfaceError::DragInProgress);
        }
        Ok(())
    }

    /// Run `edit` inside a host operation, then rebuild and persist.
    ///
    /// If either step fails the operation is aborted and the surface is
    /// reloaded from what the object last persisted, which also clears the
    /// selection.
    fn commit<T>(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut BezierSurface) -> Result<T>,
    ) -> Result<T> {
        self.object.begin_operation(name);
        let result = edit(&mut self.surface).and_then(|value| {
            self.surface.update(&mut self.object, &self.transform)?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                self.object.commit_operation();
                Ok(value)
            }
            Err(e) => {
                self.object.abort_operation();
                if let Err(reload) = self.surface.reload(&self.object) {
                    log::warn!("{name} failed and the surface could not be reloaded: {reload}");
                }
                self.selection.clear();
                Err(e)
            }
        }
    }

    /// Add a patch from 16 row-major control positions.
    pub fn add_patch(&mut self, positions: &[Point3]) -> Result<PatchId> {
        self.ensure_idle()?;
        self.commit(OP_ADD_PATCH, |surface| surface.add_patch(positions))
    }

    /// Extrude edges and select the new patches.
    pub fn extrude(&mut self, edges: &[EdgeId], merge: bool) -> Result<Vec<PatchId>> {
        self.ensure_idle()?;
        let created = self.commit(OP_EXTRUDE, |surface| surface.extrude_edges(edges, merge))?;
        self.selection.clear();
        for &patch in &created {
            self.selection.insert(patch);
        }
        Ok(created)
    }

    /// Change the committed mesh resolution.
    pub fn set_subdivs(&mut self, subdivs: usize) -> Result<()> {
        self.ensure_idle()?;
        self.commit(OP_SUBDIVS, |surface| surface.set_subdivs(subdivs))
    }

    /// Start dragging the selected control points.
    ///
    /// Opens a host operation and swaps in a preview-resolution mesh.
    pub fn begin_drag(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.selection.retain_valid(self.surface.topology());
        let topo = self.surface.topology();
        let points = self.selection.control_points(topo);
        let start = points
            .iter()
            .map(|p| topo.position(*p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let patches = self.surface.patches_at(&points)?;

        self.object.begin_operation(OP_MOVE);
        let subdivs = self.surface.preview_subdivs();
        let binding = match self.surface.preview(&mut self.object, &self.transform, subdivs) {
            Ok(binding) => binding,
            Err(e) => {
                self.object.abort_operation();
                return Err(e);
            }
        };
        log::debug!(
            "drag started: {} points across {} patches",
            points.len(),
            patches.len()
        );
        self.drag = Some(DragState {
            points,
            start,
            patches,
            binding,
        });
        Ok(())
    }

    /// Move the dragged points to their start positions plus `offset` and
    /// push the affected mesh points to the host.
    pub fn drag_to(&mut self, offset: Vec3) -> Result<()> {
        let drag = self.drag.as_ref().ok_or(SurfaceError::NoActiveDrag)?;
        for (&p, start) in drag.points.iter().zip(&drag.start) {
            self.surface.topo.set_position(p, start + offset)?;
        }
        self.surface.refresh_automatic(&drag.points)?;
        let updates = drag
            .binding
            .point_updates(self.surface.topology(), &drag.patches)?;
        self.object.set_mesh_points(&updates);
        Ok(())
    }

    /// Finish the drag: rebuild at full resolution, persist and commit.
    pub fn end_drag(&mut self) -> Result<()> {
        if self.drag.take().is_none() {
            return Err(SurfaceError::NoActiveDrag);
        }
        match self.surface.update(&mut self.object, &self.transform) {
            Ok(_) => {
                self.object.commit_operation();
                Ok(())
            }
            Err(e) => {
                self.object.abort_operation();
                if let Err(reload) = self.surface.reload(&self.object) {
                    log::warn!(
                        "{} failed and the surface could not be reloaded: {reload}",
                        OP_MOVE
                    );
                }
                self.selection.clear();
                Err(e)
            }
        }
    }

    /// Throw away every change since the last persist.
    ///
    /// Rebuilds the graph from the object's attributes, aborts any open
    /// operation and restores the full-resolution mesh. The selection is
    /// cleared because its handles no longer exist.
    pub fn cancel(&mut self) -> Result<()> {
        if self.drag.take().is_some() {
            self.object.abort_operation();
        }
        self.selection.clear();
        self.surface.reload(&self.object)?;
        let subdivs = self.surface.subdivs();
        self.surface
            .preview(&mut self.object, &self.transform, subdivs)?;
        log::debug!("edits cancelled, surface reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryObject;
    use crate::persist;

    fn session() -> EditSession<InMemoryObject> {
        let mut surface = BezierSurface::new(SurfaceConfig::default()).unwrap();
        let pts: Vec<Point3> = (0..16)
            .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 0.0))
            .collect();
        surface.add_patch(&pts).unwrap();
        EditSession::create(InMemoryObject::new(), surface, Transform::identity()).unwrap()
    }

    fn select_corner(session: &mut EditSession<InMemoryObject>) -> PointId {
        let patch = session.surface().patches()[0];
        let corner = session
            .surface()
            .topology()
            .control_points(patch)
            .unwrap()
            .get(0, 0);
        session.selection_mut().insert(corner);
        corner
    }

    #[test]
    fn test_create_persists() {
        let session = session();
        let obj = session.object();
        assert!(persist::is_surface(obj));
        assert_eq!(obj.history, vec![OP_CREATE.to_string()]);
        assert_eq!(obj.mesh.points.len(), 81);
    }

    #[test]
    fn test_drag_pushes_point_updates_then_commits() {
        let mut session = session();
        let corner = select_corner(&mut session);

        session.begin_drag().unwrap();
        assert_eq!(session.object().open_operation(), Some(OP_MOVE));
        assert_eq!(session.object().mesh.points.len(), 25);
        let rebuilds = session.object().mesh_rebuilds();

        session.drag_to(Vec3::new(0.0, 0.0, 1.0)).unwrap();
        session.drag_to(Vec3::new(0.0, 0.0, 2.0)).unwrap();
        let obj = session.object();
        assert_eq!(obj.mesh_rebuilds(), rebuilds);
        assert_eq!(obj.point_updates(), 2);
        assert_eq!(obj.mesh.points[0], [0.0, 0.0, 2.0]);
        assert_eq!(obj.mesh.polygons.len(), 16);

        session.end_drag().unwrap();
        let obj = session.object();
        assert_eq!(obj.mesh.points.len(), 81);
        assert_eq!(obj.history.last().map(String::as_str), Some(OP_MOVE));

        let loaded = BezierSurface::load(obj, SurfaceConfig::default()).unwrap();
        let patch = loaded.patches()[0];
        let g = loaded.topology().control_positions(patch).unwrap();
        assert_eq!(g[0][0], Point3::new(0.0, 0.0, 2.0));
        assert_eq!(session.surface().topology().position(corner).unwrap().z, 2.0);
    }

    #[test]
    fn test_cancel_restores_persisted_surface() {
        let mut session = session();
        select_corner(&mut session);
        session.begin_drag().unwrap();
        session.drag_to(Vec3::new(0.0, 0.0, 5.0)).unwrap();
        session.cancel().unwrap();

        assert!(!session.is_dragging());
        assert!(session.selection().is_empty());
        let obj = session.object();
        assert_eq!(obj.open_operation(), None);
        assert_eq!(obj.history, vec![OP_CREATE.to_string()]);
        assert_eq!(obj.mesh.points.len(), 81);
        assert_eq!(obj.mesh.points[0], [0.0, 0.0, 0.0]);

        let patch = session.surface().patches()[0];
        let g = session.surface().topology().control_positions(patch).unwrap();
        assert_eq!(g[0][0], Point3::origin());
    }

    #[test]
    fn test_drag_state_errors() {
        let mut session = session();
        assert!(matches!(
            session.drag_to(Vec3::zeros()),
            Err(SurfaceError::NoActiveDrag)
        ));
        assert!(matches!(session.end_drag(), Err(SurfaceError::NoActiveDrag)));
        session.begin_drag().unwrap();
        assert!(matches!(session.begin_drag(), Err(SurfaceError::DragInProgress)));
        assert!(matches!(session.set_subdivs(3), Err(SurfaceError::DragInProgress)));
    }

    #[test]
    fn test_extrude_commits_and_selects() {
        let mut session = session();
        let patch = session.surface().patches()[0];
        let edges = session.surface().topology().patch_edges(patch).unwrap();
        let created = session.extrude(&[edges[0]], false).unwrap();
        assert_eq!(session.selection().patches(session.surface().topology()), created);
        assert_eq!(
            session.object().history.last().map(String::as_str),
            Some(OP_EXTRUDE)
        );
        let loaded = BezierSurface::load(session.object(), SurfaceConfig::default()).unwrap();
        assert_eq!(loaded.patches().len(), 2);
    }

    #[test]
    fn test_failed_extrude_aborts() {
        let mut session = session();
        let patch = session.surface().patches()[0];
        let edges = session.surface().topology().patch_edges(patch).unwrap();
        session.extrude(&[edges[0]], false).unwrap();
        let history = session.object().history.clone();

        assert!(matches!(
            session.extrude(&[edges[0]], false),
            Err(SurfaceError::SharedEdge { .. })
        ));
        assert_eq!(session.object().history, history);
        assert_eq!(session.object().open_operation(), None);
        assert_eq!(session.surface().patches().len(), 2);
    }

    #[test]
    fn test_failed_edit_restores_persisted_graph() {
        let mut session = session();
        let history = session.object().history.clone();
        let points = session.surface().topology().point_count();
        let pts: Vec<Point3> = (0..16)
            .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 5.0))
            .collect();

        let err = session
            .commit(OP_ADD_PATCH, |surface| {
                surface.add_patch(&pts)?;
                surface.set_subdivs(0)
            })
            .unwrap_err();
        assert!(matches!(err, SurfaceError::SubdivsOutOfRange { .. }));
        assert_eq!(session.surface().patches().len(), 1);
        assert_eq!(session.surface().topology().point_count(), points);
        assert_eq!(session.object().history, history);
        assert_eq!(session.object().open_operation(), None);
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_open_and_set_subdivs() {
        let obj = session().into_object();
        let mut session =
            EditSession::open(obj, SurfaceConfig::default(), Transform::identity()).unwrap();
        session.set_subdivs(2).unwrap();
        assert_eq!(session.object().mesh.points.len(), 9);
        assert!(session.set_subdivs(0).is_err());
        assert_eq!(session.surface().subdivs(), 2);
    }
}
