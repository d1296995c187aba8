//! Flattening the entity graph into a [`SurfaceDocument`] and back.
//!
//! Writing assigns every reachable control point and edge an index the
//! first time a patch reaches it, so shared entities are written once.
//! Reading rebuilds points, then edges, then patches from indices, which
//! makes shared edges come back as one edge.

use std::collections::HashMap;

use sculpt_ir::{
    EdgeRecord, EdgeUseRecord, FormatVersion, PatchRecord, PointRecord, Position, SurfaceDocument,
    DATA_KEY, SURFACE_DICTIONARY, SURFACE_TYPE, TYPE_KEY, VERSION_KEY,
};
use sculpt_math::Point3;
use sculpt_topo::{EdgeId, EdgeRef, Patch, PatchId, PointId, PointKind, TopoError, Topology};

use crate::error::PersistError;
use crate::host::{AttributeStore, AttributeValue};

#[derive(Default)]
struct Indexer {
    points: HashMap<PointId, usize>,
    edges: HashMap<EdgeId, usize>,
}

impl Indexer {
    fn point(
        &mut self,
        doc: &mut SurfaceDocument,
        topo: &Topology,
        id: PointId,
    ) -> Result<usize, TopoError> {
        if let Some(&i) = self.points.get(&id) {
            return Ok(i);
        }
        let cp = topo.point(id)?;
        let p = cp.position;
        let position = doc.add_position(Position::new(p.x, p.y, p.z));
        let index = doc.add_point(match cp.kind {
            PointKind::Vertex => PointRecord::Vertex { position },
            PointKind::Handle { linked } => PointRecord::Handle { position, linked },
            PointKind::Interior => PointRecord::Interior { position },
        });
        self.points.insert(id, index);
        Ok(index)
    }

    fn edge(
        &mut self,
        doc: &mut SurfaceDocument,
        topo: &Topology,
        id: EdgeId,
    ) -> Result<usize, TopoError> {
        if let Some(&i) = self.edges.get(&id) {
            return Ok(i);
        }
        let mut points = [0; 4];
        for (slot, p) in points.iter_mut().zip(topo.edge_points(id)?) {
            *slot = self.point(doc, topo, p)?;
        }
        let index = doc.add_edge(EdgeRecord { points });
        self.edges.insert(id, index);
        Ok(index)
    }
}

/// Flatten `patches` into a sealed document.
pub fn to_document(
    topo: &Topology,
    patches: &[PatchId],
    subdivs: usize,
) -> Result<SurfaceDocument, TopoError> {
    let mut doc = SurfaceDocument::new(subdivs);
    let mut ix = Indexer::default();
    for &patch in patches {
        let record = match topo.patch(patch)? {
            Patch::Quad(quad) => {
                let mut uses = [EdgeUseRecord {
                    edge: 0,
                    reversed: false,
                }; 4];
                for (slot, r) in uses.iter_mut().zip(quad.edge_refs()) {
                    *slot = EdgeUseRecord {
                        edge: ix.edge(&mut doc, topo, r.edge)?,
                        reversed: r.reversed,
                    };
                }
                let mut interior = [0; 4];
                for (slot, p) in interior.iter_mut().zip(quad.interior()) {
                    *slot = ix.point(&mut doc, topo, p)?;
                }
                PatchRecord::QuadPatch {
                    uses,
                    interior,
                    reversed: quad.reversed,
                    automatic: quad.automatic,
                }
            }
        };
        doc.add_patch(record);
    }
    doc.seal();
    Ok(doc)
}

fn corrupt(e: TopoError) -> PersistError {
    PersistError::Corrupt(e.to_string())
}

/// Rebuild an entity graph from a validated document.
///
/// Returns the new arena and its patches in document order.
pub fn from_document(doc: &SurfaceDocument) -> Result<(Topology, Vec<PatchId>), PersistError> {
    doc.validate()?;
    let mut topo = Topology::new();

    let points: Vec<PointId> = doc
        .points
        .iter()
        .map(|record| {
            let pos = doc.positions[record.position()];
            let pos = Point3::new(pos.x, pos.y, pos.z);
            match *record {
                PointRecord::Vertex { .. } => topo.add_vertex(pos),
                PointRecord::Handle { linked, .. } => topo.add_handle(pos, linked),
                PointRecord::Interior { .. } => topo.add_interior(pos),
            }
        })
        .collect();

    let mut edges = Vec::with_capacity(doc.edges.len());
    for record in &doc.edges {
        let ids = record.points.map(|i| points[i]);
        edges.push(topo.add_edge(ids).map_err(corrupt)?);
    }

    let mut patches = Vec::with_capacity(doc.patches.len());
    for record in &doc.patches {
        let patch = match *record {
            PatchRecord::QuadPatch {
                uses,
                interior,
                reversed,
                automatic,
            } => topo
                .add_quad_patch_from(
                    uses.map(|u| EdgeRef {
                        edge: edges[u.edge],
                        reversed: u.reversed,
                    }),
                    interior.map(|i| points[i]),
                    reversed,
                    automatic,
                )
                .map_err(corrupt)?,
        };
        patches.push(patch);
    }

    let rebuilt = (topo.point_count(), topo.edge_count(), topo.patch_count());
    let stored = (doc.counts.points, doc.counts.edges, doc.counts.patches);
    if rebuilt != stored {
        return Err(PersistError::Corrupt(format!(
            "rebuilt {rebuilt:?} entities, expected {stored:?}"
        )));
    }
    Ok((topo, patches))
}

/// Store a document on an object.
pub fn write<S: AttributeStore + ?Sized>(
    store: &mut S,
    doc: &SurfaceDocument,
) -> Result<(), PersistError> {
    let json = doc.to_json()?;
    store.set_attribute(SURFACE_DICTIONARY, TYPE_KEY, SURFACE_TYPE.into());
    store.set_attribute(
        SURFACE_DICTIONARY,
        VERSION_KEY,
        FormatVersion::CURRENT.to_string().into(),
    );
    store.set_attribute(SURFACE_DICTIONARY, DATA_KEY, AttributeValue::String(json));
    Ok(())
}

/// Whether an object carries surface data at all.
pub fn is_surface<S: AttributeStore + ?Sized>(store: &S) -> bool {
    store
        .get_attribute(SURFACE_DICTIONARY, TYPE_KEY)
        .is_some_and(|v| v.as_str() == Some(SURFACE_TYPE))
}

/// Read and version-check the document stored on an object.
pub fn read<S: AttributeStore + ?Sized>(store: &S) -> Result<SurfaceDocument, PersistError> {
    if !is_surface(store) {
        return Err(PersistError::NotASurface);
    }
    let version = store.get_attribute(SURFACE_DICTIONARY, VERSION_KEY);
    let version = match version.as_ref().and_then(AttributeValue::as_str) {
        Some(v) => v.parse::<FormatVersion>()?,
        None => return Err(PersistError::MalformedVersion(format!("{version:?}"))),
    };
    if version.major > FormatVersion::CURRENT.major {
        return Err(PersistError::VersionTooNew {
            found: version.to_string(),
            supported: FormatVersion::CURRENT.to_string(),
        });
    }
    if !version.is_readable() {
        return Err(PersistError::VersionTooOld {
            found: version.to_string(),
            minimum: FormatVersion::MIN_SUPPORTED.to_string(),
        });
    }
    let data = store.get_attribute(SURFACE_DICTIONARY, DATA_KEY);
    let json = data
        .as_ref()
        .and_then(AttributeValue::as_str)
        .ok_or_else(|| PersistError::Corrupt("missing surface data".into()))?;
    Ok(SurfaceDocument::from_json(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryObject;
    use approx::assert_relative_eq;

    fn grid(dx: f64) -> Vec<Point3> {
        (0..16)
            .map(|i| Point3::new((i % 4) as f64 + dx, (i / 4) as f64, ((i * 7) % 5) as f64 * 0.1))
            .collect()
    }

    #[test]
    fn test_roundtrip_single_patch() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&grid(0.0)).unwrap();
        topo.patch_mut(patch).unwrap().set_reversed(true);
        let doc = to_document(&topo, &[patch], 6).unwrap();
        assert_eq!(doc.counts.points, 16);
        assert_eq!(doc.counts.edges, 4);

        let (back, patches) = from_document(&doc).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(back.point_count(), 16);
        assert!(back.patch(patches[0]).unwrap().reversed());
        let a = topo.control_positions(patch).unwrap();
        let b = back.control_positions(patches[0]).unwrap();
        for r in 0..4 {
            for c in 0..4 {
                assert_relative_eq!(a[r][c], b[r][c], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_write_then_read() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&grid(0.0)).unwrap();
        let doc = to_document(&topo, &[patch], 3).unwrap();
        let mut obj = InMemoryObject::new();
        write(&mut obj, &doc).unwrap();
        assert!(is_surface(&obj));
        let read_back = read(&obj).unwrap();
        assert_eq!(read_back.subdivs, 3);
        assert_eq!(read_back.edges, doc.edges);
    }

    #[test]
    fn test_read_rejects_unmarked_object() {
        let obj = InMemoryObject::new();
        assert!(matches!(read(&obj), Err(PersistError::NotASurface)));
    }

    fn stored_object() -> InMemoryObject {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&grid(0.0)).unwrap();
        let mut obj = InMemoryObject::new();
        write(&mut obj, &to_document(&topo, &[patch], 3).unwrap()).unwrap();
        obj
    }

    #[test]
    fn test_read_version_gate() {
        let mut obj = stored_object();
        obj.set_attribute(SURFACE_DICTIONARY, VERSION_KEY, "2.0.0".into());
        assert!(matches!(read(&obj), Err(PersistError::VersionTooNew { .. })));

        obj.set_attribute(SURFACE_DICTIONARY, VERSION_KEY, "0.4.0".into());
        assert!(matches!(read(&obj), Err(PersistError::VersionTooOld { .. })));

        obj.set_attribute(SURFACE_DICTIONARY, VERSION_KEY, "one".into());
        assert!(matches!(read(&obj), Err(PersistError::MalformedVersion(_))));

        obj.set_attribute(SURFACE_DICTIONARY, VERSION_KEY, "1.0.3".into());
        assert!(read(&obj).is_ok());
    }

    #[test]
    fn test_read_rejects_bad_payload() {
        let mut obj = stored_object();
        obj.set_attribute(SURFACE_DICTIONARY, DATA_KEY, "{not json".into());
        assert!(matches!(read(&obj), Err(PersistError::Json(_))));

        obj.delete_attribute(SURFACE_DICTIONARY, DATA_KEY);
        assert!(matches!(read(&obj), Err(PersistError::Corrupt(_))));
    }

    #[test]
    fn test_inconsistent_kinds_are_corrupt() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&grid(0.0)).unwrap();
        let mut doc = to_document(&topo, &[patch], 3).unwrap();
        // Turn the first edge's start vertex into an interior point.
        let first = doc.edges[0].points[0];
        let position = doc.points[first].position();
        doc.points[first] = PointRecord::Interior { position };
        assert!(matches!(from_document(&doc), Err(PersistError::Corrupt(_))));
    }

    #[test]
    fn test_shared_handle_is_corrupt() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&grid(0.0)).unwrap();
        let mut doc = to_document(&topo, &[patch], 3).unwrap();
        // Two edges claiming the same handle cannot both be rebuilt.
        doc.edges[1].points[1] = doc.edges[0].points[1];
        assert!(matches!(from_document(&doc), Err(PersistError::Corrupt(_))));
    }

    #[test]
    fn test_third_patch_on_edge_is_corrupt() {
        let mut topo = Topology::new();
        let patch = topo.add_quad_patch(&grid(0.0)).unwrap();
        let mut doc = to_document(&topo, &[patch], 3).unwrap();
        let PatchRecord::QuadPatch { uses, .. } = doc.patches[0];
        // Two more patches over the same four edges, each with its own
        // interior points.
        for _ in 0..2 {
            let interior = [0; 4].map(|position| doc.add_point(PointRecord::Interior { position }));
            doc.add_patch(PatchRecord::QuadPatch {
                uses,
                interior,
                reversed: false,
                automatic: false,
            });
        }
        doc.seal();
        assert!(matches!(from_document(&doc), Err(PersistError::Corrupt(_))));

        doc.patches.pop();
        doc.points.truncate(doc.points.len() - 4);
        doc.seal();
        let (back, patches) = from_document(&doc).unwrap();
        assert_eq!(patches.len(), 2);
        assert!(!back.is_boundary(back.patch_edges(patches[0]).unwrap()[0]).unwrap());
    }
}
