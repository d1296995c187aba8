//! Entity handles, kinds and the shared link bookkeeping.

use std::collections::BTreeMap;

use sculpt_math::Point3;

use crate::patch::Patch;

slotmap::new_key_type! {
    /// Handle of a control point (vertex, handle or interior point).
    pub struct PointId;
    /// Handle of an edge.
    pub struct EdgeId;
    /// Handle of a patch.
    pub struct PatchId;
}

/// Any entity in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityId {
    /// A control point.
    Point(PointId),
    /// An edge.
    Edge(EdgeId),
    /// A patch.
    Patch(PatchId),
}

impl From<PointId> for EntityId {
    fn from(id: PointId) -> Self {
        EntityId::Point(id)
    }
}

impl From<EdgeId> for EntityId {
    fn from(id: EdgeId) -> Self {
        EntityId::Edge(id)
    }
}

impl From<PatchId> for EntityId {
    fn from(id: PatchId) -> Self {
        EntityId::Patch(id)
    }
}

/// Runtime kind of an entity, used for link type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Control point on a patch corner.
    Vertex,
    /// Tangent control point next to a vertex.
    Handle,
    /// Control point in the middle of a patch.
    InteriorPoint,
    /// Cubic boundary curve.
    Edge,
    /// Bicubic patch.
    Patch,
}

impl EntityKind {
    /// Kinds an entity of this kind may link to.
    pub fn accepted_links(self) -> &'static [EntityKind] {
        use EntityKind::*;
        match self {
            Vertex => &[Handle, Edge, Patch],
            Handle => &[Vertex, Edge, Patch],
            InteriorPoint => &[Patch],
            Edge => &[Vertex, Handle, Patch],
            Patch => &[Vertex, Handle, InteriorPoint, Edge],
        }
    }

    /// Whether this kind accepts links to `other`.
    pub fn accepts(self, other: EntityKind) -> bool {
        self.accepted_links().contains(&other)
    }
}

/// Common capability of every graph entity.
pub trait GraphEntity {
    /// Runtime kind of the entity.
    fn kind(&self) -> EntityKind;

    /// Whether this entity accepts links to entities of `other` kind.
    fn accepts(&self, other: EntityKind) -> bool {
        self.kind().accepts(other)
    }
}

/// Typed link collection: target kind to ordered, duplicate-free handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links {
    by_kind: BTreeMap<EntityKind, Vec<EntityId>>,
}

impl Links {
    /// Insert a link. Returns `false` when it was already present.
    pub(crate) fn insert(&mut self, kind: EntityKind, id: EntityId) -> bool {
        let set = self.by_kind.entry(kind).or_default();
        if set.contains(&id) {
            return false;
        }
        set.push(id);
        true
    }

    /// Remove a link regardless of kind. Returns `false` when absent.
    pub(crate) fn remove(&mut self, id: EntityId) -> bool {
        let mut removed = false;
        for set in self.by_kind.values_mut() {
            if let Some(pos) = set.iter().position(|x| *x == id) {
                set.remove(pos);
                removed = true;
            }
        }
        self.by_kind.retain(|_, set| !set.is_empty());
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.by_kind.clear();
    }

    /// Linked entities of one kind, in link order.
    pub fn of_kind(&self, kind: EntityKind) -> &[EntityId] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` is linked.
    pub fn contains(&self, id: EntityId) -> bool {
        self.by_kind.values().any(|set| set.contains(&id))
    }

    /// All links as `(kind, id)` pairs, grouped by kind.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, EntityId)> + '_ {
        self.by_kind
            .iter()
            .flat_map(|(kind, set)| set.iter().map(move |id| (*kind, *id)))
    }

    /// Total number of links.
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// True when nothing is linked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linked control points of one point kind.
    pub fn points(&self, kind: EntityKind) -> impl Iterator<Item = PointId> + '_ {
        self.of_kind(kind).iter().filter_map(|id| match id {
            EntityId::Point(p) => Some(*p),
            _ => None,
        })
    }

    /// Linked edges.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.of_kind(EntityKind::Edge).iter().filter_map(|id| match id {
            EntityId::Edge(e) => Some(*e),
            _ => None,
        })
    }

    /// Linked patches.
    pub fn patches(&self) -> impl Iterator<Item = PatchId> + '_ {
        self.of_kind(EntityKind::Patch).iter().filter_map(|id| match id {
            EntityId::Patch(p) => Some(*p),
            _ => None,
        })
    }
}

/// Variant of a control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    /// Lies on the surface at an edge end.
    Vertex,
    /// Tangent control next to a vertex. `linked` marks it as
    /// tangent-continuous with its twin across the vertex.
    Handle {
        /// Tangent continuity flag.
        linked: bool,
    },
    /// Interior control of a patch.
    Interior,
}

/// A control point.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint {
    /// Position in surface-local coordinates.
    pub position: Point3,
    /// Variant.
    pub kind: PointKind,
}

impl ControlPoint {
    /// True for vertices.
    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, PointKind::Vertex)
    }

    /// True for handles.
    pub fn is_handle(&self) -> bool {
        matches!(self.kind, PointKind::Handle { .. })
    }

    /// True for interior points.
    pub fn is_interior(&self) -> bool {
        matches!(self.kind, PointKind::Interior)
    }
}

impl GraphEntity for ControlPoint {
    fn kind(&self) -> EntityKind {
        match self.kind {
            PointKind::Vertex => EntityKind::Vertex,
            PointKind::Handle { .. } => EntityKind::Handle,
            PointKind::Interior => EntityKind::InteriorPoint,
        }
    }
}

/// A cubic boundary curve `[V0, H0, H1, V1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) points: [PointId; 4],
}

impl Edge {
    /// Control points in stored order.
    pub fn points(&self) -> [PointId; 4] {
        self.points
    }

    /// Control points in traversal order for the given reversed flag.
    pub fn oriented(&self, reversed: bool) -> [PointId; 4] {
        let mut pts = self.points;
        if reversed {
            pts.reverse();
        }
        pts
    }

    /// First vertex.
    pub fn start(&self) -> PointId {
        self.points[0]
    }

    /// Last vertex.
    pub fn end(&self) -> PointId {
        self.points[3]
    }
}

impl GraphEntity for Edge {
    fn kind(&self) -> EntityKind {
        EntityKind::Edge
    }
}

impl GraphEntity for Patch {
    fn kind(&self) -> EntityKind {
        EntityKind::Patch
    }
}

/// Arena slot: entity data plus its link bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub(crate) data: T,
    pub(crate) links: Links,
}

impl<T> Node<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            data,
            links: Links::default(),
        }
    }
}
