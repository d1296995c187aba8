//! The entity arena: creation, lookup, links and invalidation.

use slotmap::SlotMap;

use sculpt_math::{Point3, Vec3};

use crate::entity::Node;
use crate::{
    ControlPoint, Edge, EdgeId, EntityId, EntityKind, GraphEntity, Links, Patch, PatchId, PointId,
    PointKind, Result, TopoError,
};

/// Arena holding every control point, edge and patch of one surface.
///
/// Entities are addressed by generational keys. Invalidating an entity
/// frees its slot, so any handle still referring to it is rejected with
/// [`TopoError::Deleted`] instead of reading stale data.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub(crate) points: SlotMap<PointId, Node<ControlPoint>>,
    pub(crate) edges: SlotMap<EdgeId, Node<Edge>>,
    pub(crate) patches: SlotMap<PatchId, Node<Patch>>,
}

impl Topology {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live control points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of live patches.
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// Live control point handles.
    pub fn point_ids(&self) -> impl Iterator<Item = PointId> + '_ {
        self.points.keys()
    }

    /// Live edge handles.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    /// Live patch handles.
    pub fn patch_ids(&self) -> impl Iterator<Item = PatchId> + '_ {
        self.patches.keys()
    }

    // =========================================================================
    // Validity
    // =========================================================================

    /// Whether the entity is still usable. Never fails.
    pub fn is_valid(&self, id: impl Into<EntityId>) -> bool {
        match id.into() {
            EntityId::Point(p) => self.points.contains_key(p),
            EntityId::Edge(e) => self.edges.contains_key(e),
            EntityId::Patch(p) => self.patches.contains_key(p),
        }
    }

    /// Whether the entity has been invalidated. Never fails.
    pub fn is_deleted(&self, id: impl Into<EntityId>) -> bool {
        !self.is_valid(id)
    }

    /// Runtime kind of a live entity.
    pub fn kind(&self, id: impl Into<EntityId>) -> Result<EntityKind> {
        let id = id.into();
        Ok(match id {
            EntityId::Point(p) => self.point_node(p)?.data.kind(),
            EntityId::Edge(e) => self.edge_node(e)?.data.kind(),
            EntityId::Patch(p) => self.patch_node(p)?.data.kind(),
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub(crate) fn point_node(&self, id: PointId) -> Result<&Node<ControlPoint>> {
        self.points
            .get(id)
            .ok_or(TopoError::Deleted(EntityId::Point(id)))
    }

    pub(crate) fn edge_node(&self, id: EdgeId) -> Result<&Node<Edge>> {
        self.edges.get(id).ok_or(TopoError::Deleted(EntityId::Edge(id)))
    }

    pub(crate) fn patch_node(&self, id: PatchId) -> Result<&Node<Patch>> {
        self.patches
            .get(id)
            .ok_or(TopoError::Deleted(EntityId::Patch(id)))
    }

    pub(crate) fn patch_node_mut(&mut self, id: PatchId) -> Result<&mut Node<Patch>> {
        self.patches
            .get_mut(id)
            .ok_or(TopoError::Deleted(EntityId::Patch(id)))
    }

    pub(crate) fn edge_node_mut(&mut self, id: EdgeId) -> Result<&mut Node<Edge>> {
        self.edges
            .get_mut(id)
            .ok_or(TopoError::Deleted(EntityId::Edge(id)))
    }

    fn links_mut(&mut self, id: EntityId) -> Result<&mut Links> {
        match id {
            EntityId::Point(p) => self
                .points
                .get_mut(p)
                .map(|n| &mut n.links)
                .ok_or(TopoError::Deleted(id)),
            EntityId::Edge(e) => self.edge_node_mut(e).map(|n| &mut n.links),
            EntityId::Patch(p) => self.patch_node_mut(p).map(|n| &mut n.links),
        }
    }

    /// A control point.
    pub fn point(&self, id: PointId) -> Result<&ControlPoint> {
        Ok(&self.point_node(id)?.data)
    }

    /// An edge.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        Ok(&self.edge_node(id)?.data)
    }

    /// A patch.
    pub fn patch(&self, id: PatchId) -> Result<&Patch> {
        Ok(&self.patch_node(id)?.data)
    }

    /// Mutable access to a patch's flags.
    pub fn patch_mut(&mut self, id: PatchId) -> Result<&mut Patch> {
        Ok(&mut self.patch_node_mut(id)?.data)
    }

    /// Links of a live entity.
    pub fn links(&self, id: impl Into<EntityId>) -> Result<&Links> {
        let id = id.into();
        Ok(match id {
            EntityId::Point(p) => &self.point_node(p)?.links,
            EntityId::Edge(e) => &self.edge_node(e)?.links,
            EntityId::Patch(p) => &self.patch_node(p)?.links,
        })
    }

    // =========================================================================
    // Control points
    // =========================================================================

    /// Position of a control point.
    pub fn position(&self, id: PointId) -> Result<Point3> {
        Ok(self.point(id)?.position)
    }

    /// Positions of several control points.
    pub fn positions<const N: usize>(&self, ids: [PointId; N]) -> Result<[Point3; N]> {
        let mut out = [Point3::origin(); N];
        for (slot, id) in out.iter_mut().zip(ids) {
            *slot = self.position(id)?;
        }
        Ok(out)
    }

    /// Move a control point to `position`.
    pub fn set_position(&mut self, id: PointId, position: Point3) -> Result<()> {
        self.points
            .get_mut(id)
            .ok_or(TopoError::Deleted(EntityId::Point(id)))?
            .data
            .position = position;
        Ok(())
    }

    /// Offset a control point by `delta`.
    pub fn move_point(&mut self, id: PointId, delta: Vec3) -> Result<()> {
        let p = self.position(id)?;
        self.set_position(id, p + delta)
    }

    /// Set the tangent-continuity flag of a handle.
    pub fn set_handle_linked(&mut self, id: PointId, linked: bool) -> Result<()> {
        let node = self
            .points
            .get_mut(id)
            .ok_or(TopoError::Deleted(EntityId::Point(id)))?;
        match &mut node.data.kind {
            PointKind::Handle { linked: flag } => {
                *flag = linked;
                Ok(())
            }
            _ => Err(TopoError::WrongKind {
                id: id.into(),
                expected: EntityKind::Handle,
                found: node.data.kind(),
            }),
        }
    }

    fn add_point(&mut self, position: Point3, kind: PointKind) -> PointId {
        self.points.insert(Node::new(ControlPoint { position, kind }))
    }

    /// Create a vertex.
    pub fn add_vertex(&mut self, position: Point3) -> PointId {
        self.add_point(position, PointKind::Vertex)
    }

    /// Create a handle. It is bound to its vertex when an edge uses it.
    pub fn add_handle(&mut self, position: Point3, linked: bool) -> PointId {
        self.add_point(position, PointKind::Handle { linked })
    }

    /// Create an interior point.
    pub fn add_interior(&mut self, position: Point3) -> PointId {
        self.add_point(position, PointKind::Interior)
    }

    pub(crate) fn expect_kind(&self, id: PointId, expected: EntityKind) -> Result<()> {
        let found = self.point(id)?.kind();
        if found != expected {
            return Err(TopoError::WrongKind {
                id: id.into(),
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Handles linked to a vertex (one per incident edge).
    pub fn vertex_handles(&self, vertex: PointId) -> Result<Vec<PointId>> {
        self.expect_kind(vertex, EntityKind::Vertex)?;
        Ok(self.links(vertex)?.points(EntityKind::Handle).collect())
    }

    /// The vertex a handle belongs to, once an edge has bound it.
    pub fn handle_vertex(&self, handle: PointId) -> Result<Option<PointId>> {
        self.expect_kind(handle, EntityKind::Handle)?;
        Ok(self.links(handle)?.points(EntityKind::Vertex).next())
    }

    /// Edges incident to a vertex.
    pub fn edges_at_vertex(&self, vertex: PointId) -> Result<Vec<EdgeId>> {
        self.expect_kind(vertex, EntityKind::Vertex)?;
        Ok(self.links(vertex)?.edges().collect())
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Create an edge from `[V0, H0, H1, V1]`.
    ///
    /// Binds `H0` to `V0` and `H1` to `V1`. Fails without side effects if
    /// the kinds are wrong or a handle already belongs to another edge or
    /// vertex.
    pub fn add_edge(&mut self, points: [PointId; 4]) -> Result<EdgeId> {
        self.expect_kind(points[0], EntityKind::Vertex)?;
        self.expect_kind(points[1], EntityKind::Handle)?;
        self.expect_kind(points[2], EntityKind::Handle)?;
        self.expect_kind(points[3], EntityKind::Vertex)?;
        for (handle, vertex) in [(points[1], points[0]), (points[2], points[3])] {
            let links = self.links(handle)?;
            if let Some(owner) = links.edges().next() {
                return Err(TopoError::HandleInUse {
                    handle,
                    owner: owner.into(),
                });
            }
            if let Some(owner) = links.points(EntityKind::Vertex).find(|v| *v != vertex) {
                return Err(TopoError::HandleInUse {
                    handle,
                    owner: owner.into(),
                });
            }
        }
        if points[1] == points[2] {
            return Err(TopoError::HandleInUse {
                handle: points[2],
                owner: points[0].into(),
            });
        }

        let edge = self.edges.insert(Node::new(Edge { points }));
        for p in points {
            self.link_pair(edge.into(), p.into())?;
        }
        self.link_pair(points[1].into(), points[0].into())?;
        self.link_pair(points[2].into(), points[3].into())?;
        Ok(edge)
    }

    /// Control points of an edge in stored order.
    pub fn edge_points(&self, edge: EdgeId) -> Result<[PointId; 4]> {
        Ok(self.edge(edge)?.points)
    }

    /// Control point positions of an edge, optionally reversed.
    pub fn edge_positions(&self, edge: EdgeId, reversed: bool) -> Result<[Point3; 4]> {
        self.positions(self.edge(edge)?.oriented(reversed))
    }

    /// Patches using an edge.
    pub fn edge_patches(&self, edge: EdgeId) -> Result<Vec<PatchId>> {
        Ok(self.links(edge)?.patches().collect())
    }

    /// Whether the edge is used by exactly one patch.
    pub fn is_boundary(&self, edge: EdgeId) -> Result<bool> {
        Ok(self.links(edge)?.patches().count() == 1)
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Register `other` in `id`'s link set.
    ///
    /// Fails with [`TopoError::InvalidLinkType`] (and changes nothing) when
    /// `id`'s kind does not accept `other`'s kind. Linking twice is a no-op
    /// that returns `Ok(false)`.
    pub fn link(&mut self, id: impl Into<EntityId>, other: impl Into<EntityId>) -> Result<bool> {
        let (id, other) = (id.into(), other.into());
        let from = self.kind(id)?;
        let to = self.kind(other)?;
        if !from.accepts(to) {
            return Err(TopoError::InvalidLinkType { from, to });
        }
        Ok(self.links_mut(id)?.insert(to, other))
    }

    /// Remove `other` from `id`'s link set.
    pub fn unlink(&mut self, id: impl Into<EntityId>, other: impl Into<EntityId>) -> Result<()> {
        let (id, other) = (id.into(), other.into());
        if !self.links_mut(id)?.remove(other) {
            return Err(TopoError::NotLinked { from: id, to: other });
        }
        Ok(())
    }

    /// Link both directions.
    pub(crate) fn link_pair(&mut self, a: EntityId, b: EntityId) -> Result<()> {
        self.link(a, b)?;
        self.link(b, a)?;
        Ok(())
    }

    /// Remove both directions, tolerating either side already being absent.
    pub(crate) fn unlink_pair(&mut self, a: EntityId, b: EntityId) {
        if let Ok(links) = self.links_mut(a) {
            links.remove(b);
        }
        if let Ok(links) = self.links_mut(b) {
            links.remove(a);
        }
    }

    /// Invalidate an entity.
    ///
    /// Clears its links, removes it from the link sets of everything it was
    /// linked to, and retires its handle. Every later access through the
    /// handle fails with [`TopoError::Deleted`].
    pub fn invalidate(&mut self, id: impl Into<EntityId>) -> Result<()> {
        let id = id.into();
        let peers: Vec<EntityId> = {
            let links = self.links_mut(id)?;
            let peers = links.iter().map(|(_, peer)| peer).collect();
            links.clear();
            peers
        };
        for peer in peers {
            if let Ok(links) = self.links_mut(peer) {
                links.remove(id);
            }
        }
        match id {
            EntityId::Point(p) => {
                self.points.remove(p);
            }
            EntityId::Edge(e) => {
                self.edges.remove(e);
            }
            EntityId::Patch(p) => {
                self.patches.remove(p);
            }
        }
        log::trace!("invalidated {id:?}");
        Ok(())
    }
}
