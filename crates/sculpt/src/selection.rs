//! Mixed-entity selection and the queries derived from it.

use sculpt_topo::{EdgeId, EntityId, EntityKind, PatchId, PointId, Topology};

/// An ordered set of selected entities.
///
/// Selection holds handles only, so entities invalidated after being
/// selected stay in the set until [`Selection::retain_valid`] prunes them.
/// Every query skips them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    items: Vec<EntityId>,
}

fn push_unique<T: PartialEq>(out: &mut Vec<T>, item: T) {
    if !out.contains(&item) {
        out.push(item);
    }
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Returns `false` if it was already selected.
    pub fn insert(&mut self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        if self.items.contains(&id) {
            return false;
        }
        self.items.push(id);
        true
    }

    /// Remove an entity. Returns whether it was selected.
    pub fn remove(&mut self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        let before = self.items.len();
        self.items.retain(|x| *x != id);
        self.items.len() != before
    }

    /// Select if unselected, deselect otherwise.
    pub fn toggle(&mut self, id: impl Into<EntityId>) {
        let id = id.into();
        if !self.remove(id) {
            self.items.push(id);
        }
    }

    /// Deselect everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Whether `id` is selected.
    pub fn contains(&self, id: impl Into<EntityId>) -> bool {
        self.items.contains(&id.into())
    }

    /// Number of selected entities, stale ones included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Selected entities in selection order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items.iter().copied()
    }

    /// Drop entities that no longer exist.
    pub fn retain_valid(&mut self, topo: &Topology) {
        self.items.retain(|id| topo.is_valid(*id));
    }

    fn live<'a>(&'a self, topo: &'a Topology) -> impl Iterator<Item = EntityId> + 'a {
        self.iter().filter(move |id| topo.is_valid(*id))
    }

    /// Every control point the selection moves when dragged.
    ///
    /// Patches contribute their 16 points, edges their 4, vertices
    /// themselves and their handles, other points just themselves.
    pub fn control_points(&self, topo: &Topology) -> Vec<PointId> {
        let mut out = Vec::new();
        for id in self.live(topo) {
            match id {
                EntityId::Patch(p) => {
                    if let Ok(grid) = topo.control_points(p) {
                        for point in grid.to_row_major() {
                            push_unique(&mut out, point);
                        }
                    }
                }
                EntityId::Edge(e) => {
                    if let Ok(points) = topo.edge_points(e) {
                        for point in points {
                            push_unique(&mut out, point);
                        }
                    }
                }
                EntityId::Point(p) => {
                    push_unique(&mut out, p);
                    if let Ok(handles) = topo.vertex_handles(p) {
                        for h in handles {
                            push_unique(&mut out, h);
                        }
                    }
                }
            }
        }
        out
    }

    /// Selected vertices.
    pub fn vertices(&self, topo: &Topology) -> Vec<PointId> {
        self.live(topo)
            .filter_map(|id| match id {
                EntityId::Point(p) if topo.kind(p).ok() == Some(EntityKind::Vertex) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Selected edges followed by the edges of selected patches.
    pub fn edges(&self, topo: &Topology) -> Vec<EdgeId> {
        let mut out = Vec::new();
        for id in self.live(topo) {
            if let EntityId::Edge(e) = id {
                push_unique(&mut out, e);
            }
        }
        for patch in self.patches(topo) {
            if let Ok(edges) = topo.patch_edges(patch) {
                for e in edges {
                    push_unique(&mut out, e);
                }
            }
        }
        out
    }

    /// Selected patches.
    pub fn patches(&self, topo: &Topology) -> Vec<PatchId> {
        self.live(topo)
            .filter_map(|id| match id {
                EntityId::Patch(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Edges from [`Self::edges`] that only one patch uses.
    pub fn boundary_edges(&self, topo: &Topology) -> Vec<EdgeId> {
        self.edges(topo)
            .into_iter()
            .filter(|e| topo.is_boundary(*e).unwrap_or(false))
            .collect()
    }
}
