//! Quad patches: edge-use rings, derived control grids and construction.
//!
//! A quad patch stores only its four edge uses (bottom, right, top, left,
//! walked clockwise so that each use ends on the vertex the next one starts
//! from) and its four interior points. The 4x4 control grid is rebuilt from
//! those on demand, which is what lets two patches share one [`Edge`].
//!
//! [`Edge`]: crate::Edge

use sculpt_math::Point3;

use crate::entity::Node;
use crate::{EdgeId, EntityId, EntityKind, PatchId, PointId, Result, TopoError, Topology};

/// Type tag of quad patches in persisted data.
pub const QUAD_PATCH_TAG: &str = "QuadPatch";

/// A patch's reference to one of its boundary edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    /// The shared edge.
    pub edge: EdgeId,
    /// Whether the patch walks the edge from its last point to its first.
    pub reversed: bool,
}

/// A `(patch, edge, reversed)` triple with its position in the patch ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUse {
    /// Patch using the edge.
    pub patch: PatchId,
    /// The edge.
    pub edge: EdgeId,
    /// Traversal direction within the patch.
    pub reversed: bool,
    /// Ring slot: 0 bottom, 1 right, 2 top, 3 left.
    pub slot: usize,
}

impl EdgeUse {
    /// The following use in the patch ring.
    pub fn next(&self, topo: &Topology) -> Result<EdgeUse> {
        topo.edge_use(self.patch, (self.slot + 1) % 4)
    }

    /// The preceding use in the patch ring.
    pub fn previous(&self, topo: &Topology) -> Result<EdgeUse> {
        topo.edge_use(self.patch, (self.slot + 3) % 4)
    }

    /// Control points in the patch's traversal order.
    pub fn oriented_points(&self, topo: &Topology) -> Result<[PointId; 4]> {
        Ok(topo.edge(self.edge)?.oriented(self.reversed))
    }
}

/// The one implemented patch type: 4 edge uses and 4 interior points.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadPatch {
    pub(crate) uses: [EdgeRef; 4],
    pub(crate) interior: [PointId; 4],
    /// Flip polygon winding when meshing.
    pub reversed: bool,
    /// Interior points follow the boundary instead of being user-placed.
    pub automatic: bool,
}

impl QuadPatch {
    /// Edge references in ring order.
    pub fn edge_refs(&self) -> [EdgeRef; 4] {
        self.uses
    }

    /// Interior points, row-major: grid cells (1,1), (1,2), (2,1), (2,2).
    pub fn interior(&self) -> [PointId; 4] {
        self.interior
    }
}

/// A patch of the surface.
///
/// Closed set of patch types. Adding a type means adding a variant and
/// the matching arms in meshing and persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Four-sided bicubic patch.
    Quad(QuadPatch),
}

impl Patch {
    /// Persisted type tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Patch::Quad(_) => QUAD_PATCH_TAG,
        }
    }

    /// The quad data.
    pub fn as_quad(&self) -> &QuadPatch {
        match self {
            Patch::Quad(q) => q,
        }
    }

    fn as_quad_mut(&mut self) -> &mut QuadPatch {
        match self {
            Patch::Quad(q) => q,
        }
    }

    /// Mesh winding flag.
    pub fn reversed(&self) -> bool {
        self.as_quad().reversed
    }

    /// Set the mesh winding flag.
    pub fn set_reversed(&mut self, reversed: bool) {
        self.as_quad_mut().reversed = reversed;
    }

    /// Automatic interior flag.
    pub fn automatic(&self) -> bool {
        self.as_quad().automatic
    }

    /// Set the automatic interior flag.
    pub fn set_automatic(&mut self, automatic: bool) {
        self.as_quad_mut().automatic = automatic;
    }
}

/// Row/column view of a patch's 16 control point handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlGrid {
    ids: [[PointId; 4]; 4],
}

impl ControlGrid {
    /// Handle at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> PointId {
        self.ids[row][col]
    }

    /// One row, left to right.
    pub fn row(&self, row: usize) -> [PointId; 4] {
        self.ids[row]
    }

    /// One column, bottom to top.
    pub fn column(&self, col: usize) -> [PointId; 4] {
        [
            self.ids[0][col],
            self.ids[1][col],
            self.ids[2][col],
            self.ids[3][col],
        ]
    }

    /// All 16 handles, row-major.
    pub fn to_row_major(&self) -> [PointId; 16] {
        let mut out = [self.ids[0][0]; 16];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.ids[i / 4][i % 4];
        }
        out
    }

    /// The raw 4x4 array.
    pub fn as_array(&self) -> &[[PointId; 4]; 4] {
        &self.ids
    }
}

/// Grid cell of point `j` of the edge in ring `slot`, for traversal order.
pub(crate) fn ring_cell(slot: usize, j: usize) -> (usize, usize) {
    match slot {
        0 => (0, j),
        1 => (j, 3),
        2 => (3, 3 - j),
        _ => (3 - j, 0),
    }
}

const INTERIOR_CELLS: [(usize, usize); 4] = [(1, 1), (1, 2), (2, 1), (2, 2)];

impl Topology {
    /// Build a quad patch from 16 row-major positions.
    ///
    /// Creates 4 corner vertices, 8 handles, 4 edges and 4 interior points.
    /// Edges are `[P0..P3]` (bottom), `[P3, P7, P11, P15]` (right),
    /// `[P12..P15]` (top, walked reversed) and `[P0, P4, P8, P12]` (left,
    /// walked reversed).
    pub fn add_quad_patch(&mut self, positions: &[Point3]) -> Result<PatchId> {
        if positions.len() != 16 {
            return Err(TopoError::InvalidPointCount {
                expected: 16,
                found: positions.len(),
            });
        }
        let corners = [0, 3, 12, 15].map(|i| self.add_vertex(positions[i]));
        let [c0, c3, c12, c15] = corners;
        let handles = |a: usize, b: usize, this: &mut Topology| {
            [
                this.add_handle(positions[a], false),
                this.add_handle(positions[b], false),
            ]
        };
        let [b1, b2] = handles(1, 2, self);
        let [r1, r2] = handles(7, 11, self);
        let [t1, t2] = handles(13, 14, self);
        let [l1, l2] = handles(4, 8, self);

        let bottom = self.add_edge([c0, b1, b2, c3])?;
        let right = self.add_edge([c3, r1, r2, c15])?;
        let top = self.add_edge([c12, t1, t2, c15])?;
        let left = self.add_edge([c0, l1, l2, c12])?;

        let interior = [5, 6, 9, 10].map(|i| self.add_interior(positions[i]));

        self.add_quad_patch_from(
            [
                EdgeRef { edge: bottom, reversed: false },
                EdgeRef { edge: right, reversed: false },
                EdgeRef { edge: top, reversed: true },
                EdgeRef { edge: left, reversed: true },
            ],
            interior,
            false,
            false,
        )
    }

    /// Build a quad patch from existing edges and interior points.
    ///
    /// Used when restoring persisted data and when extruding, so shared
    /// edges are reused instead of duplicated. Checks that each use ends on
    /// the vertex the next one starts from and that no edge already joins
    /// two patches; nothing is created on failure.
    pub fn add_quad_patch_from(
        &mut self,
        uses: [EdgeRef; 4],
        interior: [PointId; 4],
        reversed: bool,
        automatic: bool,
    ) -> Result<PatchId> {
        let mut oriented = [[PointId::default(); 4]; 4];
        for (slot, u) in uses.iter().enumerate() {
            oriented[slot] = self.edge(u.edge)?.oriented(u.reversed);
        }
        for slot in 0..4 {
            let next = (slot + 1) % 4;
            if oriented[slot][3] != oriented[next][0] {
                return Err(TopoError::InconsistentRing { slot, next });
            }
        }
        for u in &uses {
            if self.edge_patches(u.edge)?.len() >= 2 {
                return Err(TopoError::EdgeFull(u.edge));
            }
        }
        for p in interior {
            self.expect_kind(p, EntityKind::InteriorPoint)?;
            if let Some(owner) = self.links(p)?.patches().next() {
                return Err(TopoError::InteriorInUse { point: p, owner });
            }
        }

        let patch = self.patches.insert(Node::new(Patch::Quad(QuadPatch {
            uses,
            interior,
            reversed,
            automatic,
        })));
        for u in uses {
            self.link_pair(patch.into(), u.edge.into())?;
        }
        for pts in oriented {
            for p in pts {
                self.link_pair(patch.into(), p.into())?;
            }
        }
        for p in interior {
            self.link_pair(patch.into(), p.into())?;
        }
        if automatic {
            self.refresh_interior(patch)?;
        }
        log::trace!("added quad patch {patch:?}");
        Ok(patch)
    }

    /// Edge use in ring `slot` of a patch.
    pub fn edge_use(&self, patch: PatchId, slot: usize) -> Result<EdgeUse> {
        let r = self.patch(patch)?.as_quad().uses[slot % 4];
        self.edge(r.edge)?;
        Ok(EdgeUse {
            patch,
            edge: r.edge,
            reversed: r.reversed,
            slot: slot % 4,
        })
    }

    /// All 4 edge uses of a patch in ring order.
    pub fn edge_uses(&self, patch: PatchId) -> Result<[EdgeUse; 4]> {
        Ok([
            self.edge_use(patch, 0)?,
            self.edge_use(patch, 1)?,
            self.edge_use(patch, 2)?,
            self.edge_use(patch, 3)?,
        ])
    }

    /// The use of `edge` within `patch`.
    pub fn edge_use_of(&self, patch: PatchId, edge: EdgeId) -> Result<EdgeUse> {
        let quad = self.patch(patch)?.as_quad();
        let slot = quad
            .uses
            .iter()
            .position(|u| u.edge == edge)
            .ok_or(TopoError::EdgeNotInPatch { edge, patch })?;
        self.edge_use(patch, slot)
    }

    /// The 4 boundary edges of a patch in ring order.
    pub fn patch_edges(&self, patch: PatchId) -> Result<[EdgeId; 4]> {
        Ok(self.edge_uses(patch)?.map(|u| u.edge))
    }

    /// The derived 4x4 control grid of a patch.
    pub fn control_points(&self, patch: PatchId) -> Result<ControlGrid> {
        let quad = self.patch(patch)?.as_quad();
        let mut ids = [[quad.interior[0]; 4]; 4];
        for (slot, u) in quad.uses.iter().enumerate() {
            let pts = self.edge(u.edge)?.oriented(u.reversed);
            for (j, p) in pts.into_iter().enumerate() {
                let (r, c) = ring_cell(slot, j);
                ids[r][c] = p;
            }
        }
        for (p, (r, c)) in quad.interior.iter().zip(INTERIOR_CELLS) {
            ids[r][c] = *p;
        }
        Ok(ControlGrid { ids })
    }

    /// Positions of the derived 4x4 control grid.
    pub fn control_positions(&self, patch: PatchId) -> Result<[[Point3; 4]; 4]> {
        let grid = self.control_points(patch)?;
        let mut out = [[Point3::origin(); 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            *row = self.positions(grid.row(r))?;
        }
        Ok(out)
    }

    /// Recompute an automatic patch's interior points from its boundary.
    ///
    /// Each interior point completes the parallelogram spanned by the
    /// nearest corner and its two adjacent handles. Returns `false` for
    /// patches that are not automatic.
    pub fn refresh_interior(&mut self, patch: PatchId) -> Result<bool> {
        if !self.patch(patch)?.automatic() {
            return Ok(false);
        }
        let g = self.control_positions(patch)?;
        let interior = self.patch(patch)?.as_quad().interior;
        let corner = |r: usize, c: usize, dr: usize, dc: usize| {
            g[dr][c] + (g[r][dc] - g[r][c])
        };
        let targets = [
            corner(0, 0, 1, 1),
            corner(0, 3, 1, 2),
            corner(3, 0, 2, 1),
            corner(3, 3, 2, 2),
        ];
        for (p, pos) in interior.into_iter().zip(targets) {
            self.set_position(p, pos)?;
        }
        Ok(true)
    }

    /// Replace the edge used in ring `slot` of a patch.
    ///
    /// The new edge must walk between the same two corner vertices.
    pub fn replace_edge_use(&mut self, patch: PatchId, slot: usize, edge: EdgeId) -> Result<()> {
        let old = self.edge_use(patch, slot)?;
        let old_pts = self.edge(old.edge)?.oriented(old.reversed);
        let new_pts = self.edge(edge)?.points;
        let reversed = if new_pts[0] == old_pts[0] && new_pts[3] == old_pts[3] {
            false
        } else if new_pts[3] == old_pts[0] && new_pts[0] == old_pts[3] {
            true
        } else {
            return Err(TopoError::EdgeEndpointsDiffer {
                keep: edge,
                drop: old.edge,
            });
        };

        for p in old_pts {
            self.unlink_pair(patch.into(), p.into());
        }
        self.unlink_pair(patch.into(), old.edge.into());

        self.patch_node_mut(patch)?.data.as_quad_mut().uses[slot % 4] = EdgeRef { edge, reversed };
        self.link_pair(patch.into(), edge.into())?;
        for p in new_pts {
            self.link_pair(patch.into(), p.into())?;
        }
        Ok(())
    }

    /// Make every reference to vertex `drop` point at vertex `keep`, then
    /// invalidate `drop`.
    pub fn merge_vertices(&mut self, keep: PointId, drop: PointId) -> Result<()> {
        self.expect_kind(keep, EntityKind::Vertex)?;
        self.expect_kind(drop, EntityKind::Vertex)?;
        if keep == drop {
            return Ok(());
        }
        let peers: Vec<EntityId> = self.links(drop)?.iter().map(|(_, id)| id).collect();
        for peer in peers {
            match peer {
                EntityId::Edge(e) => {
                    let edge = self.edge_node_mut(e)?;
                    for p in edge.data.points.iter_mut() {
                        if *p == drop {
                            *p = keep;
                        }
                    }
                }
                EntityId::Point(_) | EntityId::Patch(_) => {}
            }
            self.unlink_pair(peer, drop.into());
            self.link_pair(peer, keep.into())?;
        }
        self.invalidate(drop)
    }

    /// Replace edge `drop` by `keep` in every patch using it, then
    /// invalidate `drop` and its two handles.
    ///
    /// Both edges must join the same two vertices.
    pub fn merge_edges(&mut self, keep: EdgeId, drop: EdgeId) -> Result<()> {
        if keep == drop {
            return Ok(());
        }
        let k = self.edge(keep)?.points;
        let d = self.edge(drop)?.points;
        let same = k[0] == d[0] && k[3] == d[3];
        let flipped = k[0] == d[3] && k[3] == d[0];
        if !same && !flipped {
            return Err(TopoError::EdgeEndpointsDiffer { keep, drop });
        }
        for patch in self.edge_patches(drop)? {
            let slot = self.edge_use_of(patch, drop)?.slot;
            self.replace_edge_use(patch, slot, keep)?;
        }
        self.invalidate(d[1])?;
        self.invalidate(d[2])?;
        self.invalidate(drop)?;
        log::debug!("merged edge {drop:?} into {keep:?}");
        Ok(())
    }
}
