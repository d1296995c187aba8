//! Growing new patches from boundary edges.
//!
//! Extrusion is planned against the untouched graph first and applied
//! afterwards, so every precondition failure leaves the surface as it was.

use sculpt_bezier::CubicBezier;
use sculpt_math::{midpoint, Point3, Vec3};
use sculpt_topo::{EdgeId, EdgeRef, EdgeUse, PatchId, PointId};

use crate::error::{Result, SurfaceError};
use crate::surface::BezierSurface;

/// Everything needed to build one extruded patch.
#[derive(Debug, Clone)]
struct Plan {
    edge: EdgeId,
    /// The source edge walked by the new patch.
    bottom: EdgeRef,
    /// Traversal points of `bottom` in the new patch.
    corner_ids: [PointId; 4],
    grid: [[Point3; 4]; 4],
    reversed: bool,
    automatic: bool,
}

/// A side edge of a freshly extruded patch, stored starting at the corner
/// it grows from.
#[derive(Debug, Clone, Copy)]
struct SideEdge {
    edge: EdgeId,
    patch: PatchId,
}

fn outward(a: Point3, b: Point3, edge: EdgeId) -> Result<Vec3> {
    let d = a - b;
    let len = d.norm();
    if len <= f64::EPSILON {
        return Err(SurfaceError::DegenerateExtrusion(edge));
    }
    Ok(d / len)
}

impl BezierSurface {
    fn owning_use(&self, edge: EdgeId) -> Result<EdgeUse> {
        let owners = self.topo.edge_patches(edge)?;
        match owners.as_slice() {
            [] => Err(SurfaceError::NotBoundary(edge)),
            [patch] => {
                if !self.contains_patch(*patch) {
                    return Err(SurfaceError::UnknownPatch(*patch));
                }
                Ok(self.topo.edge_use_of(*patch, edge)?)
            }
            _ => Err(SurfaceError::SharedEdge {
                edge,
                patches: owners.len(),
            }),
        }
    }

    fn plan_extrusion(&self, edge: EdgeId) -> Result<Plan> {
        let source = self.owning_use(edge)?;
        let topo = &self.topo;

        // Traversal in the owning patch: s[0] is where the previous use
        // ends, s[3] where the next one starts.
        let s = source.oriented_points(topo)?;
        let mut prev = source.previous(topo)?.oriented_points(topo)?;
        prev.reverse();
        let next = source.next(topo)?.oriented_points(topo)?;

        let [p1, p2] = topo.positions([prev[1], prev[2]])?;
        let [n1, n2] = topo.positions([next[1], next[2]])?;
        let dir_prev = outward(p1, p2, edge)?;
        let dir_next = outward(n1, n2, edge)?;

        let positions = topo.positions(s)?;
        let length = CubicBezier::new(positions).arc_length(self.subdivs())? / 3.0;
        if length <= f64::EPSILON {
            return Err(SurfaceError::DegenerateExtrusion(edge));
        }

        // The new patch walks the edge the other way round.
        let mut t = s;
        t.reverse();
        let base = topo.positions(t)?;
        // Each corner and the handle next to it follow the neighbour edge
        // meeting that corner.
        let dirs = [dir_next, dir_next, dir_prev, dir_prev];
        let mut grid = [[Point3::origin(); 4]; 4];
        for (r, row) in grid.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = base[j] + dirs[j] * (length * r as f64);
            }
        }

        let owner = topo.patch(source.patch)?;
        Ok(Plan {
            edge,
            bottom: EdgeRef {
                edge,
                reversed: !source.reversed,
            },
            corner_ids: t,
            grid,
            reversed: owner.reversed(),
            automatic: owner.automatic(),
        })
    }

    /// Build the planned patch. Returns it with its right and left side
    /// edges.
    fn apply_plan(&mut self, plan: &Plan) -> Result<(PatchId, [EdgeId; 2])> {
        let g = &plan.grid;
        let topo = &mut self.topo;
        let [t0, _, _, t3] = plan.corner_ids;

        let far_right = topo.add_vertex(g[3][3]);
        let far_left = topo.add_vertex(g[3][0]);
        let right = {
            let h0 = topo.add_handle(g[1][3], false);
            let h1 = topo.add_handle(g[2][3], false);
            topo.add_edge([t3, h0, h1, far_right])?
        };
        let top = {
            let h0 = topo.add_handle(g[3][1], false);
            let h1 = topo.add_handle(g[3][2], false);
            topo.add_edge([far_left, h0, h1, far_right])?
        };
        let left = {
            let h0 = topo.add_handle(g[1][0], false);
            let h1 = topo.add_handle(g[2][0], false);
            topo.add_edge([t0, h0, h1, far_left])?
        };
        let interior = [(1, 1), (1, 2), (2, 1), (2, 2)].map(|(r, c)| topo.add_interior(g[r][c]));

        let patch = topo.add_quad_patch_from(
            [
                plan.bottom,
                EdgeRef {
                    edge: right,
                    reversed: false,
                },
                EdgeRef {
                    edge: top,
                    reversed: true,
                },
                EdgeRef {
                    edge: left,
                    reversed: true,
                },
            ],
            interior,
            plan.reversed,
            plan.automatic,
        )?;
        self.patches.push(patch);
        log::debug!("extruded edge {:?} into patch {patch:?}", plan.edge);
        Ok((patch, [right, left]))
    }

    /// Grow a new patch outward from a boundary edge.
    ///
    /// The new patch shares the edge with its current owner, reuses both
    /// corner vertices and copies the owner's `reversed` flag. Fails before
    /// changing anything if the edge is shared or unused, has no length,
    /// or a neighbouring edge gives no direction.
    pub fn extrude_edge(&mut self, edge: EdgeId) -> Result<PatchId> {
        let plan = self.plan_extrusion(edge)?;
        Ok(self.apply_plan(&plan)?.0)
    }

    /// Extrude several boundary edges at once.
    ///
    /// Every edge is checked before the first patch is built. With `merge`
    /// set, side edges of the new patches that leave the same corner in
    /// the same direction are fused into one edge.
    pub fn extrude_edges(&mut self, edges: &[EdgeId], merge: bool) -> Result<Vec<PatchId>> {
        for (i, edge) in edges.iter().enumerate() {
            if edges[..i].contains(edge) {
                return Err(SurfaceError::DuplicateEdge(*edge));
            }
        }
        let plans = edges
            .iter()
            .map(|e| self.plan_extrusion(*e))
            .collect::<Result<Vec<_>>>()?;

        let mut created = Vec::with_capacity(plans.len());
        let mut sides = Vec::with_capacity(plans.len() * 2);
        for plan in &plans {
            let (patch, [right, left]) = self.apply_plan(plan)?;
            created.push(patch);
            sides.push(SideEdge { edge: right, patch });
            sides.push(SideEdge { edge: left, patch });
        }
        if merge {
            self.merge_side_edges(sides)?;
        }
        Ok(created)
    }

    fn side_direction(&self, edge: EdgeId) -> Result<(PointId, Vec3)> {
        let [v0, h0, _, _] = self.topo.edge_points(edge)?;
        let [p0, p1] = self.topo.positions([v0, h0])?;
        Ok((v0, p1 - p0))
    }

    fn mergeable(&self, a: EdgeId, b: EdgeId) -> Result<bool> {
        let (va, da) = self.side_direction(a)?;
        let (vb, db) = self.side_direction(b)?;
        if va != vb {
            return Ok(false);
        }
        if !self.config.merge_tolerance().same_direction(&da, &db) {
            log::warn!("side edges {a:?} and {b:?} share a corner but diverge, not merged");
            return Ok(false);
        }
        Ok(true)
    }

    fn merge_side_edges(&mut self, mut work: Vec<SideEdge>) -> Result<()> {
        while let Some(side) = work.pop() {
            let mut partner = None;
            for (i, other) in work.iter().enumerate() {
                if self.mergeable(side.edge, other.edge)? {
                    partner = Some(i);
                    break;
                }
            }
            let Some(i) = partner else {
                continue;
            };
            let other = work.remove(i);
            self.fuse(side.edge, other.edge)?;
            for patch in [side.patch, other.patch] {
                self.topo.refresh_interior(patch)?;
            }
            // The kept edge may still pair with a later one.
            work.push(side);
        }
        Ok(())
    }

    /// Snap `drop` onto `keep` at their midpoints and replace it.
    fn fuse(&mut self, keep: EdgeId, drop: EdgeId) -> Result<()> {
        let k = self.topo.edge_points(keep)?;
        let d = self.topo.edge_points(drop)?;
        for i in 1..4 {
            let [a, b] = self.topo.positions([k[i], d[i]])?;
            self.topo.set_position(k[i], midpoint(&a, &b))?;
        }
        self.topo.merge_vertices(k[3], d[3])?;
        self.topo.merge_edges(keep, drop)?;
        log::debug!("merged extruded edge {drop:?} into {keep:?}");
        Ok(())
    }
}
