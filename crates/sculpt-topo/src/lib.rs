#![warn(missing_docs)]

//! Entity graph for Bezier patch surfaces.
//!
//! Control points, edges and patches live in one [`Topology`] arena and are
//! addressed by generational handles. Patches reference edges, edges
//! reference control points, and every entity keeps a typed link set to
//! the entities it is attached to. Two patches that meet along an edge
//! share the same [`Edge`], so moving its control points moves both.
//!
//! # Example
//!
//! ```
//! use sculpt_math::Point3;
//! use sculpt_topo::Topology;
//!
//! let points: Vec<Point3> = (0..16)
//!     .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 0.0))
//!     .collect();
//!
//! let mut topo = Topology::new();
//! let patch = topo.add_quad_patch(&points).unwrap();
//! assert_eq!(topo.edge_count(), 4);
//! assert_eq!(topo.control_positions(patch).unwrap()[3][3], points[15]);
//! ```

mod entity;
mod error;
mod patch;
mod topology;

pub use entity::{
    ControlPoint, Edge, EdgeId, EntityId, EntityKind, GraphEntity, Links, PatchId, PointId,
    PointKind,
};
pub use error::{Result, TopoError};
pub use patch::{ControlGrid, EdgeRef, EdgeUse, Patch, QuadPatch, QUAD_PATCH_TAG};
pub use topology::Topology;
