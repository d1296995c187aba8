#![warn(missing_docs)]

//! sculpt: editable surfaces of bicubic Bezier patches.
//!
//! A [`BezierSurface`] owns the entity graph of a surface, grows it by
//! extruding boundary edges, meshes it for a host application and stores
//! it in the host object's attributes. [`EditSession`] drives a surface on
//! one host object the way an interactive tool does: drags at preview
//! resolution, commits at full resolution, cancel by reloading.
//!
//! # Example
//!
//! ```
//! use sculpt::{BezierSurface, EditSession, InMemoryObject, SurfaceConfig};
//! use sculpt_math::{Point3, Transform};
//!
//! let points: Vec<Point3> = (0..16)
//!     .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 0.0))
//!     .collect();
//!
//! let mut surface = BezierSurface::new(SurfaceConfig::default()).unwrap();
//! let patch = surface.add_patch(&points).unwrap();
//! let bottom = surface.topology().patch_edges(patch).unwrap()[0];
//!
//! let mut session =
//!     EditSession::create(InMemoryObject::new(), surface, Transform::identity()).unwrap();
//! session.extrude(&[bottom], false).unwrap();
//!
//! let reloaded = BezierSurface::load(session.object(), SurfaceConfig::default()).unwrap();
//! assert_eq!(reloaded.patches().len(), 2);
//! ```

pub mod config;
mod error;
mod extrude;
pub mod host;
pub mod persist;
mod selection;
mod session;
mod surface;

pub use config::{ConfigError, SurfaceConfig};
pub use error::{PersistError, Result, SurfaceError};
pub use host::{
    AttributeStore, AttributeValue, InMemoryObject, MeshTarget, ModelObject, StoredMesh,
    Transaction,
};
pub use selection::Selection;
pub use session::EditSession;
pub use surface::{BezierSurface, SurfaceState, MAX_SUBDIVS, MIN_SUBDIVS};

pub use sculpt_tessellate::{MeshBinding, MeshKey, Polygon, PolygonMesh};
pub use sculpt_topo::{EdgeId, EntityId, PatchId, PointId, Topology};
