//! Error types for surface operations and persistence.

use sculpt_bezier::BezierError;
use sculpt_ir::IrError;
use sculpt_tessellate::TessellateError;
use sculpt_topo::{EdgeId, PatchId, TopoError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors from reading persisted surface data.
///
/// Any of these leaves the caller without a surface; nothing is partially
/// loaded.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The object carries no surface marker.
    #[error("object is not a Bezier surface")]
    NotASurface,

    /// Data was written by a newer, incompatible format.
    #[error("surface data version {found} is newer than supported version {supported}")]
    VersionTooNew {
        /// Stored version.
        found: String,
        /// Newest version this build reads.
        supported: String,
    },

    /// Data predates the oldest readable format.
    #[error("surface data version {found} is older than minimum version {minimum}")]
    VersionTooOld {
        /// Stored version.
        found: String,
        /// Oldest version this build reads.
        minimum: String,
    },

    /// The stored version string is unreadable.
    #[error("malformed surface data version {0:?}")]
    MalformedVersion(String),

    /// Counts, indices or entity kinds do not add up.
    #[error("corrupt surface data: {0}")]
    Corrupt(String),

    /// The JSON payload could not be decoded.
    #[error("surface data json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<IrError> for PersistError {
    fn from(e: IrError) -> Self {
        match e {
            IrError::MalformedVersion(v) => PersistError::MalformedVersion(v),
            IrError::Corrupt(msg) => PersistError::Corrupt(msg),
            IrError::Json(e) => PersistError::Json(e),
        }
    }
}

/// Errors from surface editing.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// Entity graph error, including use of deleted entities.
    #[error(transparent)]
    Topo(#[from] TopoError),

    /// Bezier evaluation error.
    #[error(transparent)]
    Bezier(#[from] BezierError),

    /// Loading or saving failed.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subdivision count outside the accepted range.
    #[error("subdivisions {value} out of range {min}..={max}")]
    SubdivsOutOfRange {
        /// Rejected value.
        value: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// The edge is used by more than one patch, so it has no open side.
    #[error("cannot extrude edge {edge:?}: shared by {patches} patches")]
    SharedEdge {
        /// The edge.
        edge: EdgeId,
        /// Number of patches using it.
        patches: usize,
    },

    /// The edge belongs to no patch.
    #[error("edge {0:?} is not on the boundary of any patch")]
    NotBoundary(EdgeId),

    /// The same edge was given twice to one extrusion.
    #[error("edge {0:?} listed more than once")]
    DuplicateEdge(EdgeId),

    /// The edge has zero length, or a neighbouring edge has coincident
    /// handles so no direction exists.
    #[error("cannot extrude edge {0:?}: zero-length edge or extrusion direction")]
    DegenerateExtrusion(EdgeId),

    /// The patch is not part of this surface.
    #[error("patch {0:?} does not belong to this surface")]
    UnknownPatch(PatchId),

    /// A drag was started while another one is active.
    #[error("a drag is already in progress")]
    DragInProgress,

    /// A drag step arrived without an active drag.
    #[error("no drag in progress")]
    NoActiveDrag,
}

impl From<TessellateError> for SurfaceError {
    fn from(e: TessellateError) -> Self {
        match e {
            TessellateError::Topo(e) => SurfaceError::Topo(e),
            TessellateError::Bezier(e) => SurfaceError::Bezier(e),
        }
    }
}

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, SurfaceError>;
