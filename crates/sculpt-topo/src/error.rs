//! Error types for entity graph operations.

use thiserror::Error;

use crate::{EdgeId, EntityId, EntityKind, PatchId, PointId};

/// Errors raised by the entity graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopoError {
    /// The entity was invalidated; its handle must not be used any more.
    #[error("deleted entity: {0:?}")]
    Deleted(EntityId),

    /// `from` does not accept links to entities of kind `to`.
    #[error("invalid link type: {from:?} cannot link to {to:?}")]
    InvalidLinkType {
        /// Kind of the entity receiving the link.
        from: EntityKind,
        /// Kind of the entity being linked.
        to: EntityKind,
    },

    /// Tried to unlink entities that are not linked.
    #[error("{from:?} is not linked to {to:?}")]
    NotLinked {
        /// Entity whose link set was searched.
        from: EntityId,
        /// Entity that was not found.
        to: EntityId,
    },

    /// Wrong number of control points for an edge or patch.
    #[error("expected {expected} control points, got {found}")]
    InvalidPointCount {
        /// Number of points required.
        expected: usize,
        /// Number of points supplied.
        found: usize,
    },

    /// An entity of the wrong kind was supplied.
    #[error("{id:?} is a {found:?}, expected a {expected:?}")]
    WrongKind {
        /// Offending entity.
        id: EntityId,
        /// Kind the operation needs.
        expected: EntityKind,
        /// Kind the entity actually has.
        found: EntityKind,
    },

    /// A handle is already bound to another vertex or edge.
    #[error("handle {handle:?} already belongs to {owner:?}")]
    HandleInUse {
        /// The handle.
        handle: PointId,
        /// The vertex or edge it is bound to.
        owner: EntityId,
    },

    /// An interior point already belongs to another patch.
    #[error("interior point {point:?} already belongs to {owner:?}")]
    InteriorInUse {
        /// The interior point.
        point: PointId,
        /// The patch owning it.
        owner: PatchId,
    },

    /// Consecutive edge uses of a patch do not meet at a shared vertex.
    #[error("edge uses {slot} and {next} of the patch do not share a corner vertex")]
    InconsistentRing {
        /// Ring slot whose end vertex mismatches.
        slot: usize,
        /// The following slot.
        next: usize,
    },

    /// The edge already joins the maximum of two patches.
    #[error("edge {0:?} is already used by two patches")]
    EdgeFull(EdgeId),

    /// The edge is not used by the patch.
    #[error("edge {edge:?} is not used by patch {patch:?}")]
    EdgeNotInPatch {
        /// The edge.
        edge: EdgeId,
        /// The patch.
        patch: PatchId,
    },

    /// Two edges cannot be merged because their end vertices differ.
    #[error("edges {keep:?} and {drop:?} do not share both end vertices")]
    EdgeEndpointsDiffer {
        /// Edge that survives.
        keep: EdgeId,
        /// Edge that would be removed.
        drop: EdgeId,
    },
}

/// Result type for entity graph operations.
pub type Result<T> = std::result::Result<T, TopoError>;
