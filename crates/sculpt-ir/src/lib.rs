#![warn(missing_docs)]

//! Persisted document format for sculpt Bezier surfaces.
//!
//! A surface is stored on its host object as three attributes in the
//! [`SURFACE_DICTIONARY`] dictionary: a type marker, a format version and
//! a JSON-encoded [`SurfaceDocument`].
//!
//! The document is purely indexed: positions are de-duplicated into one
//! list, control points reference positions, edges reference control
//! points and patches reference edges and interior points, all by index.
//! Two patches sharing an edge reference the same edge record, which is
//! what lets a reader rebuild the shared edge exactly once.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribute dictionary holding surface data.
pub const SURFACE_DICTIONARY: &str = "BezierSurface";
/// Key of the type marker attribute.
pub const TYPE_KEY: &str = "Type";
/// Key of the format version attribute.
pub const VERSION_KEY: &str = "Version";
/// Key of the JSON document attribute.
pub const DATA_KEY: &str = "Data";
/// Value of the type marker attribute.
pub const SURFACE_TYPE: &str = "BezierSurface";

/// Errors from reading or checking a surface document.
#[derive(Debug, Error)]
pub enum IrError {
    /// Version string is not `major.minor.patch`.
    #[error("malformed format version {0:?}")]
    MalformedVersion(String),

    /// The document is internally inconsistent.
    #[error("corrupt surface data: {0}")]
    Corrupt(String),

    /// JSON encoding or decoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Semantic version of the persisted format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
    /// Incompatible layout changes.
    pub major: u32,
    /// Backwards-compatible additions.
    pub minor: u32,
    /// Fixes.
    pub patch: u32,
}

impl FormatVersion {
    /// Version written by this implementation.
    pub const CURRENT: FormatVersion = FormatVersion::new(1, 0, 0);
    /// Oldest version this implementation still reads.
    pub const MIN_SUPPORTED: FormatVersion = FormatVersion::new(1, 0, 0);

    /// Create a version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a reader at [`FormatVersion::CURRENT`] understands this.
    ///
    /// Newer minor and patch releases of the current major version are
    /// readable; anything with a higher major is not.
    pub fn is_readable(&self) -> bool {
        self.major == Self::CURRENT.major && *self >= Self::MIN_SUPPORTED
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FormatVersion {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(IrError::MalformedVersion(s.to_string()));
        }
        let num = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| IrError::MalformedVersion(s.to_string()))
        };
        Ok(Self::new(num(parts[0])?, num(parts[1])?, num(parts[2])?))
    }
}

/// 3D position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Position {
    /// Create a position.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn key(&self) -> [u64; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

/// One control point, referencing its position by index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PointRecord {
    /// Patch corner.
    Vertex {
        /// Index into [`SurfaceDocument::positions`].
        position: usize,
    },
    /// Tangent handle.
    Handle {
        /// Index into [`SurfaceDocument::positions`].
        position: usize,
        /// Tangent continuity with the twin handle.
        linked: bool,
    },
    /// Patch interior point.
    Interior {
        /// Index into [`SurfaceDocument::positions`].
        position: usize,
    },
}

impl PointRecord {
    /// Position index of the record.
    pub fn position(&self) -> usize {
        match *self {
            PointRecord::Vertex { position }
            | PointRecord::Handle { position, .. }
            | PointRecord::Interior { position } => position,
        }
    }
}

/// An edge: 4 point indices `[V0, H0, H1, V1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Indices into [`SurfaceDocument::points`].
    pub points: [usize; 4],
}

/// A patch's use of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeUseRecord {
    /// Index into [`SurfaceDocument::edges`].
    pub edge: usize,
    /// Traversal direction.
    pub reversed: bool,
}

/// A patch, tagged by patch type.
///
/// The tag set is closed: an unknown `type` fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PatchRecord {
    /// Four-sided bicubic patch.
    QuadPatch {
        /// Edge uses in ring order: bottom, right, top, left.
        uses: [EdgeUseRecord; 4],
        /// Interior point indices into [`SurfaceDocument::points`].
        interior: [usize; 4],
        /// Flipped mesh winding.
        reversed: bool,
        /// Interior points derived from the boundary.
        automatic: bool,
    },
}

/// Record counts stored alongside the data for corruption checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    /// Number of distinct positions.
    pub positions: usize,
    /// Number of control points.
    pub points: usize,
    /// Number of edges.
    pub edges: usize,
    /// Number of patches.
    pub patches: usize,
}

/// The JSON payload of a persisted surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceDocument {
    /// Committed mesh subdivision level.
    pub subdivs: usize,
    /// Stored record counts.
    pub counts: RecordCounts,
    /// De-duplicated positions.
    pub positions: Vec<Position>,
    /// Control points.
    pub points: Vec<PointRecord>,
    /// Edges.
    pub edges: Vec<EdgeRecord>,
    /// Patches, in surface order.
    pub patches: Vec<PatchRecord>,
    #[serde(skip)]
    position_index: HashMap<[u64; 3], usize>,
}

impl SurfaceDocument {
    /// Create an empty document.
    pub fn new(subdivs: usize) -> Self {
        Self {
            subdivs,
            ..Self::default()
        }
    }

    /// Intern a position, returning its index.
    ///
    /// Bit-identical positions share one entry.
    pub fn add_position(&mut self, p: Position) -> usize {
        let positions = &mut self.positions;
        *self.position_index.entry(p.key()).or_insert_with(|| {
            positions.push(p);
            positions.len() - 1
        })
    }

    /// Append a control point record, returning its index.
    pub fn add_point(&mut self, record: PointRecord) -> usize {
        self.points.push(record);
        self.points.len() - 1
    }

    /// Append an edge record, returning its index.
    pub fn add_edge(&mut self, record: EdgeRecord) -> usize {
        self.edges.push(record);
        self.edges.len() - 1
    }

    /// Append a patch record, returning its index.
    pub fn add_patch(&mut self, record: PatchRecord) -> usize {
        self.patches.push(record);
        self.patches.len() - 1
    }

    /// Counts of the records actually present.
    pub fn actual_counts(&self) -> RecordCounts {
        RecordCounts {
            positions: self.positions.len(),
            points: self.points.len(),
            edges: self.edges.len(),
            patches: self.patches.len(),
        }
    }

    /// Store the current record counts.
    pub fn seal(&mut self) {
        self.counts = self.actual_counts();
    }

    /// Check stored counts and every index.
    pub fn validate(&self) -> Result<(), IrError> {
        let actual = self.actual_counts();
        if self.counts != actual {
            return Err(IrError::Corrupt(format!(
                "stored counts {:?} do not match records {:?}",
                self.counts, actual
            )));
        }
        for (i, point) in self.points.iter().enumerate() {
            if point.position() >= self.positions.len() {
                return Err(IrError::Corrupt(format!(
                    "point {i} references position {}",
                    point.position()
                )));
            }
        }
        for (i, edge) in self.edges.iter().enumerate() {
            if let Some(p) = edge.points.iter().find(|p| **p >= self.points.len()) {
                return Err(IrError::Corrupt(format!("edge {i} references point {p}")));
            }
        }
        for (i, patch) in self.patches.iter().enumerate() {
            let PatchRecord::QuadPatch { uses, interior, .. } = patch;
            if let Some(u) = uses.iter().find(|u| u.edge >= self.edges.len()) {
                return Err(IrError::Corrupt(format!(
                    "patch {i} references edge {}",
                    u.edge
                )));
            }
            if let Some(p) = interior.iter().find(|p| **p >= self.points.len()) {
                return Err(IrError::Corrupt(format!("patch {i} references point {p}")));
            }
        }
        Ok(())
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON string and validate.
    pub fn from_json(json: &str) -> Result<Self, IrError> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_edge_document() -> SurfaceDocument {
        let mut doc = SurfaceDocument::new(8);
        let mut ids = [0; 4];
        for (i, slot) in ids.iter_mut().enumerate() {
            let position = doc.add_position(Position::new(i as f64, 0.0, 0.0));
            *slot = doc.add_point(if i == 0 || i == 3 {
                PointRecord::Vertex { position }
            } else {
                PointRecord::Handle {
                    position,
                    linked: i == 1,
                }
            });
        }
        doc.add_edge(EdgeRecord { points: ids });
        doc.seal();
        doc
    }

    #[test]
    fn test_roundtrip_document() {
        let doc = one_edge_document();
        let json = doc.to_json().expect("serialize");
        let restored = SurfaceDocument::from_json(&json).expect("deserialize");
        assert_eq!(restored.points, doc.points);
        assert_eq!(restored.edges, doc.edges);
        assert_eq!(restored.counts.edges, 1);
        assert_eq!(restored.subdivs, 8);
    }

    #[test]
    fn test_positions_deduplicated() {
        let mut doc = SurfaceDocument::new(1);
        let a = doc.add_position(Position::new(1.0, 2.0, 3.0));
        let b = doc.add_position(Position::new(1.0, 2.0, 3.0));
        let c = doc.add_position(Position::new(1.0, 2.0, 3.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(doc.positions.len(), 2);
    }

    #[test]
    fn test_count_mismatch_is_corrupt() {
        let mut doc = one_edge_document();
        doc.counts.edges = 2;
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            SurfaceDocument::from_json(&json),
            Err(IrError::Corrupt(_))
        ));
    }

    #[test]
    fn test_out_of_range_index_is_corrupt() {
        let mut doc = one_edge_document();
        doc.edges[0].points[2] = 17;
        assert!(matches!(doc.validate(), Err(IrError::Corrupt(_))));

        let mut doc = one_edge_document();
        doc.add_patch(PatchRecord::QuadPatch {
            uses: [EdgeUseRecord { edge: 0, reversed: false }; 4],
            interior: [0, 1, 2, 9],
            reversed: false,
            automatic: false,
        });
        doc.seal();
        assert!(matches!(doc.validate(), Err(IrError::Corrupt(_))));
    }

    #[test]
    fn test_unknown_patch_type_rejected() {
        let json = r#"{"type":"TriPatch","uses":[],"interior":[],"reversed":false,"automatic":false}"#;
        assert!(serde_json::from_str::<PatchRecord>(json).is_err());
    }

    #[test]
    fn test_patch_record_tagged() {
        let record = PatchRecord::QuadPatch {
            uses: [EdgeUseRecord { edge: 3, reversed: true }; 4],
            interior: [0, 1, 2, 3],
            reversed: false,
            automatic: true,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""type":"QuadPatch""#));
        assert_eq!(serde_json::from_str::<PatchRecord>(&json).unwrap(), record);
    }

    #[test]
    fn test_format_version_parse_and_order() {
        let v: FormatVersion = "1.0.0".parse().unwrap();
        assert_eq!(v, FormatVersion::CURRENT);
        assert_eq!(v.to_string(), "1.0.0");
        assert!("1.2.0".parse::<FormatVersion>().unwrap().is_readable());
        assert!(!"2.0.0".parse::<FormatVersion>().unwrap().is_readable());
        assert!(!"0.9.1".parse::<FormatVersion>().unwrap().is_readable());
        assert!("0.9.1".parse::<FormatVersion>().unwrap() < FormatVersion::MIN_SUPPORTED);
        assert!(matches!(
            "1.x".parse::<FormatVersion>(),
            Err(IrError::MalformedVersion(_))
        ));
    }
}
