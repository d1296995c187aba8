//! Boundary to the host application.
//!
//! The surface core never talks to a modeler directly. It reads and writes
//! attributes, replaces or patches a polygon mesh, and brackets edits in
//! transactions through the traits here. [`InMemoryObject`] implements all
//! of them for tests and the command-line front end.

use std::collections::BTreeMap;

use sculpt_math::Point3;
use sculpt_tessellate::PolygonMesh;
use serde::{Deserialize, Serialize};

/// A value stored in a host attribute dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
}

impl AttributeValue {
    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

/// Named attributes on a host object, grouped into dictionaries.
pub trait AttributeStore {
    /// Read an attribute.
    fn get_attribute(&self, dictionary: &str, key: &str) -> Option<AttributeValue>;

    /// Write an attribute, creating the dictionary if needed.
    fn set_attribute(&mut self, dictionary: &str, key: &str, value: AttributeValue);

    /// Remove an attribute. Returns whether it existed.
    fn delete_attribute(&mut self, dictionary: &str, key: &str) -> bool;
}

/// Polygon mesh owned by a host object.
pub trait MeshTarget {
    /// Replace the whole mesh.
    fn replace_mesh(&mut self, mesh: &PolygonMesh);

    /// Move existing mesh points, keeping the polygons.
    fn set_mesh_points(&mut self, updates: &[(u32, Point3)]);
}

/// Undoable operation bracket. The defaults do nothing.
pub trait Transaction {
    /// Start a named operation.
    fn begin_operation(&mut self, _name: &str) {}

    /// Commit the open operation.
    fn commit_operation(&mut self) {}

    /// Roll back the open operation.
    fn abort_operation(&mut self) {}
}

/// Everything a surface needs from the object it lives on.
pub trait ModelObject: AttributeStore + MeshTarget + Transaction {}

impl<T: AttributeStore + MeshTarget + Transaction> ModelObject for T {}

/// Mesh as stored by [`InMemoryObject`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMesh {
    /// Point positions.
    pub points: Vec<[f64; 3]>,
    /// Polygons as point index lists.
    pub polygons: Vec<Vec<u32>>,
}

/// A host object kept entirely in memory.
///
/// Serializable, so the CLI can keep one in a JSON file between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryObject {
    /// Attribute dictionaries.
    pub attributes: BTreeMap<String, BTreeMap<String, AttributeValue>>,
    /// Current mesh.
    pub mesh: StoredMesh,
    /// Names of committed operations, oldest first.
    pub history: Vec<String>,
    #[serde(skip)]
    open_operation: Option<String>,
    #[serde(skip)]
    mesh_rebuilds: usize,
    #[serde(skip)]
    point_updates: usize,
}

impl InMemoryObject {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the operation currently open, if any.
    pub fn open_operation(&self) -> Option<&str> {
        self.open_operation.as_deref()
    }

    /// Number of [`MeshTarget::replace_mesh`] calls.
    pub fn mesh_rebuilds(&self) -> usize {
        self.mesh_rebuilds
    }

    /// Number of [`MeshTarget::set_mesh_points`] calls.
    pub fn point_updates(&self) -> usize {
        self.point_updates
    }
}

impl AttributeStore for InMemoryObject {
    fn get_attribute(&self, dictionary: &str, key: &str) -> Option<AttributeValue> {
        self.attributes.get(dictionary)?.get(key).cloned()
    }

    fn set_attribute(&mut self, dictionary: &str, key: &str, value: AttributeValue) {
        self.attributes
            .entry(dictionary.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn delete_attribute(&mut self, dictionary: &str, key: &str) -> bool {
        let Some(dict) = self.attributes.get_mut(dictionary) else {
            return false;
        };
        let removed = dict.remove(key).is_some();
        if dict.is_empty() {
            self.attributes.remove(dictionary);
        }
        removed
    }
}

impl MeshTarget for InMemoryObject {
    fn replace_mesh(&mut self, mesh: &PolygonMesh) {
        self.mesh = StoredMesh {
            points: mesh.points().iter().map(|p| [p.x, p.y, p.z]).collect(),
            polygons: mesh
                .polygons()
                .iter()
                .map(|poly| poly.indices().to_vec())
                .collect(),
        };
        self.mesh_rebuilds += 1;
    }

    fn set_mesh_points(&mut self, updates: &[(u32, Point3)]) {
        for (index, p) in updates {
            if let Some(slot) = self.mesh.points.get_mut(*index as usize) {
                *slot = [p.x, p.y, p.z];
            }
        }
        self.point_updates += 1;
    }
}

impl Transaction for InMemoryObject {
    fn begin_operation(&mut self, name: &str) {
        self.open_operation = Some(name.to_string());
    }

    fn commit_operation(&mut self) {
        if let Some(name) = self.open_operation.take() {
            self.history.push(name);
        }
    }

    fn abort_operation(&mut self) {
        self.open_operation = None;
    }
}
