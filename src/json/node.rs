//! Scene-graph node descriptor.

use super::{camera, mesh, skin, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

/// A node holds either a local TRS or a column-major 4x4 matrix, never
/// both. Children are edges of a forest; parents are derived, not stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<Index<camera::Camera>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Index<Node>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<Index<skin::Skin>>,

    /// Column-major, 16 values. Mutually exclusive with TRS fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Index<mesh::Mesh>>,

    /// Unit quaternion `[x, y, z, w]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,

    /// Morph weight override for the referenced mesh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

impl Node {
    pub fn has_trs(&self) -> bool {
        self.translation.is_some() || self.rotation.is_some() || self.scale.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_node_is_empty_object() {
        let node = Node::default();
        assert_eq!(serde_json::to_string(&node).unwrap(), "{}");
        assert!(!node.has_trs());
    }

    #[test]
    fn test_trs_node() {
        let text = r#"{"rotation":[0.0,0.0,0.0,1.0],"translation":[1.0,2.0,3.0]}"#;
        let node: Node = serde_json::from_str(text).unwrap();
        assert!(node.has_trs());
        assert!(node.matrix.is_none());
    }
}
