//! The document root: 14 index-keyed tables plus extension bookkeeping.
//!
//! Field order matches the canonical key order the writer emits
//! (asset first, buffers last), so struct-order serialization doubles as
//! the canonical ordering.

use super::{
    accessor, animation, buffer, camera, image, material, mesh, node, scene, skin, texture,
    ExtensionMap, Extras, Index,
};
use serde::{Deserialize, Serialize};

/// `asset` metadata; `version` is always `"2.0"` for this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

impl Default for AssetInfo {
    fn default() -> Self {
        AssetInfo {
            copyright: None,
            generator: None,
            version: "2.0".to_string(),
            min_version: None,
            extensions: None,
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    pub asset: AssetInfo,

    /// Every extension name that appears anywhere in the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,

    /// Subset of `extensions_used` a consumer must understand to load the
    /// asset at all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,

    /// Default scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<Index<scene::Scene>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<scene::Scene>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<node::Node>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<camera::Camera>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<animation::Animation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<material::Material>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<mesh::Mesh>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<texture::Texture>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<image::Image>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skins: Vec<skin::Skin>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<accessor::Accessor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<buffer::View>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<texture::Sampler>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<buffer::Buffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_serializes_asset_only() {
        let root = Root::default();
        let text = serde_json::to_string(&root).unwrap();
        assert_eq!(text, r#"{"asset":{"version":"2.0"}}"#);
    }

    #[test]
    fn test_root_key_order_is_canonical() {
        let text = r#"{
            "buffers": [{"byteLength": 4}],
            "asset": {"version": "2.0", "generator": "test"},
            "scenes": [{"nodes": [0]}],
            "nodes": [{}],
            "scene": 0
        }"#;
        let root: Root = serde_json::from_str(text).unwrap();
        let out = serde_json::to_string(&root).unwrap();
        let asset_pos = out.find("\"asset\"").unwrap();
        let scene_pos = out.find("\"scene\"").unwrap();
        let buffers_pos = out.find("\"buffers\"").unwrap();
        assert!(asset_pos < scene_pos);
        assert!(scene_pos < buffers_pos);
    }
}
