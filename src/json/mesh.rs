//! Mesh and primitive descriptors.

use super::{accessor, material, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geometry mode, serialized as the GL numeric constant (0..=6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Mode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Mode {
    pub fn is_triangles(&self) -> bool {
        matches!(self, Mode::Triangles)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Triangles
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Mode::Points),
            1 => Ok(Mode::Lines),
            2 => Ok(Mode::LineLoop),
            3 => Ok(Mode::LineStrip),
            4 => Ok(Mode::Triangles),
            5 => Ok(Mode::TriangleStrip),
            6 => Ok(Mode::TriangleFan),
            other => Err(format!("unknown primitive mode {other}")),
        }
    }
}

impl From<Mode> for u32 {
    fn from(value: Mode) -> u32 {
        value as u32
    }
}

/// Attribute maps are ordered so serialization is deterministic.
pub type AttributeMap = BTreeMap<String, Index<accessor::Accessor>>;

/// One drawable unit: a geometry mode, attribute accessors, optional
/// indices and material, plus morph targets (per-vertex deltas).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Primitive {
    pub attributes: AttributeMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Index<accessor::Accessor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Index<material::Material>>,

    #[serde(default, skip_serializing_if = "Mode::is_triangles")]
    pub mode: Mode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<AttributeMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    pub primitives: Vec<Primitive>,

    /// Default morph weights, one per target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    /// `extras.targetNames` holds morph target names when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

impl Mesh {
    /// Morph target names: `extras.targetNames` when present, otherwise
    /// synthesized `target_k` names.
    pub fn target_names(&self) -> Vec<String> {
        let count = self
            .primitives
            .first()
            .map(|p| p.targets.len())
            .unwrap_or(0);
        if let Some(names) = self
            .extras
            .as_ref()
            .and_then(|e| e.get("targetNames"))
            .and_then(|v| v.as_array())
        {
            let named: Vec<String> = names
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if named.len() == count {
                return named;
            }
        }
        (0..count).map(|k| format!("target_{k}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_default_omitted() {
        let text = r#"{"attributes":{"POSITION":0}}"#;
        let prim: Primitive = serde_json::from_str(text).unwrap();
        assert_eq!(prim.mode, Mode::Triangles);
        assert_eq!(serde_json::to_string(&prim).unwrap(), text);
    }

    #[test]
    fn test_target_names_fallback() {
        let text = r#"{"primitives":[{"attributes":{"POSITION":0},"targets":[{"POSITION":1},{"POSITION":2}]}]}"#;
        let mesh: Mesh = serde_json::from_str(text).unwrap();
        assert_eq!(mesh.target_names(), vec!["target_0", "target_1"]);
    }

    #[test]
    fn test_target_names_from_extras() {
        let text = r#"{"primitives":[{"attributes":{"POSITION":0},"targets":[{"POSITION":1}]}],"extras":{"targetNames":["Smile"]}}"#;
        let mesh: Mesh = serde_json::from_str(text).unwrap();
        assert_eq!(mesh.target_names(), vec!["Smile"]);
    }
}
