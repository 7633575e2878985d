//! Animation, channel and sampler descriptors.

use super::{accessor, node, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    #[serde(rename = "LINEAR")]
    Linear,
    #[serde(rename = "STEP")]
    Step,
    #[serde(rename = "CUBICSPLINE")]
    CubicSpline,
}

impl Interpolation {
    pub fn is_linear(&self) -> bool {
        matches!(self, Interpolation::Linear)
    }

    /// Output elements stored per keyframe: CUBICSPLINE stores
    /// in-tangent, value, out-tangent.
    pub fn output_stride(&self) -> usize {
        match self {
            Interpolation::CubicSpline => 3,
            _ => 1,
        }
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Linear
    }
}

/// Animated property on the classic `(node, path)` target form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

/// Channel target. `node` may be absent when the target is addressed by
/// the `KHR_animation_pointer` extension instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Index<node::Node>>,

    pub path: TargetPathKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

/// `path` is either one of the four classic names or the literal string
/// `"pointer"` introduced by `KHR_animation_pointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetPathKind {
    Classic(TargetPath),
    Pointer(PointerPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPath {
    Pointer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Index into the owning animation's sampler list.
    pub sampler: usize,

    pub target: Target,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

/// Keyframe times (`input`, seconds, SCALAR f32) and values (`output`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    pub input: Index<accessor::Accessor>,

    #[serde(default, skip_serializing_if = "Interpolation::is_linear")]
    pub interpolation: Interpolation,

    pub output: Index<accessor::Accessor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    pub channels: Vec<Channel>,
    pub samplers: Vec<Sampler>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}
