//! Accessor and sparse-overlay descriptors.

use super::{buffer, is_false, is_zero, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

/// Scalar component storage type, serialized as the GL numeric constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            5120 => Ok(ComponentType::I8),
            5121 => Ok(ComponentType::U8),
            5122 => Ok(ComponentType::I16),
            5123 => Ok(ComponentType::U16),
            5125 => Ok(ComponentType::U32),
            5126 => Ok(ComponentType::F32),
            other => Err(format!("unknown componentType {other}")),
        }
    }
}

impl From<ComponentType> for u32 {
    fn from(value: ComponentType) -> u32 {
        value.code()
    }
}

/// Element shape: how many components make up one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    #[serde(rename = "SCALAR")]
    Scalar,
    #[serde(rename = "VEC2")]
    Vec2,
    #[serde(rename = "VEC3")]
    Vec3,
    #[serde(rename = "VEC4")]
    Vec4,
    #[serde(rename = "MAT2")]
    Mat2,
    #[serde(rename = "MAT3")]
    Mat3,
    #[serde(rename = "MAT4")]
    Mat4,
}

impl Type {
    /// Components per element.
    pub fn components(self) -> usize {
        match self {
            Type::Scalar => 1,
            Type::Vec2 => 2,
            Type::Vec3 => 3,
            Type::Vec4 => 4,
            Type::Mat2 => 4,
            Type::Mat3 => 9,
            Type::Mat4 => 16,
        }
    }
}

/// Typed view over a slice of buffer bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    /// Backing view. When absent the accessor reads as zeros, then the
    /// sparse overlay (if any) is applied on top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<Index<buffer::View>>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,

    pub component_type: ComponentType,

    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,

    /// Element count (not byte count).
    pub count: usize,

    #[serde(rename = "type")]
    pub type_: Type,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<Sparse>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

/// Sparse overlay: `count` (index, value) overrides applied over the dense
/// (or zero-initialized) content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sparse {
    pub count: usize,
    pub indices: SparseIndices,
    pub values: SparseValues,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndices {
    pub buffer_view: Index<buffer::View>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,

    /// One of U8 / U16 / U32.
    pub component_type: ComponentType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValues {
    pub buffer_view: Index<buffer::View>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}
