//! Buffer and buffer-view descriptors.

use super::{is_zero, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

/// Usage hint for a view, serialized as the GL numeric constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Target {
    ArrayBuffer,
    ElementArrayBuffer,
}

impl TryFrom<u32> for Target {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            34962 => Ok(Target::ArrayBuffer),
            34963 => Ok(Target::ElementArrayBuffer),
            other => Err(format!("unknown bufferView target {other}")),
        }
    }
}

impl From<Target> for u32 {
    fn from(value: Target) -> u32 {
        match value {
            Target::ArrayBuffer => 34962,
            Target::ElementArrayBuffer => 34963,
        }
    }
}

/// A byte buffer. Exactly one of three backing stores applies: an external
/// URI, a base64 `data:` URI, or (first buffer of a GLB, `uri` absent) the
/// container's BIN chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    pub byte_length: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

/// A `(buffer, byteOffset, byteLength, byteStride?)` slice of a buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub buffer: Index<Buffer>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,

    pub byte_length: usize,

    /// Distance between elements for interleaved vertex data. Must be a
    /// multiple of the component size and at least one element wide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}
