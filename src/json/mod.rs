//! serde DOM for the glTF 2.0 JSON schema.
//!
//! Every cross-reference in the document is a typed [`Index`] into one of
//! the root tables on [`Root`]. Unknown extensions and `extras` are carried
//! as raw JSON values so they round-trip verbatim.

pub mod accessor;
pub mod animation;
pub mod buffer;
pub mod camera;
pub mod image;
pub mod material;
pub mod mesh;
pub mod node;
pub mod root;
pub mod scene;
pub mod skin;
pub mod texture;

pub use accessor::{Accessor, ComponentType, Sparse, Type};
pub use animation::{Animation, Channel, Interpolation, Target, TargetPath};
pub use buffer::{Buffer, Target as BufferTarget, View};
pub use camera::Camera;
pub use image::Image;
pub use material::{AlphaMode, Material, TextureInfo};
pub use mesh::{Mesh, Mode, Primitive};
pub use node::Node;
pub use root::{AssetInfo, Root};
pub use scene::Scene;
pub use skin::Skin;
pub use texture::{Sampler, Texture};

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Raw extension objects keyed by extension name, preserved verbatim.
pub type ExtensionMap = serde_json::Map<String, serde_json::Value>;

/// Application-specific data carried through untouched.
pub type Extras = serde_json::Value;

/// A typed index into one of the root tables.
///
/// The phantom parameter only exists to stop a node index from being used
/// where a material index is expected; on the wire this is a plain integer.
pub struct Index<T>(u32, PhantomData<fn() -> T>);

impl<T> Index<T> {
    pub fn new(value: u32) -> Self {
        Index(value, PhantomData)
    }

    /// The raw table offset.
    pub fn value(&self) -> usize {
        self.0 as usize
    }
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Index<T> {}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> std::hash::Hash for Index<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({})", self.0)
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T> Serialize for Index<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de, T> Deserialize<'de> for Index<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        if value > u32::MAX as u64 {
            return Err(D::Error::custom(format!("index {value} out of range")));
        }
        Ok(Index::new(value as u32))
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

pub(crate) fn is_zero(value: &usize) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let idx: Index<Node> = Index::new(7);
        let text = serde_json::to_string(&idx).unwrap();
        assert_eq!(text, "7");
        let back: Index<Node> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, idx);
    }

    #[test]
    fn test_index_rejects_overflow() {
        let result: Result<Index<Node>, _> = serde_json::from_str("4294967296");
        assert!(result.is_err());
    }
}
