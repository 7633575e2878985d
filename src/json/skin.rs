//! Skin descriptor.

use super::{accessor, node, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

/// Binds a mesh's JOINTS_n indices to an ordered joint list plus
/// inverse-bind matrices. The position in `joints` is the joint index the
/// vertex attributes refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    /// MAT4 accessor, one matrix per joint. Absent means identity for
    /// every joint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<Index<accessor::Accessor>>,

    /// Common root of the joint hierarchy, if the producer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Index<node::Node>>,

    pub joints: Vec<Index<node::Node>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}
