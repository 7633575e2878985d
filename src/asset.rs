//! The in-memory asset: the JSON root plus its resolved buffer bytes.

use crate::buffer::BufferSet;
use crate::error::{Error, Result};
use crate::json::{self, Index};
use glam::{Mat4, Quat, Vec3};

/// Local transform in decomposed form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Trs {
    fn default() -> Self {
        Trs {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Trs {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// An asset owns its root tables and buffer bytes for its whole lifetime;
/// views and decoded accessors borrow from it.
#[derive(Debug)]
pub struct Asset {
    pub root: json::Root,
    pub buffers: BufferSet,
}

impl Asset {
    pub fn new(root: json::Root, buffers: BufferSet) -> Self {
        Asset { root, buffers }
    }

    pub fn node(&self, index: Index<json::Node>) -> Result<&json::Node> {
        get(&self.root.nodes, index.value(), "/nodes")
    }

    pub fn mesh(&self, index: Index<json::Mesh>) -> Result<&json::Mesh> {
        get(&self.root.meshes, index.value(), "/meshes")
    }

    pub fn skin(&self, index: Index<json::Skin>) -> Result<&json::Skin> {
        get(&self.root.skins, index.value(), "/skins")
    }

    pub fn accessor(&self, index: Index<json::Accessor>) -> Result<&json::Accessor> {
        get(&self.root.accessors, index.value(), "/accessors")
    }

    pub fn animation(&self, index: usize) -> Result<&json::Animation> {
        get(&self.root.animations, index, "/animations")
    }

    pub fn scene(&self, index: Index<json::Scene>) -> Result<&json::Scene> {
        get(&self.root.scenes, index.value(), "/scenes")
    }

    /// Local transform of a node: the TRS fields, or the decomposed
    /// `matrix` when that form is used.
    pub fn node_trs(&self, node: &json::Node) -> Trs {
        if let Some(m) = node.matrix {
            let (scale, rotation, translation) =
                Mat4::from_cols_array(&m).to_scale_rotation_translation();
            return Trs {
                translation,
                rotation,
                scale,
            };
        }
        Trs {
            translation: node.translation.map(Vec3::from).unwrap_or(Vec3::ZERO),
            rotation: node
                .rotation
                .map(Quat::from_array)
                .unwrap_or(Quat::IDENTITY),
            scale: node.scale.map(Vec3::from).unwrap_or(Vec3::ONE),
        }
    }

    /// Derived parent-index table over the whole node forest. Built on
    /// demand; nodes keep child-only edges.
    pub fn parent_table(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.root.nodes.len()];
        for (index, node) in self.root.nodes.iter().enumerate() {
            for child in &node.children {
                if let Some(slot) = parents.get_mut(child.value()) {
                    *slot = Some(index);
                }
            }
        }
        parents
    }

    /// World matrix of one node, walking the derived parent chain.
    pub fn node_world_matrix(&self, index: usize, parents: &[Option<usize>]) -> Result<Mat4> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(at) = current {
            let node = get(&self.root.nodes, at, "/nodes")?;
            chain.push(self.node_trs(node).matrix());
            current = parents.get(at).copied().flatten();
            if chain.len() > self.root.nodes.len() {
                return Err(Error::invariant(
                    format!("/nodes/{index}"),
                    "parent chain contains a cycle",
                ));
            }
        }
        let mut world = Mat4::IDENTITY;
        for local in chain.iter().rev() {
            world *= *local;
        }
        Ok(world)
    }

    /// Depth-first pre-order walk of a scene, yielding
    /// `(parent_index, node_index, local_trs)` for every reachable node.
    pub fn for_each_node<F>(&self, scene: Index<json::Scene>, mut visit: F) -> Result<()>
    where
        F: FnMut(Option<usize>, usize, &Trs),
    {
        let scene = self.scene(scene)?;
        let mut stack: Vec<(Option<usize>, usize)> = Vec::new();
        for root in scene.nodes.iter().rev() {
            stack.push((None, root.value()));
        }
        let mut visited = vec![false; self.root.nodes.len()];
        while let Some((parent, index)) = stack.pop() {
            let node = get(&self.root.nodes, index, "/nodes")?;
            if visited[index] {
                return Err(Error::invariant(
                    format!("/nodes/{index}"),
                    "node reached twice during scene traversal",
                ));
            }
            visited[index] = true;
            let trs = self.node_trs(node);
            visit(parent, index, &trs);
            for child in node.children.iter().rev() {
                stack.push((Some(index), child.value()));
            }
        }
        Ok(())
    }
}

pub(crate) fn get<'a, T>(table: &'a [T], index: usize, pointer: &str) -> Result<&'a T> {
    table.get(index).ok_or(Error::BadReference {
        pointer: format!("{pointer}/{index}"),
        index,
        len: table.len(),
    })
}
