//! Skin resolver: joint matrices and bind-pose vertex skinning.

use crate::accessor::{self, DecodeCache};
use crate::asset::Asset;
use crate::error::{Error, Result};
use crate::json::Index;
use crate::mesh::PrimitiveData;
use glam::{Mat3, Mat4, Vec3};

/// Per-joint skinning matrices: `BindWorld_j * InverseBindMatrix_j`.
///
/// A skin without `inverseBindMatrices` uses identity for every matrix.
pub fn joint_matrices(
    asset: &Asset,
    skin_index: usize,
    cache: &mut DecodeCache,
) -> Result<Vec<Mat4>> {
    let pointer = format!("/skins/{skin_index}");
    let skin = asset.skin(Index::new(skin_index as u32))?;
    if skin.joints.is_empty() {
        return Err(Error::invariant(&pointer, "skin has no joints"));
    }

    let inverse_bind: Option<Vec<Mat4>> = match skin.inverse_bind_matrices {
        Some(accessor_index) => {
            let decoded =
                accessor::decode(&asset.root, &asset.buffers, accessor_index.value(), cache)?;
            if decoded.dims != 16 || decoded.count < skin.joints.len() {
                return Err(Error::invariant(
                    format!("{pointer}/inverseBindMatrices"),
                    format!(
                        "expected {} MAT4 elements, accessor has {} of width {}",
                        skin.joints.len(),
                        decoded.count,
                        decoded.dims
                    ),
                ));
            }
            let flat = decoded.to_f32();
            Some(
                flat.chunks_exact(16)
                    .map(|m| Mat4::from_cols_array(m.try_into().unwrap_or(&[0.0; 16])))
                    .collect(),
            )
        }
        None => None,
    };

    let parents = asset.parent_table();
    let mut matrices = Vec::with_capacity(skin.joints.len());
    for (slot, joint) in skin.joints.iter().enumerate() {
        let bind_world = asset.node_world_matrix(joint.value(), &parents)?;
        let ibm = inverse_bind
            .as_ref()
            .map(|all| all[slot])
            .unwrap_or(Mat4::IDENTITY);
        matrices.push(bind_world * ibm);
    }
    Ok(matrices)
}

/// Bind-pose positions (and normals, when present) of a skinned primitive.
///
/// Each vertex is the weight-blended transform over every joint/weight
/// slot across all sets, divided by the weight sum. Zero-weight vertices
/// get full weight on slot 0 of set 0; without the fixup they would
/// collapse to the origin.
pub fn skin_primitive(
    primitive: &PrimitiveData,
    joint_matrices: &[Mat4],
    pointer: &str,
) -> Result<(Vec<[f32; 3]>, Option<Vec<[f32; 3]>>)> {
    let vertex_count = primitive.vertex_count();
    if primitive.joints.is_empty() || primitive.joints.len() != primitive.weights.len() {
        return Err(Error::invariant(
            pointer,
            format!(
                "primitive has {} JOINTS_n sets and {} WEIGHTS_n sets",
                primitive.joints.len(),
                primitive.weights.len()
            ),
        ));
    }

    let normal_matrices: Option<Vec<Mat3>> = primitive
        .normals
        .as_ref()
        .map(|_| joint_matrices.iter().map(|m| Mat3::from_mat4(*m)).collect());

    let mut positions = Vec::with_capacity(vertex_count);
    let mut normals = primitive
        .normals
        .as_ref()
        .map(|_| Vec::with_capacity(vertex_count));

    for v in 0..vertex_count {
        let mut weight_sum = 0.0f32;
        for set in &primitive.weights {
            for w in set[v] {
                weight_sum += w;
            }
        }

        let position = Vec3::from(primitive.positions[v]);
        let mut skinned = Vec3::ZERO;
        let mut skinned_normal = Vec3::ZERO;

        if weight_sum == 0.0 {
            tracing::warn!(vertex = v, %pointer, "zero weight sum, assigning joint slot 0");
            let joint = primitive.joints[0][v][0] as usize;
            let matrix = matrix_for(joint, joint_matrices, pointer)?;
            skinned = matrix.transform_point3(position);
            if let (Some(normal_matrices), Some(source)) = (&normal_matrices, &primitive.normals) {
                let n = Vec3::from(source[v]);
                skinned_normal = normal_matrices[joint] * n;
            }
        } else {
            for (set_index, joints) in primitive.joints.iter().enumerate() {
                let weights = &primitive.weights[set_index];
                for slot in 0..4 {
                    let w = weights[v][slot];
                    if w == 0.0 {
                        continue;
                    }
                    let joint = joints[v][slot] as usize;
                    let matrix = matrix_for(joint, joint_matrices, pointer)?;
                    skinned += matrix.transform_point3(position) * w;
                    if let (Some(normal_matrices), Some(source)) =
                        (&normal_matrices, &primitive.normals)
                    {
                        let n = Vec3::from(source[v]);
                        skinned_normal += (normal_matrices[joint] * n) * w;
                    }
                }
            }
            // Non-unit weight sums normalize away.
            skinned /= weight_sum;
        }

        positions.push(skinned.to_array());
        if let Some(out) = &mut normals {
            out.push(skinned_normal.normalize_or_zero().to_array());
        }
    }

    Ok((positions, normals))
}

fn matrix_for(joint: usize, matrices: &[Mat4], pointer: &str) -> Result<Mat4> {
    matrices.get(joint).copied().ok_or(Error::BadReference {
        pointer: pointer.to_string(),
        index: joint,
        len: matrices.len(),
    })
}
