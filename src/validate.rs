//! Single-pass validator over a materialized asset.
//!
//! The validator never mutates the asset and never aborts: it walks every
//! table once and accumulates diagnostics. Fatal structural problems are
//! reported as [`Severity::Error`]; callers decide whether to promote them.

use crate::accessor::{self, DecodeCache};
use crate::asset::Asset;
use crate::error::Error;
use crate::json::{self, animation::TargetPathKind, TargetPath};
use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One finding, tied to a JSON-pointer-like location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pointer: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            pointer: pointer.into(),
            message: message.into(),
        }
    }

    pub fn warning(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            pointer: pointer.into(),
            message: message.into(),
        }
    }

    pub fn info(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Info,
            pointer: pointer.into(),
            message: message.into(),
        }
    }
}

/// Validate `asset`, returning every diagnostic found.
pub fn validate(asset: &Asset) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let root = &asset.root;

    check_references(root, &mut out);
    check_node_transforms(root, &mut out);
    check_scene_graphs(root, &mut out);
    check_skins(root, &mut out);
    check_required_subset_of_used(root, &mut out);

    // Data-plane checks need buffer bytes; lazy assets may not have them
    // yet, in which case these checks are silently skipped.
    let mut cache = DecodeCache::new();
    check_primitive_indices(asset, &mut cache, &mut out);
    check_rotation_outputs(asset, &mut cache, &mut out);
    check_sparse_accessors(asset, &mut cache, &mut out);
    check_image_mime(asset, &mut out);

    out
}

fn index_in<T>(
    out: &mut Vec<Diagnostic>,
    table: &[T],
    index: usize,
    pointer: String,
    table_name: &str,
) {
    if index >= table.len() {
        out.push(Diagnostic::error(
            pointer,
            format!("index {index} out of range, {table_name} has {}", table.len()),
        ));
    }
}

fn check_references(root: &json::Root, out: &mut Vec<Diagnostic>) {
    if let Some(scene) = root.scene {
        index_in(out, &root.scenes, scene.value(), "/scene".to_string(), "scenes");
    }
    for (s, scene) in root.scenes.iter().enumerate() {
        for (k, node) in scene.nodes.iter().enumerate() {
            index_in(out, &root.nodes, node.value(), format!("/scenes/{s}/nodes/{k}"), "nodes");
        }
    }
    for (n, node) in root.nodes.iter().enumerate() {
        for (k, child) in node.children.iter().enumerate() {
            index_in(out, &root.nodes, child.value(), format!("/nodes/{n}/children/{k}"), "nodes");
        }
        if let Some(mesh) = node.mesh {
            index_in(out, &root.meshes, mesh.value(), format!("/nodes/{n}/mesh"), "meshes");
        }
        if let Some(skin) = node.skin {
            index_in(out, &root.skins, skin.value(), format!("/nodes/{n}/skin"), "skins");
        }
        if let Some(camera) = node.camera {
            index_in(out, &root.cameras, camera.value(), format!("/nodes/{n}/camera"), "cameras");
        }
    }
    for (m, mesh) in root.meshes.iter().enumerate() {
        for (p, primitive) in mesh.primitives.iter().enumerate() {
            let base = format!("/meshes/{m}/primitives/{p}");
            for (semantic, accessor) in &primitive.attributes {
                index_in(
                    out,
                    &root.accessors,
                    accessor.value(),
                    format!("{base}/attributes/{semantic}"),
                    "accessors",
                );
            }
            if let Some(indices) = primitive.indices {
                index_in(out, &root.accessors, indices.value(), format!("{base}/indices"), "accessors");
            }
            if let Some(material) = primitive.material {
                index_in(out, &root.materials, material.value(), format!("{base}/material"), "materials");
            }
            for (t, target) in primitive.targets.iter().enumerate() {
                for (semantic, accessor) in target {
                    index_in(
                        out,
                        &root.accessors,
                        accessor.value(),
                        format!("{base}/targets/{t}/{semantic}"),
                        "accessors",
                    );
                }
            }
        }
    }
    for (a, accessor) in root.accessors.iter().enumerate() {
        if let Some(view) = accessor.buffer_view {
            index_in(out, &root.buffer_views, view.value(), format!("/accessors/{a}/bufferView"), "bufferViews");
        }
        if let Some(sparse) = &accessor.sparse {
            index_in(
                out,
                &root.buffer_views,
                sparse.indices.buffer_view.value(),
                format!("/accessors/{a}/sparse/indices/bufferView"),
                "bufferViews",
            );
            index_in(
                out,
                &root.buffer_views,
                sparse.values.buffer_view.value(),
                format!("/accessors/{a}/sparse/values/bufferView"),
                "bufferViews",
            );
        }
    }
    for (v, view) in root.buffer_views.iter().enumerate() {
        let pointer = format!("/bufferViews/{v}");
        index_in(out, &root.buffers, view.buffer.value(), format!("{pointer}/buffer"), "buffers");
        if let Some(buffer) = root.buffers.get(view.buffer.value()) {
            let end = view.byte_offset + view.byte_length;
            if end > buffer.byte_length {
                out.push(Diagnostic::error(
                    pointer,
                    format!("view ends at {end}, buffer byteLength is {}", buffer.byte_length),
                ));
            }
        }
    }
    for (s, skin) in root.skins.iter().enumerate() {
        for (k, joint) in skin.joints.iter().enumerate() {
            index_in(out, &root.nodes, joint.value(), format!("/skins/{s}/joints/{k}"), "nodes");
        }
        if let Some(skeleton) = skin.skeleton {
            index_in(out, &root.nodes, skeleton.value(), format!("/skins/{s}/skeleton"), "nodes");
        }
        if let Some(ibm) = skin.inverse_bind_matrices {
            index_in(out, &root.accessors, ibm.value(), format!("/skins/{s}/inverseBindMatrices"), "accessors");
        }
    }
    for (a, animation) in root.animations.iter().enumerate() {
        for (c, channel) in animation.channels.iter().enumerate() {
            let base = format!("/animations/{a}/channels/{c}");
            index_in(out, &animation.samplers, channel.sampler, format!("{base}/sampler"), "samplers");
            if let Some(node) = channel.target.node {
                index_in(out, &root.nodes, node.value(), format!("{base}/target/node"), "nodes");
            }
        }
        for (s, sampler) in animation.samplers.iter().enumerate() {
            let base = format!("/animations/{a}/samplers/{s}");
            index_in(out, &root.accessors, sampler.input.value(), format!("{base}/input"), "accessors");
            index_in(out, &root.accessors, sampler.output.value(), format!("{base}/output"), "accessors");
        }
    }
    for (t, texture) in root.textures.iter().enumerate() {
        if let Some(sampler) = texture.sampler {
            index_in(out, &root.samplers, sampler.value(), format!("/textures/{t}/sampler"), "samplers");
        }
        if let Some(source) = texture.source {
            index_in(out, &root.images, source.value(), format!("/textures/{t}/source"), "images");
        }
    }
    for (i, image) in root.images.iter().enumerate() {
        if let Some(view) = image.buffer_view {
            index_in(out, &root.buffer_views, view.value(), format!("/images/{i}/bufferView"), "bufferViews");
        }
    }
    for (m, material) in root.materials.iter().enumerate() {
        let mut check_texture = |index: json::Index<json::Texture>, pointer: String| {
            index_in(out, &root.textures, index.value(), pointer, "textures");
        };
        if let Some(pbr) = &material.pbr_metallic_roughness {
            if let Some(info) = &pbr.base_color_texture {
                check_texture(info.index, format!("/materials/{m}/pbrMetallicRoughness/baseColorTexture/index"));
            }
            if let Some(info) = &pbr.metallic_roughness_texture {
                check_texture(info.index, format!("/materials/{m}/pbrMetallicRoughness/metallicRoughnessTexture/index"));
            }
        }
        if let Some(info) = &material.normal_texture {
            check_texture(info.index, format!("/materials/{m}/normalTexture/index"));
        }
        if let Some(info) = &material.occlusion_texture {
            check_texture(info.index, format!("/materials/{m}/occlusionTexture/index"));
        }
        if let Some(info) = &material.emissive_texture {
            check_texture(info.index, format!("/materials/{m}/emissiveTexture/index"));
        }
    }
}

fn check_node_transforms(root: &json::Root, out: &mut Vec<Diagnostic>) {
    for (n, node) in root.nodes.iter().enumerate() {
        let pointer = format!("/nodes/{n}");
        match node.matrix {
            Some(m) => {
                if node.has_trs() {
                    out.push(Diagnostic::error(
                        &pointer,
                        "node carries both matrix and translation/rotation/scale",
                    ));
                }
                // Decompose and recompose; a shear matrix does not survive
                // the round trip.
                let matrix = Mat4::from_cols_array(&m);
                let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
                let rebuilt = Mat4::from_scale_rotation_translation(scale, rotation, translation);
                let drift = (0..16).map(|i| {
                    (matrix.to_cols_array()[i] - rebuilt.to_cols_array()[i]).abs()
                });
                if drift.fold(0.0f32, f32::max) > 1e-4 {
                    out.push(Diagnostic::error(
                        format!("{pointer}/matrix"),
                        "matrix is not decomposable into TRS (shear or non-orthogonal rotation)",
                    ));
                }
            }
            None => {}
        }
    }
}

fn check_scene_graphs(root: &json::Root, out: &mut Vec<Diagnostic>) {
    // A node belongs to at most one scene.
    let mut owner: Vec<Option<usize>> = vec![None; root.nodes.len()];
    for (s, scene) in root.scenes.iter().enumerate() {
        let mut state = vec![0u8; root.nodes.len()]; // 0 unseen, 1 visiting, 2 done
        for node in &scene.nodes {
            if node.value() < root.nodes.len() {
                dfs(root, node.value(), &mut state, s, out);
            }
        }
        for (index, visited) in state.iter().enumerate() {
            if *visited == 0 {
                continue;
            }
            match owner[index] {
                None => owner[index] = Some(s),
                Some(first) => out.push(Diagnostic::error(
                    format!("/nodes/{index}"),
                    format!("node belongs to scene {first} and scene {s}"),
                )),
            }
        }
    }
}

fn dfs(root: &json::Root, index: usize, state: &mut [u8], scene: usize, out: &mut Vec<Diagnostic>) {
    match state[index] {
        1 => {
            out.push(Diagnostic::error(
                format!("/nodes/{index}"),
                format!("cycle detected in scene {scene}"),
            ));
            return;
        }
        2 => {
            out.push(Diagnostic::error(
                format!("/nodes/{index}"),
                format!("node reached by more than one path in scene {scene}"),
            ));
            return;
        }
        _ => {}
    }
    state[index] = 1;
    for child in &root.nodes[index].children {
        if child.value() < root.nodes.len() {
            dfs(root, child.value(), state, scene, out);
        }
    }
    state[index] = 2;
}

fn check_skins(root: &json::Root, out: &mut Vec<Diagnostic>) {
    for (s, skin) in root.skins.iter().enumerate() {
        if skin.joints.is_empty() {
            out.push(Diagnostic::error(
                format!("/skins/{s}/joints"),
                "skin has no joints",
            ));
        }
    }
}

fn check_required_subset_of_used(root: &json::Root, out: &mut Vec<Diagnostic>) {
    for name in &root.extensions_required {
        if !root.extensions_used.iter().any(|used| used == name) {
            out.push(Diagnostic::error(
                "/extensionsRequired",
                format!("{name} is required but not listed in extensionsUsed"),
            ));
        }
    }
}

/// Decode with errors demoted: missing buffers end the check quietly,
/// anything else becomes an error diagnostic.
fn try_decode(
    asset: &Asset,
    index: usize,
    cache: &mut DecodeCache,
    pointer: &str,
    out: &mut Vec<Diagnostic>,
) -> Option<std::sync::Arc<accessor::Decoded>> {
    match accessor::decode(&asset.root, &asset.buffers, index, cache) {
        Ok(decoded) => Some(decoded),
        Err(Error::MissingResource { .. }) => None,
        Err(other) => {
            out.push(Diagnostic::error(pointer, other.to_string()));
            None
        }
    }
}

fn check_primitive_indices(asset: &Asset, cache: &mut DecodeCache, out: &mut Vec<Diagnostic>) {
    for (m, mesh) in asset.root.meshes.iter().enumerate() {
        for (p, primitive) in mesh.primitives.iter().enumerate() {
            let pointer = format!("/meshes/{m}/primitives/{p}/indices");
            let (Some(indices), Some(position)) = (
                primitive.indices,
                primitive.attributes.get("POSITION"),
            ) else {
                continue;
            };
            if indices.value() >= asset.root.accessors.len()
                || position.value() >= asset.root.accessors.len()
            {
                continue; // reported by the reference check
            }
            let vertex_count = asset.root.accessors[position.value()].count;
            let Some(decoded) = try_decode(asset, indices.value(), cache, &pointer, out) else {
                continue;
            };
            for (k, value) in decoded.to_u32().iter().enumerate() {
                if *value as usize >= vertex_count {
                    out.push(Diagnostic::error(
                        pointer.clone(),
                        format!("index {value} at element {k} exceeds POSITION count {vertex_count}"),
                    ));
                    break;
                }
            }
        }
    }
}

fn check_rotation_outputs(asset: &Asset, cache: &mut DecodeCache, out: &mut Vec<Diagnostic>) {
    for (a, animation) in asset.root.animations.iter().enumerate() {
        for (c, channel) in animation.channels.iter().enumerate() {
            if channel.target.path != TargetPathKind::Classic(TargetPath::Rotation) {
                continue;
            }
            let Some(sampler) = animation.samplers.get(channel.sampler) else {
                continue;
            };
            if sampler.output.value() >= asset.root.accessors.len() {
                continue;
            }
            let pointer = format!("/animations/{a}/channels/{c}");
            let Some(decoded) = try_decode(asset, sampler.output.value(), cache, &pointer, out)
            else {
                continue;
            };
            let flat = decoded.to_f32();
            for (k, quat) in flat.chunks_exact(4).enumerate() {
                let length = (quat[0] * quat[0]
                    + quat[1] * quat[1]
                    + quat[2] * quat[2]
                    + quat[3] * quat[3])
                    .sqrt();
                if (length - 1.0).abs() > 1e-4 {
                    out.push(Diagnostic::warning(
                        pointer.clone(),
                        format!("rotation keyframe {k} is not unit length ({length})"),
                    ));
                    break;
                }
            }
        }
    }
}

fn check_sparse_accessors(asset: &Asset, cache: &mut DecodeCache, out: &mut Vec<Diagnostic>) {
    for (a, accessor) in asset.root.accessors.iter().enumerate() {
        if accessor.sparse.is_none() {
            continue;
        }
        // The decoder enforces strictly-increasing, in-range sparse
        // indices; any violation surfaces here as an error diagnostic.
        let pointer = format!("/accessors/{a}/sparse");
        try_decode(asset, a, cache, &pointer, out);
    }
}

fn check_image_mime(asset: &Asset, out: &mut Vec<Diagnostic>) {
    for (i, image) in asset.root.images.iter().enumerate() {
        if let Some(declared) = &image.mime_type {
            if !json::image::KNOWN_MIME_TYPES.contains(&declared.as_str()) {
                out.push(Diagnostic::info(
                    format!("/images/{i}/mimeType"),
                    format!("unrecognised mime type {declared}"),
                ));
            }
        }
        let (Some(declared), Some(view_index)) = (&image.mime_type, image.buffer_view) else {
            continue;
        };
        let Some(view) = asset.root.buffer_views.get(view_index.value()) else {
            continue;
        };
        let Ok(bytes) = asset.buffers.bytes(view.buffer.value()) else {
            continue;
        };
        let end = view.byte_offset + view.byte_length;
        if end > bytes.len() {
            continue; // reported by the reference check
        }
        let payload = &bytes[view.byte_offset..end];
        if let Some(sniffed) = json::image::sniff_mime_type(payload) {
            if sniffed != declared {
                out.push(Diagnostic::warning(
                    format!("/images/{i}/mimeType"),
                    format!("declared {declared} but content looks like {sniffed}"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferSet;

    fn asset_from(json: &str) -> Asset {
        let root: json::Root = serde_json::from_str(json).unwrap();
        Asset::new(root, BufferSet::from_vecs(vec![]))
    }

    fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
        diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect()
    }

    #[test]
    fn test_clean_asset_has_no_diagnostics() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "scene": 0,
                "scenes": [{"nodes": [0]}],
                "nodes": [{"translation": [1.0, 0.0, 0.0]}]
            }"#,
        );
        assert!(validate(&asset).is_empty());
    }

    #[test]
    fn test_out_of_range_reference_reported() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "scenes": [{"nodes": [5]}]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert_eq!(errors(&diagnostics).len(), 1);
        assert_eq!(diagnostics[0].pointer, "/scenes/0/nodes/0");
    }

    #[test]
    fn test_matrix_and_trs_both_present() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "nodes": [{
                    "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
                    "translation": [1.0, 0.0, 0.0]
                }]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert!(!errors(&diagnostics).is_empty());
    }

    #[test]
    fn test_shear_matrix_rejected() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "nodes": [{
                    "matrix": [1,0,0,0, 1,1,0,0, 0,0,1,0, 0,0,0,1]
                }]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("not decomposable")));
    }

    #[test]
    fn test_cycle_detected() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "scenes": [{"nodes": [0]}],
                "nodes": [{"children": [1]}, {"children": [0]}]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert!(diagnostics.iter().any(|d| d.message.contains("cycle")));
    }

    #[test]
    fn test_zero_joint_skin_reported() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "skins": [{"joints": []}]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert!(diagnostics
            .iter()
            .any(|d| d.pointer == "/skins/0/joints" && d.severity == Severity::Error));
    }

    #[test]
    fn test_node_in_two_scenes_reported() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "scenes": [{"nodes": [0]}, {"nodes": [0]}],
                "nodes": [{}]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert!(diagnostics
            .iter()
            .any(|d| d.pointer == "/nodes/0" && d.message.contains("scene 0 and scene 1")));
    }

    #[test]
    fn test_required_not_in_used() {
        let asset = asset_from(
            r#"{
                "asset": {"version": "2.0"},
                "extensionsRequired": ["KHR_texture_transform"]
            }"#,
        );
        let diagnostics = validate(&asset);
        assert_eq!(errors(&diagnostics).len(), 1);
        assert_eq!(diagnostics[0].pointer, "/extensionsRequired");
    }

    #[test]
    fn test_indices_exceeding_position_count() {
        let root: json::Root = serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "buffers": [{"byteLength": 44}],
                "bufferViews": [
                    {"buffer": 0, "byteLength": 36},
                    {"buffer": 0, "byteOffset": 36, "byteLength": 6}
                ],
                "accessors": [
                    {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
                    {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
                ],
                "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}]
            }"#,
        )
        .unwrap();
        let mut bytes = vec![0u8; 36];
        // Indices 0, 1, 9: the last one is out of range for 3 vertices.
        bytes.extend_from_slice(&[0, 0, 1, 0, 9, 0]);
        bytes.extend_from_slice(&[0, 0]);
        let asset = Asset::new(root, BufferSet::from_vecs(vec![bytes]));
        let diagnostics = validate(&asset);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("exceeds POSITION count")));
    }

    #[test]
    fn test_denormalized_rotation_output_warns() {
        let root: json::Root = serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "nodes": [{}],
                "buffers": [{"byteLength": 40}],
                "bufferViews": [
                    {"buffer": 0, "byteLength": 8},
                    {"buffer": 0, "byteOffset": 8, "byteLength": 32}
                ],
                "accessors": [
                    {"bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR"},
                    {"bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC4"}
                ],
                "animations": [{
                    "channels": [{"sampler": 0, "target": {"node": 0, "path": "rotation"}}],
                    "samplers": [{"input": 0, "output": 1}]
                }]
            }"#,
        )
        .unwrap();
        let mut bytes = Vec::new();
        for t in [0.0f32, 1.0] {
            bytes.extend_from_slice(&t.to_le_bytes());
        }
        for q in [[0.0f32, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 2.0]] {
            for c in q {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        let asset = Asset::new(root, BufferSet::from_vecs(vec![bytes]));
        let diagnostics = validate(&asset);
        assert!(diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("unit length")));
    }

    #[test]
    fn test_image_mime_mismatch_warns() {
        let root: json::Root = serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "buffers": [{"byteLength": 8}],
                "bufferViews": [{"buffer": 0, "byteLength": 8}],
                "images": [{"mimeType": "image/jpeg", "bufferView": 0}]
            }"#,
        )
        .unwrap();
        let png_magic = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let asset = Asset::new(root, BufferSet::from_vecs(vec![png_magic]));
        let diagnostics = validate(&asset);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("image/png")));
    }
}
