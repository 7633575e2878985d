//! Programmatic asset generation for integration tests.
//!
//! Every generator returns finished container bytes so the tests exercise
//! the real read path end to end.

use gltf_plane::accessor::AccessorData;
use gltf_plane::export::{ExportConfig, OutputMode, Writer};
use gltf_plane::json;

fn glb_config() -> ExportConfig {
    ExportConfig {
        mode: OutputMode::Glb,
        name: "test".to_string(),
        ..ExportConfig::default()
    }
}

fn finish_single(writer: Writer) -> Vec<u8> {
    let mut output = writer.finish().unwrap();
    output.files.remove(0).1
}

/// One triangle, indexed, with POSITION bounds.
pub fn triangle_glb() -> Vec<u8> {
    let mut writer = Writer::new(glb_config());
    let positions: Vec<f32> = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let position = writer
        .add_accessor(AccessorData::F32(&positions), json::Type::Vec3, false, true)
        .unwrap();
    let indices: Vec<u16> = vec![0, 1, 2];
    let index_accessor = writer
        .add_accessor(AccessorData::U16(&indices), json::Type::Scalar, false, false)
        .unwrap();

    let mut attributes = json::mesh::AttributeMap::new();
    attributes.insert("POSITION".to_string(), position);
    let mesh = writer.add_mesh(json::Mesh {
        primitives: vec![json::Primitive {
            attributes,
            indices: Some(index_accessor),
            material: None,
            mode: json::Mode::Triangles,
            targets: vec![],
            extensions: None,
            extras: None,
        }],
        weights: None,
        name: Some("Triangle".to_string()),
        extensions: None,
        extras: None,
    });
    let node = writer.add_node(json::Node {
        mesh: Some(mesh),
        ..json::Node::default()
    });
    writer.add_scene(json::Scene {
        nodes: vec![node],
        name: None,
        extensions: None,
        extras: None,
    });
    finish_single(writer)
}

/// Two-joint skin over a single-triangle mesh. Vertex 0 carries non-unit
/// weights (0.25, 0.25); joint 1 is translated two units up in bind pose
/// with an identity inverse bind matrix.
pub fn skinned_glb() -> Vec<u8> {
    let mut writer = Writer::new(glb_config());

    let positions: Vec<f32> = vec![2.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let position = writer
        .add_accessor(AccessorData::F32(&positions), json::Type::Vec3, false, true)
        .unwrap();
    let joints: Vec<u16> = vec![0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let joints_accessor = writer
        .add_accessor(AccessorData::U16(&joints), json::Type::Vec4, false, false)
        .unwrap();
    let weights: Vec<f32> = vec![
        0.25, 0.25, 0.0, 0.0, //
        1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 0.0, // zero weights: fixup case
    ];
    let weights_accessor = writer
        .add_accessor(AccessorData::F32(&weights), json::Type::Vec4, false, false)
        .unwrap();
    let ibm: Vec<f32> = [glam::Mat4::IDENTITY, glam::Mat4::IDENTITY]
        .iter()
        .flat_map(|m| m.to_cols_array())
        .collect();
    let ibm_accessor = writer
        .add_accessor(AccessorData::F32(&ibm), json::Type::Mat4, false, false)
        .unwrap();

    let mut attributes = json::mesh::AttributeMap::new();
    attributes.insert("POSITION".to_string(), position);
    attributes.insert("JOINTS_0".to_string(), joints_accessor);
    attributes.insert("WEIGHTS_0".to_string(), weights_accessor);
    let mesh = writer.add_mesh(json::Mesh {
        primitives: vec![json::Primitive {
            attributes,
            indices: None,
            material: None,
            mode: json::Mode::Triangles,
            targets: vec![],
            extensions: None,
            extras: None,
        }],
        weights: None,
        name: None,
        extensions: None,
        extras: None,
    });

    let joint0 = writer.add_node(json::Node::default());
    let joint1 = writer.add_node(json::Node {
        translation: Some([0.0, 2.0, 0.0]),
        ..json::Node::default()
    });
    let skin = writer.add_skin(json::Skin {
        inverse_bind_matrices: Some(ibm_accessor),
        skeleton: None,
        joints: vec![joint0, joint1],
        name: None,
        extensions: None,
        extras: None,
    });
    let skinned = writer.add_node(json::Node {
        mesh: Some(mesh),
        skin: Some(skin),
        ..json::Node::default()
    });
    writer.add_scene(json::Scene {
        nodes: vec![joint0, joint1, skinned],
        name: None,
        extensions: None,
        extras: None,
    });
    finish_single(writer)
}

/// One node with a LINEAR rotation channel whose two keyframes are
/// antipodal unit quaternions (the same orientation twice), plus a
/// translation channel.
pub fn animated_glb() -> Vec<u8> {
    let mut writer = Writer::new(glb_config());
    let node = writer.add_node(json::Node::default());
    writer.add_scene(json::Scene {
        nodes: vec![node],
        name: None,
        extensions: None,
        extras: None,
    });

    let times: Vec<f32> = vec![0.0, 1.0];
    let input = writer
        .add_accessor(AccessorData::F32(&times), json::Type::Scalar, false, true)
        .unwrap();
    let rotations: Vec<f32> = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0];
    let rotation_output = writer
        .add_accessor(AccessorData::F32(&rotations), json::Type::Vec4, false, false)
        .unwrap();
    let translations: Vec<f32> = vec![0.0, 0.0, 0.0, 10.0, 0.0, 0.0];
    let translation_output = writer
        .add_accessor(AccessorData::F32(&translations), json::Type::Vec3, false, false)
        .unwrap();

    writer.add_animation(serde_json::from_value(serde_json::json!({
        "channels": [
            {"sampler": 0, "target": {"node": node.value(), "path": "rotation"}},
            {"sampler": 1, "target": {"node": node.value(), "path": "translation"}}
        ],
        "samplers": [
            {"input": input.value(), "output": rotation_output.value()},
            {"input": input.value(), "output": translation_output.value()}
        ]
    }))
    .unwrap());
    finish_single(writer)
}

/// Plain `.gltf` with an embedded buffer and a sparse POSITION accessor:
/// four zero vertices with elements 1 and 3 overlaid.
pub fn sparse_gltf() -> Vec<u8> {
    let mut base: Vec<u8> = vec![0; 48]; // 4 x VEC3 f32 zeros
    // sparse indices (u16): 1, 3
    base.extend_from_slice(&1u16.to_le_bytes());
    base.extend_from_slice(&3u16.to_le_bytes());
    // sparse values: two VEC3 f32
    for v in [[5.0f32, 0.0, 0.0], [0.0, 7.0, 0.0]] {
        for c in v {
            base.extend_from_slice(&c.to_le_bytes());
        }
    }
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &base)
    );
    serde_json::to_vec(&serde_json::json!({
        "asset": {"version": "2.0"},
        "buffers": [{"uri": uri, "byteLength": base.len()}],
        "bufferViews": [
            {"buffer": 0, "byteLength": 48},
            {"buffer": 0, "byteOffset": 48, "byteLength": 4},
            {"buffer": 0, "byteOffset": 52, "byteLength": 24}
        ],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 4,
            "type": "VEC3",
            "sparse": {
                "count": 2,
                "indices": {"bufferView": 1, "componentType": 5123},
                "values": {"bufferView": 2}
            }
        }],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "mode": 0}]}],
        "nodes": [{"mesh": 0}],
        "scenes": [{"nodes": [0]}],
        "scene": 0
    }))
    .unwrap()
}
