//! Known-extension decoding and used/required bookkeeping.
//!
//! Extension objects stay on their owners as raw JSON maps so unknown
//! names round-trip verbatim; the types here are decoded on demand.
//! Handlers are data, not subclasses: a known extension is its name, its
//! typed struct, and nothing else.

use crate::error::{Error, Result};
use crate::json::{self, ExtensionMap, Index};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
pub const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";
pub const KHR_LIGHTS_PUNCTUAL: &str = "KHR_lights_punctual";
pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";
pub const KHR_MATERIALS_CLEARCOAT: &str = "KHR_materials_clearcoat";
pub const KHR_MATERIALS_TRANSMISSION: &str = "KHR_materials_transmission";
pub const KHR_MATERIALS_IOR: &str = "KHR_materials_ior";
pub const KHR_MATERIALS_SPECULAR: &str = "KHR_materials_specular";
pub const KHR_MATERIALS_SHEEN: &str = "KHR_materials_sheen";
pub const KHR_MATERIALS_VOLUME: &str = "KHR_materials_volume";
pub const KHR_MATERIALS_EMISSIVE_STRENGTH: &str = "KHR_materials_emissive_strength";
pub const KHR_MATERIALS_VARIANTS: &str = "KHR_materials_variants";
pub const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub const KHR_ANIMATION_POINTER: &str = "KHR_animation_pointer";
pub const EXT_PROPERTY_ANIMATION: &str = "EXT_property_animation";
pub const KHR_MESH_QUANTIZATION: &str = "KHR_mesh_quantization";

/// Names the core itself understands. Codec plug-ins extend this set at
/// read time through the registry they are registered with.
pub const SUPPORTED: &[&str] = &[
    KHR_LIGHTS_PUNCTUAL,
    KHR_MATERIALS_UNLIT,
    KHR_MATERIALS_CLEARCOAT,
    KHR_MATERIALS_TRANSMISSION,
    KHR_MATERIALS_IOR,
    KHR_MATERIALS_SPECULAR,
    KHR_MATERIALS_SHEEN,
    KHR_MATERIALS_VOLUME,
    KHR_MATERIALS_EMISSIVE_STRENGTH,
    KHR_MATERIALS_VARIANTS,
    KHR_TEXTURE_TRANSFORM,
    KHR_ANIMATION_POINTER,
    EXT_PROPERTY_ANIMATION,
    KHR_MESH_QUANTIZATION,
];

/// Decode extension `name` from an owner's raw map, if present.
pub fn decode<T: DeserializeOwned>(
    extensions: Option<&ExtensionMap>,
    name: &str,
    pointer: &str,
) -> Option<Result<T>> {
    let value = extensions?.get(name)?;
    Some(
        serde_json::from_value(value.clone())
            .map_err(|e| Error::bad_json(format!("{pointer}/extensions/{name}"), e.to_string())),
    )
}

// --- compression -----------------------------------------------------------

/// `KHR_draco_mesh_compression` on a primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoMeshCompression {
    pub buffer_view: Index<json::buffer::View>,
    /// Semantic name to Draco attribute id.
    pub attributes: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeshoptMode {
    Attributes,
    Triangles,
    Indices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeshoptFilter {
    None,
    Octahedral,
    Quaternion,
    Exponential,
}

impl Default for MeshoptFilter {
    fn default() -> Self {
        MeshoptFilter::None
    }
}

fn meshopt_filter_is_none(filter: &MeshoptFilter) -> bool {
    matches!(filter, MeshoptFilter::None)
}

/// `EXT_meshopt_compression` on a bufferView.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshoptCompression {
    pub buffer: Index<json::Buffer>,

    #[serde(default, skip_serializing_if = "json::is_zero")]
    pub byte_offset: usize,

    pub byte_length: usize,
    pub byte_stride: usize,
    pub count: usize,
    pub mode: MeshoptMode,

    #[serde(default, skip_serializing_if = "meshopt_filter_is_none")]
    pub filter: MeshoptFilter,
}

// --- lights ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub inner_cone_angle: f32,

    #[serde(default = "default_outer_cone", skip_serializing_if = "is_default_outer_cone")]
    pub outer_cone_angle: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    #[serde(default = "white3", skip_serializing_if = "is_white3")]
    pub color: [f32; 3],

    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub intensity: f32,

    #[serde(rename = "type")]
    pub type_: LightKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<Spot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Root `KHR_lights_punctual` object: the light table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightsPunctual {
    pub lights: Vec<Light>,
}

/// Per-node `KHR_lights_punctual` object: a light reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeLight {
    pub light: u32,
}

// --- materials -------------------------------------------------------------

/// `KHR_materials_unlit` is an empty object whose presence is the flag.
/// It must survive canonical writing even though it has no fields.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Unlit {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clearcoat {
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub clearcoat_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_texture: Option<json::material::TextureInfo>,

    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub clearcoat_roughness_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_texture: Option<json::material::TextureInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_normal_texture: Option<json::material::NormalTextureInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub transmission_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_texture: Option<json::material::TextureInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ior {
    #[serde(default = "default_ior", skip_serializing_if = "is_default_ior")]
    pub ior: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specular {
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub specular_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_texture: Option<json::material::TextureInfo>,

    #[serde(default = "white3", skip_serializing_if = "is_white3")]
    pub specular_color_factor: [f32; 3],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_texture: Option<json::material::TextureInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheen {
    #[serde(default, skip_serializing_if = "is_black3")]
    pub sheen_color_factor: [f32; 3],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_texture: Option<json::material::TextureInfo>,

    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub sheen_roughness_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_texture: Option<json::material::TextureInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub thickness_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_texture: Option<json::material::TextureInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_distance: Option<f32>,

    #[serde(default = "white3", skip_serializing_if = "is_white3")]
    pub attenuation_color: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissiveStrength {
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub emissive_strength: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
}

/// Root `KHR_materials_variants` object: the variant name table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variants {
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantMapping {
    pub material: Index<json::Material>,
    pub variants: Vec<u32>,
}

/// Per-primitive `KHR_materials_variants` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantMappings {
    pub mappings: Vec<VariantMapping>,
}

// --- texture transform / animation pointer ---------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTransform {
    #[serde(default, skip_serializing_if = "is_zero2")]
    pub offset: [f32; 2],

    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub rotation: f32,

    #[serde(default = "one2", skip_serializing_if = "is_one2")]
    pub scale: [f32; 2],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<usize>,
}

/// `KHR_animation_pointer` on a channel target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationPointer {
    pub pointer: String,
}

/// Pointer string for a channel target, from either pointer extension.
pub fn channel_pointer(target: &json::animation::Target, pointer: &str) -> Option<Result<String>> {
    for name in [KHR_ANIMATION_POINTER, EXT_PROPERTY_ANIMATION] {
        if let Some(decoded) =
            decode::<AnimationPointer>(target.extensions.as_ref(), name, pointer)
        {
            return Some(decoded.map(|p| p.pointer));
        }
    }
    None
}

// --- bookkeeping -----------------------------------------------------------

/// Every extension name that appears anywhere in the document, in first-use
/// order. The writer stores this as `extensionsUsed`.
pub fn collect_used(root: &json::Root) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();

    // Extension payloads are raw JSON and may carry textureInfos with
    // their own nested `extensions` objects (a texture transform on a
    // clearcoat texture, for instance). Walk them recursively.
    fn walk_value(value: &serde_json::Value, used: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, nested) in map {
                    if key == "extensions" {
                        if let serde_json::Value::Object(names) = nested {
                            for name in names.keys() {
                                if !used.iter().any(|u| u == name) {
                                    used.push(name.clone());
                                }
                            }
                        }
                    }
                    walk_value(nested, used);
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    walk_value(item, used);
                }
            }
            _ => {}
        }
    }

    let mut push = |map: &Option<ExtensionMap>, used: &mut Vec<String>| {
        if let Some(map) = map {
            for (name, value) in map.iter() {
                if !used.iter().any(|u| u == name) {
                    used.push(name.clone());
                }
                walk_value(value, used);
            }
        }
    };

    push(&root.extensions, &mut used);
    push(&root.asset.extensions, &mut used);
    for scene in &root.scenes {
        push(&scene.extensions, &mut used);
    }
    for node in &root.nodes {
        push(&node.extensions, &mut used);
    }
    for camera in &root.cameras {
        push(&camera.extensions, &mut used);
    }
    for animation in &root.animations {
        push(&animation.extensions, &mut used);
        for channel in &animation.channels {
            push(&channel.extensions, &mut used);
            push(&channel.target.extensions, &mut used);
        }
        for sampler in &animation.samplers {
            push(&sampler.extensions, &mut used);
        }
    }
    for material in &root.materials {
        push(&material.extensions, &mut used);
        if let Some(pbr) = &material.pbr_metallic_roughness {
            push(&pbr.extensions, &mut used);
            if let Some(info) = &pbr.base_color_texture {
                push(&info.extensions, &mut used);
            }
            if let Some(info) = &pbr.metallic_roughness_texture {
                push(&info.extensions, &mut used);
            }
        }
        if let Some(info) = &material.normal_texture {
            push(&info.extensions, &mut used);
        }
        if let Some(info) = &material.occlusion_texture {
            push(&info.extensions, &mut used);
        }
        if let Some(info) = &material.emissive_texture {
            push(&info.extensions, &mut used);
        }
    }
    for mesh in &root.meshes {
        push(&mesh.extensions, &mut used);
        for primitive in &mesh.primitives {
            push(&primitive.extensions, &mut used);
        }
    }
    for texture in &root.textures {
        push(&texture.extensions, &mut used);
    }
    for image in &root.images {
        push(&image.extensions, &mut used);
    }
    for skin in &root.skins {
        push(&skin.extensions, &mut used);
    }
    for accessor in &root.accessors {
        push(&accessor.extensions, &mut used);
    }
    for view in &root.buffer_views {
        push(&view.extensions, &mut used);
    }
    for sampler in &root.samplers {
        push(&sampler.extensions, &mut used);
    }
    for buffer in &root.buffers {
        push(&buffer.extensions, &mut used);
    }
    used
}

/// Fail with `UnsupportedRequiredExtension` for any required name neither
/// the core nor the caller's plug-ins understand.
pub fn check_required(root: &json::Root, also_supported: &[&str]) -> Result<()> {
    for name in &root.extensions_required {
        let known = SUPPORTED.contains(&name.as_str())
            || also_supported.contains(&name.as_str());
        if !known {
            return Err(Error::UnsupportedRequiredExtension { name: name.clone() });
        }
    }
    Ok(())
}

fn one() -> f32 {
    1.0
}

fn is_one(value: &f32) -> bool {
    *value == 1.0
}

fn is_zero_f32(value: &f32) -> bool {
    *value == 0.0
}

fn white3() -> [f32; 3] {
    [1.0; 3]
}

fn is_white3(value: &[f32; 3]) -> bool {
    *value == [1.0; 3]
}

fn is_black3(value: &[f32; 3]) -> bool {
    *value == [0.0; 3]
}

fn is_zero2(value: &[f32; 2]) -> bool {
    *value == [0.0; 2]
}

fn one2() -> [f32; 2] {
    [1.0; 2]
}

fn is_one2(value: &[f32; 2]) -> bool {
    *value == [1.0; 2]
}

fn default_ior() -> f32 {
    1.5
}

fn is_default_ior(value: &f32) -> bool {
    *value == 1.5
}

fn default_outer_cone() -> f32 {
    std::f32::consts::FRAC_PI_4
}

fn is_default_outer_cone(value: &f32) -> bool {
    *value == std::f32::consts::FRAC_PI_4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_required_extension_rejected() {
        let root: json::Root = serde_json::from_str(
            r#"{"asset":{"version":"2.0"},"extensionsRequired":["KHR_unknown_widgets"],"extensionsUsed":["KHR_unknown_widgets"]}"#,
        )
        .unwrap();
        let err = check_required(&root, &[]).unwrap_err();
        match err {
            Error::UnsupportedRequiredExtension { name } => {
                assert_eq!(name, "KHR_unknown_widgets")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_required_codec_extension_accepted_when_registered() {
        let root: json::Root = serde_json::from_str(
            r#"{"asset":{"version":"2.0"},"extensionsRequired":["KHR_draco_mesh_compression"]}"#,
        )
        .unwrap();
        assert!(check_required(&root, &[]).is_err());
        assert!(check_required(&root, &[KHR_DRACO_MESH_COMPRESSION]).is_ok());
    }

    #[test]
    fn test_unlit_roundtrips_as_empty_object() {
        let text = r#"{"extensions":{"KHR_materials_unlit":{}}}"#;
        let material: json::Material = serde_json::from_str(text).unwrap();
        let unlit: Option<Result<Unlit>> =
            decode(material.extensions.as_ref(), KHR_MATERIALS_UNLIT, "/materials/0");
        assert!(unlit.unwrap().is_ok());
        assert_eq!(serde_json::to_string(&material).unwrap(), text);
    }

    #[test]
    fn test_collect_used_walks_nested_texture_infos() {
        let root: json::Root = serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "materials": [{
                    "pbrMetallicRoughness": {
                        "baseColorTexture": {
                            "index": 0,
                            "extensions": {"KHR_texture_transform": {"offset": [0.5, 0.5]}}
                        }
                    }
                }],
                "textures": [{}]
            }"#,
        )
        .unwrap();
        assert_eq!(collect_used(&root), vec!["KHR_texture_transform"]);
    }

    #[test]
    fn test_collect_used_walks_texture_infos_inside_extensions() {
        let root: json::Root = serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "materials": [{
                    "extensions": {
                        "KHR_materials_clearcoat": {
                            "clearcoatTexture": {
                                "index": 0,
                                "extensions": {
                                    "KHR_texture_transform": {"scale": [2.0, 2.0]}
                                }
                            }
                        }
                    }
                }],
                "textures": [{}]
            }"#,
        )
        .unwrap();
        let used = collect_used(&root);
        assert!(used.iter().any(|u| u == "KHR_materials_clearcoat"));
        assert!(used.iter().any(|u| u == "KHR_texture_transform"));
    }

    #[test]
    fn test_meshopt_descriptor_decodes() {
        let text = r#"{"buffer":1,"byteLength":100,"byteStride":16,"count":8,"mode":"ATTRIBUTES","filter":"EXPONENTIAL"}"#;
        let meshopt: MeshoptCompression = serde_json::from_str(text).unwrap();
        assert_eq!(meshopt.mode, MeshoptMode::Attributes);
        assert_eq!(meshopt.filter, MeshoptFilter::Exponential);
    }
}
