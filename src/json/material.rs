//! Material, textureInfo and PBR descriptors.

use super::{texture, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaMode {
    #[serde(rename = "OPAQUE")]
    Opaque,
    #[serde(rename = "MASK")]
    Mask,
    #[serde(rename = "BLEND")]
    Blend,
}

impl AlphaMode {
    pub fn is_opaque(&self) -> bool {
        matches!(self, AlphaMode::Opaque)
    }
}

impl Default for AlphaMode {
    fn default() -> Self {
        AlphaMode::Opaque
    }
}

/// Reference to a texture plus the UV set it samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: Index<texture::Texture>,

    #[serde(default, skip_serializing_if = "super::is_zero")]
    pub tex_coord: usize,

    /// `KHR_texture_transform` lives here when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    pub index: Index<texture::Texture>,

    #[serde(default, skip_serializing_if = "super::is_zero")]
    pub tex_coord: usize,

    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub scale: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    pub index: Index<texture::Texture>,

    #[serde(default, skip_serializing_if = "super::is_zero")]
    pub tex_coord: usize,

    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub strength: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default = "white", skip_serializing_if = "is_white")]
    pub base_color_factor: [f32; 4],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,

    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub metallic_factor: f32,

    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub roughness_factor: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        PbrMetallicRoughness {
            base_color_factor: white(),
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            extensions: None,
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<NormalTextureInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<OcclusionTextureInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,

    #[serde(default = "black", skip_serializing_if = "is_black")]
    pub emissive_factor: [f32; 3],

    #[serde(default, skip_serializing_if = "AlphaMode::is_opaque")]
    pub alpha_mode: AlphaMode,

    #[serde(default = "half", skip_serializing_if = "is_half")]
    pub alpha_cutoff: f32,

    #[serde(default, skip_serializing_if = "super::is_false")]
    pub double_sided: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            name: None,
            pbr_metallic_roughness: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: black(),
            alpha_mode: AlphaMode::default(),
            alpha_cutoff: half(),
            double_sided: false,
            extensions: None,
            extras: None,
        }
    }
}

fn one() -> f32 {
    1.0
}

fn is_one(value: &f32) -> bool {
    *value == 1.0
}

fn half() -> f32 {
    0.5
}

fn is_half(value: &f32) -> bool {
    *value == 0.5
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

fn is_white(value: &[f32; 4]) -> bool {
    *value == [1.0; 4]
}

fn black() -> [f32; 3] {
    [0.0; 3]
}

fn is_black(value: &[f32; 3]) -> bool {
    *value == [0.0; 3]
}
