//! Texture and sampler descriptors.

use super::{image, ExtensionMap, Extras, Index};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum MagFilter {
    Nearest,
    Linear,
}

impl TryFrom<u32> for MagFilter {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            9728 => Ok(MagFilter::Nearest),
            9729 => Ok(MagFilter::Linear),
            other => Err(format!("unknown magFilter {other}")),
        }
    }
}

impl From<MagFilter> for u32 {
    fn from(value: MagFilter) -> u32 {
        match value {
            MagFilter::Nearest => 9728,
            MagFilter::Linear => 9729,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TryFrom<u32> for MinFilter {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            9728 => Ok(MinFilter::Nearest),
            9729 => Ok(MinFilter::Linear),
            9984 => Ok(MinFilter::NearestMipmapNearest),
            9985 => Ok(MinFilter::LinearMipmapNearest),
            9986 => Ok(MinFilter::NearestMipmapLinear),
            9987 => Ok(MinFilter::LinearMipmapLinear),
            other => Err(format!("unknown minFilter {other}")),
        }
    }
}

impl From<MinFilter> for u32 {
    fn from(value: MinFilter) -> u32 {
        match value {
            MinFilter::Nearest => 9728,
            MinFilter::Linear => 9729,
            MinFilter::NearestMipmapNearest => 9984,
            MinFilter::LinearMipmapNearest => 9985,
            MinFilter::NearestMipmapLinear => 9986,
            MinFilter::LinearMipmapLinear => 9987,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Wrap {
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

impl Wrap {
    pub fn is_repeat(&self) -> bool {
        matches!(self, Wrap::Repeat)
    }
}

impl Default for Wrap {
    fn default() -> Self {
        Wrap::Repeat
    }
}

impl TryFrom<u32> for Wrap {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            33071 => Ok(Wrap::ClampToEdge),
            33648 => Ok(Wrap::MirroredRepeat),
            10497 => Ok(Wrap::Repeat),
            other => Err(format!("unknown wrap mode {other}")),
        }
    }
}

impl From<Wrap> for u32 {
    fn from(value: Wrap) -> u32 {
        match value {
            Wrap::ClampToEdge => 33071,
            Wrap::MirroredRepeat => 33648,
            Wrap::Repeat => 10497,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<MagFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<MinFilter>,

    #[serde(default, skip_serializing_if = "Wrap::is_repeat")]
    pub wrap_s: Wrap,

    #[serde(default, skip_serializing_if = "Wrap::is_repeat")]
    pub wrap_t: Wrap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Index<Sampler>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Index<image::Image>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Extras>,
}
