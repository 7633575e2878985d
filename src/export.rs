//! Write path: a builder that assembles a document and packs its binary
//! payloads, then emits one of three output layouts.
//!
//! All typed payloads land in a single output buffer through
//! [`BufferPlane`], so every view is element-aligned and 4-byte padded.
//! Identical accessor payloads are interned: two calls to
//! [`Writer::add_accessor`] with the same bytes and shape return the same
//! index.

use crate::accessor::AccessorData;
use crate::buffer::{path_to_uri, BufferPlane};
use crate::error::{Error, Result};
use crate::extensions;
use crate::glb;
use crate::json::{self, Index};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hashbrown::HashMap;
use std::path::{Path, PathBuf};

/// File layout the writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Single `.glb` with the buffer in the BIN chunk.
    Glb,
    /// `.gltf` JSON plus an external `.bin`, images as sibling files.
    GltfSeparate,
    /// Single `.gltf` with `data:` URIs for the buffer and images.
    GltfEmbedded,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub mode: OutputMode,

    /// Base name for emitted files (`<name>.glb`, `<name>.gltf`,
    /// `<name>.bin`).
    pub name: String,

    /// `asset.generator` stamp.
    pub generator: String,

    /// Folder for image files in separate mode, relative to the document.
    pub texture_dir: Option<PathBuf>,

    /// Pretty-print `.gltf` JSON. GLB JSON is always compact.
    pub pretty: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            mode: OutputMode::Glb,
            name: "scene".to_string(),
            generator: format!("gltf-plane v{}", env!("CARGO_PKG_VERSION")),
            texture_dir: None,
            pretty: false,
        }
    }
}

/// Finished output: relative file names and their bytes.
pub struct ExportOutput {
    pub files: Vec<(PathBuf, Vec<u8>)>,
}

impl ExportOutput {
    /// Write every file under `dir`, creating subdirectories as needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        for (name, bytes) in &self.files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
        }
        Ok(())
    }
}

#[derive(Hash, PartialEq, Eq)]
struct PayloadKey {
    bytes: Vec<u8>,
    component_code: u32,
    dims: usize,
    normalized: bool,
}

struct ImagePayload {
    bytes: Vec<u8>,
    mime: String,
}

/// Document builder. Call the `add_*` operations in any order, then
/// [`Writer::finish`].
pub struct Writer {
    config: ExportConfig,
    root: json::Root,
    plane: BufferPlane,
    interned: HashMap<PayloadKey, Index<json::Accessor>>,
    images: Vec<ImagePayload>,
    required: Vec<String>,
}

impl Writer {
    pub fn new(config: ExportConfig) -> Self {
        let mut root = json::Root::default();
        root.asset.generator = Some(config.generator.clone());
        Writer {
            config,
            root,
            plane: BufferPlane::new(),
            interned: HashMap::new(),
            images: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Register an extra buffer entry, for callers that reference data the
    /// writer does not pack (e.g. an already-uploaded external `.bin`).
    /// Buffer 0 is reserved for the writer's own plane.
    pub fn add_buffer(&mut self, byte_length: usize, uri: Option<String>) -> Index<json::Buffer> {
        self.ensure_plane_buffer();
        self.root.buffers.push(json::Buffer {
            uri,
            byte_length,
            name: None,
            extensions: None,
            extras: None,
        });
        Index::new((self.root.buffers.len() - 1) as u32)
    }

    /// Pack raw bytes into the output buffer and describe them with a view.
    /// `element_size` drives the alignment of the packed range.
    pub fn add_bufferview(
        &mut self,
        bytes: &[u8],
        element_size: usize,
        byte_stride: Option<usize>,
        target: Option<json::BufferTarget>,
    ) -> Index<json::buffer::View> {
        self.ensure_plane_buffer();
        let (offset, length) = self.plane.append(bytes, element_size);
        self.root.buffer_views.push(json::buffer::View {
            buffer: Index::new(0),
            byte_offset: offset,
            byte_length: length,
            byte_stride,
            target,
            name: None,
            extensions: None,
            extras: None,
        });
        Index::new((self.root.buffer_views.len() - 1) as u32)
    }

    /// Pack a typed payload and describe it with an accessor.
    ///
    /// `with_bounds` stores per-component min/max; POSITION attributes and
    /// animation sampler inputs need them, everything else usually not.
    /// Identical payloads return the accessor created for the first call.
    pub fn add_accessor(
        &mut self,
        data: AccessorData<'_>,
        type_: json::Type,
        normalized: bool,
        with_bounds: bool,
    ) -> Result<Index<json::Accessor>> {
        let dims = type_.components();
        let components = data.component_count();
        if dims == 0 || components % dims != 0 {
            return Err(Error::invariant(
                "/accessors",
                format!("{components} components do not divide into {type_:?} elements"),
            ));
        }
        let count = components / dims;
        let component_type = data.component_type();
        let bytes = data.to_le_bytes();

        let key = PayloadKey {
            bytes: bytes.clone(),
            component_code: component_type.code(),
            dims,
            normalized,
        };
        if let Some(&hit) = self.interned.get(&key) {
            return Ok(hit);
        }

        let (min, max) = if with_bounds && count > 0 {
            let (min, max) = data.min_max(dims);
            (Some(min), Some(max))
        } else {
            (None, None)
        };

        let view = self.add_bufferview(&bytes, dims * component_type.size(), None, None);
        self.root.accessors.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type,
            normalized,
            count,
            type_,
            min,
            max,
            sparse: None,
            name: None,
            extensions: None,
            extras: None,
        });
        let index = Index::new((self.root.accessors.len() - 1) as u32);
        self.interned.insert(key, index);
        Ok(index)
    }

    /// Add an image payload; its final home (buffer view, file, or `data:`
    /// URI) is decided by the output mode at finish time.
    pub fn add_image(&mut self, bytes: &[u8], mime: &str) -> Index<json::Image> {
        self.images.push(ImagePayload {
            bytes: bytes.to_vec(),
            mime: mime.to_string(),
        });
        self.root.images.push(json::Image {
            uri: None,
            mime_type: Some(mime.to_string()),
            buffer_view: None,
            name: None,
            extensions: None,
            extras: None,
        });
        Index::new((self.root.images.len() - 1) as u32)
    }

    pub fn add_sampler(&mut self, sampler: json::Sampler) -> Index<json::Sampler> {
        self.root.samplers.push(sampler);
        Index::new((self.root.samplers.len() - 1) as u32)
    }

    pub fn add_texture(
        &mut self,
        source: Index<json::Image>,
        sampler: Option<Index<json::Sampler>>,
    ) -> Index<json::Texture> {
        self.root.textures.push(json::Texture {
            sampler,
            source: Some(source),
            name: None,
            extensions: None,
            extras: None,
        });
        Index::new((self.root.textures.len() - 1) as u32)
    }

    pub fn add_material(&mut self, material: json::Material) -> Index<json::Material> {
        self.root.materials.push(material);
        Index::new((self.root.materials.len() - 1) as u32)
    }

    pub fn add_mesh(&mut self, mesh: json::Mesh) -> Index<json::Mesh> {
        self.root.meshes.push(mesh);
        Index::new((self.root.meshes.len() - 1) as u32)
    }

    pub fn add_camera(&mut self, camera: json::Camera) -> Index<json::Camera> {
        self.root.cameras.push(camera);
        Index::new((self.root.cameras.len() - 1) as u32)
    }

    pub fn add_node(&mut self, node: json::Node) -> Index<json::Node> {
        self.root.nodes.push(node);
        Index::new((self.root.nodes.len() - 1) as u32)
    }

    pub fn add_skin(&mut self, skin: json::Skin) -> Index<json::Skin> {
        self.root.skins.push(skin);
        Index::new((self.root.skins.len() - 1) as u32)
    }

    pub fn add_animation(&mut self, animation: json::Animation) -> usize {
        self.root.animations.push(animation);
        self.root.animations.len() - 1
    }

    /// Add a scene; the first one added becomes the default.
    pub fn add_scene(&mut self, scene: json::Scene) -> Index<json::Scene> {
        self.root.scenes.push(scene);
        let index = Index::new((self.root.scenes.len() - 1) as u32);
        if self.root.scene.is_none() {
            self.root.scene = Some(index);
        }
        index
    }

    /// Attach a root-level extension object and record its usage.
    pub fn add_extension(&mut self, name: &str, value: serde_json::Value, required: bool) {
        self.root
            .extensions
            .get_or_insert_with(json::ExtensionMap::new)
            .insert(name.to_string(), value);
        if required {
            self.mark_extension_required(name);
        }
    }

    /// Record that `name` must appear in `extensionsRequired`. Extensions
    /// attached to individual objects are discovered automatically; only
    /// the required flag needs an explicit call.
    pub fn mark_extension_required(&mut self, name: &str) {
        if !self.required.iter().any(|n| n == name) {
            self.required.push(name.to_string());
        }
    }

    /// Direct access to the document under construction, for objects the
    /// builder has no dedicated operation for.
    pub fn root_mut(&mut self) -> &mut json::Root {
        &mut self.root
    }

    /// Seal the document and emit files for the configured mode.
    pub fn finish(mut self) -> Result<ExportOutput> {
        self.place_images()?;

        if self.plane.byte_length() > 0 {
            self.ensure_plane_buffer();
            self.root.buffers[0].byte_length = self.plane.byte_length();
        }

        self.root.extensions_used = extensions::collect_used(&self.root);
        for name in &self.required {
            if !self.root.extensions_used.iter().any(|u| u == name) {
                self.root.extensions_used.push(name.clone());
            }
        }
        self.root.extensions_required = std::mem::take(&mut self.required);

        tracing::debug!(
            mode = ?self.config.mode,
            buffer_bytes = self.plane.byte_length(),
            accessors = self.root.accessors.len(),
            "writing asset"
        );

        let mut files = Vec::new();
        match self.config.mode {
            OutputMode::Glb => {
                let json_bytes = serde_json::to_vec(&self.root)
                    .map_err(|e| Error::bad_json("", e.to_string()))?;
                let bin = (self.plane.byte_length() > 0).then(|| self.plane.data());
                let glb = glb::assemble(&json_bytes, bin);
                files.push((PathBuf::from(format!("{}.glb", self.config.name)), glb));
            }
            OutputMode::GltfSeparate => {
                let bin_name = format!("{}.bin", self.config.name);
                if self.plane.byte_length() > 0 {
                    self.root.buffers[0].uri = Some(bin_name.clone());
                }
                let json_bytes = self.serialize_json()?;
                files.push((PathBuf::from(format!("{}.gltf", self.config.name)), json_bytes));
                if self.plane.byte_length() > 0 {
                    files.push((PathBuf::from(bin_name), self.plane.into_bytes()));
                }
                for (k, payload) in self.images.iter().enumerate() {
                    let file = image_file_name(k, &payload.mime);
                    let path = match &self.config.texture_dir {
                        Some(dir) => dir.join(file),
                        None => PathBuf::from(file),
                    };
                    files.push((path, payload.bytes.clone()));
                }
            }
            OutputMode::GltfEmbedded => {
                if self.plane.byte_length() > 0 {
                    self.root.buffers[0].uri = Some(self.plane.to_embedded_uri());
                }
                let json_bytes = self.serialize_json()?;
                files.push((PathBuf::from(format!("{}.gltf", self.config.name)), json_bytes));
            }
        }
        Ok(ExportOutput { files })
    }

    fn serialize_json(&self) -> Result<Vec<u8>> {
        let result = if self.config.pretty {
            serde_json::to_vec_pretty(&self.root)
        } else {
            serde_json::to_vec(&self.root)
        };
        result.map_err(|e| Error::bad_json("", e.to_string()))
    }

    fn ensure_plane_buffer(&mut self) {
        if self.root.buffers.is_empty() {
            self.root.buffers.push(json::Buffer {
                uri: None,
                byte_length: 0,
                name: None,
                extensions: None,
                extras: None,
            });
        }
    }

    fn place_images(&mut self) -> Result<()> {
        match self.config.mode {
            // Image bytes join the packed buffer.
            OutputMode::Glb => {
                for k in 0..self.images.len() {
                    let bytes = std::mem::take(&mut self.images[k].bytes);
                    let view = self.add_bufferview(&bytes, 1, None, None);
                    self.root.images[k].buffer_view = Some(view);
                }
                self.images.clear();
            }
            // Image bytes become sibling files referenced by URI.
            OutputMode::GltfSeparate => {
                for (k, payload) in self.images.iter().enumerate() {
                    let file = image_file_name(k, &payload.mime);
                    let path = match &self.config.texture_dir {
                        Some(dir) => dir.join(file),
                        None => PathBuf::from(file),
                    };
                    self.root.images[k].uri = Some(path_to_uri(&path));
                    self.root.images[k].mime_type = None;
                }
            }
            // Image bytes become data: URIs.
            OutputMode::GltfEmbedded => {
                for (k, payload) in self.images.iter().enumerate() {
                    self.root.images[k].uri = Some(format!(
                        "data:{};base64,{}",
                        payload.mime,
                        BASE64.encode(&payload.bytes)
                    ));
                }
                self.images.clear();
            }
        }
        Ok(())
    }
}

fn image_file_name(index: usize, mime: &str) -> String {
    let extension = match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/ktx2" => "ktx2",
        _ => "bin",
    };
    format!("image_{index}.{extension}")
}
