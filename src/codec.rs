//! Compression codec plug-ins and the pre-pass that applies them.
//!
//! The core ships no Draco or Meshopt implementation; callers register
//! plug-ins behind [`BufferCodec`]. The pre-pass runs before any accessor
//! decode and rewrites compressed data onto fresh buffers, so downstream
//! code only ever sees ordinary uncompressed buffer views.
//!
//! Failure policy: a plug-in failure is fatal when the owning compression
//! extension is listed in `extensionsRequired`, otherwise it is demoted to
//! a warning and the compressed object is left untouched (its fallback
//! data, when present, still works).

use crate::buffer::BufferSet;
use crate::error::{Error, Result};
use crate::extensions::{
    DracoMeshCompression, MeshoptCompression, MeshoptMode, EXT_MESHOPT_COMPRESSION,
    KHR_DRACO_MESH_COMPRESSION,
};
use crate::json::{self, Index};
use crate::validate::{Diagnostic, Severity};

/// A bytes-to-bytes compression capability.
///
/// `descriptor` is the raw extension object describing the compressed
/// region. Draco plug-ins return one blob holding every decoded attribute
/// region in ascending `dracoId` order, each region aligned to 4 bytes,
/// with decoded index data last. Meshopt plug-ins return the decoded view
/// payload of exactly `count * byteStride` bytes.
pub trait BufferCodec {
    fn decode(
        &self,
        input: &[u8],
        descriptor: &serde_json::Value,
    ) -> std::result::Result<Vec<u8>, String>;

    fn encode(
        &self,
        _input: &[u8],
        _descriptor: &serde_json::Value,
    ) -> std::result::Result<Vec<u8>, String> {
        Err("encoding is not supported by this codec".to_string())
    }
}

/// The caller's registered plug-ins.
#[derive(Default)]
pub struct CodecRegistry {
    draco: Option<Box<dyn BufferCodec>>,
    meshopt: Option<Box<dyn BufferCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry::default()
    }

    pub fn register_draco(mut self, codec: Box<dyn BufferCodec>) -> Self {
        self.draco = Some(codec);
        self
    }

    pub fn register_meshopt(mut self, codec: Box<dyn BufferCodec>) -> Self {
        self.meshopt = Some(codec);
        self
    }

    /// Extension names the registered plug-ins make supportable, for the
    /// required-extension check.
    pub fn supported_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.draco.is_some() {
            names.push(KHR_DRACO_MESH_COMPRESSION);
        }
        if self.meshopt.is_some() {
            names.push(EXT_MESHOPT_COMPRESSION);
        }
        names
    }

    /// Decompress every compressed view and primitive in place.
    pub fn expand(&self, root: &mut json::Root, buffers: &mut BufferSet) -> Result<Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        self.expand_meshopt(root, buffers, &mut diagnostics)?;
        self.expand_draco(root, buffers, &mut diagnostics)?;
        Ok(diagnostics)
    }

    fn expand_meshopt(
        &self,
        root: &mut json::Root,
        buffers: &mut BufferSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        let required = root
            .extensions_required
            .iter()
            .any(|name| name == EXT_MESHOPT_COMPRESSION);

        for view_index in 0..root.buffer_views.len() {
            let pointer = format!("/bufferViews/{view_index}");
            let raw = match root.buffer_views[view_index]
                .extensions
                .as_ref()
                .and_then(|map| map.get(EXT_MESHOPT_COMPRESSION))
            {
                Some(value) => value.clone(),
                None => continue,
            };
            let descriptor: MeshoptCompression = serde_json::from_value(raw.clone())
                .map_err(|e| Error::bad_json(&pointer, e.to_string()))?;

            let codec = match &self.meshopt {
                Some(codec) => codec,
                None if required => {
                    return Err(Error::UnsupportedRequiredExtension {
                        name: EXT_MESHOPT_COMPRESSION.to_string(),
                    })
                }
                None => {
                    diagnostics.push(Diagnostic::warning(
                        &pointer,
                        "no Meshopt codec registered, using fallback buffer",
                    ));
                    continue;
                }
            };

            let source = buffers.bytes(descriptor.buffer.value())?;
            let end = descriptor.byte_offset + descriptor.byte_length;
            if end > source.len() {
                return Err(Error::invariant(
                    &pointer,
                    format!("compressed region ends at {end}, buffer has {}", source.len()),
                ));
            }
            let compressed = source[descriptor.byte_offset..end].to_vec();

            let expected = descriptor.count * descriptor.byte_stride;
            let decoded = match codec.decode(&compressed, &raw) {
                Ok(decoded) if decoded.len() == expected => decoded,
                Ok(decoded) => {
                    let reason =
                        format!("codec produced {} bytes, expected {expected}", decoded.len());
                    if required {
                        return Err(Error::MeshoptDecode { pointer, reason });
                    }
                    diagnostics.push(Diagnostic::warning(&pointer, reason));
                    continue;
                }
                Err(reason) => {
                    if required {
                        return Err(Error::MeshoptDecode { pointer, reason });
                    }
                    diagnostics.push(Diagnostic::warning(&pointer, reason));
                    continue;
                }
            };

            let new_buffer = buffers.push(decoded);
            root.buffers.push(json::Buffer {
                uri: None,
                byte_length: expected,
                name: None,
                extensions: None,
                extras: None,
            });

            let view = &mut root.buffer_views[view_index];
            view.buffer = Index::new(new_buffer as u32);
            view.byte_offset = 0;
            view.byte_length = expected;
            view.byte_stride = match descriptor.mode {
                MeshoptMode::Attributes => Some(descriptor.byte_stride),
                _ => None,
            };
            remove_extension(&mut view.extensions, EXT_MESHOPT_COMPRESSION);
        }
        Ok(())
    }

    fn expand_draco(
        &self,
        root: &mut json::Root,
        buffers: &mut BufferSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        let required = root
            .extensions_required
            .iter()
            .any(|name| name == KHR_DRACO_MESH_COMPRESSION);

        for mesh_index in 0..root.meshes.len() {
            for primitive_index in 0..root.meshes[mesh_index].primitives.len() {
                let pointer = format!("/meshes/{mesh_index}/primitives/{primitive_index}");
                let primitive = &root.meshes[mesh_index].primitives[primitive_index];
                let raw = match primitive
                    .extensions
                    .as_ref()
                    .and_then(|map| map.get(KHR_DRACO_MESH_COMPRESSION))
                {
                    Some(value) => value.clone(),
                    None => continue,
                };
                let descriptor: DracoMeshCompression = serde_json::from_value(raw.clone())
                    .map_err(|e| Error::bad_json(&pointer, e.to_string()))?;

                let codec = match &self.draco {
                    Some(codec) => codec,
                    None if required => {
                        return Err(Error::UnsupportedRequiredExtension {
                            name: KHR_DRACO_MESH_COMPRESSION.to_string(),
                        })
                    }
                    None => {
                        diagnostics.push(Diagnostic::warning(
                            &pointer,
                            "no Draco codec registered, primitive skipped",
                        ));
                        continue;
                    }
                };

                // Blob layout, fixed by the plug-in contract: attribute
                // regions in ascending dracoId order, indices last, each
                // region aligned to 4.
                let mut attributes: Vec<(String, u32)> = descriptor
                    .attributes
                    .iter()
                    .map(|(semantic, &id)| (semantic.clone(), id))
                    .collect();
                attributes.sort_by_key(|&(_, id)| id);

                let mut regions: Vec<(Index<json::Accessor>, usize, usize, bool)> = Vec::new();
                let mut cursor = 0usize;
                let mut layout_error = None;
                for (semantic, _) in &attributes {
                    let accessor_index = match primitive.attributes.get(semantic) {
                        Some(index) => *index,
                        None => {
                            layout_error = Some(format!(
                                "compressed attribute {semantic} is not on the primitive"
                            ));
                            break;
                        }
                    };
                    let len = match accessor_byte_length(root, accessor_index) {
                        Ok(len) => len,
                        Err(e) => return Err(e),
                    };
                    cursor = align4(cursor);
                    regions.push((accessor_index, cursor, len, false));
                    cursor += len;
                }
                if let Some(reason) = layout_error {
                    if required {
                        return Err(Error::DracoDecode { pointer, reason });
                    }
                    diagnostics.push(Diagnostic::warning(&pointer, reason));
                    continue;
                }
                if let Some(indices) = primitive.indices {
                    let len = accessor_byte_length(root, indices)?;
                    cursor = align4(cursor);
                    regions.push((indices, cursor, len, true));
                    cursor += len;
                }

                let view = crate::asset::get(
                    &root.buffer_views,
                    descriptor.buffer_view.value(),
                    "/bufferViews",
                )?;
                let source = buffers.bytes(view.buffer.value())?;
                let end = view.byte_offset + view.byte_length;
                if end > source.len() {
                    return Err(Error::invariant(
                        format!("/bufferViews/{}", descriptor.buffer_view),
                        format!("view ends at {end}, buffer has {}", source.len()),
                    ));
                }
                let compressed = source[view.byte_offset..end].to_vec();

                let blob = match codec.decode(&compressed, &raw) {
                    Ok(blob) if blob.len() >= cursor => blob,
                    Ok(blob) => {
                        let reason = format!(
                            "codec produced {} bytes, layout needs {cursor}",
                            blob.len()
                        );
                        if required {
                            return Err(Error::DracoDecode { pointer, reason });
                        }
                        diagnostics.push(Diagnostic::warning(&pointer, reason));
                        continue;
                    }
                    Err(reason) => {
                        if required {
                            return Err(Error::DracoDecode { pointer, reason });
                        }
                        diagnostics.push(Diagnostic::warning(&pointer, reason));
                        continue;
                    }
                };

                let blob_length = blob.len();
                let new_buffer = buffers.push(blob);
                root.buffers.push(json::Buffer {
                    uri: None,
                    byte_length: blob_length,
                    name: None,
                    extensions: None,
                    extras: None,
                });

                for (accessor_index, offset, length, is_indices) in regions {
                    let new_view = root.buffer_views.len();
                    root.buffer_views.push(json::buffer::View {
                        buffer: Index::new(new_buffer as u32),
                        byte_offset: offset,
                        byte_length: length,
                        byte_stride: None,
                        target: Some(if is_indices {
                            json::buffer::Target::ElementArrayBuffer
                        } else {
                            json::buffer::Target::ArrayBuffer
                        }),
                        name: None,
                        extensions: None,
                        extras: None,
                    });
                    let accessor = &mut root.accessors[accessor_index.value()];
                    accessor.buffer_view = Some(Index::new(new_view as u32));
                    accessor.byte_offset = 0;
                }

                let primitive = &mut root.meshes[mesh_index].primitives[primitive_index];
                remove_extension(&mut primitive.extensions, KHR_DRACO_MESH_COMPRESSION);
            }
        }
        Ok(())
    }
}

fn accessor_byte_length(root: &json::Root, index: Index<json::Accessor>) -> Result<usize> {
    let accessor = crate::asset::get(&root.accessors, index.value(), "/accessors")?;
    Ok(accessor.count * accessor.type_.components() * accessor.component_type.size())
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

fn remove_extension(extensions: &mut Option<json::ExtensionMap>, name: &str) {
    if let Some(map) = extensions {
        map.remove(name);
        if map.is_empty() {
            *extensions = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Codec stub that hands back a canned payload.
    struct Canned(Vec<u8>);

    impl BufferCodec for Canned {
        fn decode(
            &self,
            _input: &[u8],
            _descriptor: &serde_json::Value,
        ) -> std::result::Result<Vec<u8>, String> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl BufferCodec for Failing {
        fn decode(
            &self,
            _input: &[u8],
            _descriptor: &serde_json::Value,
        ) -> std::result::Result<Vec<u8>, String> {
            Err("corrupt stream".to_string())
        }
    }

    fn meshopt_root() -> json::Root {
        serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "extensionsUsed": ["EXT_meshopt_compression"],
                "buffers": [{"byteLength": 8}],
                "bufferViews": [{
                    "buffer": 0,
                    "byteLength": 32,
                    "byteStride": 8,
                    "extensions": {"EXT_meshopt_compression": {
                        "buffer": 0,
                        "byteLength": 8,
                        "byteStride": 8,
                        "count": 4,
                        "mode": "ATTRIBUTES"
                    }}
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_meshopt_view_rewired_to_fresh_buffer() {
        let mut root = meshopt_root();
        let mut buffers = BufferSet::from_vecs(vec![vec![0xAB; 8]]);
        let registry = CodecRegistry::new().register_meshopt(Box::new(Canned(vec![1u8; 32])));
        let diagnostics = registry.expand(&mut root, &mut buffers).unwrap();
        assert!(diagnostics.is_empty());

        let view = &root.buffer_views[0];
        assert_eq!(view.buffer.value(), 1);
        assert_eq!(view.byte_offset, 0);
        assert_eq!(view.byte_length, 32);
        assert_eq!(view.byte_stride, Some(8));
        assert!(view.extensions.is_none());
        assert_eq!(buffers.bytes(1).unwrap(), &[1u8; 32]);
    }

    #[test]
    fn test_missing_codec_warns_when_optional() {
        let mut root = meshopt_root();
        let mut buffers = BufferSet::from_vecs(vec![vec![0xAB; 8]]);
        let diagnostics = CodecRegistry::new().expand(&mut root, &mut buffers).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        // Untouched: fallback data stays live.
        assert_eq!(root.buffer_views[0].buffer.value(), 0);
    }

    #[test]
    fn test_decode_failure_fatal_when_required() {
        let mut root = meshopt_root();
        root.extensions_required
            .push(EXT_MESHOPT_COMPRESSION.to_string());
        let mut buffers = BufferSet::from_vecs(vec![vec![0xAB; 8]]);
        let registry = CodecRegistry::new().register_meshopt(Box::new(Failing));
        let err = registry.expand(&mut root, &mut buffers).unwrap_err();
        assert!(matches!(err, Error::MeshoptDecode { .. }));
    }

    #[test]
    fn test_decode_failure_warns_when_optional() {
        let mut root = meshopt_root();
        let mut buffers = BufferSet::from_vecs(vec![vec![0xAB; 8]]);
        let registry = CodecRegistry::new().register_meshopt(Box::new(Failing));
        let diagnostics = registry.expand(&mut root, &mut buffers).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("corrupt stream"));
    }

    #[test]
    fn test_draco_primitive_expanded_into_regions() {
        let mut root: json::Root = serde_json::from_str(
            r#"{
                "asset": {"version": "2.0"},
                "extensionsUsed": ["KHR_draco_mesh_compression"],
                "buffers": [{"byteLength": 16}],
                "bufferViews": [{"buffer": 0, "byteLength": 16}],
                "accessors": [
                    {"componentType": 5126, "count": 3, "type": "VEC3"},
                    {"componentType": 5123, "count": 3, "type": "SCALAR"}
                ],
                "meshes": [{"primitives": [{
                    "attributes": {"POSITION": 0},
                    "indices": 1,
                    "extensions": {"KHR_draco_mesh_compression": {
                        "bufferView": 0,
                        "attributes": {"POSITION": 0}
                    }}
                }]}]
            }"#,
        )
        .unwrap();
        let mut buffers = BufferSet::from_vecs(vec![vec![0u8; 16]]);

        // 36 bytes of positions, then 6 bytes of u16 indices at offset 36.
        let mut blob = vec![2u8; 36];
        blob.extend_from_slice(&[0, 0, 1, 0, 2, 0]);
        let registry = CodecRegistry::new().register_draco(Box::new(Canned(blob)));
        let diagnostics = registry.expand(&mut root, &mut buffers).unwrap();
        assert!(diagnostics.is_empty());

        let position = &root.accessors[0];
        let indices = &root.accessors[1];
        let position_view = &root.buffer_views[position.buffer_view.unwrap().value()];
        let index_view = &root.buffer_views[indices.buffer_view.unwrap().value()];
        assert_eq!(position_view.buffer.value(), 1);
        assert_eq!(position_view.byte_offset, 0);
        assert_eq!(position_view.byte_length, 36);
        assert_eq!(index_view.byte_offset, 36);
        assert_eq!(index_view.byte_length, 6);
        assert!(root.meshes[0].primitives[0].extensions.is_none());
    }
}
