//! Buffer plane: resolving buffer bytes on read, packing them on write.
//!
//! Read-side resolution order for a URI: `data:` inline, then a path
//! relative to the document, then the caller's resolver hook. Write-side,
//! [`BufferPlane`] appends typed payloads into a single buffer, aligning
//! each append to its element size and padding the tail to 4 bytes the way
//! the exporter's buffer class does.

use crate::error::{Error, Result};
use crate::json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::{Path, PathBuf};

/// Caller-supplied fallback for URIs the core cannot resolve itself.
pub type Resolver = Box<dyn Fn(&str) -> Option<Vec<u8>>>;

/// Decoded `data:` URI, if the string is one.
pub fn decode_data_uri(uri: &str) -> Option<Result<Vec<u8>>> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return Some(Err(Error::MissingResource {
            uri: uri.to_string(),
        }));
    }
    Some(BASE64.decode(payload.as_bytes()).map_err(|_| {
        Error::MissingResource {
            uri: uri.to_string(),
        }
    }))
}

/// Percent-decode a URI and normalize separators into a platform path.
pub fn uri_to_path(uri: &str) -> PathBuf {
    let uri = uri.replace('\\', "/");
    let mut bytes = Vec::with_capacity(uri.len());
    let mut chars = uri.bytes().peekable();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next();
            let lo = chars.next();
            if let (Some(hi), Some(lo)) = (hi, lo) {
                let hex = [hi, lo];
                if let Ok(text) = std::str::from_utf8(&hex) {
                    if let Ok(value) = u8::from_str_radix(text, 16) {
                        bytes.push(value);
                        continue;
                    }
                }
            }
            bytes.push(b);
            if let Some(hi) = hi {
                bytes.push(hi);
            }
            if let Some(lo) = lo {
                bytes.push(lo);
            }
        } else {
            bytes.push(b);
        }
    }
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalize OS separators to `/` and percent-encode reserved characters,
/// producing a URI suitable for `buffer.uri` / `image.uri`.
pub fn path_to_uri(path: &Path) -> String {
    let text = path.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
    let mut uri = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                uri.push(byte as char)
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    uri
}

/// Resolved byte storage for every buffer of an asset.
///
/// In lazy mode unresolved buffers are tolerated until first access.
#[derive(Debug)]
pub struct BufferSet {
    data: Vec<Option<Vec<u8>>>,
    uris: Vec<Option<String>>,
}

impl BufferSet {
    /// Resolve all buffers of `root`.
    ///
    /// `bin_chunk` is the GLB BIN payload, claimed by buffer 0 when its
    /// `uri` is absent. `base_dir` anchors relative URIs. `lazy` defers
    /// missing-resource errors to first access.
    pub fn resolve(
        root: &json::Root,
        bin_chunk: Option<Vec<u8>>,
        base_dir: Option<&Path>,
        resolver: Option<&Resolver>,
        lazy: bool,
    ) -> Result<Self> {
        let mut bin_chunk = bin_chunk;
        let mut data = Vec::with_capacity(root.buffers.len());
        let mut uris = Vec::with_capacity(root.buffers.len());

        for (index, buffer) in root.buffers.iter().enumerate() {
            uris.push(buffer.uri.clone());
            let bytes = match &buffer.uri {
                None => {
                    // Only buffer 0 may claim the BIN chunk.
                    if index == 0 {
                        bin_chunk.take()
                    } else {
                        None
                    }
                }
                Some(uri) => match decode_data_uri(uri) {
                    Some(decoded) => Some(decoded?),
                    None => {
                        let from_file = base_dir
                            .map(|dir| dir.join(uri_to_path(uri)))
                            .and_then(|path| std::fs::read(path).ok());
                        match from_file {
                            Some(bytes) => Some(bytes),
                            None => resolver.and_then(|hook| hook(uri)),
                        }
                    }
                },
            };

            if bytes.is_none() && !lazy {
                return Err(Error::MissingResource {
                    uri: buffer
                        .uri
                        .clone()
                        .unwrap_or_else(|| format!("buffer {index}")),
                });
            }
            if let Some(bytes) = &bytes {
                if bytes.len() < buffer.byte_length {
                    return Err(Error::invariant(
                        format!("/buffers/{index}"),
                        format!(
                            "resolved to {} bytes, byteLength says {}",
                            bytes.len(),
                            buffer.byte_length
                        ),
                    ));
                }
            }
            data.push(bytes);
        }

        Ok(BufferSet { data, uris })
    }

    /// Construct from already-materialized byte vectors (writer tests).
    pub fn from_vecs(buffers: Vec<Vec<u8>>) -> Self {
        let uris = vec![None; buffers.len()];
        BufferSet {
            data: buffers.into_iter().map(Some).collect(),
            uris,
        }
    }

    /// Append a materialized buffer. Codec pre-passes use this when they
    /// rewrite compressed views onto fresh storage.
    pub fn push(&mut self, bytes: Vec<u8>) -> usize {
        self.data.push(Some(bytes));
        self.uris.push(None);
        self.data.len() - 1
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes of buffer `index`. Errors with `MissingResource` for buffers
    /// that were deferred by lazy mode and never resolved.
    pub fn bytes(&self, index: usize) -> Result<&[u8]> {
        match self.data.get(index) {
            Some(Some(bytes)) => Ok(bytes),
            Some(None) => Err(Error::MissingResource {
                uri: self.uris[index]
                    .clone()
                    .unwrap_or_else(|| format!("buffer {index}")),
            }),
            None => Err(Error::BadReference {
                pointer: "/buffers".to_string(),
                index,
                len: self.data.len(),
            }),
        }
    }
}

/// Write-side accumulation of a single output buffer.
///
/// Each append aligns the running length to the payload's element size
/// first (zero padding), records the `(offset, length)` pair for the
/// buffer-view that will be emitted, then pads the tail to 4 bytes so the
/// next view starts aligned.
#[derive(Default)]
pub struct BufferPlane {
    data: Vec<u8>,
}

impl BufferPlane {
    pub fn new() -> Self {
        BufferPlane { data: Vec::new() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Append `bytes`, aligned to `element_size`. Returns the view range.
    pub fn append(&mut self, bytes: &[u8], element_size: usize) -> (usize, usize) {
        if element_size > 1 {
            while self.data.len() % element_size != 0 {
                self.data.push(0);
            }
        }
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        let length = bytes.len();
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        (offset, length)
    }

    /// Emit the buffer as a base64 `data:` URI for GLTF_EMBEDDED output.
    pub fn to_embedded_uri(&self) -> String {
        format!(
            "data:application/octet-stream;base64,{}",
            BASE64.encode(&self.data)
        )
    }
}
