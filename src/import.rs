//! Read path: byte stream in, validated asset out.
//!
//! The reader auto-detects the container form, checks required extensions
//! before touching any payload, resolves buffer bytes, runs the codec
//! pre-pass, then validates. Parsing errors abort the read; validator
//! findings ride along with the successful asset.

use crate::asset::Asset;
use crate::buffer::{BufferSet, Resolver};
use crate::codec::CodecRegistry;
use crate::error::{Error, Result};
use crate::extensions;
use crate::glb;
use crate::json;
use crate::validate::{self, Diagnostic};
use std::path::Path;

/// Reader knobs. Defaults: eager buffer resolution, no resolver hook, no
/// codec plug-ins.
#[derive(Default)]
pub struct ReadOptions {
    /// Defer missing external buffers to first access instead of failing
    /// the read.
    pub lazy: bool,

    /// Last-resort URI resolver, tried after `data:` URIs and the
    /// filesystem.
    pub resolver: Option<Resolver>,

    /// Registered compression plug-ins.
    pub codecs: CodecRegistry,
}

/// A successfully read asset plus everything the validator had to say.
#[derive(Debug)]
pub struct ReadOutput {
    pub asset: Asset,
    pub diagnostics: Vec<Diagnostic>,
}

/// Read an asset from raw bytes, auto-detecting GLB and plain JSON.
///
/// `base_dir` anchors relative buffer and image URIs; pass `None` when
/// the source has no filesystem location.
pub fn from_slice(bytes: &[u8], base_dir: Option<&Path>, options: &ReadOptions) -> Result<ReadOutput> {
    if glb::is_glb(bytes) {
        let parsed = glb::parse(bytes)?;
        finish(parsed.json, parsed.bin, base_dir, options)
    } else {
        finish(bytes.to_vec(), None, base_dir, options)
    }
}

/// Read an asset from a file, using its directory for relative URIs.
pub fn from_path(path: &Path, options: &ReadOptions) -> Result<ReadOutput> {
    let bytes = std::fs::read(path).map_err(|_| Error::MissingResource {
        uri: path.to_string_lossy().into_owned(),
    })?;
    from_slice(&bytes, path.parent(), options)
}

fn finish(
    json_bytes: Vec<u8>,
    bin: Option<Vec<u8>>,
    base_dir: Option<&Path>,
    options: &ReadOptions,
) -> Result<ReadOutput> {
    let mut root: json::Root =
        serde_json::from_slice(&json_bytes).map_err(|e| Error::bad_json("", e.to_string()))?;

    let major = root
        .asset
        .version
        .split('.')
        .next()
        .and_then(|v| v.parse::<u32>().ok());
    if major != Some(2) {
        return Err(Error::bad_json(
            "/asset/version",
            format!("unsupported version {:?}", root.asset.version),
        ));
    }

    // Required extensions are checked before any payload is materialized
    // so an unsupported asset fails fast and cheap.
    extensions::check_required(&root, &options.codecs.supported_names())?;

    let mut buffers = BufferSet::resolve(
        &root,
        bin,
        base_dir,
        options.resolver.as_ref(),
        options.lazy,
    )?;

    let mut diagnostics = options.codecs.expand(&mut root, &mut buffers)?;

    let asset = Asset::new(root, buffers);
    diagnostics.extend(validate::validate(&asset));

    tracing::debug!(
        buffers = asset.buffers.len(),
        nodes = asset.root.nodes.len(),
        diagnostics = diagnostics.len(),
        "asset read"
    );

    Ok(ReadOutput { asset, diagnostics })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{"asset":{"version":"2.0"},"scenes":[{"nodes":[0]}],"nodes":[{}],"scene":0}"#
    }

    #[test]
    fn test_plain_json_detected() {
        let output = from_slice(minimal_json().as_bytes(), None, &ReadOptions::default()).unwrap();
        assert_eq!(output.asset.root.nodes.len(), 1);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_glb_detected() {
        let bytes = glb::assemble(minimal_json().as_bytes(), None);
        let output = from_slice(&bytes, None, &ReadOptions::default()).unwrap();
        assert_eq!(output.asset.root.scenes.len(), 1);
    }

    #[test]
    fn test_version_rejected() {
        let json = r#"{"asset":{"version":"1.0"}}"#;
        let err = from_slice(json.as_bytes(), None, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BadJson { .. }));
    }

    #[test]
    fn test_required_extension_failure_before_buffers() {
        // The buffer URI is unresolvable; the required-extension check must
        // fire first.
        let json = r#"{
            "asset": {"version": "2.0"},
            "extensionsUsed": ["VENDOR_future_widgets"],
            "extensionsRequired": ["VENDOR_future_widgets"],
            "buffers": [{"uri": "missing.bin", "byteLength": 4}]
        }"#;
        let err = from_slice(json.as_bytes(), None, &ReadOptions::default()).unwrap_err();
        match err {
            Error::UnsupportedRequiredExtension { name } => {
                assert_eq!(name, "VENDOR_future_widgets")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_lazy_read_tolerates_missing_buffer() {
        let json = r#"{
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "missing.bin", "byteLength": 4}]
        }"#;
        let options = ReadOptions {
            lazy: true,
            ..ReadOptions::default()
        };
        let output = from_slice(json.as_bytes(), None, &options).unwrap();
        assert!(output.asset.buffers.bytes(0).is_err());
    }

    #[test]
    fn test_malformed_json_aborts() {
        let err = from_slice(b"{\"asset\":", None, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BadJson { .. }));
    }
}
